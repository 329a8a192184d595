//! Tree simplification: folds arithmetic over constant operands in place.

use opal_ir::{BlockId, ConstValue, NodeId, NodePayload, OpCode};

use crate::analysis::postorder;
use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::ids::OptId;
use crate::manager::PassFlags;
use crate::pass::{OptRequest, OptimizationPass, PassOutcome};

pub(crate) const FLAGS: PassFlags = PassFlags {
    supports_block_granularity: true,
    supports_ilgen_opt_level: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(TreeSimplifier)
}

struct TreeSimplifier;

impl OptimizationPass for TreeSimplifier {
    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        let blocks: Vec<BlockId> = comp.cfg.live_block_ids().collect();
        let mut outcome = PassOutcome::unchanged();
        for block in blocks {
            fold_block(comp, cache, block, &mut outcome);
        }
        outcome
    }

    fn perform_on_block(
        &mut self,
        comp: &mut Compilation,
        cache: &mut AnalysisCache,
        block: BlockId,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::unchanged();
        if !comp.cfg.block(block).is_removed() {
            fold_block(comp, cache, block, &mut outcome);
        }
        outcome
    }
}

fn fold_block(
    comp: &mut Compilation,
    cache: &mut AnalysisCache,
    block: BlockId,
    outcome: &mut PassOutcome,
) {
    let roots = comp.cfg.block(block).trees.clone();
    let mut folds = 0;
    for root in roots {
        let mut nodes = Vec::new();
        postorder(&comp.pool, root, &mut nodes);
        for n in nodes {
            if try_fold(comp, cache, n) {
                folds += 1;
            }
        }
    }
    if folds > 0 {
        outcome.cost += folds;
        // folded constants may feed stores the propagator can now track
        outcome
            .requests
            .push(OptRequest::OptOnBlock(OptId::LocalValuePropagation, block));
    }
}

/// Rewrites an arithmetic node over constant operands into the constant.
fn try_fold(comp: &mut Compilation, cache: &mut AnalysisCache, n: NodeId) -> bool {
    let node = comp.pool.node(n);
    if !node.op.is_arithmetic() {
        return false;
    }
    let op = node.op;
    let children = node.children.clone();
    let mut values = Vec::with_capacity(children.len());
    for &c in &children {
        match comp.pool.node(c).const_value() {
            Some(v) => values.push(v),
            None => return false,
        }
    }
    let Some(folded) = fold(op, &values) else {
        return false;
    };
    for &c in &children {
        cache.prepare_for_node_removal(c);
        comp.pool.release(c);
    }
    cache.prepare_for_node_removal(n);
    let node = comp.pool.node_mut(n);
    node.op = OpCode::Const;
    node.children = Vec::new();
    node.payload = NodePayload::Const(folded);
    true
}

fn fold(op: OpCode, values: &[ConstValue]) -> Option<ConstValue> {
    use ConstValue::{Int32, Int64};
    Some(match (op, values) {
        (OpCode::Add, [Int32(a), Int32(b)]) => Int32(a.wrapping_add(*b)),
        (OpCode::Sub, [Int32(a), Int32(b)]) => Int32(a.wrapping_sub(*b)),
        (OpCode::Mul, [Int32(a), Int32(b)]) => Int32(a.wrapping_mul(*b)),
        (OpCode::Div, [Int32(a), Int32(b)]) if *b != 0 => Int32(a.wrapping_div(*b)),
        (OpCode::Neg, [Int32(a)]) => Int32(a.wrapping_neg()),
        (OpCode::Add, [Int64(a), Int64(b)]) => Int64(a.wrapping_add(*b)),
        (OpCode::Sub, [Int64(a), Int64(b)]) => Int64(a.wrapping_sub(*b)),
        (OpCode::Mul, [Int64(a), Int64(b)]) => Int64(a.wrapping_mul(*b)),
        (OpCode::Div, [Int64(a), Int64(b)]) if *b != 0 => Int64(a.wrapping_div(*b)),
        (OpCode::Neg, [Int64(a)]) => Int64(a.wrapping_neg()),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::value_number::VnBuildType;
    use opal_core::CompileOptions;
    use opal_ir::MethodInfo;

    #[test]
    fn test_nested_constants_fold_bottom_up() {
        let mut comp = Compilation::new(MethodInfo::new("m"), CompileOptions::default());
        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        let entry = comp.cfg.entry();
        let two = comp.pool.create_const(ConstValue::Int32(2));
        let three = comp.pool.create_const(ConstValue::Int32(3));
        let sum = comp.pool.create_binary(OpCode::Add, two, three);
        let four = comp.pool.create_const(ConstValue::Int32(4));
        let product = comp.pool.create_binary(OpCode::Mul, sum, four);
        let top = comp.pool.create_treetop(product);
        comp.cfg.block_mut(entry).trees.push(top);

        let outcome = TreeSimplifier.perform(&mut comp, &mut cache);
        assert_eq!(outcome.cost, 2);
        assert_eq!(
            comp.pool.node(product).const_value(),
            Some(ConstValue::Int32(20))
        );
    }

    #[test]
    fn test_division_by_zero_is_left_alone() {
        let mut comp = Compilation::new(MethodInfo::new("m"), CompileOptions::default());
        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        let entry = comp.cfg.entry();
        let one = comp.pool.create_const(ConstValue::Int32(1));
        let zero = comp.pool.create_const(ConstValue::Int32(0));
        let div = comp.pool.create_binary(OpCode::Div, one, zero);
        let top = comp.pool.create_treetop(div);
        comp.cfg.block_mut(entry).trees.push(top);

        let outcome = TreeSimplifier.perform(&mut comp, &mut cache);
        assert_eq!(outcome.cost, 0);
        assert_eq!(comp.pool.node(div).op, OpCode::Div);
    }
}
