//! Local value propagation: within a block, forwards constants through
//! stores into later loads of the same symbol reference.

use std::collections::HashMap;

use opal_ir::{BlockId, ConstValue, NodeId, NodePayload, OpCode, SymRefId};

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
    Box::new(LocalValuePropagator)
}

struct LocalValuePropagator;

impl OptimizationPass for LocalValuePropagator {
    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        let blocks: Vec<BlockId> = comp.cfg.live_block_ids().collect();
        let mut outcome = PassOutcome::unchanged();
        for block in blocks {
            propagate_block(comp, cache, block, &mut outcome);
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
            propagate_block(comp, cache, block, &mut outcome);
        }
        outcome
    }
}

fn propagate_block(
    comp: &mut Compilation,
    cache: &mut AnalysisCache,
    block: BlockId,
    outcome: &mut PassOutcome,
) {
    let roots = comp.cfg.block(block).trees.clone();
    let mut known: HashMap<SymRefId, ConstValue> = HashMap::new();
    let mut changes = 0;
    for root in roots {
        changes += rewrite_loads(comp, cache, root, &known);
        update_state(comp, root, &mut known);
    }
    if changes > 0 {
        outcome.cost += changes;
        // propagated constants may make arithmetic foldable
        outcome
            .requests
            .push(OptRequest::OptOnBlock(OptId::TreeSimplification, block));
    }
}

fn rewrite_loads(
    comp: &mut Compilation,
    cache: &mut AnalysisCache,
    n: NodeId,
    known: &HashMap<SymRefId, ConstValue>,
) -> i32 {
    let children = comp.pool.node(n).children.clone();
    let mut changes = 0;
    for c in children {
        changes += rewrite_loads(comp, cache, c, known);
    }
    let node = comp.pool.node(n);
    if node.op.is_load() {
        if let Some(value) = node.symref.and_then(|sr| known.get(&sr).copied()) {
            cache.prepare_for_node_removal(n);
            let node = comp.pool.node_mut(n);
            node.op = OpCode::Const;
            node.symref = None;
            node.payload = NodePayload::Const(value);
            changes += 1;
        }
    }
    changes
}

/// Applies one tree's effect on the known-constant state, in evaluation
/// order: stores of constants record, other stores and opaque calls kill.
fn update_state(comp: &Compilation, root: NodeId, known: &mut HashMap<SymRefId, ConstValue>) {
    let mut nodes = Vec::new();
    postorder(&comp.pool, root, &mut nodes);
    for n in nodes {
        let node = comp.pool.node(n);
        if node.op.is_store() {
            if let Some(sr) = node.symref {
                let value = node
                    .children
                    .first()
                    .and_then(|&c| comp.pool.node(c).const_value());
                match value {
                    Some(v) => {
                        known.insert(sr, v);
                    }
                    None => {
                        known.remove(&sr);
                    }
                }
            }
        } else if node.op.is_call() && !node.is_pure_call {
            known.clear();
        }
    }
}
