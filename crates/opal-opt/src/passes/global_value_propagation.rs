//! Global value propagation: folds a load into a constant when every
//! reaching definition stores the same value, with agreement checked through
//! value numbers.

use std::collections::HashSet;

use opal_ir::{ConstValue, NodeId, NodePayload, OpCode};

use crate::analysis::block_nodes;
use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::manager::{PassFlags, Requirement};
use crate::pass::{OptimizationPass, PassOutcome};

pub(crate) const FLAGS: PassFlags = PassFlags {
    use_def: Requirement::PrefersGlobal,
    value_numbering: Requirement::Global,
    requires_structure: true,
    does_not_require_loads_as_defs: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(GlobalValuePropagator)
}

struct GlobalValuePropagator;

impl OptimizationPass for GlobalValuePropagator {
    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        let (Some(info), Some(vn)) = (cache.use_def(), cache.value_number()) else {
            return PassOutcome::unchanged();
        };

        let mut rewrites: Vec<(NodeId, ConstValue)> = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        for block in comp.cfg.live_block_ids() {
            for n in block_nodes(&comp.pool, comp.cfg.block(block)) {
                if !comp.pool.node(n).op.is_load() || !seen.insert(n) {
                    continue;
                }
                let defs = info.defs_for(n);
                if defs.is_empty() {
                    continue;
                }
                let mut values: Vec<NodeId> = Vec::with_capacity(defs.len());
                let mut sound = true;
                for &def in defs {
                    let def_node = comp.pool.node(def);
                    match (def_node.op.is_store(), def_node.children.first()) {
                        (true, Some(&value)) => values.push(value),
                        _ => {
                            sound = false;
                            break;
                        }
                    }
                }
                if !sound {
                    continue;
                }
                let first = values[0];
                let agree = values.iter().all(|&v| v == first || vn.same_value(v, first));
                if !agree {
                    continue;
                }
                if let Some(constant) = comp.pool.node(first).const_value() {
                    rewrites.push((n, constant));
                }
            }
        }

        let cost = rewrites.len() as i32;
        for (n, constant) in rewrites {
            cache.prepare_for_node_removal(n);
            let node = comp.pool.node_mut(n);
            node.op = OpCode::Const;
            node.symref = None;
            node.payload = NodePayload::Const(constant);
        }
        PassOutcome::with_cost(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::use_def::UseDefInfo;
    use crate::analysis::value_number::{ValueNumberInfo, VnBuildType};
    use opal_core::CompileOptions;
    use opal_ir::MethodInfo;

    #[test]
    fn test_agreeing_defs_fold_the_load() {
        let mut comp = Compilation::new(MethodInfo::new("m"), CompileOptions::default());
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let left = comp.cfg.add_block();
        let right = comp.cfg.add_block();
        let join = comp.cfg.add_block();
        comp.cfg.add_edge(entry, left);
        comp.cfg.add_edge(entry, right);
        comp.cfg.add_edge(left, join);
        comp.cfg.add_edge(right, join);

        let seven_l = comp.pool.create_const(ConstValue::Int32(7));
        let store_l = comp.pool.create_store(sr, seven_l);
        comp.cfg.block_mut(left).trees.push(store_l);
        let seven_r = comp.pool.create_const(ConstValue::Int32(7));
        let store_r = comp.pool.create_store(sr, seven_r);
        comp.cfg.block_mut(right).trees.push(store_r);

        let load = comp.pool.create_load(sr);
        let top = comp.pool.create_treetop(load);
        comp.cfg.block_mut(join).trees.push(top);

        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        let info = UseDefInfo::build(&comp, true, false).unwrap();
        cache.set_use_def(Some(info), &mut comp);
        let vn = ValueNumberInfo::build(&comp, VnBuildType::Hash).unwrap();
        cache.set_value_number(Some(vn), &mut comp);

        let outcome = GlobalValuePropagator.perform(&mut comp, &mut cache);
        assert_eq!(outcome.cost, 1);
        assert_eq!(comp.pool.node(load).const_value(), Some(ConstValue::Int32(7)));
    }
}
