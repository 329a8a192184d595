//! Dead-trees elimination: drops treetops anchoring computations with no
//! observable effect.

use opal_ir::{BlockId, NodeId, OpCode};

use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::manager::PassFlags;
use crate::pass::{OptimizationPass, PassOutcome};
use crate::passes::{release_subtree, subtree_is_pure};

pub(crate) const FLAGS: PassFlags = PassFlags {
    supports_ilgen_opt_level: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(DeadTreesEliminator)
}

struct DeadTreesEliminator;

impl OptimizationPass for DeadTreesEliminator {
    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        let blocks: Vec<BlockId> = comp.cfg.live_block_ids().collect();
        let mut cost = 0;
        for block in blocks {
            let roots = comp.cfg.block(block).trees.clone();
            let mut dead: Vec<NodeId> = Vec::new();
            for root in roots {
                let node = comp.pool.node(root);
                let removable = match node.op {
                    OpCode::Treetop => node
                        .children
                        .first()
                        .is_some_and(|&c| subtree_is_pure(&comp.pool, c)),
                    _ => subtree_is_pure(&comp.pool, root),
                };
                if removable {
                    dead.push(root);
                }
            }
            for root in &dead {
                comp.cfg.block_mut(block).trees.retain(|t| t != root);
                release_subtree(comp, cache, *root);
            }
            cost += dead.len() as i32;
        }
        PassOutcome::with_cost(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::value_number::VnBuildType;
    use opal_core::CompileOptions;
    use opal_ir::{ConstValue, MethodInfo};

    #[test]
    fn test_pure_treetop_removed_store_kept() {
        let mut comp = Compilation::new(MethodInfo::new("m"), CompileOptions::default());
        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let one = comp.pool.create_const(ConstValue::Int32(1));
        let dangling = comp.pool.create_treetop(one);
        let two = comp.pool.create_const(ConstValue::Int32(2));
        let store = comp.pool.create_store(sr, two);
        comp.cfg.block_mut(entry).trees.extend([dangling, store]);

        let outcome = DeadTreesEliminator.perform(&mut comp, &mut cache);
        assert_eq!(outcome.cost, 1);
        assert_eq!(comp.cfg.block(entry).trees, vec![store]);
    }
}
