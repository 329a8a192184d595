//! Global dead-store elimination: removes stores no use anywhere in the
//! method can observe, per whole-method use-def chains.

use opal_ir::{BlockId, NodeId};

use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::manager::{PassFlags, Requirement};
use crate::pass::{OptimizationPass, PassOutcome};
use crate::passes::{release_subtree, subtree_is_pure};

pub(crate) const FLAGS: PassFlags = PassFlags {
    use_def: Requirement::Global,
    requires_loads_as_defs: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(GlobalDeadStoreEliminator)
}

struct GlobalDeadStoreEliminator;

impl OptimizationPass for GlobalDeadStoreEliminator {
    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        // use-def construction is best-effort; without it there is nothing
        // sound to remove
        let Some(info) = cache.use_def() else {
            return PassOutcome::unchanged();
        };

        let mut dead: Vec<(BlockId, NodeId)> = Vec::new();
        for block in comp.cfg.live_block_ids() {
            for &root in &comp.cfg.block(block).trees {
                let node = comp.pool.node(root);
                if !node.op.is_store() || !info.uses_of(root).is_empty() {
                    continue;
                }
                let pure_value = node
                    .children
                    .first()
                    .is_some_and(|&c| subtree_is_pure(&comp.pool, c));
                if pure_value {
                    dead.push((block, root));
                }
            }
        }

        let cost = dead.len() as i32;
        for (block, root) in dead {
            comp.cfg.block_mut(block).trees.retain(|&t| t != root);
            release_subtree(comp, cache, root);
        }
        PassOutcome::with_cost(cost)
    }
}
