//! Local dead-store elimination: removes a store whose symbol reference is
//! overwritten later in the same block with no intervening read.

use std::collections::HashSet;

use opal_ir::{BlockId, NodeId, SymRefId};

use crate::analysis::postorder;
use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::manager::PassFlags;
use crate::pass::{OptimizationPass, PassOutcome};
use crate::passes::{release_subtree, subtree_is_pure};

pub(crate) const FLAGS: PassFlags = PassFlags {
    supports_block_granularity: true,
    supports_ilgen_opt_level: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(LocalDeadStoreEliminator)
}

struct LocalDeadStoreEliminator;

impl OptimizationPass for LocalDeadStoreEliminator {
    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        let blocks: Vec<BlockId> = comp.cfg.live_block_ids().collect();
        let mut cost = 0;
        for block in blocks {
            cost += eliminate_block(comp, cache, block);
        }
        PassOutcome::with_cost(cost)
    }

    fn perform_on_block(
        &mut self,
        comp: &mut Compilation,
        cache: &mut AnalysisCache,
        block: BlockId,
    ) -> PassOutcome {
        if comp.cfg.block(block).is_removed() {
            return PassOutcome::unchanged();
        }
        PassOutcome::with_cost(eliminate_block(comp, cache, block))
    }
}

fn eliminate_block(comp: &mut Compilation, cache: &mut AnalysisCache, block: BlockId) -> i32 {
    let roots = comp.cfg.block(block).trees.clone();
    // symrefs stored later in the block with no read in between
    let mut overwritten: HashSet<SymRefId> = HashSet::new();
    let mut dead: Vec<NodeId> = Vec::new();

    for &root in roots.iter().rev() {
        let node = comp.pool.node(root);
        let store_symref = if node.op.is_store() { node.symref } else { None };
        if let Some(sr) = store_symref {
            let value = node.children.first().copied();
            if let Some(value) = value {
                if overwritten.contains(&sr) && subtree_is_pure(&comp.pool, value) {
                    dead.push(root);
                    continue;
                }
            }
            overwritten.insert(sr);
            apply_reads(comp, root, &mut overwritten);
        } else {
            apply_reads(comp, root, &mut overwritten);
        }
    }

    for root in &dead {
        comp.cfg.block_mut(block).trees.retain(|t| t != root);
        release_subtree(comp, cache, *root);
    }
    dead.len() as i32
}

/// Reads under `root` keep earlier stores alive; opaque calls and nested
/// stores are treated as reading everything.
fn apply_reads(comp: &Compilation, root: NodeId, overwritten: &mut HashSet<SymRefId>) {
    let mut nodes = Vec::new();
    postorder(&comp.pool, root, &mut nodes);
    for n in nodes {
        let node = comp.pool.node(n);
        if node.op.is_load() {
            if let Some(sr) = node.symref {
                overwritten.remove(&sr);
            }
        } else if (node.op.is_call() && !node.is_pure_call)
            || (node.op.is_store() && n != root)
            || node.op.is_monitor()
        {
            overwritten.clear();
        }
    }
}
