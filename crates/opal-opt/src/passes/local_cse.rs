//! Local common-subexpression elimination.
//!
//! Within a block, tracks available pure subexpressions and rewires later
//! occurrences onto the first, using the syntactic-equivalence utility with a
//! fresh visit epoch per comparison.

use opal_ir::{BlockId, NodeId, NodePool};

use crate::analysis::postorder;
use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::equivalence::syntactically_equivalent;
use crate::manager::PassFlags;
use crate::pass::{OptimizationPass, PassOutcome};
use crate::passes::{subtree_has_load, subtree_loads_symref};

pub(crate) const FLAGS: PassFlags = PassFlags {
    supports_block_granularity: true,
    supports_ilgen_opt_level: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(LocalCse)
}

struct LocalCse;

impl OptimizationPass for LocalCse {
    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        let blocks: Vec<BlockId> = comp.cfg.live_block_ids().collect();
        let mut cost = 0;
        for block in blocks {
            cost += cse_block(comp, cache, block);
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
        PassOutcome::with_cost(cse_block(comp, cache, block))
    }
}

fn cse_block(comp: &mut Compilation, cache: &mut AnalysisCache, block: BlockId) -> i32 {
    let roots = comp.cfg.block(block).trees.clone();
    let mut available: Vec<NodeId> = Vec::new();
    let mut changes = 0;
    for root in roots {
        changes += common_children(comp, cache, &mut available, root);
        kill_after(comp, &mut available, root);
    }
    changes
}

/// Bottom-up over the children of `parent`: rewires any child equivalent to
/// an available expression, otherwise makes the child available.
fn common_children(
    comp: &mut Compilation,
    cache: &mut AnalysisCache,
    available: &mut Vec<NodeId>,
    parent: NodeId,
) -> i32 {
    let count = comp.pool.node(parent).children.len();
    let mut changes = 0;
    for i in 0..count {
        let child = comp.pool.node(parent).children[i];
        changes += common_children(comp, cache, available, child);
        if !commonable(&comp.pool, child) {
            continue;
        }
        let mut replaced = available.contains(&child);
        if !replaced {
            for j in 0..available.len() {
                let candidate = available[j];
                let epoch = comp.next_visit_epoch();
                if syntactically_equivalent(&mut comp.pool, child, candidate, epoch) {
                    comp.pool.node_mut(parent).children[i] = candidate;
                    cache.prepare_for_node_removal(child);
                    comp.pool.release(child);
                    changes += 1;
                    replaced = true;
                    break;
                }
            }
        }
        if !replaced {
            available.push(child);
        }
    }
    changes
}

fn commonable(pool: &NodePool, n: NodeId) -> bool {
    let op = pool.node(n).op;
    op.is_load() || op.is_arithmetic() || op.is_array_length()
}

/// Applies one tree's kills: a store retires expressions loading its symbol
/// reference, an opaque call retires everything that reads memory.
fn kill_after(comp: &Compilation, available: &mut Vec<NodeId>, root: NodeId) {
    let mut nodes = Vec::new();
    postorder(&comp.pool, root, &mut nodes);
    for n in nodes {
        let node = comp.pool.node(n);
        if node.op.is_store() {
            if let Some(sr) = node.symref {
                available.retain(|&e| !subtree_loads_symref(&comp.pool, e, sr));
            }
        } else if (node.op.is_call() && !node.is_pure_call) || node.op.is_monitor() {
            available.retain(|&e| !subtree_has_load(&comp.pool, e));
        }
    }
}
