//! The concrete optimization passes the scheduler schedules.

pub mod block_extension;
pub mod dead_trees;
pub mod global_dead_store;
pub mod global_value_propagation;
pub mod goto_elimination;
pub mod local_cse;
pub mod local_dead_store;
pub mod local_value_propagation;
pub mod loop_canonicalizer;
pub mod simplifier;

use opal_ir::{NodeId, NodePool, SymRefId};

use crate::analysis::postorder;
use crate::cache::AnalysisCache;
use crate::compilation::Compilation;

/// True when evaluating the subtree has no observable side effect.
pub(crate) fn subtree_is_pure(pool: &NodePool, n: NodeId) -> bool {
    let node = pool.node(n);
    let pure_op = node.op.is_load_const()
        || node.op.is_load()
        || node.op.is_arithmetic()
        || node.op.is_array_length()
        || (node.op.is_call() && node.is_pure_call);
    pure_op && node.children.iter().all(|&c| subtree_is_pure(pool, c))
}

pub(crate) fn subtree_loads_symref(pool: &NodePool, n: NodeId, sr: SymRefId) -> bool {
    let node = pool.node(n);
    (node.op.is_load() && node.symref == Some(sr))
        || node.children.iter().any(|&c| subtree_loads_symref(pool, c, sr))
}

pub(crate) fn subtree_has_load(pool: &NodePool, n: NodeId) -> bool {
    let node = pool.node(n);
    node.op.is_load() || node.children.iter().any(|&c| subtree_has_load(pool, c))
}

/// Tombstones a whole subtree, scrubbing the cached analyses first.
pub(crate) fn release_subtree(comp: &mut Compilation, cache: &mut AnalysisCache, root: NodeId) {
    let mut nodes = Vec::new();
    postorder(&comp.pool, root, &mut nodes);
    for n in nodes {
        cache.prepare_for_node_removal(n);
        comp.pool.release(n);
    }
}
