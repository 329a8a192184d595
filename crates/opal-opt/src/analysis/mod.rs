//! Derived analyses the pipeline builds on demand: use-def chains, value
//! numbering, and the CFG's structural (loop) analysis.

pub mod structure;
pub mod use_def;
pub mod value_number;

use opal_ir::{Block, NodeId, NodePool};

/// Appends the subtree under `root` in evaluation (post) order. Shared nodes
/// appear once per reference; callers dedupe where that matters.
pub(crate) fn postorder(pool: &NodePool, root: NodeId, out: &mut Vec<NodeId>) {
    for &child in &pool.node(root).children {
        postorder(pool, child, out);
    }
    out.push(root);
}

/// Every node of a block's trees in evaluation order.
pub(crate) fn block_nodes(pool: &NodePool, block: &Block) -> Vec<NodeId> {
    let mut out = Vec::new();
    for &root in &block.trees {
        postorder(pool, root, &mut out);
    }
    out
}
