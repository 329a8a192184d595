//! The node pool: an arena of expression-tree nodes addressed by id.
//!
//! Every node carries a visit count, a scratch field shared by all tree
//! traversals. A traversal claims a fresh epoch (a value above every count
//! already on a node) and marks nodes by storing the epoch into them; the
//! pipeline driver resets all counts when the epoch nears the representable
//! range.

use crate::cfg::BlockId;
use crate::opcode::{ConstValue, OpCode};
use crate::symref::SymRefId;

/// Index of a node in its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of a node beyond opcode and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    None,
    Const(ConstValue),
    /// Branch target of a `Goto` or the taken target of an `IfCmp`.
    Branch(BlockId),
    /// Case targets of a `Switch`, in case order.
    Cases(Vec<BlockId>),
}

/// One expression-tree node.
#[derive(Debug, Clone)]
pub struct Node {
    pub op: OpCode,
    pub children: Vec<NodeId>,
    pub symref: Option<SymRefId>,
    pub payload: NodePayload,
    /// Meaningful only for `Call` nodes: a pure call has no observable side
    /// effects and may be commoned structurally.
    pub is_pure_call: bool,
    visit: u32,
    removed: bool,
}

impl Node {
    #[must_use]
    pub fn visit_count(&self) -> u32 {
        self.visit
    }

    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    #[must_use]
    pub fn branch_target(&self) -> Option<BlockId> {
        match &self.payload {
            NodePayload::Branch(target) => Some(*target),
            _ => None,
        }
    }

    #[must_use]
    pub fn const_value(&self) -> Option<ConstValue> {
        match &self.payload {
            NodePayload::Const(value) => Some(*value),
            _ => None,
        }
    }
}

/// Arena of nodes for one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct NodePool {
    nodes: Vec<Node>,
    removed_since_sweep: bool,
}

impl NodePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node pool overflow"));
        self.nodes.push(node);
        id
    }

    /// Allocates a node with the given shape.
    pub fn create(
        &mut self,
        op: OpCode,
        children: Vec<NodeId>,
        symref: Option<SymRefId>,
        payload: NodePayload,
    ) -> NodeId {
        self.alloc(Node {
            op,
            children,
            symref,
            payload,
            is_pure_call: false,
            visit: 0,
            removed: false,
        })
    }

    pub fn create_const(&mut self, value: ConstValue) -> NodeId {
        self.create(OpCode::Const, Vec::new(), None, NodePayload::Const(value))
    }

    pub fn create_load(&mut self, symref: SymRefId) -> NodeId {
        self.create(OpCode::Load, Vec::new(), Some(symref), NodePayload::None)
    }

    pub fn create_store(&mut self, symref: SymRefId, value: NodeId) -> NodeId {
        self.create(OpCode::Store, vec![value], Some(symref), NodePayload::None)
    }

    pub fn create_binary(&mut self, op: OpCode, left: NodeId, right: NodeId) -> NodeId {
        debug_assert!(op.is_arithmetic());
        self.create(op, vec![left, right], None, NodePayload::None)
    }

    pub fn create_call(&mut self, symref: SymRefId, args: Vec<NodeId>, pure: bool) -> NodeId {
        let id = self.create(OpCode::Call, args, Some(symref), NodePayload::None);
        self.nodes[id.index()].is_pure_call = pure;
        id
    }

    pub fn create_goto(&mut self, target: BlockId) -> NodeId {
        self.create(OpCode::Goto, Vec::new(), None, NodePayload::Branch(target))
    }

    pub fn create_treetop(&mut self, child: NodeId) -> NodeId {
        self.create(OpCode::Treetop, vec![child], None, NodePayload::None)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Number of nodes ever allocated. Monotonic; growth signals that a pass
    /// created IR.
    #[must_use]
    pub fn total_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes not yet released.
    #[must_use]
    pub fn live_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.removed).count()
    }

    /// Tombstones a node. The id stays valid but the node no longer counts
    /// as live.
    pub fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        if !node.removed {
            node.removed = true;
            self.removed_since_sweep = true;
        }
    }

    /// Reports (and clears) whether any node was released since the last
    /// call. The driver invalidates value numbering when this trips.
    pub fn take_removed_dead_nodes(&mut self) -> bool {
        std::mem::take(&mut self.removed_since_sweep)
    }

    #[must_use]
    pub fn visit_count(&self, id: NodeId) -> u32 {
        self.nodes[id.index()].visit
    }

    pub fn set_visit_count(&mut self, id: NodeId, count: u32) {
        self.nodes[id.index()].visit = count;
    }

    /// Clamps every visit count down to `baseline`.
    pub fn reset_visit_counts(&mut self, baseline: u32) {
        for node in &mut self.nodes {
            node.visit = node.visit.min(baseline);
        }
    }

    #[must_use]
    pub fn max_visit_count(&self) -> u32 {
        self.nodes.iter().map(|n| n.visit).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_counts() {
        let mut pool = NodePool::new();
        let a = pool.create_const(ConstValue::Int32(1));
        let b = pool.create_const(ConstValue::Int32(2));
        let sum = pool.create_binary(OpCode::Add, a, b);
        assert_eq!(pool.total_node_count(), 3);
        assert_eq!(pool.live_node_count(), 3);

        pool.release(sum);
        assert_eq!(pool.total_node_count(), 3);
        assert_eq!(pool.live_node_count(), 2);
        assert!(pool.take_removed_dead_nodes());
        assert!(!pool.take_removed_dead_nodes());
    }

    #[test]
    fn test_visit_count_reset() {
        let mut pool = NodePool::new();
        let a = pool.create_const(ConstValue::Int32(1));
        pool.set_visit_count(a, 900);
        assert_eq!(pool.max_visit_count(), 900);
        pool.reset_visit_counts(1);
        assert_eq!(pool.visit_count(a), 1);
    }
}
