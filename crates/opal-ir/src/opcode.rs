//! Operation codes and constant payloads for OIR nodes.

use serde::{Deserialize, Serialize};

/// A constant payload. Widths are explicit: redundancy-detecting passes
/// compare constants exactly per width, and floating constants by bit
/// pattern, never approximately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    /// IEEE-754 single bits.
    Float(u32),
    /// IEEE-754 double bits.
    Double(u64),
    Address(u64),
}

/// Operation code of an OIR node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    /// Constant; payload carries the value.
    Const,
    /// Load of a symbol reference.
    Load,
    /// Store to a symbol reference; single child is the stored value.
    Store,
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    /// Length of the array addressed by the child.
    ArrayLength,
    /// Call through a symbol reference; children are the arguments.
    /// Purity is a per-node property, see [`crate::Node::is_pure_call`].
    Call,
    /// Object allocation; the symbol reference names the class.
    New,
    MonitorEnter,
    MonitorExit,
    /// Unconditional branch; payload carries the target.
    Goto,
    /// Conditional branch on the two compared children; payload carries the
    /// taken target, fall-through is the next block in CFG order.
    IfCmp,
    /// Multi-way branch on the child selector; payload carries the case
    /// targets in case order.
    Switch,
    /// Return; optional child is the returned value.
    Return,
    /// Anchors its single child at treetop level without evaluating a result.
    Treetop,
    /// Forwards its single child unchanged. Never equivalent to another node.
    PassThrough,
}

impl OpCode {
    /// True for ops that read or write through the symbol-reference table.
    #[must_use]
    pub fn has_symbol_reference(self) -> bool {
        matches!(
            self,
            OpCode::Load | OpCode::Store | OpCode::Call | OpCode::New
        )
    }

    #[must_use]
    pub fn is_store(self) -> bool {
        self == OpCode::Store
    }

    #[must_use]
    pub fn is_load(self) -> bool {
        self == OpCode::Load
    }

    #[must_use]
    pub fn is_call(self) -> bool {
        self == OpCode::Call
    }

    #[must_use]
    pub fn is_load_const(self) -> bool {
        self == OpCode::Const
    }

    #[must_use]
    pub fn is_branch(self) -> bool {
        matches!(self, OpCode::Goto | OpCode::IfCmp)
    }

    #[must_use]
    pub fn is_switch(self) -> bool {
        self == OpCode::Switch
    }

    #[must_use]
    pub fn is_allocation(self) -> bool {
        self == OpCode::New
    }

    #[must_use]
    pub fn is_monitor(self) -> bool {
        matches!(self, OpCode::MonitorEnter | OpCode::MonitorExit)
    }

    /// True for pure arithmetic that can be commoned freely.
    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Neg
        )
    }

    #[must_use]
    pub fn is_array_length(self) -> bool {
        self == OpCode::ArrayLength
    }
}
