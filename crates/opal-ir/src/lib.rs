//! Opal Intermediate Representation (OIR)
//!
//! OIR is the method-level IR consumed by the optimization pipeline: a
//! control-flow graph of basic blocks, each holding an ordered list of
//! expression-tree roots allocated out of a node pool. Symbol accesses go
//! through a symbol-reference table so that passes can compare symbols by
//! reference number.
//!
//! The pipeline driver watches two counters on this crate's types for cache
//! invalidation: the live node count of the [`NodePool`] and the length of
//! the [`SymbolReferenceTable`].

mod cfg;
mod method;
mod node;
mod opcode;
mod structure;
mod symref;

pub use cfg::{Block, BlockId, Cfg};
pub use method::MethodInfo;
pub use node::{Node, NodeId, NodePayload, NodePool};
pub use opcode::{ConstValue, OpCode};
pub use structure::{LoopRegion, Structure};
pub use symref::{SymRefId, SymbolId, SymbolReference, SymbolReferenceTable};
