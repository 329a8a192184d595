//! Structural analysis result: the method's nested-loop forest.
//!
//! Built by the optimizer's structural analysis and cached on the [`Cfg`];
//! this crate only defines the data. A loop rewrite invalidates the cache by
//! clearing the CFG's structure pointer.
//!
//! [`Cfg`]: crate::Cfg

use crate::cfg::BlockId;

/// One natural loop: a header and the blocks in its body.
#[derive(Debug, Clone)]
pub struct LoopRegion {
    pub header: BlockId,
    /// Blocks in the loop body, header included.
    pub blocks: Vec<BlockId>,
    /// Nesting depth; outermost loops have depth 1.
    pub depth: u32,
    /// Index into [`Structure::loops`] of the enclosing loop, if nested.
    pub parent: Option<usize>,
}

/// The nested-loop hierarchy of a CFG.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    pub loops: Vec<LoopRegion>,
    /// Live block count at the time the structure was built.
    pub block_count: usize,
}

impl Structure {
    /// Total number of natural loops, nested included.
    #[must_use]
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    #[must_use]
    pub fn max_nesting_depth(&self) -> u32 {
        self.loops.iter().map(|l| l.depth).max().unwrap_or(0)
    }

    /// Whether `block` sits inside any loop.
    #[must_use]
    pub fn is_in_loop(&self, block: BlockId) -> bool {
        self.loops.iter().any(|l| l.blocks.contains(&block))
    }
}
