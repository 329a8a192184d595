//! The control-flow graph: basic blocks of ordered tree roots, with the
//! structural (loop) analysis result cached on the graph itself.

use crate::node::NodeId;
use crate::structure::Structure;

/// Index of a block in its CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One basic block.
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// Tree roots, in execution order.
    pub trees: Vec<NodeId>,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
    removed: bool,
}

impl Block {
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// Control-flow graph of one method.
#[derive(Debug, Clone, Default)]
pub struct Cfg {
    blocks: Vec<Block>,
    structure: Option<Structure>,
    might_have_unreachable_blocks: bool,
}

impl Cfg {
    /// Creates a CFG with a single empty entry block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::default()],
            structure: None,
            might_have_unreachable_blocks: false,
        }
    }

    /// The entry block. Always block 0 and never removed.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).expect("cfg overflow"));
        self.blocks.push(Block::default());
        id
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        if !self.blocks[from.index()].successors.contains(&to) {
            self.blocks[from.index()].successors.push(to);
            self.blocks[to.index()].predecessors.push(from);
        }
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// All block ids, removed blocks included.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + use<> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Ids of blocks still in the graph.
    pub fn live_block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.block_ids().filter(|id| !self.block(*id).is_removed())
    }

    #[must_use]
    pub fn live_block_count(&self) -> usize {
        self.live_block_ids().count()
    }

    #[must_use]
    pub fn has_more_than_one_block(&self) -> bool {
        self.live_block_count() > 1
    }

    /// The cached structural analysis, if built.
    #[must_use]
    pub fn structure(&self) -> Option<&Structure> {
        self.structure.as_ref()
    }

    /// Installs or clears the structural analysis. Clearing is how loop
    /// rewrites invalidate structure.
    pub fn set_structure(&mut self, structure: Option<Structure>) {
        self.structure = structure;
    }

    #[must_use]
    pub fn might_have_unreachable_blocks(&self) -> bool {
        self.might_have_unreachable_blocks
    }

    /// Set by passes that may have disconnected blocks without removing them.
    pub fn set_might_have_unreachable_blocks(&mut self, value: bool) {
        self.might_have_unreachable_blocks = value;
    }

    /// Removes every block not reachable from the entry, fixing up edge
    /// lists, and clears the unreachable flag. Returns how many were removed.
    pub fn remove_unreachable_blocks(&mut self) -> usize {
        let mut reachable = vec![false; self.blocks.len()];
        let mut worklist = vec![self.entry()];
        while let Some(id) = worklist.pop() {
            if std::mem::replace(&mut reachable[id.index()], true) {
                continue;
            }
            for succ in &self.blocks[id.index()].successors {
                if !reachable[succ.index()] {
                    worklist.push(*succ);
                }
            }
        }

        let mut removed = 0;
        for index in 0..self.blocks.len() {
            if !reachable[index] && !self.blocks[index].removed {
                self.blocks[index].removed = true;
                self.blocks[index].trees.clear();
                self.blocks[index].successors.clear();
                removed += 1;
            }
        }
        if removed > 0 {
            for block in &mut self.blocks {
                block
                    .predecessors
                    .retain(|pred| reachable[pred.index()]);
                block.successors.retain(|succ| reachable[succ.index()]);
            }
        }
        self.might_have_unreachable_blocks = false;
        removed
    }
}
