//! Optimization identifiers.
//!
//! Concrete passes and named groups share one numbering space, partitioned by
//! two sentinels: everything before `EndOpts` is a concrete pass, everything
//! between `EndOpts` and `EndGroup` is a group. Strategy tables are terminated
//! by the sentinel appropriate to their nesting level.

use serde::{Deserialize, Serialize};

/// Identifier of a concrete optimization pass or a named group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptId {
    TreeSimplification,
    LocalValuePropagation,
    LocalCse,
    LocalDeadStoreElimination,
    DeadTreesElimination,
    GlobalValuePropagation,
    GlobalDeadStoreElimination,
    BasicBlockExtension,
    RedundantGotoElimination,
    LoopCanonicalization,
    /// Sentinel terminating a top-level strategy. Ids past this point denote
    /// groups.
    EndOpts,
    LocalValuePropagationGroup,
    EachLocalAnalysisPassGroup,
    GlobalDeadStoreGroup,
    LoopCanonicalizationGroup,
    LateLocalGroup,
    /// Sentinel terminating a nested group's entry list.
    EndGroup,
}

impl OptId {
    /// Every identifier, in numbering-space order.
    pub const ALL: [OptId; 17] = [
        OptId::TreeSimplification,
        OptId::LocalValuePropagation,
        OptId::LocalCse,
        OptId::LocalDeadStoreElimination,
        OptId::DeadTreesElimination,
        OptId::GlobalValuePropagation,
        OptId::GlobalDeadStoreElimination,
        OptId::BasicBlockExtension,
        OptId::RedundantGotoElimination,
        OptId::LoopCanonicalization,
        OptId::EndOpts,
        OptId::LocalValuePropagationGroup,
        OptId::EachLocalAnalysisPassGroup,
        OptId::GlobalDeadStoreGroup,
        OptId::LoopCanonicalizationGroup,
        OptId::LateLocalGroup,
        OptId::EndGroup,
    ];

    pub const COUNT: usize = OptId::EndGroup as usize + 1;

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn is_group(self) -> bool {
        self > OptId::EndOpts && self < OptId::EndGroup
    }

    #[must_use]
    pub fn is_sentinel(self) -> bool {
        matches!(self, OptId::EndOpts | OptId::EndGroup)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OptId::TreeSimplification => "treeSimplification",
            OptId::LocalValuePropagation => "localValuePropagation",
            OptId::LocalCse => "localCSE",
            OptId::LocalDeadStoreElimination => "localDeadStoreElimination",
            OptId::DeadTreesElimination => "deadTreesElimination",
            OptId::GlobalValuePropagation => "globalValuePropagation",
            OptId::GlobalDeadStoreElimination => "globalDeadStoreElimination",
            OptId::BasicBlockExtension => "basicBlockExtension",
            OptId::RedundantGotoElimination => "redundantGotoElimination",
            OptId::LoopCanonicalization => "loopCanonicalization",
            OptId::EndOpts => "endOpts",
            OptId::LocalValuePropagationGroup => "localValuePropagationGroup",
            OptId::EachLocalAnalysisPassGroup => "eachLocalAnalysisPassGroup",
            OptId::GlobalDeadStoreGroup => "globalDeadStoreGroup",
            OptId::LoopCanonicalizationGroup => "loopCanonicalizationGroup",
            OptId::LateLocalGroup => "lateLocalGroup",
            OptId::EndGroup => "endGroup",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_space_partition() {
        assert!(!OptId::TreeSimplification.is_group());
        assert!(OptId::EachLocalAnalysisPassGroup.is_group());
        assert!(!OptId::EndOpts.is_group());
        assert!(!OptId::EndGroup.is_group());
        assert!(OptId::EndOpts.is_sentinel());
        assert!(OptId::EndGroup.is_sentinel());
    }

    #[test]
    fn test_all_covers_every_index() {
        assert_eq!(OptId::ALL.len(), OptId::COUNT);
        for (i, id) in OptId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }
}
