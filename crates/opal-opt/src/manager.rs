//! Per-identifier optimization managers.
//!
//! A manager is the driver-owned runtime record for one pass or group:
//! construction, request/retirement state, and the static flags describing
//! which analyses the pass needs. One manager exists per id per driver
//! instance; nothing here is shared across compilations.

use std::collections::BTreeSet;

use opal_ir::BlockId;

use crate::ids::OptId;
use crate::pass::OptimizationPass;
use crate::strategy::StrategyEntry;

/// How strongly a pass needs an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    None,
    Local,
    /// Global precision is mandatory; the pass runs without the analysis if
    /// the global build fails.
    Global,
    /// Global preferred, local accepted; falls back to a local build if the
    /// global one fails.
    PrefersGlobal,
}

/// Static per-pass-type analysis requirements. Fixed at registry construction,
/// never per instance.
#[derive(Debug, Clone, Copy)]
pub struct PassFlags {
    pub requires_structure: bool,
    pub use_def: Requirement,
    pub value_numbering: Requirement,
    /// The pass keeps use-def info correct across its own IR mutations.
    pub maintains_use_def_info: bool,
    pub does_not_require_alias_sets: bool,
    /// Cached use-def info is only usable if it was built treating loads as
    /// defining occurrences.
    pub requires_loads_as_defs: bool,
    /// Cached use-def info is only usable if loads were not treated as defs.
    pub does_not_require_loads_as_defs: bool,
    pub supports_block_granularity: bool,
    pub supports_ilgen_opt_level: bool,
}

impl PassFlags {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            requires_structure: false,
            use_def: Requirement::None,
            value_numbering: Requirement::None,
            maintains_use_def_info: false,
            does_not_require_alias_sets: false,
            requires_loads_as_defs: false,
            does_not_require_loads_as_defs: false,
            supports_block_granularity: false,
            supports_ilgen_opt_level: false,
        }
    }
}

/// What a manager constructs: a concrete pass, or a nested entry table.
pub enum ManagerKind {
    Pass(fn() -> Box<dyn OptimizationPass>),
    Group(&'static [StrategyEntry]),
}

/// Driver-owned record for one optimization id.
pub struct OptimizationManager {
    id: OptId,
    kind: ManagerKind,
    flags: PassFlags,
    /// Set by an earlier pass to force an `IfEnabled` entry to run; consumed
    /// when the pass or group executes.
    pub requested: bool,
    /// Once set, scheduling this manager again is a defect.
    pub last_run: bool,
    pub trace: bool,
    pub enabled: bool,
    requested_blocks: BTreeSet<BlockId>,
}

impl OptimizationManager {
    #[must_use]
    pub fn new_pass(id: OptId, flags: PassFlags, factory: fn() -> Box<dyn OptimizationPass>) -> Self {
        Self {
            id,
            kind: ManagerKind::Pass(factory),
            flags,
            requested: false,
            last_run: false,
            trace: false,
            enabled: true,
            requested_blocks: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn new_group(id: OptId, table: &'static [StrategyEntry]) -> Self {
        Self {
            id,
            kind: ManagerKind::Group(table),
            flags: PassFlags::none(),
            requested: false,
            last_run: false,
            trace: false,
            enabled: true,
            requested_blocks: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> OptId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    #[must_use]
    pub fn kind(&self) -> &ManagerKind {
        &self.kind
    }

    #[must_use]
    pub fn flags(&self) -> PassFlags {
        self.flags
    }

    /// Queues a single block for a block-granular rerun of this pass.
    pub fn request_block(&mut self, block: BlockId) {
        self.requested_blocks.insert(block);
    }

    #[must_use]
    pub fn has_requested_blocks(&self) -> bool {
        !self.requested_blocks.is_empty()
    }

    pub fn take_requested_blocks(&mut self) -> BTreeSet<BlockId> {
        std::mem::take(&mut self.requested_blocks)
    }

    pub fn clear_requests(&mut self) {
        self.requested = false;
        self.requested_blocks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::EACH_LOCAL_ANALYSIS_PASS_GROUP_TABLE;

    #[test]
    fn test_block_requests_are_consumed() {
        let mut manager = OptimizationManager::new_group(
            OptId::EachLocalAnalysisPassGroup,
            EACH_LOCAL_ANALYSIS_PASS_GROUP_TABLE,
        );
        manager.request_block(BlockId(3));
        manager.request_block(BlockId(3));
        manager.request_block(BlockId(1));
        assert!(manager.has_requested_blocks());

        let blocks: Vec<_> = manager.take_requested_blocks().into_iter().collect();
        assert_eq!(blocks, vec![BlockId(1), BlockId(3)]);
        assert!(!manager.has_requested_blocks());
    }
}
