//! The capability interface every concrete optimization pass implements.

use opal_ir::BlockId;

use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::ids::OptId;

/// A scheduling request a pass hands back to the driver.
///
/// Passes never mutate the registry directly; they return requests from
/// `perform` and the driver applies them afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptRequest {
    /// Request a later `IfEnabled` entry for this pass or group to run.
    Opt(OptId),
    /// Request a block-granular rerun of a pass on one block.
    OptOnBlock(OptId, BlockId),
    /// Request every local pass and local group. Used by passes that rewrite
    /// whole regions.
    AllLocalOpts,
}

/// Result of one pass invocation.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Transformation cost contributed by this invocation.
    pub cost: i32,
    pub requests: Vec<OptRequest>,
}

impl PassOutcome {
    #[must_use]
    pub fn unchanged() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cost(cost: i32) -> Self {
        Self {
            cost,
            requests: Vec::new(),
        }
    }

    #[must_use]
    pub fn request(mut self, request: OptRequest) -> Self {
        self.requests.push(request);
        self
    }
}

/// One concrete optimization pass. Instances are created fresh by the
/// manager's factory for each scheduled execution and discarded afterwards.
pub trait OptimizationPass {
    /// Pass-internal veto, independent of the entry's condition. Returning
    /// false skips the pass silently at zero cost.
    fn should_perform(&self, _comp: &Compilation, _cache: &AnalysisCache) -> bool {
        true
    }

    fn pre_perform(&mut self, _comp: &mut Compilation, _cache: &mut AnalysisCache) {}

    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome;

    fn post_perform(&mut self, _comp: &mut Compilation, _cache: &mut AnalysisCache) {}

    fn pre_perform_on_blocks(&mut self, _comp: &mut Compilation, _cache: &mut AnalysisCache) {}

    /// Block-granular execution. Only called on passes whose flags advertise
    /// block granularity.
    fn perform_on_block(
        &mut self,
        _comp: &mut Compilation,
        _cache: &mut AnalysisCache,
        _block: BlockId,
    ) -> PassOutcome {
        PassOutcome::unchanged()
    }

    fn post_perform_on_blocks(&mut self, _comp: &mut Compilation, _cache: &mut AnalysisCache) {}
}
