//! The compilation context: the IR collaborators, caller options, and the
//! ambient per-compilation state the driver and passes share.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use opal_core::{CompileOptions, Hotness};
use opal_ir::{Cfg, MethodInfo, NodePool, SymbolReferenceTable};

/// Analysis kinds announced through the external tracing hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPhase {
    StructuralAnalysis,
    UseDefAnalysis,
    ValueNumbering,
    AliasAnalysis,
}

/// A claimed traversal epoch. Nodes whose visit count equals the epoch have
/// been visited by the traversal that claimed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitEpoch(pub u32);

/// Visit counts at or above this mark trigger a deterministic reset of every
/// node's count before the next pass.
pub const VISIT_HIGH_WATER: u32 = u32::MAX - 4096;

/// One compilation unit.
pub struct Compilation {
    pub pool: NodePool,
    pub cfg: Cfg,
    pub symrefs: SymbolReferenceTable,
    pub method: MethodInfo,
    pub options: CompileOptions,
    visit_epoch: u32,
    opt_index: i32,
    interrupt: Arc<AtomicBool>,
    opt_details: Vec<String>,
    analysis_phase_hook: Option<Box<dyn Fn(AnalysisPhase)>>,
    active_driver_depth: u32,
    num_loops_in_method: Option<usize>,
    disable_loop_opts_that_can_create_loops: bool,
    max_inlined_hotness: Option<Hotness>,
}

impl Compilation {
    #[must_use]
    pub fn new(method: MethodInfo, options: CompileOptions) -> Self {
        Self {
            pool: NodePool::new(),
            cfg: Cfg::new(),
            symrefs: SymbolReferenceTable::new(),
            method,
            options,
            visit_epoch: 0,
            opt_index: -1,
            interrupt: Arc::new(AtomicBool::new(false)),
            opt_details: Vec::new(),
            analysis_phase_hook: None,
            active_driver_depth: 0,
            num_loops_in_method: None,
            disable_loop_opts_that_can_create_loops: false,
            max_inlined_hotness: None,
        }
    }

    /// Appends to the opt-details transcript when detail tracing is on.
    pub fn dump_opt_details(&mut self, message: impl Into<String>) {
        if self.options.trace_opt_details {
            self.opt_details.push(message.into());
        }
    }

    #[must_use]
    pub fn opt_details(&self) -> &[String] {
        &self.opt_details
    }

    /// Handle for an external controller to request abandonment of this
    /// compilation. Polled by the driver between passes.
    #[must_use]
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    pub fn set_analysis_phase_hook(&mut self, hook: Box<dyn Fn(AnalysisPhase)>) {
        self.analysis_phase_hook = Some(hook);
    }

    pub fn mark_analysis_phase(&self, phase: AnalysisPhase) {
        if let Some(hook) = &self.analysis_phase_hook {
            hook(phase);
        }
    }

    /// Claims a fresh traversal epoch, above every count currently on a node.
    pub fn next_visit_epoch(&mut self) -> VisitEpoch {
        self.visit_epoch += 1;
        VisitEpoch(self.visit_epoch)
    }

    #[must_use]
    pub fn visit_epoch(&self) -> u32 {
        self.visit_epoch
    }

    /// Clamps every node's visit count to the baseline and restarts the
    /// epoch counter just above it.
    pub fn reset_visit_epochs(&mut self) {
        self.pool.reset_visit_counts(1);
        self.visit_epoch = 1;
    }

    /// Assigns the next ordinal pass index. Every concrete strategy entry
    /// consumes one, executed or not, so index-range filtering is stable.
    pub fn bump_opt_index(&mut self) -> i32 {
        self.opt_index += 1;
        self.opt_index
    }

    #[must_use]
    pub fn current_opt_index(&self) -> i32 {
        self.opt_index
    }

    /// Marks a driver as active on this compilation. Nested drivers (e.g.
    /// for a callee being inlined) stack; enter/leave must balance.
    pub fn enter_driver(&mut self) {
        self.active_driver_depth += 1;
    }

    pub fn leave_driver(&mut self) {
        assert!(self.active_driver_depth > 0, "unbalanced driver leave");
        self.active_driver_depth -= 1;
    }

    #[must_use]
    pub fn active_driver_depth(&self) -> u32 {
        self.active_driver_depth
    }

    #[must_use]
    pub fn num_loops_in_method(&self) -> Option<usize> {
        self.num_loops_in_method
    }

    pub fn set_num_loops_in_method(&mut self, loops: usize) {
        self.num_loops_in_method = Some(loops);
    }

    #[must_use]
    pub fn disable_loop_opts_that_can_create_loops(&self) -> bool {
        self.disable_loop_opts_that_can_create_loops
    }

    pub fn set_disable_loop_opts_that_can_create_loops(&mut self, value: bool) {
        self.disable_loop_opts_that_can_create_loops = value;
    }

    /// Records the tier of an inlined body, for the deterministic
    /// recompilation check after the strategy finishes.
    pub fn record_inlined_hotness(&mut self, hotness: Hotness) {
        self.max_inlined_hotness = Some(match self.max_inlined_hotness {
            Some(previous) if previous >= hotness => previous,
            _ => hotness,
        });
    }

    #[must_use]
    pub fn max_inlined_hotness(&self) -> Option<Hotness> {
        self.max_inlined_hotness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp() -> Compilation {
        Compilation::new(MethodInfo::new("m"), CompileOptions::default())
    }

    #[test]
    fn test_opt_index_starts_at_zero() {
        let mut comp = comp();
        assert_eq!(comp.bump_opt_index(), 0);
        assert_eq!(comp.bump_opt_index(), 1);
        assert_eq!(comp.current_opt_index(), 1);
    }

    #[test]
    fn test_transcript_gated_by_option() {
        let mut comp = comp();
        comp.dump_opt_details("dropped");
        assert!(comp.opt_details().is_empty());

        comp.options.trace_opt_details = true;
        comp.dump_opt_details("kept");
        assert_eq!(comp.opt_details(), ["kept"]);
    }

    #[test]
    fn test_driver_nesting_balances() {
        let mut comp = comp();
        comp.enter_driver();
        comp.enter_driver();
        assert_eq!(comp.active_driver_depth(), 2);
        comp.leave_driver();
        comp.leave_driver();
        assert_eq!(comp.active_driver_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "unbalanced driver leave")]
    fn test_unbalanced_leave_panics() {
        comp().leave_driver();
    }

    #[test]
    fn test_visit_epoch_reset() {
        let mut comp = comp();
        let a = comp.pool.create_const(opal_ir::ConstValue::Int32(1));
        let epoch = comp.next_visit_epoch();
        comp.pool.set_visit_count(a, epoch.0);
        comp.reset_visit_epochs();
        assert_eq!(comp.pool.visit_count(a), 1);
        assert!(comp.next_visit_epoch().0 > 1);
    }

    #[test]
    fn test_inlined_hotness_keeps_maximum() {
        let mut comp = comp();
        comp.record_inlined_hotness(Hotness::Hot);
        comp.record_inlined_hotness(Hotness::Cold);
        assert_eq!(comp.max_inlined_hotness(), Some(Hotness::Hot));
    }
}
