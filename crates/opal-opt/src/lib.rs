//! Machine-independent optimization pipeline for the Opal compiler.
//!
//! The pipeline is driven by static strategy tables: a tier (or a caller
//! override) selects an ordered list of optimization ids, the [`Optimizer`]
//! walks that list gating each entry on its condition, and an
//! [`AnalysisCache`] keeps the derived analyses honest across IR mutations.
//! Concrete passes implement [`OptimizationPass`] and talk back to the driver
//! only through the requests in their [`PassOutcome`].

pub mod analysis;
pub mod cache;
pub mod codegen;
pub mod compilation;
pub mod equivalence;
pub mod ids;
pub mod manager;
pub mod optimizer;
pub mod pass;
pub mod passes;
pub mod strategy;

pub use analysis::structure::build_structure;
pub use analysis::use_def::UseDefInfo;
pub use analysis::value_number::{ValueNumberInfo, VnBuildType};
pub use cache::AnalysisCache;
pub use codegen::{CodeGenerator, compile};
pub use compilation::{AnalysisPhase, Compilation, VISIT_HIGH_WATER, VisitEpoch};
pub use equivalence::{nodes_equivalent, syntactically_equivalent};
pub use ids::OptId;
pub use manager::{ManagerKind, OptimizationManager, PassFlags, Requirement};
pub use optimizer::{
    HIGH_BASIC_BLOCK_COUNT, HIGH_LOOP_COUNT, MAX_LOCAL_OPTS_ITERS, Optimizer,
    VERY_HOT_HIGH_LOOP_COUNT,
};
pub use pass::{OptRequest, OptimizationPass, PassOutcome};
pub use strategy::{
    Condition, CustomStrategy, CustomStrategyEntry, StrategyEntry, dump_strategy,
    strategy_for_hotness,
};
