//! Caller-supplied compilation options.
//!
//! The pipeline core has no CLI surface: tier selection, index-range
//! filtering, and trace toggles are all threaded in through these options by
//! whoever owns the compilation.

use serde::{Deserialize, Serialize};

/// Optimization-aggressiveness tier. Selects the default strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hotness {
    NoOpt,
    Cold,
    Warm,
    Hot,
    VeryHot,
    Scorching,
}

/// Profiling mode of the current compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfilingMode {
    #[default]
    None,
    /// Profiling bodies generated by the JIT itself.
    Jit,
    /// Sampling-based profiling; does not perturb the generated code.
    Sampling,
}

/// On-stack-replacement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OsrMode {
    #[default]
    None,
    Voluntary,
    Involuntary,
}

/// Options for one compilation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Tier selecting the default strategy.
    pub hotness: Hotness,
    pub profiling: ProfilingMode,
    pub osr: OsrMode,
    /// Server-class compilation: larger complexity limits, extra folding.
    pub opt_server: bool,
    /// Ahead-of-time (relocatable) compilation.
    pub aot: bool,
    /// Overrides the block/loop complexity limits.
    pub process_huge_methods: bool,
    /// Only passes whose ordinal index falls in
    /// `[first_opt_index, last_opt_index]` execute. Used for bisection.
    pub first_opt_index: i32,
    pub last_opt_index: i32,
    /// Pass names or ordinal indexes (as decimal strings) to skip.
    pub disabled_opts: Vec<String>,
    /// Pass names or ordinal indexes to trace.
    pub opts_to_trace: Vec<String>,
    /// Record the opt-details transcript.
    pub trace_opt_details: bool,
    /// After the strategy finishes, fail the compilation if an inlined body
    /// was compiled at a hotter tier than this one.
    pub deterministic_recompilation: bool,
}

impl CompileOptions {
    /// Creates options for the given tier with no filtering or tracing.
    #[must_use]
    pub fn new(hotness: Hotness) -> Self {
        Self {
            hotness,
            profiling: ProfilingMode::None,
            osr: OsrMode::None,
            opt_server: false,
            aot: false,
            process_huge_methods: false,
            first_opt_index: 0,
            last_opt_index: i32::MAX,
            disabled_opts: Vec::new(),
            opts_to_trace: Vec::new(),
            trace_opt_details: false,
            deterministic_recompilation: false,
        }
    }

    /// Returns true if the pass at `opt_index` with name `name` is disabled.
    #[must_use]
    pub fn is_disabled(&self, name: &str, opt_index: i32) -> bool {
        self.disabled_opts
            .iter()
            .any(|d| d == name || d.parse::<i32>().is_ok_and(|i| i == opt_index))
    }

    /// Returns true if the pass at `opt_index` with name `name` should trace.
    #[must_use]
    pub fn should_trace(&self, name: &str, opt_index: i32) -> bool {
        self.opts_to_trace
            .iter()
            .any(|t| t == name || t.parse::<i32>().is_ok_and(|i| i == opt_index))
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new(Hotness::Warm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Hotness::NoOpt < Hotness::Cold);
        assert!(Hotness::Hot < Hotness::Scorching);
    }

    #[test]
    fn test_disabled_by_name_and_index() {
        let mut options = CompileOptions::new(Hotness::Hot);
        options.disabled_opts = vec!["localCSE".to_string(), "7".to_string()];
        assert!(options.is_disabled("localCSE", 3));
        assert!(options.is_disabled("treeSimplification", 7));
        assert!(!options.is_disabled("treeSimplification", 8));
    }

    #[test]
    fn test_default_index_range_is_unbounded() {
        let options = CompileOptions::default();
        assert_eq!(options.first_opt_index, 0);
        assert_eq!(options.last_opt_index, i32::MAX);
    }
}
