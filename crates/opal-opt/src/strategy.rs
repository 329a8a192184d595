//! Strategy tables: the static, ordered pass schedules.
//!
//! A strategy is a flat array of entries terminated by `EndOpts`; a group is
//! a reusable named sub-strategy terminated by `EndGroup`. Each entry pairs an
//! optimization id with an execution condition, plus an orthogonal
//! `marks_last_run` bit that retires the entry's manager once the entry has
//! been evaluated, whether or not it actually ran.

use opal_core::{Hotness, OsrMode, ProfilingMode};
use serde::{Deserialize, Serialize};

use crate::compilation::Compilation;
use crate::ids::OptId;
use crate::manager::OptimizationManager;

/// Execution condition of one strategy entry, evaluated against the current
/// compilation state and the entry's manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    Never,
    /// Run only if an earlier pass requested this one.
    IfEnabled,
    IfLoops,
    IfEnabledAndLoops,
    IfMoreThanOneBlock,
    IfEnabledAndMoreThanOneBlock,
    IfOptServer,
    IfMonitors,
    IfNews,
    IfEnabledAndNews,
    IfProfiling,
    IfNotProfiling,
    IfOsr,
    IfVoluntaryOsr,
    IfInvoluntaryOsr,
    IfEscapeAnalysisOpportunities,
    IfMethodHandleInvokes,
    IfVectorApi,
    IfAotAndEnabled,
    /// Always runs, and cannot be skipped by the index-range filter.
    MustBeDone,
}

impl Condition {
    #[must_use]
    pub fn evaluate(self, manager: &OptimizationManager, comp: &Compilation) -> bool {
        let options = &comp.options;
        let method = &comp.method;
        match self {
            Condition::Always | Condition::MustBeDone => true,
            Condition::Never => false,
            Condition::IfEnabled => manager.requested,
            Condition::IfLoops => method.may_have_loops,
            Condition::IfEnabledAndLoops => manager.requested && method.may_have_loops,
            Condition::IfMoreThanOneBlock => comp.cfg.has_more_than_one_block(),
            Condition::IfEnabledAndMoreThanOneBlock => {
                manager.requested && comp.cfg.has_more_than_one_block()
            }
            Condition::IfOptServer => options.opt_server,
            Condition::IfMonitors => method.may_contain_monitors,
            Condition::IfNews => method.has_news,
            Condition::IfEnabledAndNews => manager.requested && method.has_news,
            Condition::IfProfiling => options.profiling != ProfilingMode::None,
            Condition::IfNotProfiling => options.profiling == ProfilingMode::None,
            Condition::IfOsr => options.osr != OsrMode::None,
            Condition::IfVoluntaryOsr => options.osr == OsrMode::Voluntary,
            Condition::IfInvoluntaryOsr => options.osr == OsrMode::Involuntary,
            Condition::IfEscapeAnalysisOpportunities => {
                method.has_escape_analysis_opportunities
            }
            Condition::IfMethodHandleInvokes => method.has_method_handle_invokes,
            Condition::IfVectorApi => method.has_vector_api,
            Condition::IfAotAndEnabled => options.aot && manager.requested,
        }
    }

    /// Conditions that only fire on an explicit request from an earlier pass.
    #[must_use]
    pub fn requires_request(self) -> bool {
        matches!(
            self,
            Condition::IfEnabled
                | Condition::IfEnabledAndLoops
                | Condition::IfEnabledAndMoreThanOneBlock
                | Condition::IfEnabledAndNews
                | Condition::IfAotAndEnabled
        )
    }
}

/// One strategy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyEntry {
    pub id: OptId,
    pub condition: Condition,
    /// Retire the manager after this entry is evaluated, regardless of
    /// whether execution occurred.
    pub marks_last_run: bool,
}

impl StrategyEntry {
    #[must_use]
    pub const fn new(id: OptId, condition: Condition) -> Self {
        Self {
            id,
            condition,
            marks_last_run: false,
        }
    }

    #[must_use]
    pub const fn marking_last_run(id: OptId, condition: Condition) -> Self {
        Self {
            id,
            condition,
            marks_last_run: true,
        }
    }

    pub const END_OPTS: Self = Self::new(OptId::EndOpts, Condition::Always);
    pub const END_GROUP: Self = Self::new(OptId::EndGroup, Condition::Always);
}

pub static LOCAL_VALUE_PROPAGATION_GROUP_TABLE: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::LocalValuePropagation, Condition::Always),
    StrategyEntry::new(OptId::LocalCse, Condition::IfEnabled),
    StrategyEntry::END_GROUP,
];

/// The fixed-point group: re-run while member passes keep requesting
/// re-application, bounded by the driver's iteration cap.
pub static EACH_LOCAL_ANALYSIS_PASS_GROUP_TABLE: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::TreeSimplification, Condition::Always),
    StrategyEntry::new(OptId::LocalValuePropagation, Condition::Always),
    StrategyEntry::new(OptId::LocalCse, Condition::Always),
    StrategyEntry::new(OptId::LocalDeadStoreElimination, Condition::Always),
    StrategyEntry::new(OptId::DeadTreesElimination, Condition::Always),
    StrategyEntry::END_GROUP,
];

pub static GLOBAL_DEAD_STORE_GROUP_TABLE: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::GlobalDeadStoreElimination, Condition::Always),
    StrategyEntry::new(OptId::DeadTreesElimination, Condition::Always),
    StrategyEntry::END_GROUP,
];

pub static LOOP_CANONICALIZATION_GROUP_TABLE: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::LoopCanonicalization, Condition::Always),
    StrategyEntry::new(OptId::RedundantGotoElimination, Condition::IfEnabled),
    StrategyEntry::END_GROUP,
];

pub static LATE_LOCAL_GROUP_TABLE: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::EachLocalAnalysisPassGroup, Condition::Always),
    StrategyEntry::new(OptId::BasicBlockExtension, Condition::IfMoreThanOneBlock),
    StrategyEntry::END_GROUP,
];

pub static NO_OPT_STRATEGY: &[StrategyEntry] = &[StrategyEntry::END_OPTS];

pub static COLD_STRATEGY: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::TreeSimplification, Condition::Always),
    StrategyEntry::new(OptId::LocalDeadStoreElimination, Condition::Always),
    StrategyEntry::new(OptId::DeadTreesElimination, Condition::Always),
    StrategyEntry::END_OPTS,
];

pub static WARM_STRATEGY: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::TreeSimplification, Condition::Always),
    StrategyEntry::new(OptId::LocalValuePropagationGroup, Condition::IfMoreThanOneBlock),
    StrategyEntry::new(OptId::EachLocalAnalysisPassGroup, Condition::Always),
    StrategyEntry::new(OptId::RedundantGotoElimination, Condition::IfMoreThanOneBlock),
    StrategyEntry::new(OptId::DeadTreesElimination, Condition::Always),
    StrategyEntry::END_OPTS,
];

pub static HOT_STRATEGY: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::TreeSimplification, Condition::Always),
    StrategyEntry::new(OptId::LoopCanonicalizationGroup, Condition::IfLoops),
    StrategyEntry::new(OptId::EachLocalAnalysisPassGroup, Condition::Always),
    StrategyEntry::new(OptId::GlobalValuePropagation, Condition::IfMoreThanOneBlock),
    StrategyEntry::new(OptId::GlobalDeadStoreGroup, Condition::IfMoreThanOneBlock),
    StrategyEntry::new(OptId::LocalValuePropagationGroup, Condition::IfEnabled),
    StrategyEntry::new(OptId::LateLocalGroup, Condition::IfMoreThanOneBlock),
    StrategyEntry::marking_last_run(OptId::DeadTreesElimination, Condition::Always),
    StrategyEntry::END_OPTS,
];

/// Strategy used by a driver running during IL generation. Every member pass
/// must support the ilgen opt level.
pub static ILGEN_STRATEGY: &[StrategyEntry] = &[
    StrategyEntry::new(OptId::TreeSimplification, Condition::Always),
    StrategyEntry::new(OptId::LocalCse, Condition::Always),
    StrategyEntry::END_OPTS,
];

/// Maps a tier to its default strategy.
#[must_use]
pub fn strategy_for_hotness(hotness: Hotness) -> &'static [StrategyEntry] {
    match hotness {
        Hotness::NoOpt => NO_OPT_STRATEGY,
        Hotness::Cold => COLD_STRATEGY,
        Hotness::Warm => WARM_STRATEGY,
        Hotness::Hot | Hotness::VeryHot | Hotness::Scorching => HOT_STRATEGY,
    }
}

/// Resolves a group id to its entry table. Panics on a non-group id; that is
/// a defect in the strategy tables.
#[must_use]
pub fn group_table(id: OptId) -> &'static [StrategyEntry] {
    match id {
        OptId::LocalValuePropagationGroup => LOCAL_VALUE_PROPAGATION_GROUP_TABLE,
        OptId::EachLocalAnalysisPassGroup => EACH_LOCAL_ANALYSIS_PASS_GROUP_TABLE,
        OptId::GlobalDeadStoreGroup => GLOBAL_DEAD_STORE_GROUP_TABLE,
        OptId::LoopCanonicalizationGroup => LOOP_CANONICALIZATION_GROUP_TABLE,
        OptId::LateLocalGroup => LATE_LOCAL_GROUP_TABLE,
        other => panic!("{} is not a group", other.name()),
    }
}

/// Renders a strategy with its groups expanded, for debugging and tracing.
#[must_use]
pub fn dump_strategy(strategy: &[StrategyEntry]) -> String {
    let mut out = String::new();
    render(strategy, 0, &mut out);
    out
}

fn render(entries: &[StrategyEntry], depth: usize, out: &mut String) {
    for entry in entries {
        if entry.id.is_sentinel() {
            break;
        }
        let marker = if entry.marks_last_run { " !" } else { "" };
        out.push_str(&format!(
            "{:indent$}{} [{:?}]{}\n",
            "",
            entry.id.name(),
            entry.condition,
            marker,
            indent = depth * 2
        ));
        if entry.id.is_group() {
            render(group_table(entry.id), depth + 1, out);
        }
    }
}

/// Caller-supplied flat strategy override. Replaces the tier-selected default
/// verbatim; no grouping is permitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomStrategy {
    pub entries: Vec<CustomStrategyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomStrategyEntry {
    pub id: OptId,
    #[serde(default)]
    pub must_be_done: bool,
}

impl CustomStrategy {
    /// Reformats the flat override into driver entries, appending the
    /// terminating sentinel. Panics if an entry names a group or a sentinel.
    #[must_use]
    pub fn to_entries(&self) -> Vec<StrategyEntry> {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        for entry in &self.entries {
            assert!(
                !entry.id.is_group() && !entry.id.is_sentinel(),
                "custom strategies are flat, {} is not a concrete pass",
                entry.id.name()
            );
            let condition = if entry.must_be_done {
                Condition::MustBeDone
            } else {
                Condition::Always
            };
            entries.push(StrategyEntry::new(entry.id, condition));
        }
        entries.push(StrategyEntry::END_OPTS);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_table(table: &[StrategyEntry], sentinel: OptId) {
        // exactly one sentinel, and it is the final entry
        let sentinels = table.iter().filter(|e| e.id.is_sentinel()).count();
        assert_eq!(sentinels, 1);
        assert_eq!(table.last().map(|e| e.id), Some(sentinel));
        for entry in &table[..table.len() - 1] {
            assert!(!entry.id.is_sentinel());
        }
    }

    #[test]
    fn test_strategies_are_well_formed() {
        for strategy in [NO_OPT_STRATEGY, COLD_STRATEGY, WARM_STRATEGY, HOT_STRATEGY, ILGEN_STRATEGY]
        {
            check_table(strategy, OptId::EndOpts);
        }
        for id in OptId::ALL {
            if id.is_group() {
                check_table(group_table(id), OptId::EndGroup);
            }
        }
    }

    #[test]
    fn test_no_opt_strategy_is_empty() {
        assert_eq!(NO_OPT_STRATEGY.len(), 1);
        assert_eq!(NO_OPT_STRATEGY[0].id, OptId::EndOpts);
    }

    #[test]
    fn test_custom_strategy_reformatting() {
        let custom = CustomStrategy {
            entries: vec![
                CustomStrategyEntry {
                    id: OptId::LocalCse,
                    must_be_done: true,
                },
                CustomStrategyEntry {
                    id: OptId::TreeSimplification,
                    must_be_done: false,
                },
            ],
        };
        let entries = custom.to_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].condition, Condition::MustBeDone);
        assert_eq!(entries[1].condition, Condition::Always);
        assert_eq!(entries[2].id, OptId::EndOpts);
    }

    #[test]
    #[should_panic(expected = "custom strategies are flat")]
    fn test_custom_strategy_rejects_groups() {
        let custom = CustomStrategy {
            entries: vec![CustomStrategyEntry {
                id: OptId::LateLocalGroup,
                must_be_done: false,
            }],
        };
        custom.to_entries();
    }

    #[test]
    fn test_custom_strategy_deserializes() {
        let custom: CustomStrategy = toml::from_str(
            r#"
            [[entries]]
            id = "LocalCse"
            must_be_done = true

            [[entries]]
            id = "DeadTreesElimination"
            "#,
        )
        .unwrap();
        assert_eq!(custom.entries.len(), 2);
        assert!(custom.entries[0].must_be_done);
        assert!(!custom.entries[1].must_be_done);
    }
}
