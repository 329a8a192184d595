//! The pipeline driver.
//!
//! One `Optimizer` owns one strategy walk over one compilation: it holds the
//! per-driver registry of optimization managers and the analysis cache, runs
//! each strategy entry through the condition gates and the index-range
//! filter, builds the analyses each pass declares in its flags, and performs
//! the invalidation bookkeeping after every pass.

use opal_core::{Error, Hotness, Result};

use crate::cache::{
    ALIAS_SETS_COST, AnalysisCache, STRUCTURE_COST, USE_DEF_COST, VALUE_NUMBER_COST,
};
use crate::analysis::structure::build_structure;
use crate::analysis::use_def::UseDefInfo;
use crate::analysis::value_number::{ValueNumberInfo, VnBuildType};
use crate::compilation::{AnalysisPhase, Compilation, VISIT_HIGH_WATER};
use crate::ids::OptId;
use crate::manager::{ManagerKind, OptimizationManager, PassFlags, Requirement};
use crate::pass::OptRequest;
use crate::passes;
use crate::strategy::{
    Condition, CustomStrategy, ILGEN_STRATEGY, StrategyEntry, group_table, strategy_for_hotness,
};

/// Iteration cap for the fixed-point local-analysis group.
pub const MAX_LOCAL_OPTS_ITERS: usize = 5;

pub const HIGH_BASIC_BLOCK_COUNT: usize = 2500;
pub const HIGH_LOOP_COUNT: usize = 60;
pub const VERY_HOT_HIGH_LOOP_COUNT: usize = 200;
/// Within this many loops of the limit, loop-creating transformations are
/// switched off.
const LOOP_SLACK: usize = 25;

/// Drives one strategy over one compilation.
pub struct Optimizer<'a> {
    comp: &'a mut Compilation,
    /// Registry indexed by `OptId::index()`; the sentinel slots stay empty.
    managers: Vec<Option<OptimizationManager>>,
    cache: AnalysisCache,
    strategy: Vec<StrategyEntry>,
    ilgen: bool,
}

impl<'a> Optimizer<'a> {
    /// Driver for the tier-selected default strategy.
    #[must_use]
    pub fn new(comp: &'a mut Compilation) -> Self {
        let strategy = strategy_for_hotness(comp.options.hotness).to_vec();
        Self::with_strategy(comp, strategy, false)
    }

    /// Driver for a caller-supplied flat strategy override.
    #[must_use]
    pub fn with_custom_strategy(comp: &'a mut Compilation, custom: &CustomStrategy) -> Self {
        let strategy = custom.to_entries();
        Self::with_strategy(comp, strategy, false)
    }

    /// Driver running during IL generation. Panics if any reachable pass does
    /// not support the ilgen opt level.
    #[must_use]
    pub fn for_ilgen(comp: &'a mut Compilation) -> Self {
        Self::with_strategy(comp, ILGEN_STRATEGY.to_vec(), true)
    }

    fn with_strategy(comp: &'a mut Compilation, strategy: Vec<StrategyEntry>, ilgen: bool) -> Self {
        let vn_build_type = if comp.options.hotness >= Hotness::VeryHot {
            VnBuildType::PrePartition
        } else {
            VnBuildType::Hash
        };
        let optimizer = Self {
            comp,
            managers: build_managers(),
            cache: AnalysisCache::new(vn_build_type),
            strategy,
            ilgen,
        };
        if optimizer.ilgen {
            optimizer.validate_ilgen_strategy(&optimizer.strategy);
        }
        optimizer
    }

    /// The manager registered for `id`. Panics on a sentinel; asking for a
    /// sentinel's manager is a defect in the calling code.
    #[must_use]
    pub fn manager(&self, id: OptId) -> &OptimizationManager {
        self.managers[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("no optimization manager registered for {}", id.name()))
    }

    pub fn manager_mut(&mut self, id: OptId) -> &mut OptimizationManager {
        self.managers[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("no optimization manager registered for {}", id.name()))
    }

    #[must_use]
    pub fn analysis_cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Requests every local pass and both local groups.
    pub fn enable_all_local_opts(&mut self) {
        for id in [
            OptId::TreeSimplification,
            OptId::LocalValuePropagation,
            OptId::LocalCse,
            OptId::LocalDeadStoreElimination,
            OptId::DeadTreesElimination,
            OptId::EachLocalAnalysisPassGroup,
            OptId::LocalValuePropagationGroup,
        ] {
            self.manager_mut(id).requested = true;
        }
    }

    /// Runs the strategy to completion and returns the accumulated cost.
    pub fn optimize(&mut self) -> Result<i32> {
        self.comp.enter_driver();
        let result = self.run_strategy();
        self.comp.leave_driver();
        result
    }

    fn run_strategy(&mut self) -> Result<i32> {
        let entries = self.strategy.clone();
        let mut cost = 0;
        for entry in &entries {
            if entry.id == OptId::EndOpts {
                break;
            }
            cost += self.perform_optimization(entry, 0)?;
        }
        self.check_deterministic_recompilation()?;
        Ok(cost)
    }

    fn perform_optimization(&mut self, entry: &StrategyEntry, opt_depth: usize) -> Result<i32> {
        let cost = if entry.id.is_group() {
            self.perform_group(entry, opt_depth)?
        } else {
            self.perform_concrete(entry, opt_depth)?
        };
        // orthogonal to whether the entry actually executed
        if entry.marks_last_run {
            self.manager_mut(entry.id).last_run = true;
        }
        Ok(cost)
    }

    fn perform_group(&mut self, entry: &StrategyEntry, opt_depth: usize) -> Result<i32> {
        let manager = self.manager(entry.id);
        let run = manager.enabled && entry.condition.evaluate(manager, self.comp);
        if !run {
            return Ok(0);
        }
        assert!(
            !manager.last_run,
            "{} scheduled after its final permitted run",
            manager.name()
        );
        self.manager_mut(entry.id).clear_requests();

        let table = group_table(entry.id);
        let fixed_point = entry.id == OptId::EachLocalAnalysisPassGroup;
        let mut cost = 0;
        let mut iterations = 0;
        loop {
            iterations += 1;
            for child in table {
                if child.id == OptId::EndGroup {
                    break;
                }
                cost += self.perform_optimization(child, opt_depth + 1)?;
            }
            if !fixed_point || iterations >= MAX_LOCAL_OPTS_ITERS {
                break;
            }
            let rerun = table.iter().any(|child| {
                if child.id == OptId::EndGroup {
                    return false;
                }
                let manager = self.manager(child.id);
                manager.requested || manager.has_requested_blocks()
            });
            if !rerun {
                break;
            }
        }
        Ok(cost)
    }

    fn perform_concrete(&mut self, entry: &StrategyEntry, opt_depth: usize) -> Result<i32> {
        let id = entry.id;
        // every concrete entry consumes an ordinal, executed or not, so
        // index-range filtering stays stable across option changes
        let opt_index = self.comp.bump_opt_index();

        let manager = self.manager(id);
        let name = manager.name();
        let flags = manager.flags();
        let full = manager.enabled && entry.condition.evaluate(manager, self.comp);
        // pending block requests only fire through a requesting condition;
        // any other false predicate leaves them queued
        let blocks_only = !full
            && entry.condition.requires_request()
            && flags.supports_block_granularity
            && manager.has_requested_blocks();
        if !full && !blocks_only {
            return Ok(0);
        }
        assert!(
            !manager.last_run,
            "{name} scheduled after its final permitted run"
        );
        let previous_trace = manager.trace;

        if entry.condition != Condition::MustBeDone
            && (opt_index < self.comp.options.first_opt_index
                || opt_index > self.comp.options.last_opt_index)
        {
            return Ok(0);
        }
        if self.comp.options.is_disabled(name, opt_index) {
            return Ok(0);
        }
        let trace = previous_trace || self.comp.options.should_trace(name, opt_index);
        self.manager_mut(id).trace = trace;

        let mut cost = self.ensure_analyses(flags)?;

        let factory = match self.manager(id).kind() {
            ManagerKind::Pass(factory) => *factory,
            ManagerKind::Group(_) => panic!("{name} is not a concrete pass"),
        };
        let mut pass = factory();
        if !pass.should_perform(self.comp, &self.cache) {
            self.manager_mut(id).trace = previous_trace;
            return Ok(cost);
        }

        if trace {
            self.comp.dump_opt_details(format!(
                "{:indent$}<optimization #{opt_index} {name}>",
                "",
                indent = opt_depth * 2
            ));
        }
        let nodes_before = self.comp.pool.total_node_count();
        let symrefs_before = self.comp.symrefs.len();

        let mut requests = Vec::new();
        if full {
            // a full run subsumes any pending requests
            self.manager_mut(id).clear_requests();
            pass.pre_perform(self.comp, &mut self.cache);
            let outcome = pass.perform(self.comp, &mut self.cache);
            cost += outcome.cost;
            requests = outcome.requests;
            pass.post_perform(self.comp, &mut self.cache);
        } else {
            let blocks = self.manager_mut(id).take_requested_blocks();
            pass.pre_perform_on_blocks(self.comp, &mut self.cache);
            for block in blocks {
                let outcome = pass.perform_on_block(self.comp, &mut self.cache, block);
                cost += outcome.cost;
                requests.extend(outcome.requests);
            }
            pass.post_perform_on_blocks(self.comp, &mut self.cache);
        }
        if trace {
            self.comp
                .dump_opt_details(format!("{:indent$}</optimization>", "", indent = opt_depth * 2));
        }
        self.manager_mut(id).trace = previous_trace;

        if self.comp.pool.total_node_count() > nodes_before {
            self.cache.set_value_number(None, self.comp);
            if !flags.maintains_use_def_info {
                self.cache.set_use_def(None, self.comp);
            }
        }
        if self.comp.symrefs.len() != symrefs_before {
            self.cache.invalidate_sym_references();
            self.cache.invalidate_alias_sets(self.comp);
        }
        if self.comp.pool.take_removed_dead_nodes() {
            self.cache.set_value_number(None, self.comp);
        }
        if self.comp.visit_epoch() >= VISIT_HIGH_WATER
            || self.comp.pool.max_visit_count() >= VISIT_HIGH_WATER
        {
            self.comp.reset_visit_epochs();
        }
        if self.comp.cfg.might_have_unreachable_blocks()
            && self.comp.cfg.remove_unreachable_blocks() > 0
        {
            self.cache.set_use_def(None, self.comp);
            self.cache.set_value_number(None, self.comp);
            self.comp.cfg.set_structure(None);
        }
        for request in requests {
            self.apply_request(request);
        }

        if self.comp.is_interrupted() {
            return Err(Error::Interrupted(
                "interrupted between optimizations".into(),
            ));
        }
        Ok(cost)
    }

    /// Builds whatever the pass's flags declare and is not already cached,
    /// charging the analysis costs.
    fn ensure_analyses(&mut self, flags: PassFlags) -> Result<i32> {
        let mut cost = 0;
        if !flags.does_not_require_alias_sets && !self.cache.alias_sets_valid() {
            self.comp.mark_analysis_phase(AnalysisPhase::AliasAnalysis);
            self.cache.rebuild_alias_sets(&self.comp.symrefs);
            cost += ALIAS_SETS_COST;
        }
        // use-def and value numbering imply structure
        if flags.requires_structure
            || flags.use_def != Requirement::None
            || flags.value_numbering != Requirement::None
        {
            cost += self.ensure_structure()?;
        }
        if flags.use_def != Requirement::None {
            cost += self.ensure_use_def(flags);
        }
        if flags.value_numbering != Requirement::None {
            cost += self.ensure_value_number();
        }
        Ok(cost)
    }

    fn ensure_structure(&mut self) -> Result<i32> {
        if self.comp.cfg.structure().is_some() {
            return Ok(0);
        }
        self.comp
            .mark_analysis_phase(AnalysisPhase::StructuralAnalysis);
        let structure = build_structure(&self.comp.cfg);
        let blocks = self.comp.cfg.live_block_count();
        let loops = structure.loop_count();
        self.comp.set_num_loops_in_method(loops);
        self.comp.cfg.set_structure(Some(structure));
        // checked on every rebuild, not just the first
        self.check_complexity(blocks, loops)?;
        Ok(STRUCTURE_COST)
    }

    fn check_complexity(&mut self, blocks: usize, loops: usize) -> Result<()> {
        let hotness = self.comp.options.hotness;
        let mut block_limit = HIGH_BASIC_BLOCK_COUNT;
        let mut loop_limit = if hotness >= Hotness::VeryHot {
            VERY_HOT_HIGH_LOOP_COUNT
        } else {
            HIGH_LOOP_COUNT
        };
        if self.comp.options.opt_server {
            block_limit *= 2;
            loop_limit *= 2;
        }
        if self.comp.options.process_huge_methods {
            return Ok(());
        }
        if blocks > block_limit || loops > loop_limit {
            return Err(Error::ExcessiveComplexity { blocks, loops });
        }
        if loops + LOOP_SLACK > loop_limit {
            self.comp.set_disable_loop_opts_that_can_create_loops(true);
        }
        Ok(())
    }

    /// Strongest-form use-def maintenance: a cached instance satisfies any
    /// pass it is at least as strong as; a rebuild never downgrades a cached
    /// global instance to local.
    fn ensure_use_def(&mut self, flags: PassFlags) -> i32 {
        if let Some(cached) = self.cache.use_def() {
            let strength_ok = flags.use_def != Requirement::Global || cached.is_global();
            let shape_ok = (!flags.requires_loads_as_defs || cached.loads_as_defs())
                && (!flags.does_not_require_loads_as_defs || !cached.loads_as_defs());
            if strength_ok && shape_ok {
                return 0;
            }
        }
        if self.cache.cant_build_use_def() {
            return 0;
        }
        self.comp.mark_analysis_phase(AnalysisPhase::UseDefAnalysis);
        let cached_global = self.cache.use_def().is_some_and(UseDefInfo::is_global);
        let global = cached_global
            || matches!(
                flags.use_def,
                Requirement::Global | Requirement::PrefersGlobal
            );
        let loads_as_defs = flags.requires_loads_as_defs;
        let mut info = UseDefInfo::build(self.comp, global, loads_as_defs);
        if info.is_none() && global && flags.use_def == Requirement::PrefersGlobal && !cached_global
        {
            info = UseDefInfo::build(self.comp, false, loads_as_defs);
        }
        if info.is_none() {
            self.cache.set_cant_build_use_def(true);
            self.comp.dump_opt_details("use-def info could not be built");
        }
        self.cache.set_use_def(info, self.comp);
        USE_DEF_COST
    }

    fn ensure_value_number(&mut self) -> i32 {
        if self.cache.value_number().is_some() || self.cache.cant_build_value_number() {
            return 0;
        }
        self.comp.mark_analysis_phase(AnalysisPhase::ValueNumbering);
        let info = ValueNumberInfo::build(self.comp, self.cache.vn_build_type());
        if info.is_none() {
            self.cache.set_cant_build_value_number(true);
            self.comp
                .dump_opt_details("value-number info could not be built");
        }
        self.cache.set_value_number(info, self.comp);
        VALUE_NUMBER_COST
    }

    fn apply_request(&mut self, request: OptRequest) {
        match request {
            OptRequest::Opt(id) => self.manager_mut(id).requested = true,
            OptRequest::OptOnBlock(id, block) => self.manager_mut(id).request_block(block),
            OptRequest::AllLocalOpts => self.enable_all_local_opts(),
        }
    }

    fn check_deterministic_recompilation(&self) -> Result<()> {
        let options = &self.comp.options;
        if !options.deterministic_recompilation
            || options.hotness < Hotness::Cold
            || options.hotness >= Hotness::Scorching
        {
            return Ok(());
        }
        if let Some(inlined) = self.comp.max_inlined_hotness() {
            if inlined > options.hotness {
                return Err(Error::InsufficientlyAggressive { required: inlined });
            }
        }
        Ok(())
    }

    fn validate_ilgen_strategy(&self, entries: &[StrategyEntry]) {
        for entry in entries {
            if entry.id.is_sentinel() {
                break;
            }
            if entry.id.is_group() {
                self.validate_ilgen_strategy(group_table(entry.id));
            } else {
                assert!(
                    self.manager(entry.id).flags().supports_ilgen_opt_level,
                    "{} does not support the ilgen opt level",
                    entry.id.name()
                );
            }
        }
    }
}

fn build_managers() -> Vec<Option<OptimizationManager>> {
    OptId::ALL
        .into_iter()
        .map(|id| {
            if id.is_sentinel() {
                None
            } else if id.is_group() {
                Some(OptimizationManager::new_group(id, group_table(id)))
            } else {
                Some(OptimizationManager::new_pass(
                    id,
                    pass_flags(id),
                    pass_factory(id),
                ))
            }
        })
        .collect()
}

fn pass_flags(id: OptId) -> PassFlags {
    match id {
        OptId::TreeSimplification => passes::simplifier::FLAGS,
        OptId::LocalValuePropagation => passes::local_value_propagation::FLAGS,
        OptId::LocalCse => passes::local_cse::FLAGS,
        OptId::LocalDeadStoreElimination => passes::local_dead_store::FLAGS,
        OptId::DeadTreesElimination => passes::dead_trees::FLAGS,
        OptId::GlobalValuePropagation => passes::global_value_propagation::FLAGS,
        OptId::GlobalDeadStoreElimination => passes::global_dead_store::FLAGS,
        OptId::BasicBlockExtension => passes::block_extension::FLAGS,
        OptId::RedundantGotoElimination => passes::goto_elimination::FLAGS,
        OptId::LoopCanonicalization => passes::loop_canonicalizer::FLAGS,
        other => panic!("{} is not a concrete pass", other.name()),
    }
}

fn pass_factory(id: OptId) -> fn() -> Box<dyn crate::pass::OptimizationPass> {
    match id {
        OptId::TreeSimplification => passes::simplifier::create,
        OptId::LocalValuePropagation => passes::local_value_propagation::create,
        OptId::LocalCse => passes::local_cse::create,
        OptId::LocalDeadStoreElimination => passes::local_dead_store::create,
        OptId::DeadTreesElimination => passes::dead_trees::create,
        OptId::GlobalValuePropagation => passes::global_value_propagation::create,
        OptId::GlobalDeadStoreElimination => passes::global_dead_store::create,
        OptId::BasicBlockExtension => passes::block_extension::create,
        OptId::RedundantGotoElimination => passes::goto_elimination::create,
        OptId::LoopCanonicalization => passes::loop_canonicalizer::create,
        other => panic!("{} is not a concrete pass", other.name()),
    }
}
