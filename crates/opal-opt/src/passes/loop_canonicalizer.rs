//! Loop canonicalization: rewrites loops with multiple back edges so each
//! header has a single latch, which the loop-sensitive passes rely on.

use crate::analysis::structure::change_continue_loops_to_nested_loops;
use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::ids::OptId;
use crate::manager::PassFlags;
use crate::pass::{OptRequest, OptimizationPass, PassOutcome};

pub(crate) const FLAGS: PassFlags = PassFlags {
    requires_structure: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(LoopCanonicalizer)
}

struct LoopCanonicalizer;

impl OptimizationPass for LoopCanonicalizer {
    fn should_perform(&self, comp: &Compilation, _cache: &AnalysisCache) -> bool {
        comp.method.may_have_loops && !comp.disable_loop_opts_that_can_create_loops()
    }

    fn perform(&mut self, comp: &mut Compilation, _cache: &mut AnalysisCache) -> PassOutcome {
        let changed = change_continue_loops_to_nested_loops(comp);
        if changed == 0 {
            return PassOutcome::unchanged();
        }
        // the rewrite introduces merge blocks and fresh gotos worth cleaning
        PassOutcome::with_cost(changed as i32)
            .request(OptRequest::AllLocalOpts)
            .request(OptRequest::Opt(OptId::RedundantGotoElimination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::value_number::VnBuildType;
    use opal_core::CompileOptions;
    use opal_ir::MethodInfo;

    #[test]
    fn test_canonical_loop_reports_no_change() {
        let mut method = MethodInfo::new("m");
        method.may_have_loops = true;
        let mut comp = Compilation::new(method, CompileOptions::default());
        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        let entry = comp.cfg.entry();
        let head = comp.cfg.add_block();
        comp.cfg.add_edge(entry, head);
        comp.cfg.add_edge(head, head);
        let around = comp.pool.create_goto(head);
        comp.cfg.block_mut(head).trees.push(around);

        let outcome = LoopCanonicalizer.perform(&mut comp, &mut cache);
        assert_eq!(outcome.cost, 0);
        assert!(outcome.requests.is_empty());
    }

    #[test]
    fn test_continue_loop_requests_cleanup() {
        let mut method = MethodInfo::new("m");
        method.may_have_loops = true;
        let mut comp = Compilation::new(method, CompileOptions::default());
        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        let entry = comp.cfg.entry();
        let head = comp.cfg.add_block();
        let body = comp.cfg.add_block();
        comp.cfg.add_edge(entry, head);
        comp.cfg.add_edge(head, body);
        comp.cfg.add_edge(head, head);
        comp.cfg.add_edge(body, head);
        let back_head = comp.pool.create_goto(head);
        comp.cfg.block_mut(head).trees.push(back_head);
        let back_body = comp.pool.create_goto(head);
        comp.cfg.block_mut(body).trees.push(back_body);

        let outcome = LoopCanonicalizer.perform(&mut comp, &mut cache);
        assert_eq!(outcome.cost, 1);
        assert!(outcome.requests.contains(&OptRequest::AllLocalOpts));
        assert!(outcome
            .requests
            .contains(&OptRequest::Opt(OptId::RedundantGotoElimination)));
        assert!(comp.cfg.structure().is_none());
    }

    #[test]
    fn test_disabled_when_loop_creation_is_barred() {
        let mut method = MethodInfo::new("m");
        method.may_have_loops = true;
        let mut comp = Compilation::new(method, CompileOptions::default());
        comp.set_disable_loop_opts_that_can_create_loops(true);
        let cache = AnalysisCache::new(VnBuildType::Hash);
        assert!(!LoopCanonicalizer.should_perform(&comp, &cache));
    }
}
