//! Basic-block extension: merges a block with its sole successor when that
//! successor has no other predecessor, producing longer straight-line runs
//! for the local passes.

use opal_ir::{BlockId, OpCode};

use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::manager::PassFlags;
use crate::pass::{OptimizationPass, PassOutcome};

pub(crate) const FLAGS: PassFlags = PassFlags {
    does_not_require_alias_sets: true,
    ..PassFlags::none()
};

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(BasicBlockExtender)
}

struct BasicBlockExtender;

impl OptimizationPass for BasicBlockExtender {
    fn should_perform(&self, comp: &Compilation, _cache: &AnalysisCache) -> bool {
        comp.cfg.has_more_than_one_block()
    }

    fn perform(&mut self, comp: &mut Compilation, cache: &mut AnalysisCache) -> PassOutcome {
        let mut merges = 0;
        loop {
            let Some((block, succ)) = find_merge_candidate(comp) else {
                break;
            };
            merge_into(comp, cache, block, succ);
            merges += 1;
        }
        if merges > 0 {
            comp.cfg.set_might_have_unreachable_blocks(true);
            comp.cfg.set_structure(None);
        }
        PassOutcome::with_cost(merges)
    }
}

fn find_merge_candidate(comp: &Compilation) -> Option<(BlockId, BlockId)> {
    for block in comp.cfg.live_block_ids() {
        let b = comp.cfg.block(block);
        if b.successors.len() != 1 {
            continue;
        }
        let succ = b.successors[0];
        if succ == block || succ == comp.cfg.entry() {
            continue;
        }
        let s = comp.cfg.block(succ);
        if s.is_removed() || s.predecessors.len() != 1 {
            continue;
        }
        return Some((block, succ));
    }
    None
}

fn merge_into(comp: &mut Compilation, cache: &mut AnalysisCache, block: BlockId, succ: BlockId) {
    // drop the now-pointless fall-through goto
    let trailing_goto = comp
        .cfg
        .block(block)
        .trees
        .last()
        .copied()
        .filter(|&t| comp.pool.node(t).op == OpCode::Goto);
    if let Some(goto) = trailing_goto {
        comp.cfg.block_mut(block).trees.pop();
        cache.prepare_for_node_removal(goto);
        comp.pool.release(goto);
    }

    let moved = std::mem::take(&mut comp.cfg.block_mut(succ).trees);
    comp.cfg.block_mut(block).trees.extend(moved);

    let new_successors = std::mem::take(&mut comp.cfg.block_mut(succ).successors);
    comp.cfg.block_mut(succ).predecessors.clear();
    for &next in &new_successors {
        for pred in &mut comp.cfg.block_mut(next).predecessors {
            if *pred == succ {
                *pred = block;
            }
        }
    }
    comp.cfg.block_mut(block).successors = new_successors;
}
