//! Redundant-goto elimination: retargets branches that land on blocks whose
//! only content is another goto, shortening control-flow chains.

use opal_ir::{BlockId, NodeId, NodePayload, OpCode};

use crate::cache::AnalysisCache;
use crate::compilation::Compilation;
use crate::manager::PassFlags;
use crate::pass::{OptimizationPass, PassOutcome};

pub(crate) const FLAGS: PassFlags = PassFlags {
    does_not_require_alias_sets: true,
    ..PassFlags::none()
};

// chains longer than this are almost certainly a cycle of empty blocks
const MAX_GOTO_CHAIN: usize = 16;

pub(crate) fn create() -> Box<dyn OptimizationPass> {
    Box::new(RedundantGotoEliminator)
}

struct RedundantGotoEliminator;

impl OptimizationPass for RedundantGotoEliminator {
    fn should_perform(&self, comp: &Compilation, _cache: &AnalysisCache) -> bool {
        comp.cfg.has_more_than_one_block()
    }

    fn perform(&mut self, comp: &mut Compilation, _cache: &mut AnalysisCache) -> PassOutcome {
        let mut retargets: Vec<(BlockId, NodeId, usize, BlockId, BlockId)> = Vec::new();
        for block in comp.cfg.live_block_ids() {
            for &root in &comp.cfg.block(block).trees {
                let node = comp.pool.node(root);
                let targets: Vec<BlockId> = match &node.payload {
                    NodePayload::Branch(t) => vec![*t],
                    NodePayload::Cases(ts) => ts.clone(),
                    _ => continue,
                };
                for (case, target) in targets.into_iter().enumerate() {
                    let resolved = resolve_chain(comp, target);
                    if resolved != target {
                        retargets.push((block, root, case, target, resolved));
                    }
                }
            }
        }

        let cost = retargets.len() as i32;
        for (block, root, case, old, new) in retargets {
            match &mut comp.pool.node_mut(root).payload {
                NodePayload::Branch(t) => *t = new,
                NodePayload::Cases(ts) => ts[case] = new,
                _ => {}
            }
            let b = comp.cfg.block_mut(block);
            for succ in &mut b.successors {
                if *succ == old {
                    *succ = new;
                }
            }
            comp.cfg.block_mut(block).successors.dedup();
            let preds = &mut comp.cfg.block_mut(old).predecessors;
            if let Some(pos) = preds.iter().position(|&p| p == block) {
                preds.remove(pos);
            }
            let new_preds = &mut comp.cfg.block_mut(new).predecessors;
            if !new_preds.contains(&block) {
                new_preds.push(block);
            }
        }

        if cost > 0 {
            comp.cfg.set_might_have_unreachable_blocks(true);
            comp.cfg.set_structure(None);
        }
        PassOutcome::with_cost(cost)
    }
}

/// Follows `target` through blocks that consist of a single goto, stopping at
/// the first block with real content or when the chain cap is hit.
fn resolve_chain(comp: &Compilation, mut target: BlockId) -> BlockId {
    for _ in 0..MAX_GOTO_CHAIN {
        let block = comp.cfg.block(target);
        if block.is_removed() || block.trees.len() != 1 {
            break;
        }
        let only = comp.pool.node(block.trees[0]);
        if only.op != OpCode::Goto {
            break;
        }
        match only.branch_target() {
            Some(next) if next != target => target = next,
            _ => break,
        }
    }
    target
}
