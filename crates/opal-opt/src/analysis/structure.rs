//! Structural analysis: discovers the CFG's natural-loop forest, and the
//! loop-shape rewrite that turns continue edges into nested loops.

use std::collections::BTreeSet;

use opal_ir::{BlockId, Cfg, LoopRegion, NodeId, NodePayload, NodePool, Structure};

use crate::compilation::Compilation;

/// Builds the nested-loop forest of a CFG from its back edges.
#[must_use]
pub fn build_structure(cfg: &Cfg) -> Structure {
    let total = cfg.block_ids().count();
    // 0 unvisited, 1 on the DFS stack, 2 finished
    let mut state = vec![0u8; total];
    let mut stack: Vec<(BlockId, usize)> = vec![(cfg.entry(), 0)];
    state[cfg.entry().index()] = 1;
    let mut back_edges: Vec<(BlockId, BlockId)> = Vec::new();

    loop {
        let next = {
            let Some(top) = stack.last_mut() else { break };
            let block = top.0;
            let successor = cfg.block(block).successors.get(top.1).copied();
            top.1 += 1;
            (block, successor)
        };
        match next {
            (_, Some(s)) if cfg.block(s).is_removed() => {}
            (b, Some(s)) => match state[s.index()] {
                0 => {
                    state[s.index()] = 1;
                    stack.push((s, 0));
                }
                1 => back_edges.push((b, s)),
                _ => {}
            },
            (b, None) => {
                state[b.index()] = 2;
                stack.pop();
            }
        }
    }

    // merge back edges sharing a header into one natural loop
    let mut headers: Vec<BlockId> = Vec::new();
    let mut latches_by_header: Vec<Vec<BlockId>> = Vec::new();
    for (latch, header) in back_edges {
        match headers.iter().position(|&h| h == header) {
            Some(i) => latches_by_header[i].push(latch),
            None => {
                headers.push(header);
                latches_by_header.push(vec![latch]);
            }
        }
    }

    let mut loops: Vec<LoopRegion> = Vec::new();
    for (header, latches) in headers.into_iter().zip(latches_by_header) {
        let mut body: BTreeSet<BlockId> = BTreeSet::new();
        body.insert(header);
        let mut worklist: Vec<BlockId> = Vec::new();
        for latch in latches {
            if body.insert(latch) {
                worklist.push(latch);
            }
        }
        while let Some(b) = worklist.pop() {
            for &pred in &cfg.block(b).predecessors {
                if !cfg.block(pred).is_removed() && body.insert(pred) {
                    worklist.push(pred);
                }
            }
        }
        loops.push(LoopRegion {
            header,
            blocks: body.into_iter().collect(),
            depth: 1,
            parent: None,
        });
    }

    // nesting: the parent is the smallest strictly-enclosing loop
    loops.sort_by_key(|l| l.blocks.len());
    for i in 0..loops.len() {
        for j in 0..loops.len() {
            if i == j || loops[j].blocks.len() <= loops[i].blocks.len() {
                continue;
            }
            let encloses = loops[i].blocks.iter().all(|b| loops[j].blocks.contains(b));
            if encloses {
                loops[i].parent = Some(j);
                break;
            }
        }
    }
    for i in 0..loops.len() {
        let mut depth = 1;
        let mut parent = loops[i].parent;
        while let Some(p) = parent {
            depth += 1;
            parent = loops[p].parent;
        }
        loops[i].depth = depth;
    }

    Structure {
        loops,
        block_count: cfg.live_block_count(),
    }
}

/// Rewrites every loop with multiple latches so all back edges pass through
/// one fresh merge block, giving the loop a single canonical back edge.
/// Invalidates the CFG's cached structure when anything changed. Returns the
/// number of loops rewritten.
pub fn change_continue_loops_to_nested_loops(comp: &mut Compilation) -> usize {
    let structure = match comp.cfg.structure() {
        Some(s) => s.clone(),
        None => build_structure(&comp.cfg),
    };

    let mut changed = 0;
    for region in &structure.loops {
        let header = region.header;
        let latches: Vec<BlockId> = comp
            .cfg
            .block(header)
            .predecessors
            .iter()
            .copied()
            .filter(|p| region.blocks.contains(p))
            .collect();
        if latches.len() < 2 {
            continue;
        }

        let merge = comp.cfg.add_block();
        for &latch in &latches {
            let trees = comp.cfg.block(latch).trees.clone();
            for root in trees {
                retarget(&mut comp.pool, root, header, merge);
            }
            for successor in &mut comp.cfg.block_mut(latch).successors {
                if *successor == header {
                    *successor = merge;
                }
            }
            comp.cfg.block_mut(merge).predecessors.push(latch);
        }
        comp.cfg
            .block_mut(header)
            .predecessors
            .retain(|p| !latches.contains(p));
        let goto = comp.pool.create_goto(header);
        comp.cfg.block_mut(merge).trees.push(goto);
        comp.cfg.add_edge(merge, header);
        changed += 1;
    }

    if changed > 0 {
        comp.cfg.set_structure(None);
    }
    changed
}

fn retarget(pool: &mut NodePool, root: NodeId, from: BlockId, to: BlockId) {
    let children = pool.node(root).children.clone();
    for child in children {
        retarget(pool, child, from, to);
    }
    match &mut pool.node_mut(root).payload {
        NodePayload::Branch(target) if *target == from => *target = to,
        NodePayload::Cases(targets) => {
            for target in targets {
                if *target == from {
                    *target = to;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::CompileOptions;
    use opal_ir::MethodInfo;

    fn comp() -> Compilation {
        Compilation::new(MethodInfo::new("m"), CompileOptions::default())
    }

    /// entry -> head -> body -> head, entry -> head, head -> exit
    fn single_loop(comp: &mut Compilation) -> (BlockId, BlockId) {
        let entry = comp.cfg.entry();
        let head = comp.cfg.add_block();
        let body = comp.cfg.add_block();
        let exit = comp.cfg.add_block();
        comp.cfg.add_edge(entry, head);
        comp.cfg.add_edge(head, body);
        comp.cfg.add_edge(body, head);
        comp.cfg.add_edge(head, exit);
        (head, body)
    }

    #[test]
    fn test_single_loop_is_discovered() {
        let mut comp = comp();
        let (head, body) = single_loop(&mut comp);
        let structure = build_structure(&comp.cfg);
        assert_eq!(structure.loop_count(), 1);
        assert_eq!(structure.loops[0].header, head);
        assert!(structure.loops[0].blocks.contains(&body));
        assert_eq!(structure.max_nesting_depth(), 1);
    }

    #[test]
    fn test_nested_loops_have_depth() {
        let mut comp = comp();
        let entry = comp.cfg.entry();
        let outer = comp.cfg.add_block();
        let inner = comp.cfg.add_block();
        let inner_body = comp.cfg.add_block();
        comp.cfg.add_edge(entry, outer);
        comp.cfg.add_edge(outer, inner);
        comp.cfg.add_edge(inner, inner_body);
        comp.cfg.add_edge(inner_body, inner);
        comp.cfg.add_edge(inner_body, outer);

        let structure = build_structure(&comp.cfg);
        assert_eq!(structure.loop_count(), 2);
        assert_eq!(structure.max_nesting_depth(), 2);
        let innermost = structure
            .loops
            .iter()
            .find(|l| l.header == inner)
            .unwrap();
        assert_eq!(innermost.depth, 2);
        assert!(innermost.parent.is_some());
    }

    #[test]
    fn test_continue_edges_become_one_back_edge() {
        let mut comp = comp();
        let entry = comp.cfg.entry();
        let head = comp.cfg.add_block();
        let a = comp.cfg.add_block();
        let b = comp.cfg.add_block();
        comp.cfg.add_edge(entry, head);
        comp.cfg.add_edge(head, a);
        comp.cfg.add_edge(head, b);
        comp.cfg.add_edge(a, head);
        comp.cfg.add_edge(b, head);
        let goto = comp.pool.create_goto(head);
        comp.cfg.block_mut(a).trees.push(goto);
        comp.cfg.set_structure(Some(build_structure(&comp.cfg)));

        let changed = change_continue_loops_to_nested_loops(&mut comp);
        assert_eq!(changed, 1);
        assert!(comp.cfg.structure().is_none());

        // exactly one latch now: the fresh merge block
        let latches: Vec<_> = comp.cfg.block(head).predecessors.iter().copied().collect();
        assert_eq!(latches.len(), 2); // entry plus the merge block
        assert!(!latches.contains(&a));
        assert!(!latches.contains(&b));
        assert_eq!(comp.pool.node(goto).branch_target(), Some(latches[1]));
    }
}
