//! Use-def information: which stores reach each load.
//!
//! Built at local (per-block) or global (whole-method, iterative reaching
//! definitions) precision, optionally treating loads as defining occurrences.
//! Construction is best-effort: a method whose def/use population exceeds the
//! build limit yields no info, and requesting passes run without it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use opal_ir::{BlockId, NodeId, OpCode, SymRefId};

use crate::analysis::block_nodes;
use crate::compilation::Compilation;

/// Bail out of construction above this many def/use sites.
const MAX_USE_DEF_NODES: usize = 90_000;

type DefState = BTreeMap<SymRefId, BTreeSet<NodeId>>;

pub struct UseDefInfo {
    global: bool,
    loads_as_defs: bool,
    defs: HashMap<NodeId, Vec<NodeId>>,
    uses: HashMap<NodeId, Vec<NodeId>>,
}

impl UseDefInfo {
    /// Builds use-def chains, or `None` when construction determines its own
    /// result would be invalid.
    #[must_use]
    pub fn build(comp: &Compilation, global: bool, loads_as_defs: bool) -> Option<Self> {
        let pool = &comp.pool;
        let blocks: Vec<BlockId> = comp.cfg.live_block_ids().collect();
        let per_block: Vec<(BlockId, Vec<NodeId>)> = blocks
            .iter()
            .map(|&b| (b, block_nodes(pool, comp.cfg.block(b))))
            .collect();

        let sites = per_block
            .iter()
            .flat_map(|(_, nodes)| nodes)
            .filter(|&&n| {
                let op = pool.node(n).op;
                op.is_load() || op.is_store()
            })
            .count();
        if sites > MAX_USE_DEF_NODES {
            return None;
        }

        // Global precision: iterate block entry states to a fixed point.
        let mut entry_states: HashMap<BlockId, DefState> = HashMap::new();
        if global {
            loop {
                let mut changed = false;
                for (b, _) in &per_block {
                    let state = merged_predecessor_state(comp, &entry_states, *b, loads_as_defs);
                    if entry_states.get(b) != Some(&state) {
                        entry_states.insert(*b, state);
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }
        }

        let mut defs: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (b, nodes) in &per_block {
            let mut state = if global {
                entry_states.get(b).cloned().unwrap_or_default()
            } else {
                DefState::new()
            };
            for &n in nodes {
                let node = pool.node(n);
                if node.op.is_load() {
                    if let Some(sr) = node.symref {
                        let reaching: Vec<NodeId> = state
                            .get(&sr)
                            .map(|s| s.iter().copied().collect())
                            .unwrap_or_default();
                        defs.insert(n, reaching);
                    }
                }
                apply(comp, &mut state, n, loads_as_defs);
            }
        }

        let mut uses: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (&use_node, reaching) in &defs {
            for &def_node in reaching {
                uses.entry(def_node).or_default().push(use_node);
            }
        }
        for list in uses.values_mut() {
            list.sort_unstable();
        }

        Some(Self {
            global,
            loads_as_defs,
            defs,
            uses,
        })
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.global
    }

    #[must_use]
    pub fn loads_as_defs(&self) -> bool {
        self.loads_as_defs
    }

    /// Defining occurrences reaching this use. Empty when nothing reaches,
    /// or when the state was clobbered by an opaque call.
    #[must_use]
    pub fn defs_for(&self, node: NodeId) -> &[NodeId] {
        self.defs.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Uses reached by this defining occurrence.
    #[must_use]
    pub fn uses_of(&self, node: NodeId) -> &[NodeId] {
        self.uses.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Scrubs a node about to be deleted out of the chains.
    pub fn remove_node(&mut self, node: NodeId) {
        self.defs.remove(&node);
        self.uses.remove(&node);
        for list in self.defs.values_mut() {
            list.retain(|&n| n != node);
        }
        for list in self.uses.values_mut() {
            list.retain(|&n| n != node);
        }
    }
}

/// Transfer function for one node in evaluation order.
fn apply(comp: &Compilation, state: &mut DefState, n: NodeId, loads_as_defs: bool) {
    let node = comp.pool.node(n);
    match node.op {
        OpCode::Store => {
            if let Some(sr) = node.symref {
                let set = state.entry(sr).or_default();
                set.clear();
                set.insert(n);
            }
        }
        OpCode::Load if loads_as_defs => {
            if let Some(sr) = node.symref {
                state.entry(sr).or_default().insert(n);
            }
        }
        // An opaque call may redefine anything it can reach.
        OpCode::Call if !node.is_pure_call => state.clear(),
        _ => {}
    }
}

/// Union of the predecessors' exit states, each recomputed by replaying the
/// predecessor's transfer over its current entry state.
fn merged_predecessor_state(
    comp: &Compilation,
    entry_states: &HashMap<BlockId, DefState>,
    block: BlockId,
    loads_as_defs: bool,
) -> DefState {
    let mut merged = DefState::new();
    for &pred in &comp.cfg.block(block).predecessors {
        let mut state = entry_states.get(&pred).cloned().unwrap_or_default();
        for &n in &block_nodes(&comp.pool, comp.cfg.block(pred)) {
            apply(comp, &mut state, n, loads_as_defs);
        }
        for (sr, nodes) in state {
            merged.entry(sr).or_default().extend(nodes);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::CompileOptions;
    use opal_ir::{ConstValue, MethodInfo};

    fn comp() -> Compilation {
        Compilation::new(MethodInfo::new("m"), CompileOptions::default())
    }

    #[test]
    fn test_local_chains_within_block() {
        let mut comp = comp();
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let one = comp.pool.create_const(ConstValue::Int32(1));
        let store = comp.pool.create_store(sr, one);
        let load = comp.pool.create_load(sr);
        let top = comp.pool.create_treetop(load);
        comp.cfg.block_mut(entry).trees.extend([store, top]);

        let info = UseDefInfo::build(&comp, false, false).unwrap();
        assert_eq!(info.defs_for(load), &[store]);
        assert_eq!(info.uses_of(store), &[load]);
    }

    #[test]
    fn test_global_chains_cross_blocks() {
        let mut comp = comp();
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let next = comp.cfg.add_block();
        comp.cfg.add_edge(entry, next);

        let one = comp.pool.create_const(ConstValue::Int32(1));
        let store = comp.pool.create_store(sr, one);
        comp.cfg.block_mut(entry).trees.push(store);
        let load = comp.pool.create_load(sr);
        let top = comp.pool.create_treetop(load);
        comp.cfg.block_mut(next).trees.push(top);

        let local = UseDefInfo::build(&comp, false, false).unwrap();
        assert!(local.defs_for(load).is_empty());

        let global = UseDefInfo::build(&comp, true, false).unwrap();
        assert_eq!(global.defs_for(load), &[store]);
    }

    #[test]
    fn test_opaque_call_clobbers_reaching_defs() {
        let mut comp = comp();
        let sr = comp.symrefs.create_named("x");
        let callee = comp.symrefs.create_named("callee");
        let entry = comp.cfg.entry();
        let one = comp.pool.create_const(ConstValue::Int32(1));
        let store = comp.pool.create_store(sr, one);
        let call = comp.pool.create_call(callee, Vec::new(), false);
        let call_top = comp.pool.create_treetop(call);
        let load = comp.pool.create_load(sr);
        let load_top = comp.pool.create_treetop(load);
        comp.cfg
            .block_mut(entry)
            .trees
            .extend([store, call_top, load_top]);

        let info = UseDefInfo::build(&comp, false, false).unwrap();
        assert!(info.defs_for(load).is_empty());
    }

    #[test]
    fn test_loads_as_defs_records_load_occurrences() {
        let mut comp = comp();
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let first = comp.pool.create_load(sr);
        let first_top = comp.pool.create_treetop(first);
        let second = comp.pool.create_load(sr);
        let second_top = comp.pool.create_treetop(second);
        comp.cfg.block_mut(entry).trees.extend([first_top, second_top]);

        let info = UseDefInfo::build(&comp, false, true).unwrap();
        assert_eq!(info.defs_for(second), &[first]);
    }
}
