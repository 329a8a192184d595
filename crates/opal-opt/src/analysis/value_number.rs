//! Value numbering.
//!
//! Two build algorithms, chosen once per driver: `Hash` numbers nodes on the
//! fly from a structural key, `PrePartition` seeds equivalence classes first
//! and refines them by child classes to a fixed point. Side-effecting nodes
//! always number uniquely; loads share a number only while no store or opaque
//! call intervenes in their block.

use std::collections::HashMap;

use opal_ir::{ConstValue, NodeId, OpCode, SymRefId};

use crate::analysis::block_nodes;
use crate::compilation::Compilation;

/// Bail out of construction above this many nodes.
const MAX_VALUE_NUMBER_NODES: usize = 200_000;

/// Which value-numbering algorithm a driver uses, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VnBuildType {
    PrePartition,
    Hash,
}

pub struct ValueNumberInfo {
    build_type: VnBuildType,
    numbers: HashMap<NodeId, u32>,
}

#[derive(PartialEq, Eq, Hash)]
enum SeedKey {
    Const(ConstValue),
    /// Loads partitioned by block, kill generation, and symbol reference.
    Load(u32, u32, SymRefId),
    Op(OpCode, Option<SymRefId>),
    Unique(NodeId),
}

impl ValueNumberInfo {
    #[must_use]
    pub fn build(comp: &Compilation, build_type: VnBuildType) -> Option<Self> {
        if comp.pool.total_node_count() > MAX_VALUE_NUMBER_NODES {
            return None;
        }
        let numbers = match build_type {
            VnBuildType::Hash => build_hash(comp),
            VnBuildType::PrePartition => build_pre_partition(comp),
        };
        Some(Self {
            build_type,
            numbers,
        })
    }

    #[must_use]
    pub fn build_type(&self) -> VnBuildType {
        self.build_type
    }

    #[must_use]
    pub fn value_number(&self, node: NodeId) -> Option<u32> {
        self.numbers.get(&node).copied()
    }

    /// True when both nodes were numbered and agree.
    #[must_use]
    pub fn same_value(&self, a: NodeId, b: NodeId) -> bool {
        match (self.value_number(a), self.value_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Scrubs a node about to be deleted.
    pub fn remove_node(&mut self, node: NodeId) {
        self.numbers.remove(&node);
    }
}

/// Per-node seed keys shared by both algorithms: constants by payload, loads
/// by memory generation, side-effecting nodes unique, the rest by shape.
fn seed_keys(comp: &Compilation) -> Vec<(NodeId, SeedKey)> {
    let pool = &comp.pool;
    let mut seeds: Vec<(NodeId, SeedKey)> = Vec::new();
    let mut seen: HashMap<NodeId, ()> = HashMap::new();

    for block_id in comp.cfg.live_block_ids() {
        // generation per symref: bumped by stores, wholesale by opaque calls
        let mut generation: HashMap<SymRefId, u32> = HashMap::new();
        let mut global_generation = 0u32;
        for n in block_nodes(pool, comp.cfg.block(block_id)) {
            let node = pool.node(n);
            if node.op.is_store() {
                if let Some(sr) = node.symref {
                    *generation.entry(sr).or_insert(0) += 1;
                }
            } else if node.op.is_call() && !node.is_pure_call {
                global_generation += 1;
                generation.clear();
            }
            if seen.insert(n, ()).is_some() {
                continue;
            }
            let side_effecting = node.op.is_store()
                || node.op.is_allocation()
                || node.op.is_monitor()
                || node.op.is_branch()
                || node.op.is_switch()
                || (node.op.is_call() && !node.is_pure_call)
                || matches!(node.op, OpCode::Return | OpCode::PassThrough | OpCode::Treetop);
            let key = if side_effecting {
                SeedKey::Unique(n)
            } else if let Some(value) = node.const_value() {
                SeedKey::Const(value)
            } else if node.op.is_load() {
                match node.symref {
                    Some(sr) => {
                        let generation = global_generation
                            .wrapping_mul(1 << 16)
                            .wrapping_add(*generation.get(&sr).unwrap_or(&0));
                        SeedKey::Load(block_id.0, generation, sr)
                    }
                    None => SeedKey::Unique(n),
                }
            } else {
                SeedKey::Op(node.op, node.symref)
            };
            seeds.push((n, key));
        }
    }
    seeds
}

fn build_hash(comp: &Compilation) -> HashMap<NodeId, u32> {
    let seeds: HashMap<NodeId, u32> = assign_classes(seed_keys(comp));
    let pool = &comp.pool;
    let mut numbers: HashMap<NodeId, u32> = HashMap::new();
    let mut memo: HashMap<(u32, Vec<u32>), u32> = HashMap::new();
    let mut next = 0u32;

    // children are numbered before parents in evaluation order
    let mut order: Vec<NodeId> = Vec::new();
    let mut seen: HashMap<NodeId, ()> = HashMap::new();
    for block_id in comp.cfg.live_block_ids() {
        for n in block_nodes(pool, comp.cfg.block(block_id)) {
            if seen.insert(n, ()).is_none() {
                order.push(n);
            }
        }
    }
    for n in order {
        let Some(&seed) = seeds.get(&n) else { continue };
        let children: Vec<u32> = pool
            .node(n)
            .children
            .iter()
            .map(|c| numbers.get(c).copied().unwrap_or(u32::MAX))
            .collect();
        let vn = *memo.entry((seed, children)).or_insert_with(|| {
            let vn = next;
            next += 1;
            vn
        });
        numbers.insert(n, vn);
    }
    numbers
}

fn build_pre_partition(comp: &Compilation) -> HashMap<NodeId, u32> {
    let pool = &comp.pool;
    let mut classes = assign_classes(seed_keys(comp));

    // refine by child classes until the partition stops splitting
    loop {
        let mut signature: HashMap<(u32, Vec<u32>), u32> = HashMap::new();
        let mut refined: HashMap<NodeId, u32> = HashMap::new();
        let mut next = 0u32;
        for (&n, &class) in &classes {
            let children: Vec<u32> = pool
                .node(n)
                .children
                .iter()
                .map(|c| classes.get(c).copied().unwrap_or(u32::MAX))
                .collect();
            let class = *signature.entry((class, children)).or_insert_with(|| {
                let c = next;
                next += 1;
                c
            });
            refined.insert(n, class);
        }
        let stable = signature.len()
            == classes
                .values()
                .collect::<std::collections::HashSet<_>>()
                .len();
        classes = refined;
        if stable {
            break;
        }
    }
    classes
}

fn assign_classes(seeds: Vec<(NodeId, SeedKey)>) -> HashMap<NodeId, u32> {
    let mut by_key: HashMap<SeedKey, u32> = HashMap::new();
    let mut classes = HashMap::new();
    let mut next = 0u32;
    for (n, key) in seeds {
        let class = *by_key.entry(key).or_insert_with(|| {
            let c = next;
            next += 1;
            c
        });
        classes.insert(n, class);
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::CompileOptions;
    use opal_ir::{ConstValue, MethodInfo};

    fn comp() -> Compilation {
        Compilation::new(MethodInfo::new("m"), CompileOptions::default())
    }

    fn build_both(comp: &Compilation) -> [ValueNumberInfo; 2] {
        [
            ValueNumberInfo::build(comp, VnBuildType::Hash).unwrap(),
            ValueNumberInfo::build(comp, VnBuildType::PrePartition).unwrap(),
        ]
    }

    #[test]
    fn test_identical_arithmetic_shares_a_number() {
        let mut comp = comp();
        let entry = comp.cfg.entry();
        let a1 = comp.pool.create_const(ConstValue::Int32(4));
        let b1 = comp.pool.create_const(ConstValue::Int32(5));
        let sum1 = comp.pool.create_binary(OpCode::Add, a1, b1);
        let top1 = comp.pool.create_treetop(sum1);
        let a2 = comp.pool.create_const(ConstValue::Int32(4));
        let b2 = comp.pool.create_const(ConstValue::Int32(5));
        let sum2 = comp.pool.create_binary(OpCode::Add, a2, b2);
        let top2 = comp.pool.create_treetop(sum2);
        let diff = comp.pool.create_binary(OpCode::Sub, a1, b1);
        let top3 = comp.pool.create_treetop(diff);
        comp.cfg.block_mut(entry).trees.extend([top1, top2, top3]);

        for info in build_both(&comp) {
            assert!(info.same_value(sum1, sum2));
            assert!(info.same_value(a1, a2));
            assert!(!info.same_value(sum1, diff));
        }
    }

    #[test]
    fn test_store_splits_load_numbers() {
        let mut comp = comp();
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let load1 = comp.pool.create_load(sr);
        let top1 = comp.pool.create_treetop(load1);
        let load2 = comp.pool.create_load(sr);
        let top2 = comp.pool.create_treetop(load2);
        let nine = comp.pool.create_const(ConstValue::Int32(9));
        let store = comp.pool.create_store(sr, nine);
        let load3 = comp.pool.create_load(sr);
        let top3 = comp.pool.create_treetop(load3);
        comp.cfg
            .block_mut(entry)
            .trees
            .extend([top1, top2, store, top3]);

        for info in build_both(&comp) {
            assert!(info.same_value(load1, load2));
            assert!(!info.same_value(load1, load3));
        }
    }

    #[test]
    fn test_stores_never_share_numbers() {
        let mut comp = comp();
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let one = comp.pool.create_const(ConstValue::Int32(1));
        let s1 = comp.pool.create_store(sr, one);
        let two = comp.pool.create_const(ConstValue::Int32(1));
        let s2 = comp.pool.create_store(sr, two);
        comp.cfg.block_mut(entry).trees.extend([s1, s2]);

        for info in build_both(&comp) {
            assert!(!info.same_value(s1, s2));
        }
    }
}
