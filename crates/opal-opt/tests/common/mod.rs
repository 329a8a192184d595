#![allow(dead_code)]

use opal_core::{CompileOptions, Hotness};
use opal_ir::{ConstValue, MethodInfo, NodeId, OpCode, SymRefId};
use opal_opt::Compilation;

pub fn compilation(hotness: Hotness) -> Compilation {
    Compilation::new(MethodInfo::new("m"), CompileOptions::new(hotness))
}

pub fn traced(mut comp: Compilation, names: &[&str]) -> Compilation {
    comp.options.trace_opt_details = true;
    comp.options.opts_to_trace = names.iter().map(ToString::to_string).collect();
    comp
}

/// Plants `store x = 2 + 3` in the entry block and returns the store and the
/// add, so tests can check whether folding happened.
pub fn plant_foldable_store(comp: &mut Compilation) -> (NodeId, NodeId) {
    let sr = comp.symrefs.create_named("x");
    let entry = comp.cfg.entry();
    let two = comp.pool.create_const(ConstValue::Int32(2));
    let three = comp.pool.create_const(ConstValue::Int32(3));
    let sum = comp.pool.create_binary(OpCode::Add, two, three);
    let store = comp.pool.create_store(sr, sum);
    comp.cfg.block_mut(entry).trees.push(store);
    (store, sum)
}

/// A single-block counter chain: `store a0 = 0` followed by `links` trees of
/// `store a(i+1) = load a(i) + 1`. Constant propagation and folding resolve
/// one link per sweep.
pub fn plant_counter_chain(comp: &mut Compilation, links: usize) -> Vec<SymRefId> {
    let symrefs: Vec<SymRefId> = (0..=links)
        .map(|i| comp.symrefs.create_named(format!("a{i}")))
        .collect();
    let entry = comp.cfg.entry();
    let zero = comp.pool.create_const(ConstValue::Int32(0));
    let seed = comp.pool.create_store(symrefs[0], zero);
    comp.cfg.block_mut(entry).trees.push(seed);
    for i in 0..links {
        let load = comp.pool.create_load(symrefs[i]);
        let one = comp.pool.create_const(ConstValue::Int32(1));
        let sum = comp.pool.create_binary(OpCode::Add, load, one);
        let store = comp.pool.create_store(symrefs[i + 1], sum);
        comp.cfg.block_mut(entry).trees.push(store);
    }
    symrefs
}

/// The opt-details transcript lines naming `name`.
pub fn transcript_lines<'a>(comp: &'a Compilation, name: &str) -> Vec<&'a str> {
    comp.opt_details()
        .iter()
        .filter(|line| line.contains(name))
        .map(String::as_str)
        .collect()
}
