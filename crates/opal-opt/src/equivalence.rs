//! Structural equality over IR nodes and subtrees, used by the
//! redundancy-detecting passes.

use opal_ir::{NodeId, NodePayload, NodePool, OpCode};

use crate::compilation::VisitEpoch;

/// Shallow equivalence of two nodes.
///
/// Same opcode, and then per shape: constants compare exactly per width
/// (floating constants by bit pattern), symbol-bearing ops by symbol
/// reference, branches and switches by target equality of every case.
/// Operations with observable side effects degrade to identity: a store,
/// allocation, monitor op, or opaque call is equivalent only to itself.
#[must_use]
pub fn nodes_equivalent(pool: &NodePool, a: NodeId, b: NodeId) -> bool {
    if a == b {
        return true;
    }
    let na = pool.node(a);
    let nb = pool.node(b);
    if na.op != nb.op {
        return false;
    }
    let side_effecting = na.op.is_store()
        || na.op.is_allocation()
        || na.op.is_monitor()
        || (na.op.is_call() && !(na.is_pure_call && nb.is_pure_call));
    if side_effecting || na.op == OpCode::PassThrough {
        return false;
    }
    if na.op.is_load_const() {
        return na.const_value() == nb.const_value();
    }
    if na.op.has_symbol_reference() {
        return na.symref == nb.symref;
    }
    if na.op.is_branch() {
        return na.branch_target() == nb.branch_target();
    }
    if na.op.is_switch() {
        return match (&na.payload, &nb.payload) {
            (NodePayload::Cases(x), NodePayload::Cases(y)) => x == y,
            _ => false,
        };
    }
    true
}

/// Recursive equivalence of two subtrees.
///
/// Extends [`nodes_equivalent`] with equal child counts and pairwise
/// recursively equivalent children. Two nodes already visited under `epoch`
/// short-circuit as equal without re-verification; successful comparisons
/// mark both sides. Callers claim a fresh epoch per independent comparison.
#[must_use]
pub fn syntactically_equivalent(
    pool: &mut NodePool,
    a: NodeId,
    b: NodeId,
    epoch: VisitEpoch,
) -> bool {
    if pool.visit_count(a) == epoch.0 && pool.visit_count(b) == epoch.0 {
        return true;
    }
    if !nodes_equivalent(pool, a, b) {
        return false;
    }
    let ca = pool.node(a).children.clone();
    let cb = pool.node(b).children.clone();
    if ca.len() != cb.len() {
        return false;
    }
    for (&x, &y) in ca.iter().zip(cb.iter()) {
        if !syntactically_equivalent(pool, x, y, epoch) {
            return false;
        }
    }
    pool.set_visit_count(a, epoch.0);
    pool.set_visit_count(b, epoch.0);
    true
}
