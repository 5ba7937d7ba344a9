//! Random grammar construction and structural repair.
//!
//! Trees grow from a single root by repeatedly filling a random open child
//! slot. [`repair`] restores the arity invariant after genetic operators
//! have rewritten node kinds in place.

use crate::error::{GrammarError, Result};
use crate::gp::grammar::{Grammar, NodeId, NodeKind, Slot};
use rand::Rng;

/// Pick one of the four node kinds uniformly.
///
/// Literals carry a single printable ASCII byte.
pub fn generate_node<R: Rng>(rng: &mut R) -> NodeKind {
    match rng.gen_range(0..4) {
        0 => NodeKind::Join,
        1 => NodeKind::Alternation,
        2 => NodeKind::Optional,
        _ => NodeKind::Literal(vec![printable_byte(rng)]),
    }
}

/// Draw uniform bytes until one is printable ASCII.
fn printable_byte<R: Rng>(rng: &mut R) -> u8 {
    loop {
        let byte: u8 = rng.gen_range(0..=u8::MAX);
        if byte == b' ' || byte.is_ascii_graphic() {
            return byte;
        }
    }
}

/// Grow a random tree from `node_budget` generated nodes.
///
/// Open slots left when the budget runs out are closed with random
/// literal leaves, so the result always satisfies the arity invariant.
/// Those leaves are not counted against the budget; the tree holds at most
/// `2 * node_budget + 1` nodes.
///
/// # Errors
///
/// Returns [`GrammarError::InvalidArgument`] if `node_budget` is zero.
pub fn generate_tree<R: Rng>(node_budget: usize, rng: &mut R) -> Result<Grammar> {
    if node_budget == 0 {
        return Err(GrammarError::invalid("node_budget must be greater than zero"));
    }

    let mut grammar = Grammar::from_kind(generate_node(rng));
    let mut frontier = open_slots(&grammar, grammar.root());

    for _ in 1..node_budget {
        if frontier.is_empty() {
            break;
        }
        let slot = frontier.swap_remove(rng.gen_range(0..frontier.len()));
        let id = grammar.push(generate_node(rng));
        grammar.set(slot, id);
        frontier.extend(open_slots(&grammar, id));
    }

    for slot in frontier {
        let leaf = grammar.push(NodeKind::Literal(vec![printable_byte(rng)]));
        grammar.set(slot, leaf);
    }

    Ok(grammar)
}

fn open_slots(grammar: &Grammar, parent: NodeId) -> Vec<Slot> {
    (0..grammar.kind(parent).arity())
        .map(|index| Slot::Child { parent, index })
        .collect()
}

/// Enforce the arity invariant on every reachable node.
///
/// Slots above a node's arity are cleared; vacant live slots receive an
/// empty literal, which matches like the vacancy did. The arena is
/// compacted afterwards. Repairing twice changes nothing.
pub fn repair(grammar: &mut Grammar) {
    let root = grammar.root();
    repair_node(grammar, root);
    grammar.compact();
}

fn repair_node(grammar: &mut Grammar, id: NodeId) {
    let arity = grammar.kind(id).arity();
    for index in 0..2 {
        if index >= arity {
            grammar.clear_child(id, index);
            continue;
        }
        match grammar.child(id, index) {
            Some(child) => repair_node(grammar, child),
            None => {
                let leaf = grammar.push(NodeKind::Literal(Vec::new()));
                grammar.set(Slot::Child { parent: id, index }, leaf);
            }
        }
    }
}

/// Whether every reachable node has exactly `arity` children.
#[must_use]
pub fn is_repaired(grammar: &Grammar) -> bool {
    let mut stack = vec![grammar.root()];
    while let Some(id) = stack.pop() {
        let arity = grammar.kind(id).arity();
        for index in 0..2 {
            match (grammar.child(id, index), index < arity) {
                (Some(child), true) => stack.push(child),
                (None, false) => {}
                _ => return false,
            }
        }
    }
    true
}
