//! Point mutation for grammar trees.
//!
//! A mutation swaps the kind of one node for a freshly generated one and
//! keeps the node's existing child links. The result may break the arity
//! invariant until [`repair`](crate::gp::repair) runs.

use crate::gp::crossover::random_subtree;
use crate::gp::generator::generate_node;
use crate::gp::grammar::{Grammar, Slot};
use rand::Rng;

/// Replace the kind of the node at `slot`.
///
/// Returns `false` if the slot is vacant.
pub fn mutate<R: Rng>(grammar: &mut Grammar, slot: Slot, rng: &mut R) -> bool {
    let Some(id) = grammar.get(slot) else {
        return false;
    };
    grammar.set_kind(id, generate_node(rng));
    true
}

/// Mutate a uniformly chosen node and return where it sits.
pub fn mutate_random_subtree<R: Rng>(grammar: &mut Grammar, rng: &mut R) -> Slot {
    let slot = random_subtree(grammar, rng);
    mutate(grammar, slot, rng);
    slot
}
