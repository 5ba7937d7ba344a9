//! Subtree crossover for grammar trees.
//!
//! Both parents are deep-cloned, one occupied slot is drawn uniformly from
//! each clone, and the subtrees hanging off those slots trade places.

use crate::gp::grammar::{Grammar, Slot};
use rand::Rng;

/// Occupied slots of `grammar` in pre-order, starting with [`Slot::Root`].
///
/// Only live slots are visited; vacant ones are skipped.
#[must_use]
pub fn flatten(grammar: &Grammar) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut stack = vec![Slot::Root];
    while let Some(slot) = stack.pop() {
        let Some(id) = grammar.get(slot) else {
            continue;
        };
        slots.push(slot);
        for index in (0..grammar.kind(id).arity()).rev() {
            stack.push(Slot::Child { parent: id, index });
        }
    }
    slots
}

/// Draw one occupied slot uniformly.
pub fn random_subtree<R: Rng>(grammar: &Grammar, rng: &mut R) -> Slot {
    let slots = flatten(grammar);
    // The root is always occupied, so `slots` is never empty.
    slots[rng.gen_range(0..slots.len())]
}

/// Recombine two parents into two offspring.
///
/// The parents are left untouched and the offspring share no node with
/// them or with each other.
#[must_use]
pub fn crossover<R: Rng>(first: &Grammar, second: &Grammar, rng: &mut R) -> (Grammar, Grammar) {
    let mut left = first.clone();
    let mut right = second.clone();

    let left_slot = random_subtree(&left, rng);
    let right_slot = random_subtree(&right, rng);

    if let (Some(left_id), Some(right_id)) = (left.get(left_slot), right.get(right_slot)) {
        let left_branch = left.subtree(left_id);
        let right_branch = right.subtree(right_id);
        left.graft(left_slot, &right_branch);
        right.graft(right_slot, &left_branch);
        left.compact();
        right.compact();
    }

    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::generator::{generate_tree, is_repaired};
    use crate::gp::grammar::NodeKind;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_flatten_is_preorder() {
        let grammar = Grammar::join(
            &Grammar::optional(&Grammar::literal("a")),
            &Grammar::literal("b"),
        );
        let order: Vec<String> = flatten(&grammar)
            .into_iter()
            .map(|slot| grammar.subtree(grammar.get(slot).unwrap()).to_string())
            .collect();
        assert_eq!(
            order,
            vec![
                r#"(cat (opt (word "a")) (word "b"))"#,
                r#"(opt (word "a"))"#,
                r#"(word "a")"#,
                r#"(word "b")"#,
            ]
        );
    }

    #[test]
    fn test_random_subtree_reaches_every_slot() {
        let mut rng = SmallRng::seed_from_u64(3);
        let grammar = Grammar::alternation(&Grammar::literal("x"), &Grammar::literal("y"));
        let slots = flatten(&grammar);
        let mut hits = vec![0usize; slots.len()];
        for _ in 0..3000 {
            let slot = random_subtree(&grammar, &mut rng);
            let position = slots.iter().position(|s| *s == slot).unwrap();
            hits[position] += 1;
        }
        assert!(hits.iter().all(|&h| h > 800), "{hits:?}");
    }

    #[test]
    fn test_crossover_leaves_parents_untouched() {
        let mut rng = SmallRng::seed_from_u64(42);
        let first = generate_tree(15, &mut rng).unwrap();
        let second = generate_tree(15, &mut rng).unwrap();
        let first_before = first.to_string();
        let second_before = second.to_string();

        for _ in 0..50 {
            let (left, right) = crossover(&first, &second, &mut rng);
            assert!(is_repaired(&left));
            assert!(is_repaired(&right));
            assert_eq!(
                left.node_count() + right.node_count(),
                first.node_count() + second.node_count()
            );
        }

        assert_eq!(first.to_string(), first_before);
        assert_eq!(second.to_string(), second_before);
    }

    #[test]
    fn test_offspring_are_isolated() {
        let mut rng = SmallRng::seed_from_u64(5);
        let first = Grammar::join(&Grammar::literal("a"), &Grammar::literal("b"));
        let second = Grammar::literal("c");
        let (mut left, right) = crossover(&first, &second, &mut rng);
        let right_before = right.to_string();

        let root = left.root();
        left.set_kind(root, NodeKind::Literal(b"zzz".to_vec()));

        assert_eq!(right.to_string(), right_before);
        assert_eq!(first.to_string(), r#"(cat (word "a") (word "b"))"#);
    }
}
