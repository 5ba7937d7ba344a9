//! Property-based tests for grammar trees and genetic operators.
//!
//! Trees are grown from proptest-chosen seeds so every case is reproducible.
//! Run with: cargo test --release prop_grammar

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use grammargen::Grammar;
use grammargen::gp::{
    EvaluationContext, crossover, flatten, generate_tree, is_repaired, mutate_random_subtree,
    repair,
};

/// Short inputs over a small alphabet so literals hit often.
fn input() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"ab c!".to_vec()), 0..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Generated trees are non-empty, repaired and well-formed.
    #[test]
    fn prop_generated_tree_is_repaired(seed in any::<u64>(), budget in 1usize..64) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let grammar = generate_tree(budget, &mut rng).unwrap();

        prop_assert!(grammar.size() >= 1);
        prop_assert!(is_repaired(&grammar));
        prop_assert!(grammar.validate().is_ok());
        prop_assert_eq!(flatten(&grammar).len(), grammar.node_count());
    }

    /// Wrapping a tree in a larger one never decreases its size.
    #[test]
    fn prop_adding_nodes_never_shrinks(first in any::<u64>(), second in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(first);
        let grammar = generate_tree(24, &mut rng).unwrap();
        let mut rng = SmallRng::seed_from_u64(second);
        let other = generate_tree(12, &mut rng).unwrap();
        let size = grammar.size();

        prop_assert!(Grammar::optional(&grammar).size() > size);
        prop_assert!(Grammar::join(&grammar, &other).size() > size);
        prop_assert!(Grammar::join(&other, &grammar).size() > size);
        prop_assert!(Grammar::alternation(&grammar, &other).size() > size);
        prop_assert!(Grammar::alternation(&other, &grammar).size() > size);
    }

    /// A clone prints and matches identically, and diverges independently.
    #[test]
    fn prop_clone_is_isolated(seed in any::<u64>(), text in input()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let original = generate_tree(24, &mut rng).unwrap();
        let mut copy = original.clone();

        prop_assert_eq!(&copy, &original);
        prop_assert_eq!(copy.to_string(), original.to_string());
        prop_assert_eq!(copy.matches(&text), original.matches(&text));

        let printed = original.to_string();
        mutate_random_subtree(&mut copy, &mut rng);
        repair(&mut copy);
        prop_assert_eq!(original.to_string(), printed);
    }

    /// Repairing a repaired tree changes nothing.
    #[test]
    fn prop_repair_idempotent(seed in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut grammar = generate_tree(32, &mut rng).unwrap();
        mutate_random_subtree(&mut grammar, &mut rng);

        repair(&mut grammar);
        prop_assert!(is_repaired(&grammar));
        let once = grammar.clone();
        repair(&mut grammar);
        prop_assert_eq!(grammar, once);
    }

    /// Crossover leaves both parents untouched and yields repaired children.
    #[test]
    fn prop_crossover_preserves_parents(first in any::<u64>(), second in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(first);
        let a = generate_tree(20, &mut rng).unwrap();
        let mut rng = SmallRng::seed_from_u64(second);
        let b = generate_tree(20, &mut rng).unwrap();
        let (a_before, b_before) = (a.to_string(), b.to_string());

        let (left, right) = crossover(&a, &b, &mut rng);

        prop_assert_eq!(a.to_string(), a_before);
        prop_assert_eq!(b.to_string(), b_before);
        prop_assert_eq!(left.node_count() + right.node_count(), a.node_count() + b.node_count());
        prop_assert!(is_repaired(&left));
        prop_assert!(is_repaired(&right));
    }

    /// `matches` agrees with `parse`, and only full matches score 1.0.
    #[test]
    fn prop_evaluate_agrees_with_parse(seed in any::<u64>(), text in input()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let grammar = generate_tree(16, &mut rng).unwrap();

        let mut ctx = EvaluationContext::default();
        let full = grammar.parse(&text, &mut ctx).iter().any(|rest| rest.is_empty());
        let score = grammar.evaluate(&text);

        prop_assert_eq!(grammar.matches(&text), full);
        prop_assert!((0.0..=1.0).contains(&score));
        if full {
            prop_assert!((score - 1.0).abs() < f64::EPSILON);
        } else {
            prop_assert!(score < 1.0);
        }
        prop_assert!(ctx.comparison_count >= grammar.size());
    }
}
