// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Grammargen: evolve byte-oriented grammar matchers from example strings.
//!
//! A grammar is a small tree of sequence, choice, option and literal
//! nodes. Populations of random grammars are scored against a corpus and
//! improved with elitism, mutation and subtree crossover until the best
//! score plateaus.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        CLI (evolve / score)         │
//! ├─────────────────────────────────────┤
//! │    Genetic Programming (gp)         │
//! ├─────────────────────────────────────┤
//! │    Corpus          │  Checkpoints   │
//! └─────────────────────────────────────┘
//! ```

pub mod corpus;
pub mod error;
pub mod gp;

pub use corpus::Corpus;
pub use error::GrammarError;
pub use gp::{EvolutionConfig, Grammar, NodeKind, Population};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_reexports() {
        let grammar = Grammar::join(&Grammar::literal("foo"), &Grammar::literal("bar"));
        assert!(grammar.matches(b"foobar"));
        assert_eq!(NodeKind::Optional.arity(), 1);
        assert!(EvolutionConfig::default().validate().is_ok());
    }
}
