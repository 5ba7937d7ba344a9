//! Genetic programming over grammar trees.
//!
//! Grammars are evolved to accept a corpus of example strings. Each
//! generation is scored, ranked, and rebuilt from elites, mutants and
//! crossover offspring until the best score stops improving.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │         Population Controller       │
//! ├─────────────────────────────────────┤
//! │  Selection │ Crossover │ Mutation   │
//! ├─────────────────────────────────────┤
//! │     Tree Generator & Repair         │
//! ├─────────────────────────────────────┤
//! │     Grammar Arena & Matcher         │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use grammargen::Corpus;
//! use grammargen::gp::{EvolutionConfig, Population};
//!
//! let corpus = Corpus::from_lines(["foo", "foobar"]);
//! let config = EvolutionConfig::default()
//!     .with_population_size(20)
//!     .with_max_generations(5);
//! let mut population = Population::new(config, corpus)?;
//! let summary = population.run()?;
//! println!("{} scored {}", summary.best, summary.best_fitness);
//! # Ok::<(), grammargen::GrammarError>(())
//! ```

mod crossover;
mod evolution;
mod generator;
mod grammar;
mod mutation;
mod persistence;
mod selection;

pub use crate::error::Result;
pub use crossover::{crossover, flatten, random_subtree};
pub use evolution::{EvolutionConfig, GenerationStats, Population, RunSummary, Termination, score};
pub use generator::{generate_node, generate_tree, is_repaired, repair};
pub use grammar::{EvaluationContext, Grammar, LITERAL_SIZE, NodeId, NodeKind, Slot};
pub use mutation::{mutate, mutate_random_subtree};
pub use persistence::{
    CHECKPOINT_VERSION, Checkpoint, checkpoint_path, load_checkpoint, save_checkpoint,
};
pub use selection::{rank_weights, select, select_index};
