//! Population controller for grammar evolution.
//!
//! Each generation is scored against the corpus, ranked best-first, and
//! replaced wholesale by elites, mutants and crossover offspring. A run
//! stops once the best fitness has failed to improve for more than
//! `patience` consecutive generations.

// Ratios are applied to population sizes through floating point
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::corpus::Corpus;
use crate::error::{GrammarError, Result};
use crate::gp::crossover::crossover;
use crate::gp::generator::{generate_tree, repair};
use crate::gp::grammar::Grammar;
use crate::gp::mutation::mutate_random_subtree;
use crate::gp::persistence::{CHECKPOINT_VERSION, Checkpoint};
use crate::gp::selection::{rank_weights, select};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Configuration for the evolution process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Number of individuals per generation.
    pub population_size: usize,
    /// Randomly generated nodes per initial tree. Open slots left over are
    /// closed with extra literal leaves, so a tree holds at most
    /// `2 * node_budget + 1` nodes.
    pub node_budget: usize,
    /// Fraction of the population copied unchanged, in `[0, 1]`.
    pub elite_ratio: f64,
    /// Fraction of the population produced by mutation, in `[0, 1]`.
    pub mutation_ratio: f64,
    /// Generations without improvement tolerated before stopping.
    pub patience: usize,
    /// Hard cap on generations per run; 0 means no cap.
    pub max_generations: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
    /// Score individuals on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            node_budget: 32,
            elite_ratio: 0.1,
            mutation_ratio: 0.2,
            patience: 20,
            max_generations: 0,
            seed: 42,
            parallel: true,
        }
    }
}

impl EvolutionConfig {
    /// Sets the population size.
    #[must_use]
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the per-tree node budget.
    #[must_use]
    pub fn with_node_budget(mut self, n: usize) -> Self {
        self.node_budget = n;
        self
    }

    /// Sets the elite ratio.
    #[must_use]
    pub fn with_elite_ratio(mut self, ratio: f64) -> Self {
        self.elite_ratio = ratio;
        self
    }

    /// Sets the mutation ratio.
    #[must_use]
    pub fn with_mutation_ratio(mut self, ratio: f64) -> Self {
        self.mutation_ratio = ratio;
        self
    }

    /// Sets the plateau patience.
    #[must_use]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Sets the generation cap (0 to disable).
    #[must_use]
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enables or disables parallel scoring.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidArgument`] for a zero node budget, an
    /// empty population, or a ratio outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.node_budget == 0 {
            return Err(GrammarError::invalid("node_budget must be greater than zero"));
        }
        if self.population_size == 0 {
            return Err(GrammarError::invalid(
                "population_size must be greater than zero",
            ));
        }
        for (name, ratio) in [
            ("elite_ratio", self.elite_ratio),
            ("mutation_ratio", self.mutation_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(GrammarError::invalid(format!(
                    "{name} must be within [0, 1], got {ratio}"
                )));
            }
        }
        Ok(())
    }

    /// Individuals copied verbatim into each new generation.
    #[must_use]
    pub fn elite_count(&self) -> usize {
        (self.elite_ratio * self.population_size as f64).floor() as usize
    }

    /// Individuals produced by mutation in each new generation.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        (self.mutation_ratio * self.population_size as f64).floor() as usize
    }
}

/// Statistics for a single generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStats {
    /// Generation number, starting at 0.
    pub generation: usize,
    /// Best fitness in this generation.
    pub best_fitness: f64,
    /// Mean fitness.
    pub mean_fitness: f64,
    /// Fitness standard deviation.
    pub fitness_std: f64,
    /// Comparison count the best individual spent on the whole corpus.
    pub best_cost: usize,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Best fitness stopped improving for longer than the patience.
    Plateau,
    /// The configured generation cap was reached.
    GenerationLimit,
}

/// Outcome of [`Population::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Generations executed by this run.
    pub generations: usize,
    /// Best fitness achieved.
    pub best_fitness: f64,
    /// Individual that achieved it.
    pub best: Grammar,
    /// Reason the run stopped.
    pub termination: Termination,
}

/// Score `grammar` on every corpus example.
///
/// Returns the summed fitness and the summed comparison count.
#[must_use]
pub fn score(grammar: &Grammar, corpus: &Corpus) -> (f64, usize) {
    corpus.iter().fold((0.0, 0), |(fitness, cost), input| {
        let (value, ctx) = grammar.evaluate_with(input);
        (fitness + value, cost + ctx.comparison_count)
    })
}

/// Mean and population standard deviation of a non-empty slice.
fn mean_and_std(fitness: &[f64]) -> (f64, f64) {
    let len = fitness.len() as f64;
    let mean = fitness.iter().sum::<f64>() / len;
    let variance = fitness.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / len;
    (mean, variance.sqrt())
}

/// A generation of grammars evolving against a fixed corpus.
#[derive(Debug)]
pub struct Population {
    config: EvolutionConfig,
    corpus: Corpus,
    individuals: Vec<Grammar>,
    best: Option<(Grammar, f64)>,
    generation: usize,
    rng: SmallRng,
}

impl Population {
    /// Create a random initial population.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EvolutionConfig, corpus: Corpus) -> Result<Self> {
        config.validate()?;
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let individuals = (0..config.population_size)
            .map(|_| generate_tree(config.node_budget, &mut rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            corpus,
            individuals,
            best: None,
            generation: 0,
            rng,
        })
    }

    /// Continue from existing individuals.
    ///
    /// A population of the wrong size is truncated or topped up with random
    /// trees.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or `individuals`
    /// is empty.
    pub fn with_individuals(
        config: EvolutionConfig,
        corpus: Corpus,
        individuals: Vec<Grammar>,
        generation: usize,
    ) -> Result<Self> {
        config.validate()?;
        if individuals.is_empty() {
            return Err(GrammarError::precondition(
                "cannot resume from an empty population",
            ));
        }

        let mut rng = SmallRng::seed_from_u64(config.seed.wrapping_add(generation as u64));
        let mut individuals = individuals;
        if individuals.len() != config.population_size {
            warn!(
                stored = individuals.len(),
                configured = config.population_size,
                "population size differs from configuration"
            );
        }
        individuals.truncate(config.population_size);
        while individuals.len() < config.population_size {
            individuals.push(generate_tree(config.node_budget, &mut rng)?);
        }
        for individual in &mut individuals {
            repair(individual);
        }

        Ok(Self {
            config,
            corpus,
            individuals,
            best: None,
            generation,
            rng,
        })
    }

    /// Resume from a checkpoint, keeping the running configuration.
    ///
    /// # Errors
    ///
    /// See [`with_individuals`](Self::with_individuals).
    pub fn from_checkpoint(
        checkpoint: Checkpoint,
        config: EvolutionConfig,
        corpus: Corpus,
    ) -> Result<Self> {
        if checkpoint.config != config {
            warn!("checkpoint was written with a different configuration");
        }
        Self::with_individuals(config, corpus, checkpoint.population, checkpoint.generation)
    }

    /// Snapshot the current generation.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            generation: self.generation,
            config: self.config,
            population: self.individuals.clone(),
            best_fitness: self.best.as_ref().map_or(0.0, |(_, fitness)| *fitness),
        }
    }

    /// Current individuals.
    #[must_use]
    pub fn individuals(&self) -> &[Grammar] {
        &self.individuals
    }

    /// Best individual of the last ranked generation and its fitness.
    #[must_use]
    pub fn best(&self) -> Option<(&Grammar, f64)> {
        self.best.as_ref().map(|(grammar, fitness)| (grammar, *fitness))
    }

    /// Number of generations completed.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// The corpus individuals are scored against.
    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    fn score_all(&self) -> Vec<(f64, usize)> {
        if self.config.parallel {
            self.individuals
                .par_iter()
                .map(|grammar| score(grammar, &self.corpus))
                .collect()
        } else {
            self.individuals
                .iter()
                .map(|grammar| score(grammar, &self.corpus))
                .collect()
        }
    }

    /// Rank the current generation and breed its replacement.
    ///
    /// Returns statistics of the generation that was ranked; its best
    /// fitness is `best_fitness`.
    ///
    /// # Errors
    ///
    /// Returns an error if the population is empty.
    pub fn update(&mut self) -> Result<GenerationStats> {
        let config = self.config;
        let scores = self.score_all();

        let mut ranked: Vec<(Grammar, f64, usize)> = std::mem::take(&mut self.individuals)
            .into_iter()
            .zip(scores)
            .map(|(grammar, (fitness, cost))| (grammar, fitness, cost))
            .collect();
        // Stable: equal fitness keeps the previous order.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let Some((best, best_fitness, best_cost)) = ranked.first() else {
            return Err(GrammarError::precondition(
                "cannot update an empty population",
            ));
        };
        self.best = Some((best.clone(), *best_fitness));
        let fitness: Vec<f64> = ranked.iter().map(|(_, fitness, _)| *fitness).collect();
        let (mean_fitness, fitness_std) = mean_and_std(&fitness);
        let stats = GenerationStats {
            generation: self.generation,
            best_fitness: *best_fitness,
            mean_fitness,
            fitness_std,
            best_cost: *best_cost,
        };

        let pool: Vec<(&Grammar, f64)> = ranked
            .iter()
            .zip(rank_weights(ranked.len()))
            .map(|((grammar, _, _), weight)| (grammar, weight))
            .collect();

        let size = ranked.len();
        let mut next = Vec::with_capacity(size);

        for (grammar, _) in pool.iter().take(config.elite_count()) {
            let mut elite = (*grammar).clone();
            repair(&mut elite);
            next.push(elite);
        }

        for _ in 0..config.mutation_count() {
            if next.len() >= size {
                break;
            }
            let mut mutant = (*select(&pool, &mut self.rng)?).clone();
            mutate_random_subtree(&mut mutant, &mut self.rng);
            repair(&mut mutant);
            next.push(mutant);
        }

        while next.len() < size {
            let first = *select(&pool, &mut self.rng)?;
            let second = *select(&pool, &mut self.rng)?;
            let (mut left, mut right) = crossover(first, second, &mut self.rng);
            repair(&mut left);
            next.push(left);
            if next.len() < size {
                repair(&mut right);
                next.push(right);
            }
        }

        debug!(
            generation = stats.generation,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            std = stats.fitness_std,
            cost = stats.best_cost,
            "generation ranked"
        );

        self.individuals = next;
        self.generation += 1;
        Ok(stats)
    }

    /// Evolve until the best fitness plateaus or the generation cap hits.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`update`](Self::update).
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_with(|_, _, _| {})
    }

    /// Like [`run`](Self::run), calling `on_improvement` with the
    /// generation, individual and fitness for the first ranked generation
    /// and whenever the best fitness strictly improves.
    ///
    /// A generation that does not beat the record, which starts at zero,
    /// extends the plateau. A run whose best fitness stays at zero stops
    /// after exactly `patience + 1` generations.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`update`](Self::update).
    pub fn run_with<F>(&mut self, mut on_improvement: F) -> Result<RunSummary>
    where
        F: FnMut(usize, &Grammar, f64),
    {
        let limit = self.config.max_generations;
        let mut best: Option<(Grammar, f64)> = None;
        // Fitness is never negative, so the first generation only improves
        // on this floor if it scores something.
        let mut record = 0.0f64;
        let mut plateau = 0usize;
        let mut generations = 0usize;

        let termination = loop {
            if limit > 0 && generations >= limit {
                break Termination::GenerationLimit;
            }

            let stats = self.update()?;
            generations += 1;

            let improved = stats.best_fitness > record;
            let report = improved || best.is_none();
            if let Some((grammar, fitness)) = self.best.as_ref().filter(|_| report) {
                info!(
                    generation = stats.generation,
                    fitness = *fitness,
                    grammar = %grammar,
                    "new best"
                );
                on_improvement(stats.generation, grammar, *fitness);
                best = Some((grammar.clone(), *fitness));
            }

            if improved {
                record = stats.best_fitness;
                plateau = 0;
            } else {
                plateau += 1;
                if plateau > self.config.patience {
                    break Termination::Plateau;
                }
            }
        };

        let Some((best, best_fitness)) = best else {
            return Err(GrammarError::precondition(
                "run finished without ranking a generation",
            ));
        };
        info!(
            generations,
            fitness = best_fitness,
            termination = ?termination,
            "run finished"
        );

        Ok(RunSummary {
            generations,
            best_fitness,
            best,
            termination,
        })
    }

    /// Write every individual, one per line, in printed form.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for grammar in &self.individuals {
            writeln!(out, "{grammar}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Corpus {
        Corpus::from_lines(["a", "ab", "abc", "b", "ba"])
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(EvolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = EvolutionConfig::default();
        assert!(base.with_node_budget(0).validate().is_err());
        assert!(base.with_population_size(0).validate().is_err());
        assert!(base.with_elite_ratio(1.5).validate().is_err());
        assert!(base.with_mutation_ratio(-0.1).validate().is_err());
        assert!(base.with_mutation_ratio(f64::NAN).validate().is_err());
        assert!(base.with_elite_ratio(1.0).with_mutation_ratio(0.0).validate().is_ok());
    }

    #[test]
    fn test_generation_stats_spread() {
        let (mean, std) = mean_and_std(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        assert!((mean - 3.0).abs() < 1e-12);
        assert!((std - 2.0_f64.sqrt()).abs() < 1e-12);

        let (mean, std) = mean_and_std(&[0.5; 4]);
        assert!((mean - 0.5).abs() < 1e-12);
        assert!(std.abs() < 1e-12);
    }

    #[test]
    fn test_counts_floor() {
        let config = EvolutionConfig::default()
            .with_population_size(10)
            .with_elite_ratio(0.25)
            .with_mutation_ratio(0.39);
        assert_eq!(config.elite_count(), 2);
        assert_eq!(config.mutation_count(), 3);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EvolutionConfig::default().with_node_budget(0);
        assert!(matches!(
            Population::new(config, corpus()),
            Err(GrammarError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_update_keeps_population_size() {
        let config = EvolutionConfig::default()
            .with_population_size(17)
            .with_node_budget(8)
            .with_parallel(false);
        let mut population = Population::new(config, corpus()).unwrap();
        for _ in 0..5 {
            population.update().unwrap();
            assert_eq!(population.individuals().len(), 17);
        }
        assert_eq!(population.generation(), 5);
    }

    #[test]
    fn test_full_elitism_reproduces_top() {
        let config = EvolutionConfig::default()
            .with_population_size(12)
            .with_node_budget(10)
            .with_elite_ratio(1.0)
            .with_mutation_ratio(0.0)
            .with_parallel(false);
        let mut population = Population::new(config, corpus()).unwrap();
        let stats = population.update().unwrap();
        let (best, fitness) = population.best().unwrap();
        assert_eq!(&population.individuals()[0], best);
        assert!((stats.best_fitness - fitness).abs() < f64::EPSILON);
    }

    #[test]
    fn test_elitism_never_loses_best() {
        let config = EvolutionConfig::default()
            .with_population_size(20)
            .with_node_budget(12)
            .with_elite_ratio(0.1)
            .with_seed(7)
            .with_parallel(false);
        let mut population = Population::new(config, corpus()).unwrap();
        let mut previous = f64::NEG_INFINITY;
        for _ in 0..10 {
            let stats = population.update().unwrap();
            assert!(stats.best_fitness >= previous);
            previous = stats.best_fitness;
        }
    }

    #[test]
    fn test_plateau_terminates_after_patience() {
        // An empty corpus scores every individual zero.
        let config = EvolutionConfig::default()
            .with_population_size(8)
            .with_node_budget(4)
            .with_patience(3)
            .with_parallel(false);
        let mut population = Population::new(config, Corpus::default()).unwrap();
        let mut reports = 0;
        let summary = population.run_with(|_, _, _| reports += 1).unwrap();

        assert_eq!(summary.termination, Termination::Plateau);
        assert_eq!(summary.generations, 3 + 1);
        assert_eq!(population.generation(), 4);
        assert_eq!(reports, 1);
    }

    #[test]
    fn test_plateau_counts_from_first_positive_score() {
        // "a" only covers a prefix of "ab" and earns partial credit, so the
        // first generation beats the zero record.
        let config = EvolutionConfig::default()
            .with_population_size(3)
            .with_elite_ratio(1.0)
            .with_mutation_ratio(0.0)
            .with_patience(2)
            .with_parallel(false);
        let individuals = vec![Grammar::literal("a"); 3];
        let mut population =
            Population::with_individuals(config, Corpus::from_lines(["ab"]), individuals, 0)
                .unwrap();
        let summary = population.run().unwrap();

        assert_eq!(summary.termination, Termination::Plateau);
        assert_eq!(summary.generations, 1 + 2 + 1);
        assert!((summary.best_fitness - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_generation_limit() {
        let config = EvolutionConfig::default()
            .with_population_size(10)
            .with_node_budget(6)
            .with_patience(1000)
            .with_max_generations(4)
            .with_parallel(false);
        let mut population = Population::new(config, corpus()).unwrap();
        let summary = population.run().unwrap();
        assert_eq!(summary.termination, Termination::GenerationLimit);
        assert_eq!(summary.generations, 4);
        assert!(summary.best_fitness >= 0.0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let config = EvolutionConfig::default()
            .with_population_size(15)
            .with_node_budget(8)
            .with_max_generations(6)
            .with_seed(99);
        let first = Population::new(config, corpus()).unwrap().run().unwrap();
        let second = Population::new(config.with_parallel(false), corpus())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(first.best, second.best);
        assert_eq!(first.generations, second.generations);
    }

    #[test]
    fn test_dump_writes_one_line_per_individual() {
        let config = EvolutionConfig::default()
            .with_population_size(6)
            .with_node_budget(5);
        let population = Population::new(config, corpus()).unwrap();
        let mut out = Vec::new();
        population.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().all(|line| line.starts_with('(')));
    }

    #[test]
    fn test_score_sums_corpus() {
        let grammar = Grammar::alternation(&Grammar::literal("a"), &Grammar::literal("b"));
        let (fitness, cost) = score(&grammar, &corpus());
        // "a" and "b" match fully; "ab", "abc" and "ba" earn 1/2 each.
        assert!((fitness - 3.5).abs() < 1e-9);
        assert_eq!(cost, 5 * (33 + 16 + 16));
    }

    #[test]
    fn test_resume_tops_up_population() {
        let config = EvolutionConfig::default().with_population_size(4);
        let population =
            Population::with_individuals(config, corpus(), vec![Grammar::literal("a")], 3).unwrap();
        assert_eq!(population.individuals().len(), 4);
        assert_eq!(population.generation(), 3);
        assert!(
            Population::with_individuals(config, corpus(), Vec::new(), 0).is_err()
        );
    }
}
