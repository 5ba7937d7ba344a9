//! Output formatting utilities for CLI.

use grammargen::Grammar;
use grammargen::gp::{RunSummary, Termination};
use serde::Serialize;

/// JSON-serializable run summary.
#[derive(Debug, Serialize)]
pub(super) struct JsonRunSummary {
    /// Generations executed.
    pub(super) generations: usize,
    /// Best fitness achieved.
    pub(super) best_fitness: f64,
    /// Printed form of the best grammar.
    pub(super) best: String,
    /// Why the run stopped.
    pub(super) termination: &'static str,
    /// Checkpoint written at the end of the run, if any.
    pub(super) checkpoint: Option<String>,
}

impl JsonRunSummary {
    /// Create from a RunSummary.
    pub(super) fn from_summary(summary: &RunSummary, checkpoint: Option<String>) -> Self {
        Self {
            generations: summary.generations,
            best_fitness: summary.best_fitness,
            best: summary.best.to_string(),
            termination: termination_name(summary.termination),
            checkpoint,
        }
    }
}

/// JSON-serializable score report.
#[derive(Debug, Serialize)]
pub(super) struct JsonScore {
    /// Printed form of the scored grammar.
    pub(super) grammar: String,
    /// Total fitness over the corpus.
    pub(super) fitness: f64,
    /// Per-line results.
    pub(super) lines: Vec<JsonLine>,
}

/// JSON-serializable result for one corpus line.
#[derive(Debug, Serialize)]
pub(super) struct JsonLine {
    /// The line, lossily decoded.
    pub(super) input: String,
    /// Whether the grammar accepts the whole line.
    pub(super) matched: bool,
    /// Score of the line.
    pub(super) score: f64,
}

fn termination_name(termination: Termination) -> &'static str {
    match termination {
        Termination::Plateau => "plateau",
        Termination::GenerationLimit => "generation_limit",
    }
}

/// Format a run summary as human-readable text.
pub(super) fn format_summary(summary: &RunSummary, checkpoint: Option<&str>) -> String {
    let mut output = String::new();

    output.push_str("Evolution complete!\n");
    output.push_str(&format!("  Generations: {}\n", summary.generations));
    output.push_str(&format!(
        "  Stopped by: {}\n",
        termination_name(summary.termination)
    ));
    output.push_str(&format!("  Best fitness: {:.4}\n", summary.best_fitness));
    output.push_str(&format!("  Best grammar: {}\n", summary.best));
    if let Some(path) = checkpoint {
        output.push_str(&format!("  Checkpoint: {path}\n"));
    }

    output
}

/// Format a score report as human-readable text.
pub(super) fn format_score(grammar: &Grammar, fitness: f64, lines: &[JsonLine]) -> String {
    let mut output = String::new();

    output.push_str(&format!("Grammar: {grammar}\n\n"));
    for line in lines {
        if line.matched {
            output.push_str(&format!("  [match] {}\n", line.input));
        } else {
            output.push_str(&format!("  [{:.3}] {}\n", line.score, line.input));
        }
    }
    let matched = lines.iter().filter(|line| line.matched).count();
    output.push_str(&format!(
        "\n  Matched: {matched}/{}\n  Fitness: {fitness:.4}\n",
        lines.len()
    ));

    output
}
