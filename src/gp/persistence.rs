//! Checkpoints for populations and evolution state.
//!
//! Checkpoints are JSON documents holding the arena form of every grammar,
//! so a run can be inspected by hand or resumed later. The printed
//! parenthesized form is for display only and is never read back.

use crate::error::{GrammarError, Result};
use crate::gp::evolution::EvolutionConfig;
use crate::gp::grammar::Grammar;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Evolution checkpoint containing population and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version, see [`CHECKPOINT_VERSION`].
    pub version: u32,
    /// Generations completed when the checkpoint was taken.
    pub generation: usize,
    /// Configuration of the run that wrote the checkpoint.
    pub config: EvolutionConfig,
    /// Population of grammars.
    pub population: Vec<Grammar>,
    /// Best fitness of the last ranked generation.
    pub best_fitness: f64,
}

/// Save a checkpoint as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or file I/O fails.
pub fn save_checkpoint(checkpoint: &Checkpoint, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, checkpoint)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::debug!(
        path = %path.display(),
        generation = checkpoint.generation,
        "saved checkpoint"
    );
    Ok(())
}

/// Load a checkpoint and check that every grammar is a well-formed tree.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the version is
/// unsupported, the population is empty, or a grammar is malformed.
pub fn load_checkpoint(path: &Path) -> Result<Checkpoint> {
    let checkpoint: Checkpoint = serde_json::from_reader(BufReader::new(File::open(path)?))?;

    if checkpoint.version != CHECKPOINT_VERSION {
        return Err(GrammarError::precondition(format!(
            "unsupported checkpoint version: {}",
            checkpoint.version
        )));
    }
    if checkpoint.population.is_empty() {
        return Err(GrammarError::precondition("checkpoint holds no individuals"));
    }
    for grammar in &checkpoint.population {
        grammar.validate()?;
    }

    Ok(checkpoint)
}

/// Get the path for a generation checkpoint file.
#[must_use]
pub fn checkpoint_path(output_dir: &Path, generation: usize) -> PathBuf {
    output_dir.join(format!("gen_{generation:05}.json"))
}
