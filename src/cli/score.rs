//! Score command implementation.

use super::output::{JsonLine, JsonScore, format_score};
use super::{CliError, OutputFormat};
use grammargen::Corpus;
use grammargen::gp::{load_checkpoint, score};
use std::path::Path;

/// Execute the score command.
///
/// The individual with the highest fitness on `corpus_path` is reported.
///
/// # Errors
///
/// Returns an error if the checkpoint or corpus cannot be loaded.
pub(crate) fn execute(
    checkpoint_path: &Path,
    corpus_path: &Path,
    format: OutputFormat,
) -> Result<(), CliError> {
    let checkpoint = load_checkpoint(checkpoint_path)?;
    let corpus = Corpus::load(corpus_path)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", corpus_path.display())))?;

    let mut best = None;
    for grammar in &checkpoint.population {
        let (fitness, _) = score(grammar, &corpus);
        if best.is_none_or(|(_, top)| fitness > top) {
            best = Some((grammar, fitness));
        }
    }
    let (grammar, fitness) =
        best.ok_or_else(|| CliError::new("checkpoint holds no individuals"))?;

    let lines: Vec<JsonLine> = corpus
        .iter()
        .map(|input| JsonLine {
            input: String::from_utf8_lossy(input).into_owned(),
            matched: grammar.matches(input),
            score: grammar.evaluate(input),
        })
        .collect();

    match format {
        OutputFormat::Text => print!("{}", format_score(grammar, fitness, &lines)),
        OutputFormat::Json => {
            let json = JsonScore {
                grammar: grammar.to_string(),
                fitness,
                lines,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
