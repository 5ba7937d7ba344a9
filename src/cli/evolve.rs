//! Evolve command implementation.

use super::output::{JsonRunSummary, format_summary};
use super::{CliError, OutputFormat};
use grammargen::Corpus;
use grammargen::gp::{
    EvolutionConfig, Population, checkpoint_path, load_checkpoint, save_checkpoint,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Arguments of the evolve command.
#[derive(Debug, clap::Args)]
pub(crate) struct EvolveArgs {
    /// Corpus file, one example per line
    #[arg(required = true)]
    corpus: PathBuf,

    /// Individuals per generation (default: 100)
    #[arg(short, long)]
    population: Option<usize>,

    /// Randomly generated nodes per initial tree, before closing leaves (default: 32)
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Fraction of each generation kept unchanged (default: 0.1)
    #[arg(long)]
    elite: Option<f64>,

    /// Fraction of each generation produced by mutation (default: 0.2)
    #[arg(long)]
    mutation: Option<f64>,

    /// Generations without improvement before stopping (default: 20)
    #[arg(long)]
    patience: Option<usize>,

    /// Stop after this many generations (default: 0, unbounded)
    #[arg(long)]
    max_generations: Option<usize>,

    /// Random seed (default: 42)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Score individuals on a single thread
    #[arg(long)]
    sequential: bool,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resume from a checkpoint
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Directory for the final checkpoint
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the final population, one grammar per line
    #[arg(long)]
    dump: bool,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

impl EvolveArgs {
    fn config(&self) -> Result<EvolutionConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => EvolutionConfig::default(),
        };

        if let Some(n) = self.population {
            config = config.with_population_size(n);
        }
        if let Some(n) = self.nodes {
            config = config.with_node_budget(n);
        }
        if let Some(ratio) = self.elite {
            config = config.with_elite_ratio(ratio);
        }
        if let Some(ratio) = self.mutation {
            config = config.with_mutation_ratio(ratio);
        }
        if let Some(patience) = self.patience {
            config = config.with_patience(patience);
        }
        if let Some(n) = self.max_generations {
            config = config.with_max_generations(n);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if self.sequential {
            config = config.with_parallel(false);
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<EvolutionConfig, CliError> {
    let file = fs::File::open(path)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", path.display())))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn spinner(visible: bool) -> Result<ProgressBar, CliError> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .map_err(|e| CliError::new(e.to_string()))?,
    );
    pb.set_message("evolving...");
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Execute the evolve command.
///
/// # Errors
///
/// Returns an error if the configuration, corpus or checkpoint is invalid,
/// or if writing the checkpoint fails.
pub(crate) fn execute(args: &EvolveArgs) -> Result<(), CliError> {
    let config = args.config()?;
    let corpus = Corpus::load(&args.corpus)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", args.corpus.display())))?;

    let mut population = match &args.resume {
        Some(path) => Population::from_checkpoint(load_checkpoint(path)?, config, corpus)?,
        None => Population::new(config, corpus)?,
    };

    let text = args.format == OutputFormat::Text;
    if text {
        println!("Starting evolution:");
        println!("  Corpus: {} ({} lines)", args.corpus.display(), population.corpus().len());
        println!("  Population: {}", config.population_size);
        println!("  Node budget: {}", config.node_budget);
        println!("  Seed: {}", config.seed);
        println!();
    }

    let pb = spinner(text)?;
    let summary = population.run_with(|generation, grammar, fitness| {
        pb.println(format!("Gen {generation:>5}: fitness={fitness:.4} {grammar}"));
        pb.set_message(format!("best {fitness:.4} (gen {generation})"));
    })?;
    pb.finish_and_clear();

    let checkpoint = match &args.output {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = checkpoint_path(dir, population.generation());
            save_checkpoint(&population.checkpoint(), &path)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    match args.format {
        OutputFormat::Text => {
            println!();
            print!("{}", format_summary(&summary, checkpoint.as_deref()));
        }
        OutputFormat::Json => {
            let json = JsonRunSummary::from_summary(&summary, checkpoint);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    if args.dump {
        population.dump(&mut io::stdout().lock())?;
    }

    Ok(())
}
