//! tunestep - melody tokenization and generation from the command line
//!
//! Subcommands:
//! - `tunestep encode <scores_dir>` - Encode JSON scores into per-song token files
//! - `tunestep corpus` - Join encoded songs into one corpus and build the vocabulary
//! - `tunestep windows` - Inspect training windows over the corpus
//! - `tunestep fit` - Fit the n-gram predictor on the corpus
//! - `tunestep generate <seed>` - Generate a melody from a seed
//! - `tunestep render <tokens_file> <out.mid>` - Render a token stream to MIDI
//! - `tunestep config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tuneconf::TuneConfig;

mod commands;

#[derive(Parser)]
#[command(name = "tunestep")]
#[command(about = "Fixed-step melody tokenization and temperature-sampled generation")]
#[command(version)]
struct Cli {
    /// Config file, used instead of ./tunestep.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode every *.json score under a directory into the dataset directory
    Encode {
        /// Directory of JSON scores, walked recursively
        scores_dir: PathBuf,
    },

    /// Assemble the dataset into the corpus file and write the vocabulary
    Corpus,

    /// Show the training windows of the corpus
    Windows {
        /// Number of pairs to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Fit the n-gram predictor and save it
    Fit {
        /// Longest context counted (defaults to generation.ngram_order)
        #[arg(long)]
        order: Option<usize>,
    },

    /// Generate a melody continuing a seed
    Generate {
        /// Whitespace-separated seed tokens, e.g. "60 - - - 62"
        seed: String,

        /// Maximum tokens to sample
        #[arg(long)]
        steps: Option<usize>,

        #[arg(long)]
        temperature: Option<f64>,

        /// Most recent ids handed to the predictor
        #[arg(long)]
        max_context: Option<usize>,

        /// Seed for reproducible sampling
        #[arg(long)]
        rng_seed: Option<u64>,

        /// Also render the melody to this MIDI file
        #[arg(long)]
        midi: Option<PathBuf>,
    },

    /// Render a token stream file to MIDI
    Render {
        tokens_file: PathBuf,

        out: PathBuf,

        /// Quarter notes per minute (defaults to generation.tempo_bpm)
        #[arg(long)]
        tempo: Option<f64>,
    },

    /// Print the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = TuneConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_new(&config.telemetry.log_level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if !matches!(cli.command, Commands::Config) {
        config.validate().context("Invalid configuration")?;
    }

    match cli.command {
        Commands::Encode { scores_dir } => {
            commands::encode(&config, &scores_dir)?;
        }
        Commands::Corpus => {
            commands::corpus(&config)?;
        }
        Commands::Windows { limit } => {
            commands::windows(&config, limit)?;
        }
        Commands::Fit { order } => {
            commands::fit(&config, order)?;
        }
        Commands::Generate {
            seed,
            steps,
            temperature,
            max_context,
            rng_seed,
            midi,
        } => {
            let mut generation = config.generation.clone();
            generation.num_steps = steps.unwrap_or(generation.num_steps);
            generation.temperature = temperature.unwrap_or(generation.temperature);
            generation.max_context_length = max_context.unwrap_or(generation.max_context_length);
            generation.rng_seed = rng_seed.or(generation.rng_seed);
            commands::generate(&config, &generation, &seed, midi.as_deref())?;
        }
        Commands::Render {
            tokens_file,
            out,
            tempo,
        } => {
            let tempo = tempo.unwrap_or(config.generation.tempo_bpm);
            commands::render(&config, &tokens_file, &out, tempo)?;
        }
        Commands::Config => {
            commands::show_config(&config, &sources)?;
        }
    }

    Ok(())
}
