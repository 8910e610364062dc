//! # Pantry CLI (`pantry`)
//!
//! ## Usage
//!
//! ```bash
//! pantry --config ./config/pantry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pantry recommend <INGREDIENT>...` | Rank recipes for the given ingredients |
//! | `pantry serve` | Start the HTTP API |
//! | `pantry worker` | Answer one matching request over stdin/stdout |
//! | `pantry embed` | Precompute the recipe embedding cache |
//! | `pantry corpus` | Show corpus statistics |
//!
//! ## Examples
//!
//! ```bash
//! pantry recommend chicken rice "soy sauce" --top-k 3
//! pantry recommend tomato basil --min-score 0.2 --json
//! echo '{"ingredients": ["egg"]}' | pantry worker
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); stdout carries only
//! command output.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use pantry::{config, embed_cmd, recommend, server, stats, worker};

/// Pantry: recipe recommendations from the ingredients you have.
#[derive(Parser)]
#[command(
    name = "pantry",
    about = "Pantry: recipe recommendations from the ingredients you have",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pantry.toml`.
    #[arg(long, global = true, default_value = "./config/pantry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank recipes for a list of ingredients.
    Recommend {
        /// Ingredients on hand. Quote multi-word ingredients.
        #[arg(required = true)]
        ingredients: Vec<String>,

        /// Maximum number of recipes to return (1-100, default 5).
        #[arg(long)]
        top_k: Option<usize>,

        /// Drop recipes scoring below this value (0-1, default 0).
        #[arg(long)]
        min_score: Option<f64>,

        /// Print the raw JSON response.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Read one request from stdin, write the response to stdout.
    ///
    /// Used by the `command` backend. Exits non-zero if the request failed.
    Worker,

    /// Precompute and cache recipe embeddings.
    Embed {
        /// Discard any existing cache first.
        #[arg(long)]
        force: bool,
    },

    /// Show recipe corpus statistics.
    Corpus,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    let ok = match cli.command {
        Commands::Recommend {
            ingredients,
            top_k,
            min_score,
            json,
        } => recommend::run_recommend(&cfg, ingredients, top_k, min_score, json).await?,
        Commands::Serve => {
            server::run_server(&cfg).await?;
            true
        }
        Commands::Worker => worker::run_worker(&cfg).await?,
        Commands::Embed { force } => {
            embed_cmd::run_embed(&cfg, force).await?;
            true
        }
        Commands::Corpus => {
            stats::run_corpus_stats(&cfg)?;
            true
        }
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
