//! # Astro CLI (`astro`)
//!
//! ## Usage
//!
//! ```bash
//! astro --config ./config/astro.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `astro serve` | Start the web form and JSON endpoint |
//! | `astro chart` | Print the birth chart and planetary effects |
//! | `astro ask --query "..."` | Run one query through the full pipeline |
//! | `astro index build` | Embed the knowledge base into the vector index |
//! | `astro index stats` | Show what the current index contains |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use astro_insights::chart::Chart;
use astro_insights::config::{self, Config};
use astro_insights::insight::InsightEngine;
use astro_insights::models::BirthDetails;
use astro_insights::positions::{FixedPositions, PositionSource};
use astro_insights::{embedding, indexer, server};

/// Astro: birth-chart astrology answers grounded in a library of books.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/astro.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "astro",
    about = "Astro: personalised astrology answers from a birth chart and a book library",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/astro.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind`. Requires the LLM API key in the environment.
    Serve,

    /// Print the birth chart and the effect of every placed planet.
    ///
    /// Works without a config file, using the default placements.
    Chart,

    /// Answer one question from the command line.
    Ask {
        /// The question to answer.
        #[arg(long)]
        query: String,

        #[arg(long, default_value = "")]
        name: String,

        /// Date of birth (YYYY-MM-DD).
        #[arg(long, default_value = "")]
        dob: String,

        /// Time of birth (HH:MM).
        #[arg(long, default_value = "")]
        time_of_birth: String,

        #[arg(long, default_value = "")]
        place_of_birth: String,

        #[arg(long, default_value = "")]
        gender: String,
    },

    /// Manage the vector index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild the index from `[ingest].documents_path`.
    ///
    /// Replaces any existing index file.
    Build,

    /// Print chunk, source and model counts for the current index.
    Stats,
}

/// Loads the config file if present, otherwise falls back to defaults.
fn load_or_minimal(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require a config file
    if let Commands::Chart = cli.command {
        let cfg = load_or_minimal(&cli.config)?;
        let positions = FixedPositions::from_config(&cfg.chart);
        let mut chart = Chart::new();
        chart.assign_planets_to_houses(positions.positions(&BirthDetails::default()));
        print!("{}", chart.display_chart());
        println!();
        println!("Planetary effects:");
        for (house, effect) in &chart.calculate_planetary_effects() {
            println!("  House {}: {}", house, effect);
        }
        println!();
        println!("House details:");
        for line in chart.house_details().lines() {
            println!("  {}", line);
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            query,
            name,
            dob,
            time_of_birth,
            place_of_birth,
            gender,
        } => {
            let engine = InsightEngine::from_config(&cfg)?;
            let details = BirthDetails {
                name,
                dob,
                time_of_birth,
                place_of_birth,
                gender,
                query,
            };
            let response = engine.answer(&details).await?;
            println!("{}", response.answer);
            println!();
            print!("{}", response.birth_chart);
        }
        Commands::Index { action } => match action {
            IndexAction::Build => {
                let provider = embedding::create_provider(&cfg.embedding)
                    .context("Failed to set up embedding provider")?;
                indexer::run_build(&cfg, provider.as_ref()).await?;
            }
            IndexAction::Stats => {
                indexer::run_stats(&cfg)?;
            }
        },
        Commands::Chart => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
