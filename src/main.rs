//! Conflict Analytics - command line
//!
//! Builds a conflict graph from a JSON file of node and edge records and
//! prints the analysis as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conflict_analytics::{AnalysisConfig, AnalysisOrchestrator, GraphInput};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "conflict-analytics")]
#[command(about = "Structural and dynamical analysis of conflict networks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis pipeline
    Analyze {
        /// JSON file with `nodes` and `edges`
        #[arg(short, long)]
        input: PathBuf,

        /// YAML configuration file
        #[arg(short, long, env = "CONFLICT_ANALYTICS_CONFIG")]
        config: Option<PathBuf>,

        /// Seed for every randomized step (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Monte-Carlo cascade trials (overrides config)
        #[arg(long)]
        trials: Option<usize>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Build the graph and print the build report
    Validate {
        /// JSON file with `nodes` and `edges`
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing (stderr, so stdout stays machine-readable)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,conflict_analytics=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            config,
            seed,
            trials,
            pretty,
        } => {
            let mut config = AnalysisConfig::from_yaml_and_env(config.as_deref())?;
            if let Some(seed) = seed {
                config.set_seed(seed);
            }
            if let Some(trials) = trials {
                config.propagation.trials = trials;
            }
            let mut orchestrator = AnalysisOrchestrator::new(config)?;

            let (graph, report) = read_input(&input)?.build(&orchestrator.config().build)?;
            if report.dropped_edges() > 0 {
                tracing::warn!("{} relations were dropped while building", report.dropped_edges());
            }

            let analysis = orchestrator.run(&graph);
            print_json(&analysis, pretty)
        }
        Commands::Validate { input } => {
            let (graph, report) = read_input(&input)?.build(&Default::default())?;
            tracing::info!(
                "Graph has {} nodes and {} relations",
                graph.node_count(),
                graph.edge_count()
            );
            print_json(&report, true)
        }
    }
}

fn read_input(path: &Path) -> Result<GraphInput> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid graph JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
