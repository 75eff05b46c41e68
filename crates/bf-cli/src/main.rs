//! backfold CLI

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bf_folder::{JetFolder, SourceCache, SweepConfig, ToyConfig, run_sweep, toy};

use crate::config::{RunConfig, read_json};

#[derive(Parser)]
#[command(name = "backfold")]
#[command(about = "backfold - unfolding with Monte-Carlo backfolding closure")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unfold, backfold and write one result bundle
    Run {
        /// Run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for the run summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Run a grid of algorithms, regularizations and prior shapes
    Sweep {
        /// Sweep configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for the sweep summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Generate toy input spectra
    Generate {
        /// Histogram file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Toy settings (JSON). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the toy seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of training draws
        #[arg(long)]
        training_events: Option<u64>,

        /// Override the number of pseudo-data draws
        #[arg(long)]
        data_events: Option<u64>,
    },

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Run { config, output, threads } => cmd_run(&config, output.as_ref(), threads),
        Commands::Sweep { config, output, threads } => cmd_sweep(&config, output.as_ref(), threads),
        Commands::Generate { output, config, seed, training_events, data_events } => {
            cmd_generate(&output, config.as_ref(), seed, training_events, data_events)
        }
        Commands::Version => {
            println!("backfold {}", bf_core::VERSION);
            Ok(())
        }
    }
}

fn setup_threads(threads: usize) {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

fn cmd_run(config: &PathBuf, output: Option<&PathBuf>, threads: usize) -> Result<()> {
    setup_threads(threads);
    let cfg: RunConfig = read_json(config)?;
    let sources = SourceCache::open(&cfg.inputs)?;

    let mut folder = JetFolder::new(&cfg.output);
    sources.configure(&mut folder, &cfg.inputs, &cfg.metadata, cfg.prior.clone(), cfg.unfold.clone())?;
    let result = folder.run().with_context(|| format!("run {}", config.display()))?;
    tracing::info!(
        chi2_unfold = result.chi2_unfold.reduced,
        chi2_backfold = result.chi2_backfold.reduced,
        output = %cfg.output.display(),
        "run complete"
    );

    let synthesis = folder.synthesis().map(|s| {
        serde_json::json!({
            "target_integral": s.target_integral,
            "raw_prior_integral": s.raw_prior_integral,
            "accepted": s.accepted,
            "generated": s.generated,
        })
    });
    let output_json = serde_json::json!({
        "output": cfg.output,
        "algorithm": cfg.unfold.algorithm,
        "regularization": cfg.unfold.regularization,
        "prior": cfg.prior.family,
        "labels": result.labels,
        "chi2_unfold": result.chi2_unfold,
        "chi2_backfold": result.chi2_backfold,
        "backfold": result.backfold_stats,
        "synthesis": synthesis,
    });
    write_json(output, output_json)
}

fn cmd_sweep(config: &PathBuf, output: Option<&PathBuf>, threads: usize) -> Result<()> {
    setup_threads(threads);
    let cfg: SweepConfig = read_json(config)?;
    let summary = run_sweep(&cfg)?;
    if let Some(best) = summary.best_point() {
        tracing::info!(tag = %best.point.tag(), "best point");
    }
    write_json(output, serde_json::to_value(&summary)?)
}

fn cmd_generate(
    output: &PathBuf,
    config: Option<&PathBuf>,
    seed: Option<u64>,
    training_events: Option<u64>,
    data_events: Option<u64>,
) -> Result<()> {
    let mut cfg: ToyConfig = match config {
        Some(path) => read_json(path)?,
        None => ToyConfig::default(),
    };
    if let Some(s) = seed {
        cfg.seed = s;
    }
    if let Some(n) = training_events {
        cfg.training_events = n;
    }
    if let Some(n) = data_events {
        cfg.data_events = n;
    }
    toy::generate(&cfg)?.write(output)?;
    tracing::info!(path = %output.display(), "toy inputs written");
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
