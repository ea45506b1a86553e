//! `partlink` CLI: link localization tables, simulate movies, evaluate scenarios.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use linker_core::metrics::{LinkingMetrics, TrajectoryStats};
use linker_core::{LinkOutput, Linker, LinkerConfig};
use sim::scenarios::{Scenario, ScenarioKind};
use sim::table::{self, LocalizationTable};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "partlink", about = "Single-molecule particle linking CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link a localization table into trajectories.
    Link {
        /// Path to the localization table JSON file
        input: PathBuf,
        #[command(flatten)]
        params: LinkParams,
        /// Save trajectories to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Simulate a named scenario and write its localization table.
    Simulate {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Localization table output path
        #[arg(long, default_value = "table.json")]
        output: PathBuf,
        /// Also save the ground-truth emitter labels
        #[arg(long)]
        truth: Option<PathBuf>,
    },
    /// Simulate a scenario, link it, and score the links against ground truth.
    Evaluate {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Linking parameters; flags override the config file, which overrides defaults.
#[derive(Args)]
struct LinkParams {
    /// Base configuration (JSON `LinkerConfig`)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    max_displacement: Option<f64>,
    #[arg(long)]
    max_blinking: Option<u32>,
    #[arg(long)]
    quality_threshold: Option<f64>,
    /// Disable rayon parallelism
    #[arg(long)]
    serial: bool,
}

impl LinkParams {
    fn resolve(&self) -> Result<LinkerConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => LinkerConfig::default(),
        };
        if let Some(v) = self.max_displacement {
            cfg.max_displacement = v;
        }
        if let Some(v) = self.max_blinking {
            cfg.max_blinking = v;
        }
        if let Some(v) = self.quality_threshold {
            cfg.quality_threshold = v;
        }
        if self.serial {
            cfg.parallel = false;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Link {
            input,
            params,
            output,
        } => {
            run_link(&input, &params, output.as_deref())?;
        }
        Commands::Simulate {
            scenario,
            seed,
            output,
            truth,
        } => {
            run_simulate(scenario, seed, &output, truth.as_deref())?;
        }
        Commands::Evaluate {
            scenario,
            seed,
            output,
        } => {
            run_evaluate(scenario, seed, output.as_deref())?;
        }
    }

    Ok(())
}

fn run_link(input: &Path, params: &LinkParams, output_path: Option<&Path>) -> Result<()> {
    let config = params.resolve()?;
    tracing::debug!(?config, "resolved linker config");
    let table = table::load_table(input)
        .with_context(|| format!("loading table {}", input.display()))?;
    let frames = table.frames()?;
    println!(
        "Linking {} particles over {} frames (max_displacement={}, max_blinking={})...",
        frames.particle_count(),
        frames.len(),
        config.max_displacement,
        config.max_blinking,
    );

    let start = std::time::Instant::now();
    let out = Linker::run(config, frames.frames(), None)?;
    let elapsed = start.elapsed();

    print_summary(&out, elapsed.as_secs_f64());

    if let Some(opath) = output_path {
        table::save_trajectories(&out.trajectories, opath)?;
        println!("Trajectories saved to {}", opath.display());
    }
    Ok(())
}

fn run_simulate(
    kind: ScenarioKind,
    seed: u64,
    output: &Path,
    truth_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Simulating scenario '{}' (seed={}, {} emitters, {} frames)...",
        scenario.name,
        seed,
        scenario.emitters.len(),
        scenario.n_frames
    );
    let movie = scenario.run()?;

    table::save_table(&LocalizationTable::new(movie.detections()), output)?;
    println!("{} detections saved to {}", movie.n_detections(), output.display());

    if let Some(tpath) = truth_path {
        table::save_truth(&movie.truth, tpath)?;
        println!("Ground truth saved to {}", tpath.display());
    }
    Ok(())
}

fn run_evaluate(kind: ScenarioKind, seed: u64, output_path: Option<&Path>) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!("Evaluating scenario '{}' (seed={})...", scenario.name, seed);

    let movie = scenario.run()?;
    let frames = movie.frame_sequence()?;
    let max_gap = scenario.linking.max_link_gap();

    let start = std::time::Instant::now();
    let out = Linker::run(scenario.linking.clone(), frames.frames(), None)?;
    let elapsed = start.elapsed();

    print_summary(&out, elapsed.as_secs_f64());

    let metrics = LinkingMetrics::evaluate(&out.trajectories, &movie.truth, max_gap);
    println!(
        "Links: {} true, {} false, {} missed (precision={:.3}, recall={:.3})",
        metrics.true_links,
        metrics.false_links,
        metrics.missed_links,
        metrics.precision(),
        metrics.recall(),
    );

    if let Some(opath) = output_path {
        let json = serde_json::json!({
            "scenario": scenario.name,
            "seed": seed,
            "elapsed_s": elapsed.as_secs_f64(),
            "detections": movie.n_detections(),
            "metrics": metrics,
            "precision": metrics.precision(),
            "recall": metrics.recall(),
            "trajectories": TrajectoryStats::from_trajectories(&out.trajectories),
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", opath.display());
    }
    Ok(())
}

fn print_summary(out: &LinkOutput, elapsed_s: f64) {
    let stats = TrajectoryStats::from_trajectories(&out.trajectories);
    println!(
        "Done: {} trajectories (mean length {:.2}, longest {}), {} rejected, elapsed={:.2}s",
        stats.n_trajectories,
        stats.mean_length,
        stats.longest,
        stats.n_rejected_particles,
        elapsed_s,
    );
    if !out.reports.is_empty() {
        let subnetworks: usize = out.reports.iter().map(|r| r.subnetworks).sum();
        let large: usize = out.reports.iter().map(|r| r.large_subnetworks).sum();
        let largest = out.reports.iter().map(|r| r.largest_subnetwork).max().unwrap_or(0);
        println!(
            "Subnetworks: {} solved, largest {}, {} above the size warning",
            subnetworks, largest, large
        );
    }
}
