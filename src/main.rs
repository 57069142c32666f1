use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ejecta_sim::config::SimConfig;
use ejecta_sim::monte_carlo::{run_trials, summarize_trials};
use ejecta_sim::output::{
    create_timestamped_output_dir, write_json, write_state_csv, write_trials_csv, OutputFiles,
};
use ejecta_sim::{Simulation, Species, WindMode};
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WindArg {
    Calm,
    PerRun,
    PerTick,
}

impl From<WindArg> for WindMode {
    fn from(arg: WindArg) -> Self {
        match arg {
            WindArg::Calm => WindMode::Calm,
            WindArg::PerRun => WindMode::PerRun,
            WindArg::PerTick => WindMode::PerTick,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Volcanic ejecta dispersal simulation")]
struct Cli {
    /// JSON configuration file (missing fields take defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output base directory; each invocation gets a timestamped subdirectory
    #[arg(long, default_value = "output-ejecta-sim")]
    output: PathBuf,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Number of frames
    #[arg(long)]
    frames: Option<u64>,

    /// Ticks per frame
    #[arg(long)]
    steps_per_frame: Option<u64>,

    /// Integration step in seconds
    #[arg(long)]
    dt: Option<f64>,

    /// Wind regime; also resets the wind speed range to the regime default
    #[arg(long, value_enum)]
    wind: Option<WindArg>,

    /// Also run a batch of N independent trials
    #[arg(long)]
    trials: Option<usize>,

    /// Print results without writing files
    #[arg(long)]
    no_write: bool,

    /// Log fragmentation events
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    config: &'a SimConfig,
    run: &'a ejecta_sim::RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    trials: Option<&'a ejecta_sim::TrialSummary>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let mut cfg = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(v) = cli.seed {
        cfg.seed = v;
    }
    if let Some(v) = cli.frames {
        cfg.total_frames = v;
    }
    if let Some(v) = cli.steps_per_frame {
        cfg.steps_per_frame = v;
    }
    if let Some(v) = cli.dt {
        cfg.dt = v;
    }
    if let Some(v) = cli.wind {
        let mode = WindMode::from(v);
        cfg.wind.mode = mode;
        cfg.wind.speed_range = mode.default_speed_range();
    }
    cfg.validate().context("invalid configuration")?;

    let mut sim = Simulation::new(cfg.clone())?;
    let summary = sim.run().context("simulation run failed")?;

    let trial_batch = match cli.trials {
        Some(runs) => {
            let records = run_trials(&cfg, runs).context("trial batch failed")?;
            let trial_summary = summarize_trials(&cfg, &records);
            Some((records, trial_summary))
        }
        None => None,
    };

    println!(
        "Simulation complete. Ticks: {} | Simulated time: {:.1} s | Exit velocity: {:.1} m/s",
        summary.ticks, summary.simulated_time_s, summary.exit_velocity
    );
    println!(
        "Wind: {:.1} m/s heading {:.0} deg",
        summary.wind_speed, summary.wind_heading_deg
    );
    for species in Species::ALL {
        if let Some(s) = summary.species(species) {
            let distance = s.extrema.map(|e| e.max_distance).unwrap_or(0.0);
            println!(
                "{:>8}: {:>4} live | {:>4} split | max distance {:.1} m",
                species.label(),
                s.count,
                s.split_count,
                distance
            );
        }
    }
    if let Some(speed) = summary
        .species(Species::Rock)
        .and_then(|s| s.extrema)
        .and_then(|e| e.impact_speed)
    {
        println!("Farthest rock impact speed: {speed:.1} m/s");
    }
    println!(
        "Fragmentation events: {} | Suggested safe distance: {:.0} m",
        summary.fragmentation_events, summary.safe_distance_m
    );

    if let Some((_, trial_summary)) = &trial_batch {
        println!(
            "Trials: {} | rock distance {:.1} +/- {:.1} m | particle distance {:.1} +/- {:.1} m",
            trial_summary.n_runs,
            trial_summary.mean_max_rock_distance,
            trial_summary.std_max_rock_distance,
            trial_summary.mean_max_particle_distance,
            trial_summary.std_max_particle_distance
        );
    }

    if cli.no_write {
        return Ok(());
    }

    let output_dir = create_timestamped_output_dir(&cli.output)?;
    let files = OutputFiles::in_dir(output_dir, trial_batch.is_some());

    let report = Report {
        config: &cfg,
        run: &summary,
        trials: trial_batch.as_ref().map(|(_, s)| s),
    };
    write_json(&files.summary_path, &report)?;

    let states: Vec<_> = Species::ALL
        .into_iter()
        .flat_map(|species| sim.current_state(species))
        .collect();
    write_state_csv(&files.final_state_path, &states)?;

    if let (Some(path), Some((records, _))) = (&files.trials_path, &trial_batch) {
        write_trials_csv(path, records)?;
    }

    println!("Run directory: {}", files.output_dir.display());
    Ok(())
}
