use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;
use serde::Serialize;
use slotmap::Key;

use crate::monte_carlo::TrialRecord;
use crate::state::{EntityState, SplitStage};
use crate::Result;

/// Files written for one invocation
#[derive(Debug, Clone, Serialize)]
pub struct OutputFiles {
    pub output_dir: PathBuf,
    pub summary_path: PathBuf,
    pub final_state_path: PathBuf,
    pub trials_path: Option<PathBuf>,
}

impl OutputFiles {
    pub fn in_dir(output_dir: PathBuf, with_trials: bool) -> Self {
        Self {
            summary_path: output_dir.join("summary.json"),
            final_state_path: output_dir.join("final_state.csv"),
            trials_path: with_trials.then(|| output_dir.join("trials.csv")),
            output_dir,
        }
    }
}

/// Create `<root>/<UTC timestamp>`, suffixing a counter if it already exists
pub fn create_timestamped_output_dir(output_root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = output_root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = output_root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.6}")
}

fn fmt_option_f64(value: Option<f64>) -> String {
    value.map(fmt_f64).unwrap_or_default()
}

fn split_label(stage: SplitStage) -> &'static str {
    match stage {
        SplitStage::Unsplit => "unsplit",
        SplitStage::Split => "split",
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub fn write_trials_csv(path: &Path, records: &[TrialRecord]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "run_id",
        "seed",
        "exit_velocity",
        "wind_speed",
        "max_particle_distance",
        "max_rock_distance",
        "rock_impact_speed",
        "fragmentation_events",
    ])?;

    for record in records {
        writer.write_record([
            record.run_id.to_string(),
            record.seed.to_string(),
            fmt_f64(record.exit_velocity),
            fmt_f64(record.wind_speed),
            fmt_f64(record.max_particle_distance),
            fmt_f64(record.max_rock_distance),
            fmt_option_f64(record.rock_impact_speed),
            record.fragmentation_events.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_state_csv(path: &Path, states: &[EntityState]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "species",
        "id",
        "x",
        "y",
        "z",
        "vx",
        "vy",
        "vz",
        "split_stage",
    ])?;

    for state in states {
        writer.write_record([
            state.species.label().to_string(),
            state.id.data().as_ffi().to_string(),
            fmt_f64(state.position.x),
            fmt_f64(state.position.y),
            fmt_f64(state.position.z),
            fmt_f64(state.velocity.x),
            fmt_f64(state.velocity.y),
            fmt_f64(state.velocity.z),
            split_label(state.split_stage).to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
