//! Eruption Report Example
//!
//! Samples eruption conditions, plays one short run frame by frame and prints
//! the dispersal extremes, then repeats the run over a small trial batch.

use ejecta_sim::monte_carlo::{run_trials, summarize_trials};
use ejecta_sim::{ParameterName, SimConfig, Simulation, Species, WindMode};

fn main() -> ejecta_sim::Result<()> {
    println!("Running volcanic ejecta dispersal...\n");

    let mut config = SimConfig {
        total_frames: 60,
        steps_per_frame: 50,
        scale_launch_by_discharge: true,
        ..SimConfig::default()
    };
    config.wind.mode = WindMode::PerRun;

    let mut sim = Simulation::new(config.clone())?;

    println!("Sampled eruption parameters (n = {}):", sim.parameters().n);
    for (name, estimate) in &sim.parameters().estimates {
        match estimate.std_dev {
            Some(std) => println!("  {name}: {:.3} +/- {:.3}", estimate.mean, std),
            None => println!("  {name}: {:.3}", estimate.mean),
        }
    }
    println!(
        "  effective exit velocity: {:.1} m/s (discharge {:.3e} kg/s)",
        sim.exit_velocity(),
        sim.parameters()
            .mean(ParameterName::MassDischargeRate)
            .unwrap_or_default()
    );
    println!();

    // Frame loop, as a renderer would drive it
    for frame in 0..config.total_frames {
        let mut snapshot = None;
        for _ in 0..config.steps_per_frame {
            snapshot = Some(sim.advance()?);
        }
        if let Some(snapshot) = snapshot {
            if frame % 10 == 0 {
                println!(
                    "  frame {:>3}  t = {:>6.1} s  particles {:>4}  rock distance {:>7.1} m",
                    frame,
                    snapshot.time_s,
                    snapshot.counts[&Species::Particle],
                    sim.tracker().max_distance(Species::Rock)
                );
            }
        }
    }

    let summary = sim.summary();
    println!("\nResults:");
    for species in &summary.species {
        if let Some(extrema) = species.extrema {
            println!(
                "  {:<8} max distance {:>8.1} m at ({:.0}, {:.0}, {:.0})",
                species.species.label(),
                extrema.max_distance,
                extrema.owner_position.x,
                extrema.owner_position.y,
                extrema.owner_position.z
            );
        }
    }
    println!("  rocks landed: {}", summary.rock_impact_speeds.len());
    println!(
        "  suggested safe distance: {:.0} m",
        summary.safe_distance_m
    );

    let batch = SimConfig {
        total_frames: 20,
        ..config
    };
    let records = run_trials(&batch, 10)?;
    let trials = summarize_trials(&batch, &records);
    println!(
        "\n10 trials: rock distance {:.1} +/- {:.1} m, safe distance {:.0} m",
        trials.mean_max_rock_distance, trials.std_max_rock_distance, trials.safe_distance_m
    );

    Ok(())
}
