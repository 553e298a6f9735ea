use std::path::PathBuf;

use clap::Parser;
use components::Destination;
use engine_app::{Coordinator, CycleConfig};
use engine_event::SimTime;
use engine_record::MsgpackRecorder;
use move_command::{Scenario, install, max_remaining};
use tracing::info;

#[derive(Parser)]
#[command(name = "move_command", about = "Vehicles commanded halfway to a shared destination")]
struct Args {
    /// Virtual time at which the run stops
    #[arg(long, default_value_t = 100.0)]
    horizon: f64,

    /// Number of vehicles
    #[arg(short, long, default_value_t = 1000)]
    vehicles: u32,

    /// Seed for command durations
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Stop after this many cycles (0 for no limit)
    #[arg(long, default_value_t = 0)]
    max_cycles: u64,

    /// Planner wake period
    #[arg(long, default_value_t = 1.0)]
    replan_period: f64,

    /// Write a MessagePack record log of every cycle to this path
    #[arg(short, long)]
    record: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "move_command=info,engine_app=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = CycleConfig::new()
        .horizon(SimTime::new(args.horizon)?)
        .max_cycles(args.max_cycles);
    let mut coordinator = Coordinator::new(config);
    if let Some(path) = &args.record {
        info!(path = %path.display(), "recording cycles");
        coordinator = coordinator.with_recorder(MsgpackRecorder::create(path)?);
    }

    let scenario = Scenario {
        vehicles: args.vehicles,
        destination: Destination::new(10.0, 10.0),
        replan_period: args.replan_period,
        seed: args.seed,
    };
    install(&mut coordinator, &scenario)?;
    info!(
        entities = coordinator.store().entity_count(),
        seed = scenario.seed,
        "scenario ready"
    );

    let summary = coordinator.run()?;
    info!(
        cycles = summary.cycles,
        end_time = %summary.end_time,
        reason = ?summary.reason,
        events = summary.events_fired,
        skipped = summary.skipped_faults,
        remaining = max_remaining(coordinator.store()),
        "run finished"
    );

    Ok(())
}
