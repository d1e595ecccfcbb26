use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use settlement_sim::{
    config::{Scenario, ScenarioLoader},
    engine::{EngineBuilder, EngineSettings},
    runner,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Settlement simulation runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/frontier.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Tick on the scenario's real-time interval instead of as fast as possible
    #[arg(long)]
    realtime: bool,
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    init_tracing(&scenario.logging.level);

    let world = scenario
        .build_world()
        .with_context(|| format!("Failed to build world for scenario '{}'", scenario.name))?;
    let ticks = scenario.ticks(cli.ticks);
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: cli
            .snapshot_interval
            .unwrap_or(scenario.snapshot_interval_ticks),
        snapshot_dir: cli
            .snapshot_dir
            .unwrap_or_else(|| PathBuf::from("snapshots")),
    };
    let engine = EngineBuilder::new(settings).standard_pipeline().build();

    if cli.realtime {
        run_realtime(&scenario, engine, world, ticks).await
    } else {
        run_batch(&scenario, engine, world, ticks).await
    }
}

async fn run_batch(
    scenario: &Scenario,
    mut engine: settlement_sim::Engine,
    mut world: settlement_sim::World,
    ticks: u64,
) -> Result<()> {
    let (summary, world) = tokio::task::spawn_blocking(move || -> Result<_> {
        let summary = engine.run_with_hook(&mut world, ticks, |snapshot| {
            tracing::debug!(
                tick = snapshot.tick,
                population = snapshot.total_population,
                food = snapshot.resources.food,
                "Tick committed"
            );
        })?;
        Ok((summary, world))
    })
    .await??;

    println!(
        "Scenario '{}' completed {} ticks ({} failed). Year {}, month {}. Final population: {}",
        scenario.name,
        summary.ticks_completed,
        summary.ticks_failed,
        world.time().year,
        world.time().month,
        summary.final_population
    );
    Ok(())
}

async fn run_realtime(
    scenario: &Scenario,
    engine: settlement_sim::Engine,
    world: settlement_sim::World,
    ticks: u64,
) -> Result<()> {
    let target = world.tick() + ticks;
    let (handle, task) = runner::spawn(engine, world);
    let mut updates = handle.subscribe();
    info!(scenario = %scenario.name, target_tick = target, "Real-time run started (Ctrl+C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() || updates.borrow().tick >= target {
                    break;
                }
            }
        }
    }

    handle.shutdown().await?;
    let world = task.await??;
    println!(
        "Scenario '{}' stopped at tick {}. Final population: {}",
        scenario.name,
        world.tick(),
        world.total_population()
    );
    Ok(())
}
