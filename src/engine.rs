//! Tick orchestrator.
//!
//! An [`Engine`] owns an ordered list of [`System`]s and runs them once per
//! tick against a [`World`]. A system that returns an error fails the tick:
//! the error is logged, the remaining stages are skipped, whatever earlier
//! stages wrote stays in place and the calendar does not advance.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::{
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    systems::{
        BirthSystem, ConstructionSystem, DemographicSystem, ResourceLedgerSystem, SecuritySystem,
        UpkeepSystem, WorkforceSystem,
    },
    world::{World, WorldSnapshot},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    /// Zero disables snapshots.
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Ledger, security, demographics, upkeep, construction, births, then
    /// workforce.
    pub fn standard_pipeline(self) -> Self {
        self.with_system(ResourceLedgerSystem::new())
            .with_system(SecuritySystem::new())
            .with_system(DemographicSystem::new())
            .with_system(UpkeepSystem::new())
            .with_system(ConstructionSystem::new())
            .with_system(BirthSystem::new())
            .with_system(WorkforceSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            settings: self.settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickOutcome {
    Completed,
    Failed { stage: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// World tick after this attempt; unchanged when the tick failed.
    pub tick: u64,
    pub outcome: TickOutcome,
    pub stages_run: Vec<String>,
    pub snapshot_path: Option<PathBuf>,
}

impl TickReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == TickOutcome::Completed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks_completed: u64,
    pub ticks_failed: u64,
    pub final_tick: u64,
    pub final_population: u64,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage once. Only snapshot I/O makes this return `Err`;
    /// stage failures are reported through [`TickOutcome::Failed`].
    pub fn tick(&mut self, world: &mut World) -> Result<TickReport> {
        let current_tick = world.tick();
        let tick_multiplier = world.tick_multiplier();
        let mut stages_run = Vec::with_capacity(self.systems.len());

        for system in &mut self.systems {
            let stage = system.name().to_string();
            let mut rng_stream = self.rng.stream(&stage);
            let ctx = SystemContext {
                tick: current_tick,
                tick_multiplier,
                scenario_name: &self.settings.scenario_name,
            };
            if let Err(err) = system.run(&ctx, world, &mut rng_stream) {
                let message = format!("{err:#}");
                error!(
                    tick = current_tick,
                    stage = %stage,
                    error = %message,
                    "Tick failed, skipping remaining stages"
                );
                return Ok(TickReport {
                    tick: current_tick,
                    outcome: TickOutcome::Failed {
                        stage,
                        error: message,
                    },
                    stages_run,
                    snapshot_path: None,
                });
            }
            stages_run.push(stage);
        }

        world.advance_time();
        let snapshot_path = self
            .snapshot_writer
            .maybe_write(world, &self.settings.scenario_name)?;
        Ok(TickReport {
            tick: world.tick(),
            outcome: TickOutcome::Completed,
            stages_run,
            snapshot_path,
        })
    }

    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<RunSummary> {
        self.run_with_hook(world, ticks, |_| {})
    }

    /// Like [`Engine::run`], handing the post-tick snapshot to `hook` after
    /// every tick, failed ones included.
    pub fn run_with_hook<F>(&mut self, world: &mut World, ticks: u64, mut hook: F) -> Result<RunSummary>
    where
        F: FnMut(WorldSnapshot),
    {
        info!(
            scenario = %self.settings.scenario_name,
            seed = self.settings.seed,
            ticks,
            population = world.total_population(),
            "Simulation starting"
        );

        let mut summary = RunSummary::default();
        for _ in 0..ticks {
            let report = self.tick(world)?;
            if report.is_completed() {
                summary.ticks_completed += 1;
            } else {
                summary.ticks_failed += 1;
            }
            hook(world.snapshot(&self.settings.scenario_name));
        }
        summary.final_tick = world.tick();
        summary.final_population = world.total_population();

        info!(
            scenario = %self.settings.scenario_name,
            ticks_completed = summary.ticks_completed,
            ticks_failed = summary.ticks_failed,
            final_tick = summary.final_tick,
            final_population = summary.final_population,
            "Simulation complete"
        );
        Ok(summary)
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    /// Days represented by this tick.
    pub tick_multiplier: f64,
    pub scenario_name: &'a str,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Rates,
        land::{Biome, BuildingCatalog, Land},
    };
    use anyhow::bail;

    struct Recorder {
        name: &'static str,
        fail: bool,
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn run(
            &mut self,
            _ctx: &SystemContext,
            world: &mut World,
            _rng: &mut SystemRng<'_>,
        ) -> Result<()> {
            if self.fail {
                bail!("{} broke", self.name);
            }
            world.resources_mut().knowledge += 1.0;
            Ok(())
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            scenario_name: "unit".into(),
            seed: 7,
            snapshot_interval_ticks: 0,
            snapshot_dir: PathBuf::from("unused"),
        }
    }

    fn world() -> World {
        World::new(
            Rates::default(),
            BuildingCatalog::default(),
            Land::generate(1, 0, Biome::Grassland, 1000),
        )
    }

    #[test]
    fn standard_pipeline_runs_in_order() {
        let engine = EngineBuilder::new(settings()).standard_pipeline().build();
        assert_eq!(
            engine.system_names(),
            vec![
                "ledger",
                "security",
                "demographics",
                "upkeep",
                "construction",
                "births",
                "workforce"
            ]
        );
    }

    #[test]
    fn failing_stage_skips_the_rest_and_keeps_earlier_writes() {
        let mut engine = EngineBuilder::new(settings())
            .with_system(Recorder {
                name: "first",
                fail: false,
            })
            .with_system(Recorder {
                name: "second",
                fail: true,
            })
            .with_system(Recorder {
                name: "third",
                fail: false,
            })
            .build();
        let mut world = world();

        let report = engine.tick(&mut world).unwrap();
        assert_eq!(report.tick, 0);
        assert_eq!(report.stages_run, vec!["first".to_string()]);
        match report.outcome {
            TickOutcome::Failed { stage, error } => {
                assert_eq!(stage, "second");
                assert!(error.contains("second broke"));
            }
            TickOutcome::Completed => panic!("tick should fail"),
        }
        assert_eq!(world.resources().knowledge, 1.0);
        assert_eq!(world.tick(), 0);
    }

    #[test]
    fn completed_tick_advances_the_calendar() {
        let mut engine = EngineBuilder::new(settings())
            .with_system(Recorder {
                name: "only",
                fail: false,
            })
            .build();
        let mut world = world();
        let summary = engine.run(&mut world, 3).unwrap();
        assert_eq!(summary.ticks_completed, 3);
        assert_eq!(summary.final_tick, 3);
        assert_eq!(world.time().month, 4);
    }
}
