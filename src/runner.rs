//! Real-time driver for an [`Engine`].
//!
//! [`spawn`] moves the engine and world onto a tokio task that ticks on a
//! repeating timer. A [`RunnerHandle`] controls it:
//!
//! - **Pause/resume**: automatic ticks are skipped while paused
//! - **Step**: one manual tick, allowed while paused
//! - **Tick interval**: changing it replaces the timer, so only one is live
//! - **Commands**: applied between ticks, never during one
//!
//! Every committed state is published on a watch channel for readers.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    clock::SpeedLevel,
    commands::Command,
    engine::{Engine, TickReport},
    error::SimError,
    world::{World, WorldSnapshot},
};

enum Control {
    Step {
        reply: oneshot::Sender<Result<TickReport>>,
    },
    Pause,
    Resume,
    SetTickInterval(Duration),
    SetSpeed(SpeedLevel),
    Apply {
        command: Command,
        reply: oneshot::Sender<Result<(), SimError>>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct RunnerHandle {
    control: mpsc::Sender<Control>,
    snapshots: watch::Receiver<Arc<WorldSnapshot>>,
}

impl RunnerHandle {
    /// Runs one tick now, regardless of the pause flag.
    pub async fn step(&self) -> Result<TickReport> {
        let (reply, response) = oneshot::channel();
        self.send(Control::Step { reply }).await?;
        response.await.map_err(|_| anyhow!("runner stopped"))?
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Control::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(Control::Resume).await
    }

    pub async fn set_tick_interval(&self, interval: Duration) -> Result<()> {
        self.send(Control::SetTickInterval(interval)).await
    }

    pub async fn set_speed(&self, speed: SpeedLevel) -> Result<()> {
        self.send(Control::SetSpeed(speed)).await
    }

    /// Applies a command between ticks. The outer error means the runner
    /// is gone; the inner one is the command's own rejection.
    pub async fn apply(&self, command: Command) -> Result<Result<(), SimError>> {
        let (reply, response) = oneshot::channel();
        self.send(Control::Apply { command, reply }).await?;
        response.await.map_err(|_| anyhow!("runner stopped"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Control::Shutdown).await
    }

    pub fn latest(&self) -> Arc<WorldSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WorldSnapshot>> {
        self.snapshots.clone()
    }

    async fn send(&self, control: Control) -> Result<()> {
        self.control
            .send(control)
            .await
            .map_err(|_| anyhow!("runner stopped"))
    }
}

fn ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

struct Runner {
    engine: Engine,
    world: World,
    scenario: String,
    snapshots: watch::Sender<Arc<WorldSnapshot>>,
}

impl Runner {
    fn publish(&self) {
        self.snapshots
            .send_replace(Arc::new(self.world.snapshot(&self.scenario)));
    }

    fn tick(&mut self) -> Result<TickReport> {
        let report = self.engine.tick(&mut self.world);
        self.publish();
        report
    }

    fn set_interval(&mut self, interval: Duration, ticker_slot: &mut Interval) {
        self.world.set_tick_interval(interval);
        *ticker_slot = ticker(self.world.tick_interval());
        info!(
            interval_ms = self.world.tick_interval().as_millis() as u64,
            "Tick interval changed"
        );
        self.publish();
    }

    async fn run(mut self, mut control: mpsc::Receiver<Control>) -> Result<World> {
        let mut timer = ticker(self.world.tick_interval());
        info!(
            scenario = %self.scenario,
            interval_ms = self.world.tick_interval().as_millis() as u64,
            paused = self.world.is_paused(),
            "Runner started"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if self.world.is_paused() {
                        continue;
                    }
                    if let Err(err) = self.tick() {
                        let message = format!("{err:#}");
                        error!(tick = self.world.tick(), error = %message, "Snapshot write failed");
                    }
                }
                message = control.recv() => {
                    let Some(message) = message else {
                        debug!("All runner handles dropped");
                        break;
                    };
                    match message {
                        Control::Step { reply } => {
                            let _ = reply.send(self.tick());
                        }
                        Control::Pause => {
                            self.world.set_paused(true);
                            info!(tick = self.world.tick(), "Simulation paused");
                            self.publish();
                        }
                        Control::Resume => {
                            self.world.set_paused(false);
                            info!(tick = self.world.tick(), "Simulation resumed");
                            self.publish();
                        }
                        Control::SetTickInterval(interval) => self.set_interval(interval, &mut timer),
                        Control::SetSpeed(speed) => self.set_interval(speed.interval(), &mut timer),
                        Control::Apply { command, reply } => {
                            let kind = command.kind();
                            let result = self.world.apply_command(command);
                            match &result {
                                Ok(()) => self.publish(),
                                Err(err) => warn!(command = kind, error = %err, "Command rejected"),
                            }
                            let _ = reply.send(result);
                        }
                        Control::Shutdown => {
                            info!(tick = self.world.tick(), "Runner shutdown requested");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            scenario = %self.scenario,
            tick = self.world.tick(),
            population = self.world.total_population(),
            "Runner stopped"
        );
        Ok(self.world)
    }
}

/// Starts the real-time loop. The task ends on [`RunnerHandle::shutdown`]
/// or once every handle is dropped, returning the final world.
pub fn spawn(engine: Engine, world: World) -> (RunnerHandle, JoinHandle<Result<World>>) {
    let scenario = engine.scenario_name().to_string();
    let (snapshots, snapshot_rx) = watch::channel(Arc::new(world.snapshot(&scenario)));
    let (control_tx, control_rx) = mpsc::channel(64);
    let runner = Runner {
        engine,
        world,
        scenario,
        snapshots,
    };
    let task = tokio::spawn(runner.run(control_rx));
    (
        RunnerHandle {
            control: control_tx,
            snapshots: snapshot_rx,
        },
        task,
    )
}
