pub mod clock;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod land;
pub mod occupations;
pub mod population;
pub mod resources;
pub mod rng;
pub mod runner;
pub mod sampling;
pub mod snapshot;
pub mod systems;
pub mod world;

pub use commands::Command;
pub use config::{Scenario, ScenarioLoader};
pub use engine::{Engine, EngineBuilder, EngineSettings, TickOutcome, TickReport};
pub use error::SimError;
pub use world::{World, WorldSnapshot};
