use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::world::{World, WorldSnapshot};

/// One snapshot file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub written_at: DateTime<Utc>,
    pub snapshot: WorldSnapshot,
}

/// Writes `<dir>/<scenario>/tick_NNNNNN.json` every `interval` ticks.
pub struct SnapshotWriter {
    dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn should_write(&self, tick: u64) -> bool {
        self.interval != 0 && tick != 0 && tick % self.interval == 0
    }

    pub fn maybe_write(&self, world: &World, scenario: &str) -> Result<Option<PathBuf>> {
        if !self.should_write(world.tick()) {
            return Ok(None);
        }
        self.write(world, scenario).map(Some)
    }

    pub fn write(&self, world: &World, scenario: &str) -> Result<PathBuf> {
        let dir = self.dir.join(scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{:06}.json", world.tick()));
        let record = SnapshotRecord {
            written_at: Utc::now(),
            snapshot: world.snapshot(scenario),
        };
        let json = serde_json::to_string_pretty(&record).context("failed to encode snapshot")?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        debug!(tick = world.tick(), path = %path.display(), "Snapshot written");
        Ok(path)
    }
}

pub fn read_snapshot(path: impl AsRef<Path>) -> Result<SnapshotRecord> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))
}
