//! Labor-funded construction queue.
//!
//! Each tick the queue is walked in order. An item funds as many whole units
//! as its labor pool (fresh labor plus its own bank) and the stockpile allow,
//! then banks leftover labor toward the next unit. The bank never holds more
//! than the remaining units need; labor past that flows on to later items.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    engine::{System, SystemContext},
    error::SimError,
    land::{BuildingCatalog, BuildingKind, BuildingQueueItem, GridPosition, Land},
    resources::{whole_units, ResourceCost, ResourceStore},
    rng::SystemRng,
    world::World,
};

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedBuilding {
    pub name: BuildingKind,
    pub position: GridPosition,
    pub units: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionReport {
    pub labor_offered: f64,
    pub labor_spent: f64,
    pub labor_banked: f64,
    pub labor_unused: f64,
    pub completed: Vec<CompletedBuilding>,
}

impl ConstructionReport {
    pub fn units_completed(&self) -> u32 {
        self.completed.iter().map(|c| c.units).sum()
    }
}

/// Result of walking the queue once, computed without touching the world.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOutcome {
    pub queue: Vec<BuildingQueueItem>,
    pub stock: ResourceStore,
    pub report: ConstructionReport,
}

/// Advances one item with `labor` fresh labor. Returns the units funded;
/// `labor` and `stock` are reduced by what was used.
fn advance_item(
    item: &mut BuildingQueueItem,
    unit_cost: &ResourceCost,
    labor: &mut f64,
    stock: &mut ResourceStore,
    report: &mut ConstructionReport,
) -> u32 {
    let by_materials = unit_cost.affordable_units(stock).unwrap_or(u32::MAX);
    let unit_labor = unit_cost.labor;

    let funded = if unit_labor <= EPS {
        item.level.min(by_materials)
    } else {
        let pool = *labor + item.accumulated_labor;
        let funded = whole_units(pool, unit_labor).min(by_materials).min(item.level);
        let needed = f64::from(funded) * unit_labor;
        let from_bank = item.accumulated_labor.min(needed);
        item.accumulated_labor -= from_bank;
        let fresh = (needed - from_bank).min(*labor);
        *labor -= fresh;
        report.labor_spent += needed;
        funded
    };

    if funded > 0 {
        let paid = unit_cost.scaled(f64::from(funded));
        stock.pay(&paid);
        item.level -= funded;
        item.remaining_cost = item.remaining_cost.saturating_sub(&paid);
    }

    if item.level > 0 && unit_labor > EPS {
        let cap = f64::from(item.level) * unit_labor;
        let room = (cap - item.accumulated_labor).max(0.0);
        let deposit = labor.min(room);
        item.accumulated_labor += deposit;
        *labor -= deposit;
        report.labor_banked += deposit;
    }
    funded
}

/// Walks the queue with this tick's labor. Items are dropped once every
/// unit is funded or their remaining cost is fully paid; once labor runs
/// out the rest of the queue carries over untouched.
///
/// Banked labor is only drawn alongside fresh labor, so an item whose bank
/// already covers a unit still waits for a tick with labor to spare.
pub fn process_queue(
    queue: &[BuildingQueueItem],
    land: &Land,
    catalog: &BuildingCatalog,
    stock: ResourceStore,
    labor: f64,
) -> Result<QueueOutcome, SimError> {
    let mut stock = stock;
    let mut labor = labor.max(0.0);
    let mut report = ConstructionReport {
        labor_offered: labor,
        ..ConstructionReport::default()
    };
    let mut next_queue = Vec::with_capacity(queue.len());

    for (index, item) in queue.iter().enumerate() {
        if labor <= EPS {
            next_queue.extend(queue[index..].iter().cloned());
            break;
        }
        let unit_cost = land.unit_cost(catalog, item.name, item.position)?;
        let mut item = item.clone();
        let funded = advance_item(&mut item, &unit_cost, &mut labor, &mut stock, &mut report);
        if funded > 0 {
            report.completed.push(CompletedBuilding {
                name: item.name,
                position: item.position,
                units: funded,
            });
        }
        if item.level > 0 && !item.remaining_cost.is_settled() {
            next_queue.push(item);
        }
    }

    report.labor_unused = labor;
    Ok(QueueOutcome {
        queue: next_queue,
        stock,
        report,
    })
}

/// Places funded units on their tiles, creating the building entry from the
/// catalog when a tile does not have one yet.
pub fn place_completed(
    land: &mut Land,
    catalog: &BuildingCatalog,
    completed: &[CompletedBuilding],
) -> Result<(), SimError> {
    let mut merged: BTreeMap<(GridPosition, BuildingKind), u32> = BTreeMap::new();
    for done in completed {
        *merged.entry((done.position, done.name)).or_default() += done.units;
    }
    for ((position, name), units) in merged {
        let spec = catalog.spec(name)?;
        land.tile_mut(position)?.add_buildings(name, spec, units);
    }
    Ok(())
}

pub struct ConstructionSystem;

impl ConstructionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConstructionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ConstructionSystem {
    fn name(&self) -> &str {
        "construction"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if world.land.building_queue.is_empty() {
            world.construction = ConstructionReport {
                labor_offered: world.upkeep.labor_available,
                labor_unused: world.upkeep.labor_available,
                ..ConstructionReport::default()
            };
            return Ok(());
        }

        let outcome = process_queue(
            &world.land.building_queue,
            &world.land,
            &world.catalog,
            world.resources,
            world.upkeep.labor_available,
        )?;
        let mut land = world.land.clone();
        place_completed(&mut land, &world.catalog, &outcome.report.completed)?;
        land.building_queue = outcome.queue;

        for done in &outcome.report.completed {
            info!(
                tick = ctx.tick,
                building = %done.name,
                position = %done.position,
                units = done.units,
                "Construction completed"
            );
        }
        debug!(
            tick = ctx.tick,
            labor_spent = outcome.report.labor_spent,
            labor_banked = outcome.report.labor_banked,
            queue_len = land.building_queue.len(),
            "Building queue processed"
        );

        world.land = land;
        world.resources = outcome.stock;
        world.construction = outcome.report;
        Ok(())
    }
}
