use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::{multiplicative_chain, Rates},
    engine::{System, SystemContext},
    error::SimError,
    land::{Biome, BuildingCatalog, Land},
    occupations::{Occupation, OccupationState},
    population::{AgeGroup, Citizenship, CohortId, CohortStore, Gender},
    resources::{ResourceCost, ResourceKind, ResourceStore},
    rng::SystemRng,
    world::World,
};

/// Flows computed by the ledger for the last tick, already scaled by the
/// tick multiplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub gatherer_food: f64,
    pub hunter_food: f64,
    pub farm_food: f64,
    pub food_production: f64,
    pub food_consumption: f64,
    pub food_consumption_by_cohort: BTreeMap<CohortId, f64>,
    /// Consumption the stock could not cover.
    pub unmet_food: f64,
    pub hide_production: f64,
    pub hide_consumption: f64,
    pub knowledge_production: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UpkeepReport {
    pub upkeep: ResourceCost,
    pub labor_produced: f64,
    /// Labor left for construction after upkeep.
    pub labor_available: f64,
}

/// Relative food need of one member of a cohort.
pub fn consumption_factor(id: &CohortId) -> f64 {
    let mut factor = match id.age_group {
        AgeGroup::Children => 0.5,
        AgeGroup::Adults => 1.0,
        AgeGroup::Elders => 0.75,
    };
    if id.gender == Gender::Female {
        factor *= 0.9;
    }
    if id.citizenship == Citizenship::Slave {
        factor *= 0.75;
    }
    factor
}

pub fn food_consumption(
    cohorts: &CohortStore,
    rates: &Rates,
    tick_multiplier: f64,
) -> (f64, BTreeMap<CohortId, f64>) {
    let per_capita = rates.food_consumption_per_capita() * tick_multiplier;
    let by_cohort: BTreeMap<CohortId, f64> = cohorts
        .iter()
        .map(|c| (c.id, f64::from(c.size) * per_capita * consumption_factor(&c.id)))
        .collect();
    (by_cohort.values().sum(), by_cohort)
}

fn occupation_output(
    occupations: &OccupationState,
    occupation: Occupation,
    base_rates: &[f64],
    multipliers: &[f64],
    yield_factor: f64,
    tick_multiplier: f64,
) -> f64 {
    f64::from(occupations.size(occupation))
        * multiplicative_chain(base_rates, multipliers)
        * yield_factor
        * tick_multiplier
}

pub fn compute_ledger(world: &World) -> LedgerReport {
    let rates = &world.rates;
    let occupations = &world.occupations;
    let mult = world.tick_multiplier();

    let gatherer_food = occupation_output(
        occupations,
        Occupation::Gatherers,
        &rates.gatherer_food_base_rates,
        &rates.gatherer_food_multipliers,
        world.land.mean_controlled_yield(Biome::gather_yield),
        mult,
    );
    let hunter_food = occupation_output(
        occupations,
        Occupation::Hunters,
        &rates.hunter_food_base_rates,
        &rates.hunter_food_multipliers,
        world.land.mean_controlled_yield(Biome::hunt_yield),
        mult,
    );
    // Farmers are staffed but farms have no yield model yet.
    let farm_food = 0.0;
    let (food_consumption, food_consumption_by_cohort) =
        food_consumption(&world.cohorts, rates, mult);

    let hide_production = occupation_output(
        occupations,
        Occupation::Hunters,
        &rates.hunter_hide_base_rates,
        &rates.hunter_hide_multipliers,
        1.0,
        mult,
    );
    let hide_consumption =
        world.total_population() as f64 * rates.hide_consumption_per_capita * mult;

    LedgerReport {
        gatherer_food,
        hunter_food,
        farm_food,
        food_production: gatherer_food + hunter_food + farm_food,
        food_consumption,
        food_consumption_by_cohort,
        unmet_food: 0.0,
        hide_production,
        hide_consumption,
        knowledge_production: rates.knowledge_per_day * mult,
    }
}

/// Books the report's flows into `stock`, clamping at zero. Records the
/// food shortfall on the report.
pub fn apply_ledger(stock: &mut ResourceStore, report: &mut LedgerReport) {
    stock.food += report.food_production;
    report.unmet_food = stock.withdraw(ResourceKind::Food, report.food_consumption);
    stock.hide += report.hide_production;
    stock.withdraw(ResourceKind::Hide, report.hide_consumption);
    stock.knowledge += report.knowledge_production;
    stock.clamp_non_negative();
}

/// Total upkeep of every building standing on the land for one tick.
pub fn upkeep_cost(
    land: &Land,
    catalog: &BuildingCatalog,
    tick_multiplier: f64,
) -> Result<ResourceCost, SimError> {
    let mut total = ResourceCost::default();
    for tile in land.tiles.values() {
        for (kind, building) in &tile.buildings {
            let spec = catalog.spec(*kind)?;
            total.add(&spec.upkeep.scaled(f64::from(building.level) * tick_multiplier));
        }
    }
    Ok(total)
}

pub struct ResourceLedgerSystem;

impl ResourceLedgerSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResourceLedgerSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ResourceLedgerSystem {
    fn name(&self) -> &str {
        "ledger"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let mut report = compute_ledger(world);
        apply_ledger(&mut world.resources, &mut report);
        debug!(
            tick = ctx.tick,
            food_production = report.food_production,
            food_consumption = report.food_consumption,
            unmet_food = report.unmet_food,
            food = world.resources.food,
            hide = world.resources.hide,
            "Resource ledger updated"
        );
        world.ledger = report;
        Ok(())
    }
}

/// Charges building upkeep against stock and this tick's labor output.
pub struct UpkeepSystem;

impl UpkeepSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UpkeepSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for UpkeepSystem {
    fn name(&self) -> &str {
        "upkeep"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let upkeep = upkeep_cost(&world.land, &world.catalog, ctx.tick_multiplier)?;
        world.resources.pay(&upkeep);

        let labor_produced = f64::from(world.occupations.size(Occupation::Laborers))
            * world.rates.labor_per_laborer()
            * ctx.tick_multiplier;
        let labor_available = (labor_produced - upkeep.labor).max(0.0);
        debug!(
            tick = ctx.tick,
            upkeep_labor = upkeep.labor,
            upkeep_hide = upkeep.hide,
            labor_produced,
            labor_available,
            "Building upkeep charged"
        );
        world.upkeep = UpkeepReport {
            upkeep,
            labor_produced,
            labor_available,
        };
        Ok(())
    }
}
