use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    clock::{GameTime, TickRate},
    config::Rates,
    land::{BuildingCatalog, Land},
    occupations::{Occupation, OccupationState},
    population::{CohortFilter, CohortStore},
    resources::ResourceStore,
    systems::{
        births::BirthReport, construction::ConstructionReport, demographics::DemographicReport,
        ledger::{LedgerReport, UpkeepReport},
        security::SecurityScores,
    },
};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

/// Complete settlement state. Systems read and write it in pipeline order;
/// everything outside the engine only sees it between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    tick: u64,
    time: GameTime,
    tick_rate: TickRate,
    tick_interval_ms: u64,
    paused: bool,
    pub(crate) rates: Rates,
    pub(crate) catalog: BuildingCatalog,
    pub(crate) cohorts: CohortStore,
    pub(crate) resources: ResourceStore,
    pub(crate) land: Land,
    pub(crate) occupations: OccupationState,
    pub(crate) birth_accumulator: f64,
    pub(crate) security: SecurityScores,
    pub(crate) ledger: LedgerReport,
    pub(crate) upkeep: UpkeepReport,
    pub(crate) demographics: DemographicReport,
    pub(crate) births: BirthReport,
    pub(crate) construction: ConstructionReport,
}

impl World {
    pub fn new(rates: Rates, catalog: BuildingCatalog, land: Land) -> Self {
        Self {
            tick: 0,
            time: GameTime::default(),
            tick_rate: TickRate::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            paused: false,
            rates,
            catalog,
            cohorts: CohortStore::empty(),
            resources: ResourceStore::default(),
            land,
            occupations: OccupationState::default(),
            birth_accumulator: 0.0,
            security: SecurityScores::default(),
            ledger: LedgerReport::default(),
            upkeep: UpkeepReport::default(),
            demographics: DemographicReport::default(),
            births: BirthReport::default(),
            construction: ConstructionReport::default(),
        }
    }

    pub fn with_cohorts(mut self, cohorts: CohortStore) -> Self {
        self.cohorts = cohorts;
        self
    }

    pub fn with_resources(mut self, resources: ResourceStore) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_occupations(mut self, occupations: OccupationState) -> Self {
        self.occupations = occupations;
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: TickRate) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn with_tick_interval_ms(mut self, millis: u64) -> Self {
        self.tick_interval_ms = millis;
        self
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> GameTime {
        self.time
    }

    pub fn tick_rate(&self) -> TickRate {
        self.tick_rate
    }

    /// Days represented by one tick.
    pub fn tick_multiplier(&self) -> f64 {
        self.tick_rate.multiplier()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn set_tick_rate(&mut self, tick_rate: TickRate) {
        self.tick_rate = tick_rate;
    }

    pub(crate) fn set_tick_interval(&mut self, interval: Duration) {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn advance_time(&mut self) {
        self.tick += 1;
        self.time.advance(self.tick_rate);
    }

    pub fn rates(&self) -> &Rates {
        &self.rates
    }

    pub fn rates_mut(&mut self) -> &mut Rates {
        &mut self.rates
    }

    pub fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut BuildingCatalog {
        &mut self.catalog
    }

    pub fn cohorts(&self) -> &CohortStore {
        &self.cohorts
    }

    pub fn cohorts_mut(&mut self) -> &mut CohortStore {
        &mut self.cohorts
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceStore {
        &mut self.resources
    }

    pub fn land(&self) -> &Land {
        &self.land
    }

    pub fn land_mut(&mut self) -> &mut Land {
        &mut self.land
    }

    pub fn occupations(&self) -> &OccupationState {
        &self.occupations
    }

    pub fn occupations_mut(&mut self) -> &mut OccupationState {
        &mut self.occupations
    }

    pub fn birth_accumulator(&self) -> f64 {
        self.birth_accumulator
    }

    pub fn set_birth_accumulator(&mut self, value: f64) {
        self.birth_accumulator = value.max(0.0);
    }

    pub fn security(&self) -> &SecurityScores {
        &self.security
    }

    pub fn ledger(&self) -> &LedgerReport {
        &self.ledger
    }

    pub fn upkeep(&self) -> &UpkeepReport {
        &self.upkeep
    }

    pub fn demographics(&self) -> &DemographicReport {
        &self.demographics
    }

    pub fn births(&self) -> &BirthReport {
        &self.births
    }

    pub fn construction(&self) -> &ConstructionReport {
        &self.construction
    }

    pub fn total_population(&self) -> u64 {
        self.cohorts.total()
    }

    pub fn working_age_population(&self) -> u64 {
        self.cohorts.working_age_population()
    }

    pub fn cohort_population(&self, filter: &CohortFilter) -> u64 {
        self.cohorts.population(filter)
    }

    pub fn total_housing_capacity(&self) -> u64 {
        self.land.total_housing_capacity()
    }

    pub fn worksite_capacity(&self) -> u64 {
        self.land.worksite_capacity()
    }

    pub fn occupation_size(&self, occupation: Occupation) -> u32 {
        self.occupations.size(occupation)
    }

    pub fn food_security_score(&self) -> f64 {
        self.security.food_score
    }

    pub fn housing_score(&self) -> f64 {
        self.security.housing_score
    }

    pub fn snapshot(&self, scenario: &str) -> WorldSnapshot {
        WorldSnapshot {
            scenario: scenario.to_string(),
            tick: self.tick,
            time: self.time,
            tick_rate: self.tick_rate,
            paused: self.paused,
            total_population: self.total_population(),
            working_age_population: self.working_age_population(),
            housing_capacity: self.total_housing_capacity(),
            worksite_capacity: self.worksite_capacity(),
            food_security_score: self.food_security_score(),
            housing_score: self.housing_score(),
            resources: self.resources,
            occupation_sizes: self.occupations.sizes.clone(),
            building_queue_len: self.land.building_queue.len(),
            world: self.clone(),
        }
    }
}

/// Committed post-tick view handed to readers: the derived query surface
/// plus the full state it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub scenario: String,
    pub tick: u64,
    pub time: GameTime,
    pub tick_rate: TickRate,
    pub paused: bool,
    pub total_population: u64,
    pub working_age_population: u64,
    pub housing_capacity: u64,
    pub worksite_capacity: u64,
    pub food_security_score: f64,
    pub housing_score: f64,
    pub resources: ResourceStore,
    pub occupation_sizes: BTreeMap<Occupation, u32>,
    pub building_queue_len: usize,
    pub world: World,
}
