use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    clock::TickRate,
    error::SimError,
    land::{Biome, BuildingCatalog, BuildingKind, GridPosition, Land, Terrain, TilePermissions},
    occupations::{Occupation, OccupationState},
    population::{AgeGroup, Citizenship, CohortId, CohortStore, Gender},
    resources::ResourceStore,
    systems::workforce,
    world::{World, DEFAULT_TICK_INTERVAL_MS},
};

fn default_snapshot_interval_ticks() -> u64 {
    12
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_food_consumption() -> Vec<f64> {
    vec![0.00274]
}

fn default_gatherer_food() -> Vec<f64> {
    vec![0.0045]
}

fn default_hunter_food() -> Vec<f64> {
    vec![0.0031]
}

fn default_farmer_food() -> Vec<f64> {
    vec![0.5]
}

fn default_hunter_hide() -> Vec<f64> {
    vec![0.0033]
}

fn default_laborer_output() -> Vec<f64> {
    vec![0.007]
}

fn default_growth() -> Vec<f64> {
    vec![0.0012]
}

fn default_female_ratio() -> f64 {
    0.49
}

fn default_fertility_min() -> usize {
    16
}

fn default_fertility_max() -> usize {
    48
}

fn default_resources() -> ResourceStore {
    ResourceStore {
        food: 100.0,
        hide: 5.0,
        ..ResourceStore::default()
    }
}

fn default_radius() -> i32 {
    3
}

fn default_controlled_radius() -> i32 {
    1
}

fn default_biome() -> Biome {
    Biome::Grassland
}

fn default_worker_capacity() -> u32 {
    1000
}

fn default_initial_buildings() -> Vec<InitialBuilding> {
    vec![InitialBuilding {
        position: GridPosition::ORIGIN,
        name: BuildingKind::MakeshiftHousing,
        level: 1000,
    }]
}

fn default_population() -> BTreeMap<CohortId, u32> {
    let mut cohorts = BTreeMap::new();
    for gender in Gender::ALL {
        for (age_group, size) in [
            (AgeGroup::Children, 75),
            (AgeGroup::Adults, 100),
            (AgeGroup::Elders, 10),
        ] {
            cohorts.insert(CohortId::new(age_group, gender, Citizenship::Citizen), size);
        }
    }
    cohorts
}

fn default_allocation() -> BTreeMap<Occupation, f64> {
    BTreeMap::from([(Occupation::Hunters, 0.05), (Occupation::Gatherers, 0.95)])
}

/// Per-day rate tables. Each production chain is a list of base rates that
/// are summed, plus a list of multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    #[serde(default = "default_food_consumption")]
    pub food_consumption_base_rates: Vec<f64>,
    #[serde(default)]
    pub food_consumption_multipliers: Vec<f64>,
    #[serde(default = "default_gatherer_food")]
    pub gatherer_food_base_rates: Vec<f64>,
    #[serde(default)]
    pub gatherer_food_multipliers: Vec<f64>,
    #[serde(default = "default_hunter_food")]
    pub hunter_food_base_rates: Vec<f64>,
    #[serde(default)]
    pub hunter_food_multipliers: Vec<f64>,
    /// Farms do not produce yet; kept so scenarios can carry the value.
    #[serde(default = "default_farmer_food")]
    pub farmer_food_base_rates: Vec<f64>,
    #[serde(default)]
    pub farmer_food_multipliers: Vec<f64>,
    #[serde(default = "default_hunter_hide")]
    pub hunter_hide_base_rates: Vec<f64>,
    #[serde(default)]
    pub hunter_hide_multipliers: Vec<f64>,
    #[serde(default)]
    pub hide_consumption_per_capita: f64,
    #[serde(default = "default_laborer_output")]
    pub laborer_base_rates: Vec<f64>,
    /// Additive bonuses, paired index-wise with `laborer_base_rates`.
    #[serde(default)]
    pub laborer_multipliers: Vec<f64>,
    #[serde(default)]
    pub knowledge_per_day: f64,
    #[serde(default = "default_growth")]
    pub population_growth_base_rates: Vec<f64>,
    /// Additive bonuses, paired index-wise with the growth base rates.
    #[serde(default)]
    pub population_growth_multipliers: Vec<f64>,
    #[serde(default = "default_female_ratio")]
    pub female_gender_ratio: f64,
    #[serde(default = "default_fertility_min")]
    pub fertility_age_min: usize,
    #[serde(default = "default_fertility_max")]
    pub fertility_age_max: usize,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            food_consumption_base_rates: default_food_consumption(),
            food_consumption_multipliers: Vec::new(),
            gatherer_food_base_rates: default_gatherer_food(),
            gatherer_food_multipliers: Vec::new(),
            hunter_food_base_rates: default_hunter_food(),
            hunter_food_multipliers: Vec::new(),
            farmer_food_base_rates: default_farmer_food(),
            farmer_food_multipliers: Vec::new(),
            hunter_hide_base_rates: default_hunter_hide(),
            hunter_hide_multipliers: Vec::new(),
            hide_consumption_per_capita: 0.0,
            laborer_base_rates: default_laborer_output(),
            laborer_multipliers: Vec::new(),
            knowledge_per_day: 0.0,
            population_growth_base_rates: default_growth(),
            population_growth_multipliers: Vec::new(),
            female_gender_ratio: default_female_ratio(),
            fertility_age_min: default_fertility_min(),
            fertility_age_max: default_fertility_max(),
        }
    }
}

/// Sum of the base rates times the product of the multipliers.
pub fn multiplicative_chain(base_rates: &[f64], multipliers: &[f64]) -> f64 {
    base_rates.iter().sum::<f64>() * multipliers.iter().product::<f64>()
}

/// Sum of `base[i] * (1 + bonus[i])`; missing bonuses count as zero.
pub fn additive_chain(base_rates: &[f64], bonuses: &[f64]) -> f64 {
    base_rates
        .iter()
        .enumerate()
        .map(|(i, base)| base * (1.0 + bonuses.get(i).copied().unwrap_or(0.0)))
        .sum()
}

impl Rates {
    pub fn food_consumption_per_capita(&self) -> f64 {
        multiplicative_chain(
            &self.food_consumption_base_rates,
            &self.food_consumption_multipliers,
        )
    }

    pub fn labor_per_laborer(&self) -> f64 {
        additive_chain(&self.laborer_base_rates, &self.laborer_multipliers)
    }

    pub fn growth_rate(&self) -> f64 {
        additive_chain(
            &self.population_growth_base_rates,
            &self.population_growth_multipliers,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialBuilding {
    pub position: GridPosition,
    pub name: BuildingKind,
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileOverride {
    pub position: GridPosition,
    #[serde(default)]
    pub biome: Option<Biome>,
    #[serde(default)]
    pub terrain: Option<Terrain>,
    #[serde(default)]
    pub controlled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandConfig {
    #[serde(default = "default_radius")]
    pub radius: i32,
    #[serde(default = "default_controlled_radius")]
    pub controlled_radius: i32,
    #[serde(default = "default_biome")]
    pub biome: Biome,
    #[serde(default = "default_worker_capacity")]
    pub base_worker_capacity: u32,
    #[serde(default)]
    pub tiles: Vec<TileOverride>,
    #[serde(default = "default_initial_buildings")]
    pub buildings: Vec<InitialBuilding>,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            controlled_radius: default_controlled_radius(),
            biome: default_biome(),
            base_worker_capacity: default_worker_capacity(),
            tiles: Vec::new(),
            buildings: default_initial_buildings(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupationConfig {
    #[serde(default = "default_allocation")]
    pub allocation: BTreeMap<Occupation, f64>,
    #[serde(default)]
    pub locked: Vec<Occupation>,
    /// Replaces the default set of unavailable occupations when present.
    #[serde(default)]
    pub unavailable: Option<Vec<Occupation>>,
}

impl Default for OccupationConfig {
    fn default() -> Self {
        Self {
            allocation: default_allocation(),
            locked: Vec::new(),
            unavailable: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    #[serde(default)]
    pub tick_rate: TickRate,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rates: Rates,
    #[serde(default)]
    pub buildings: Option<BuildingCatalog>,
    #[serde(default = "default_resources")]
    pub resources: ResourceStore,
    #[serde(default)]
    pub land: LandConfig,
    #[serde(default = "default_population")]
    pub population: BTreeMap<CohortId, u32>,
    #[serde(default)]
    pub occupations: OccupationConfig,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Scenario::from_yaml(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(120)
    }

    pub fn catalog(&self) -> BuildingCatalog {
        self.buildings.clone().unwrap_or_default()
    }

    pub fn build_land(&self, catalog: &BuildingCatalog) -> Result<Land, SimError> {
        let cfg = &self.land;
        let mut land = Land::generate(
            cfg.radius,
            cfg.controlled_radius,
            cfg.biome,
            cfg.base_worker_capacity,
        );
        for tile_cfg in &cfg.tiles {
            let tile = land.tile_mut(tile_cfg.position)?;
            if let Some(biome) = tile_cfg.biome {
                tile.biome = biome;
            }
            if let Some(terrain) = tile_cfg.terrain {
                tile.terrain = terrain;
            }
            if let Some(controlled) = tile_cfg.controlled {
                if controlled != tile.controlled {
                    tile.permissions = if controlled {
                        TilePermissions::ALL
                    } else {
                        TilePermissions::NONE
                    };
                }
                tile.controlled = controlled;
                tile.discovered |= controlled;
            }
        }
        for building in &cfg.buildings {
            let spec = catalog.spec(building.name)?;
            land.tile_mut(building.position)?
                .add_buildings(building.name, spec, building.level);
        }
        Ok(land)
    }

    pub fn build_world(&self) -> Result<World, SimError> {
        let catalog = self.catalog();
        let land = self.build_land(&catalog)?;

        let mut occupations = OccupationState::with_allocation(
            self.occupations.allocation.iter().map(|(o, f)| (*o, *f)),
        );
        for occupation in &self.occupations.locked {
            occupations.set_lock(*occupation, true);
        }
        if let Some(unavailable) = &self.occupations.unavailable {
            occupations.unavailable = unavailable.iter().copied().collect();
        }

        let mut world = World::new(self.rates.clone(), catalog, land)
            .with_cohorts(CohortStore::with_sizes(
                self.population.iter().map(|(id, size)| (*id, *size)),
            ))
            .with_resources(self.resources)
            .with_occupations(occupations)
            .with_tick_rate(self.tick_rate)
            .with_tick_interval_ms(self.tick_interval_ms);
        workforce::reallocate(&mut world);
        Ok(world)
    }
}
