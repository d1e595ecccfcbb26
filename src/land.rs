//! Land tiles, the buildings standing on them, the building catalog and the
//! construction queue.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SimError;
use crate::resources::ResourceCost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const ORIGIN: GridPosition = GridPosition { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid grid position '{0}', expected 'x,y'")]
pub struct ParsePositionError(String);

impl FromStr for GridPosition {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| ParsePositionError(s.to_string()))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| ParsePositionError(s.to_string()))
        };
        Ok(GridPosition::new(parse(x)?, parse(y)?))
    }
}

impl From<GridPosition> for String {
    fn from(value: GridPosition) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for GridPosition {
    type Error = ParsePositionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Grassland,
    Steppe,
    Forest,
    Jungle,
    Taiga,
    Desert,
    Tundra,
}

impl Biome {
    /// Labor multiplier for construction on this biome.
    pub fn building_difficulty(self) -> f64 {
        match self {
            Biome::Grassland | Biome::Steppe => 1.0,
            Biome::Forest | Biome::Taiga => 1.2,
            Biome::Jungle | Biome::Desert => 1.4,
            Biome::Tundra => 1.6,
        }
    }

    pub fn gather_yield(self) -> f64 {
        match self {
            Biome::Grassland => 1.0,
            Biome::Steppe | Biome::Jungle => 0.8,
            Biome::Forest => 1.5,
            Biome::Taiga => 0.5,
            Biome::Desert | Biome::Tundra => 0.15,
        }
    }

    pub fn hunt_yield(self) -> f64 {
        match self {
            Biome::Desert | Biome::Tundra => 0.25,
            _ => 1.0,
        }
    }

    pub fn farm_yield(self) -> f64 {
        match self {
            Biome::Grassland | Biome::Steppe => 1.0,
            Biome::Forest => 0.9,
            Biome::Jungle => 0.8,
            Biome::Taiga => 0.7,
            Biome::Desert | Biome::Tundra => 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Flat,
    Hill,
    Coastal,
    Mountain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingCategory {
    Housing,
    Agriculture,
    Industry,
}

impl fmt::Display for BuildingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildingCategory::Housing => "housing",
            BuildingCategory::Agriculture => "agriculture",
            BuildingCategory::Industry => "industry",
        };
        f.write_str(name)
    }
}

impl FromStr for BuildingCategory {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "housing" => Ok(BuildingCategory::Housing),
            "agriculture" => Ok(BuildingCategory::Agriculture),
            "industry" => Ok(BuildingCategory::Industry),
            other => Err(SimError::UnknownBuildingCategory {
                category: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    MakeshiftHousing,
    Hut,
    Farm,
    Mine,
    LumberCamp,
}

impl BuildingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildingKind::MakeshiftHousing => "makeshift_housing",
            BuildingKind::Hut => "hut",
            BuildingKind::Farm => "farm",
            BuildingKind::Mine => "mine",
            BuildingKind::LumberCamp => "lumber_camp",
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "makeshift_housing" | "makeshiftHousing" => Ok(BuildingKind::MakeshiftHousing),
            "hut" => Ok(BuildingKind::Hut),
            "farm" => Ok(BuildingKind::Farm),
            "mine" => Ok(BuildingKind::Mine),
            "lumber_camp" | "lumberCamp" => Ok(BuildingKind::LumberCamp),
            other => Err(SimError::UnknownBuilding {
                name: other.to_string(),
            }),
        }
    }
}

/// Catalog entry: what one unit of a building costs, consumes and provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSpec {
    pub category: BuildingCategory,
    pub cost: ResourceCost,
    /// Upkeep per unit per day.
    #[serde(default)]
    pub upkeep: ResourceCost,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default = "default_space_units")]
    pub space_units: u32,
    #[serde(default)]
    pub worker_capacity: u32,
}

fn default_space_units() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingCatalog {
    buildings: BTreeMap<BuildingKind, BuildingSpec>,
}

impl BuildingCatalog {
    pub fn new(buildings: BTreeMap<BuildingKind, BuildingSpec>) -> Self {
        Self { buildings }
    }

    pub fn spec(&self, kind: BuildingKind) -> Result<&BuildingSpec, SimError> {
        self.buildings
            .get(&kind)
            .ok_or_else(|| SimError::UnknownBuilding {
                name: kind.to_string(),
            })
    }

    pub fn remove(&mut self, kind: BuildingKind) -> Option<BuildingSpec> {
        self.buildings.remove(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = BuildingKind> + '_ {
        self.buildings.keys().copied()
    }
}

impl Default for BuildingCatalog {
    fn default() -> Self {
        let housing = |labor, hide, upkeep_labor, upkeep_hide, capacity| BuildingSpec {
            category: BuildingCategory::Housing,
            cost: ResourceCost {
                labor,
                hide,
                ..ResourceCost::default()
            },
            upkeep: ResourceCost {
                labor: upkeep_labor,
                hide: upkeep_hide,
                ..ResourceCost::default()
            },
            capacity,
            space_units: 1,
            worker_capacity: 0,
        };
        let worksite = |category, labor, worker_capacity| BuildingSpec {
            category,
            cost: ResourceCost::labor(labor),
            upkeep: ResourceCost::default(),
            capacity: 0,
            space_units: 1,
            worker_capacity,
        };
        let mut buildings = BTreeMap::new();
        buildings.insert(
            BuildingKind::MakeshiftHousing,
            housing(1.0, 2.0, 0.00028, 0.0002, 3),
        );
        buildings.insert(BuildingKind::Hut, housing(2.0, 4.0, 0.00056, 0.0004, 5));
        buildings.insert(
            BuildingKind::Farm,
            worksite(BuildingCategory::Agriculture, 4.0, 10),
        );
        buildings.insert(
            BuildingKind::Mine,
            worksite(BuildingCategory::Industry, 50.0, 20),
        );
        buildings.insert(
            BuildingKind::LumberCamp,
            worksite(BuildingCategory::Industry, 10.0, 10),
        );
        Self { buildings }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePermissions {
    pub allow_housing: bool,
    pub allow_agriculture: bool,
    pub allow_industry: bool,
}

impl TilePermissions {
    pub const ALL: TilePermissions = TilePermissions {
        allow_housing: true,
        allow_agriculture: true,
        allow_industry: true,
    };

    pub const NONE: TilePermissions = TilePermissions {
        allow_housing: false,
        allow_agriculture: false,
        allow_industry: false,
    };

    pub fn allows(&self, category: BuildingCategory) -> bool {
        match category {
            BuildingCategory::Housing => self.allow_housing,
            BuildingCategory::Agriculture => self.allow_agriculture,
            BuildingCategory::Industry => self.allow_industry,
        }
    }
}

/// A building type standing on a tile, with `level` units built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBuilding {
    pub category: BuildingCategory,
    pub level: u32,
    pub capacity: u32,
    pub space_units: u32,
    pub worker_capacity: u32,
}

impl TileBuilding {
    pub fn from_spec(spec: &BuildingSpec, level: u32) -> Self {
        Self {
            category: spec.category,
            level,
            capacity: spec.capacity,
            space_units: spec.space_units,
            worker_capacity: spec.worker_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub position: GridPosition,
    pub biome: Biome,
    pub terrain: Terrain,
    pub discovered: bool,
    pub controlled: bool,
    pub permissions: TilePermissions,
    pub used_space_units: u32,
    pub buildings: BTreeMap<BuildingKind, TileBuilding>,
}

impl Tile {
    pub fn new(position: GridPosition, biome: Biome, controlled: bool) -> Self {
        Self {
            position,
            biome,
            terrain: Terrain::Flat,
            discovered: controlled,
            controlled,
            permissions: if controlled {
                TilePermissions::ALL
            } else {
                TilePermissions::NONE
            },
            used_space_units: 0,
            buildings: BTreeMap::new(),
        }
    }

    pub fn housing_capacity(&self) -> u64 {
        self.buildings
            .values()
            .filter(|b| b.category == BuildingCategory::Housing)
            .map(|b| u64::from(b.capacity) * u64::from(b.level))
            .sum()
    }

    pub fn building_level(&self, kind: BuildingKind) -> u32 {
        self.buildings.get(&kind).map_or(0, |b| b.level)
    }

    /// Adds `count` units of `kind`, creating the entry from the catalog spec
    /// when the tile has none yet.
    pub fn add_buildings(&mut self, kind: BuildingKind, spec: &BuildingSpec, count: u32) {
        if count == 0 {
            return;
        }
        self.buildings
            .entry(kind)
            .and_modify(|b| b.level += count)
            .or_insert_with(|| TileBuilding::from_spec(spec, count));
        self.used_space_units += spec.space_units * count;
    }
}

/// One in-progress construction order.
///
/// `initial_cost` and `remaining_cost` cover the whole order; `level` is the
/// number of units still to build and `accumulated_labor` is labor banked
/// toward the next unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingQueueItem {
    pub name: BuildingKind,
    #[serde(rename = "type")]
    pub category: BuildingCategory,
    pub position: GridPosition,
    pub level: u32,
    pub initial_cost: ResourceCost,
    pub remaining_cost: ResourceCost,
    #[serde(default)]
    pub accumulated_labor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Land {
    pub tiles: BTreeMap<GridPosition, Tile>,
    #[serde(default)]
    pub building_queue: Vec<BuildingQueueItem>,
    /// Worker slots per controlled tile before buildings take up space.
    pub base_worker_capacity: u32,
}

impl Land {
    /// A square grid of `radius` tiles around the origin; tiles within
    /// `controlled_radius` start controlled and discovered.
    pub fn generate(radius: i32, controlled_radius: i32, biome: Biome, base_worker_capacity: u32) -> Self {
        let mut tiles = BTreeMap::new();
        for x in -radius..=radius {
            for y in -radius..=radius {
                let position = GridPosition::new(x, y);
                let controlled = x.abs() <= controlled_radius && y.abs() <= controlled_radius;
                tiles.insert(position, Tile::new(position, biome, controlled));
            }
        }
        Self {
            tiles,
            building_queue: Vec::new(),
            base_worker_capacity,
        }
    }

    pub fn tile(&self, position: GridPosition) -> Result<&Tile, SimError> {
        self.tiles
            .get(&position)
            .ok_or(SimError::UnknownTile { position })
    }

    pub fn tile_mut(&mut self, position: GridPosition) -> Result<&mut Tile, SimError> {
        self.tiles
            .get_mut(&position)
            .ok_or(SimError::UnknownTile { position })
    }

    pub fn controlled_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values().filter(|t| t.controlled)
    }

    pub fn total_housing_capacity(&self) -> u64 {
        self.tiles.values().map(Tile::housing_capacity).sum()
    }

    /// Worker slots across controlled tiles, each tile losing the space its
    /// buildings occupy.
    pub fn worksite_capacity(&self) -> u64 {
        self.controlled_tiles()
            .map(|t| u64::from(self.base_worker_capacity.saturating_sub(t.used_space_units)))
            .sum()
    }

    /// Mean of `yield_of` over controlled tiles; 1.0 with no controlled land.
    pub fn mean_controlled_yield(&self, yield_of: impl Fn(Biome) -> f64) -> f64 {
        let (sum, count) = self
            .controlled_tiles()
            .fold((0.0, 0usize), |(sum, count), t| (sum + yield_of(t.biome), count + 1));
        if count == 0 {
            1.0
        } else {
            sum / count as f64
        }
    }

    /// Cost of one unit of `kind` on the tile at `position`; labor scales
    /// with the tile's biome difficulty.
    pub fn unit_cost(
        &self,
        catalog: &BuildingCatalog,
        kind: BuildingKind,
        position: GridPosition,
    ) -> Result<ResourceCost, SimError> {
        let spec = catalog.spec(kind)?;
        let tile = self.tile(position)?;
        let mut cost = spec.cost;
        cost.labor *= tile.biome.building_difficulty();
        Ok(cost)
    }

    pub fn enqueue_building(
        &mut self,
        catalog: &BuildingCatalog,
        name: BuildingKind,
        category: BuildingCategory,
        position: GridPosition,
        quantity: u32,
    ) -> Result<(), SimError> {
        if quantity == 0 {
            return Err(SimError::InvalidQuantity);
        }
        let spec = catalog.spec(name)?;
        if spec.category != category {
            return Err(SimError::BuildingCategoryMismatch {
                name,
                expected: spec.category,
                found: category,
            });
        }
        let tile = self.tile(position)?;
        if !tile.controlled {
            return Err(SimError::TileNotControlled { position });
        }
        if !tile.permissions.allows(category) {
            return Err(SimError::BuildingNotPermitted {
                name,
                category,
                position,
            });
        }
        let total = self
            .unit_cost(catalog, name, position)?
            .scaled(f64::from(quantity));
        self.building_queue.push(BuildingQueueItem {
            name,
            category,
            position,
            level: quantity,
            initial_cost: total,
            remaining_cost: total,
            accumulated_labor: 0.0,
        });
        Ok(())
    }

    /// Takes control of a tile. Newly claimed tiles allow every category.
    pub fn claim_tile(&mut self, position: GridPosition) -> Result<(), SimError> {
        let tile = self.tile_mut(position)?;
        if !tile.controlled {
            tile.permissions = TilePermissions::ALL;
        }
        tile.controlled = true;
        tile.discovered = true;
        Ok(())
    }

    pub fn discover_tile(&mut self, position: GridPosition) -> Result<(), SimError> {
        self.tile_mut(position)?.discovered = true;
        Ok(())
    }

    pub fn set_permissions(
        &mut self,
        position: GridPosition,
        permissions: TilePermissions,
    ) -> Result<(), SimError> {
        self.tile_mut(position)?.permissions = permissions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn land() -> Land {
        Land::generate(3, 1, Biome::Grassland, 1000)
    }

    #[test]
    fn unknown_category_is_named_as_a_category() {
        assert_eq!("industry".parse::<BuildingCategory>(), Ok(BuildingCategory::Industry));
        assert_eq!(
            "temple".parse::<BuildingCategory>(),
            Err(SimError::UnknownBuildingCategory {
                category: "temple".into()
            })
        );
    }

    #[test]
    fn generated_grid_controls_the_center() {
        let land = land();
        assert_eq!(land.tiles.len(), 49);
        assert_eq!(land.controlled_tiles().count(), 9);
        assert!(!land.tile(GridPosition::new(3, 3)).unwrap().controlled);
        assert_eq!(land.worksite_capacity(), 9_000);
    }

    #[test]
    fn positions_parse_from_keys() {
        assert_eq!("-2,3".parse::<GridPosition>().unwrap(), GridPosition::new(-2, 3));
        assert!("2;3".parse::<GridPosition>().is_err());
    }

    #[test]
    fn adding_buildings_creates_then_increments() {
        let catalog = BuildingCatalog::default();
        let spec = catalog.spec(BuildingKind::Hut).unwrap().clone();
        let mut land = land();
        let tile = land.tile_mut(GridPosition::ORIGIN).unwrap();
        tile.add_buildings(BuildingKind::Hut, &spec, 2);
        tile.add_buildings(BuildingKind::Hut, &spec, 3);
        assert_eq!(tile.building_level(BuildingKind::Hut), 5);
        assert_eq!(tile.used_space_units, 5);
        assert_eq!(land.total_housing_capacity(), 25);
        assert_eq!(land.worksite_capacity(), 8_995);
    }

    #[test]
    fn enqueue_rejects_unknown_and_forbidden_orders() {
        let mut catalog = BuildingCatalog::default();
        catalog.remove(BuildingKind::Mine);
        let mut land = land();

        let err = land
            .enqueue_building(&catalog, BuildingKind::Mine, BuildingCategory::Industry, GridPosition::ORIGIN, 1)
            .unwrap_err();
        assert_eq!(err, SimError::UnknownBuilding { name: "mine".into() });

        let err = land
            .enqueue_building(&catalog, BuildingKind::Hut, BuildingCategory::Industry, GridPosition::ORIGIN, 1)
            .unwrap_err();
        assert!(matches!(err, SimError::BuildingCategoryMismatch { .. }));

        let err = land
            .enqueue_building(&catalog, BuildingKind::Hut, BuildingCategory::Housing, GridPosition::new(3, 3), 1)
            .unwrap_err();
        assert!(matches!(err, SimError::TileNotControlled { .. }));

        land.set_permissions(GridPosition::ORIGIN, TilePermissions::NONE).unwrap();
        let err = land
            .enqueue_building(&catalog, BuildingKind::Hut, BuildingCategory::Housing, GridPosition::ORIGIN, 1)
            .unwrap_err();
        assert!(matches!(err, SimError::BuildingNotPermitted { .. }));
        assert!(land.building_queue.is_empty());
    }

    #[test]
    fn enqueue_records_total_order_cost() {
        let catalog = BuildingCatalog::default();
        let mut land = land();
        land.tile_mut(GridPosition::ORIGIN).unwrap().biome = Biome::Forest;
        land.enqueue_building(&catalog, BuildingKind::Hut, BuildingCategory::Housing, GridPosition::ORIGIN, 3)
            .unwrap();
        let item = &land.building_queue[0];
        assert_eq!(item.level, 3);
        assert!((item.initial_cost.labor - 2.0 * 1.2 * 3.0).abs() < 1e-9);
        assert!((item.initial_cost.hide - 12.0).abs() < 1e-9);
        assert_eq!(item.initial_cost, item.remaining_cost);
    }
}
