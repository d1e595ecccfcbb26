//! Player and host commands applied to the world between ticks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    clock::TickRate,
    error::SimError,
    land::{BuildingCategory, BuildingKind, GridPosition, TilePermissions},
    occupations::Occupation,
    systems::workforce,
    world::World,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    EnqueueBuilding {
        name: BuildingKind,
        category: BuildingCategory,
        position: GridPosition,
        quantity: u32,
    },
    SetOccupationAllocation {
        allocation: BTreeMap<Occupation, f64>,
    },
    /// Moves one allocation slider and rebalances the others.
    SetOccupationShare { occupation: Occupation, share: f64 },
    SetOccupationLock { occupation: Occupation, locked: bool },
    SetTilePermissions {
        position: GridPosition,
        permissions: TilePermissions,
    },
    ClaimTile { position: GridPosition },
    DiscoverTile { position: GridPosition },
    SetTickRate { rate: TickRate },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::EnqueueBuilding { .. } => "enqueue_building",
            Command::SetOccupationAllocation { .. } => "set_occupation_allocation",
            Command::SetOccupationShare { .. } => "set_occupation_share",
            Command::SetOccupationLock { .. } => "set_occupation_lock",
            Command::SetTilePermissions { .. } => "set_tile_permissions",
            Command::ClaimTile { .. } => "claim_tile",
            Command::DiscoverTile { .. } => "discover_tile",
            Command::SetTickRate { .. } => "set_tick_rate",
        }
    }
}

impl World {
    /// Applies a command. A rejected command leaves the world untouched.
    ///
    /// Allocation changes re-run the workforce allocator straight away so
    /// worker counts reflect the new policy before the next tick.
    pub fn apply_command(&mut self, command: Command) -> Result<(), SimError> {
        let kind = command.kind();
        match command {
            Command::EnqueueBuilding {
                name,
                category,
                position,
                quantity,
            } => {
                self.land
                    .enqueue_building(&self.catalog, name, category, position, quantity)?;
            }
            Command::SetOccupationAllocation { allocation } => {
                self.occupations.set_allocation(&allocation);
                workforce::reallocate(self);
            }
            Command::SetOccupationShare { occupation, share } => {
                if self.occupations.set_share(occupation, share) {
                    workforce::reallocate(self);
                }
            }
            Command::SetOccupationLock { occupation, locked } => {
                self.occupations.set_lock(occupation, locked);
            }
            Command::SetTilePermissions {
                position,
                permissions,
            } => self.land.set_permissions(position, permissions)?,
            Command::ClaimTile { position } => {
                self.land.claim_tile(position)?;
                workforce::reallocate(self);
            }
            Command::DiscoverTile { position } => self.land.discover_tile(position)?,
            Command::SetTickRate { rate } => self.set_tick_rate(rate),
        }
        debug!(tick = self.tick(), command = kind, "Command applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Rates,
        land::{Biome, BuildingCatalog, Land},
        population::{AgeGroup, Citizenship, CohortId, CohortStore, Gender},
    };

    fn world() -> World {
        let land = Land::generate(2, 1, Biome::Grassland, 1000);
        let adults = CohortId::new(AgeGroup::Adults, Gender::Male, Citizenship::Citizen);
        let mut world = World::new(Rates::default(), BuildingCatalog::default(), land)
            .with_cohorts(CohortStore::with_sizes([(adults, 200)]));
        world
            .apply_command(Command::SetOccupationAllocation {
                allocation: [(Occupation::Hunters, 0.5), (Occupation::Gatherers, 0.5)]
                    .into_iter()
                    .collect(),
            })
            .unwrap();
        world
    }

    #[test]
    fn enqueue_adds_a_queue_item() {
        let mut world = world();
        world
            .apply_command(Command::EnqueueBuilding {
                name: BuildingKind::Hut,
                category: BuildingCategory::Housing,
                position: GridPosition::ORIGIN,
                quantity: 2,
            })
            .unwrap();
        let item = &world.land().building_queue[0];
        assert_eq!(item.level, 2);
        assert!((item.remaining_cost.labor - 4.0).abs() < 1e-9);
    }

    #[test]
    fn enqueue_on_uncontrolled_tile_is_rejected() {
        let mut world = world();
        let before = world.clone();
        let err = world
            .apply_command(Command::EnqueueBuilding {
                name: BuildingKind::Hut,
                category: BuildingCategory::Housing,
                position: GridPosition::new(2, 2),
                quantity: 1,
            })
            .unwrap_err();
        assert_eq!(
            err,
            SimError::TileNotControlled {
                position: GridPosition::new(2, 2)
            }
        );
        assert_eq!(world, before);
    }

    #[test]
    fn allocation_change_reassigns_workers() {
        let world = world();
        assert_eq!(world.occupation_size(Occupation::Hunters), 100);
        assert_eq!(world.occupation_size(Occupation::Gatherers), 100);
    }

    #[test]
    fn slider_move_rebalances_and_reassigns() {
        let mut world = world();
        world
            .apply_command(Command::SetOccupationShare {
                occupation: Occupation::Hunters,
                share: 0.25,
            })
            .unwrap();
        assert!((world.occupations().allocation(Occupation::Gatherers) - 0.75).abs() < 1e-9);
        assert_eq!(world.occupation_size(Occupation::Hunters), 50);
        assert_eq!(world.occupation_size(Occupation::Gatherers), 150);
    }

    #[test]
    fn locked_share_ignores_slider_commands() {
        let mut world = world();
        world
            .apply_command(Command::SetOccupationLock {
                occupation: Occupation::Hunters,
                locked: true,
            })
            .unwrap();
        world
            .apply_command(Command::SetOccupationShare {
                occupation: Occupation::Hunters,
                share: 0.9,
            })
            .unwrap();
        assert!((world.occupations().allocation(Occupation::Hunters) - 0.5).abs() < 1e-9);
        assert_eq!(world.occupation_size(Occupation::Hunters), 100);
    }

    #[test]
    fn claiming_a_tile_controls_and_reveals_it() {
        let mut world = world();
        let position = GridPosition::new(2, 0);
        world.apply_command(Command::ClaimTile { position }).unwrap();
        let tile = world.land().tile(position).unwrap();
        assert!(tile.controlled);
        assert!(tile.discovered);
        assert_eq!(tile.permissions, TilePermissions::ALL);
    }

    #[test]
    fn tick_rate_command_changes_multiplier() {
        let mut world = world();
        world
            .apply_command(Command::SetTickRate {
                rate: TickRate::Week,
            })
            .unwrap();
        assert_eq!(world.tick_multiplier(), 7.0);
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let command: Command = serde_json::from_str(
            r#"{"type":"enqueue_building","name":"hut","category":"housing","position":"0,0","quantity":1}"#,
        )
        .unwrap();
        assert_eq!(command.kind(), "enqueue_building");
    }
}
