use thiserror::Error;

use crate::land::{BuildingCategory, BuildingKind, GridPosition};

/// Configuration and command errors raised by the simulation core.
///
/// Resource shortfalls are never errors; they clamp to zero inside the
/// systems. Everything here identifies a key that a lookup table could not
/// resolve, so the caller can report exactly what was wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("building '{name}' has no entry in the building catalog")]
    UnknownBuilding { name: String },

    #[error("unknown building category '{category}'")]
    UnknownBuildingCategory { category: String },

    #[error("building '{name}' belongs to category {expected}, not {found}")]
    BuildingCategoryMismatch {
        name: BuildingKind,
        expected: BuildingCategory,
        found: BuildingCategory,
    },

    #[error("no tile at position {position}")]
    UnknownTile { position: GridPosition },

    #[error("tile {position} is not controlled by the settlement")]
    TileNotControlled { position: GridPosition },

    #[error("tile {position} does not permit {category} buildings ('{name}')")]
    BuildingNotPermitted {
        name: BuildingKind,
        category: BuildingCategory,
        position: GridPosition,
    },

    #[error("unknown occupation '{id}'")]
    UnknownOccupation { id: String },

    #[error("unknown cohort '{id}'")]
    UnknownCohort { id: String },

    #[error("unknown tick rate '{value}'")]
    UnknownTickRate { value: String },

    #[error("build quantity must be at least 1")]
    InvalidQuantity,
}
