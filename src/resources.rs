use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Food,
    Hide,
    Wood,
    Stone,
    Knowledge,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Food => "food",
            ResourceKind::Hide => "hide",
            ResourceKind::Wood => "wood",
            ResourceKind::Stone => "stone",
            ResourceKind::Knowledge => "knowledge",
        };
        f.write_str(name)
    }
}

/// Stock of every tracked resource. Stocks never go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStore {
    #[serde(default)]
    pub food: f64,
    #[serde(default)]
    pub hide: f64,
    #[serde(default)]
    pub wood: f64,
    #[serde(default)]
    pub stone: f64,
    #[serde(default)]
    pub knowledge: f64,
}

impl ResourceStore {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Hide => self.hide,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Knowledge => self.knowledge,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut f64 {
        match kind {
            ResourceKind::Food => &mut self.food,
            ResourceKind::Hide => &mut self.hide,
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
            ResourceKind::Knowledge => &mut self.knowledge,
        }
    }

    /// Removes up to `amount`, returning the part that could not be covered.
    pub fn withdraw(&mut self, kind: ResourceKind, amount: f64) -> f64 {
        let stock = self.get_mut(kind);
        let taken = amount.max(0.0).min(*stock);
        *stock -= taken;
        amount.max(0.0) - taken
    }

    /// Pays the material part of a cost (everything except labor), clamping at zero.
    pub fn pay(&mut self, cost: &ResourceCost) {
        for kind in ResourceCost::MATERIALS {
            self.withdraw(kind, cost.material(kind));
        }
    }

    pub fn clamp_non_negative(&mut self) {
        self.food = self.food.max(0.0);
        self.hide = self.hide.max(0.0);
        self.wood = self.wood.max(0.0);
        self.stone = self.stone.max(0.0);
        self.knowledge = self.knowledge.max(0.0);
    }
}

/// A cost vector in labor and materials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    #[serde(default)]
    pub labor: f64,
    #[serde(default)]
    pub food: f64,
    #[serde(default)]
    pub wood: f64,
    #[serde(default)]
    pub stone: f64,
    #[serde(default)]
    pub hide: f64,
}

impl ResourceCost {
    pub const MATERIALS: [ResourceKind; 4] = [
        ResourceKind::Food,
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Hide,
    ];

    pub fn labor(labor: f64) -> Self {
        Self {
            labor,
            ..Self::default()
        }
    }

    pub fn material(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Hide => self.hide,
            ResourceKind::Knowledge => 0.0,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            labor: self.labor * factor,
            food: self.food * factor,
            wood: self.wood * factor,
            stone: self.stone * factor,
            hide: self.hide * factor,
        }
    }

    pub fn add(&mut self, other: &ResourceCost) {
        self.labor += other.labor;
        self.food += other.food;
        self.wood += other.wood;
        self.stone += other.stone;
        self.hide += other.hide;
    }

    /// Subtracts `other`, flooring each component at zero.
    pub fn saturating_sub(&self, other: &ResourceCost) -> Self {
        Self {
            labor: (self.labor - other.labor).max(0.0),
            food: (self.food - other.food).max(0.0),
            wood: (self.wood - other.wood).max(0.0),
            stone: (self.stone - other.stone).max(0.0),
            hide: (self.hide - other.hide).max(0.0),
        }
    }

    pub fn is_settled(&self) -> bool {
        const EPS: f64 = 1e-9;
        self.labor <= EPS
            && self.food <= EPS
            && self.wood <= EPS
            && self.stone <= EPS
            && self.hide <= EPS
    }

    /// Whole units of this cost that `stock` can pay in materials.
    /// `None` when the cost has no material component.
    pub fn affordable_units(&self, stock: &ResourceStore) -> Option<u32> {
        Self::MATERIALS
            .iter()
            .filter(|kind| self.material(**kind) > 0.0)
            .map(|kind| whole_units(stock.get(*kind), self.material(*kind)))
            .min()
    }
}

/// `floor(available / unit)` as a count, saturating at `u32::MAX`.
pub fn whole_units(available: f64, unit: f64) -> u32 {
    if unit <= 0.0 {
        return u32::MAX;
    }
    let units = (available.max(0.0) / unit + 1e-9).floor();
    if units >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        units as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraw_clamps_and_reports_shortfall() {
        let mut store = ResourceStore {
            hide: 3.0,
            ..ResourceStore::default()
        };
        let unmet = store.withdraw(ResourceKind::Hide, 5.0);
        assert_eq!(store.hide, 0.0);
        assert!((unmet - 2.0).abs() < 1e-12);
    }

    #[test]
    fn affordable_units_uses_scarcest_material() {
        let cost = ResourceCost {
            labor: 2.0,
            hide: 4.0,
            wood: 1.0,
            ..ResourceCost::default()
        };
        let stock = ResourceStore {
            hide: 9.0,
            wood: 10.0,
            ..ResourceStore::default()
        };
        assert_eq!(cost.affordable_units(&stock), Some(2));
        assert_eq!(ResourceCost::labor(3.0).affordable_units(&stock), None);
    }

    #[test]
    fn whole_units_tolerates_float_noise() {
        assert_eq!(whole_units(0.6 * 3.0, 0.6), 3);
        assert_eq!(whole_units(7.0, 2.0), 3);
        assert_eq!(whole_units(-1.0, 2.0), 0);
    }
}
