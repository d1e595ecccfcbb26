use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Occupations in allocation order. The order matters: the workforce
/// allocator hands its rounding remainder to the first eligible entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupation {
    Hunters,
    Gatherers,
    Farmers,
    Laborers,
    Soldiers,
    CoalMiners,
    IronMiners,
    GoldMiners,
    Woodcutters,
    Stoneworkers,
    Blacksmiths,
    Tailors,
}

impl Occupation {
    pub const ALL: [Occupation; 12] = [
        Occupation::Hunters,
        Occupation::Gatherers,
        Occupation::Farmers,
        Occupation::Laborers,
        Occupation::Soldiers,
        Occupation::CoalMiners,
        Occupation::IronMiners,
        Occupation::GoldMiners,
        Occupation::Woodcutters,
        Occupation::Stoneworkers,
        Occupation::Blacksmiths,
        Occupation::Tailors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Occupation::Hunters => "hunters",
            Occupation::Gatherers => "gatherers",
            Occupation::Farmers => "farmers",
            Occupation::Laborers => "laborers",
            Occupation::Soldiers => "soldiers",
            Occupation::CoalMiners => "coal_miners",
            Occupation::IronMiners => "iron_miners",
            Occupation::GoldMiners => "gold_miners",
            Occupation::Woodcutters => "woodcutters",
            Occupation::Stoneworkers => "stoneworkers",
            Occupation::Blacksmiths => "blacksmiths",
            Occupation::Tailors => "tailors",
        }
    }

    /// Occupations without an enabled production chain.
    pub fn inert_by_default(self) -> bool {
        !matches!(
            self,
            Occupation::Hunters | Occupation::Gatherers | Occupation::Farmers | Occupation::Laborers
        )
    }
}

impl fmt::Display for Occupation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Occupation {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Occupation::ALL
            .into_iter()
            .find(|o| o.as_str().replace('_', "") == normalized)
            .ok_or_else(|| SimError::UnknownOccupation { id: s.to_string() })
    }
}

/// Player policy (fractions, locks) plus the realised worker counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationState {
    pub allocation: BTreeMap<Occupation, f64>,
    pub sizes: BTreeMap<Occupation, u32>,
    #[serde(default)]
    pub locked: BTreeSet<Occupation>,
    #[serde(default)]
    pub unavailable: BTreeSet<Occupation>,
}

impl Default for OccupationState {
    fn default() -> Self {
        Self {
            allocation: Occupation::ALL.into_iter().map(|o| (o, 0.0)).collect(),
            sizes: Occupation::ALL.into_iter().map(|o| (o, 0)).collect(),
            locked: BTreeSet::new(),
            unavailable: Occupation::ALL
                .into_iter()
                .filter(|o| o.inert_by_default())
                .collect(),
        }
    }
}

impl OccupationState {
    pub fn with_allocation(allocation: impl IntoIterator<Item = (Occupation, f64)>) -> Self {
        let mut state = Self::default();
        for (occupation, fraction) in allocation {
            state.allocation.insert(occupation, fraction.clamp(0.0, 1.0));
        }
        state
    }

    pub fn allocation(&self, occupation: Occupation) -> f64 {
        self.allocation.get(&occupation).copied().unwrap_or(0.0)
    }

    pub fn size(&self, occupation: Occupation) -> u32 {
        self.sizes.get(&occupation).copied().unwrap_or(0)
    }

    pub fn total_assigned(&self) -> u64 {
        self.sizes.values().map(|s| u64::from(*s)).sum()
    }

    pub fn is_locked(&self, occupation: Occupation) -> bool {
        self.locked.contains(&occupation)
    }

    pub fn is_available(&self, occupation: Occupation) -> bool {
        !self.unavailable.contains(&occupation)
    }

    /// Whether leftover workers may be placed in this occupation.
    pub fn can_accept_workers(&self, occupation: Occupation) -> bool {
        self.is_available(occupation) && !self.is_locked(occupation)
    }

    /// Replaces the allocation map. Missing occupations fall to zero.
    pub fn set_allocation(&mut self, allocation: &BTreeMap<Occupation, f64>) {
        for occupation in Occupation::ALL {
            let fraction = allocation.get(&occupation).copied().unwrap_or(0.0);
            self.allocation.insert(occupation, fraction.clamp(0.0, 1.0));
        }
    }

    pub fn set_lock(&mut self, occupation: Occupation, locked: bool) {
        if locked {
            self.locked.insert(occupation);
        } else {
            self.locked.remove(&occupation);
        }
    }

    pub fn set_available(&mut self, occupation: Occupation, available: bool) {
        if available {
            self.unavailable.remove(&occupation);
        } else {
            self.unavailable.insert(occupation);
        }
    }

    /// Moves one slider: sets `occupation` to `share` and scales the other
    /// unlocked, available occupations so the allocation still sums to 1.
    /// Locked shares stay fixed and cap how far the slider can go.
    /// Returns false when nothing changed, which includes a locked slider.
    pub fn set_share(&mut self, occupation: Occupation, share: f64) -> bool {
        const EPS: f64 = 1e-4;
        if !self.can_accept_workers(occupation) {
            return false;
        }
        let locked_total: f64 = self
            .locked
            .iter()
            .filter(|o| **o != occupation)
            .map(|o| self.allocation(*o))
            .sum();
        let share = share.clamp(0.0, (1.0 - locked_total).max(0.0));
        let diff = share - self.allocation(occupation);
        if diff == 0.0 {
            return false;
        }

        let adjustable: Vec<Occupation> = Occupation::ALL
            .into_iter()
            .filter(|o| *o != occupation && self.can_accept_workers(*o))
            .collect();
        let adjustable_total: f64 = adjustable.iter().map(|o| self.allocation(*o)).sum();

        self.allocation.insert(occupation, share);
        for other in &adjustable {
            let current = self.allocation(*other);
            let next = if adjustable_total <= 0.0 {
                (1.0 - share - locked_total) / adjustable.len() as f64
            } else {
                (current - diff * current / adjustable_total).max(0.0)
            };
            self.allocation.insert(*other, next);
        }

        let total: f64 = self.allocation.values().sum();
        if (total - 1.0).abs() > EPS {
            let target = adjustable.first().copied().unwrap_or(occupation);
            if let Some(fraction) = self.allocation.get_mut(&target) {
                *fraction += 1.0 - total;
            }
        }
        for fraction in self.allocation.values_mut() {
            *fraction = fraction.max(0.0);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation_sum(state: &OccupationState) -> f64 {
        state.allocation.values().sum()
    }

    #[test]
    fn parses_snake_and_camel_case_ids() {
        assert_eq!("coal_miners".parse::<Occupation>().unwrap(), Occupation::CoalMiners);
        assert_eq!("coalMiners".parse::<Occupation>().unwrap(), Occupation::CoalMiners);
        assert_eq!(
            "priests".parse::<Occupation>(),
            Err(SimError::UnknownOccupation { id: "priests".into() })
        );
    }

    #[test]
    fn only_core_occupations_start_available() {
        let state = OccupationState::default();
        assert!(state.is_available(Occupation::Gatherers));
        assert!(state.is_available(Occupation::Laborers));
        assert!(!state.is_available(Occupation::Soldiers));
        assert!(!state.is_available(Occupation::Tailors));
    }

    #[test]
    fn slider_scales_other_shares_proportionally() {
        let mut state = OccupationState::with_allocation([
            (Occupation::Hunters, 0.2),
            (Occupation::Gatherers, 0.6),
            (Occupation::Laborers, 0.2),
        ]);
        assert!(state.set_share(Occupation::Hunters, 0.4));
        assert!((state.allocation(Occupation::Hunters) - 0.4).abs() < 1e-9);
        assert!((state.allocation(Occupation::Gatherers) - 0.45).abs() < 1e-9);
        assert!((state.allocation(Occupation::Laborers) - 0.15).abs() < 1e-9);
        assert!((allocation_sum(&state) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn slider_leaves_locked_shares_alone() {
        let mut state = OccupationState::with_allocation([
            (Occupation::Hunters, 0.3),
            (Occupation::Gatherers, 0.5),
            (Occupation::Laborers, 0.2),
        ]);
        state.set_lock(Occupation::Hunters, true);
        state.set_share(Occupation::Gatherers, 0.9);
        assert!((state.allocation(Occupation::Hunters) - 0.3).abs() < 1e-9);
        assert!((state.allocation(Occupation::Gatherers) - 0.7).abs() < 1e-9);
        assert!(state.allocation(Occupation::Laborers).abs() < 1e-9);
    }

    #[test]
    fn locked_slider_does_not_move() {
        let mut state = OccupationState::with_allocation([
            (Occupation::Hunters, 0.3),
            (Occupation::Gatherers, 0.7),
        ]);
        state.set_lock(Occupation::Hunters, true);
        assert!(!state.set_share(Occupation::Hunters, 0.8));
        assert!((state.allocation(Occupation::Hunters) - 0.3).abs() < 1e-9);
        assert!((state.allocation(Occupation::Gatherers) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn slider_ignores_unavailable_occupations() {
        let mut state = OccupationState::with_allocation([(Occupation::Gatherers, 1.0)]);
        assert!(!state.set_share(Occupation::Soldiers, 0.5));
        assert_eq!(state.allocation(Occupation::Soldiers), 0.0);
    }

    #[test]
    fn slider_spreads_evenly_from_empty_others() {
        let mut state = OccupationState::with_allocation([(Occupation::Gatherers, 1.0)]);
        state.set_share(Occupation::Gatherers, 0.4);
        for other in [Occupation::Hunters, Occupation::Farmers, Occupation::Laborers] {
            assert!((state.allocation(other) - 0.2).abs() < 1e-9, "{other}");
        }
        assert!((allocation_sum(&state) - 1.0).abs() < 1e-9);
    }
}
