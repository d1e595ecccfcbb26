use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    population::AgeGroup,
    rng::SystemRng,
    world::World,
};

/// Stock runway, in days, that counts as fully secure.
pub const FOOD_RUNWAY_DAYS: f64 = 90.0;

const RUNWAY_WEIGHT: f64 = 0.15;
const SUSTAINABILITY_WEIGHT: f64 = 0.10;
const STOCK_WEIGHT: f64 = 0.75;

/// Scores for the current tick and the per-age-group death multipliers
/// derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScores {
    pub food_score: f64,
    pub housing_score: f64,
    pub starvation_multipliers: BTreeMap<AgeGroup, f64>,
    pub housing_multipliers: BTreeMap<AgeGroup, f64>,
}

impl Default for SecurityScores {
    fn default() -> Self {
        let neutral: BTreeMap<AgeGroup, f64> = AgeGroup::ALL.into_iter().map(|g| (g, 1.0)).collect();
        Self {
            food_score: 1.0,
            housing_score: 1.0,
            starvation_multipliers: neutral.clone(),
            housing_multipliers: neutral,
        }
    }
}

impl SecurityScores {
    pub fn starvation_multiplier(&self, age_group: AgeGroup) -> f64 {
        self.starvation_multipliers
            .get(&age_group)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn housing_multiplier(&self, age_group: AgeGroup) -> f64 {
        self.housing_multipliers.get(&age_group).copied().unwrap_or(1.0)
    }
}

pub fn vulnerability(age_group: AgeGroup) -> f64 {
    match age_group {
        AgeGroup::Children => 3.0,
        AgeGroup::Adults => 1.0,
        AgeGroup::Elders => 2.5,
    }
}

/// `production` and `consumption` are per tick; `tick_multiplier` turns
/// them back into daily figures for the runway.
pub fn food_security_score(stock: f64, production: f64, consumption: f64, tick_multiplier: f64) -> f64 {
    if consumption <= 0.0 {
        return 1.0;
    }
    let daily_consumption = consumption / tick_multiplier.max(1.0);
    let runway = (stock.max(0.0) / daily_consumption / FOOD_RUNWAY_DAYS).min(1.0);
    let sustainability = (production / consumption).clamp(0.0, 1.0);
    let in_stock = if stock > 0.0 { 1.0 } else { 0.0 };
    (RUNWAY_WEIGHT * runway + SUSTAINABILITY_WEIGHT * sustainability + STOCK_WEIGHT * in_stock)
        .clamp(0.0, 1.0)
}

pub fn starvation_multiplier(score: f64, stock: f64, age_group: AgeGroup) -> f64 {
    let v = vulnerability(age_group);
    if stock <= 0.0 {
        return 10.0 * v;
    }
    if score >= 0.95 {
        1.0
    } else if score >= 0.5 {
        1.0 + v * (0.95 - score) / 0.45
    } else {
        let depth = (0.5 - score) / 0.5;
        1.0 + v * (1.0 + 4.0 * depth * depth)
    }
}

/// `production_factor` is fixed at 1 until housing construction feeds it.
pub fn housing_score(capacity: u64, population: u64) -> f64 {
    const PRODUCTION_FACTOR: f64 = 1.0;
    let ratio = if population == 0 {
        1.0
    } else {
        (capacity as f64 / population as f64).min(1.0)
    };
    0.9 * ratio + 0.1 * PRODUCTION_FACTOR
}

pub fn housing_multiplier(score: f64, age_group: AgeGroup) -> f64 {
    1.0 + vulnerability(age_group) * (1.0 - score).max(0.0)
}

pub fn score_world(world: &World) -> SecurityScores {
    let stock = world.resources.food;
    let food_score = food_security_score(
        stock,
        world.ledger.food_production,
        world.ledger.food_consumption,
        world.tick_multiplier(),
    );
    let housing = housing_score(world.total_housing_capacity(), world.total_population());
    SecurityScores {
        food_score,
        housing_score: housing,
        starvation_multipliers: AgeGroup::ALL
            .into_iter()
            .map(|g| (g, starvation_multiplier(food_score, stock, g)))
            .collect(),
        housing_multipliers: AgeGroup::ALL
            .into_iter()
            .map(|g| (g, housing_multiplier(housing, g)))
            .collect(),
    }
}

pub struct SecuritySystem;

impl SecuritySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SecuritySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for SecuritySystem {
    fn name(&self) -> &str {
        "security"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let scores = score_world(world);
        debug!(
            tick = ctx.tick,
            food_score = scores.food_score,
            housing_score = scores.housing_score,
            "Security scores updated"
        );
        world.security = scores;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_consumption_is_fully_secure() {
        assert_eq!(food_security_score(0.0, 0.0, 0.0, 30.0), 1.0);
    }

    #[test]
    fn empty_stock_drops_score_sharply() {
        let score = food_security_score(0.0, 5.0, 10.0, 30.0);
        assert!((score - 0.05).abs() < 1e-12);
        assert!(score <= 0.1);
    }

    #[test]
    fn healthy_stock_scores_full() {
        // 90 days of consumption in stock, production covering consumption.
        let score = food_security_score(90.0 * 2.0, 60.0, 60.0, 30.0);
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn starvation_multiplier_follows_severity_curve() {
        assert_eq!(starvation_multiplier(0.97, 10.0, AgeGroup::Adults), 1.0);
        assert!((starvation_multiplier(0.5, 10.0, AgeGroup::Adults) - 2.0).abs() < 1e-12);
        assert!((starvation_multiplier(0.0, 10.0, AgeGroup::Adults) - 6.0).abs() < 1e-12);
        assert_eq!(starvation_multiplier(0.8, 0.0, AgeGroup::Children), 30.0);
        assert!(
            starvation_multiplier(0.3, 10.0, AgeGroup::Children)
                > starvation_multiplier(0.3, 10.0, AgeGroup::Adults)
        );
    }

    #[test]
    fn housing_shortage_raises_multiplier_linearly() {
        assert_eq!(housing_score(0, 0), 1.0);
        assert_eq!(housing_score(500, 100), 1.0);
        let score = housing_score(50, 100);
        assert!((score - 0.55).abs() < 1e-12);
        assert!((housing_multiplier(score, AgeGroup::Elders) - (1.0 + 2.5 * 0.45)).abs() < 1e-12);
    }
}
