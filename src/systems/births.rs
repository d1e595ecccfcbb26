use anyhow::Result;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::Rates,
    engine::{System, SystemContext},
    error::SimError,
    population::{AgeGroup, Citizenship, CohortId, CohortStore, Gender},
    rng::SystemRng,
    world::World,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BirthReport {
    pub breeding_pairs: u32,
    pub fertility_modifier: f64,
    pub growth: f64,
    pub born_female: u32,
    pub born_male: u32,
}

impl BirthReport {
    pub fn born(&self) -> u32 {
        self.born_female + self.born_male
    }
}

/// Penalty on fertility from food and housing insecurity.
pub fn fertility_modifier(food_score: f64, housing_score: f64) -> f64 {
    let mut modifier = 1.0;
    if food_score < 1.0 {
        modifier *= (food_score * 1.2).min(1.0);
    }
    if housing_score < 1.0 {
        modifier *= housing_score * 0.5;
    }
    modifier.max(0.0)
}

pub fn breeding_pairs(cohorts: &CohortStore, rates: &Rates) -> Result<u32, SimError> {
    let mothers = cohorts.cohort(&CohortId::new(
        AgeGroup::Adults,
        Gender::Female,
        Citizenship::Citizen,
    ))?;
    let fathers = cohorts.cohort(&CohortId::new(
        AgeGroup::Adults,
        Gender::Male,
        Citizenship::Citizen,
    ))?;
    let fertile = mothers.population_between_ages(rates.fertility_age_min, rates.fertility_age_max);
    Ok(fertile.min(fathers.size))
}

/// Adds this tick's growth to `accumulator` and returns the whole children
/// born; the fraction stays in the accumulator.
pub fn accumulate(accumulator: &mut f64, growth: f64) -> u32 {
    let total = (*accumulator + growth).max(0.0);
    let born = total.floor();
    *accumulator = total - born;
    born as u32
}

pub fn simulate_births(
    cohorts: &mut CohortStore,
    rates: &Rates,
    accumulator: &mut f64,
    food_score: f64,
    housing_score: f64,
    tick_multiplier: f64,
    rng: &mut dyn RngCore,
) -> Result<BirthReport, SimError> {
    let pairs = breeding_pairs(cohorts, rates)?;
    let modifier = fertility_modifier(food_score, housing_score);
    let growth = f64::from(pairs) * rates.growth_rate() * tick_multiplier * modifier;
    let born = accumulate(accumulator, growth);

    let female_ratio = rates.female_gender_ratio.clamp(0.0, 1.0);
    let born_female = (0..born).filter(|_| rng.gen::<f64>() < female_ratio).count() as u32;
    let born_male = born - born_female;

    for (gender, count) in [(Gender::Female, born_female), (Gender::Male, born_male)] {
        if count > 0 {
            cohorts
                .cohort_mut(&CohortId::new(AgeGroup::Children, gender, Citizenship::Citizen))?
                .add_newborns(count);
        }
    }

    Ok(BirthReport {
        breeding_pairs: pairs,
        fertility_modifier: modifier,
        growth,
        born_female,
        born_male,
    })
}

pub struct BirthSystem;

impl BirthSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BirthSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BirthSystem {
    fn name(&self) -> &str {
        "births"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let mut accumulator = world.birth_accumulator;
        let report = simulate_births(
            &mut world.cohorts,
            &world.rates,
            &mut accumulator,
            world.security.food_score,
            world.security.housing_score,
            ctx.tick_multiplier,
            rng,
        )?;
        world.birth_accumulator = accumulator;
        debug!(
            tick = ctx.tick,
            breeding_pairs = report.breeding_pairs,
            growth = report.growth,
            born = report.born(),
            accumulator,
            "Births simulated"
        );
        world.births = report;
        Ok(())
    }
}
