//! Aging, promotion between age groups and stochastic deaths.

use std::collections::BTreeMap;

use anyhow::Result;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    error::SimError,
    population::{AgeBucket, AgeGroup, CohortId, CohortStore},
    rng::SystemRng,
    sampling::{DeathSampler, ThresholdSampler},
    systems::security::SecurityScores,
    world::World,
};

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicReport {
    pub deaths: BTreeMap<AgeGroup, u64>,
    /// Individuals that left each age group for the next one.
    pub promotions: BTreeMap<AgeGroup, u64>,
    /// Elders that aged past the last bucket.
    pub aged_out: u64,
    pub total_population: u64,
}

impl DemographicReport {
    pub fn total_deaths(&self) -> u64 {
        self.deaths.values().sum()
    }
}

struct AgingOutcome {
    promotions: Vec<(CohortId, u32)>,
    aged_out: u32,
}

/// Ages one cohort in place, oldest bucket first so nobody moves twice.
/// Whoever leaves the last bucket is returned rather than placed.
fn age_cohort_buckets(buckets: &mut [AgeBucket], tick_multiplier: f64) -> u32 {
    let last = buckets.len().saturating_sub(1);
    let mut leaving = 0;
    for i in (0..buckets.len()).rev() {
        let bucket = &mut buckets[i];
        let progress =
            bucket.aging_progress + f64::from(bucket.population) / DAYS_PER_YEAR * tick_multiplier;
        if progress < 1.0 {
            bucket.aging_progress = progress;
            continue;
        }
        let moving = (progress.floor() as u32).min(bucket.population);
        bucket.aging_progress = progress.fract();
        bucket.population -= moving;
        if i == last {
            leaving = moving;
        } else {
            buckets[i + 1].population += moving;
        }
    }
    leaving
}

fn age_all(store: &mut CohortStore, tick_multiplier: f64) -> AgingOutcome {
    let mut outcome = AgingOutcome {
        promotions: Vec::new(),
        aged_out: 0,
    };
    for group in AgeGroup::ALL {
        for cohort in store.iter_mut().filter(|c| c.id.age_group == group) {
            let leaving = age_cohort_buckets(&mut cohort.buckets, tick_multiplier);
            if leaving == 0 {
                continue;
            }
            match group.next() {
                Some(next) => outcome.promotions.push((cohort.id.with_age_group(next), leaving)),
                None => outcome.aged_out += leaving,
            }
        }
    }
    outcome
}

/// Per-tick death probability for one bucket.
pub fn death_probability(
    daily_death_chance: f64,
    starvation: f64,
    housing: f64,
    tick_multiplier: f64,
) -> f64 {
    (daily_death_chance * starvation * housing * tick_multiplier).clamp(0.0, 1.0)
}

/// One demographic step over the whole store: aging, buffered promotions,
/// then deaths, then size recomputation.
pub fn simulate(
    store: &mut CohortStore,
    tick_multiplier: f64,
    security: &SecurityScores,
    sampler: &dyn DeathSampler,
    rng: &mut dyn RngCore,
) -> Result<DemographicReport, SimError> {
    let mut report = DemographicReport::default();

    let aging = age_all(store, tick_multiplier);
    for (target, count) in aging.promotions {
        let cohort = store.cohort_mut(&target)?;
        if let Some(first) = cohort.buckets.first_mut() {
            first.population += count;
        }
        let source = match target.age_group {
            AgeGroup::Adults => AgeGroup::Children,
            _ => AgeGroup::Adults,
        };
        *report.promotions.entry(source).or_default() += u64::from(count);
    }
    report.aged_out = u64::from(aging.aged_out);

    for cohort in store.iter_mut() {
        let group = cohort.id.age_group;
        let starvation = security.starvation_multiplier(group);
        let housing = security.housing_multiplier(group);
        let mut cohort_deaths = 0u64;
        for bucket in cohort.buckets.iter_mut() {
            if bucket.population == 0 {
                continue;
            }
            let p = death_probability(bucket.daily_death_chance, starvation, housing, tick_multiplier);
            let deaths = sampler.sample(bucket.population, p, rng).min(bucket.population);
            bucket.population -= deaths;
            cohort_deaths += u64::from(deaths);
        }
        *report.deaths.entry(group).or_default() += cohort_deaths;
    }

    store.recompute_sizes();
    report.total_population = store.total();
    Ok(report)
}

pub struct DemographicSystem {
    sampler: Box<dyn DeathSampler>,
}

impl DemographicSystem {
    pub fn new() -> Self {
        Self::with_sampler(ThresholdSampler::default())
    }

    pub fn with_sampler(sampler: impl DeathSampler + 'static) -> Self {
        Self {
            sampler: Box::new(sampler),
        }
    }
}

impl Default for DemographicSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DemographicSystem {
    fn name(&self) -> &str {
        "demographics"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let report = simulate(
            &mut world.cohorts,
            ctx.tick_multiplier,
            &world.security,
            self.sampler.as_ref(),
            rng,
        )?;
        debug!(
            tick = ctx.tick,
            deaths = report.total_deaths(),
            aged_out = report.aged_out,
            population = report.total_population,
            "Demographics advanced"
        );
        world.demographics = report;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        population::{Citizenship, Cohort, Gender},
        sampling::ExpectedValueSampler,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct NoDeaths;

    impl DeathSampler for NoDeaths {
        fn sample(&self, _population: u32, _probability: f64, _rng: &mut dyn RngCore) -> u32 {
            0
        }
    }

    fn id(group: AgeGroup) -> CohortId {
        CohortId::new(group, Gender::Female, Citizenship::Citizen)
    }

    fn store_with_bucket(group: AgeGroup, bucket: usize, population: u32) -> CohortStore {
        let mut store = CohortStore::empty();
        let cohort: &mut Cohort = store.get_mut(&id(group)).unwrap();
        cohort.buckets[bucket].population = population;
        store.recompute_sizes();
        store
    }

    #[test]
    fn aging_moves_whole_individuals_and_keeps_fraction() {
        let mut store = store_with_bucket(AgeGroup::Adults, 10, 730);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        simulate(&mut store, 1.0, &SecurityScores::default(), &NoDeaths, &mut rng).unwrap();
        let cohort = store.get(&id(AgeGroup::Adults)).unwrap();
        assert_eq!(cohort.buckets[10].population, 728);
        assert_eq!(cohort.buckets[11].population, 2);
        assert!(cohort.buckets[10].aging_progress.abs() < 1e-9);
        assert_eq!(cohort.size, 730);
    }

    #[test]
    fn oldest_children_are_promoted_once() {
        let mut store = store_with_bucket(AgeGroup::Children, 15, 365);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report =
            simulate(&mut store, 30.0, &SecurityScores::default(), &NoDeaths, &mut rng).unwrap();
        let adults = store.get(&id(AgeGroup::Adults)).unwrap();
        assert_eq!(adults.buckets[0].population, 30);
        assert_eq!(adults.buckets[1].population, 0);
        assert_eq!(report.promotions.get(&AgeGroup::Children), Some(&30));
        assert_eq!(report.total_population, 365);
    }

    #[test]
    fn elders_age_out_of_the_last_bucket() {
        let mut store = store_with_bucket(AgeGroup::Elders, 35, 365);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report =
            simulate(&mut store, 7.0, &SecurityScores::default(), &NoDeaths, &mut rng).unwrap();
        assert_eq!(report.aged_out, 7);
        assert_eq!(report.total_population, 358);
    }

    #[test]
    fn deaths_use_security_multipliers_and_never_underflow() {
        let mut store = store_with_bucket(AgeGroup::Children, 5, 50);
        let mut security = SecurityScores::default();
        security.starvation_multipliers.insert(AgeGroup::Children, 1.0e6);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = simulate(&mut store, 1.0, &security, &ExpectedValueSampler, &mut rng).unwrap();
        assert_eq!(store.get(&id(AgeGroup::Children)).unwrap().size, 0);
        assert_eq!(report.deaths.get(&AgeGroup::Children), Some(&50));
        assert!(store.is_consistent());
    }

    #[test]
    fn empty_store_is_a_no_op() {
        let mut store = CohortStore::empty();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = simulate(
            &mut store,
            365.0,
            &SecurityScores::default(),
            &ThresholdSampler::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(report.total_population, 0);
        assert_eq!(report.total_deaths(), 0);
    }

    #[test]
    fn death_probability_is_capped() {
        assert_eq!(death_probability(0.5, 3.0, 2.0, 30.0), 1.0);
        assert!((death_probability(0.001, 2.0, 1.5, 7.0) - 0.021).abs() < 1e-12);
    }
}
