//! Cohort store: the settlement's population grouped by age group, gender
//! and citizenship, each cohort holding one bucket per year of age.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Children,
    Adults,
    Elders,
}

impl AgeGroup {
    /// Processing order for the demographic pass.
    pub const ALL: [AgeGroup; 3] = [AgeGroup::Children, AgeGroup::Adults, AgeGroup::Elders];

    pub fn bucket_count(self) -> usize {
        match self {
            AgeGroup::Children => 16,
            AgeGroup::Adults => 48,
            AgeGroup::Elders => 36,
        }
    }

    /// Age in years of the first bucket.
    pub fn first_age(self) -> usize {
        match self {
            AgeGroup::Children => 0,
            AgeGroup::Adults => 16,
            AgeGroup::Elders => 64,
        }
    }

    /// The group that receives individuals aging out of the oldest bucket.
    pub fn next(self) -> Option<AgeGroup> {
        match self {
            AgeGroup::Children => Some(AgeGroup::Adults),
            AgeGroup::Adults => Some(AgeGroup::Elders),
            AgeGroup::Elders => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgeGroup::Children => "children",
            AgeGroup::Adults => "adults",
            AgeGroup::Elders => "elders",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Citizenship {
    Citizen,
    Foreigner,
    Slave,
}

impl Citizenship {
    pub const ALL: [Citizenship; 3] = [
        Citizenship::Citizen,
        Citizenship::Foreigner,
        Citizenship::Slave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Citizenship::Citizen => "citizen",
            Citizenship::Foreigner => "foreigner",
            Citizenship::Slave => "slave",
        }
    }
}

/// Key of a cohort. Ordering follows the age group first, so iterating a
/// map keyed by `CohortId` visits children, then adults, then elders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CohortId {
    pub age_group: AgeGroup,
    pub gender: Gender,
    pub citizenship: Citizenship,
}

impl CohortId {
    pub const fn new(age_group: AgeGroup, gender: Gender, citizenship: Citizenship) -> Self {
        Self {
            age_group,
            gender,
            citizenship,
        }
    }

    pub fn with_age_group(self, age_group: AgeGroup) -> Self {
        Self { age_group, ..self }
    }

    pub fn all() -> impl Iterator<Item = CohortId> {
        AgeGroup::ALL.into_iter().flat_map(|age_group| {
            Gender::ALL.into_iter().flat_map(move |gender| {
                Citizenship::ALL
                    .into_iter()
                    .map(move |citizenship| CohortId::new(age_group, gender, citizenship))
            })
        })
    }
}

impl fmt::Display for CohortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.age_group.as_str(),
            self.gender.as_str(),
            self.citizenship.as_str()
        )
    }
}

impl FromStr for CohortId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || SimError::UnknownCohort { id: s.to_string() };
        let mut parts = s.split('-');
        let age_group = match parts.next() {
            Some("children") => AgeGroup::Children,
            Some("adults") => AgeGroup::Adults,
            Some("elders") => AgeGroup::Elders,
            _ => return Err(unknown()),
        };
        let gender = match parts.next() {
            Some("male") => Gender::Male,
            Some("female") => Gender::Female,
            _ => return Err(unknown()),
        };
        let citizenship = match parts.next() {
            Some("citizen") => Citizenship::Citizen,
            Some("foreigner") => Citizenship::Foreigner,
            Some("slave") => Citizenship::Slave,
            _ => return Err(unknown()),
        };
        if parts.next().is_some() {
            return Err(unknown());
        }
        Ok(CohortId::new(age_group, gender, citizenship))
    }
}

impl From<CohortId> for String {
    fn from(value: CohortId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for CohortId {
    type Error = SimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One year-of-age slot inside a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub population: u32,
    pub daily_death_chance: f64,
    pub daily_birth_chance: f64,
    /// Fractional individuals aged so far; whole units move up a bucket.
    pub aging_progress: f64,
}

impl AgeBucket {
    pub fn new(population: u32, daily_death_chance: f64) -> Self {
        Self {
            population,
            daily_death_chance,
            daily_birth_chance: 0.0,
            aging_progress: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub id: CohortId,
    pub size: u32,
    pub buckets: Vec<AgeBucket>,
}

impl Cohort {
    /// An empty cohort whose buckets carry the pre-industrial death table.
    pub fn empty(id: CohortId) -> Self {
        let first_age = id.age_group.first_age();
        let buckets = (0..id.age_group.bucket_count())
            .map(|offset| AgeBucket::new(0, pre_industrial_daily_death_chance(first_age + offset)))
            .collect();
        Self {
            id,
            size: 0,
            buckets,
        }
    }

    /// A cohort of `size` individuals spread over a pre-industrial age pyramid.
    pub fn with_pyramid(id: CohortId, size: u32) -> Self {
        let mut cohort = Self::empty(id);
        for (bucket, population) in cohort
            .buckets
            .iter_mut()
            .zip(pyramid_distribution(id.age_group, size))
        {
            bucket.population = population;
        }
        cohort.recompute_size();
        cohort
    }

    pub fn bucket_sum(&self) -> u32 {
        self.buckets.iter().map(|b| b.population).sum()
    }

    /// Restores `size` from the buckets. Call after any bucket mutation.
    pub fn recompute_size(&mut self) {
        self.size = self.bucket_sum();
    }

    /// Sum of the buckets whose age in years falls in `[min_age, max_age]`.
    pub fn population_between_ages(&self, min_age: usize, max_age: usize) -> u32 {
        let first = self.id.age_group.first_age();
        self.buckets
            .iter()
            .enumerate()
            .filter(|(offset, _)| (min_age..=max_age).contains(&(first + offset)))
            .map(|(_, bucket)| bucket.population)
            .sum()
    }

    pub fn add_newborns(&mut self, count: u32) {
        if let Some(first) = self.buckets.first_mut() {
            first.population += count;
        }
        self.recompute_size();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortFilter {
    pub age_group: Option<AgeGroup>,
    pub gender: Option<Gender>,
    pub citizenship: Option<Citizenship>,
}

impl CohortFilter {
    pub fn age_group(age_group: AgeGroup) -> Self {
        Self {
            age_group: Some(age_group),
            ..Self::default()
        }
    }

    pub fn matches(&self, id: &CohortId) -> bool {
        self.age_group.map_or(true, |g| g == id.age_group)
            && self.gender.map_or(true, |g| g == id.gender)
            && self.citizenship.map_or(true, |c| c == id.citizenship)
    }
}

/// All cohorts of the settlement. Every (age group, gender, citizenship)
/// combination exists for the lifetime of the world; cohorts are zeroed,
/// never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStore {
    cohorts: BTreeMap<CohortId, Cohort>,
}

impl Default for CohortStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl CohortStore {
    pub fn empty() -> Self {
        Self {
            cohorts: CohortId::all().map(|id| (id, Cohort::empty(id))).collect(),
        }
    }

    /// Builds a store where the listed cohorts start with a pyramid of the
    /// given size and all others are empty.
    pub fn with_sizes(sizes: impl IntoIterator<Item = (CohortId, u32)>) -> Self {
        let mut store = Self::empty();
        for (id, size) in sizes {
            store.cohorts.insert(id, Cohort::with_pyramid(id, size));
        }
        store
    }

    pub fn get(&self, id: &CohortId) -> Option<&Cohort> {
        self.cohorts.get(id)
    }

    pub fn get_mut(&mut self, id: &CohortId) -> Option<&mut Cohort> {
        self.cohorts.get_mut(id)
    }

    pub fn cohort(&self, id: &CohortId) -> Result<&Cohort, SimError> {
        self.cohorts.get(id).ok_or_else(|| SimError::UnknownCohort {
            id: id.to_string(),
        })
    }

    pub fn cohort_mut(&mut self, id: &CohortId) -> Result<&mut Cohort, SimError> {
        self.cohorts.get_mut(id).ok_or_else(|| SimError::UnknownCohort {
            id: id.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cohort> {
        self.cohorts.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cohort> {
        self.cohorts.values_mut()
    }

    pub fn ids(&self) -> Vec<CohortId> {
        self.cohorts.keys().copied().collect()
    }

    pub fn total(&self) -> u64 {
        self.cohorts.values().map(|c| u64::from(c.size)).sum()
    }

    pub fn population(&self, filter: &CohortFilter) -> u64 {
        self.cohorts
            .values()
            .filter(|c| filter.matches(&c.id))
            .map(|c| u64::from(c.size))
            .sum()
    }

    /// Adults of every gender and citizenship.
    pub fn working_age_population(&self) -> u64 {
        self.population(&CohortFilter::age_group(AgeGroup::Adults))
    }

    pub fn recompute_sizes(&mut self) {
        for cohort in self.cohorts.values_mut() {
            cohort.recompute_size();
        }
    }

    /// True when every cohort's `size` equals the sum of its buckets.
    pub fn is_consistent(&self) -> bool {
        self.cohorts.values().all(|c| c.size == c.bucket_sum())
    }
}

fn pre_industrial_annual_death_rate(age: usize) -> f64 {
    match age {
        0 => 0.4,
        1..=4 => 0.175,
        5..=17 => 0.03,
        18..=39 => 0.01,
        40..=63 => 0.01 + (age - 40) as f64 * (0.03 / 23.0),
        64..=79 => 0.04 + (age - 64) as f64 * (0.07 / 15.0),
        80..=99 => 0.15 + (age - 80) as f64 * (0.13 / 19.0),
        _ => 0.0,
    }
}

pub fn pre_industrial_daily_death_chance(age: usize) -> f64 {
    pre_industrial_annual_death_rate(age) / 365.0
}

/// Splits `size` individuals over the buckets of an age group.
///
/// Children fill the infant years thinly and spread the rest evenly, adults
/// decay geometrically from the youngest bucket, elders spread evenly. The
/// returned populations always sum to `size`.
pub fn pyramid_distribution(age_group: AgeGroup, size: u32) -> Vec<u32> {
    let count = age_group.bucket_count();
    let mut distribution = vec![0u32; count];
    let mut remaining = size;
    match age_group {
        AgeGroup::Children => {
            for slot in distribution.iter_mut().take(4) {
                *slot = size / 16;
                remaining -= *slot;
            }
            for (i, slot) in distribution.iter_mut().enumerate().skip(4) {
                let allocated = (remaining / (count - i) as u32).min(remaining);
                *slot = allocated;
                remaining -= allocated;
            }
        }
        AgeGroup::Adults => {
            for slot in distribution.iter_mut() {
                if remaining == 0 {
                    break;
                }
                let allocated = (remaining / 10).max(5).min(remaining);
                *slot = allocated;
                remaining -= allocated;
            }
        }
        AgeGroup::Elders => {
            for (i, slot) in distribution.iter_mut().enumerate() {
                if remaining == 0 {
                    break;
                }
                let allocated = (remaining / (count - i) as u32).min(remaining);
                *slot = allocated;
                remaining -= allocated;
            }
        }
    }
    if let Some(last) = distribution.last_mut() {
        *last += remaining;
    }
    distribution
}
