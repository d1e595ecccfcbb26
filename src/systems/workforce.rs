use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    occupations::{Occupation, OccupationState},
    rng::SystemRng,
    world::World,
};

/// Turns allocation fractions into whole worker counts.
///
/// Locked occupations keep their current size, which comes out of the
/// assignable pool first. When locked sizes outgrow the pool they are
/// filled in declaration order until it runs out. Unlocked, available occupations get
/// `floor(fraction * pool)`, with fractions normalised when they sum above
/// one. Whatever flooring leaves over goes to the first occupation that can
/// accept workers.
pub fn allocate(occupations: &OccupationState, working: u64, capacity: u64) -> BTreeMap<Occupation, u32> {
    let mut sizes: BTreeMap<Occupation, u32> = Occupation::ALL.into_iter().map(|o| (o, 0)).collect();
    let assignable = working.min(capacity);
    if assignable == 0 {
        return sizes;
    }

    let mut locked_total = 0u64;
    for occupation in Occupation::ALL.into_iter().filter(|o| occupations.is_locked(*o)) {
        let kept = u64::from(occupations.size(occupation)).min(assignable - locked_total);
        sizes.insert(occupation, u32::try_from(kept).unwrap_or(u32::MAX));
        locked_total += kept;
    }
    let pool = assignable - locked_total;

    let eligible: Vec<Occupation> = Occupation::ALL
        .into_iter()
        .filter(|o| occupations.can_accept_workers(*o))
        .collect();
    let fraction_total: f64 = eligible.iter().map(|o| occupations.allocation(*o)).sum();
    let scale = if fraction_total > 1.0 {
        1.0 / fraction_total
    } else {
        1.0
    };

    let mut assigned = 0u64;
    for occupation in &eligible {
        let share = (occupations.allocation(*occupation) * scale).clamp(0.0, 1.0);
        let count = ((share * pool as f64).floor() as u64).min(pool - assigned);
        sizes.insert(*occupation, u32::try_from(count).unwrap_or(u32::MAX));
        assigned += count;
    }

    let remainder = pool - assigned;
    if remainder > 0 {
        if let Some(first) = eligible.first() {
            if let Some(size) = sizes.get_mut(first) {
                *size = size.saturating_add(u32::try_from(remainder).unwrap_or(u32::MAX));
            }
        }
    }
    sizes
}

/// Recomputes occupation sizes from the world's current population.
pub fn reallocate(world: &mut World) {
    let sizes = allocate(
        &world.occupations,
        world.working_age_population(),
        world.worksite_capacity(),
    );
    world.occupations.sizes = sizes;
}

pub struct WorkforceSystem;

impl WorkforceSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WorkforceSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for WorkforceSystem {
    fn name(&self) -> &str {
        "workforce"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        reallocate(world);
        debug!(
            tick = ctx.tick,
            working = world.working_age_population(),
            capacity = world.worksite_capacity(),
            assigned = world.occupations.total_assigned(),
            "Workforce reallocated"
        );
        Ok(())
    }
}
