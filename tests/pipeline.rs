use std::collections::BTreeMap;
use std::path::PathBuf;

use settlement_sim::{
    commands::Command,
    config::{Rates, Scenario, ScenarioLoader},
    engine::{EngineBuilder, EngineSettings, TickOutcome},
    land::{Biome, BuildingCatalog, BuildingCategory, BuildingKind, GridPosition, Land},
    occupations::Occupation,
    population::{AgeGroup, Citizenship, CohortId, CohortStore, Gender},
    resources::ResourceStore,
    snapshot::read_snapshot,
    SimError, World,
};
use tempfile::tempdir;

fn scenario() -> Scenario {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/frontier.yaml")
        .expect("scenario should load")
}

fn build_engine(seed: u64) -> EngineBuilder {
    let settings = EngineSettings {
        scenario_name: "frontier".into(),
        seed,
        snapshot_interval_ticks: 0,
        snapshot_dir: PathBuf::from("snapshots_pipeline_tests"),
    };
    EngineBuilder::new(settings).standard_pipeline()
}

fn only(occupation: Occupation) -> Command {
    Command::SetOccupationAllocation {
        allocation: BTreeMap::from([(occupation, 1.0)]),
    }
}

#[test]
fn empty_settlement_ticks_without_demographic_effects() {
    let mut scenario = scenario();
    scenario.population.clear();
    let mut world = scenario.build_world().expect("world builds");
    let mut engine = build_engine(scenario.seed).build();

    let report = engine.tick(&mut world).expect("tick runs");

    assert!(report.is_completed());
    assert_eq!(world.total_population(), 0);
    assert!(world.cohorts().is_consistent());
    assert_eq!(world.occupations().total_assigned(), 0);
    assert_eq!(world.resources().food, 100.0);
    // Makeshift housing upkeep eats 6 hide a month; only 5 were stocked.
    assert_eq!(world.resources().hide, 0.0);
    assert_eq!(world.food_security_score(), 1.0);
    assert_eq!(world.births().born(), 0);
}

#[test]
fn cohort_sizes_match_buckets_after_every_tick() {
    let scenario = scenario();
    let mut world = scenario.build_world().expect("world builds");
    let mut engine = build_engine(scenario.seed).build();

    let mut consistent = Vec::new();
    engine
        .run_with_hook(&mut world, 24, |snapshot| {
            consistent.push(snapshot.world.cohorts().is_consistent())
        })
        .expect("run succeeds");

    assert_eq!(consistent.len(), 24);
    assert!(consistent.into_iter().all(|ok| ok));
    assert!(world.occupations().total_assigned() <= world.working_age_population());
}

#[test]
fn funded_queue_item_drains_then_leaves_the_queue() {
    let land = Land::generate(1, 1, Biome::Grassland, 1000);
    let men = CohortId::new(AgeGroup::Adults, Gender::Male, Citizenship::Citizen);
    let mut world = World::new(Rates::default(), BuildingCatalog::default(), land)
        .with_cohorts(CohortStore::with_sizes([(men, 100)]))
        .with_resources(ResourceStore {
            food: 10_000.0,
            ..ResourceStore::default()
        });
    world.apply_command(only(Occupation::Laborers)).expect("allocation applies");
    world
        .apply_command(Command::EnqueueBuilding {
            name: BuildingKind::LumberCamp,
            category: BuildingCategory::Industry,
            position: GridPosition::new(1, 0),
            quantity: 3,
        })
        .expect("enqueue succeeds");
    let mut engine = build_engine(3).build();

    let mut levels = vec![3];
    for _ in 0..5 {
        engine.tick(&mut world).expect("tick runs");
        match world.land().building_queue.first() {
            Some(item) => levels.push(item.level),
            None => break,
        }
    }

    assert!(world.land().building_queue.is_empty());
    assert!(levels.windows(2).all(|pair| pair[1] < pair[0]), "levels: {levels:?}");
    let tile = world.land().tile(GridPosition::new(1, 0)).expect("tile exists");
    assert_eq!(tile.building_level(BuildingKind::LumberCamp), 3);
}

#[test]
fn empty_food_stock_raises_child_mortality_above_adults() {
    let mut scenario = scenario();
    scenario.resources.food = 0.0;
    let mut world = scenario.build_world().expect("world builds");
    world.apply_command(only(Occupation::Laborers)).expect("allocation applies");
    let mut engine = build_engine(scenario.seed).build();

    for _ in 0..2 {
        assert!(engine.tick(&mut world).expect("tick runs").is_completed());
        assert_eq!(world.resources().food, 0.0);
    }

    assert!(world.food_security_score() <= 0.1);
    let security = world.security();
    assert!(
        security.starvation_multiplier(AgeGroup::Children)
            > security.starvation_multiplier(AgeGroup::Adults)
    );
}

#[test]
fn same_seed_gives_identical_runs() {
    let scenario = scenario();
    let mut first = scenario.build_world().expect("world builds");
    let mut second = scenario.build_world().expect("world builds");

    build_engine(scenario.seed)
        .build()
        .run(&mut first, 36)
        .expect("run succeeds");
    build_engine(scenario.seed)
        .build()
        .run(&mut second, 36)
        .expect("run succeeds");

    assert_eq!(first, second);
}

#[test]
fn snapshots_are_written_on_interval() {
    let scenario = scenario();
    let mut world = scenario.build_world().expect("world builds");
    let temp = tempdir().expect("tempdir");
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: 12,
        snapshot_dir: temp.path().to_path_buf(),
    };
    let mut engine = EngineBuilder::new(settings).standard_pipeline().build();

    let mut written = Vec::new();
    for _ in 0..24 {
        let report = engine.tick(&mut world).expect("tick runs");
        if let Some(path) = report.snapshot_path {
            written.push(path);
        }
    }

    let dir = temp.path().join("frontier");
    assert_eq!(
        written,
        vec![dir.join("tick_000012.json"), dir.join("tick_000024.json")]
    );
    let record = read_snapshot(&written[0]).expect("snapshot reads back");
    assert_eq!(record.snapshot.tick, 12);
    assert_eq!(record.snapshot.scenario, "frontier");
    assert_eq!(record.snapshot.time.year, 1);
}

#[test]
fn configuration_error_fails_the_tick_without_advancing_time() {
    let scenario = scenario();
    let mut world = scenario.build_world().expect("world builds");
    world.apply_command(only(Occupation::Laborers)).expect("allocation applies");
    world
        .apply_command(Command::EnqueueBuilding {
            name: BuildingKind::Hut,
            category: BuildingCategory::Housing,
            position: GridPosition::ORIGIN,
            quantity: 1,
        })
        .expect("enqueue succeeds");
    world.catalog_mut().remove(BuildingKind::Hut);
    let time_before = world.time();
    let mut engine = build_engine(scenario.seed).build();

    let report = engine.tick(&mut world).expect("tick runs");

    match &report.outcome {
        TickOutcome::Failed { stage, error } => {
            assert_eq!(stage, "construction");
            assert!(error.contains("'hut'"), "error was: {error}");
        }
        TickOutcome::Completed => panic!("tick should fail"),
    }
    assert_eq!(
        report.stages_run,
        vec!["ledger", "security", "demographics", "upkeep"]
    );
    assert_eq!(world.tick(), 0);
    assert_eq!(world.time(), time_before);
    assert!(world.ledger().food_consumption > 0.0);
    assert_eq!(world.land().building_queue.len(), 1);
}

#[test]
fn rejected_commands_name_the_offending_key() {
    let mut world = scenario().build_world().expect("world builds");
    let err = world
        .apply_command(Command::EnqueueBuilding {
            name: BuildingKind::Farm,
            category: BuildingCategory::Housing,
            position: GridPosition::ORIGIN,
            quantity: 1,
        })
        .expect_err("category mismatch");
    assert_eq!(
        err,
        SimError::BuildingCategoryMismatch {
            name: BuildingKind::Farm,
            expected: BuildingCategory::Agriculture,
            found: BuildingCategory::Housing,
        }
    );
    assert!(err.to_string().contains("farm"));
}
