use std::sync::Arc;

use factory_planner::cost::CostPropagator;
use factory_planner::models::{
    Building, Item, PlanRequest, ProductionGoal, Recipe, RecipeSelection, ResourceInput, Severity,
};
use factory_planner::{
    CancelToken, Catalog, PlannerConfig, PlannerError, Planner, SolveProgress, Solver, sample,
};

fn ore_to_part() -> Catalog {
    let mut c = Catalog::new();
    c.insert_raw(Item::new("OreA", "ore", 1.0));
    c.insert_item(Item::new("PartB", "part", 4.0));
    c.insert_building(Building::new("M1", 4.0));
    c.insert_recipe(
        Recipe::new("r1", "R1", "M1")
            .ingredient("OreA", 30.0)
            .product("PartB", 30.0),
    )
    .unwrap();
    c
}

fn request(ore: f64, goals: Vec<ProductionGoal>) -> PlanRequest {
    PlanRequest {
        inputs: vec![ResourceInput::fixed("OreA", ore)],
        goals,
        recipes: RecipeSelection::new(),
        belt_limit: None,
    }
}

#[test]
fn covered_goal_yields_fractional_machines() {
    let c = ore_to_part();
    let plan = Solver::new(&c, PlannerConfig::default())
        .solve(&request(60.0, vec![ProductionGoal::new("PartB", 20.0)]))
        .unwrap();

    let step = plan.step("PartB").unwrap();
    assert!((step.machine_count - 0.667).abs() < 1e-3);
    assert!((plan.total_power_mw() - 2.67).abs() < 1e-2);
    assert!((plan.leftover["OreA"] - 40.0).abs() < 1e-9);
}

#[test]
fn short_goal_is_capped_and_reported_as_bottleneck() {
    let catalog = Arc::new(ore_to_part());
    let mut planner = Planner::new(catalog, PlannerConfig::default())
        .with_request(request(60.0, vec![ProductionGoal::new("PartB", 100.0)]));
    let committed = planner.replan().unwrap();

    assert_eq!(committed.plan.achieved("PartB"), 60.0);
    let names: Vec<&str> = committed.bottlenecks.iter().map(|b| b.item.as_str()).collect();
    assert_eq!(names, vec!["OreA", "PartB"]);
    for b in &committed.bottlenecks {
        assert!((b.shortfall - 40.0).abs() < 1e-9);
        assert_eq!(b.severity, Severity::High);
    }
}

#[test]
fn cycle_is_reported_before_any_allocation() {
    let mut c = Catalog::new();
    c.insert_raw(Item::new("OreA", "ore", 1.0));
    c.insert_item(Item::new("A", "part", 0.0));
    c.insert_item(Item::new("B", "part", 0.0));
    c.insert_recipe(Recipe::new("make_a", "A", "M").ingredient("B", 1.0).product("A", 1.0))
        .unwrap();
    c.insert_recipe(Recipe::new("make_b", "B", "M").ingredient("A", 1.0).product("B", 1.0))
        .unwrap();

    let mut seen = Vec::new();
    let err = Solver::new(&c, PlannerConfig::default())
        .solve_with(
            &request(60.0, vec![ProductionGoal::new("A", 10.0)]),
            &CancelToken::new(),
            &mut |p| seen.push(p),
        )
        .unwrap_err();

    assert_eq!(
        err,
        PlannerError::CircularDependency(vec!["A".into(), "B".into(), "A".into()])
    );
    assert_eq!(
        seen,
        vec![SolveProgress::ValidationStarted, SolveProgress::SolvingStarted]
    );
}

#[test]
fn recipeless_goal_is_taken_straight_from_stock() {
    let c = ore_to_part();
    let plan = Solver::new(&c, PlannerConfig::default())
        .solve(&request(60.0, vec![ProductionGoal::new("OreA", 30.0)]))
        .unwrap();

    assert_eq!(plan.achieved("OreA"), 30.0);
    assert!(plan.steps.is_empty());
    assert!((plan.leftover["OreA"] - 30.0).abs() < 1e-9);
}

#[test]
fn zero_goal_rate_never_reaches_the_solver() {
    let c = ore_to_part();
    let mut seen = Vec::new();
    let err = Solver::new(&c, PlannerConfig::default())
        .solve_with(
            &request(60.0, vec![ProductionGoal::new("PartB", 0.0)]),
            &CancelToken::new(),
            &mut |p| seen.push(p),
        )
        .unwrap_err();

    let report = match err {
        PlannerError::Validation(report) => report,
        other => panic!("expected a validation error, got {other:?}"),
    };
    assert_eq!(report.issues, vec![PlannerError::InvalidGoal("PartB".into())]);
    assert_eq!(seen, vec![SolveProgress::ValidationStarted]);
}

#[test]
fn cost_follows_selection_changes() {
    let c = sample::sample_catalog().unwrap();
    let mut costs = CostPropagator::new(&c, RecipeSelection::new(), PlannerConfig::default().cache_ttl());

    let rod = costs.unit_cost("IronRod").unwrap();
    assert_eq!(rod.len(), 1);
    assert!((rod["IronOre"] - 1.0).abs() < 1e-9);

    costs.set_selection(RecipeSelection::new().with("IronRod", &["alt_steel_rod"]));
    let rod = costs.unit_cost("IronRod").unwrap();
    assert!((rod["IronOre"] - 0.25).abs() < 1e-9);
    assert!((rod["Coal"] - 0.25).abs() < 1e-9);

    costs.set_selection(RecipeSelection::new());
    let rod = costs.unit_cost("IronRod").unwrap();
    assert!(!rod.contains_key("Coal"));
}

#[test]
fn sample_request_is_fully_met() {
    let c = sample::sample_catalog().unwrap();
    let plan = Solver::new(&c, PlannerConfig::default())
        .solve(&sample::sample_request())
        .unwrap();

    assert_eq!(plan.achieved("ReinforcedIronPlate"), 5.0);
    assert_eq!(plan.achieved("Rotor"), 4.0);
    assert_eq!(plan.achieved("Cable"), 15.0);

    let screw = plan.step("Screw").unwrap();
    assert_eq!(screw.recipe_id, "alt_cast_screw");
    assert!((screw.rate - 160.0).abs() < 1e-9);
    assert!((screw.machine_count - 3.2).abs() < 1e-9);
    assert!((plan.step("IronIngot").unwrap().rate - 105.0).abs() < 1e-9);

    assert!((plan.leftover["IronOre"] - 135.0).abs() < 1e-6);
    assert!((plan.leftover["CopperOre"] - 45.0).abs() < 1e-6);
    assert!(plan.sink.is_none());

    // Steps are grouped by building.
    let buildings: Vec<&str> = plan.steps.iter().map(|s| s.building.as_str()).collect();
    let mut sorted = buildings.clone();
    sorted.sort();
    assert_eq!(buildings, sorted);
}
