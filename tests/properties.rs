use proptest::prelude::*;

use factory_planner::models::{
    Building, Item, PlanRequest, ProductionGoal, Recipe, RecipeSelection, ResourceInput,
};
use factory_planner::{Catalog, PlannerConfig, Solver};

/// Two independent chains (OreA -> PartB, OreD -> PartE) plus an ore nothing uses.
fn catalog() -> Catalog {
    let mut c = Catalog::new();
    c.insert_raw(Item::new("OreA", "ore", 1.0));
    c.insert_raw(Item::new("OreC", "ore", 1.0));
    c.insert_raw(Item::new("OreD", "ore", 1.0));
    c.insert_item(Item::new("PartB", "part", 4.0));
    c.insert_item(Item::new("PartE", "part", 4.0));
    c.insert_building(Building::new("M1", 4.0));
    c.insert_recipe(
        Recipe::new("r1", "R1", "M1")
            .ingredient("OreA", 30.0)
            .product("PartB", 30.0),
    )
    .unwrap();
    c.insert_recipe(
        Recipe::new("r2", "R2", "M1")
            .ingredient("OreD", 15.0)
            .product("PartE", 15.0),
    )
    .unwrap();
    c
}

fn solve(c: &Catalog, inputs: &[(&str, u32)], goals: &[&str]) -> Vec<f64> {
    let request = PlanRequest {
        inputs: inputs
            .iter()
            .map(|(name, rate)| ResourceInput::fixed(*name, *rate as f64))
            .collect(),
        goals: goals.iter().map(|g| ProductionGoal::new(*g, 1000.0)).collect(),
        recipes: RecipeSelection::new(),
        belt_limit: None,
    };
    let plan = Solver::new(c, PlannerConfig::default()).solve(&request).unwrap();
    goals.iter().map(|g| plan.achieved(g)).collect()
}

fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a <= b { (a, b) } else { (b, a) }
}

proptest! {
    #[test]
    fn more_ore_never_means_less_output(
        a in 1u32..=480,
        b in 1u32..=480,
        unused in 1u32..=480,
    ) {
        let c = catalog();
        let (low, high) = ordered(a, b);
        let low = solve(&c, &[("OreA", low), ("OreC", unused)], &["PartB"]);
        let high = solve(&c, &[("OreA", high), ("OreC", unused)], &["PartB"]);
        prop_assert!(low[0] <= high[0]);
    }

    #[test]
    fn unused_ore_never_lowers_output(
        ore in 1u32..=480,
        a in 1u32..=480,
        b in 1u32..=480,
    ) {
        let c = catalog();
        let (low, high) = ordered(a, b);
        let low = solve(&c, &[("OreA", ore), ("OreC", low)], &["PartB"]);
        let high = solve(&c, &[("OreA", ore), ("OreC", high)], &["PartB"]);
        prop_assert!(low[0] <= high[0]);
        prop_assert_eq!(high[0], ore as f64);
    }

    #[test]
    fn raising_one_input_keeps_every_goal(
        ore_a in 1u32..=480,
        ore_d in 1u32..=480,
        extra in 1u32..=240,
        raise_d in any::<bool>(),
    ) {
        let c = catalog();
        let goals = ["PartB", "PartE"];
        let base = solve(&c, &[("OreA", ore_a), ("OreD", ore_d)], &goals);
        let raised = if raise_d {
            solve(&c, &[("OreA", ore_a), ("OreD", (ore_d + extra).min(480))], &goals)
        } else {
            solve(&c, &[("OreA", (ore_a + extra).min(480)), ("OreD", ore_d)], &goals)
        };
        for (before, after) in base.iter().zip(&raised) {
            prop_assert!(before <= after);
        }
    }

    #[test]
    fn output_never_exceeds_input(ore in 1u32..=480) {
        let c = catalog();
        prop_assert!(solve(&c, &[("OreA", ore)], &["PartB"])[0] <= ore as f64);
    }
}
