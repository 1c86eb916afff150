//! Allocation solver
//!
//! Works in two phases. A discretized loop hands out raw stock to goals one
//! step at a time until nothing more can be afforded; then the floored goal
//! totals are walked down the recipe graph to get exact machine counts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::RecipeCatalog;
use crate::config::PlannerConfig;
use crate::cost::{CostPropagator, CostVector, checked_product_quantity};
use crate::error::{PlannerError, Result};
use crate::models::{
    ConsolidatedStep, GoalOutcome, PlanRequest, PlanResult, ProductionGoal, Recipe, RecipeSelection,
    ResourceInput, SinkResult,
};
use crate::validate;

const EPSILON: f64 = 1e-9;
/// Absorbs summation error before goal totals are floored.
const FLOOR_SLACK: f64 = 1e-6;

/// Milestones reported while a solve runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolveProgress {
    ValidationStarted,
    SolvingStarted,
    /// Share of the combined goal rate reached so far, 0-100.
    Percent(u8),
    Done,
}

/// Shared flag checked between solver iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Item -> quantity currently available to the solver.
pub type Inventory = BTreeMap<String, f64>;

/// Sum capped input rates by resource name.
pub fn build_inventory(inputs: &[ResourceInput], belt_limit: f64) -> Inventory {
    let mut inventory = Inventory::new();
    for input in inputs {
        *inventory.entry(input.resource.clone()).or_default() += input.capped_rate(belt_limit);
    }
    inventory
}

/// Coarse unit of progress per iteration.
pub fn step_size(inventory: &Inventory, divisor: f64) -> f64 {
    (magnitude(inventory) / divisor).max(1.0)
}

fn magnitude(inventory: &Inventory) -> f64 {
    inventory.values().sum()
}

fn debit(inventory: &mut Inventory, item: &str, amount: f64) {
    let entry = inventory.entry(item.to_string()).or_default();
    *entry = (*entry - amount).max(0.0);
}

fn has(inventory: &Inventory, item: &str, amount: f64) -> bool {
    inventory.get(item).copied().unwrap_or(0.0) + EPSILON >= amount
}

/// What one allocation attempt for a goal achieved
enum Attempt<'a> {
    Made(&'a Recipe, f64),
    Consumed(f64),
    Unaffordable,
}

pub struct Solver<'a, C: RecipeCatalog + ?Sized> {
    catalog: &'a C,
    config: PlannerConfig,
}

impl<'a, C: RecipeCatalog + ?Sized> Solver<'a, C> {
    pub fn new(catalog: &'a C, config: PlannerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn solve(&self, request: &PlanRequest) -> Result<PlanResult> {
        self.solve_with(request, &CancelToken::new(), &mut |_| {})
    }

    /// Validate and solve, reporting milestones and honouring `cancel`
    /// between iterations.
    pub fn solve_with(
        &self,
        request: &PlanRequest,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(SolveProgress),
    ) -> Result<PlanResult> {
        progress(SolveProgress::ValidationStarted);
        validate::validate(self.catalog, request, &self.config).into_result()?;

        progress(SolveProgress::SolvingStarted);
        let belt_limit = request.belt_limit.unwrap_or(self.config.belt_limit);
        let mut costs = CostPropagator::new(
            self.catalog,
            request.recipes.clone(),
            self.config.cache_ttl(),
        );
        self.preflight(&request.goals, &request.recipes, &mut costs)?;

        let mut inventory = build_inventory(&request.inputs, belt_limit);
        let step = step_size(&inventory, self.config.step_divisor);
        tracing::info!(
            goals = request.goals.len(),
            stock = magnitude(&inventory),
            step,
            "starting allocation"
        );

        let goals = &request.goals;
        let mut produced = vec![0.0; goals.len()];
        let mut usage: Vec<BTreeMap<&'a str, f64>> = vec![BTreeMap::new(); goals.len()];
        let mut last_raw = self.raw_stock(&inventory);
        let mut stagnant = 0;
        let mut last_percent = None;
        let mut iterations = 0;
        let mut settled = false;

        while iterations < self.config.max_iterations {
            if cancel.is_cancelled() {
                tracing::info!(iterations, "solve cancelled");
                return Err(PlannerError::Cancelled);
            }
            iterations += 1;

            let mut output = 0.0;
            for (idx, goal) in goals.iter().enumerate() {
                let remaining = goal.rate - produced[idx];
                if remaining <= EPSILON {
                    continue;
                }
                let amount = step.min(remaining);
                let made = match self.attempt(
                    &goal.item,
                    amount,
                    &request.recipes,
                    &mut inventory,
                    &mut costs,
                )? {
                    Attempt::Made(recipe, made) => {
                        *usage[idx].entry(recipe.id.as_str()).or_default() += made;
                        made
                    }
                    Attempt::Consumed(made) => made,
                    Attempt::Unaffordable => continue,
                };
                produced[idx] += made;
                output += made;
            }

            let percent = completion(goals, &produced);
            if last_percent != Some(percent) {
                progress(SolveProgress::Percent(percent));
                last_percent = Some(percent);
            }

            if output <= EPSILON {
                settled = true;
                break;
            }

            // Byproduct credit can keep total stock flat while goals still
            // advance, so only raw stock and goal output count here.
            let raw = self.raw_stock(&inventory);
            let tolerance = self.config.stagnation_tolerance;
            if (raw - last_raw).abs() <= tolerance && output <= tolerance {
                stagnant += 1;
                if stagnant >= self.config.stagnation_threshold {
                    tracing::debug!(iterations, "inventory stagnated");
                    settled = true;
                    break;
                }
            } else {
                stagnant = 0;
            }
            last_raw = raw;
            tracing::trace!(iterations, raw, output, "iteration done");
        }

        if !settled {
            tracing::warn!(iterations, "allocation did not settle");
            return Err(PlannerError::CalculationTimeout { iterations });
        }

        let achieved: Vec<f64> = produced.iter().map(|p| (p + FLOOR_SLACK).floor()).collect();
        let chosen: Vec<Option<&Recipe>> = usage
            .iter()
            .map(|used| dominant_recipe(used).and_then(|id| self.catalog.recipe(id)))
            .collect();
        let steps = self.demand_steps(goals, &achieved, &chosen, &request.recipes)?;
        let sink = self.best_sink(&inventory);

        let outcomes = goals
            .iter()
            .zip(&achieved)
            .map(|(goal, &achieved)| GoalOutcome {
                item: goal.item.clone(),
                target: goal.rate,
                achieved,
            })
            .collect();
        inventory.retain(|_, amount| *amount > EPSILON);

        tracing::info!(iterations, steps = steps.len(), "allocation finished");
        progress(SolveProgress::Done);
        Ok(PlanResult {
            steps,
            sink,
            goals: outcomes,
            leftover: inventory,
            iterations,
        })
    }

    /// Expand every candidate recipe once so cycles and broken recipes fail
    /// before any stock is allocated.
    fn preflight(
        &self,
        goals: &[ProductionGoal],
        selection: &RecipeSelection,
        costs: &mut CostPropagator<'a, C>,
    ) -> Result<()> {
        for goal in goals {
            for recipe in self.catalog.candidate_recipes(&goal.item, selection) {
                costs.recipe_cost(recipe, &goal.item, 1.0)?;
            }
        }
        Ok(())
    }

    fn attempt(
        &self,
        item: &str,
        amount: f64,
        selection: &RecipeSelection,
        inventory: &mut Inventory,
        costs: &mut CostPropagator<'a, C>,
    ) -> Result<Attempt<'a>> {
        let candidates = self.catalog.candidate_recipes(item, selection);
        if candidates.is_empty() {
            // Nothing makes it, so it can only come straight out of stock.
            let take = amount.min(inventory.get(item).copied().unwrap_or(0.0));
            if take > EPSILON {
                debit(inventory, item, take);
                return Ok(Attempt::Consumed(take));
            }
            return Ok(Attempt::Unaffordable);
        }

        for &recipe in &candidates {
            if let Some(bill) = self.bill(recipe, item, amount, inventory, costs)? {
                settle(recipe, item, amount, &bill, inventory)?;
                return Ok(Attempt::Made(recipe, amount));
            }
        }

        // No candidate covers a whole step: make what the scarcest raw
        // resource still allows.
        for &recipe in &candidates {
            let partial = self.affordable(recipe, item, inventory, costs)?.min(amount);
            if partial <= EPSILON {
                continue;
            }
            if let Some(bill) = self.bill(recipe, item, partial, inventory, costs)? {
                settle(recipe, item, partial, &bill, inventory)?;
                return Ok(Attempt::Made(recipe, partial));
            }
        }
        Ok(Attempt::Unaffordable)
    }

    /// Largest amount of `item` the raw stock can pay for with `recipe`.
    fn affordable(
        &self,
        recipe: &Recipe,
        item: &str,
        inventory: &Inventory,
        costs: &mut CostPropagator<'a, C>,
    ) -> Result<f64> {
        let unit = costs.recipe_cost(recipe, item, 1.0)?;
        let most = unit
            .iter()
            .filter(|(_, per_unit)| **per_unit > EPSILON)
            .map(|(raw, per_unit)| inventory.get(raw).copied().unwrap_or(0.0) / per_unit)
            .fold(f64::INFINITY, f64::min);
        Ok(if most.is_finite() { most } else { 0.0 })
    }

    fn raw_stock(&self, inventory: &Inventory) -> f64 {
        inventory
            .iter()
            .filter(|(item, _)| self.catalog.is_raw(item))
            .map(|(_, amount)| amount)
            .sum()
    }

    /// Everything that must leave inventory to make `amount` of `item` with
    /// `recipe`, or `None` when stock does not cover it.
    fn bill(
        &self,
        recipe: &Recipe,
        item: &str,
        amount: f64,
        inventory: &Inventory,
        costs: &mut CostPropagator<'a, C>,
    ) -> Result<Option<CostVector>> {
        let ratio = amount / checked_product_quantity(recipe, item)?;
        let mut bill = CostVector::new();

        for (ingredient, quantity) in &recipe.ingredients {
            let needed = quantity * ratio;
            let on_hand = inventory.get(ingredient).copied().unwrap_or(0.0)
                - bill.get(ingredient).copied().unwrap_or(0.0);
            if on_hand + EPSILON >= needed {
                *bill.entry(ingredient.clone()).or_default() += needed;
                continue;
            }
            if self.catalog.is_raw(ingredient) {
                return Ok(None);
            }
            for (raw, raw_amount) in costs.raw_cost(ingredient, needed)? {
                *bill.entry(raw).or_default() += raw_amount;
            }
        }

        let covered = bill.iter().all(|(paid, quantity)| has(inventory, paid, *quantity));
        Ok(covered.then_some(bill))
    }

    /// Walk realized goal rates down the recipe graph into one step per item.
    fn demand_steps(
        &self,
        goals: &[ProductionGoal],
        achieved: &[f64],
        chosen: &[Option<&'a Recipe>],
        selection: &RecipeSelection,
    ) -> Result<Vec<ConsolidatedStep>> {
        let mut demand: BTreeMap<String, (f64, &'a Recipe)> = BTreeMap::new();
        for ((goal, &rate), recipe) in goals.iter().zip(achieved).zip(chosen) {
            let Some(recipe) = *recipe else { continue };
            if rate <= 0.0 {
                continue;
            }
            let mut path = Vec::new();
            self.accumulate(&goal.item, rate, recipe, selection, &mut demand, &mut path)?;
        }

        let mut steps: Vec<ConsolidatedStep> = demand
            .into_iter()
            .filter(|(item, (rate, _))| *rate > EPSILON && !self.catalog.is_raw(item))
            .map(|(item, (rate, recipe))| self.step_for(item, rate, recipe))
            .collect();
        steps.sort_by(|a, b| a.building.cmp(&b.building).then_with(|| a.item.cmp(&b.item)));
        Ok(steps)
    }

    fn accumulate(
        &self,
        item: &str,
        rate: f64,
        recipe: &'a Recipe,
        selection: &RecipeSelection,
        demand: &mut BTreeMap<String, (f64, &'a Recipe)>,
        path: &mut Vec<String>,
    ) -> Result<()> {
        if path.iter().any(|p| p == item) {
            let mut cycle = path.clone();
            cycle.push(item.to_string());
            return Err(PlannerError::CircularDependency(cycle));
        }
        demand.entry(item.to_string()).or_insert((0.0, recipe)).0 += rate;

        let ratio = rate / checked_product_quantity(recipe, item)?;
        path.push(item.to_string());
        for (ingredient, quantity) in &recipe.ingredients {
            if self.catalog.is_raw(ingredient) {
                continue;
            }
            let Some(sub) = self.catalog.active_recipe(ingredient, selection) else {
                continue;
            };
            self.accumulate(ingredient, quantity * ratio, sub, selection, demand, path)?;
        }
        path.pop();
        Ok(())
    }

    fn step_for(&self, item: String, rate: f64, recipe: &Recipe) -> ConsolidatedStep {
        let per_machine = recipe.output_per_minute(&item);
        let machine_count = if per_machine > 0.0 { rate / per_machine } else { 0.0 };
        let power = match self.catalog.building(&recipe.building) {
            Some(building) => building.power_mw,
            None => {
                tracing::warn!(building = %recipe.building, "unknown building, assuming no power draw");
                0.0
            }
        };
        ConsolidatedStep {
            item,
            rate,
            machine_count,
            recipe_id: recipe.id.clone(),
            recipe_name: recipe.name.clone(),
            building: recipe.building.clone(),
            power_mw: machine_count * power,
        }
    }

    /// Most valuable leftover to send to the sink. Ties go to the
    /// lexicographically smallest item name.
    fn best_sink(&self, inventory: &Inventory) -> Option<SinkResult> {
        let mut best: Option<SinkResult> = None;
        for (name, amount) in inventory {
            if self.catalog.is_raw(name) {
                continue;
            }
            let Some(item) = self.catalog.item(name) else { continue };
            if item.sink_value <= 0.0 {
                continue;
            }
            let amount = amount.floor();
            let points = amount * item.sink_value;
            if points <= 0.0 {
                continue;
            }
            if best.as_ref().is_none_or(|b| points > b.points) {
                best = Some(SinkResult {
                    item: name.clone(),
                    amount,
                    points,
                });
            }
        }
        best
    }
}

/// Pay `bill` out of inventory and credit the recipe's other products.
fn settle(
    recipe: &Recipe,
    item: &str,
    amount: f64,
    bill: &CostVector,
    inventory: &mut Inventory,
) -> Result<()> {
    for (paid, quantity) in bill {
        debit(inventory, paid, *quantity);
    }
    let ratio = amount / checked_product_quantity(recipe, item)?;
    for (product, quantity) in &recipe.products {
        if product != item {
            *inventory.entry(product.clone()).or_default() += quantity * ratio;
        }
    }
    Ok(())
}

/// The recipe that carried most of a goal's production.
fn dominant_recipe<'r>(usage: &BTreeMap<&'r str, f64>) -> Option<&'r str> {
    let mut best: Option<(&'r str, f64)> = None;
    for (&id, &amount) in usage {
        if best.is_none_or(|(_, b)| amount > b) {
            best = Some((id, amount));
        }
    }
    best.map(|(id, _)| id)
}

fn completion(goals: &[ProductionGoal], produced: &[f64]) -> u8 {
    let target: f64 = goals.iter().map(|g| g.rate.max(0.0)).sum();
    if target <= 0.0 {
        return 100;
    }
    let reached: f64 = goals
        .iter()
        .zip(produced)
        .map(|(g, p)| p.min(g.rate))
        .sum();
    ((reached / target) * 100.0).clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::models::{Building, Item};

    fn scenario_catalog() -> Catalog {
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

    fn request(ore: f64, goal: f64) -> PlanRequest {
        PlanRequest {
            inputs: vec![ResourceInput::fixed("OreA", ore)],
            goals: vec![ProductionGoal::new("PartB", goal)],
            recipes: RecipeSelection::new(),
            belt_limit: Some(270.0),
        }
    }

    #[test]
    fn inventory_caps_each_input_at_belt_limit() {
        let inputs = vec![
            ResourceInput::fixed("OreA", 400.0),
            ResourceInput::fixed("OreA", 100.0),
        ];
        let inv = build_inventory(&inputs, 270.0);
        assert_eq!(inv["OreA"], 370.0);
        assert_eq!(step_size(&inv, 200.0), 1.85);
        assert_eq!(step_size(&Inventory::new(), 200.0), 1.0);
    }

    #[test]
    fn affordable_goal_is_met_in_full() {
        let c = scenario_catalog();
        let plan = Solver::new(&c, PlannerConfig::default()).solve(&request(60.0, 20.0)).unwrap();

        assert_eq!(plan.achieved("PartB"), 20.0);
        assert_eq!(plan.steps.len(), 1);
        let step = &plan.steps[0];
        assert_eq!(step.item, "PartB");
        assert!((step.machine_count - 20.0 / 30.0).abs() < 1e-9);
        assert!((step.power_mw - 8.0 / 3.0).abs() < 1e-9);
        assert!((plan.leftover["OreA"] - 40.0).abs() < 1e-9);
        // Raw leftovers are never suggested for the sink.
        assert!(plan.sink.is_none());
    }

    #[test]
    fn resource_bound_goal_stops_at_stock() {
        let c = scenario_catalog();
        let plan = Solver::new(&c, PlannerConfig::default()).solve(&request(60.0, 100.0)).unwrap();
        assert_eq!(plan.achieved("PartB"), 60.0);
        assert!(!plan.leftover.contains_key("OreA"));
    }

    #[test]
    fn iteration_cap_is_a_timeout() {
        let c = scenario_catalog();
        let config = PlannerConfig {
            max_iterations: 5,
            ..PlannerConfig::default()
        };
        let err = Solver::new(&c, config).solve(&request(60.0, 20.0)).unwrap_err();
        assert_eq!(err, PlannerError::CalculationTimeout { iterations: 5 });
    }

    #[test]
    fn cancelled_solve_yields_no_plan() {
        let c = scenario_catalog();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut seen = Vec::new();
        let err = Solver::new(&c, PlannerConfig::default())
            .solve_with(&request(60.0, 20.0), &cancel, &mut |p| seen.push(p))
            .unwrap_err();
        assert_eq!(err, PlannerError::Cancelled);
        assert_eq!(
            seen,
            vec![SolveProgress::ValidationStarted, SolveProgress::SolvingStarted]
        );
    }

    #[test]
    fn progress_ends_with_done() {
        let c = scenario_catalog();
        let mut seen = Vec::new();
        Solver::new(&c, PlannerConfig::default())
            .solve_with(&request(60.0, 20.0), &CancelToken::new(), &mut |p| seen.push(p))
            .unwrap();
        assert_eq!(seen.last(), Some(&SolveProgress::Done));
        assert!(seen.contains(&SolveProgress::Percent(100)));
    }

    #[test]
    fn byproducts_feed_the_sink() {
        let mut c = scenario_catalog();
        c.insert_item(Item::new("Slag", "waste", 3.0));
        c.insert_item(Item::new("Dust", "waste", 1.0));
        c.insert_item(Item::new("Gear", "part", 10.0));
        c.insert_recipe(
            Recipe::new("gear", "Gear", "M1")
                .ingredient("OreA", 10.0)
                .product("Gear", 10.0)
                .product("Slag", 5.0)
                .product("Dust", 10.0),
        )
        .unwrap();
        let req = PlanRequest {
            inputs: vec![ResourceInput::fixed("OreA", 60.0)],
            goals: vec![ProductionGoal::new("Gear", 20.0)],
            recipes: RecipeSelection::new(),
            belt_limit: None,
        };
        let plan = Solver::new(&c, PlannerConfig::default()).solve(&req).unwrap();
        assert_eq!(plan.achieved("Gear"), 20.0);
        // 10 Slag * 3 beats 20 Dust * 1.
        let sink = plan.sink.unwrap();
        assert_eq!(sink.item, "Slag");
        assert_eq!(sink.amount, 10.0);
        assert_eq!(sink.points, 30.0);
    }

    #[test]
    fn unrelated_input_does_not_coarsen_the_last_step() {
        let mut c = scenario_catalog();
        c.insert_raw(Item::new("OreC", "ore", 1.0));
        let achieved = |ore_c: f64| {
            let req = PlanRequest {
                inputs: vec![
                    ResourceInput::fixed("OreA", 100.0),
                    ResourceInput::fixed("OreC", ore_c),
                ],
                goals: vec![ProductionGoal::new("PartB", 1000.0)],
                recipes: RecipeSelection::new(),
                belt_limit: None,
            };
            Solver::new(&c, PlannerConfig::default())
                .solve(&req)
                .unwrap()
                .achieved("PartB")
        };
        assert_eq!(achieved(100.0), 100.0);
        // Step 1.005 no longer fits the last 0.505 OreA; it is still used.
        assert_eq!(achieved(101.0), 100.0);
    }

    #[test]
    fn mass_neutral_byproduct_does_not_stagnate() {
        let mut c = scenario_catalog();
        c.insert_item(Item::new("Gear", "part", 10.0));
        c.insert_item(Item::new("Slag", "waste", 1.0));
        c.insert_recipe(
            Recipe::new("gear", "Gear", "M1")
                .ingredient("OreA", 1.0)
                .product("Gear", 1.0)
                .product("Slag", 1.0),
        )
        .unwrap();
        let req = PlanRequest {
            inputs: vec![ResourceInput::fixed("OreA", 60.0)],
            goals: vec![ProductionGoal::new("Gear", 100.0)],
            recipes: RecipeSelection::new(),
            belt_limit: None,
        };
        let plan = Solver::new(&c, PlannerConfig::default()).solve(&req).unwrap();
        assert_eq!(plan.achieved("Gear"), 60.0);
        assert!(plan.iterations > PlannerConfig::default().stagnation_threshold);
        assert!((plan.leftover["Slag"] - 60.0).abs() < 1e-6);
        assert!(!plan.leftover.contains_key("OreA"));
    }

    #[test]
    fn recipeless_goal_takes_what_stock_has() {
        let c = scenario_catalog();
        let req = PlanRequest {
            inputs: vec![ResourceInput::fixed("OreA", 25.5)],
            goals: vec![ProductionGoal::new("OreA", 40.0)],
            recipes: RecipeSelection::new(),
            belt_limit: None,
        };
        let plan = Solver::new(&c, PlannerConfig::default()).solve(&req).unwrap();
        assert_eq!(plan.achieved("OreA"), 25.0);
        assert!(plan.leftover.is_empty());
    }

    #[test]
    fn sink_ties_go_to_smallest_name() {
        let mut c = Catalog::new();
        c.insert_item(Item::new("Zinc", "part", 2.0));
        c.insert_item(Item::new("Brass", "part", 1.0));
        let solver = Solver::new(&c, PlannerConfig::default());
        let inv = Inventory::from([("Zinc".to_string(), 5.0), ("Brass".to_string(), 10.9)]);
        let sink = solver.best_sink(&inv).unwrap();
        assert_eq!(sink.item, "Brass");
        assert_eq!(sink.points, 10.0);
    }

    #[test]
    fn dominant_recipe_prefers_largest_share() {
        let usage = BTreeMap::from([("a", 2.0), ("b", 5.0), ("c", 5.0)]);
        assert_eq!(dominant_recipe(&usage), Some("b"));
        assert_eq!(dominant_recipe(&BTreeMap::new()), None);
    }
}
