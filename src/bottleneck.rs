//! Bottleneck analysis
//!
//! Recomputes exact required rates for the goals and compares them with what
//! is really available: capped inputs for raw resources and the solver's
//! realized rates for produced items. Unlike cost propagation, a repeat visit
//! on the current path just stops the walk instead of failing.

use std::collections::BTreeMap;

use crate::catalog::RecipeCatalog;
use crate::models::{Bottleneck, PlanResult, ProductionGoal, RecipeSelection, ResourceInput, Severity};

const EPSILON: f64 = 1e-9;

pub struct BottleneckAnalyzer<'a, C: RecipeCatalog + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: RecipeCatalog + ?Sized> BottleneckAnalyzer<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    pub fn analyze(
        &self,
        goals: &[ProductionGoal],
        inputs: &[ResourceInput],
        belt_limit: f64,
        selection: &RecipeSelection,
        plan: &PlanResult,
    ) -> Vec<Bottleneck> {
        let required = self.required_rates(goals, selection);
        let available = available_rates(inputs, belt_limit, plan);

        let mut bottlenecks: Vec<Bottleneck> = required
            .into_iter()
            .filter_map(|(item, required)| {
                let available = available.get(&item).copied().unwrap_or(0.0);
                let shortfall = required - available;
                if shortfall <= EPSILON || required <= 0.0 {
                    return None;
                }
                let fraction = shortfall / required;
                let suggestions = self.suggestions(&item, inputs);
                Some(Bottleneck {
                    item,
                    required,
                    available,
                    shortfall,
                    shortfall_fraction: fraction,
                    severity: Severity::from_fraction(fraction),
                    suggestions,
                })
            })
            .collect();

        bottlenecks.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.shortfall.total_cmp(&a.shortfall))
                .then_with(|| a.item.cmp(&b.item))
        });
        bottlenecks
    }

    /// Item -> rate needed to hit every goal in full.
    pub fn required_rates(
        &self,
        goals: &[ProductionGoal],
        selection: &RecipeSelection,
    ) -> BTreeMap<String, f64> {
        let mut required = BTreeMap::new();
        for goal in goals {
            let mut path = Vec::new();
            self.propagate(&goal.item, goal.rate, selection, &mut required, &mut path);
        }
        required
    }

    fn propagate(
        &self,
        item: &str,
        rate: f64,
        selection: &RecipeSelection,
        required: &mut BTreeMap<String, f64>,
        path: &mut Vec<String>,
    ) {
        *required.entry(item.to_string()).or_default() += rate;

        if self.catalog.is_raw(item) || path.iter().any(|p| p == item) {
            return;
        }
        let Some(recipe) = self.catalog.active_recipe(item, selection) else {
            return;
        };
        let produced = recipe.product_quantity(item);
        if !(produced.is_finite() && produced > 0.0) {
            return;
        }

        path.push(item.to_string());
        for (ingredient, quantity) in &recipe.ingredients {
            self.propagate(ingredient, quantity * rate / produced, selection, required, path);
        }
        path.pop();
    }

    fn suggestions(&self, item: &str, inputs: &[ResourceInput]) -> Vec<String> {
        let mut out = if self.catalog.is_raw(item) {
            // Lowest miner tier feeding this resource that still has an upgrade.
            let upgrade = inputs
                .iter()
                .filter(|i| i.resource == item && i.rate.is_none())
                .filter_map(|i| i.tier.next().map(|next| (i.tier, next)))
                .min_by_key(|(tier, _)| tier.base_rate() as u32);
            let tier_hint = match upgrade {
                Some((from, to)) => format!("Upgrade {} miners from {:?} to {:?}", item, from, to),
                None => format!("Upgrade {} extractors to a higher tier", item),
            };
            vec![
                format!("Add more {} extraction nodes", item),
                format!("Move {} miners to purer nodes", item),
                tier_hint,
            ]
        } else {
            vec![
                format!("Increase {} production", item),
                format!("Review alternate recipes for {}", item),
            ]
        };
        out.push("Verify belts and pipes use the top transport tier".to_string());
        out
    }
}

/// Capped input rates, replaced by realized rates for anything the plan makes.
fn available_rates(
    inputs: &[ResourceInput],
    belt_limit: f64,
    plan: &PlanResult,
) -> BTreeMap<String, f64> {
    let mut available = BTreeMap::new();
    for input in inputs {
        *available.entry(input.resource.clone()).or_default() += input.capped_rate(belt_limit);
    }
    for step in &plan.steps {
        available.insert(step.item.clone(), step.rate);
    }
    available
}
