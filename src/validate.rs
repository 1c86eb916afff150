//! Structural checks run before any solving work

use crate::catalog::RecipeCatalog;
use crate::config::PlannerConfig;
use crate::error::{PlannerError, ValidationReport};
use crate::models::PlanRequest;

/// Collect every problem with `request`; the solver refuses to run unless the
/// report is empty.
pub fn validate<C: RecipeCatalog + ?Sized>(
    catalog: &C,
    request: &PlanRequest,
    config: &PlannerConfig,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if request.inputs.is_empty() {
        report.push(PlannerError::InvalidInput("no resource inputs".to_string()));
    }
    if request.goals.is_empty() {
        report.push(PlannerError::InvalidInput("no production goals".to_string()));
    }
    if let Some(limit) = request.belt_limit {
        if !(limit.is_finite() && limit > 0.0) {
            report.push(PlannerError::InvalidInput(format!(
                "belt limit must be positive, got {}",
                limit
            )));
        }
    }

    for input in &request.inputs {
        if !catalog.is_raw(&input.resource) {
            report.push(PlannerError::InvalidResource(input.resource.clone()));
        }
        let rate = input.effective_rate();
        if !(rate.is_finite() && rate > 0.0 && rate <= config.max_input_rate) {
            report.push(PlannerError::InvalidRate(input.resource.clone()));
        }
    }

    for goal in &request.goals {
        let known = catalog.item(&goal.item).is_some();
        if !known || !(goal.rate.is_finite() && goal.rate > 0.0) {
            report.push(PlannerError::InvalidGoal(goal.item.clone()));
        }
    }

    for (item, recipe_ids) in request.recipes.iter() {
        for id in recipe_ids {
            match catalog.recipe(id) {
                None => report.push(PlannerError::InvalidRecipe {
                    recipe: id.clone(),
                    reason: "unknown recipe".to_string(),
                }),
                Some(recipe) if !recipe.produces(item) => {
                    report.push(PlannerError::InvalidRecipe {
                        recipe: recipe.name.clone(),
                        reason: format!("does not produce {}", item),
                    })
                }
                Some(_) => {}
            }
        }
    }

    if !report.is_valid() {
        tracing::debug!(issues = report.issues.len(), "plan request rejected");
    }
    report
}
