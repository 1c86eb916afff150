//! Planning session
//!
//! Owns the caller's request and the last committed plan. A plan is only
//! replaced once a new solve has fully succeeded, so a failed or cancelled run
//! leaves the previous plan in place.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use crate::bottleneck::BottleneckAnalyzer;
use crate::catalog::RecipeCatalog;
use crate::config::PlannerConfig;
use crate::cost::{CostCache, CostPropagator, CostVector};
use crate::error::Result;
use crate::models::{Bottleneck, PlanRequest, PlanResult, ProductionGoal, ResourceInput};
use crate::solver::{CancelToken, SolveProgress, Solver};

/// A solved plan together with the request that produced it
#[derive(Debug, Clone)]
pub struct CommittedPlan {
    pub request: PlanRequest,
    pub plan: PlanResult,
    pub bottlenecks: Vec<Bottleneck>,
}

fn solve_and_analyze<C: RecipeCatalog + ?Sized>(
    catalog: &C,
    config: &PlannerConfig,
    request: PlanRequest,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(SolveProgress),
) -> Result<CommittedPlan> {
    let plan = Solver::new(catalog, config.clone()).solve_with(&request, cancel, progress)?;
    let belt_limit = request.belt_limit.unwrap_or(config.belt_limit);
    let bottlenecks = BottleneckAnalyzer::new(catalog).analyze(
        &request.goals,
        &request.inputs,
        belt_limit,
        &request.recipes,
        &plan,
    );
    Ok(CommittedPlan {
        request,
        plan,
        bottlenecks,
    })
}

/// A solve running on a worker thread
pub struct SolveJob {
    cancel: CancelToken,
    progress: Receiver<SolveProgress>,
    handle: JoinHandle<Result<CommittedPlan>>,
}

impl SolveJob {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Milestones in the order the solver reported them; ends when the
    /// worker finishes.
    pub fn progress(&self) -> &Receiver<SolveProgress> {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<CommittedPlan> {
        self.handle
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

pub struct Planner<C: RecipeCatalog + Send + Sync + 'static> {
    catalog: Arc<C>,
    config: PlannerConfig,
    request: PlanRequest,
    cost_cache: CostCache,
    current: Option<CommittedPlan>,
}

impl<C: RecipeCatalog + Send + Sync + 'static> Planner<C> {
    pub fn new(catalog: Arc<C>, config: PlannerConfig) -> Self {
        let cost_cache = CostCache::new(config.cache_ttl());
        Self {
            catalog,
            config,
            request: PlanRequest::default(),
            cost_cache,
            current: None,
        }
    }

    pub fn with_request(mut self, request: PlanRequest) -> Self {
        self.cost_cache.clear();
        self.request = request;
        self
    }

    pub fn request(&self) -> &PlanRequest {
        &self.request
    }

    pub fn set_inputs(&mut self, inputs: Vec<ResourceInput>) {
        self.request.inputs = inputs;
    }

    pub fn set_goals(&mut self, goals: Vec<ProductionGoal>) {
        self.request.goals = goals;
    }

    /// Change which recipes are enabled for `item`; invalidates memoized costs.
    pub fn set_recipes(&mut self, item: &str, recipe_ids: Vec<String>) {
        self.request.recipes.set(item, recipe_ids);
        self.cost_cache.clear();
    }

    pub fn current(&self) -> Option<&CommittedPlan> {
        self.current.as_ref()
    }

    /// Raw resources for `quantity` of `item` under the session's selection.
    pub fn raw_cost(&mut self, item: &str, quantity: f64) -> Result<CostVector> {
        let cache = std::mem::replace(&mut self.cost_cache, CostCache::new(self.config.cache_ttl()));
        let mut costs =
            CostPropagator::with_cache(&*self.catalog, self.request.recipes.clone(), cache);
        let result = costs.raw_cost(item, quantity);
        self.cost_cache = costs.into_cache();
        result
    }

    /// Solve on the calling thread and commit on success.
    pub fn replan(&mut self) -> Result<&CommittedPlan> {
        let committed = solve_and_analyze(
            &*self.catalog,
            &self.config,
            self.request.clone(),
            &CancelToken::new(),
            &mut |_| {},
        )?;
        Ok(&*self.current.insert(committed))
    }

    /// Start a solve of the current request on a worker thread.
    pub fn spawn_solve(&self) -> SolveJob {
        let catalog = Arc::clone(&self.catalog);
        let config = self.config.clone();
        let request = self.request.clone();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut report = |p: SolveProgress| {
                // The receiver may already be gone; progress is best-effort.
                let _ = tx.send(p);
            };
            solve_and_analyze(&*catalog, &config, request, &worker_cancel, &mut report)
        });

        SolveJob {
            cancel,
            progress: rx,
            handle,
        }
    }

    /// Wait for `job` and commit its plan if it succeeded.
    pub fn finish(&mut self, job: SolveJob) -> Result<&CommittedPlan> {
        let committed = job.join()?;
        Ok(&*self.current.insert(committed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use crate::models::RecipeSelection;
    use crate::sample;

    fn planner() -> Planner<crate::catalog::Catalog> {
        let catalog = Arc::new(sample::sample_catalog().unwrap());
        Planner::new(catalog, PlannerConfig::default()).with_request(sample::sample_request())
    }

    #[test]
    fn failed_replan_keeps_previous_plan() {
        let mut planner = planner();
        let first = planner.replan().unwrap().plan.clone();

        planner.set_goals(vec![ProductionGoal::new("Rotor", 0.0)]);
        let err = planner.replan().unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));
        assert_eq!(planner.current().unwrap().plan, first);
    }

    #[test]
    fn background_solve_commits_plan() {
        let mut planner = planner();
        assert!(planner.current().is_none());
        let job = planner.spawn_solve();
        let committed = planner.finish(job).unwrap();
        assert!(!committed.plan.steps.is_empty());
        assert_eq!(planner.current().unwrap().request, sample::sample_request());
    }

    #[test]
    fn progress_channel_sees_done() {
        let planner = planner();
        let job = planner.spawn_solve();
        let seen: Vec<SolveProgress> = job.progress().iter().collect();
        job.join().unwrap();
        assert_eq!(seen.first(), Some(&SolveProgress::ValidationStarted));
        assert_eq!(seen.last(), Some(&SolveProgress::Done));
    }

    #[test]
    fn recipe_change_invalidates_costs() {
        let mut planner = planner();
        let plate = planner.raw_cost("IronPlate", 2.0).unwrap();
        assert!((plate["IronOre"] - 3.0).abs() < 1e-9);

        planner.set_recipes("IronIngot", vec!["alt_pure_iron_ingot".to_string()]);
        let plate = planner.raw_cost("IronPlate", 2.0).unwrap();
        assert!((plate["IronOre"] - 3.0 * 7.0 / 13.0).abs() < 1e-9);
        assert!(plate.contains_key("Water"));
        assert_eq!(planner.request().recipes.get("IronIngot").len(), 1);
        assert_ne!(planner.request().recipes, RecipeSelection::new());
    }

    #[test]
    fn fewer_inputs_shrink_the_plan() {
        use crate::models::{ExtractorTier, Purity};

        let mut planner = planner();
        let full = planner.replan().unwrap().plan.achieved("Rotor");
        planner.set_inputs(vec![
            ResourceInput::miner("IronOre", ExtractorTier::Mk1, Purity::Impure),
            ResourceInput::miner("CopperOre", ExtractorTier::Mk1, Purity::Normal),
        ]);
        let committed = planner.replan().unwrap();
        assert!(committed.plan.achieved("Rotor") < full);
        assert!(committed.bottlenecks.iter().any(|b| b.item == "IronOre"));
    }
}
