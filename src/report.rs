//! Human-readable plan, bottleneck and cost reports

use std::fmt;

use crate::cost::CostVector;
use crate::models::{Bottleneck, PlanResult};

/// Summary of a solved plan
#[derive(Debug)]
pub struct PlanSummary<'a> {
    pub plan: &'a PlanResult,
}

impl<'a> PlanSummary<'a> {
    pub fn new(plan: &'a PlanResult) -> Self {
        Self { plan }
    }
}

impl fmt::Display for PlanSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.plan;
        writeln!(f, "=== Production Plan ===")?;
        writeln!(f, "Goals:")?;
        for goal in &plan.goals {
            let marker = if goal.achieved + 1e-9 >= goal.target { "" } else { "  (short)" };
            writeln!(
                f,
                "  {:<28} {:>9.2} / {:>9.2} per min{}",
                goal.item, goal.achieved, goal.target, marker
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Production steps:")?;
        if plan.steps.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for step in &plan.steps {
            writeln!(
                f,
                "  {:>7.3}x {:<14} {:<28} {:>9.2}/min  {:>8.2} MW  [{}]",
                step.machine_count, step.building, step.item, step.rate, step.power_mw, step.recipe_name
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Power: {:.2} MW", plan.total_power_mw())?;

        if let Some(sink) = &plan.sink {
            writeln!(
                f,
                "Sink: {:.0} {} for {:.0} points/min",
                sink.amount, sink.item, sink.points
            )?;
        }

        if !plan.leftover.is_empty() {
            writeln!(f)?;
            writeln!(f, "Leftover:")?;
            for (item, amount) in &plan.leftover {
                writeln!(f, "  {} @ {:.2}/min", item, amount)?;
            }
        }

        write!(f, "Settled after {} iterations", plan.iterations)
    }
}

/// Bottlenecks ordered most severe first
#[derive(Debug)]
pub struct BottleneckReport<'a> {
    pub bottlenecks: &'a [Bottleneck],
}

impl<'a> BottleneckReport<'a> {
    pub fn new(bottlenecks: &'a [Bottleneck]) -> Self {
        Self { bottlenecks }
    }
}

impl fmt::Display for BottleneckReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bottlenecks ===")?;
        if self.bottlenecks.is_empty() {
            return write!(f, "No bottlenecks: every requirement is covered.");
        }
        for b in self.bottlenecks {
            writeln!(
                f,
                "[{}] {}: need {:.2}/min, have {:.2}/min, short {:.2} ({:.0}%)",
                b.severity.as_str(),
                b.item,
                b.required,
                b.available,
                b.shortfall,
                b.shortfall_fraction * 100.0
            )?;
            for suggestion in &b.suggestions {
                writeln!(f, "    - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

/// Raw resources behind a quantity of one item
#[derive(Debug)]
pub struct CostReport<'a> {
    pub item: &'a str,
    pub quantity: f64,
    pub cost: &'a CostVector,
}

impl fmt::Display for CostReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Raw Cost ===")?;
        writeln!(f, "Target: {} x {:.3}", self.item, self.quantity)?;
        for (raw, amount) in self.cost {
            writeln!(f, "  {:<20} {:>10.3}", raw, amount)?;
        }
        Ok(())
    }
}
