//! Error types for cost propagation, validation and solving

use std::fmt;

/// Errors raised by the planning core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlannerError {
    /// An item appears twice on its own dependency path.
    #[error("circular dependency: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("invalid recipe '{recipe}': {reason}")]
    InvalidRecipe { recipe: String, reason: String },

    /// Input names a resource that is not raw.
    #[error("'{0}' is not a raw resource")]
    InvalidResource(String),

    #[error("input rate for '{0}' is out of range")]
    InvalidRate(String),

    #[error("invalid production goal for '{0}'")]
    InvalidGoal(String),

    #[error("no recipe produces '{0}'")]
    NoRecipeFound(String),

    #[error("calculation did not settle within {iterations} iterations")]
    CalculationTimeout { iterations: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Every issue found by the validator, in the order they were detected.
    #[error("{0}")]
    Validation(ValidationReport),

    #[error("calculation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// Outcome of validating a plan request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<PlannerError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: PlannerError) {
        self.issues.push(issue);
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(PlannerError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "configuration is valid");
        }
        write!(f, "{} validation issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_includes_full_path() {
        let err = PlannerError::CircularDependency(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(err.to_string(), "circular dependency: A -> B -> A");
    }

    #[test]
    fn report_lists_every_issue() {
        let mut report = ValidationReport::default();
        assert!(report.clone().into_result().is_ok());
        report.push(PlannerError::InvalidGoal("Rotor".into()));
        report.push(PlannerError::InvalidResource("IronPlate".into()));
        let text = report.to_string();
        assert!(text.starts_with("2 validation issue(s)"));
        assert!(text.contains("Rotor"));
        assert!(text.contains("IronPlate"));
        assert!(matches!(report.into_result(), Err(PlannerError::Validation(_))));
    }
}
