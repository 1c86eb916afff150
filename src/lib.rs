//! Factory Production Planner
//!
//! Raw-cost propagation, resource allocation and bottleneck analysis for
//! Satisfactory-style factory chains.

pub mod bottleneck;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod report;
pub mod sample;
pub mod session;
pub mod solver;
pub mod validate;

pub use catalog::{Catalog, RecipeCatalog};
pub use config::PlannerConfig;
pub use error::{PlannerError, Result, ValidationReport};
pub use session::{CommittedPlan, Planner, SolveJob};
pub use solver::{CancelToken, SolveProgress, Solver};
