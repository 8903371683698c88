//! Applicant cohorts: structural-model simulation, TSV input and output, and
//! counterfactual auditing of admission decisions.

pub mod audit;
pub mod data;
pub mod simulate;

pub use audit::{AuditReport, DecisionSummary, audit, summarize};
pub use data::{Applicants, DataError};
pub use simulate::{Cohort, ProtectedAttribute, SimulationConfig, SimulationError, simulate};
