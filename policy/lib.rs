#![deny(unused_variables)]
#![deny(unused_imports)]
#![deny(dead_code)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod artifact;
pub mod fair;
pub mod naive;
pub mod normalize;
pub mod rank;
pub mod types;
pub mod unaware;

// Statistical collaborators shared by the trained policies.
#[path = "../estimate/mod.rs"]
pub mod estimate;

// Simulated cohorts, applicant tables and the counterfactual audit.
#[path = "../cohort/mod.rs"]
pub mod cohort;
