//! Rule-based fraud risk scoring for benefit program applicants.
//!
//! Rules live in a flat JSON file managed through a [`rules::RuleStore`]; the
//! [`scoring`] module evaluates single applicants or whole CSV uploads against
//! the current rule set.

pub mod config;
pub mod error;
pub mod rules;
pub mod scoring;
pub mod service;
pub mod telemetry;
