//! Rule evaluation for single applicants and bulk uploads.

pub mod applicant;
pub mod bulk;
mod engine;
mod predicates;

#[cfg(test)]
mod tests;

pub use applicant::{ApplicantField, ApplicantRecord, FieldError};
pub use bulk::{
    BulkDataset, BulkError, BulkRow, BulkSummary, CsvExportOptions, LevelCounts, RuleHitCount,
    ScoredDataset, ScoredRow,
};
pub use engine::{score, RiskLevel, ScoringEngine, ScoringIssue, ScoringResult};
