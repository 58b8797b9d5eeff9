use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::applicant::{ApplicantField, ApplicantRecord, FieldError};
use super::predicates;
use crate::rules::{MalformedRule, Rule, RuleKind};

/// Categorical tier derived from the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const HIGH_THRESHOLD: f64 = 9.0;
    pub const MEDIUM_THRESHOLD: f64 = 5.0;

    /// Lower bounds are inclusive; anything that is not at least Medium (including NaN) is Low.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Self::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Something that kept a rule or a predicate from being evaluated for an applicant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringIssue {
    MalformedRule {
        rule_index: usize,
        rule: String,
        reason: String,
    },
    MalformedRow {
        rule_index: usize,
        predicate: RuleKind,
        field: ApplicantField,
        reason: String,
    },
}

impl fmt::Display for ScoringIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringIssue::MalformedRule {
                rule_index, reason, ..
            } => write!(f, "rule #{} skipped: {}", rule_index + 1, reason),
            ScoringIssue::MalformedRow {
                predicate, reason, ..
            } => write!(f, "{} not evaluated: {}", predicate.label(), reason),
        }
    }
}

/// Outcome of scoring one applicant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResult {
    pub risk_score: f64,
    pub triggered_rules: Vec<String>,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ScoringIssue>,
}

impl ScoringResult {
    pub fn needs_review(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Triggered rule labels joined the way the bulk export writes them.
    pub fn triggered_summary(&self) -> String {
        self.triggered_rules.join(", ")
    }

    pub fn review_notes(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Default)]
struct Tally {
    risk_score: f64,
    triggered_rules: Vec<String>,
    issues: Vec<ScoringIssue>,
}

/// Score one applicant against an ordered rule set.
///
/// Every enabled rule runs each predicate it selects; each match adds the rule's
/// weight and appends its description, so a rule naming two markers can fire twice.
/// Malformed rules and unreadable fields are recorded as issues and never abort scoring.
pub fn score(applicant: &ApplicantRecord, rules: &[Rule]) -> ScoringResult {
    let mut tally = Tally::default();

    for (rule_index, rule) in rules.iter().enumerate() {
        if let Err(error) = apply_rule(rule_index, rule, applicant, &mut tally) {
            warn!(rule_index, rule = %rule.display_label(), %error, "skipping malformed rule");
            tally.issues.push(ScoringIssue::MalformedRule {
                rule_index,
                rule: rule.display_label(),
                reason: error.to_string(),
            });
        }
    }

    ScoringResult {
        risk_score: tally.risk_score,
        risk_level: RiskLevel::from_score(tally.risk_score),
        triggered_rules: tally.triggered_rules,
        issues: tally.issues,
    }
}

fn apply_rule(
    rule_index: usize,
    rule: &Rule,
    applicant: &ApplicantRecord,
    tally: &mut Tally,
) -> Result<(), MalformedRule> {
    if !rule.is_enabled()? {
        return Ok(());
    }

    let description = rule.description()?;
    for predicate in rule.predicates()? {
        match predicates::evaluate(predicate, &rule.params, applicant) {
            Ok(true) => {
                let weight = rule.score_weight()?;
                debug!(rule_index, ?predicate, weight, "rule triggered");
                tally.risk_score += weight;
                tally.triggered_rules.push(description.to_string());
            }
            Ok(false) => {}
            Err(error) => record_field_error(rule_index, predicate, error, tally),
        }
    }

    Ok(())
}

fn record_field_error(rule_index: usize, predicate: RuleKind, error: FieldError, tally: &mut Tally) {
    debug!(rule_index, ?predicate, %error, "predicate not evaluated");
    tally.issues.push(ScoringIssue::MalformedRow {
        rule_index,
        predicate,
        field: error.field(),
        reason: error.to_string(),
    });
}

/// Scoring engine bound to a snapshot of the rule set.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    rules: Vec<Rule>,
}

impl ScoringEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn score(&self, applicant: &ApplicantRecord) -> ScoringResult {
        score(applicant, &self.rules)
    }

    /// Score independent applicants in parallel; results keep the input order.
    pub fn score_all(&self, applicants: &[ApplicantRecord]) -> Vec<ScoringResult> {
        applicants
            .par_iter()
            .map(|applicant| self.score(applicant))
            .collect()
    }
}
