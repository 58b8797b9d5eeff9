use super::domain::Rule;

/// Starter rule set written by `rules init`; weights sum to the High threshold.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new("Duplicate SSN across applications", 3.0),
        Rule::new("High income for assistance program", 3.0),
        Rule::new("Underage applicant", 2.0),
        Rule::new("Program mismatch: SNAP income above limit", 1.0),
    ]
}
