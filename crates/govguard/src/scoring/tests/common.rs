use crate::rules::{default_rules, Rule};
use crate::scoring::ApplicantRecord;

pub(super) fn rules() -> Vec<Rule> {
    default_rules()
}

pub(super) fn flagged_applicant() -> ApplicantRecord {
    ApplicantRecord::new()
        .with("SSN", "123-45-6789")
        .with("Bank_Account", "9876543210")
        .with("Income", 100000)
        .with("Address", "123 Elm St, FL")
        .with("Age", 17)
        .with("Program", "SNAP")
}

pub(super) fn clean_applicant() -> ApplicantRecord {
    ApplicantRecord::new()
        .with("SSN", "000-00-0000")
        .with("Income", 1000)
        .with("Age", 30)
        .with("Program", "TANF")
}

pub(super) fn descriptions(rules: &[Rule]) -> Vec<String> {
    rules
        .iter()
        .map(|rule| rule.description().expect("well-formed rule").to_string())
        .collect()
}

pub(super) const UPLOAD: &str = "\
Applicant_ID,Name,SSN,Monthly_Income,Age,Program
A-1,Jordan Reyes,123-45-6789,100000,17,SNAP
A-2,Casey Lin,000-00-0000,1000,30,TANF
A-3,Morgan Ellis,111-22-3333,3000,45,SNAP
";
