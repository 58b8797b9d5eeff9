use super::applicant::{ApplicantField, ApplicantRecord, FieldError};
use crate::rules::{PredicateParams, RuleKind};

/// Run one predicate. Operands are read lazily, so the program-mismatch check
/// only touches income once the program has matched.
pub(crate) fn evaluate(
    kind: RuleKind,
    params: &PredicateParams,
    applicant: &ApplicantRecord,
) -> Result<bool, FieldError> {
    match kind {
        RuleKind::DuplicateSsn => Ok(applicant.text(ApplicantField::Ssn)? == params.flagged_ssn()),
        RuleKind::HighIncome => {
            Ok(applicant.number(ApplicantField::Income)? > params.income_threshold())
        }
        RuleKind::Underage => Ok(applicant.integer(ApplicantField::Age)? < params.minimum_age()),
        RuleKind::ProgramMismatch => Ok(applicant.text(ApplicantField::Program)?
            == params.program()
            && applicant.number(ApplicantField::Income)? > params.program_income_threshold()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_strict() {
        let params = PredicateParams::default();
        let at_threshold = ApplicantRecord::new().with("Income", 50000).with("Age", 18);
        assert_eq!(evaluate(RuleKind::HighIncome, &params, &at_threshold), Ok(false));
        assert_eq!(evaluate(RuleKind::Underage, &params, &at_threshold), Ok(false));

        let over = ApplicantRecord::new().with("Income", 50000.01).with("Age", 17);
        assert_eq!(evaluate(RuleKind::HighIncome, &params, &over), Ok(true));
        assert_eq!(evaluate(RuleKind::Underage, &params, &over), Ok(true));
    }

    #[test]
    fn program_mismatch_skips_income_for_other_programs() {
        let params = PredicateParams::default();
        let applicant = ApplicantRecord::new().with("Program", "TANF");
        assert_eq!(
            evaluate(RuleKind::ProgramMismatch, &params, &applicant),
            Ok(false)
        );

        let applicant = ApplicantRecord::new().with("Program", "SNAP");
        assert_eq!(
            evaluate(RuleKind::ProgramMismatch, &params, &applicant),
            Err(FieldError::Missing {
                field: ApplicantField::Income
            })
        );
    }

    #[test]
    fn configured_operands_replace_literals() {
        let params = PredicateParams {
            flagged_ssn: Some("999-99-9999".to_string()),
            program: Some("WIC".to_string()),
            program_income_threshold: Some(1000.0),
            ..PredicateParams::default()
        };
        let applicant = ApplicantRecord::new()
            .with("SSN", "123-45-6789")
            .with("Program", "WIC")
            .with("Income", 1500);

        assert_eq!(evaluate(RuleKind::DuplicateSsn, &params, &applicant), Ok(false));
        assert_eq!(
            evaluate(RuleKind::ProgramMismatch, &params, &applicant),
            Ok(true)
        );
    }
}
