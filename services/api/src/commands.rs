use crate::infra::simulated_applicant;
use chrono::Local;
use clap::Args;
use govguard::error::AppError;
use govguard::rules::{JsonFileRuleStore, Rule, RuleStore};
use govguard::scoring::{
    ApplicantRecord, BulkDataset, CsvExportOptions, ScoredDataset, ScoringEngine, ScoringResult,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug, Default)]
pub(crate) struct RulesInitArgs {
    /// Overwrite an existing rule file
    #[arg(long)]
    pub(crate) force: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RulesSetArgs {
    /// Position of the rule in `rules list` (1-based)
    #[arg(long)]
    pub(crate) index: usize,
    /// Enable the rule
    #[arg(long, conflicts_with = "disable")]
    pub(crate) enable: bool,
    /// Disable the rule
    #[arg(long)]
    pub(crate) disable: bool,
    /// New score weight
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) weight: Option<f64>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ApplicantArgs {
    /// JSON object describing the applicant
    #[arg(long)]
    pub(crate) file: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BulkArgs {
    /// CSV upload with a header row
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Write the augmented CSV here instead of printing a table
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Add a Review_Notes column describing fields that could not be evaluated
    #[arg(long)]
    pub(crate) review_column: bool,
}

pub(crate) fn run_rules_list(store: &JsonFileRuleStore) -> Result<(), AppError> {
    let rules = store.load()?;
    render_rules(&mut io::stdout().lock(), &rules)?;
    Ok(())
}

pub(crate) fn run_rules_init(
    store: &JsonFileRuleStore,
    args: RulesInitArgs,
) -> Result<(), AppError> {
    if store.initialize(args.force)? {
        println!("Wrote default rules to {}", store.path().display());
    } else {
        println!(
            "Rule file {} already exists (use --force to overwrite)",
            store.path().display()
        );
    }
    Ok(())
}

pub(crate) fn run_rules_set(
    store: &JsonFileRuleStore,
    args: RulesSetArgs,
) -> Result<(), AppError> {
    let mut rules = store.load()?;
    apply_rule_edit(&mut rules, &args)?;
    store.save(&rules)?;
    info!(index = args.index, "rule updated");
    render_rules(&mut io::stdout().lock(), &rules)?;
    Ok(())
}

fn apply_rule_edit(rules: &mut [Rule], args: &RulesSetArgs) -> Result<(), AppError> {
    let count = rules.len();
    let rule = args
        .index
        .checked_sub(1)
        .and_then(|position| rules.get_mut(position))
        .ok_or_else(|| {
            AppError::Input(format!(
                "rule index {} is out of range (1-{})",
                args.index, count
            ))
        })?;

    if !args.enable && !args.disable && args.weight.is_none() {
        return Err(AppError::Input(
            "nothing to change: pass --enable, --disable or --weight".to_string(),
        ));
    }

    if args.enable {
        rule.set_enabled(true);
    }
    if args.disable {
        rule.set_enabled(false);
    }
    if let Some(weight) = args.weight {
        if !weight.is_finite() {
            return Err(AppError::Input(format!("weight {weight} is not finite")));
        }
        rule.set_score_weight(weight);
    }
    Ok(())
}

pub(crate) fn run_score_applicant(
    store: &JsonFileRuleStore,
    args: ApplicantArgs,
) -> Result<(), AppError> {
    let engine = ScoringEngine::new(store.load()?);
    let (applicant, simulated) = match args.file {
        Some(path) => (read_applicant(&path)?, false),
        None => (simulated_applicant(), true),
    };

    let result = engine.score(&applicant);
    let mut out = io::stdout().lock();
    if args.json {
        let encoded = serde_json::to_string_pretty(&result)
            .map_err(|err| AppError::Input(format!("failed to encode result: {err}")))?;
        writeln!(out, "{encoded}")?;
    } else {
        render_applicant_result(&mut out, &applicant, &result, simulated)?;
    }
    Ok(())
}

fn read_applicant(path: &Path) -> Result<ApplicantRecord, AppError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::Input(format!(
            "{} must contain a JSON object of applicant fields: {err}",
            path.display()
        ))
    })
}

pub(crate) fn run_bulk_score(store: &JsonFileRuleStore, args: BulkArgs) -> Result<(), AppError> {
    let engine = ScoringEngine::new(store.load()?);
    let scored = BulkDataset::from_path(&args.input)?.score(&engine);
    let options = CsvExportOptions {
        review_column: args.review_column,
    };

    match args.output {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            scored.write_csv(file, options)?;
            println!(
                "Scored {} rows at {}; wrote {}",
                scored.rows().len(),
                Local::now().format("%Y-%m-%d %H:%M"),
                path.display()
            );
        }
        None => render_bulk_table(&mut io::stdout().lock(), &scored)?,
    }
    Ok(())
}

pub(crate) fn render_rules<W: Write>(out: &mut W, rules: &[Rule]) -> io::Result<()> {
    if rules.is_empty() {
        return writeln!(out, "No rules defined");
    }

    writeln!(out, "Rules")?;
    for (index, rule) in rules.iter().enumerate() {
        let enabled = match rule.is_enabled() {
            Ok(true) => "on",
            Ok(false) => "off",
            Err(_) => "??",
        };
        let weight = rule
            .score_weight()
            .map(|weight| weight.to_string())
            .unwrap_or_else(|_| "invalid".to_string());
        let predicates = match rule.predicates() {
            Ok(kinds) if kinds.is_empty() => "inert".to_string(),
            Ok(kinds) => kinds
                .iter()
                .map(|kind| kind.label())
                .collect::<Vec<_>>()
                .join(" + "),
            Err(_) => "malformed".to_string(),
        };
        writeln!(
            out,
            "{:>2}. [{}] weight {} | {} | {}",
            index + 1,
            enabled,
            weight,
            predicates,
            rule.display_label()
        )?;
    }
    Ok(())
}

fn render_applicant_result<W: Write>(
    out: &mut W,
    applicant: &ApplicantRecord,
    result: &ScoringResult,
    simulated: bool,
) -> io::Result<()> {
    if simulated {
        writeln!(out, "Simulated applicant")?;
        for (name, value) in applicant.fields() {
            writeln!(out, "- {name}: {value}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "Fraud risk score: {}", result.risk_score)?;
    writeln!(out, "Risk level: {}", result.risk_level)?;
    if result.triggered_rules.is_empty() {
        writeln!(out, "Triggered rules: none")?;
    } else {
        writeln!(out, "Triggered rules")?;
        for rule in &result.triggered_rules {
            writeln!(out, "- {rule}")?;
        }
    }
    if result.needs_review() {
        writeln!(out, "Needs review: {}", result.review_notes())?;
    }
    Ok(())
}

pub(crate) fn render_bulk_table<W: Write>(out: &mut W, scored: &ScoredDataset) -> io::Result<()> {
    let summary = scored.summary();
    writeln!(
        out,
        "Scored {} rows: {} high, {} medium, {} low ({} flagged for review)",
        summary.total_rows,
        summary.levels.high,
        summary.levels.medium,
        summary.levels.low,
        summary.flagged_for_review
    )?;

    writeln!(out, "\nApplicant_ID | Name | Risk_Level | Risk_Score | Triggered_Rules")?;
    for row in scored.rows() {
        let review = if row.needs_review() { " (review)" } else { "" };
        writeln!(
            out,
            "{} | {} | {} | {} | {}{}",
            row.value("Applicant_ID").unwrap_or("-"),
            row.value("Name").unwrap_or("-"),
            row.result.risk_level,
            row.result.risk_score,
            row.result.triggered_summary(),
            review
        )?;
    }

    if !summary.rule_hits.is_empty() {
        writeln!(out, "\nRule hits")?;
        for hit in &summary.rule_hits {
            writeln!(out, "- {}: {}", hit.rule, hit.count)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use govguard::rules::default_rules;

    fn set_args(index: usize) -> RulesSetArgs {
        RulesSetArgs {
            index,
            enable: false,
            disable: false,
            weight: None,
        }
    }

    #[test]
    fn rule_edit_toggles_and_reweights() {
        let mut rules = default_rules();
        let args = RulesSetArgs {
            disable: true,
            weight: Some(4.0),
            ..set_args(2)
        };

        apply_rule_edit(&mut rules, &args).expect("edit applies");

        assert!(!rules[1].is_enabled().expect("enabled flag"));
        assert_eq!(rules[1].score_weight().expect("weight"), 4.0);
    }

    #[test]
    fn rule_edit_rejects_out_of_range_index() {
        let mut rules = default_rules();
        let args = RulesSetArgs {
            enable: true,
            ..set_args(0)
        };
        assert!(matches!(
            apply_rule_edit(&mut rules, &args),
            Err(AppError::Input(_))
        ));

        let args = RulesSetArgs {
            enable: true,
            ..set_args(5)
        };
        assert!(matches!(
            apply_rule_edit(&mut rules, &args),
            Err(AppError::Input(_))
        ));
    }

    #[test]
    fn rule_edit_requires_a_change() {
        let mut rules = default_rules();
        assert!(matches!(
            apply_rule_edit(&mut rules, &set_args(1)),
            Err(AppError::Input(_))
        ));
    }

    #[test]
    fn rules_listing_shows_predicates_and_state() {
        let mut rules = default_rules();
        rules[2].set_enabled(false);
        rules.push(Rule::new("Suspicious mailing address", 1.0));

        let mut out = Vec::new();
        render_rules(&mut out, &rules).expect("render succeeds");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains(" 1. [on] weight 3 | Duplicate SSN | Duplicate SSN across applications"));
        assert!(text.contains(" 3. [off] weight 2 | Underage Applicant | Underage applicant"));
        assert!(text.contains(" 5. [on] weight 1 | inert | Suspicious mailing address"));
    }

    #[test]
    fn bulk_table_lists_identity_columns() {
        let csv = "Applicant_ID,Name,SSN,Monthly_Income,Age,Program\n\
1001,Jordan Reyes,123-45-6789,100000,17,SNAP\n";
        let scored = BulkDataset::from_reader(csv.as_bytes())
            .expect("dataset parses")
            .score(&ScoringEngine::new(default_rules()));

        let mut out = Vec::new();
        render_bulk_table(&mut out, &scored).expect("render succeeds");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("Scored 1 rows: 1 high, 0 medium, 0 low (0 flagged for review)"));
        assert!(text.contains("1001 | Jordan Reyes | High | 9 | Duplicate SSN across applications"));
    }

    #[test]
    fn rules_set_persists_the_edit_and_keeps_other_rules() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileRuleStore::new(dir.path().join("rules.json"));
        assert!(store.initialize(false).expect("defaults written"));

        let args = RulesSetArgs {
            weight: Some(6.5),
            ..set_args(3)
        };
        run_rules_set(&store, args).expect("edit saved");

        let rules = store.load().expect("rules reload");
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[2].score_weight().expect("weight"), 6.5);
        assert_eq!(rules[0], default_rules()[0]);
    }

    #[test]
    fn bulk_score_writes_augmented_csv_to_output() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileRuleStore::new(dir.path().join("rules.json"));
        store.initialize(false).expect("defaults written");
        let input = dir.path().join("upload.csv");
        std::fs::write(&input, "SSN,Income,Age,Program\n123-45-6789,100000,17,SNAP\n")
            .expect("upload written");
        let output = dir.path().join("scored.csv");

        run_bulk_score(
            &store,
            BulkArgs {
                input,
                output: Some(output.clone()),
                review_column: false,
            },
        )
        .expect("bulk scoring succeeds");

        let written = std::fs::read_to_string(output).expect("output readable");
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("SSN,Income,Age,Program,Risk_Score,Triggered_Rules,Risk_Level")
        );
        let row = lines.next().expect("scored row");
        assert!(row.starts_with("123-45-6789,100000,17,SNAP,9,"), "row: {row}");
        assert!(row.ends_with(",High"), "row: {row}");
    }
}
