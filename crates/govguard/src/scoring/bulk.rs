use std::io::{Read, Write};
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::applicant::ApplicantRecord;
use super::engine::{RiskLevel, ScoringEngine, ScoringResult};

pub const RISK_SCORE_COLUMN: &str = "Risk_Score";
pub const TRIGGERED_RULES_COLUMN: &str = "Triggered_Rules";
pub const RISK_LEVEL_COLUMN: &str = "Risk_Level";
pub const REVIEW_NOTES_COLUMN: &str = "Review_Notes";

#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    #[error("failed to read applicant dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid applicant CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("applicant dataset has no header row")]
    MissingHeader,
}

/// One uploaded row: the original cells plus the record the engine reads.
#[derive(Debug, Clone)]
pub struct BulkRow {
    pub cells: Vec<String>,
    pub record: ApplicantRecord,
    /// Set when the row could not be decoded; such rows are kept and scored as empty.
    pub decode_error: Option<String>,
}

/// Tabular applicant upload with a header row.
#[derive(Debug, Clone, Default)]
pub struct BulkDataset {
    headers: Vec<String>,
    rows: Vec<BulkRow>,
}

impl BulkDataset {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BulkError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, BulkError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').to_string())
            .collect();
        if headers.iter().all(|header| header.is_empty()) {
            return Err(BulkError::MissingHeader);
        }

        let mut rows = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let row = match record {
                Ok(record) => BulkRow {
                    record: ApplicantRecord::from_cells(
                        headers.iter().map(String::as_str),
                        record.iter(),
                    ),
                    cells: record.iter().map(str::to_string).collect(),
                    decode_error: None,
                },
                Err(error) => {
                    warn!(row = index + 1, %error, "applicant row could not be decoded");
                    BulkRow {
                        cells: Vec::new(),
                        record: ApplicantRecord::new(),
                        decode_error: Some(error.to_string()),
                    }
                }
            };
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[BulkRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Score every row independently; output order matches input order.
    pub fn score(self, engine: &ScoringEngine) -> ScoredDataset {
        let Self { headers, rows } = self;
        let rows: Vec<ScoredRow> = rows
            .into_par_iter()
            .map(|row| {
                let result = engine.score(&row.record);
                ScoredRow {
                    cells: row.cells,
                    record: row.record,
                    decode_error: row.decode_error,
                    result,
                }
            })
            .collect();

        let scored = ScoredDataset { headers, rows };
        let summary = scored.summary();
        info!(
            rows = summary.total_rows,
            high = summary.levels.high,
            medium = summary.levels.medium,
            low = summary.levels.low,
            flagged = summary.flagged_for_review,
            "scored applicant dataset"
        );
        scored
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub cells: Vec<String>,
    pub record: ApplicantRecord,
    pub decode_error: Option<String>,
    pub result: ScoringResult,
}

impl ScoredRow {
    pub fn needs_review(&self) -> bool {
        self.decode_error.is_some() || self.result.needs_review()
    }

    /// Raw cell value by column name, for display columns such as `Applicant_ID`.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.record.get(column).and_then(|value| value.as_str())
    }

    pub fn review_notes(&self) -> String {
        match &self.decode_error {
            Some(error) => format!("row not decoded: {error}"),
            None => self.result.review_notes(),
        }
    }
}

/// Options for the augmented CSV export.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExportOptions {
    pub review_column: bool,
}

#[derive(Debug, Clone)]
pub struct ScoredDataset {
    headers: Vec<String>,
    rows: Vec<ScoredRow>,
}

impl ScoredDataset {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[ScoredRow] {
        &self.rows
    }

    /// Write the original columns followed by the computed score columns.
    pub fn write_csv<W: Write>(
        &self,
        writer: W,
        options: CsvExportOptions,
    ) -> Result<(), BulkError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header_row = self.headers.clone();
        header_row.extend(
            [RISK_SCORE_COLUMN, TRIGGERED_RULES_COLUMN, RISK_LEVEL_COLUMN]
                .into_iter()
                .map(String::from),
        );
        if options.review_column {
            header_row.push(REVIEW_NOTES_COLUMN.to_string());
        }
        csv_writer.write_record(&header_row)?;

        let width = self.headers.len();
        for (index, row) in self.rows.iter().enumerate() {
            if row.cells.len() > width {
                warn!(
                    row = index + 1,
                    extra = row.cells.len() - width,
                    "dropping cells beyond the header width"
                );
            }
            let mut output: Vec<String> = row.cells.iter().take(width).cloned().collect();
            output.resize(width, String::new());
            output.push(format_score(row.result.risk_score));
            output.push(row.result.triggered_summary());
            output.push(row.result.risk_level.label().to_string());
            if options.review_column {
                output.push(row.review_notes());
            }
            csv_writer.write_record(&output)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self, options: CsvExportOptions) -> Result<String, BulkError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer, options)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn summary(&self) -> BulkSummary {
        let mut levels = LevelCounts::default();
        let mut rule_hits: Vec<RuleHitCount> = Vec::new();
        let mut flagged_for_review = 0;

        for row in &self.rows {
            levels.record(row.result.risk_level);
            if row.needs_review() {
                flagged_for_review += 1;
            }
            for rule in &row.result.triggered_rules {
                match rule_hits.iter_mut().find(|hit| &hit.rule == rule) {
                    Some(hit) => hit.count += 1,
                    None => rule_hits.push(RuleHitCount {
                        rule: rule.clone(),
                        count: 1,
                    }),
                }
            }
        }

        BulkSummary {
            total_rows: self.rows.len(),
            levels,
            flagged_for_review,
            rule_hits,
        }
    }
}

/// Aggregate view of a scored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub total_rows: usize,
    pub levels: LevelCounts,
    pub flagged_for_review: usize,
    pub rule_hits: Vec<RuleHitCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl LevelCounts {
    fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::High => self.high += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::Low => self.low += 1,
        }
    }
}

/// How many rows a rule fired for (counted once per firing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleHitCount {
    pub rule: String,
    pub count: usize,
}

/// Integral scores print without a fractional part (`9`, not `9.0`).
pub fn format_score(score: f64) -> String {
    format!("{score}")
}
