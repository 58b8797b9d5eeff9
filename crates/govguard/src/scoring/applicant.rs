use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rules::json_type_name;

/// Fields the predicates read, with the column names accepted for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantField {
    Ssn,
    Income,
    Age,
    Program,
}

impl ApplicantField {
    pub const fn canonical(self) -> &'static str {
        self.aliases()[0]
    }

    /// Accepted names in lookup order; the canonical name comes first.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Ssn => &["SSN", "ssn"],
            Self::Income => &["Income", "Monthly_Income"],
            Self::Age => &["Age", "age"],
            Self::Program => &["Program", "program"],
        }
    }
}

impl fmt::Display for ApplicantField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Why a field could not be read for a predicate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{field} is missing")]
    Missing { field: ApplicantField },
    #[error("{field} value '{value}' is not a number")]
    NotNumeric { field: ApplicantField, value: String },
    #[error("{field} value '{value}' is not a whole number")]
    NotInteger { field: ApplicantField, value: String },
    #[error("{field} must be text, found {found}")]
    NotText {
        field: ApplicantField,
        found: &'static str,
    },
}

impl FieldError {
    pub fn field(&self) -> ApplicantField {
        match self {
            Self::Missing { field }
            | Self::NotNumeric { field, .. }
            | Self::NotInteger { field, .. }
            | Self::NotText { field, .. } => *field,
        }
    }
}

/// One applicant's named fields, as supplied by a JSON object or a CSV row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantRecord {
    fields: Map<String, Value>,
}

impl ApplicantRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Build a record from CSV cells; later duplicate headers do not shadow earlier ones
    /// and cells past the end of a short row are absent.
    pub fn from_cells<'a, H, C>(headers: H, cells: C) -> Self
    where
        H: IntoIterator<Item = &'a str>,
        C: IntoIterator<Item = &'a str>,
    {
        let mut fields = Map::new();
        for (header, cell) in headers.into_iter().zip(cells) {
            if !fields.contains_key(header) {
                fields.insert(header.to_string(), Value::String(cell.to_string()));
            }
        }
        Self { fields }
    }

    fn lookup(&self, field: ApplicantField) -> Option<&Value> {
        field
            .aliases()
            .iter()
            .find_map(|name| self.fields.get(*name))
            .filter(|value| !value.is_null())
    }

    /// Text comparison operand. Blank text is a valid (non-matching) value.
    pub fn text(&self, field: ApplicantField) -> Result<&str, FieldError> {
        match self.lookup(field) {
            Some(Value::String(text)) => Ok(text),
            Some(other) => Err(FieldError::NotText {
                field,
                found: json_type_name(other),
            }),
            None => Err(FieldError::Missing { field }),
        }
    }

    pub fn number(&self, field: ApplicantField) -> Result<f64, FieldError> {
        match self.lookup(field) {
            Some(Value::Number(number)) => number.as_f64().ok_or_else(|| FieldError::NotNumeric {
                field,
                value: number.to_string(),
            }),
            Some(Value::String(text)) if text.trim().is_empty() => {
                Err(FieldError::Missing { field })
            }
            Some(Value::String(text)) => {
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| FieldError::NotNumeric {
                        field,
                        value: text.clone(),
                    })
            }
            Some(other) => Err(FieldError::NotNumeric {
                field,
                value: other.to_string(),
            }),
            None => Err(FieldError::Missing { field }),
        }
    }

    /// Whole-number operand; integral decimals such as `17.0` are accepted.
    pub fn integer(&self, field: ApplicantField) -> Result<i64, FieldError> {
        let raw = match self.lookup(field) {
            Some(Value::Number(number)) => {
                if let Some(value) = number.as_i64() {
                    return Ok(value);
                }
                number.to_string()
            }
            Some(Value::String(text)) if text.trim().is_empty() => {
                return Err(FieldError::Missing { field })
            }
            Some(Value::String(text)) => text.trim().to_string(),
            Some(other) => other.to_string(),
            None => return Err(FieldError::Missing { field }),
        };

        if let Ok(value) = raw.parse::<i64>() {
            return Ok(value);
        }

        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
            Ok(_) => Err(FieldError::NotInteger { field, value: raw }),
            Err(_) => Err(FieldError::NotNumeric { field, value: raw }),
        }
    }
}

impl From<Map<String, Value>> for ApplicantRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_name_wins_over_alias() {
        let record = ApplicantRecord::new()
            .with("Monthly_Income", "60000")
            .with("Income", 1000);
        assert_eq!(record.number(ApplicantField::Income), Ok(1000.0));
    }

    #[test]
    fn alias_is_used_when_canonical_absent() {
        let record = ApplicantRecord::new()
            .with("Monthly_Income", " 3000.50 ")
            .with("age", "17");
        assert_eq!(record.number(ApplicantField::Income), Ok(3000.5));
        assert_eq!(record.integer(ApplicantField::Age), Ok(17));
    }

    #[test]
    fn blank_numeric_cells_count_as_missing() {
        let record = ApplicantRecord::new().with("Income", "").with("Age", "  ");
        assert_eq!(
            record.number(ApplicantField::Income),
            Err(FieldError::Missing {
                field: ApplicantField::Income
            })
        );
        assert_eq!(
            record.integer(ApplicantField::Age),
            Err(FieldError::Missing {
                field: ApplicantField::Age
            })
        );
    }

    #[test]
    fn integer_accepts_integral_decimals_only() {
        let record = ApplicantRecord::new().with("Age", "17.0");
        assert_eq!(record.integer(ApplicantField::Age), Ok(17));

        let record = ApplicantRecord::new().with("Age", json!(16.0));
        assert_eq!(record.integer(ApplicantField::Age), Ok(16));

        let record = ApplicantRecord::new().with("Age", "17.5");
        assert!(matches!(
            record.integer(ApplicantField::Age),
            Err(FieldError::NotInteger { .. })
        ));

        let record = ApplicantRecord::new().with("Age", "seventeen");
        assert!(matches!(
            record.integer(ApplicantField::Age),
            Err(FieldError::NotNumeric { .. })
        ));
    }

    #[test]
    fn text_rejects_non_string_values() {
        let record = ApplicantRecord::new().with("SSN", 123456789).with("Program", "");
        assert_eq!(
            record.text(ApplicantField::Ssn),
            Err(FieldError::NotText {
                field: ApplicantField::Ssn,
                found: "number"
            })
        );
        assert_eq!(record.text(ApplicantField::Program), Ok(""));
    }

    #[test]
    fn null_values_are_missing() {
        let record = ApplicantRecord::new().with("Income", Value::Null);
        assert_eq!(
            record.number(ApplicantField::Income),
            Err(FieldError::Missing {
                field: ApplicantField::Income
            })
        );
    }

    #[test]
    fn from_cells_keeps_first_duplicate_header() {
        let record = ApplicantRecord::from_cells(["SSN", "SSN", "Age"], ["a", "b"]);
        assert_eq!(record.get("SSN"), Some(&json!("a")));
        assert!(record.get("Age").is_none());
    }
}
