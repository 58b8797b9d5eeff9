use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const DEFAULT_FLAGGED_SSN: &str = "123-45-6789";
pub const DEFAULT_INCOME_THRESHOLD: f64 = 50_000.0;
pub const DEFAULT_MINIMUM_AGE: i64 = 18;
pub const DEFAULT_PROGRAM: &str = "SNAP";
pub const DEFAULT_PROGRAM_INCOME_THRESHOLD: f64 = 2_500.0;

/// Closed set of predicates a rule can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    DuplicateSsn,
    HighIncome,
    Underage,
    ProgramMismatch,
}

impl RuleKind {
    /// Evaluation order used when a description selects several predicates.
    pub const fn ordered() -> [Self; 4] {
        [
            Self::DuplicateSsn,
            Self::HighIncome,
            Self::Underage,
            Self::ProgramMismatch,
        ]
    }

    /// Substring that selects this predicate in rule files without an explicit `Kind`.
    pub const fn marker(self) -> &'static str {
        match self {
            Self::DuplicateSsn => "Duplicate SSN",
            Self::HighIncome => "High income",
            Self::Underage => "Underage",
            Self::ProgramMismatch => "Program mismatch",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::DuplicateSsn => "Duplicate SSN",
            Self::HighIncome => "High Income",
            Self::Underage => "Underage Applicant",
            Self::ProgramMismatch => "Program Mismatch",
        }
    }

    /// Every predicate whose marker appears in `description`, in evaluation order.
    pub fn detect(description: &str) -> Vec<Self> {
        Self::ordered()
            .into_iter()
            .filter(|kind| description.contains(kind.marker()))
            .collect()
    }
}

/// Comparison operands for the predicates. Unset values fall back to the
/// historical literals so older rule files keep their behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredicateParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged_ssn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_income_threshold: Option<f64>,
}

impl PredicateParams {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn flagged_ssn(&self) -> &str {
        self.flagged_ssn.as_deref().unwrap_or(DEFAULT_FLAGGED_SSN)
    }

    pub fn income_threshold(&self) -> f64 {
        self.income_threshold.unwrap_or(DEFAULT_INCOME_THRESHOLD)
    }

    pub fn minimum_age(&self) -> i64 {
        self.minimum_age.unwrap_or(DEFAULT_MINIMUM_AGE)
    }

    pub fn program(&self) -> &str {
        self.program.as_deref().unwrap_or(DEFAULT_PROGRAM)
    }

    pub fn program_income_threshold(&self) -> f64 {
        self.program_income_threshold
            .unwrap_or(DEFAULT_PROGRAM_INCOME_THRESHOLD)
    }
}

/// One fraud heuristic as stored in the rule file.
///
/// The three historical fields are kept as raw JSON so that a malformed entry
/// still loads and saves unchanged; problems surface through the accessors
/// when the rule is evaluated. Keys this crate does not interpret travel in
/// `extra`, and an entry that is not a JSON object at all is held in `raw`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub description: Option<Value>,
    pub enabled: Option<Value>,
    pub score_weight: Option<Value>,
    pub kind: Option<RuleKind>,
    pub params: PredicateParams,
    pub extra: Map<String, Value>,
    pub raw: Option<Value>,
}

#[derive(Deserialize)]
struct StoredRule {
    #[serde(rename = "Description", default)]
    description: Option<Value>,
    #[serde(rename = "Enabled", default)]
    enabled: Option<Value>,
    #[serde(rename = "Score_Weight", default)]
    score_weight: Option<Value>,
    #[serde(rename = "Kind", default)]
    kind: Option<RuleKind>,
    #[serde(rename = "Params", default)]
    params: PredicateParams,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize)]
struct StoredRuleRef<'a> {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    description: Option<&'a Value>,
    #[serde(rename = "Enabled", skip_serializing_if = "Option::is_none")]
    enabled: Option<&'a Value>,
    #[serde(rename = "Score_Weight", skip_serializing_if = "Option::is_none")]
    score_weight: Option<&'a Value>,
    #[serde(rename = "Kind", skip_serializing_if = "Option::is_none")]
    kind: Option<RuleKind>,
    #[serde(rename = "Params", skip_serializing_if = "PredicateParams::is_empty")]
    params: &'a PredicateParams,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(raw) = &self.raw {
            return raw.serialize(serializer);
        }
        StoredRuleRef {
            description: self.description.as_ref(),
            enabled: self.enabled.as_ref(),
            score_weight: self.score_weight.as_ref(),
            kind: self.kind,
            params: &self.params,
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            entry @ Value::Object(_) => {
                let stored: StoredRule = serde_json::from_value(entry).map_err(de::Error::custom)?;
                Ok(Self {
                    description: stored.description,
                    enabled: stored.enabled,
                    score_weight: stored.score_weight,
                    kind: stored.kind,
                    params: stored.params,
                    extra: stored.extra,
                    raw: None,
                })
            }
            other => Ok(Self {
                raw: Some(other),
                ..Self::default()
            }),
        }
    }
}

impl Rule {
    /// Enabled rule with the given label and weight; predicates come from the label's markers.
    pub fn new(description: impl Into<String>, score_weight: f64) -> Self {
        Self {
            description: Some(Value::String(description.into())),
            enabled: Some(Value::Bool(true)),
            score_weight: Some(weight_value(score_weight)),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: RuleKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_params(mut self, params: PredicateParams) -> Self {
        self.params = params;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.set_enabled(false);
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = Some(Value::Bool(enabled));
    }

    pub fn set_score_weight(&mut self, score_weight: f64) {
        self.score_weight = Some(weight_value(score_weight));
    }

    fn check_entry(&self) -> Result<(), MalformedRule> {
        match &self.raw {
            Some(raw) => Err(MalformedRule::NotAnObject(json_type_name(raw))),
            None => Ok(()),
        }
    }

    pub fn is_enabled(&self) -> Result<bool, MalformedRule> {
        self.check_entry()?;
        match &self.enabled {
            Some(Value::Bool(enabled)) => Ok(*enabled),
            Some(other) => Err(MalformedRule::invalid("Enabled", "a boolean", other)),
            None => Err(MalformedRule::MissingField("Enabled")),
        }
    }

    pub fn description(&self) -> Result<&str, MalformedRule> {
        self.check_entry()?;
        match &self.description {
            Some(Value::String(text)) => Ok(text),
            Some(other) => Err(MalformedRule::invalid("Description", "a string", other)),
            None => Err(MalformedRule::MissingField("Description")),
        }
    }

    pub fn score_weight(&self) -> Result<f64, MalformedRule> {
        self.check_entry()?;
        match &self.score_weight {
            Some(value @ Value::Number(number)) => number
                .as_f64()
                .ok_or_else(|| MalformedRule::invalid("Score_Weight", "a number", value)),
            Some(other) => Err(MalformedRule::invalid("Score_Weight", "a number", other)),
            None => Err(MalformedRule::MissingField("Score_Weight")),
        }
    }

    /// Predicates this rule runs: the explicit `Kind`, or every marker found in the description.
    pub fn predicates(&self) -> Result<Vec<RuleKind>, MalformedRule> {
        match self.kind {
            Some(kind) => Ok(vec![kind]),
            None => Ok(RuleKind::detect(self.description()?)),
        }
    }

    /// Best-effort label for listings, tolerant of malformed entries.
    pub fn display_label(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.to_string();
        }
        match &self.description {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "<missing description>".to_string(),
        }
    }
}

fn weight_value(score_weight: f64) -> Value {
    if score_weight.fract() == 0.0 && score_weight.abs() < i64::MAX as f64 {
        Value::from(score_weight as i64)
    } else {
        Value::from(score_weight)
    }
}

/// A rule entry that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRule {
    #[error("rule entry must be an object, found {0}")]
    NotAnObject(&'static str),
    #[error("rule is missing the `{0}` field")]
    MissingField(&'static str),
    #[error("rule field `{field}` must be {expected}, found {found}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
        found: String,
    },
}

impl MalformedRule {
    fn invalid(field: &'static str, expected: &'static str, value: &Value) -> Self {
        Self::InvalidField {
            field,
            expected,
            found: json_type_name(value).to_string(),
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
