use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, info};

use super::defaults::default_rules;
use super::domain::Rule;

/// Storage abstraction for the ordered rule set.
pub trait RuleStore: Send + Sync {
    /// Read the full rule set, preserving order.
    fn load(&self) -> Result<Vec<Rule>, RuleStoreError>;
    /// Overwrite the stored rule set with `rules`.
    fn save(&self, rules: &[Rule]) -> Result<(), RuleStoreError>;
}

/// Error enumeration for rule store failures.
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error("failed to access rule file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rule file {} is not a JSON array of rules: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode rules: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}

/// Rule file on disk: a JSON array of rule objects, pretty-printed with four-space indentation.
#[derive(Debug, Clone)]
pub struct JsonFileRuleStore {
    path: PathBuf,
}

impl JsonFileRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the default rule set unless the file already exists. Returns whether it wrote.
    pub fn initialize(&self, overwrite: bool) -> Result<bool, RuleStoreError> {
        if self.path.exists() && !overwrite {
            debug!(path = %self.path.display(), "rule file already present");
            return Ok(false);
        }
        self.save(&default_rules())?;
        Ok(true)
    }

    fn io_error(&self, source: std::io::Error) -> RuleStoreError {
        RuleStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RuleStore for JsonFileRuleStore {
    fn load(&self) -> Result<Vec<Rule>, RuleStoreError> {
        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        let rules: Vec<Rule> =
            serde_json::from_str(&content).map_err(|source| RuleStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), count = rules.len(), "loaded rule set");
        Ok(rules)
    }

    fn save(&self, rules: &[Rule]) -> Result<(), RuleStoreError> {
        let encoded = encode_rules(rules)?;
        fs::write(&self.path, encoded).map_err(|source| self.io_error(source))?;
        info!(path = %self.path.display(), count = rules.len(), "saved rule set");
        Ok(())
    }
}

fn encode_rules(rules: &[Rule]) -> Result<Vec<u8>, RuleStoreError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    rules
        .serialize(&mut serializer)
        .map_err(RuleStoreError::Encode)?;
    Ok(buffer)
}

/// Process-local store, handy for tests and file-less deployments.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: Mutex<Vec<Rule>>,
}

impl InMemoryRuleStore {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }
}

impl RuleStore for InMemoryRuleStore {
    fn load(&self) -> Result<Vec<Rule>, RuleStoreError> {
        let guard = self
            .rules
            .lock()
            .map_err(|_| RuleStoreError::Unavailable("rule mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, rules: &[Rule]) -> Result<(), RuleStoreError> {
        let mut guard = self
            .rules
            .lock()
            .map_err(|_| RuleStoreError::Unavailable("rule mutex poisoned".to_string()))?;
        *guard = rules.to_vec();
        Ok(())
    }
}
