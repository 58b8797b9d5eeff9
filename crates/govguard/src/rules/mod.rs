//! Rule definitions and their flat-file storage.

mod defaults;
mod domain;
pub mod store;

pub use defaults::default_rules;
pub use domain::{
    MalformedRule, PredicateParams, Rule, RuleKind, DEFAULT_FLAGGED_SSN,
    DEFAULT_INCOME_THRESHOLD, DEFAULT_MINIMUM_AGE, DEFAULT_PROGRAM,
    DEFAULT_PROGRAM_INCOME_THRESHOLD,
};
pub(crate) use domain::json_type_name;
pub use store::{InMemoryRuleStore, JsonFileRuleStore, RuleStore, RuleStoreError};
