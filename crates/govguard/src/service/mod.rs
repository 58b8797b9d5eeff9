//! Scoring service shared by the CLI and the HTTP API.

mod router;

pub use router::{scoring_router, BulkScoreRequest, BulkScoreResponse, ScoredRowView};

use std::io::Read;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::rules::{Rule, RuleStore, RuleStoreError};
use crate::scoring::{
    ApplicantRecord, BulkDataset, BulkError, ScoredDataset, ScoringEngine, ScoringResult,
};

/// Owns the rule store and the engine built from its current contents.
///
/// Rules are read once at construction; `replace_rules` writes through to the
/// store before the in-memory snapshot is swapped.
pub struct RiskScoringService<S> {
    store: Arc<S>,
    engine: RwLock<Arc<ScoringEngine>>,
}

impl<S> RiskScoringService<S>
where
    S: RuleStore + 'static,
{
    pub fn load(store: Arc<S>) -> Result<Self, ServiceError> {
        let rules = store.load()?;
        Ok(Self {
            store,
            engine: RwLock::new(Arc::new(ScoringEngine::new(rules))),
        })
    }

    pub fn engine(&self) -> Result<Arc<ScoringEngine>, ServiceError> {
        let guard = self.engine.read().map_err(|_| ServiceError::Poisoned)?;
        Ok(Arc::clone(&guard))
    }

    pub fn rules(&self) -> Result<Vec<Rule>, ServiceError> {
        Ok(self.engine()?.rules().to_vec())
    }

    /// Persist a full replacement rule set, then make it current.
    pub fn replace_rules(&self, rules: Vec<Rule>) -> Result<Vec<Rule>, ServiceError> {
        self.store.save(&rules)?;
        let mut guard = self.engine.write().map_err(|_| ServiceError::Poisoned)?;
        *guard = Arc::new(ScoringEngine::new(rules.clone()));
        info!(count = rules.len(), "rule set replaced");
        Ok(rules)
    }

    /// Re-read the store, discarding the current snapshot.
    pub fn reload(&self) -> Result<usize, ServiceError> {
        let rules = self.store.load()?;
        let count = rules.len();
        let mut guard = self.engine.write().map_err(|_| ServiceError::Poisoned)?;
        *guard = Arc::new(ScoringEngine::new(rules));
        Ok(count)
    }

    pub fn score_applicant(
        &self,
        applicant: &ApplicantRecord,
    ) -> Result<ScoringResult, ServiceError> {
        Ok(self.engine()?.score(applicant))
    }

    pub fn score_csv<R: Read>(&self, reader: R) -> Result<ScoredDataset, ServiceError> {
        let dataset = BulkDataset::from_reader(reader)?;
        let engine = self.engine()?;
        Ok(dataset.score(&engine))
    }
}

/// Error raised by the scoring service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] RuleStoreError),
    #[error(transparent)]
    Bulk(#[from] BulkError),
    #[error("rule snapshot lock poisoned")]
    Poisoned,
}
