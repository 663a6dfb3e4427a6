//! Learner state and the repository it is persisted through
//!
//! The engine never touches storage directly. It loads a [`LearnerState`],
//! applies a pure transformation to a copy and hands the result back to a
//! [`LearnerRepository`] together with the version it started from.

pub mod file;
pub mod memory;

pub use file::FileRepository;
pub use memory::MemoryRepository;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{EngineError, Result};
use crate::ledger::{BonusClaims, GemLedger};
use crate::progress::{self, CompletionEvent, CompletionResult, NodeStatus, ProgressSet};
use crate::rewards::XpContext;

/// Everything persisted for one learner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerState {
    pub learner_id: String,
    /// Bumped by the repository on every successful save; 0 = never saved
    #[serde(default)]
    pub version: u64,
    pub progress: ProgressSet,
    pub ledger: GemLedger,
    #[serde(default)]
    pub claims: BonusClaims,
    /// XP earned across all completions
    #[serde(default)]
    pub total_xp: u64,
}

impl LearnerState {
    /// State for a learner with no history
    pub fn new(learner_id: impl Into<String>, catalog: &Catalog, history_limit: usize) -> Self {
        Self {
            learner_id: learner_id.into(),
            version: 0,
            progress: ProgressSet::initial(catalog),
            ledger: GemLedger::with_history_limit(history_limit),
            claims: BonusClaims::default(),
            total_xp: 0,
        }
    }

    /// Apply a completion event; on error the state is unchanged
    pub fn apply_completion(
        &mut self,
        catalog: &Catalog,
        event: &CompletionEvent,
        default_context: XpContext,
    ) -> Result<CompletionResult> {
        if event.learner_id != self.learner_id {
            return Err(EngineError::InvalidInput(format!(
                "event for learner {} applied to {}",
                event.learner_id, self.learner_id
            )));
        }

        let outcome =
            progress::complete_node(catalog, &self.progress, &self.ledger, event, default_context)?;
        self.progress = outcome.result.updated_progress.clone();
        self.ledger = outcome.ledger;
        self.total_xp += u64::from(outcome.result.xp_earned);
        Ok(outcome.result)
    }

    /// Mark a node as started
    pub fn start_node(&mut self, catalog: &Catalog, node_id: &str) -> Result<NodeStatus> {
        progress::start_node(catalog, &mut self.progress, node_id)
    }

    /// Bring records in line with the catalog (new nodes, newly met prerequisites)
    pub fn reconcile(&mut self, catalog: &Catalog) -> Vec<String> {
        self.progress.reconcile(catalog);
        progress::propagate(&mut self.progress, catalog)
    }

    /// Verify progress and ledger invariants
    pub fn check_invariants(&self, catalog: &Catalog) -> Result<()> {
        self.progress.check_invariants(catalog)?;
        self.ledger.verify()
    }

    /// Rebuild a learner's state from their completion history
    ///
    /// The same history always yields the same state.
    pub fn replay(
        learner_id: &str,
        catalog: &Catalog,
        events: &[CompletionEvent],
        default_context: XpContext,
        history_limit: usize,
    ) -> Result<Self> {
        let mut state = Self::new(learner_id, catalog, history_limit);
        for event in events {
            state.apply_completion(catalog, event, default_context)?;
        }
        Ok(state)
    }
}

/// Persistence for learner state
///
/// `save` must only succeed when the stored version still equals
/// `expected_version`; otherwise it reports [`EngineError::Conflict`].
pub trait LearnerRepository: Send + Sync {
    /// Load a learner's state, `None` if never saved
    fn load(&self, learner_id: &str) -> Result<Option<LearnerState>>;

    /// Store `state`, returning the new version
    fn save(&self, state: &LearnerState, expected_version: u64) -> Result<u64>;
}

/// Reject learner ids that are empty or unsafe as a file name
pub fn check_learner_id(learner_id: &str) -> Result<()> {
    let valid = !learner_id.is_empty()
        && learner_id.len() <= 128
        && !learner_id.starts_with('.')
        && learner_id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidInput(format!("invalid learner id {:?}", learner_id)))
    }
}
