//! Completion workflow
//!
//! Turns a graded completion event into updated progress, rewards and unlocks.
//! Works on copies of the inputs and only returns new state once every step has
//! succeeded, so a failure leaves the caller's state untouched.

use serde::{Deserialize, Serialize};

use super::model::{NodeStatus, ProgressSet};
use super::unlock;
use crate::catalog::Catalog;
use crate::error::{EngineError, Result};
use crate::ledger::{GemLedger, GemReason, GemTransaction};
use crate::rewards::{self, XpContext};

/// A learner finished a graded activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub learner_id: String,
    pub node_id: String,
    /// Percentage, 0-100
    pub score: u32,
    /// Unix timestamp supplied by the caller
    pub timestamp: i64,
    /// XP table to apply; the engine default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<XpContext>,
}

impl CompletionEvent {
    pub fn new(
        learner_id: impl Into<String>,
        node_id: impl Into<String>,
        score: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            node_id: node_id.into(),
            score,
            timestamp,
            context: None,
        }
    }

    pub fn with_context(mut self, context: XpContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// What the caller renders after a completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub node_id: String,
    /// Stars earned by this attempt (the record keeps the best)
    pub stars: u8,
    pub xp_earned: u32,
    pub gems_earned: u32,
    pub updated_progress: ProgressSet,
    /// Nodes moved from `locked` to `current` by this event
    pub unlocked_node_ids: Vec<String>,
    pub is_new_best_score: bool,
    pub previous_best_score: u8,
    /// Ledger entry for the gems, if any were earned
    pub gem_transaction: Option<GemTransaction>,
}

/// Result plus the ledger it was posted to
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub result: CompletionResult,
    pub ledger: GemLedger,
}

/// Mark a reachable node as started (`current -> in-progress`)
///
/// Started and completed nodes are left as they are.
pub fn start_node(
    catalog: &Catalog,
    progress: &mut ProgressSet,
    node_id: &str,
) -> Result<NodeStatus> {
    catalog.require(node_id)?;

    let mut updated = progress.clone();
    updated.reconcile(catalog);
    unlock::propagate(&mut updated, catalog);

    let record = updated.record_mut(node_id);
    match record.status {
        NodeStatus::Locked => return Err(EngineError::Locked(node_id.to_string())),
        NodeStatus::Current => record.status = NodeStatus::InProgress,
        NodeStatus::InProgress | NodeStatus::Completed => {}
    }
    let status = record.status;

    *progress = updated;
    Ok(status)
}

/// Apply a completion event
pub fn complete_node(
    catalog: &Catalog,
    progress: &ProgressSet,
    ledger: &GemLedger,
    event: &CompletionEvent,
    default_context: XpContext,
) -> Result<CompletionOutcome> {
    let node = catalog.require(&event.node_id)?;
    let stars = rewards::stars_for_score(event.score)?;
    let context = event.context.unwrap_or(default_context);
    let xp_earned = rewards::xp_for_completion(node.base_xp, stars, context)?;
    let gems_earned = rewards::gems_for_stars(stars)?;

    let mut updated = progress.clone();
    updated.reconcile(catalog);
    let mut unlocked_node_ids = unlock::propagate(&mut updated, catalog);

    if updated.status(&node.id) == NodeStatus::Locked {
        return Err(EngineError::Locked(node.id.clone()));
    }

    // score <= 100 was checked by stars_for_score
    let score = event.score as u8;
    let record = updated.record_mut(&node.id);
    let previous_best_score = record.best_score;
    record.attempts += 1;
    record.best_score = record.best_score.max(score);
    record.stars = record.stars.max(stars);
    if stars > 0 {
        record.status = NodeStatus::Completed;
        record.completed_at = Some(event.timestamp);
    }

    let mut ledger = ledger.clone();
    let gem_transaction = if gems_earned > 0 {
        let reason = GemReason::node_completion(&node.id, stars);
        Some(ledger.earn(gems_earned, reason, event.timestamp)?)
    } else {
        None
    };

    unlocked_node_ids.extend(unlock::propagate(&mut updated, catalog));

    tracing::debug!(
        "Completed {} for {}: score {}, {} star(s), {} xp, {} gem(s), unlocked {:?}",
        node.id,
        event.learner_id,
        event.score,
        stars,
        xp_earned,
        gems_earned,
        unlocked_node_ids
    );

    Ok(CompletionOutcome {
        result: CompletionResult {
            node_id: node.id.clone(),
            stars,
            xp_earned,
            gems_earned,
            updated_progress: updated,
            unlocked_node_ids,
            is_new_best_score: score > previous_best_score,
            previous_best_score,
            gem_transaction,
        },
        ledger,
    })
}
