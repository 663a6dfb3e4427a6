//! Progression engine service
//!
//! Owns the validated catalog and a repository. Every mutating call for a
//! learner runs under that learner's lock as one read-modify-write: load, apply
//! the pure transformation to a copy, check invariants, save against the loaded
//! version. A version conflict reloads and recomputes.
//!
//! Repository calls may block on disk, so they run on tokio's blocking pool.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::ledger::{self, GemReason, GemTransaction, LedgerSummary};
use crate::progress::{CompletionEvent, CompletionResult, NodeStatus, ProgressSet};
use crate::rewards::XpContext;
use crate::store::{LearnerRepository, LearnerState, check_learner_id};

/// Tunables taken from [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub default_xp_context: XpContext,
    pub ledger_history_limit: usize,
    pub daily_login_bonus: u32,
    pub league_promotion_gems: u32,
    /// Extra attempts after a version conflict
    pub max_write_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_xp_context: config.default_xp_context,
            ledger_history_limit: config.ledger_history_limit,
            daily_login_bonus: config.daily_login_bonus,
            league_promotion_gems: config.league_promotion_gems,
            max_write_retries: config.max_write_retries,
        }
    }
}

type LockMap = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// A learner's lock taken out of the map; the entry is dropped with the last lease
struct LockLease<'a> {
    locks: &'a LockMap,
    learner_id: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        // One reference in the map, one here
        let unused = Arc::strong_count(&self.lock) == 2
            && locks.get(&self.learner_id).is_some_and(|l| Arc::ptr_eq(l, &self.lock));
        if unused {
            locks.remove(&self.learner_id);
        }
    }
}

/// The skill-progression engine
pub struct Engine<R> {
    catalog: Arc<Catalog>,
    repository: Arc<R>,
    settings: EngineSettings,
    /// One lock per learner with a call in flight
    locks: LockMap,
}

impl<R: LearnerRepository + 'static> Engine<R> {
    pub fn new(catalog: impl Into<Arc<Catalog>>, repository: R, settings: EngineSettings) -> Self {
        Self {
            catalog: catalog.into(),
            repository: Arc::new(repository),
            settings,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn repository(&self) -> &R {
        self.repository.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn learner_lock(&self, learner_id: &str) -> Result<LockLease<'_>> {
        let mut locks = self.locks.lock().map_err(|e| EngineError::Storage(e.to_string()))?;
        let lock = locks.entry(learner_id.to_string()).or_default().clone();
        Ok(LockLease { locks: &self.locks, learner_id: learner_id.to_string(), lock })
    }

    /// Learners whose lock is currently held or awaited
    pub fn active_learners(&self) -> usize {
        self.locks.lock().map_or(0, |locks| locks.len())
    }

    /// Run a repository call on the blocking pool
    async fn with_repository<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T> + Send + 'static,
    {
        let repository = Arc::clone(&self.repository);
        tokio::task::spawn_blocking(move || f(&repository))
            .await
            .map_err(|e| EngineError::Storage(format!("Repository task failed: {}", e)))?
    }

    /// Stored state (or a fresh one) reconciled with the catalog, plus its version
    ///
    /// The configured history limit is applied to ledgers saved under another one.
    async fn load_state(&self, learner_id: &str) -> Result<(LearnerState, u64)> {
        let id = learner_id.to_string();
        let stored = self.with_repository(move |repository| repository.load(&id)).await?;
        let history_limit = self.settings.ledger_history_limit;

        let (mut state, version) = match stored {
            Some(mut state) => {
                state.ledger.set_history_limit(history_limit);
                let version = state.version;
                (state, version)
            }
            None => (LearnerState::new(learner_id, &self.catalog, history_limit), 0),
        };
        state.reconcile(&self.catalog);
        Ok((state, version))
    }

    /// Run `op` as a serialized, all-or-nothing read-modify-write
    async fn mutate<T, F>(&self, learner_id: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&Catalog, &mut LearnerState) -> Result<T>,
    {
        check_learner_id(learner_id)?;
        let lease = self.learner_lock(learner_id)?;
        let _guard = lease.lock.lock().await;

        let mut retries = 0;
        loop {
            let (mut state, version) = self.load_state(learner_id).await?;
            let value = op(&self.catalog, &mut state)?;
            state.check_invariants(&self.catalog)?;

            let saved =
                self.with_repository(move |repository| repository.save(&state, version)).await;
            match saved {
                Ok(_) => return Ok(value),
                Err(EngineError::Conflict { expected, found, .. })
                    if retries < self.settings.max_write_retries =>
                {
                    retries += 1;
                    tracing::warn!(
                        "Write conflict for {} (expected v{}, found v{}), retry {}",
                        learner_id,
                        expected,
                        found,
                        retries
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read-only view of a learner's state
    pub async fn snapshot(&self, learner_id: &str) -> Result<LearnerState> {
        check_learner_id(learner_id)?;
        let lease = self.learner_lock(learner_id)?;
        let _guard = lease.lock.lock().await;
        Ok(self.load_state(learner_id).await?.0)
    }

    /// Process a completion event
    pub async fn complete_node(&self, event: &CompletionEvent) -> Result<CompletionResult> {
        let default_context = self.settings.default_xp_context;
        let result = self
            .mutate(&event.learner_id, |catalog, state| {
                state.apply_completion(catalog, event, default_context)
            })
            .await?;

        tracing::info!(
            "{} completed {} with {} star(s): +{} xp, +{} gems, unlocked {}",
            event.learner_id,
            result.node_id,
            result.stars,
            result.xp_earned,
            result.gems_earned,
            result.unlocked_node_ids.len()
        );
        Ok(result)
    }

    /// Mark a node as started
    pub async fn start_node(&self, learner_id: &str, node_id: &str) -> Result<NodeStatus> {
        self.mutate(learner_id, |catalog, state| state.start_node(catalog, node_id)).await
    }

    /// Credit gems
    pub async fn earn(
        &self,
        learner_id: &str,
        amount: u32,
        reason: GemReason,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        self.mutate(learner_id, |_, state| state.ledger.earn(amount, reason.clone(), timestamp))
            .await
    }

    /// Debit gems; `InsufficientFunds` leaves the ledger unchanged
    pub async fn spend(
        &self,
        learner_id: &str,
        amount: u32,
        reason: GemReason,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        let tx = self
            .mutate(learner_id, |_, state| state.ledger.spend(amount, reason.clone(), timestamp))
            .await?;
        tracing::info!("{} spent {} gems, balance {}", learner_id, amount, tx.balance_after);
        Ok(tx)
    }

    /// Pay the daily login bonus, once per calendar day
    pub async fn claim_daily_login(
        &self,
        learner_id: &str,
        today: NaiveDate,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        let amount = self.settings.daily_login_bonus;
        self.mutate(learner_id, |_, state| {
            state.claims.claim_daily_login(&mut state.ledger, today, amount, timestamp)
        })
        .await
    }

    /// Pay a streak milestone bonus
    pub async fn claim_streak_milestone(
        &self,
        learner_id: &str,
        streak_days: u32,
        today: NaiveDate,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        self.mutate(learner_id, |_, state| {
            state.claims.claim_streak_milestone(&mut state.ledger, streak_days, today, timestamp)
        })
        .await
    }

    /// Pay the league promotion reward
    pub async fn award_league_promotion(
        &self,
        learner_id: &str,
        league: &str,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        let amount = self.settings.league_promotion_gems;
        self.mutate(learner_id, |_, state| {
            ledger::bonus::award_league_promotion(&mut state.ledger, league, amount, timestamp)
        })
        .await
    }

    /// Progress snapshot for renderers
    pub async fn progress(&self, learner_id: &str) -> Result<ProgressSet> {
        Ok(self.snapshot(learner_id).await?.progress)
    }

    /// Ledger totals
    pub async fn ledger_summary(&self, learner_id: &str) -> Result<LedgerSummary> {
        Ok(self.snapshot(learner_id).await?.ledger.summary())
    }

    /// Retained transaction history, oldest first
    pub async fn transactions(&self, learner_id: &str) -> Result<Vec<GemTransaction>> {
        Ok(self.snapshot(learner_id).await?.ledger.transactions().cloned().collect())
    }
}
