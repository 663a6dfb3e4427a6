//! Gem currency ledger
//!
//! An append-only log of earn/spend transactions with running totals kept
//! alongside it. The log may be pruned to a bounded history; the totals are
//! never derived from the pruned log, so pruning cannot change the balance.

pub mod bonus;
pub mod model;

pub use bonus::BonusClaims;
pub use model::{GemCategory, GemReason, GemTransaction, LedgerSummary, TransactionKind};

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default number of transactions kept in history
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// One learner's gem ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemLedger {
    /// Retained history, oldest first
    transactions: VecDeque<GemTransaction>,
    balance: u64,
    total_earned: u64,
    total_spent: u64,
    /// Transactions ever recorded; also the last issued id
    transaction_count: u64,
    #[serde(default = "default_history_limit")]
    history_limit: usize,
}

impl Default for GemLedger {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl GemLedger {
    /// Empty ledger keeping at most `history_limit` entries (minimum 1)
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            transactions: VecDeque::new(),
            balance: 0,
            total_earned: 0,
            total_spent: 0,
            transaction_count: 0,
            history_limit: history_limit.max(1),
        }
    }

    /// Rebuild a ledger from a complete, unpruned log
    pub fn replay(transactions: &[GemTransaction], history_limit: usize) -> Result<Self> {
        let mut ledger = Self::with_history_limit(history_limit);
        for tx in transactions {
            let applied = match tx.kind {
                TransactionKind::Earn => ledger.earn(tx.amount, tx.reason.clone(), tx.timestamp)?,
                TransactionKind::Spend => ledger.spend(tx.amount, tx.reason.clone(), tx.timestamp)?,
            };
            if applied.balance_after != tx.balance_after {
                return Err(EngineError::DataIntegrity(format!(
                    "transaction {} records balance {} but replays to {}",
                    tx.id, tx.balance_after, applied.balance_after
                )));
            }
        }
        Ok(ledger)
    }

    /// Add gems
    pub fn earn(
        &mut self,
        amount: u32,
        reason: GemReason,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        if amount == 0 {
            return Err(EngineError::InvalidInput("earn amount must be positive".into()));
        }

        let balance_after = self.balance + u64::from(amount);
        self.total_earned += u64::from(amount);
        Ok(self.append(TransactionKind::Earn, amount, reason, timestamp, balance_after))
    }

    /// Remove gems, or fail with `InsufficientFunds` leaving the ledger untouched
    pub fn spend(
        &mut self,
        amount: u32,
        reason: GemReason,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        if amount == 0 {
            return Err(EngineError::InvalidInput("spend amount must be positive".into()));
        }
        if self.balance < u64::from(amount) {
            tracing::debug!("Rejected spend of {} with balance {}", amount, self.balance);
            return Err(EngineError::InsufficientFunds { requested: amount, balance: self.balance });
        }

        let balance_after = self.balance - u64::from(amount);
        self.total_spent += u64::from(amount);
        Ok(self.append(TransactionKind::Spend, amount, reason, timestamp, balance_after))
    }

    fn append(
        &mut self,
        kind: TransactionKind,
        amount: u32,
        reason: GemReason,
        timestamp: i64,
        balance_after: u64,
    ) -> GemTransaction {
        self.transaction_count += 1;
        self.balance = balance_after;

        let tx = GemTransaction {
            id: self.transaction_count,
            kind,
            amount,
            reason,
            timestamp,
            balance_after,
        };
        self.transactions.push_back(tx.clone());
        while self.transactions.len() > self.history_limit {
            self.transactions.pop_front();
        }
        tx
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            total_earned: self.total_earned,
            total_spent: self.total_spent,
            balance: self.balance,
            transaction_count: self.transaction_count,
        }
    }

    /// Retained history, oldest first
    pub fn transactions(&self) -> impl Iterator<Item = &GemTransaction> {
        self.transactions.iter()
    }

    /// Most recent transactions, newest first
    pub fn recent(&self, limit: usize) -> Vec<&GemTransaction> {
        self.transactions.iter().rev().take(limit).collect()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Change the retained history size, pruning the oldest entries if needed
    ///
    /// Totals and balance are unaffected.
    pub fn set_history_limit(&mut self, history_limit: usize) {
        self.history_limit = history_limit.max(1);
        while self.transactions.len() > self.history_limit {
            self.transactions.pop_front();
        }
    }

    /// Check the retained log is a consistent chain ending at the running balance
    pub fn verify(&self) -> Result<()> {
        if self.total_earned < self.total_spent
            || self.total_earned - self.total_spent != self.balance
        {
            return Err(EngineError::DataIntegrity(format!(
                "ledger totals earned {} spent {} do not match balance {}",
                self.total_earned, self.total_spent, self.balance
            )));
        }

        let mut previous: Option<&GemTransaction> = None;
        for tx in &self.transactions {
            if tx.amount == 0 {
                return Err(EngineError::DataIntegrity(format!(
                    "transaction {} has zero amount",
                    tx.id
                )));
            }
            if let Some(prev) = previous {
                let expected = match tx.kind {
                    TransactionKind::Earn => prev.balance_after.checked_add(u64::from(tx.amount)),
                    TransactionKind::Spend => prev.balance_after.checked_sub(u64::from(tx.amount)),
                };
                if tx.id != prev.id + 1 || expected != Some(tx.balance_after) {
                    return Err(EngineError::DataIntegrity(format!(
                        "transaction {} does not follow transaction {}",
                        tx.id, prev.id
                    )));
                }
            }
            previous = Some(tx);
        }

        if let Some(last) = previous {
            if last.balance_after != self.balance || last.id != self.transaction_count {
                return Err(EngineError::DataIntegrity(format!(
                    "last transaction {} disagrees with running balance {}",
                    last.id, self.balance
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn manual() -> GemReason {
        GemReason::new(GemCategory::Manual, "test")
    }

    #[test]
    fn earn_and_spend_track_balance() {
        let mut ledger = GemLedger::default();
        let tx = ledger.earn(30, manual(), 1).unwrap();
        assert_eq!(tx.id, 1);
        assert_eq!(tx.balance_after, 30);

        let tx = ledger.spend(12, GemReason::purchase("streak freeze"), 2).unwrap();
        assert_eq!(tx.kind, TransactionKind::Spend);
        assert_eq!(tx.balance_after, 18);

        assert_eq!(
            ledger.summary(),
            LedgerSummary { total_earned: 30, total_spent: 12, balance: 18, transaction_count: 2 }
        );
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn overspend_is_rejected_without_recording() {
        let mut ledger = GemLedger::default();
        ledger.earn(30, manual(), 1).unwrap();
        let before = ledger.clone();

        let err = ledger.spend(50, GemReason::purchase("boost"), 2).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { requested: 50, balance: 30 }));
        assert_eq!(ledger, before);
        assert_eq!(ledger.balance(), 30);
    }

    #[test]
    fn zero_amounts_are_rejected() {
        let mut ledger = GemLedger::default();
        assert!(matches!(ledger.earn(0, manual(), 1), Err(EngineError::InvalidInput(_))));
        assert!(matches!(ledger.spend(0, manual(), 1), Err(EngineError::InvalidInput(_))));
        assert_eq!(ledger.summary().transaction_count, 0);
    }

    #[test]
    fn pruning_keeps_balance() {
        let mut ledger = GemLedger::with_history_limit(3);
        for i in 0..10 {
            ledger.earn(5, manual(), i).unwrap();
        }
        ledger.spend(7, manual(), 11).unwrap();

        assert_eq!(ledger.transactions().count(), 3);
        assert_eq!(ledger.balance(), 43);
        assert_eq!(ledger.summary().transaction_count, 11);
        assert_eq!(ledger.transactions().next().unwrap().id, 9);
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn shrinking_history_limit_prunes_oldest() {
        let mut ledger = GemLedger::with_history_limit(10);
        for i in 0..6 {
            ledger.earn(2, manual(), i).unwrap();
        }

        ledger.set_history_limit(2);
        assert_eq!(ledger.history_limit(), 2);
        let ids: Vec<u64> = ledger.transactions().map(|t| t.id).collect();
        assert_eq!(ids, vec![5, 6]);
        assert_eq!(ledger.balance(), 12);
        assert_eq!(ledger.summary().transaction_count, 6);
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn recent_is_newest_first() {
        let mut ledger = GemLedger::default();
        ledger.earn(1, manual(), 1).unwrap();
        ledger.earn(2, manual(), 2).unwrap();
        let recent: Vec<u32> = ledger.recent(5).iter().map(|t| t.amount).collect();
        assert_eq!(recent, vec![2, 1]);
    }

    #[test]
    fn replay_rebuilds_full_log() {
        let mut ledger = GemLedger::default();
        ledger.earn(10, manual(), 1).unwrap();
        ledger.spend(4, manual(), 2).unwrap();
        ledger.earn(3, manual(), 3).unwrap();

        let log: Vec<GemTransaction> = ledger.transactions().cloned().collect();
        let rebuilt = GemLedger::replay(&log, DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(rebuilt, ledger);
    }

    #[test]
    fn replay_detects_tampered_balance() {
        let mut ledger = GemLedger::default();
        ledger.earn(10, manual(), 1).unwrap();
        let mut log: Vec<GemTransaction> = ledger.transactions().cloned().collect();
        log[0].balance_after = 99;

        assert!(GemLedger::replay(&log, DEFAULT_HISTORY_LIMIT).is_err());
    }

    proptest! {
        #[test]
        fn balance_is_conserved(
            ops in proptest::collection::vec((any::<bool>(), 1u32..100), 0..60),
        ) {
            let mut ledger = GemLedger::with_history_limit(16);
            let mut earned = 0u64;
            let mut spent = 0u64;

            for (i, (is_earn, amount)) in ops.into_iter().enumerate() {
                if is_earn {
                    ledger.earn(amount, manual(), i as i64).unwrap();
                    earned += u64::from(amount);
                } else if ledger.spend(amount, manual(), i as i64).is_ok() {
                    spent += u64::from(amount);
                }
            }

            prop_assert_eq!(ledger.balance(), earned - spent);
            let summary = ledger.summary();
            prop_assert_eq!(summary.total_earned, earned);
            prop_assert_eq!(summary.total_spent, spent);
            prop_assert!(ledger.verify().is_ok());
        }
    }
}
