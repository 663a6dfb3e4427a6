//! Gem transaction types

use serde::{Deserialize, Serialize};

/// Direction of a gem transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Earn,
    Spend,
}

/// What a transaction was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GemCategory {
    NodeCompletion,
    DailyLogin,
    StreakMilestone,
    LeaguePromotion,
    Purchase,
    Manual,
}

/// Category tag plus a human-readable description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemReason {
    pub category: GemCategory,
    pub description: String,
}

impl GemReason {
    pub fn new(category: GemCategory, description: impl Into<String>) -> Self {
        Self { category, description: description.into() }
    }

    pub fn node_completion(node_id: &str, stars: u8) -> Self {
        Self::new(
            GemCategory::NodeCompletion,
            format!("Completed {} with {} star(s)", node_id, stars),
        )
    }

    pub fn daily_login() -> Self {
        Self::new(GemCategory::DailyLogin, "Daily login bonus")
    }

    pub fn streak_milestone(days: u32) -> Self {
        Self::new(GemCategory::StreakMilestone, format!("{}-day streak", days))
    }

    pub fn league_promotion(league: &str) -> Self {
        Self::new(GemCategory::LeaguePromotion, format!("Promoted to {}", league))
    }

    pub fn purchase(item: &str) -> Self {
        Self::new(GemCategory::Purchase, format!("Bought {}", item))
    }
}

/// An immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemTransaction {
    /// Per-learner sequence number, starting at 1
    pub id: u64,
    pub kind: TransactionKind,
    /// Always positive
    pub amount: u32,
    pub reason: GemReason,
    /// Unix timestamp
    pub timestamp: i64,
    /// Running balance once this entry is applied
    pub balance_after: u64,
}

/// Totals for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_earned: u64,
    pub total_spent: u64,
    pub balance: u64,
    /// Transactions ever recorded, including pruned ones
    pub transaction_count: u64,
}
