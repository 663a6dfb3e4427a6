//! Periodic gem bonuses
//!
//! Login bonuses and streak milestones are ordinary `earn` transactions guarded
//! by a calendar-day check. The guard state lives beside the ledger, not in it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::GemLedger;
use super::model::{GemReason, GemTransaction};
use crate::error::{EngineError, Result};
use crate::rewards::streak_milestone_gems;

/// Last-claim dates for day-guarded bonuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusClaims {
    /// Day the login bonus was last paid
    pub last_login_claim: Option<NaiveDate>,
    /// Day and length of the last paid streak milestone
    pub last_streak_claim: Option<(NaiveDate, u32)>,
}

impl BonusClaims {
    /// Has the login bonus been paid today?
    pub fn login_claimed_on(&self, today: NaiveDate) -> bool {
        self.last_login_claim == Some(today)
    }

    /// Pay the daily login bonus once per calendar day
    pub fn claim_daily_login(
        &mut self,
        ledger: &mut GemLedger,
        today: NaiveDate,
        amount: u32,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        if self.login_claimed_on(today) {
            return Err(EngineError::AlreadyClaimed(format!("daily login bonus for {}", today)));
        }

        let tx = ledger.earn(amount, GemReason::daily_login(), timestamp)?;
        self.last_login_claim = Some(today);
        Ok(tx)
    }

    /// Pay a streak milestone bonus
    ///
    /// `streak_days` must be a milestone length. The same milestone cannot be
    /// claimed twice on one day.
    pub fn claim_streak_milestone(
        &mut self,
        ledger: &mut GemLedger,
        streak_days: u32,
        today: NaiveDate,
        timestamp: i64,
    ) -> Result<GemTransaction> {
        let amount = streak_milestone_gems(streak_days).ok_or_else(|| {
            EngineError::InvalidInput(format!("{} days is not a streak milestone", streak_days))
        })?;

        if self.last_streak_claim == Some((today, streak_days)) {
            return Err(EngineError::AlreadyClaimed(format!(
                "{}-day streak milestone for {}",
                streak_days, today
            )));
        }

        let tx = ledger.earn(amount, GemReason::streak_milestone(streak_days), timestamp)?;
        self.last_streak_claim = Some((today, streak_days));
        Ok(tx)
    }
}

/// Pay the league promotion reward
pub fn award_league_promotion(
    ledger: &mut GemLedger,
    league: &str,
    amount: u32,
    timestamp: i64,
) -> Result<GemTransaction> {
    if league.trim().is_empty() {
        return Err(EngineError::InvalidInput("league name is empty".into()));
    }
    ledger.earn(amount, GemReason::league_promotion(league), timestamp)
}
