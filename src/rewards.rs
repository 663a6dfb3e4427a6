//! Reward calculation
//!
//! Pure functions mapping a quiz score to stars, and stars to XP and gems.
//! Inputs outside their domain are rejected rather than clamped so that upstream
//! bugs surface in tests.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Highest accepted quiz score
pub const MAX_SCORE: u32 = 100;

/// Highest star rating
pub const MAX_STARS: u8 = 3;

/// Minimum score for each star rating, highest first
const STAR_THRESHOLDS: [(u32, u8); 3] = [(90, 3), (75, 2), (60, 1)];

/// Gems awarded per star rating (index = stars)
const GEMS_BY_STARS: [u32; 4] = [0, 3, 5, 10];

/// Streak lengths that pay a one-off gem bonus
pub const STREAK_MILESTONES: [(u32, u32); 5] = [(3, 5), (7, 15), (14, 30), (30, 75), (100, 250)];

/// Which XP multiplier table applies to a completion
///
/// The two contexts historically carried different tables for the same
/// stars-to-XP mapping. Both are kept and the caller picks one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XpContext {
    /// Finishing a whole module: 0.5 / 0.75 / 1.0 / 1.25
    #[default]
    ModuleCompletion,
    /// Passing a node-level quiz: 0.5 / 1.0 / 1.25 / 1.5
    NodeQuiz,
}

impl XpContext {
    /// Multiplier for a star rating, expressed in quarters
    fn quarters(self, stars: u8) -> u64 {
        let table: [u64; 4] = match self {
            XpContext::ModuleCompletion => [2, 3, 4, 5],
            XpContext::NodeQuiz => [2, 4, 5, 6],
        };
        table[stars as usize]
    }
}

fn check_stars(stars: u8) -> Result<()> {
    if stars > MAX_STARS {
        return Err(EngineError::InvalidInput(format!(
            "stars must be 0-{}, got {}",
            MAX_STARS, stars
        )));
    }
    Ok(())
}

/// Convert a score percentage into a 0-3 star rating
pub fn stars_for_score(score: u32) -> Result<u8> {
    if score > MAX_SCORE {
        return Err(EngineError::InvalidInput(format!(
            "score must be 0-{}, got {}",
            MAX_SCORE, score
        )));
    }

    Ok(STAR_THRESHOLDS.iter().find(|(min, _)| score >= *min).map_or(0, |(_, stars)| *stars))
}

/// XP for a completion: `round(base_xp * multiplier[stars])`, halves rounding up
pub fn xp_for_completion(base_xp: u32, stars: u8, context: XpContext) -> Result<u32> {
    check_stars(stars)?;
    let scaled = (u64::from(base_xp) * context.quarters(stars) + 2) / 4;
    u32::try_from(scaled)
        .map_err(|_| EngineError::InvalidInput(format!("xp overflow for base {}", base_xp)))
}

/// Gems awarded for a star rating
pub fn gems_for_stars(stars: u8) -> Result<u32> {
    check_stars(stars)?;
    Ok(GEMS_BY_STARS[stars as usize])
}

/// Gems paid when a streak reaches a milestone length, if it is one
pub fn streak_milestone_gems(days: u32) -> Option<u32> {
    STREAK_MILESTONES.iter().find(|(milestone, _)| *milestone == days).map(|(_, gems)| *gems)
}
