//! Level calculator: pure functions from total XP to level and progress.
//!
//! The curve is `level = floor(sqrt(xp / 100))` clamped to a minimum of 1,
//! so `threshold(L) = L^2 * 100`. It is a policy function, not a law; keep
//! callers on `level_for_xp`/`xp_threshold` so the curve can change in one
//! place.

use serde::{Deserialize, Serialize};

/// Total XP required to reach `level`
pub fn xp_threshold(level: u32) -> u64 {
    (level as u64) * (level as u64) * 100
}

/// Level for a given XP total, clamped to a minimum of 1.
///
/// Level 1 is the floor: users below `threshold(1)` (0..=99 XP) still
/// report level 1.
pub fn level_for_xp(total_xp: u64) -> u32 {
    let level = ((total_xp as f64) / 100.0).sqrt().floor() as u32;
    level.max(1)
}

/// Derived progression state. Recomputed from the ledger on every read;
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionSnapshot {
    pub total_xp: u64,
    pub current_level: u32,
    pub xp_into_level: u64,
    pub xp_to_next_level: u64,
    /// 0-100
    pub progress_percentage: u8,
}

/// Compute the snapshot for a total. Deterministic and side-effect-free.
pub fn snapshot_for_xp(total_xp: u64) -> ProgressionSnapshot {
    let current_level = level_for_xp(total_xp);
    let floor = xp_threshold(current_level);
    let ceiling = xp_threshold(current_level + 1);
    // Saturates in the sub-100 zone where level 1 is the floor.
    let xp_into_level = total_xp.saturating_sub(floor);
    let xp_to_next_level = ceiling - floor;
    let pct = (100.0 * xp_into_level as f64 / xp_to_next_level as f64).round();
    let progress_percentage = pct.clamp(0.0, 100.0) as u8;

    ProgressionSnapshot {
        total_xp,
        current_level,
        xp_into_level,
        xp_to_next_level,
        progress_percentage,
    }
}

/// Display title for a level bucket
pub fn level_title(level: u32) -> &'static str {
    match level {
        0..=2 => "Apprentice Engineer",
        3..=5 => "Junior Builder",
        6..=9 => "Practicing Engineer",
        10..=14 => "Senior Engineer",
        15..=19 => "Staff Engineer",
        20..=29 => "Principal Architect",
        _ => "Grandmaster Engineer",
    }
}
