//! Streak tracking with freeze semantics.
//!
//! A day is active iff at least one XP transaction exists for the user on
//! that calendar date. The tracker advances on the first transaction of
//! each new day; later same-day transactions are no-ops, so callers may
//! invoke `record_activity` once per award without double-counting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-user streak state, mutated forward-only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    /// Consecutive active days ending today or yesterday
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub freezes_available: u32,
    pub freezes_used: u32,
}

/// Which transition a streak update took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakOutcome {
    /// First active day ever
    Started,
    /// Consecutive day, streak extended
    Extended,
    /// Same calendar day (or an out-of-order earlier day), nothing to do
    AlreadyCounted,
    /// Missed exactly one day, covered by a consumed freeze
    FrozeThrough,
    /// Gap too large or no freeze left; streak restarted at 1
    Reset,
}

impl StreakRecord {
    /// Record an active day. `day` is the caller's stable "today", read
    /// once per operation (never re-read mid-calculation).
    ///
    /// A freeze forgives exactly one missed day: a gap of 2 consumes one
    /// freeze and extends; any larger gap resets even with freezes banked.
    pub fn record_activity(&mut self, day: NaiveDate) -> StreakOutcome {
        let outcome = match self.last_activity_date {
            None => {
                self.current_streak = 1;
                StreakOutcome::Started
            }
            Some(last) => match (day - last).num_days() {
                // Same day, or an out-of-order historical day: state only
                // moves forward.
                d if d <= 0 => return StreakOutcome::AlreadyCounted,
                1 => {
                    self.current_streak += 1;
                    StreakOutcome::Extended
                }
                2 if self.freezes_available > 0 => {
                    self.freezes_available -= 1;
                    self.freezes_used += 1;
                    self.current_streak += 1;
                    StreakOutcome::FrozeThrough
                }
                _ => {
                    self.current_streak = 1;
                    StreakOutcome::Reset
                }
            },
        };

        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_activity_date = Some(day);
        outcome
    }

    /// Grant freeze credits. Replenishment policy (when and how many) is
    /// external; the tracker only holds and consumes the balance.
    pub fn add_freezes(&mut self, count: u32) {
        self.freezes_available += count;
    }
}
