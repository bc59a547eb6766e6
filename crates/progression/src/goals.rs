//! Learning goals with monotonic, clamped progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a goal counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    LessonCount,
    QuizCount,
    ChallengeCount,
    StudyMinutes,
    XpEarned,
}

impl std::fmt::Display for GoalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LessonCount => write!(f, "lesson_count"),
            Self::QuizCount => write!(f, "quiz_count"),
            Self::ChallengeCount => write!(f, "challenge_count"),
            Self::StudyMinutes => write!(f, "study_minutes"),
            Self::XpEarned => write!(f, "xp_earned"),
        }
    }
}

/// A user's active goal for one kind. `current_value` only moves toward
/// `target_value` and never past it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningGoal {
    pub id: String,
    pub kind: GoalKind,
    pub current_value: u32,
    pub target_value: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LearningGoal {
    pub fn new(id: &str, kind: GoalKind, target_value: u32) -> Self {
        Self {
            id: id.to_string(),
            kind,
            current_value: 0,
            target_value,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Advance progress, clamped to the target. Returns true only on the
    /// call that transitions the goal into completion, so the completion
    /// bonus fires exactly once.
    pub fn advance(&mut self, increment: u32, now: DateTime<Utc>) -> bool {
        self.current_value = self
            .current_value
            .saturating_add(increment)
            .min(self.target_value);

        if self.current_value == self.target_value && self.completed_at.is_none() {
            self.completed_at = Some(now);
            true
        } else {
            false
        }
    }
}
