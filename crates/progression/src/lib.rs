//! Progression engine for the learning platform: XP accounting, levels,
//! streaks, skill-tree unlocking, and idempotent completion awards.
//!
//! The XP ledger is the only source of truth; levels, snapshots, and
//! achievement thresholds are derived from it on read. All writes funnel
//! through the completion service, which treats duplicate completions as a
//! soft "already completed" signal rather than an error.

pub mod achievements;
pub mod catalog;
pub mod completion;
pub mod error;
pub mod goals;
pub mod level;
pub mod skills;
pub mod store;
pub mod streak;
pub mod unlock;
pub mod xp;

pub use achievements::{AchievementAward, AchievementTier, AchievementType, TriggerRule};
pub use catalog::{Catalog, Challenge, CourseModule, Lesson, MemoryCatalog, Quiz};
pub use completion::{
    ChallengeResult, CompletionService, GoalResult, LessonResult, NodeResult, QuizResult,
    RewardPolicy,
};
pub use error::ProgressionError;
pub use goals::{GoalKind, LearningGoal};
pub use level::{level_for_xp, level_title, snapshot_for_xp, xp_threshold, ProgressionSnapshot};
pub use skills::{NodeStatus, SkillNode, SkillProgress, SkillTier, SkillTree};
pub use store::{
    ChallengeCompletion, InsertOutcome, LessonCompletion, MemoryStore, ProgressStore,
    QuizCompletion,
};
pub use streak::{StreakOutcome, StreakRecord};
pub use unlock::UnlockResolver;
pub use xp::{JournalLedger, MemoryLedger, XpLedger, XpSource, XpTransaction};

/// Default state directory for file-backed stores
pub const DEFAULT_DATA_DIR: &str = "/var/lib/progression";

/// Progress store file name within the data directory
pub const STORE_FILE: &str = "progress.json";

/// XP journal file name within the data directory
pub const JOURNAL_FILE: &str = "xp.jsonl";

/// Catalog file name within the data directory
pub const CATALOG_FILE: &str = "catalog.json";
