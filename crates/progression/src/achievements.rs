//! Achievement types and trigger evaluation.
//!
//! Trigger conditions are data (`TriggerRule`), not code, so the catalog
//! can ship new achievements without touching the evaluation loop. An
//! achievement is earned at most once per user; the store's unique-insert
//! contract enforces that, evaluation here only detects satisfaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reward band for an achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// Declarative trigger condition, checked against derived standing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    LessonsCompleted { count: u32 },
    QuizzesCompleted { count: u32 },
    ChallengesCompleted { count: u32 },
    StreakDays { days: u32 },
    SkillNodesCompleted { count: u32 },
    SkillNodesInDiscipline { discipline: String, count: u32 },
    TotalXp { amount: u64 },
    LevelReached { level: u32 },
}

impl TriggerRule {
    pub fn is_satisfied(&self, standing: &UserStanding) -> bool {
        match self {
            Self::LessonsCompleted { count } => standing.lessons_completed >= *count,
            Self::QuizzesCompleted { count } => standing.quizzes_completed >= *count,
            Self::ChallengesCompleted { count } => standing.challenges_completed >= *count,
            Self::StreakDays { days } => standing.longest_streak >= *days,
            Self::SkillNodesCompleted { count } => standing.skill_nodes_completed >= *count,
            Self::SkillNodesInDiscipline { discipline, count } => {
                standing
                    .completed_by_discipline
                    .get(discipline)
                    .copied()
                    .unwrap_or(0)
                    >= *count
            }
            Self::TotalXp { amount } => standing.total_xp >= *amount,
            Self::LevelReached { level } => standing.current_level >= *level,
        }
    }
}

/// One achievement definition from the content catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tier: AchievementTier,
    pub rule: TriggerRule,
    /// Base XP reward; tier context bonus is applied by the reward policy
    pub xp_reward: u32,
}

/// Earned-achievement record: at most one per (user, achievement)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementAward {
    pub achievement_id: String,
    pub earned_at: DateTime<Utc>,
    /// Base reward plus any tier context bonus, as granted
    pub xp_awarded: u32,
}

/// Derived per-user counters the trigger rules run against. Built from the
/// ledger and progress stores on each evaluation pass; never persisted.
#[derive(Debug, Clone, Default)]
pub struct UserStanding {
    pub total_xp: u64,
    pub current_level: u32,
    pub lessons_completed: u32,
    pub quizzes_completed: u32,
    pub challenges_completed: u32,
    pub longest_streak: u32,
    pub skill_nodes_completed: u32,
    pub completed_by_discipline: HashMap<String, u32>,
}

fn achievement(
    id: &str,
    name: &str,
    description: &str,
    tier: AchievementTier,
    rule: TriggerRule,
    xp_reward: u32,
) -> AchievementType {
    AchievementType {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        tier,
        rule,
        xp_reward,
    }
}

/// Built-in achievement set, used when the catalog ships no custom one
pub fn default_achievements() -> Vec<AchievementType> {
    use AchievementTier::*;
    use TriggerRule::*;

    vec![
        // Lesson milestones
        achievement(
            "first_lesson",
            "First Steps",
            "Complete your first lesson",
            Bronze,
            LessonsCompleted { count: 1 },
            25,
        ),
        achievement(
            "ten_lessons",
            "Getting Serious",
            "Complete 10 lessons",
            Silver,
            LessonsCompleted { count: 10 },
            100,
        ),
        achievement(
            "fifty_lessons",
            "Course Devourer",
            "Complete 50 lessons",
            Gold,
            LessonsCompleted { count: 50 },
            400,
        ),
        // Streaks
        achievement(
            "streak_3",
            "Warming Up",
            "Maintain a 3-day streak",
            Bronze,
            StreakDays { days: 3 },
            30,
        ),
        achievement(
            "streak_7",
            "Week Warrior",
            "Maintain a 7-day streak",
            Silver,
            StreakDays { days: 7 },
            100,
        ),
        achievement(
            "streak_30",
            "Monthly Master",
            "Maintain a 30-day streak",
            Platinum,
            StreakDays { days: 30 },
            500,
        ),
        // Challenges
        achievement(
            "first_challenge",
            "Challenger",
            "Complete a daily challenge",
            Bronze,
            ChallengesCompleted { count: 1 },
            25,
        ),
        achievement(
            "twenty_challenges",
            "Daily Grind",
            "Complete 20 daily challenges",
            Gold,
            ChallengesCompleted { count: 20 },
            300,
        ),
        // Quizzes
        achievement(
            "ten_quizzes",
            "Quiz Whiz",
            "Pass 10 quizzes",
            Silver,
            QuizzesCompleted { count: 10 },
            100,
        ),
        // Skill tree
        achievement(
            "five_nodes",
            "Branching Out",
            "Complete 5 skill nodes",
            Silver,
            SkillNodesCompleted { count: 5 },
            150,
        ),
        // Level and XP
        achievement(
            "level_5",
            "Climbing",
            "Reach level 5",
            Silver,
            LevelReached { level: 5 },
            100,
        ),
        achievement(
            "xp_10k",
            "Ten Thousand Hours",
            "Earn 10,000 total XP",
            Platinum,
            TotalXp { amount: 10_000 },
            500,
        ),
    ]
}
