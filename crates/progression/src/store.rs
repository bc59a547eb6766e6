//! Per-user progress storage behind the `ProgressStore` trait.
//!
//! Completion and award inserts go through `insert_*` methods with
//! check-and-insert semantics: at most one row per (user, target). The
//! uniqueness lives here, not in the completion service, so the logical
//! check-then-insert race is closed at the storage boundary. Any real
//! backing store must provide the same guarantee (a unique constraint or
//! transactional equivalent).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::achievements::AchievementAward;
use crate::error::ProgressionError;
use crate::goals::{GoalKind, LearningGoal};
use crate::skills::SkillProgress;
use crate::streak::StreakRecord;

/// Result of a unique insert
#[derive(Debug, Clone)]
pub enum InsertOutcome<T> {
    Inserted(T),
    /// The existing record, unchanged; nothing was written
    Duplicate(T),
}

impl<T> InsertOutcome<T> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Inserted(v) | Self::Duplicate(v) => v,
        }
    }
}

/// One completed daily challenge: unique per (user, challenge)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeCompletion {
    pub challenge_id: String,
    pub score: u8,
    pub time_spent_minutes: u32,
    pub xp_awarded: u32,
    pub completed_at: DateTime<Utc>,
}

/// One completed lesson: unique per (user, lesson)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonCompletion {
    pub lesson_id: String,
    pub xp_awarded: u32,
    pub completed_at: DateTime<Utc>,
}

/// One passed quiz: unique per (user, quiz)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizCompletion {
    pub quiz_id: String,
    pub score: u8,
    pub xp_awarded: u32,
    pub completed_at: DateTime<Utc>,
}

/// Storage contract for everything that is not the XP ledger
pub trait ProgressStore {
    /// Current streak record, default if none yet
    fn streak(&self, user_id: &str) -> StreakRecord;
    fn put_streak(&mut self, user_id: &str, record: StreakRecord)
        -> Result<(), ProgressionError>;

    fn skill_progress(&self, user_id: &str, node_id: &str) -> Option<SkillProgress>;
    fn skill_progress_all(&self, user_id: &str) -> Vec<SkillProgress>;
    fn put_skill_progress(
        &mut self,
        user_id: &str,
        progress: SkillProgress,
    ) -> Result<(), ProgressionError>;

    /// Remove a skill progress record written by an operation whose XP
    /// append failed, so no partial write stays observable
    fn remove_skill_progress(
        &mut self,
        user_id: &str,
        node_id: &str,
    ) -> Result<(), ProgressionError>;

    fn insert_challenge_completion(
        &mut self,
        user_id: &str,
        completion: ChallengeCompletion,
    ) -> Result<InsertOutcome<ChallengeCompletion>, ProgressionError>;
    fn challenge_completions(&self, user_id: &str) -> Vec<ChallengeCompletion>;
    /// Remove a completion whose XP append failed (error-path rollback
    /// only; completions are never deleted in normal operation)
    fn remove_challenge_completion(
        &mut self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<(), ProgressionError>;

    fn insert_lesson_completion(
        &mut self,
        user_id: &str,
        completion: LessonCompletion,
    ) -> Result<InsertOutcome<LessonCompletion>, ProgressionError>;
    fn lesson_completion(&self, user_id: &str, lesson_id: &str) -> Option<LessonCompletion>;
    fn lesson_completions(&self, user_id: &str) -> Vec<LessonCompletion>;
    fn remove_lesson_completion(
        &mut self,
        user_id: &str,
        lesson_id: &str,
    ) -> Result<(), ProgressionError>;

    fn insert_quiz_completion(
        &mut self,
        user_id: &str,
        completion: QuizCompletion,
    ) -> Result<InsertOutcome<QuizCompletion>, ProgressionError>;
    fn quiz_completions(&self, user_id: &str) -> Vec<QuizCompletion>;
    fn remove_quiz_completion(
        &mut self,
        user_id: &str,
        quiz_id: &str,
    ) -> Result<(), ProgressionError>;

    fn insert_award(
        &mut self,
        user_id: &str,
        award: AchievementAward,
    ) -> Result<InsertOutcome<AchievementAward>, ProgressionError>;
    fn awards(&self, user_id: &str) -> Vec<AchievementAward>;
    fn remove_award(
        &mut self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<(), ProgressionError>;

    fn active_goal(&self, user_id: &str, kind: GoalKind) -> Option<LearningGoal>;
    fn put_goal(&mut self, user_id: &str, goal: LearningGoal) -> Result<(), ProgressionError>;
}

type PerUser<T> = HashMap<String, HashMap<String, T>>;

fn unique_insert<T: Clone>(
    map: &mut PerUser<T>,
    user_id: &str,
    key: &str,
    value: T,
) -> InsertOutcome<T> {
    let per_user = map.entry(user_id.to_string()).or_default();
    match per_user.get(key) {
        Some(existing) => InsertOutcome::Duplicate(existing.clone()),
        None => {
            per_user.insert(key.to_string(), value.clone());
            InsertOutcome::Inserted(value)
        }
    }
}

fn remove_from<T>(map: &mut PerUser<T>, user_id: &str, key: &str) {
    if let Some(per_user) = map.get_mut(user_id) {
        per_user.remove(key);
    }
}

fn values_of<T: Clone>(map: &PerUser<T>, user_id: &str) -> Vec<T> {
    map.get(user_id)
        .map(|m| m.values().cloned().collect())
        .unwrap_or_default()
}

/// In-memory store, also the serde model for the JSON state file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    streaks: HashMap<String, StreakRecord>,
    #[serde(default)]
    skills: PerUser<SkillProgress>,
    #[serde(default)]
    challenges: PerUser<ChallengeCompletion>,
    #[serde(default)]
    lessons: PerUser<LessonCompletion>,
    #[serde(default)]
    quizzes: PerUser<QuizCompletion>,
    #[serde(default)]
    awards: PerUser<AchievementAward>,
    #[serde(default)]
    goals: HashMap<String, Vec<LearningGoal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON state file; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self, ProgressionError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let store = serde_json::from_str(&content)?;
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProgressionError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// State file at `<data_dir>/progress.json`
    pub fn state_path(data_dir: &Path) -> PathBuf {
        data_dir.join(crate::STORE_FILE)
    }
}

impl ProgressStore for MemoryStore {
    fn streak(&self, user_id: &str) -> StreakRecord {
        self.streaks.get(user_id).cloned().unwrap_or_default()
    }

    fn put_streak(
        &mut self,
        user_id: &str,
        record: StreakRecord,
    ) -> Result<(), ProgressionError> {
        self.streaks.insert(user_id.to_string(), record);
        Ok(())
    }

    fn skill_progress(&self, user_id: &str, node_id: &str) -> Option<SkillProgress> {
        self.skills.get(user_id).and_then(|m| m.get(node_id)).cloned()
    }

    fn skill_progress_all(&self, user_id: &str) -> Vec<SkillProgress> {
        values_of(&self.skills, user_id)
    }

    fn put_skill_progress(
        &mut self,
        user_id: &str,
        progress: SkillProgress,
    ) -> Result<(), ProgressionError> {
        self.skills
            .entry(user_id.to_string())
            .or_default()
            .insert(progress.node_id.clone(), progress);
        Ok(())
    }

    fn remove_skill_progress(
        &mut self,
        user_id: &str,
        node_id: &str,
    ) -> Result<(), ProgressionError> {
        remove_from(&mut self.skills, user_id, node_id);
        Ok(())
    }

    fn insert_challenge_completion(
        &mut self,
        user_id: &str,
        completion: ChallengeCompletion,
    ) -> Result<InsertOutcome<ChallengeCompletion>, ProgressionError> {
        let key = completion.challenge_id.clone();
        Ok(unique_insert(&mut self.challenges, user_id, &key, completion))
    }

    fn challenge_completions(&self, user_id: &str) -> Vec<ChallengeCompletion> {
        values_of(&self.challenges, user_id)
    }

    fn remove_challenge_completion(
        &mut self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<(), ProgressionError> {
        remove_from(&mut self.challenges, user_id, challenge_id);
        Ok(())
    }

    fn insert_lesson_completion(
        &mut self,
        user_id: &str,
        completion: LessonCompletion,
    ) -> Result<InsertOutcome<LessonCompletion>, ProgressionError> {
        let key = completion.lesson_id.clone();
        Ok(unique_insert(&mut self.lessons, user_id, &key, completion))
    }

    fn lesson_completion(&self, user_id: &str, lesson_id: &str) -> Option<LessonCompletion> {
        self.lessons
            .get(user_id)
            .and_then(|m| m.get(lesson_id))
            .cloned()
    }

    fn lesson_completions(&self, user_id: &str) -> Vec<LessonCompletion> {
        values_of(&self.lessons, user_id)
    }

    fn remove_lesson_completion(
        &mut self,
        user_id: &str,
        lesson_id: &str,
    ) -> Result<(), ProgressionError> {
        remove_from(&mut self.lessons, user_id, lesson_id);
        Ok(())
    }

    fn insert_quiz_completion(
        &mut self,
        user_id: &str,
        completion: QuizCompletion,
    ) -> Result<InsertOutcome<QuizCompletion>, ProgressionError> {
        let key = completion.quiz_id.clone();
        Ok(unique_insert(&mut self.quizzes, user_id, &key, completion))
    }

    fn quiz_completions(&self, user_id: &str) -> Vec<QuizCompletion> {
        values_of(&self.quizzes, user_id)
    }

    fn remove_quiz_completion(
        &mut self,
        user_id: &str,
        quiz_id: &str,
    ) -> Result<(), ProgressionError> {
        remove_from(&mut self.quizzes, user_id, quiz_id);
        Ok(())
    }

    fn insert_award(
        &mut self,
        user_id: &str,
        award: AchievementAward,
    ) -> Result<InsertOutcome<AchievementAward>, ProgressionError> {
        let key = award.achievement_id.clone();
        Ok(unique_insert(&mut self.awards, user_id, &key, award))
    }

    fn awards(&self, user_id: &str) -> Vec<AchievementAward> {
        values_of(&self.awards, user_id)
    }

    fn remove_award(
        &mut self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<(), ProgressionError> {
        remove_from(&mut self.awards, user_id, achievement_id);
        Ok(())
    }

    fn active_goal(&self, user_id: &str, kind: GoalKind) -> Option<LearningGoal> {
        self.goals
            .get(user_id)
            .and_then(|goals| goals.iter().find(|g| g.kind == kind))
            .cloned()
    }

    fn put_goal(&mut self, user_id: &str, goal: LearningGoal) -> Result<(), ProgressionError> {
        let goals = self.goals.entry(user_id.to_string()).or_default();
        match goals.iter_mut().find(|g| g.id == goal.id) {
            Some(existing) => *existing = goal,
            None => goals.push(goal),
        }
        Ok(())
    }
}
