//! Content catalog boundary.
//!
//! The engine never owns lessons, challenges, or skill trees; it consumes
//! them through the `Catalog` trait so the real backing store and test
//! fakes are interchangeable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::achievements::{default_achievements, AchievementType};
use crate::skills::{SkillNode, SkillTree};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub xp_reward: u32,
    /// Module this lesson belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub xp_reward: u32,
    /// Minimum score (0-100) that counts as a pass
    pub passing_score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub description: String,
    pub reward_points: u32,
    pub is_active: bool,
    /// Calendar day this daily challenge was issued for
    pub challenge_date: NaiveDate,
}

/// A course module: an ordered group of lessons gated on other modules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: String,
    pub title: String,
    pub lesson_ids: Vec<String>,
    pub prerequisites: Vec<String>,
    /// Completion percentage (0-100) each prerequisite module must reach
    /// before this module opens; not necessarily 100
    pub unlock_requirement: u8,
}

/// Read-only lookups the engine needs from the content side
pub trait Catalog {
    fn lesson(&self, id: &str) -> Option<&Lesson>;
    fn quiz(&self, id: &str) -> Option<&Quiz>;
    fn challenge(&self, id: &str) -> Option<&Challenge>;
    fn module(&self, id: &str) -> Option<&CourseModule>;
    fn skill_tree(&self, id: &str) -> Option<&SkillTree>;
    fn skill_trees(&self) -> &[SkillTree];
    fn achievements(&self) -> &[AchievementType];

    /// Look a node up across all trees
    fn skill_node(&self, id: &str) -> Option<&SkillNode> {
        self.skill_trees().iter().find_map(|t| t.node(id))
    }

    /// Discipline of the tree containing `node_id`
    fn discipline_of(&self, node_id: &str) -> Option<&str> {
        self.skill_trees()
            .iter()
            .find(|t| t.node(node_id).is_some())
            .map(|t| t.discipline.as_str())
    }
}

/// In-memory catalog, also the serde model for a catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCatalog {
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub modules: Vec<CourseModule>,
    #[serde(default)]
    pub trees: Vec<SkillTree>,
    #[serde(default)]
    pub achievement_types: Vec<AchievementType>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty content with the built-in achievement set
    pub fn with_default_achievements() -> Self {
        Self {
            achievement_types: default_achievements(),
            ..Self::default()
        }
    }

    pub fn add_lesson(&mut self, lesson: Lesson) -> &mut Self {
        self.lessons.push(lesson);
        self
    }

    pub fn add_quiz(&mut self, quiz: Quiz) -> &mut Self {
        self.quizzes.push(quiz);
        self
    }

    pub fn add_challenge(&mut self, challenge: Challenge) -> &mut Self {
        self.challenges.push(challenge);
        self
    }

    pub fn add_module(&mut self, module: CourseModule) -> &mut Self {
        self.modules.push(module);
        self
    }

    /// Add a tree after validating it (authoring-time check)
    pub fn add_tree(&mut self, tree: SkillTree) -> Result<&mut Self, crate::ProgressionError> {
        tree.validate()?;
        self.trees.push(tree);
        Ok(self)
    }

    pub fn add_achievement(&mut self, achievement: AchievementType) -> &mut Self {
        self.achievement_types.push(achievement);
        self
    }
}

impl Catalog for MemoryCatalog {
    fn lesson(&self, id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    fn quiz(&self, id: &str) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id == id)
    }

    fn challenge(&self, id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }

    fn module(&self, id: &str) -> Option<&CourseModule> {
        self.modules.iter().find(|m| m.id == id)
    }

    fn skill_tree(&self, id: &str) -> Option<&SkillTree> {
        self.trees.iter().find(|t| t.id == id)
    }

    fn skill_trees(&self) -> &[SkillTree] {
        &self.trees
    }

    fn achievements(&self) -> &[AchievementType] {
        &self.achievement_types
    }
}
