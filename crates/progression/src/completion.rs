//! Completion service: the single orchestration point for awards.
//!
//! Every XP-granting path runs through here. Idempotency comes from the
//! store's unique-insert contract; this service validates lookups before
//! its first write, and a record whose paired ledger append fails is
//! removed again before the error propagates, so a failed operation never
//! leaves a partial record.
//! Collaborators are injected as trait objects so tests run against
//! in-memory fakes.

use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::achievements::{AchievementAward, AchievementTier, UserStanding};
use crate::catalog::Catalog;
use crate::error::ProgressionError;
use crate::goals::{GoalKind, LearningGoal};
use crate::level::{level_for_xp, snapshot_for_xp, ProgressionSnapshot};
use crate::skills::{NodeStatus, SkillNode, SkillProgress};
use crate::store::{
    ChallengeCompletion, InsertOutcome, LessonCompletion, ProgressStore, QuizCompletion,
};
use crate::streak::{StreakOutcome, StreakRecord};
use crate::unlock::UnlockResolver;
use crate::xp::{XpLedger, XpSource};

/// Every scoring constant in one place. The source of record for reward
/// tuning; nothing else hardcodes a multiplier.
#[derive(Debug, Clone)]
pub struct RewardPolicy {
    /// Minimum challenge score (0-100) that earns XP; lower scores still
    /// record the completion but award nothing
    pub passing_score: u8,
    /// Flat bonus for finishing a learning goal
    pub goal_bonus_xp: u32,
    /// Context bonus applied to gold-tier achievement rewards, percent
    pub gold_bonus_percent: u32,
    /// Context bonus applied to platinum-tier achievement rewards, percent
    pub platinum_bonus_percent: u32,
    /// Bonus for completing a milestone skill node, as a percentage of the
    /// node's XP requirement; regular nodes award nothing on completion
    pub milestone_bonus_percent: u32,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            passing_score: 50,
            goal_bonus_xp: 50,
            gold_bonus_percent: 15,
            platinum_bonus_percent: 20,
            milestone_bonus_percent: 20,
        }
    }
}

impl RewardPolicy {
    /// Challenge XP is proportional to score: `round(reward_points *
    /// score/100)`, zero below the passing floor.
    pub fn challenge_award(&self, reward_points: u32, score: u8) -> u32 {
        let score = score.min(100);
        if score < self.passing_score {
            return 0;
        }
        ((reward_points as f64) * (score as f64) / 100.0).round() as u32
    }

    /// Achievement XP: base reward plus the tier's context bonus
    pub fn achievement_award(&self, tier: AchievementTier, base_xp: u32) -> u32 {
        let bonus_percent = match tier {
            AchievementTier::Bronze | AchievementTier::Silver => 0,
            AchievementTier::Gold => self.gold_bonus_percent,
            AchievementTier::Platinum => self.platinum_bonus_percent,
        };
        base_xp + (base_xp as u64 * bonus_percent as u64 / 100) as u32
    }

    /// Milestone completion XP: a share of the node's requirement. Zero for
    /// non-milestone nodes.
    pub fn milestone_award(&self, node: &SkillNode) -> u32 {
        if !node.is_milestone {
            return 0;
        }
        (node.xp_required as u64 * self.milestone_bonus_percent as u64 / 100) as u32
    }
}

#[derive(Debug, Clone)]
pub struct ChallengeResult {
    /// XP on the completion record (the original award when
    /// `already_completed` is set)
    pub xp_awarded: u32,
    pub already_completed: bool,
}

#[derive(Debug, Clone)]
pub struct LessonResult {
    /// XP granted by this call; zero on repeat completions
    pub xp_awarded: u32,
    pub already_completed: bool,
}

#[derive(Debug, Clone)]
pub struct QuizResult {
    pub xp_awarded: u32,
    pub passed: bool,
    pub already_completed: bool,
}

#[derive(Debug, Clone)]
pub struct GoalResult {
    pub current_value: u32,
    pub target_value: u32,
    pub is_completed: bool,
    /// Completion bonus granted by this call, if it finished the goal
    pub bonus_awarded: u32,
}

#[derive(Debug, Clone)]
pub struct NodeResult {
    pub status: NodeStatus,
    pub progress_percentage: u8,
    pub newly_completed: bool,
    /// Milestone bonus granted by this call; zero for regular nodes
    pub xp_awarded: u32,
}

pub struct CompletionService<'a> {
    ledger: &'a mut dyn XpLedger,
    store: &'a mut dyn ProgressStore,
    catalog: &'a dyn Catalog,
    policy: RewardPolicy,
}

impl<'a> CompletionService<'a> {
    pub fn new(
        ledger: &'a mut dyn XpLedger,
        store: &'a mut dyn ProgressStore,
        catalog: &'a dyn Catalog,
    ) -> Self {
        Self {
            ledger,
            store,
            catalog,
            policy: RewardPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RewardPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Complete today's challenge for a user. Safe to retry: a duplicate
    /// returns the original record with `already_completed` set and grants
    /// nothing.
    pub fn complete_daily_challenge(
        &mut self,
        user_id: &str,
        challenge_id: &str,
        score: u8,
        time_spent_minutes: u32,
    ) -> Result<ChallengeResult, ProgressionError> {
        let catalog = self.catalog;
        let challenge = catalog
            .challenge(challenge_id)
            .ok_or_else(|| ProgressionError::not_found("challenge", challenge_id))?;
        // An expired daily reads as absent: it can no longer be completed
        if !challenge.is_active {
            return Err(ProgressionError::not_found("challenge", challenge_id));
        }

        let now = Utc::now();
        let today = now.date_naive();
        let xp = self.policy.challenge_award(challenge.reward_points, score);

        let completion = ChallengeCompletion {
            challenge_id: challenge_id.to_string(),
            score: score.min(100),
            time_spent_minutes,
            xp_awarded: xp,
            completed_at: now,
        };

        match self.store.insert_challenge_completion(user_id, completion)? {
            InsertOutcome::Duplicate(existing) => {
                debug!(user_id, challenge_id, "challenge already completed");
                Ok(ChallengeResult {
                    xp_awarded: existing.xp_awarded,
                    already_completed: true,
                })
            }
            InsertOutcome::Inserted(_) => {
                if xp > 0 {
                    if let Err(e) =
                        self.ledger
                            .append(user_id, xp as i64, XpSource::DailyChallenge, challenge_id)
                    {
                        // Keep the insert and the append atomic: without the
                        // XP the completion must not stay visible either
                        self.store.remove_challenge_completion(user_id, challenge_id)?;
                        return Err(e);
                    }
                    self.record_streak_activity(user_id, today)?;
                }
                self.evaluate_achievements(user_id)?;
                info!(user_id, challenge_id, xp, "daily challenge completed");
                Ok(ChallengeResult {
                    xp_awarded: xp,
                    already_completed: false,
                })
            }
        }
    }

    /// Award lesson XP exactly once, on the call that brings completion to
    /// 100%. Partial progress and re-reads earn nothing.
    pub fn complete_lesson(
        &mut self,
        user_id: &str,
        lesson_id: &str,
        completion_percentage: u8,
    ) -> Result<LessonResult, ProgressionError> {
        let catalog = self.catalog;
        let lesson = catalog
            .lesson(lesson_id)
            .ok_or_else(|| ProgressionError::not_found("lesson", lesson_id))?;

        if completion_percentage < 100 {
            return Ok(LessonResult {
                xp_awarded: 0,
                already_completed: false,
            });
        }

        let now = Utc::now();
        let today = now.date_naive();
        let xp = lesson.xp_reward;
        let completion = LessonCompletion {
            lesson_id: lesson_id.to_string(),
            xp_awarded: xp,
            completed_at: now,
        };

        match self.store.insert_lesson_completion(user_id, completion)? {
            InsertOutcome::Duplicate(_) => {
                debug!(user_id, lesson_id, "lesson already completed");
                Ok(LessonResult {
                    xp_awarded: 0,
                    already_completed: true,
                })
            }
            InsertOutcome::Inserted(_) => {
                if xp > 0 {
                    if let Err(e) =
                        self.ledger
                            .append(user_id, xp as i64, XpSource::LessonCompletion, lesson_id)
                    {
                        self.store.remove_lesson_completion(user_id, lesson_id)?;
                        return Err(e);
                    }
                    self.record_streak_activity(user_id, today)?;
                }
                self.evaluate_achievements(user_id)?;
                info!(user_id, lesson_id, xp, "lesson completed");
                Ok(LessonResult {
                    xp_awarded: xp,
                    already_completed: false,
                })
            }
        }
    }

    /// Record a passed quiz once per (user, quiz). Failed attempts record
    /// nothing, so they can be retried.
    pub fn complete_quiz(
        &mut self,
        user_id: &str,
        quiz_id: &str,
        score: u8,
    ) -> Result<QuizResult, ProgressionError> {
        let catalog = self.catalog;
        let quiz = catalog
            .quiz(quiz_id)
            .ok_or_else(|| ProgressionError::not_found("quiz", quiz_id))?;

        let score = score.min(100);
        if score < quiz.passing_score {
            return Ok(QuizResult {
                xp_awarded: 0,
                passed: false,
                already_completed: false,
            });
        }

        let now = Utc::now();
        let today = now.date_naive();
        let xp = quiz.xp_reward;
        let completion = QuizCompletion {
            quiz_id: quiz_id.to_string(),
            score,
            xp_awarded: xp,
            completed_at: now,
        };

        match self.store.insert_quiz_completion(user_id, completion)? {
            InsertOutcome::Duplicate(_) => {
                debug!(user_id, quiz_id, "quiz already completed");
                Ok(QuizResult {
                    xp_awarded: 0,
                    passed: true,
                    already_completed: true,
                })
            }
            InsertOutcome::Inserted(_) => {
                if xp > 0 {
                    if let Err(e) =
                        self.ledger
                            .append(user_id, xp as i64, XpSource::QuizCompletion, quiz_id)
                    {
                        self.store.remove_quiz_completion(user_id, quiz_id)?;
                        return Err(e);
                    }
                    self.record_streak_activity(user_id, today)?;
                }
                self.evaluate_achievements(user_id)?;
                info!(user_id, quiz_id, score, xp, "quiz passed");
                Ok(QuizResult {
                    xp_awarded: xp,
                    passed: true,
                    already_completed: false,
                })
            }
        }
    }

    /// Advance the user's active goal of `kind`. Progress is monotonic and
    /// clamped to the target; the completion bonus fires exactly once.
    pub fn update_goal_progress(
        &mut self,
        user_id: &str,
        kind: GoalKind,
        increment: u32,
    ) -> Result<GoalResult, ProgressionError> {
        let mut goal = self
            .store
            .active_goal(user_id, kind)
            .ok_or_else(|| ProgressionError::not_found("goal", &kind.to_string()))?;

        let now = Utc::now();
        let previous = goal.clone();
        let newly_completed = goal.advance(increment, now);
        self.store.put_goal(user_id, goal.clone())?;

        let mut bonus_awarded = 0;
        if newly_completed {
            bonus_awarded = self.policy.goal_bonus_xp;
            if bonus_awarded > 0 {
                if let Err(e) = self.ledger.append(
                    user_id,
                    bonus_awarded as i64,
                    XpSource::GoalCompletion,
                    &goal.id,
                ) {
                    // Restore the pre-advance goal so the bonus can still be
                    // earned on retry
                    self.store.put_goal(user_id, previous)?;
                    return Err(e);
                }
                self.record_streak_activity(user_id, now.date_naive())?;
            }
            self.evaluate_achievements(user_id)?;
            info!(user_id, goal_id = %goal.id, bonus_awarded, "goal completed");
        }

        Ok(GoalResult {
            current_value: goal.current_value,
            target_value: goal.target_value,
            is_completed: goal.is_completed(),
            bonus_awarded,
        })
    }

    /// Create (or replace) the user's active goal of this kind
    pub fn set_goal(&mut self, user_id: &str, goal: LearningGoal) -> Result<(), ProgressionError> {
        self.store.put_goal(user_id, goal)
    }

    /// Mark a node in progress. Rejected with `PrerequisiteNotMet` while
    /// any prerequisite is incomplete.
    pub fn start_skill_node(
        &mut self,
        user_id: &str,
        node_id: &str,
    ) -> Result<NodeResult, ProgressionError> {
        self.record_node_progress(user_id, node_id, 0)
    }

    /// Complete a skill node (idempotent)
    pub fn complete_skill_node(
        &mut self,
        user_id: &str,
        node_id: &str,
    ) -> Result<NodeResult, ProgressionError> {
        self.record_node_progress(user_id, node_id, 100)
    }

    /// Record progress within an unlocked node. Progress never regresses;
    /// reaching 100 completes the node and is a no-op on repeat calls.
    pub fn record_node_progress(
        &mut self,
        user_id: &str,
        node_id: &str,
        progress_percentage: u8,
    ) -> Result<NodeResult, ProgressionError> {
        let catalog = self.catalog;
        let node = catalog
            .skill_node(node_id)
            .ok_or_else(|| ProgressionError::not_found("skill node", node_id))?;

        let resolver = UnlockResolver::new(&*self.store);
        if !resolver.is_unlocked(user_id, node) {
            let missing = resolver.missing_prerequisites(user_id, node);
            return Err(ProgressionError::PrerequisiteNotMet {
                node_id: node_id.to_string(),
                missing,
            });
        }

        let previous = self.store.skill_progress(user_id, node_id);
        let mut progress = previous
            .clone()
            .unwrap_or_else(|| SkillProgress::new(node_id));

        if progress.is_completed() {
            return Ok(NodeResult {
                status: NodeStatus::Completed,
                progress_percentage: 100,
                newly_completed: false,
                xp_awarded: 0,
            });
        }

        let now = Utc::now();
        progress.progress_percentage = progress
            .progress_percentage
            .max(progress_percentage.min(100));

        let newly_completed = progress.progress_percentage == 100;
        if newly_completed {
            progress.status = NodeStatus::Completed;
            progress.completed_at = Some(now);
        } else {
            progress.status = NodeStatus::InProgress;
        }

        let status = progress.status;
        let pct = progress.progress_percentage;
        self.store.put_skill_progress(user_id, progress)?;

        let mut xp_awarded = 0;
        if newly_completed {
            let bonus = self.policy.milestone_award(node);
            if bonus > 0 {
                if let Err(e) =
                    self.ledger
                        .append(user_id, bonus as i64, XpSource::SkillMilestone, node_id)
                {
                    // Undo the completion so the milestone bonus is not lost
                    match previous {
                        Some(prior) => self.store.put_skill_progress(user_id, prior)?,
                        None => self.store.remove_skill_progress(user_id, node_id)?,
                    }
                    return Err(e);
                }
                self.record_streak_activity(user_id, now.date_naive())?;
                xp_awarded = bonus;
            }
            debug!(user_id, node_id, xp_awarded, "skill node completed");
            self.evaluate_achievements(user_id)?;
        }

        Ok(NodeResult {
            status,
            progress_percentage: pct,
            newly_completed,
            xp_awarded,
        })
    }

    /// Award every achievement whose rule the user now satisfies. Safe to
    /// call redundantly: already-awarded achievements are skipped by the
    /// store's uniqueness contract. Returns only the new awards.
    ///
    /// Rules are checked against the standing computed at entry; XP granted
    /// here can satisfy further thresholds on the next pass (one runs after
    /// every completion operation).
    pub fn evaluate_achievements(
        &mut self,
        user_id: &str,
    ) -> Result<Vec<AchievementAward>, ProgressionError> {
        let standing = self.standing(user_id)?;
        let catalog = self.catalog;
        let now = Utc::now();
        let mut newly_awarded = Vec::new();

        for achievement in catalog.achievements() {
            if !achievement.rule.is_satisfied(&standing) {
                continue;
            }
            let xp = self
                .policy
                .achievement_award(achievement.tier, achievement.xp_reward);
            let award = AchievementAward {
                achievement_id: achievement.id.clone(),
                earned_at: now,
                xp_awarded: xp,
            };
            if let InsertOutcome::Inserted(award) = self.store.insert_award(user_id, award)? {
                if xp > 0 {
                    if let Err(e) = self.ledger.append(
                        user_id,
                        xp as i64,
                        XpSource::AchievementBonus,
                        &achievement.id,
                    ) {
                        self.store.remove_award(user_id, &achievement.id)?;
                        return Err(e);
                    }
                }
                info!(user_id, achievement = %achievement.id, xp, "achievement earned");
                newly_awarded.push(award);
            }
        }

        if newly_awarded.iter().any(|a| a.xp_awarded > 0) {
            self.record_streak_activity(user_id, now.date_naive())?;
        }
        Ok(newly_awarded)
    }

    /// Advance the streak for an active day. Same-day repeats are no-ops.
    pub fn record_streak_activity(
        &mut self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<StreakOutcome, ProgressionError> {
        let mut streak = self.store.streak(user_id);
        let outcome = streak.record_activity(day);
        if outcome != StreakOutcome::AlreadyCounted {
            debug!(user_id, ?outcome, current = streak.current_streak, "streak updated");
        }
        self.store.put_streak(user_id, streak)?;
        Ok(outcome)
    }

    /// Grant freeze credits (replenishment policy is the caller's)
    pub fn grant_freezes(&mut self, user_id: &str, count: u32) -> Result<(), ProgressionError> {
        let mut streak = self.store.streak(user_id);
        streak.add_freezes(count);
        self.store.put_streak(user_id, streak)
    }

    /// Level and progress derived from the ledger; never cached
    pub fn progression_snapshot(
        &self,
        user_id: &str,
    ) -> Result<ProgressionSnapshot, ProgressionError> {
        Ok(snapshot_for_xp(self.ledger.total_xp(user_id)?))
    }

    pub fn streak_status(&self, user_id: &str) -> StreakRecord {
        self.store.streak(user_id)
    }

    pub fn awards(&self, user_id: &str) -> Vec<AchievementAward> {
        self.store.awards(user_id)
    }

    /// Ids of unlocked nodes in one tree
    pub fn unlocked_skill_nodes(
        &self,
        user_id: &str,
        tree_id: &str,
    ) -> Result<HashSet<String>, ProgressionError> {
        let catalog = self.catalog;
        let tree = catalog
            .skill_tree(tree_id)
            .ok_or_else(|| ProgressionError::not_found("skill tree", tree_id))?;
        Ok(UnlockResolver::new(&*self.store).unlocked_nodes(user_id, tree))
    }

    pub fn is_module_unlocked(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> Result<bool, ProgressionError> {
        let catalog = self.catalog;
        let module = catalog
            .module(module_id)
            .ok_or_else(|| ProgressionError::not_found("module", module_id))?;
        Ok(UnlockResolver::new(&*self.store).is_module_unlocked(user_id, module, catalog))
    }

    fn standing(&self, user_id: &str) -> Result<UserStanding, ProgressionError> {
        let total_xp = self.ledger.total_xp(user_id)?;
        let streak = self.store.streak(user_id);
        let completed_nodes: Vec<SkillProgress> = self
            .store
            .skill_progress_all(user_id)
            .into_iter()
            .filter(|p| p.is_completed())
            .collect();

        let mut completed_by_discipline = std::collections::HashMap::new();
        for progress in &completed_nodes {
            if let Some(discipline) = self.catalog.discipline_of(&progress.node_id) {
                *completed_by_discipline
                    .entry(discipline.to_string())
                    .or_insert(0u32) += 1;
            }
        }

        Ok(UserStanding {
            total_xp,
            current_level: level_for_xp(total_xp),
            lessons_completed: self.store.lesson_completions(user_id).len() as u32,
            quizzes_completed: self.store.quiz_completions(user_id).len() as u32,
            challenges_completed: self.store.challenge_completions(user_id).len() as u32,
            longest_streak: streak.longest_streak,
            skill_nodes_completed: completed_nodes.len() as u32,
            completed_by_discipline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_award_proportional() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.challenge_award(50, 100), 50);
        assert_eq!(policy.challenge_award(50, 80), 40);
        assert_eq!(policy.challenge_award(75, 90), 68); // 67.5 rounds up
    }

    #[test]
    fn test_challenge_award_passing_floor() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.challenge_award(50, 49), 0);
        assert_eq!(policy.challenge_award(50, 50), 25);
    }

    #[test]
    fn test_challenge_award_clamps_score() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.challenge_award(50, 255), 50);
    }

    #[test]
    fn test_milestone_award_share_of_requirement() {
        let policy = RewardPolicy::default();
        let mut node = SkillNode {
            id: "capstone".to_string(),
            name: "Capstone".to_string(),
            tier: crate::skills::SkillTier::Mastery,
            xp_required: 200,
            prerequisites: Vec::new(),
            is_milestone: true,
        };
        assert_eq!(policy.milestone_award(&node), 40);

        node.is_milestone = false;
        assert_eq!(policy.milestone_award(&node), 0);
    }

    #[test]
    fn test_achievement_tier_bonuses() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.achievement_award(AchievementTier::Bronze, 100), 100);
        assert_eq!(policy.achievement_award(AchievementTier::Gold, 100), 115);
        assert_eq!(
            policy.achievement_award(AchievementTier::Platinum, 100),
            120
        );
    }
}
