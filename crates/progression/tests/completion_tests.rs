//! End-to-end tests for the completion service: idempotent awards,
//! goal bonuses, and achievement evaluation through in-memory stores.

use chrono::Utc;
use progression::{
    AchievementTier, AchievementType, Challenge, CompletionService, GoalKind, LearningGoal,
    Lesson, MemoryCatalog, MemoryLedger, MemoryStore, ProgressStore, ProgressionError, Quiz,
    SkillNode, SkillTier, SkillTree, TriggerRule, XpLedger, XpSource, XpTransaction,
};

/// Ledger that fails one append after a set number of successes, for
/// exercising the error path of award writes.
struct FlakyLedger {
    inner: MemoryLedger,
    appends_until_failure: Option<u32>,
}

impl FlakyLedger {
    fn failing_after(successes: u32) -> Self {
        Self {
            inner: MemoryLedger::new(),
            appends_until_failure: Some(successes),
        }
    }
}

impl XpLedger for FlakyLedger {
    fn append(
        &mut self,
        user_id: &str,
        amount: i64,
        source: XpSource,
        reference_id: &str,
    ) -> Result<XpTransaction, ProgressionError> {
        match self.appends_until_failure {
            Some(0) => {
                self.appends_until_failure = None;
                Err(ProgressionError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "journal unavailable",
                )))
            }
            Some(n) => {
                self.appends_until_failure = Some(n - 1);
                self.inner.append(user_id, amount, source, reference_id)
            }
            None => self.inner.append(user_id, amount, source, reference_id),
        }
    }

    fn transactions(&self, user_id: &str) -> Result<Vec<XpTransaction>, ProgressionError> {
        self.inner.transactions(user_id)
    }
}

fn catalog_with_challenge(reward_points: u32) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.add_challenge(Challenge {
        id: "ch-1".to_string(),
        description: "Beam deflection warm-up".to_string(),
        reward_points,
        is_active: true,
        challenge_date: Utc::now().date_naive(),
    });
    catalog
}

#[test]
fn test_challenge_completion_awards_once() {
    let catalog = catalog_with_challenge(50);
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let first = service
            .complete_daily_challenge("u1", "ch-1", 100, 12)
            .unwrap();
        assert_eq!(first.xp_awarded, 50);
        assert!(!first.already_completed);

        // Retry with a different score: original record wins, nothing new
        let second = service
            .complete_daily_challenge("u1", "ch-1", 40, 3)
            .unwrap();
        assert!(second.already_completed);
        assert_eq!(second.xp_awarded, 50);
    }

    let txs = ledger.transactions("u1").unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].source, XpSource::DailyChallenge);
    assert_eq!(txs[0].amount, 50);
    assert_eq!(txs[0].reference_id, "ch-1");
}

#[test]
fn test_challenge_below_passing_score_awards_nothing() {
    let catalog = catalog_with_challenge(50);
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let result = service
            .complete_daily_challenge("u1", "ch-1", 30, 5)
            .unwrap();
        assert_eq!(result.xp_awarded, 0);
        assert!(!result.already_completed);
    }

    // Completion recorded, but no ledger entry
    assert_eq!(ledger.total_xp("u1").unwrap(), 0);
}

#[test]
fn test_unknown_challenge_writes_nothing() {
    let catalog = MemoryCatalog::new();
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let err = service
            .complete_daily_challenge("u1", "ghost", 100, 5)
            .unwrap_err();
        assert!(matches!(err, ProgressionError::NotFound { .. }));
    }

    assert!(ledger.is_empty());
}

#[test]
fn test_lesson_completion_is_idempotent() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_lesson(Lesson {
        id: "l1".to_string(),
        title: "Statics I".to_string(),
        xp_reward: 40,
        module_id: None,
    });
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);

        // Partial progress earns nothing and records nothing
        let partial = service.complete_lesson("u1", "l1", 60).unwrap();
        assert_eq!(partial.xp_awarded, 0);

        let done = service.complete_lesson("u1", "l1", 100).unwrap();
        assert_eq!(done.xp_awarded, 40);

        // Re-reading a finished lesson is a no-op for XP
        let again = service.complete_lesson("u1", "l1", 100).unwrap();
        assert_eq!(again.xp_awarded, 0);
        assert!(again.already_completed);
    }

    assert_eq!(ledger.total_xp("u1").unwrap(), 40);
}

#[test]
fn test_quiz_pass_fail_and_retry() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_quiz(Quiz {
        id: "q1".to_string(),
        title: "Thermo check".to_string(),
        xp_reward: 30,
        passing_score: 70,
    });
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);

        let failed = service.complete_quiz("u1", "q1", 60).unwrap();
        assert!(!failed.passed);
        assert_eq!(failed.xp_awarded, 0);

        // A failed attempt records nothing, so the retry can still pass
        let passed = service.complete_quiz("u1", "q1", 85).unwrap();
        assert!(passed.passed);
        assert_eq!(passed.xp_awarded, 30);

        let repeat = service.complete_quiz("u1", "q1", 100).unwrap();
        assert!(repeat.already_completed);
        assert_eq!(repeat.xp_awarded, 0);
    }

    assert_eq!(ledger.total_xp("u1").unwrap(), 30);
}

#[test]
fn test_goal_completion_bonus_fires_once() {
    let catalog = MemoryCatalog::new();
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let mut goal = LearningGoal::new("g1", GoalKind::LessonCount, 5);
        goal.advance(4, Utc::now());
        service.set_goal("u1", goal).unwrap();

        let result = service
            .update_goal_progress("u1", GoalKind::LessonCount, 1)
            .unwrap();
        assert_eq!(result.current_value, 5);
        assert!(result.is_completed);
        assert_eq!(result.bonus_awarded, 50);

        // Further progress clamps and never re-awards
        let again = service
            .update_goal_progress("u1", GoalKind::LessonCount, 1)
            .unwrap();
        assert_eq!(again.current_value, 5);
        assert!(again.is_completed);
        assert_eq!(again.bonus_awarded, 0);
    }

    let txs = ledger.transactions("u1").unwrap();
    let bonuses: Vec<_> = txs
        .iter()
        .filter(|t| t.source == XpSource::GoalCompletion)
        .collect();
    assert_eq!(bonuses.len(), 1);
    assert_eq!(bonuses[0].amount, 50);
}

#[test]
fn test_missing_goal_is_not_found() {
    let catalog = MemoryCatalog::new();
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
    let err = service
        .update_goal_progress("u1", GoalKind::QuizCount, 1)
        .unwrap_err();
    assert!(matches!(err, ProgressionError::NotFound { .. }));
}

#[test]
fn test_achievement_awarded_once_with_bonus_xp() {
    let mut catalog = catalog_with_challenge(50);
    catalog.add_achievement(AchievementType {
        id: "first_challenge".to_string(),
        name: "Challenger".to_string(),
        description: "Complete a daily challenge".to_string(),
        tier: AchievementTier::Gold,
        rule: TriggerRule::ChallengesCompleted { count: 1 },
        xp_reward: 100,
    });
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        service
            .complete_daily_challenge("u1", "ch-1", 100, 8)
            .unwrap();

        // Redundant evaluation never re-awards
        let again = service.evaluate_achievements("u1").unwrap();
        assert!(again.is_empty());

        assert_eq!(service.awards("u1").len(), 1);
        // Gold tier carries a 15% context bonus
        assert_eq!(service.awards("u1")[0].xp_awarded, 115);
    }

    let bonuses: Vec<_> = ledger
        .transactions("u1")
        .unwrap()
        .into_iter()
        .filter(|t| t.source == XpSource::AchievementBonus)
        .collect();
    assert_eq!(bonuses.len(), 1);
    assert_eq!(bonuses[0].amount, 115);
}

#[test]
fn test_failed_xp_append_rolls_back_completion() {
    let catalog = catalog_with_challenge(50);
    let mut ledger = FlakyLedger::failing_after(0);
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        assert!(service
            .complete_daily_challenge("u1", "ch-1", 100, 5)
            .is_err());
    }

    // The failed operation left nothing behind: no record, no XP
    assert!(store.challenge_completions("u1").is_empty());
    assert_eq!(ledger.total_xp("u1").unwrap(), 0);

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let retry = service
            .complete_daily_challenge("u1", "ch-1", 100, 5)
            .unwrap();
        assert!(!retry.already_completed);
        assert_eq!(retry.xp_awarded, 50);
    }
    assert_eq!(ledger.total_xp("u1").unwrap(), 50);
}

#[test]
fn test_failed_bonus_append_keeps_goal_retryable() {
    let catalog = MemoryCatalog::new();
    let mut ledger = FlakyLedger::failing_after(0);
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let mut goal = LearningGoal::new("g1", GoalKind::LessonCount, 5);
        goal.advance(4, Utc::now());
        service.set_goal("u1", goal).unwrap();

        assert!(service
            .update_goal_progress("u1", GoalKind::LessonCount, 1)
            .is_err());
    }

    // The goal rolled back to its pre-advance state, so the bonus can
    // still be earned
    let active = store.active_goal("u1", GoalKind::LessonCount).unwrap();
    assert!(!active.is_completed());
    assert_eq!(active.current_value, 4);

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let result = service
            .update_goal_progress("u1", GoalKind::LessonCount, 1)
            .unwrap();
        assert!(result.is_completed);
        assert_eq!(result.bonus_awarded, 50);
    }
    assert_eq!(ledger.total_xp("u1").unwrap(), 50);
}

#[test]
fn test_failed_achievement_append_rolls_back_award() {
    let mut catalog = catalog_with_challenge(50);
    catalog.add_achievement(AchievementType {
        id: "first_challenge".to_string(),
        name: "Challenger".to_string(),
        description: "Complete a daily challenge".to_string(),
        tier: AchievementTier::Bronze,
        rule: TriggerRule::ChallengesCompleted { count: 1 },
        xp_reward: 100,
    });
    // Challenge XP lands, the achievement bonus append fails
    let mut ledger = FlakyLedger::failing_after(1);
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        assert!(service
            .complete_daily_challenge("u1", "ch-1", 100, 5)
            .is_err());
    }

    // The challenge completion stands, the award does not
    assert_eq!(store.challenge_completions("u1").len(), 1);
    assert!(store.awards("u1").is_empty());
    assert_eq!(ledger.total_xp("u1").unwrap(), 50);

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let newly = service.evaluate_achievements("u1").unwrap();
        assert_eq!(newly.len(), 1);
        assert_eq!(newly[0].xp_awarded, 100);
    }
    assert_eq!(ledger.total_xp("u1").unwrap(), 150);
}

#[test]
fn test_failed_milestone_append_restores_progress() {
    let mut catalog = MemoryCatalog::new();
    catalog
        .add_tree(SkillTree {
            id: "mech".to_string(),
            discipline: "mechanical".to_string(),
            nodes: vec![SkillNode {
                id: "capstone".to_string(),
                name: "Capstone".to_string(),
                tier: SkillTier::Mastery,
                xp_required: 200,
                prerequisites: vec![],
                is_milestone: true,
            }],
        })
        .unwrap();
    let mut ledger = FlakyLedger::failing_after(0);
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        assert!(service.complete_skill_node("u1", "capstone").is_err());
    }

    assert!(store.skill_progress("u1", "capstone").is_none());
    assert_eq!(ledger.total_xp("u1").unwrap(), 0);

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let retry = service.complete_skill_node("u1", "capstone").unwrap();
        assert!(retry.newly_completed);
        assert_eq!(retry.xp_awarded, 40);
    }
    assert_eq!(ledger.total_xp("u1").unwrap(), 40);
}

#[test]
fn test_inactive_challenge_rejected() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_challenge(Challenge {
        id: "ch-old".to_string(),
        description: "Yesterday's warm-up".to_string(),
        reward_points: 50,
        is_active: false,
        challenge_date: Utc::now().date_naive(),
    });
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        let err = service
            .complete_daily_challenge("u1", "ch-old", 100, 5)
            .unwrap_err();
        assert!(matches!(err, ProgressionError::NotFound { .. }));
    }

    assert!(store.challenge_completions("u1").is_empty());
    assert!(ledger.is_empty());
}

#[test]
fn test_snapshot_reflects_total_ledger() {
    let catalog = MemoryCatalog::new();
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    ledger
        .append("u1", 400, XpSource::LessonCompletion, "seed")
        .unwrap();

    let service = CompletionService::new(&mut ledger, &mut store, &catalog);
    let snap = service.progression_snapshot("u1").unwrap();
    assert_eq!(snap.total_xp, 400);
    assert_eq!(snap.current_level, 2);
    assert_eq!(snap.xp_into_level, 0);
}

#[test]
fn test_completion_records_streak_day() {
    let catalog = catalog_with_challenge(50);
    let mut ledger = MemoryLedger::new();
    let mut store = MemoryStore::new();

    let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
    service
        .complete_daily_challenge("u1", "ch-1", 100, 5)
        .unwrap();

    let streak = service.streak_status("u1");
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.last_activity_date, Some(Utc::now().date_naive()));
}
