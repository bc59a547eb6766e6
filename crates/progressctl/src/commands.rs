//! Command implementations for progressctl.
//!
//! Each command loads the file-backed stores, runs one engine operation,
//! saves mutated state, and prints either human-readable or JSON output.

use anyhow::{anyhow, bail, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use progression::{
    level_title, Catalog, CompletionService, GoalKind, JournalLedger, LearningGoal,
    MemoryCatalog, MemoryStore, ProgressStore, UnlockResolver,
};

pub struct Ctx {
    data_dir: PathBuf,
    json: bool,
}

impl Ctx {
    pub fn new(data_dir: PathBuf, json: bool) -> Self {
        Self { data_dir, json }
    }

    fn store_path(&self) -> PathBuf {
        MemoryStore::state_path(&self.data_dir)
    }
}

fn load_catalog(data_dir: &Path) -> Result<MemoryCatalog> {
    let path = data_dir.join(progression::CATALOG_FILE);
    if !path.exists() {
        return Ok(MemoryCatalog::with_default_achievements());
    }
    let content = fs::read_to_string(&path)?;
    let catalog = serde_json::from_str(&content)?;
    Ok(catalog)
}

fn parse_goal_kind(kind: &str) -> Result<GoalKind> {
    Ok(match kind {
        "lesson_count" => GoalKind::LessonCount,
        "quiz_count" => GoalKind::QuizCount,
        "challenge_count" => GoalKind::ChallengeCount,
        "study_minutes" => GoalKind::StudyMinutes,
        "xp_earned" => GoalKind::XpEarned,
        other => bail!("unknown goal kind: {other}"),
    })
}

pub fn status(ctx: &Ctx, user: &str) -> Result<()> {
    let mut ledger = JournalLedger::in_dir(&ctx.data_dir);
    let mut store = MemoryStore::load(&ctx.store_path())?;
    let catalog = load_catalog(&ctx.data_dir)?;
    let service = CompletionService::new(&mut ledger, &mut store, &catalog);

    let snap = service.progression_snapshot(user)?;
    let streak = service.streak_status(user);

    if ctx.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "snapshot": snap,
                "streak": streak,
                "title": level_title(snap.current_level),
            }))?
        );
        return Ok(());
    }

    println!(
        "{} {} ({})",
        "Level".bold(),
        snap.current_level,
        level_title(snap.current_level)
    );
    println!(
        "  {} XP total, {}/{} into level ({}%)",
        snap.total_xp, snap.xp_into_level, snap.xp_to_next_level, snap.progress_percentage
    );
    println!(
        "  Streak: {} day(s), longest {}",
        streak.current_streak.green(),
        streak.longest_streak
    );
    Ok(())
}

pub fn streak(ctx: &Ctx, user: &str) -> Result<()> {
    let store = MemoryStore::load(&ctx.store_path())?;
    let streak = ProgressStore::streak(&store, user);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&streak)?);
        return Ok(());
    }

    println!("{}", "Streak".bold());
    println!("  current: {} day(s)", streak.current_streak);
    println!("  longest: {} day(s)", streak.longest_streak);
    match streak.last_activity_date {
        Some(date) => println!("  last active: {date}"),
        None => println!("  last active: never"),
    }
    println!(
        "  freezes: {} available, {} used",
        streak.freezes_available, streak.freezes_used
    );
    Ok(())
}

pub fn skills(ctx: &Ctx, user: &str, tree_id: &str) -> Result<()> {
    let store = MemoryStore::load(&ctx.store_path())?;
    let catalog = load_catalog(&ctx.data_dir)?;
    let tree = catalog
        .skill_tree(tree_id)
        .ok_or_else(|| anyhow!("unknown skill tree: {tree_id}"))?;
    let resolver = UnlockResolver::new(&store);

    if ctx.json {
        let nodes: Vec<_> = tree
            .nodes
            .iter()
            .map(|n| {
                json!({
                    "id": n.id,
                    "tier": n.tier,
                    "status": resolver.node_status(user, n).to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "nodes": nodes }))?);
        return Ok(());
    }

    println!("{} ({})", tree.id.bold(), tree.discipline);
    for node in &tree.nodes {
        let status = resolver.node_status(user, node);
        println!("  [{status}] {} - {}", node.id, node.name);
    }
    Ok(())
}

pub fn achievements(ctx: &Ctx, user: &str) -> Result<()> {
    let store = MemoryStore::load(&ctx.store_path())?;
    let catalog = load_catalog(&ctx.data_dir)?;
    let awards = ProgressStore::awards(&store, user);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&awards)?);
        return Ok(());
    }

    if awards.is_empty() {
        println!("No achievements earned yet.");
        return Ok(());
    }
    println!("{}", "Achievements".bold());
    for award in &awards {
        let name = catalog
            .achievements()
            .iter()
            .find(|a| a.id == award.achievement_id)
            .map(|a| a.name.as_str())
            .unwrap_or(award.achievement_id.as_str());
        println!(
            "  {} (+{} XP) earned {}",
            name.green(),
            award.xp_awarded,
            award.earned_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

pub fn complete_challenge(
    ctx: &Ctx,
    user: &str,
    challenge: &str,
    score: u8,
    minutes: u32,
) -> Result<()> {
    let mut ledger = JournalLedger::in_dir(&ctx.data_dir);
    let mut store = MemoryStore::load(&ctx.store_path())?;
    let catalog = load_catalog(&ctx.data_dir)?;

    let result = {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        service.complete_daily_challenge(user, challenge, score, minutes)?
    };
    store.save(&ctx.store_path())?;

    if ctx.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "xp_awarded": result.xp_awarded,
                "already_completed": result.already_completed,
            }))?
        );
        return Ok(());
    }

    if result.already_completed {
        // Informational, not an error: retries must not read as failures
        println!(
            "Already completed today ({} XP previously awarded).",
            result.xp_awarded
        );
    } else {
        println!("{} +{} XP", "Challenge complete!".green().bold(), result.xp_awarded);
    }
    Ok(())
}

pub fn complete_lesson(ctx: &Ctx, user: &str, lesson: &str, percent: u8) -> Result<()> {
    let mut ledger = JournalLedger::in_dir(&ctx.data_dir);
    let mut store = MemoryStore::load(&ctx.store_path())?;
    let catalog = load_catalog(&ctx.data_dir)?;

    let result = {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        service.complete_lesson(user, lesson, percent)?
    };
    store.save(&ctx.store_path())?;

    if ctx.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "xp_awarded": result.xp_awarded,
                "already_completed": result.already_completed,
            }))?
        );
        return Ok(());
    }

    if result.already_completed {
        println!("Lesson already completed; no additional XP.");
    } else if result.xp_awarded > 0 {
        println!("{} +{} XP", "Lesson complete!".green().bold(), result.xp_awarded);
    } else {
        println!("Progress recorded ({percent}%).");
    }
    Ok(())
}

pub fn complete_quiz(ctx: &Ctx, user: &str, quiz: &str, score: u8) -> Result<()> {
    let mut ledger = JournalLedger::in_dir(&ctx.data_dir);
    let mut store = MemoryStore::load(&ctx.store_path())?;
    let catalog = load_catalog(&ctx.data_dir)?;

    let result = {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        service.complete_quiz(user, quiz, score)?
    };
    store.save(&ctx.store_path())?;

    if ctx.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "xp_awarded": result.xp_awarded,
                "passed": result.passed,
                "already_completed": result.already_completed,
            }))?
        );
        return Ok(());
    }

    if result.already_completed {
        println!("Quiz already passed; no additional XP.");
    } else if result.passed {
        println!("{} +{} XP", "Quiz passed!".green().bold(), result.xp_awarded);
    } else {
        println!("{} (score {score}). Try again.", "Not passed".red());
    }
    Ok(())
}

pub fn goal(ctx: &Ctx, user: &str, kind: &str, add: u32, target: Option<u32>) -> Result<()> {
    let goal_kind = parse_goal_kind(kind)?;
    let mut ledger = JournalLedger::in_dir(&ctx.data_dir);
    let mut store = MemoryStore::load(&ctx.store_path())?;
    let catalog = load_catalog(&ctx.data_dir)?;

    let result = {
        let mut service = CompletionService::new(&mut ledger, &mut store, &catalog);
        if let Some(target) = target {
            service.set_goal(user, LearningGoal::new(kind, goal_kind, target))?;
        }
        if add > 0 {
            Some(service.update_goal_progress(user, goal_kind, add)?)
        } else {
            None
        }
    };
    store.save(&ctx.store_path())?;

    match result {
        Some(result) if ctx.json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "current_value": result.current_value,
                    "target_value": result.target_value,
                    "is_completed": result.is_completed,
                    "bonus_awarded": result.bonus_awarded,
                }))?
            );
        }
        Some(result) => {
            if result.is_completed && result.bonus_awarded > 0 {
                println!(
                    "{} {}/{} (+{} XP bonus)",
                    "Goal complete!".green().bold(),
                    result.current_value,
                    result.target_value,
                    result.bonus_awarded
                );
            } else {
                println!("Goal progress: {}/{}", result.current_value, result.target_value);
            }
        }
        None if ctx.json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "created": true }))?);
        }
        None => println!("Goal set."),
    }
    Ok(())
}
