//! XP ledger: append-only record of experience-point events.
//!
//! The ledger is the single source of truth for a user's total XP. Levels,
//! snapshots, and achievement thresholds are all derived from it on read.
//! Entries are never updated or deleted once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::ProgressionError;

/// Where an XP transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    LessonCompletion,
    QuizCompletion,
    DailyChallenge,
    GoalCompletion,
    SkillMilestone,
    AchievementBonus,
}

impl std::fmt::Display for XpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LessonCompletion => write!(f, "lesson_completion"),
            Self::QuizCompletion => write!(f, "quiz_completion"),
            Self::DailyChallenge => write!(f, "daily_challenge"),
            Self::GoalCompletion => write!(f, "goal_completion"),
            Self::SkillMilestone => write!(f, "skill_milestone"),
            Self::AchievementBonus => write!(f, "achievement_bonus"),
        }
    }
}

/// A single immutable XP-earning event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpTransaction {
    pub id: Uuid,
    pub user_id: String,
    /// Always positive; enforced on append
    pub amount: u32,
    pub source: XpSource,
    /// Id of the lesson/challenge/goal/achievement that produced this
    pub reference_id: String,
    pub created_at: DateTime<Utc>,
}

impl XpTransaction {
    pub fn new(user_id: &str, amount: u32, source: XpSource, reference_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount,
            source,
            reference_id: reference_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only XP store. The completion service is the only writer; every
/// other component reads totals or transaction history.
pub trait XpLedger {
    /// Append one transaction. Rejects non-positive amounts with
    /// `InvalidAmount` and performs no write in that case.
    fn append(
        &mut self,
        user_id: &str,
        amount: i64,
        source: XpSource,
        reference_id: &str,
    ) -> Result<XpTransaction, ProgressionError>;

    /// All transactions for a user, oldest first.
    fn transactions(&self, user_id: &str) -> Result<Vec<XpTransaction>, ProgressionError>;

    /// Total XP = sum of all amounts for the user.
    fn total_xp(&self, user_id: &str) -> Result<u64, ProgressionError> {
        Ok(self
            .transactions(user_id)?
            .iter()
            .map(|t| t.amount as u64)
            .sum())
    }
}

fn validate_amount(amount: i64) -> Result<u32, ProgressionError> {
    if amount <= 0 || amount > u32::MAX as i64 {
        return Err(ProgressionError::InvalidAmount(amount));
    }
    Ok(amount as u32)
}

/// In-memory ledger for tests and embedded use
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLedger {
    entries: Vec<XpTransaction>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl XpLedger for MemoryLedger {
    fn append(
        &mut self,
        user_id: &str,
        amount: i64,
        source: XpSource,
        reference_id: &str,
    ) -> Result<XpTransaction, ProgressionError> {
        let amount = validate_amount(amount)?;
        let tx = XpTransaction::new(user_id, amount, source, reference_id);
        self.entries.push(tx.clone());
        Ok(tx)
    }

    fn transactions(&self, user_id: &str) -> Result<Vec<XpTransaction>, ProgressionError> {
        Ok(self
            .entries
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Ledger backed by an append-only JSONL file.
///
/// One JSON object per line, appended with fsync. Malformed lines are
/// skipped on read for forward compatibility.
pub struct JournalLedger {
    path: PathBuf,
}

impl JournalLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal at `<data_dir>/xp.jsonl`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(crate::JOURNAL_FILE))
    }

    fn read_all(&self) -> Result<Vec<XpTransaction>, ProgressionError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(tx) => entries.push(tx),
                Err(e) => {
                    tracing::warn!("skipping malformed journal line: {e}");
                }
            }
        }
        Ok(entries)
    }
}

impl XpLedger for JournalLedger {
    fn append(
        &mut self,
        user_id: &str,
        amount: i64,
        source: XpSource,
        reference_id: &str,
    ) -> Result<XpTransaction, ProgressionError> {
        let amount = validate_amount(amount)?;
        let tx = XpTransaction::new(user_id, amount, source, reference_id);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&tx)?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;

        Ok(tx)
    }

    fn transactions(&self, user_id: &str) -> Result<Vec<XpTransaction>, ProgressionError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect())
    }
}
