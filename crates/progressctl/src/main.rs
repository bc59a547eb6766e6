//! Progression Control - CLI for the learning progression engine.
//!
//! Exposes the engine's boundary operations (snapshots, streaks, skill
//! trees, completions, goals) over a local state directory.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "progressctl")]
#[command(about = "Learning progression engine - XP, levels, streaks, skill trees", long_about = None)]
#[command(version)]
struct Cli {
    /// State directory holding the XP journal, progress, and catalog files
    #[arg(long, global = true, default_value = progression::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show level, XP, and streak summary for a user
    Status { user: String },

    /// Show streak detail including freeze balance
    Streak { user: String },

    /// Show node status for one skill tree
    Skills { user: String, tree: String },

    /// List earned achievements
    Achievements { user: String },

    /// Complete a daily challenge
    CompleteChallenge {
        user: String,
        challenge: String,
        /// Score achieved, 0-100
        #[arg(long)]
        score: u8,
        /// Minutes spent
        #[arg(long, default_value_t = 0)]
        minutes: u32,
    },

    /// Record lesson progress (awards XP at 100%)
    CompleteLesson {
        user: String,
        lesson: String,
        /// Completion percentage, 0-100
        #[arg(long, default_value_t = 100)]
        percent: u8,
    },

    /// Submit a quiz score
    CompleteQuiz {
        user: String,
        quiz: String,
        #[arg(long)]
        score: u8,
    },

    /// Create or advance a learning goal
    Goal {
        user: String,
        /// Goal kind: lesson_count, quiz_count, challenge_count,
        /// study_minutes, xp_earned
        kind: String,
        /// Progress to add to the active goal
        #[arg(long, default_value_t = 0)]
        add: u32,
        /// Create a new goal with this target first
        #[arg(long)]
        target: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let ctx = commands::Ctx::new(cli.data_dir, cli.json);

    match cli.command {
        Commands::Status { user } => commands::status(&ctx, &user),
        Commands::Streak { user } => commands::streak(&ctx, &user),
        Commands::Skills { user, tree } => commands::skills(&ctx, &user, &tree),
        Commands::Achievements { user } => commands::achievements(&ctx, &user),
        Commands::CompleteChallenge {
            user,
            challenge,
            score,
            minutes,
        } => commands::complete_challenge(&ctx, &user, &challenge, score, minutes),
        Commands::CompleteLesson {
            user,
            lesson,
            percent,
        } => commands::complete_lesson(&ctx, &user, &lesson, percent),
        Commands::CompleteQuiz { user, quiz, score } => {
            commands::complete_quiz(&ctx, &user, &quiz, score)
        }
        Commands::Goal {
            user,
            kind,
            add,
            target,
        } => commands::goal(&ctx, &user, &kind, add, target),
    }
}
