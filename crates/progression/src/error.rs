//! Error types for the progression engine.
//!
//! "Already completed" is deliberately absent: duplicate completions are a
//! soft signal on the result structs, not a failure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressionError {
    #[error("Invalid XP amount: {0} (must be a positive integer)")]
    InvalidAmount(i64),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Prerequisites not met for skill node {node_id}: {missing:?} not completed")]
    PrerequisiteNotMet {
        node_id: String,
        missing: Vec<String>,
    },

    #[error("Invalid skill tree: {0}")]
    InvalidTree(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProgressionError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
