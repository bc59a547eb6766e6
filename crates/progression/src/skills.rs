//! Skill trees and per-user node progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ProgressionError;

/// Depth band of a node within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    Foundation,
    Core,
    Advanced,
    Specialization,
    Mastery,
}

/// One node of a skill tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillNode {
    pub id: String,
    pub name: String,
    pub tier: SkillTier,
    /// XP requirement for engaging this node (display/eligibility hint,
    /// not an award amount)
    pub xp_required: u32,
    /// All listed node ids must be completed before this node unlocks
    pub prerequisites: Vec<String>,
    pub is_milestone: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTree {
    pub id: String,
    pub discipline: String,
    pub nodes: Vec<SkillNode>,
}

impl SkillTree {
    pub fn node(&self, id: &str) -> Option<&SkillNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Authoring-time check: every prerequisite must name a node in this
    /// tree and the prerequisite graph must be acyclic. The runtime
    /// resolver assumes both hold.
    pub fn validate(&self) -> Result<(), ProgressionError> {
        let by_id: HashMap<&str, &SkillNode> =
            self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        if by_id.len() != self.nodes.len() {
            return Err(ProgressionError::InvalidTree(format!(
                "tree {} has duplicate node ids",
                self.id
            )));
        }

        for node in &self.nodes {
            for prereq in &node.prerequisites {
                if !by_id.contains_key(prereq.as_str()) {
                    return Err(ProgressionError::InvalidTree(format!(
                        "node {} requires unknown node {}",
                        node.id, prereq
                    )));
                }
            }
        }

        // DFS cycle check: 0 = unvisited, 1 = on stack, 2 = done
        let mut state: HashMap<&str, u8> = HashMap::new();
        for node in &self.nodes {
            if self.has_cycle(node.id.as_str(), &by_id, &mut state) {
                return Err(ProgressionError::InvalidTree(format!(
                    "cycle through node {} in tree {}",
                    node.id, self.id
                )));
            }
        }
        Ok(())
    }

    fn has_cycle<'a>(
        &self,
        id: &'a str,
        by_id: &HashMap<&'a str, &'a SkillNode>,
        state: &mut HashMap<&'a str, u8>,
    ) -> bool {
        match state.get(id) {
            Some(1) => return true,
            Some(2) => return false,
            _ => {}
        }
        state.insert(id, 1);
        if let Some(node) = by_id.get(id) {
            for prereq in &node.prerequisites {
                if let Some((&key, _)) = by_id.get_key_value(prereq.as_str()) {
                    if self.has_cycle(key, by_id, state) {
                        return true;
                    }
                }
            }
        }
        state.insert(id, 2);
        false
    }
}

/// Per-user completion state of one skill node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Locked,
    Available,
    InProgress,
    Completed,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "locked"),
            Self::Available => write!(f, "available"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Per-user, per-node progress record. Advances forward only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillProgress {
    pub node_id: String,
    pub status: NodeStatus,
    /// 0-100
    pub progress_percentage: u8,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SkillProgress {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            status: NodeStatus::Available,
            progress_percentage: 0,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == NodeStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, prereqs: &[&str]) -> SkillNode {
        SkillNode {
            id: id.to_string(),
            name: id.to_uppercase(),
            tier: SkillTier::Foundation,
            xp_required: 100,
            prerequisites: prereqs.iter().map(|s| s.to_string()).collect(),
            is_milestone: false,
        }
    }

    #[test]
    fn test_validate_accepts_linear_chain() {
        let tree = SkillTree {
            id: "t1".to_string(),
            discipline: "mechanical".to_string(),
            nodes: vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])],
        };
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_prerequisite() {
        let tree = SkillTree {
            id: "t1".to_string(),
            discipline: "mechanical".to_string(),
            nodes: vec![node("a", &["ghost"])],
        };
        assert!(matches!(
            tree.validate(),
            Err(ProgressionError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let tree = SkillTree {
            id: "t1".to_string(),
            discipline: "mechanical".to_string(),
            nodes: vec![node("a", &["c"]), node("b", &["a"]), node("c", &["b"])],
        };
        assert!(matches!(
            tree.validate(),
            Err(ProgressionError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let tree = SkillTree {
            id: "t1".to_string(),
            discipline: "electrical".to_string(),
            nodes: vec![node("a", &[]), node("a", &[])],
        };
        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_status_ordering() {
        assert!(NodeStatus::Locked < NodeStatus::Available);
        assert!(NodeStatus::InProgress < NodeStatus::Completed);
    }
}
