//! Prerequisite resolution for skill nodes and course modules.
//!
//! The resolver only reads persisted progress; it never mutates. Trees are
//! acyclic by authoring-time validation, so a single pass over a tree's
//! nodes resolves every unlock without chasing chains.

use std::collections::HashSet;

use crate::catalog::{Catalog, CourseModule};
use crate::skills::{NodeStatus, SkillNode, SkillTree};
use crate::store::ProgressStore;

pub struct UnlockResolver<'a> {
    store: &'a dyn ProgressStore,
}

impl<'a> UnlockResolver<'a> {
    pub fn new(store: &'a dyn ProgressStore) -> Self {
        Self { store }
    }

    /// A node with no prerequisites is always unlocked; otherwise every
    /// prerequisite needs a completed progress record for this user. A
    /// missing record reads as locked, never as an error.
    pub fn is_unlocked(&self, user_id: &str, node: &SkillNode) -> bool {
        node.prerequisites.iter().all(|prereq| {
            self.store
                .skill_progress(user_id, prereq)
                .map(|p| p.is_completed())
                .unwrap_or(false)
        })
    }

    /// Prerequisites of `node` the user has not completed yet
    pub fn missing_prerequisites(&self, user_id: &str, node: &SkillNode) -> Vec<String> {
        node.prerequisites
            .iter()
            .filter(|prereq| {
                !self
                    .store
                    .skill_progress(user_id, prereq)
                    .map(|p| p.is_completed())
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Effective status of a node for a user: the persisted record if one
    /// exists, otherwise derived from prerequisite state.
    pub fn node_status(&self, user_id: &str, node: &SkillNode) -> NodeStatus {
        if let Some(progress) = self.store.skill_progress(user_id, &node.id) {
            return progress.status;
        }
        if self.is_unlocked(user_id, node) {
            NodeStatus::Available
        } else {
            NodeStatus::Locked
        }
    }

    /// Ids of all nodes in `tree` currently unlocked for the user
    pub fn unlocked_nodes(&self, user_id: &str, tree: &SkillTree) -> HashSet<String> {
        tree.nodes
            .iter()
            .filter(|n| self.is_unlocked(user_id, n))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Share of a module's lessons the user has completed, 0-100
    pub fn module_completion_percentage(&self, user_id: &str, module: &CourseModule) -> u8 {
        if module.lesson_ids.is_empty() {
            return 0;
        }
        let completed = module
            .lesson_ids
            .iter()
            .filter(|id| self.store.lesson_completion(user_id, id).is_some())
            .count();
        ((100 * completed) / module.lesson_ids.len()) as u8
    }

    /// A module opens once every prerequisite module's completion
    /// percentage reaches this module's configured requirement. A
    /// prerequisite missing from the catalog reads as locked.
    pub fn is_module_unlocked(
        &self,
        user_id: &str,
        module: &CourseModule,
        catalog: &dyn Catalog,
    ) -> bool {
        module.prerequisites.iter().all(|prereq_id| {
            catalog
                .module(prereq_id)
                .map(|prereq| {
                    self.module_completion_percentage(user_id, prereq) >= module.unlock_requirement
                })
                .unwrap_or(false)
        })
    }
}
