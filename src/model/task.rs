use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Classification separating independent tree instances (e.g. a live
/// project vs a reusable template). Reparenting across origins is always
/// invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Instance,
    Template,
}

/// Task completion status, independent of tree position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

/// A work item in the tree. Tasks form a forest via `parent_task_id`;
/// siblings under the same parent (and origin) are ordered by `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique identifier
    pub id: String,
    /// `None` means this task is the root of its tree (a project)
    pub parent_task_id: Option<String>,
    /// Id of the top-level ancestor; a root's `root_id` is its own `id`
    pub root_id: String,
    /// Tree-instance class; equals the parent's origin when a parent exists
    pub origin: Origin,
    /// Sort key among siblings. Unique within a sibling set, not contiguous.
    pub position: i64,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
}

impl Task {
    /// Create a root task (a project). Its `root_id` is its own id.
    pub fn new_root(id: impl Into<String>, origin: Origin) -> Self {
        let id = id.into();
        Task {
            root_id: id.clone(),
            id,
            parent_task_id: None,
            origin,
            position: 0,
            start_date: None,
            due_date: None,
            status: TaskStatus::Todo,
        }
    }

    /// Create a child of `parent`, inheriting its origin and root id.
    /// The position is assigned when the task is inserted into a tree.
    pub fn new_child(id: impl Into<String>, parent: &Task) -> Self {
        Task {
            id: id.into(),
            parent_task_id: Some(parent.id.clone()),
            root_id: parent.root_id.clone(),
            origin: parent.origin,
            position: 0,
            start_date: None,
            due_date: None,
            status: TaskStatus::Todo,
        }
    }

    /// Whether this task is the root of its tree
    pub fn is_root(&self) -> bool {
        self.parent_task_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_root_points_root_id_at_itself() {
        let t = Task::new_root("p1", Origin::Instance);
        assert_eq!(t.root_id, "p1");
        assert!(t.is_root());
        assert_eq!(t.status, TaskStatus::Todo);
    }

    #[test]
    fn new_child_inherits_origin_and_root() {
        let root = Task::new_root("p1", Origin::Template);
        let child = Task::new_child("t1", &root);
        assert_eq!(child.parent_task_id.as_deref(), Some("p1"));
        assert_eq!(child.root_id, "p1");
        assert_eq!(child.origin, Origin::Template);
        assert!(!child.is_root());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }
}
