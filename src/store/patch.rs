use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::{Task, TaskStatus};

/// Which task field a change touches. Revert bookkeeping is tracked at
/// this granularity: each field remembers the operation that last wrote it,
/// and a failed operation only restores fields it still owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    ParentTaskId,
    RootId,
    Position,
    StartDate,
    DueDate,
    Status,
}

/// A single-field change on a task. Carries the new value; the matching
/// restore value is captured from the tree at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldChange {
    ParentTaskId(Option<String>),
    RootId(String),
    Position(i64),
    StartDate(Option<NaiveDate>),
    DueDate(Option<NaiveDate>),
    Status(TaskStatus),
}

impl FieldChange {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldChange::ParentTaskId(_) => FieldKind::ParentTaskId,
            FieldChange::RootId(_) => FieldKind::RootId,
            FieldChange::Position(_) => FieldKind::Position,
            FieldChange::StartDate(_) => FieldKind::StartDate,
            FieldChange::DueDate(_) => FieldKind::DueDate,
            FieldChange::Status(_) => FieldKind::Status,
        }
    }

    /// Read the current value of this change's field from `task`,
    /// producing the change that would restore it
    pub fn capture_inverse(&self, task: &Task) -> FieldChange {
        match self {
            FieldChange::ParentTaskId(_) => {
                FieldChange::ParentTaskId(task.parent_task_id.clone())
            }
            FieldChange::RootId(_) => FieldChange::RootId(task.root_id.clone()),
            FieldChange::Position(_) => FieldChange::Position(task.position),
            FieldChange::StartDate(_) => FieldChange::StartDate(task.start_date),
            FieldChange::DueDate(_) => FieldChange::DueDate(task.due_date),
            FieldChange::Status(_) => FieldChange::Status(task.status),
        }
    }

    /// Write this change's value into `task`
    pub fn apply(&self, task: &mut Task) {
        match self {
            FieldChange::ParentTaskId(v) => task.parent_task_id = v.clone(),
            FieldChange::RootId(v) => task.root_id = v.clone(),
            FieldChange::Position(v) => task.position = *v,
            FieldChange::StartDate(v) => task.start_date = *v,
            FieldChange::DueDate(v) => task.due_date = *v,
            FieldChange::Status(v) => task.status = *v,
        }
    }
}

/// A batch of field changes to one task — the unit handed to the
/// persistence layer, and the unit restored when persistence fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    pub task_id: String,
    pub changes: Vec<FieldChange>,
}

impl TaskPatch {
    pub fn new(task_id: impl Into<String>) -> Self {
        TaskPatch {
            task_id: task_id.into(),
            changes: Vec::new(),
        }
    }

    pub fn push(&mut self, change: FieldChange) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
