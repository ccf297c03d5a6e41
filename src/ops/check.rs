use std::collections::HashMap;

use serde::Serialize;

use crate::model::task::{Origin, Task};
use crate::model::tree::TaskTree;

/// Structured result of validating a tree, suitable for JSON output
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A structural invariant violation (something that must be fixed)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// A task's parent id doesn't resolve to any task
    #[serde(rename = "dangling_parent")]
    DanglingParent { task_id: String, parent_id: String },
    /// Following parent links from this task never reaches a root
    #[serde(rename = "parent_cycle")]
    ParentCycle { task_id: String },
    /// A task's origin differs from its parent's
    #[serde(rename = "origin_mismatch")]
    OriginMismatch { task_id: String, parent_id: String },
    /// Two or more siblings share a position key
    #[serde(rename = "duplicate_position")]
    DuplicatePosition {
        parent_id: Option<String>,
        position: i64,
        task_ids: Vec<String>,
    },
    /// A task's denormalized root_id disagrees with its ancestor chain
    #[serde(rename = "root_id_mismatch")]
    RootIdMismatch {
        task_id: String,
        expected: String,
        found: String,
    },
    /// The same id appeared more than once in the source list
    #[serde(rename = "duplicate_id")]
    DuplicateId { task_id: String },
}

/// A non-critical issue
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// due_date earlier than start_date (allowed, but usually a data entry slip)
    #[serde(rename = "due_before_start")]
    DueBeforeStart { task_id: String },
}

/// Validate a flat task list before building a tree from it. Reports
/// duplicate ids (which `TaskTree::from_tasks` would silently collapse) on
/// top of everything `check_tree` reports.
pub fn check_tasks(tasks: &[Task]) -> CheckResult {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for task in tasks {
        *seen.entry(task.id.as_str()).or_insert(0) += 1;
    }
    let mut duplicates: Vec<&str> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    duplicates.sort_unstable();
    let duplicate_errors: Vec<CheckError> = duplicates
        .into_iter()
        .map(|id| CheckError::DuplicateId {
            task_id: id.to_string(),
        })
        .collect();

    let tree = TaskTree::from_tasks(tasks.to_vec());
    let mut result = check_tree(&tree);
    result.errors.extend(duplicate_errors);
    result.valid = result.errors.is_empty();
    result
}

/// Validate the structural invariants of a tree.
///
/// This is a read-only operation — it does not modify the tree.
///
/// Checks performed:
/// 1. Every `parent_task_id` resolves to an existing task
/// 2. Parent links are acyclic
/// 3. Every task's origin equals its parent's origin
/// 4. Positions are distinct within each sibling set
/// 5. `root_id` matches the top of each task's ancestor chain
pub fn check_tree(tree: &TaskTree) -> CheckResult {
    let mut result = CheckResult::default();

    for task in tree.iter() {
        check_parent_link(tree, task, &mut result);
        check_ancestry(tree, task, &mut result);
        if let (Some(start), Some(due)) = (task.start_date, task.due_date) {
            if due < start {
                result.warnings.push(CheckWarning::DueBeforeStart {
                    task_id: task.id.clone(),
                });
            }
        }
    }

    check_sibling_positions(tree, &mut result);

    result.valid = result.errors.is_empty();
    result
}

fn check_parent_link(tree: &TaskTree, task: &Task, result: &mut CheckResult) {
    let Some(parent_id) = task.parent_task_id.as_deref() else {
        return;
    };
    match tree.get(parent_id) {
        None => result.errors.push(CheckError::DanglingParent {
            task_id: task.id.clone(),
            parent_id: parent_id.to_string(),
        }),
        Some(parent) => {
            if parent.origin != task.origin {
                result.errors.push(CheckError::OriginMismatch {
                    task_id: task.id.clone(),
                    parent_id: parent_id.to_string(),
                });
            }
        }
    }
}

/// Walk the ancestor chain: flag cycles, and verify the denormalized
/// root_id against the chain's terminal root.
fn check_ancestry(tree: &TaskTree, task: &Task, result: &mut CheckResult) {
    let chain: Vec<&Task> = tree.self_and_ancestors(&task.id).collect();

    let revisits_self = chain.iter().skip(1).any(|t| t.id == task.id);
    let terminal = chain.last();
    let reached_root = terminal.map(|t| t.is_root()).unwrap_or(false);
    // The walk stopped with a live parent link still ahead: the depth
    // guard tripped, which only happens on a cycle (or absurd nesting).
    let truncated = !reached_root
        && terminal
            .and_then(|t| t.parent_task_id.as_deref())
            .map(|pid| tree.get(pid).is_some())
            .unwrap_or(false);

    if revisits_self || truncated {
        result.errors.push(CheckError::ParentCycle {
            task_id: task.id.clone(),
        });
        return;
    }

    if reached_root {
        let expected = &chain[chain.len() - 1].id;
        if &task.root_id != expected {
            result.errors.push(CheckError::RootIdMismatch {
                task_id: task.id.clone(),
                expected: expected.clone(),
                found: task.root_id.clone(),
            });
        }
    }
    // Dangling chains are reported by check_parent_link at the break point.
}

fn check_sibling_positions(tree: &TaskTree, result: &mut CheckResult) {
    let mut sets: HashMap<(Option<&str>, Origin, i64), Vec<&str>> = HashMap::new();
    for task in tree.iter() {
        sets.entry((task.parent_task_id.as_deref(), task.origin, task.position))
            .or_default()
            .push(task.id.as_str());
    }
    let mut collisions: Vec<_> = sets.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
    collisions.sort_by_key(|((parent, _, position), _)| (parent.map(String::from), *position));
    for ((parent, _, position), mut ids) in collisions {
        ids.sort_unstable();
        result.errors.push(CheckError::DuplicatePosition {
            parent_id: parent.map(String::from),
            position,
            task_ids: ids.into_iter().map(String::from).collect(),
        });
    }
}
