use serde::Serialize;
use thiserror::Error;

use crate::model::task::Origin;
use crate::model::tree::TaskTree;

/// Where a drag gesture was released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// An explicit empty-space/column drop into a parent's child list.
    /// This is the only way to nest: dropping onto a task never makes the
    /// dragged task its child.
    Container {
        parent_id: Option<String>,
        origin: Origin,
    },
    /// A drop onto another task: the dragged task becomes its sibling
    Task { id: String },
}

/// Why a drop was rejected. All of these resolve synchronously, before any
/// mutation, so an invalid gesture never reaches the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropError {
    #[error("dragged task not found: {0}")]
    ActiveNotFound(String),
    #[error("drop target not found: {0}")]
    TargetNotFound(String),
    #[error("cannot move a task into its own subtree")]
    Cycle,
    #[error("cannot move a task to a different origin")]
    OriginMismatch,
    #[error("drop leaves the task where it already is")]
    NoOp,
}

/// The logical outcome of a drop gesture: the new parent and the sibling
/// neighbors bracketing the insertion slot. Neighbors are task ids, not
/// positions, so a renormalization retry can re-read their keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDrop {
    pub new_parent_id: Option<String>,
    pub origin: Origin,
    /// Sibling just before the slot; `None` means inserting at the front
    pub prev: Option<String>,
    /// Sibling just after the slot; `None` means inserting at the end
    pub next: Option<String>,
}

/// Resolve a drag gesture into a validated (parent, neighbor-pair) slot.
///
/// Validation order: the dragged task must exist, the target must exist,
/// the move must not create a cycle, origins must match, and the resolved
/// slot must differ from where the task already sits.
pub fn resolve_drop(
    tree: &TaskTree,
    active_id: &str,
    target: &DropTarget,
) -> Result<ResolvedDrop, DropError> {
    let active = tree
        .get(active_id)
        .ok_or_else(|| DropError::ActiveNotFound(active_id.to_string()))?;

    // Candidate parent and origin. A task target reorders as that task's
    // sibling; a container target nests under the declared parent.
    let (new_parent_id, origin) = match target {
        DropTarget::Container { parent_id, origin } => {
            if let Some(pid) = parent_id.as_deref() {
                tree.get(pid)
                    .ok_or_else(|| DropError::TargetNotFound(pid.to_string()))?;
            }
            (parent_id.clone(), *origin)
        }
        DropTarget::Task { id } => {
            if id == active_id {
                return Err(DropError::NoOp);
            }
            let over = tree
                .get(id)
                .ok_or_else(|| DropError::TargetNotFound(id.to_string()))?;
            (over.parent_task_id.clone(), over.origin)
        }
    };

    // Any depth of descendant counts: walk upward from the candidate
    // parent and reject if the dragged task appears on the chain. The walk
    // is depth-guarded, so malformed parent links can't hang it.
    if let Some(pid) = new_parent_id.as_deref() {
        if tree.self_and_ancestors(pid).any(|t| t.id == active_id) {
            return Err(DropError::Cycle);
        }
    }

    if origin != active.origin {
        return Err(DropError::OriginMismatch);
    }

    // Sibling resolution over the candidate set, with the dragged task
    // conceptually removed from its old slot.
    let all = tree.children_sorted(new_parent_id.as_deref(), origin);
    let rest: Vec<_> = all.iter().copied().filter(|t| t.id != active_id).collect();

    let (prev, next) = match target {
        DropTarget::Container { .. } => {
            // Container drops append at the end
            (rest.last().map(|t| t.id.clone()), None)
        }
        DropTarget::Task { id } => {
            let target_idx = rest
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| DropError::TargetNotFound(id.clone()))?;
            // Whether the dragged task currently sits above the target in
            // this same sibling set. If so, removing it shifts the slot the
            // user dropped onto up by one, so the task lands *below* the
            // target; otherwise it lands above.
            let active_idx = all.iter().position(|t| t.id == active_id);
            let target_idx_all = all.iter().position(|t| &t.id == id);
            let moving_down = matches!(
                (active_idx, target_idx_all),
                (Some(a), Some(t)) if a < t
            );
            if moving_down {
                (
                    Some(id.clone()),
                    rest.get(target_idx + 1).map(|t| t.id.clone()),
                )
            } else {
                (
                    target_idx
                        .checked_sub(1)
                        .and_then(|i| rest.get(i))
                        .map(|t| t.id.clone()),
                    Some(id.clone()),
                )
            }
        }
    };

    // No-op: the resolved slot is exactly where the task already sits
    if new_parent_id == active.parent_task_id {
        let current_idx = all.iter().position(|t| t.id == active_id);
        if let Some(idx) = current_idx {
            let current_prev = idx.checked_sub(1).and_then(|i| all.get(i)).map(|t| &t.id);
            let current_next = all.get(idx + 1).map(|t| &t.id);
            if prev.as_ref() == current_prev && next.as_ref() == current_next {
                return Err(DropError::NoOp);
            }
        }
    }

    Ok(ResolvedDrop {
        new_parent_id,
        origin,
        prev,
        next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Task;
    use crate::model::tree::TaskTree;

    /// One instance project with three children [a, b, c] at
    /// [1000, 2000, 3000], a grandchild under a, and a template root.
    fn sample_tree() -> TaskTree {
        let root = Task::new_root("p1", Origin::Instance);
        let mut a = Task::new_child("a", &root);
        a.position = 1000;
        let mut b = Task::new_child("b", &root);
        b.position = 2000;
        let mut c = Task::new_child("c", &root);
        c.position = 3000;
        let mut a1 = Task::new_child("a1", &a);
        a1.position = 1000;
        let tmpl = Task::new_root("tmpl", Origin::Template);
        TaskTree::from_tasks(vec![root, a, b, c, a1, tmpl])
    }

    fn task_target(id: &str) -> DropTarget {
        DropTarget::Task { id: id.to_string() }
    }

    fn container(parent: Option<&str>, origin: Origin) -> DropTarget {
        DropTarget::Container {
            parent_id: parent.map(String::from),
            origin,
        }
    }

    #[test]
    fn drag_first_onto_last_brackets_end() {
        let tree = sample_tree();
        let resolved = resolve_drop(&tree, "a", &task_target("c")).unwrap();
        assert_eq!(resolved.new_parent_id.as_deref(), Some("p1"));
        assert_eq!(resolved.prev.as_deref(), Some("c"));
        assert_eq!(resolved.next, None);
    }

    #[test]
    fn drag_down_one_slot_brackets_target_and_successor() {
        let tree = sample_tree();
        let resolved = resolve_drop(&tree, "a", &task_target("b")).unwrap();
        assert_eq!(resolved.prev.as_deref(), Some("b"));
        assert_eq!(resolved.next.as_deref(), Some("c"));
    }

    #[test]
    fn drag_up_brackets_predecessor_and_target() {
        let tree = sample_tree();
        let resolved = resolve_drop(&tree, "c", &task_target("a")).unwrap();
        assert_eq!(resolved.prev, None);
        assert_eq!(resolved.next.as_deref(), Some("a"));

        let resolved = resolve_drop(&tree, "c", &task_target("b")).unwrap();
        assert_eq!(resolved.prev.as_deref(), Some("a"));
        assert_eq!(resolved.next.as_deref(), Some("b"));
    }

    #[test]
    fn drop_from_outside_set_lands_before_target() {
        let tree = sample_tree();
        // a1 lives under a; dropping it onto b reorders it into p1's set
        let resolved = resolve_drop(&tree, "a1", &task_target("b")).unwrap();
        assert_eq!(resolved.new_parent_id.as_deref(), Some("p1"));
        assert_eq!(resolved.prev.as_deref(), Some("a"));
        assert_eq!(resolved.next.as_deref(), Some("b"));
    }

    #[test]
    fn container_drop_on_empty_set() {
        let tree = sample_tree();
        let resolved = resolve_drop(&tree, "b", &container(Some("c"), Origin::Instance)).unwrap();
        assert_eq!(resolved.new_parent_id.as_deref(), Some("c"));
        assert_eq!(resolved.prev, None);
        assert_eq!(resolved.next, None);
    }

    #[test]
    fn container_drop_appends_after_existing_siblings() {
        let tree = sample_tree();
        let resolved = resolve_drop(&tree, "a1", &container(Some("p1"), Origin::Instance)).unwrap();
        assert_eq!(resolved.prev.as_deref(), Some("c"));
        assert_eq!(resolved.next, None);
    }

    #[test]
    fn container_drop_to_root_set() {
        let tree = sample_tree();
        let resolved = resolve_drop(&tree, "a", &container(None, Origin::Instance)).unwrap();
        assert_eq!(resolved.new_parent_id, None);
        assert_eq!(resolved.prev.as_deref(), Some("p1"));
        assert_eq!(resolved.next, None);
    }

    #[test]
    fn drop_onto_self_is_noop() {
        let tree = sample_tree();
        assert_eq!(
            resolve_drop(&tree, "a", &task_target("a")),
            Err(DropError::NoOp)
        );
    }

    #[test]
    fn container_drop_into_current_slot_is_noop() {
        let tree = sample_tree();
        // c is already the last child of p1
        assert_eq!(
            resolve_drop(&tree, "c", &container(Some("p1"), Origin::Instance)),
            Err(DropError::NoOp)
        );
    }

    #[test]
    fn cannot_drop_into_own_child_container() {
        let tree = sample_tree();
        assert_eq!(
            resolve_drop(&tree, "a", &container(Some("a1"), Origin::Instance)),
            Err(DropError::Cycle)
        );
    }

    #[test]
    fn cannot_drop_onto_own_descendant_at_any_depth() {
        let mut tree = sample_tree();
        let a1 = tree.get("a1").unwrap().clone();
        let mut a1x = Task::new_child("a1x", &a1);
        a1x.position = 1000;
        tree.insert(a1x);
        // a1x is a grandchild of a; dropping a onto it would orphan the chain
        assert_eq!(
            resolve_drop(&tree, "a", &task_target("a1x")),
            Err(DropError::Cycle)
        );
        assert_eq!(
            resolve_drop(&tree, "a", &container(Some("a1x"), Origin::Instance)),
            Err(DropError::Cycle)
        );
        // p1 is above a, not below — no cycle from reordering under it
        assert!(resolve_drop(&tree, "a", &task_target("b")).is_ok());
    }

    #[test]
    fn cannot_drop_across_origins() {
        let tree = sample_tree();
        assert_eq!(
            resolve_drop(&tree, "a", &container(Some("tmpl"), Origin::Template)),
            Err(DropError::OriginMismatch)
        );
        assert_eq!(
            resolve_drop(&tree, "tmpl", &task_target("b")),
            Err(DropError::OriginMismatch)
        );
    }

    #[test]
    fn missing_active_and_target_are_reported() {
        let tree = sample_tree();
        assert_eq!(
            resolve_drop(&tree, "ghost", &task_target("a")),
            Err(DropError::ActiveNotFound("ghost".into()))
        );
        assert_eq!(
            resolve_drop(&tree, "a", &task_target("ghost")),
            Err(DropError::TargetNotFound("ghost".into()))
        );
        assert_eq!(
            resolve_drop(&tree, "a", &container(Some("ghost"), Origin::Instance)),
            Err(DropError::TargetNotFound("ghost".into()))
        );
    }
}
