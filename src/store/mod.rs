//! Optimistic update coordination.
//!
//! All tree mutation here is synchronous and single-threaded; the only
//! suspending collaborator is persistence, which settles after the fact.
//! Each operation applies its full patch set in one step, records the
//! inverse, and on a failed settle restores exactly the fields it still
//! owns — a newer in-flight operation's writes are never clobbered.

pub mod patch;

use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::task::{Task, TaskStatus};
use crate::model::tree::TaskTree;
use crate::ops::cascade::compute_date_shifts;
use crate::ops::position::{POSITION_BASE, PositionExhausted, compute_position, renormalize};
use crate::ops::resolve::{DropError, DropTarget, resolve_drop};

pub use patch::{FieldChange, FieldKind, TaskPatch};

/// Error reported by the collaborator-supplied persistence layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("persistence failed: {0}")]
pub struct PersistError(pub String);

/// The persistence seam. Implementations receive the same patch batch the
/// store already applied optimistically; network/timeout concerns live on
/// the caller's side of this trait.
pub trait Persist {
    fn persist(&mut self, patches: &[TaskPatch]) -> Result<(), PersistError>;
}

/// Handle for an in-flight operation: the patch set to persist plus the op
/// id to settle with
#[derive(Debug, Clone)]
pub struct MoveTicket {
    pub op_id: u64,
    pub patches: Vec<TaskPatch>,
}

/// What settling an operation did to local state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Persisted; the optimistic state is now authoritative
    Committed,
    /// Persistence failed; every field this operation still owned was
    /// restored to its pre-operation value
    Reverted,
    /// Persistence failed and the revert set could not be reconstructed
    /// locally — the caller must refetch this subtree from the server
    RefetchSubtree { root_id: String },
}

/// Result of the begin → persist → settle convenience path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The full patch set, for UI rendering
    pub patches: Vec<TaskPatch>,
    pub settled: SettleOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettleError {
    #[error("unknown or already-settled operation: {0}")]
    UnknownOp(u64),
}

/// Bookkeeping for one optimistically-applied, not-yet-settled operation
#[derive(Debug)]
struct PendingOp {
    op_id: u64,
    /// Field restore values captured just before the optimistic write
    inverse: Vec<TaskPatch>,
    /// Root of the subtree the operation landed in, the refetch scope if
    /// the revert set turns out to be unreconstructible
    root_id: String,
}

/// Client-side tree state plus per-operation revert bookkeeping
#[derive(Debug, Default)]
pub struct TreeStore {
    tree: TaskTree,
    next_op_id: u64,
    pending: Vec<PendingOp>,
    /// Most recent optimistic writer per (task, field)
    writers: HashMap<(String, FieldKind), u64>,
}

impl TreeStore {
    pub fn new(tree: TaskTree) -> Self {
        TreeStore {
            tree,
            ..TreeStore::default()
        }
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        TreeStore::new(TaskTree::from_tasks(tasks))
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    /// Number of operations applied but not yet settled
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Place a new task at the end of its initial sibling set and add it
    /// to the tree. Returns the assigned position. Persisting the creation
    /// itself is the CRUD layer's job, not this engine's.
    pub fn insert_task(&mut self, mut task: Task) -> i64 {
        let last = self
            .tree
            .last_child(task.parent_task_id.as_deref(), task.origin)
            .map(|t| t.position);
        // End insertion always has room
        let position = compute_position(last, None).unwrap_or(POSITION_BASE);
        task.position = position;
        self.tree.insert(task);
        position
    }

    /// Resolve a drop gesture and apply it optimistically.
    ///
    /// The returned ticket carries the full forward patch set: the dragged
    /// task's parent/position (plus root_id when it moved to a different
    /// tree), any renormalized sibling positions, and the date cascade for
    /// the subtree when the parent changed. Everything is applied to the
    /// tree in one synchronous step before returning, so the caller never
    /// renders a half-applied move. Hand the patches to persistence, then
    /// call `settle` with its result.
    pub fn begin_move(
        &mut self,
        active_id: &str,
        target: &DropTarget,
    ) -> Result<MoveTicket, DropError> {
        let resolved = resolve_drop(&self.tree, active_id, target)?;
        let active = self
            .tree
            .get(active_id)
            .cloned()
            .ok_or_else(|| DropError::ActiveNotFound(active_id.to_string()))?;

        // Position for the resolved slot, renormalizing the target sibling
        // set inside this same command when the keys are too dense.
        let mut renorm_patches: Vec<TaskPatch> = Vec::new();
        let prev_pos = lookup_position(&self.tree, resolved.prev.as_deref());
        let next_pos = lookup_position(&self.tree, resolved.next.as_deref());
        let position = match compute_position(prev_pos, next_pos) {
            Ok(pos) => pos,
            Err(PositionExhausted) => {
                debug!(
                    parent = resolved.new_parent_id.as_deref().unwrap_or("<root>"),
                    "sibling positions exhausted; renormalizing set"
                );
                let ordered: Vec<String> = self
                    .tree
                    .children_sorted(resolved.new_parent_id.as_deref(), resolved.origin)
                    .iter()
                    .filter(|t| t.id != active_id)
                    .map(|t| t.id.clone())
                    .collect();
                let spaced = renormalize(ordered);
                let by_id: HashMap<&str, i64> =
                    spaced.iter().map(|(id, pos)| (id.as_str(), *pos)).collect();
                for (id, pos) in &spaced {
                    let mut patch = TaskPatch::new(id.clone());
                    patch.push(FieldChange::Position(*pos));
                    renorm_patches.push(patch);
                }
                let prev_pos = resolved.prev.as_deref().and_then(|id| by_id.get(id)).copied();
                let next_pos = resolved.next.as_deref().and_then(|id| by_id.get(id)).copied();
                // A freshly spaced set always has room between neighbors
                compute_position(prev_pos, next_pos).unwrap_or(POSITION_BASE)
            }
        };

        let parent_changed = resolved.new_parent_id != active.parent_task_id;

        // Date cascade: fires only on reparent, and only when both the
        // task's old start and the new parent's start are known.
        let shifts = if parent_changed {
            let new_anchor = resolved
                .new_parent_id
                .as_deref()
                .and_then(|id| self.tree.get(id))
                .and_then(|p| p.start_date);
            compute_date_shifts(&self.tree, active_id, active.start_date, new_anchor)
        } else {
            Vec::new()
        };

        // Keep the denormalized root_id consistent across the moved subtree
        let new_root = match resolved.new_parent_id.as_deref() {
            Some(pid) => self
                .tree
                .get(pid)
                .map(|p| p.root_id.clone())
                .unwrap_or_else(|| active.root_id.clone()),
            None => active.id.clone(),
        };
        let root_changed = new_root != active.root_id;

        // Assemble the forward patch set, one patch per touched task
        let mut patches: IndexMap<String, TaskPatch> = IndexMap::new();
        let entry = patches
            .entry(active.id.clone())
            .or_insert_with(|| TaskPatch::new(active.id.clone()));
        entry.push(FieldChange::ParentTaskId(resolved.new_parent_id.clone()));
        entry.push(FieldChange::Position(position));
        if root_changed {
            entry.push(FieldChange::RootId(new_root.clone()));
        }
        for shift in &shifts {
            let entry = patches
                .entry(shift.task_id.clone())
                .or_insert_with(|| TaskPatch::new(shift.task_id.clone()));
            if let Some(start) = shift.start_date {
                entry.push(FieldChange::StartDate(Some(start)));
            }
            if let Some(due) = shift.due_date {
                entry.push(FieldChange::DueDate(Some(due)));
            }
        }
        if root_changed {
            let descendant_ids: Vec<String> = self
                .tree
                .descendants(&active.id)
                .iter()
                .map(|t| t.id.clone())
                .collect();
            for id in descendant_ids {
                let entry = patches
                    .entry(id.clone())
                    .or_insert_with(|| TaskPatch::new(id));
                entry.push(FieldChange::RootId(new_root.clone()));
            }
        }
        for patch in renorm_patches {
            patches
                .entry(patch.task_id.clone())
                .or_insert_with(|| TaskPatch::new(patch.task_id.clone()))
                .changes
                .extend(patch.changes);
        }
        let patches: Vec<TaskPatch> = patches.into_values().collect();

        debug!(
            active = active_id,
            parent = resolved.new_parent_id.as_deref().unwrap_or("<root>"),
            position,
            cascaded = shifts.len(),
            "applying move optimistically"
        );
        let ticket = self.apply_optimistic(patches, new_root);
        Ok(ticket)
    }

    /// The status-column drop: same optimistic pattern, no position or
    /// date involvement
    pub fn begin_status_change(
        &mut self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<MoveTicket, DropError> {
        let task = self
            .tree
            .get(task_id)
            .ok_or_else(|| DropError::ActiveNotFound(task_id.to_string()))?;
        if task.status == status {
            return Err(DropError::NoOp);
        }
        let root_id = task.root_id.clone();
        let mut patch = TaskPatch::new(task_id);
        patch.push(FieldChange::Status(status));
        Ok(self.apply_optimistic(vec![patch], root_id))
    }

    /// Settle an in-flight operation with the persistence result
    pub fn settle(
        &mut self,
        op_id: u64,
        result: Result<(), PersistError>,
    ) -> Result<SettleOutcome, SettleError> {
        let op = self
            .take_pending(op_id)
            .ok_or(SettleError::UnknownOp(op_id))?;
        Ok(self.finish(op, result))
    }

    /// Begin → persist → settle in one call, for callers that don't
    /// overlap gestures
    pub fn apply_move(
        &mut self,
        active_id: &str,
        target: &DropTarget,
        persist: &mut dyn Persist,
    ) -> Result<MoveOutcome, DropError> {
        let ticket = self.begin_move(active_id, target)?;
        let result = persist.persist(&ticket.patches);
        let settled = match self.take_pending(ticket.op_id) {
            Some(op) => self.finish(op, result),
            // The op was just registered; nothing else can have taken it
            None => SettleOutcome::Committed,
        };
        Ok(MoveOutcome {
            patches: ticket.patches,
            settled,
        })
    }

    /// Status-change counterpart of `apply_move`
    pub fn apply_status_change(
        &mut self,
        task_id: &str,
        status: TaskStatus,
        persist: &mut dyn Persist,
    ) -> Result<MoveOutcome, DropError> {
        let ticket = self.begin_status_change(task_id, status)?;
        let result = persist.persist(&ticket.patches);
        let settled = match self.take_pending(ticket.op_id) {
            Some(op) => self.finish(op, result),
            None => SettleOutcome::Committed,
        };
        Ok(MoveOutcome {
            patches: ticket.patches,
            settled,
        })
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Apply a forward patch set in one synchronous step, capturing the
    /// inverse and tagging this op as the latest writer of every touched
    /// field
    fn apply_optimistic(&mut self, patches: Vec<TaskPatch>, root_id: String) -> MoveTicket {
        let op_id = self.next_op_id;
        self.next_op_id += 1;

        let mut inverse = Vec::new();
        for patch in &patches {
            let Some(task) = self.tree.get_mut(&patch.task_id) else {
                continue;
            };
            let mut inv = TaskPatch::new(patch.task_id.clone());
            for change in &patch.changes {
                inv.push(change.capture_inverse(task));
                change.apply(task);
                self.writers
                    .insert((patch.task_id.clone(), change.kind()), op_id);
            }
            inverse.push(inv);
        }

        self.pending.push(PendingOp {
            op_id,
            inverse,
            root_id,
        });
        MoveTicket { op_id, patches }
    }

    fn take_pending(&mut self, op_id: u64) -> Option<PendingOp> {
        let idx = self.pending.iter().position(|op| op.op_id == op_id)?;
        Some(self.pending.remove(idx))
    }

    fn finish(&mut self, op: PendingOp, result: Result<(), PersistError>) -> SettleOutcome {
        match result {
            Ok(()) => {
                debug!(op_id = op.op_id, "operation committed");
                self.release_writers(op.op_id);
                SettleOutcome::Committed
            }
            Err(err) => {
                warn!(
                    op_id = op.op_id,
                    error = %err,
                    "persistence failed; reverting optimistic patch"
                );
                self.revert(op)
            }
        }
    }

    /// Restore every field this op still owns. Fields a newer in-flight op
    /// has since overwritten are left for that op's own settle.
    fn revert(&mut self, op: PendingOp) -> SettleOutcome {
        let mut missing = false;
        for patch in &op.inverse {
            match self.tree.get_mut(&patch.task_id) {
                None => missing = true,
                Some(task) => {
                    for change in &patch.changes {
                        let key = (patch.task_id.clone(), change.kind());
                        if self.writers.get(&key) == Some(&op.op_id) {
                            change.apply(task);
                            self.writers.remove(&key);
                        }
                    }
                }
            }
        }
        self.release_writers(op.op_id);
        if missing {
            warn!(
                root_id = %op.root_id,
                "revert target vanished; falling back to subtree refetch"
            );
            SettleOutcome::RefetchSubtree {
                root_id: op.root_id,
            }
        } else {
            SettleOutcome::Reverted
        }
    }

    fn release_writers(&mut self, op_id: u64) {
        self.writers.retain(|_, owner| *owner != op_id);
    }
}

fn lookup_position(tree: &TaskTree, id: Option<&str>) -> Option<i64> {
    id.and_then(|id| tree.get(id)).map(|t| t.position)
}
