//! Trellis is the ordering and consistency engine behind a drag-and-drop
//! task tree: stable sort keys for siblings, drop-gesture resolution with
//! cycle/origin validation, date cascades when a subtree moves under a
//! parent with a different start date, and optimistic apply/revert against
//! an external persistence layer.
//!
//! The tree is a flat arena of tasks with parent pointers
//! ([`model::TaskTree`]); collaborators hand in a flat task list and a
//! persistence callback, and get back validated patch sets. A typical drop
//! flows through [`store::TreeStore::begin_move`] →
//! persist → [`store::TreeStore::settle`].

pub mod model;
pub mod ops;
pub mod store;
