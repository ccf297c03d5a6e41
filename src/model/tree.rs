use indexmap::IndexMap;

use super::task::{Origin, Task};

/// Maximum parent-link hops any upward walk will follow. Bounds the walk so
/// malformed data (a parent cycle) cannot hang a traversal.
pub const MAX_ANCESTOR_DEPTH: usize = 64;

/// An arena of tasks indexed by id. The tree structure lives entirely in
/// each task's `parent_task_id`; child lists are derived on demand and
/// never stored, so they cannot go stale.
#[derive(Debug, Clone, Default)]
pub struct TaskTree {
    tasks: IndexMap<String, Task>,
}

impl TaskTree {
    pub fn new() -> Self {
        TaskTree::default()
    }

    /// Build a tree from the flat task list a collaborator hands us.
    /// On duplicate ids the last task wins; `check_tree` reports duplicates
    /// in the source list.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut tree = TaskTree::new();
        for task in tasks {
            tree.insert(task);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        self.tasks.shift_remove(id)
    }

    /// All tasks, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// The sibling set under `parent_id` for the given origin, sorted by
    /// position. `None` selects root tasks.
    pub fn children_sorted(&self, parent_id: Option<&str>, origin: Origin) -> Vec<&Task> {
        let mut children: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.parent_task_id.as_deref() == parent_id && t.origin == origin)
            .collect();
        children.sort_by_key(|t| t.position);
        children
    }

    /// The last sibling (highest position) under `parent_id`, if any
    pub fn last_child(&self, parent_id: Option<&str>, origin: Origin) -> Option<&Task> {
        self.tasks
            .values()
            .filter(|t| t.parent_task_id.as_deref() == parent_id && t.origin == origin)
            .max_by_key(|t| t.position)
    }

    /// Walk from the task with `id` upward through parent links, yielding
    /// the task itself first. Stops at a root, a dangling parent reference,
    /// or the depth guard.
    pub fn self_and_ancestors<'a>(&'a self, id: &str) -> Ancestors<'a> {
        Ancestors {
            tree: self,
            next: self.tasks.get(id).map(|t| t.id.as_str()),
            hops: 0,
        }
    }

    /// Whether `id` is a (transitive) descendant of `ancestor_id`
    pub fn is_descendant(&self, id: &str, ancestor_id: &str) -> bool {
        let Some(task) = self.get(id) else {
            return false;
        };
        let Some(parent) = task.parent_task_id.as_deref() else {
            return false;
        };
        self.self_and_ancestors(parent)
            .any(|t| t.id == ancestor_id)
    }

    /// Every task strictly below `id`, breadth-first, children in position
    /// order. The adjacency map is derived here, not stored.
    pub fn descendants(&self, id: &str) -> Vec<&Task> {
        let mut by_parent: IndexMap<&str, Vec<&Task>> = IndexMap::new();
        for task in self.tasks.values() {
            if let Some(parent) = task.parent_task_id.as_deref() {
                by_parent.entry(parent).or_default().push(task);
            }
        }
        for children in by_parent.values_mut() {
            children.sort_by_key(|t| t.position);
        }

        let mut out = Vec::new();
        let mut queue: Vec<&str> = vec![id];
        let mut cursor = 0;
        while cursor < queue.len() {
            let current = queue[cursor];
            cursor += 1;
            if let Some(children) = by_parent.get(current) {
                for child in children {
                    out.push(*child);
                    queue.push(child.id.as_str());
                }
            }
        }
        out
    }
}

/// Iterator over a task and its ancestors (see `TaskTree::self_and_ancestors`)
pub struct Ancestors<'a> {
    tree: &'a TaskTree,
    next: Option<&'a str>,
    hops: usize,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<&'a Task> {
        if self.hops >= MAX_ANCESTOR_DEPTH {
            return None;
        }
        let task = self.tree.get(self.next?)?;
        self.hops += 1;
        self.next = task.parent_task_id.as_deref();
        Some(task)
    }
}
