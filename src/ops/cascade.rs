use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::model::tree::TaskTree;

/// A date adjustment for one task. A `None` field is untouched — in
/// particular a task with no due date never gains one from a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateShift {
    pub task_id: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Whole days from `old_date` to `new_date` (positive when `new_date` is
/// later)
pub fn days_between(new_date: NaiveDate, old_date: NaiveDate) -> i64 {
    new_date.signed_duration_since(old_date).num_days()
}

/// Compute the date updates for a subtree whose effective start moved from
/// `old_anchor` to `new_anchor`.
///
/// The cascade only fires when both anchors are known and differ. The
/// subtree root's start is set to `new_anchor` verbatim (shifting it by the
/// delta as well would double-count the move); every other date in the
/// subtree shifts by the same whole-day delta, so relative spacing between
/// tasks is preserved. Absent dates stay absent.
pub fn compute_date_shifts(
    tree: &TaskTree,
    subtree_root_id: &str,
    old_anchor: Option<NaiveDate>,
    new_anchor: Option<NaiveDate>,
) -> Vec<DateShift> {
    let (Some(old), Some(new)) = (old_anchor, new_anchor) else {
        return Vec::new();
    };
    let delta = days_between(new, old);
    if delta == 0 {
        return Vec::new();
    }
    let Some(root) = tree.get(subtree_root_id) else {
        return Vec::new();
    };

    let mut shifts = vec![DateShift {
        task_id: root.id.clone(),
        start_date: Some(new),
        due_date: root.due_date.map(|d| shift_date(d, delta)),
    }];

    for task in tree.descendants(subtree_root_id) {
        if task.start_date.is_none() && task.due_date.is_none() {
            continue;
        }
        shifts.push(DateShift {
            task_id: task.id.clone(),
            start_date: task.start_date.map(|d| shift_date(d, delta)),
            due_date: task.due_date.map(|d| shift_date(d, delta)),
        });
    }
    shifts
}

/// Shift a date by a signed number of days, saturating at the edge of the
/// representable range instead of wrapping.
fn shift_date(date: NaiveDate, delta_days: i64) -> NaiveDate {
    let shifted = if delta_days >= 0 {
        date.checked_add_days(Days::new(delta_days as u64))
    } else {
        date.checked_sub_days(Days::new(delta_days.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{Origin, Task};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// Root "m" starting 2024-01-01 with two children; t2 has no due date.
    fn scheduled_tree() -> TaskTree {
        let mut m = Task::new_root("m", Origin::Instance);
        m.start_date = Some(date("2024-01-01"));
        m.due_date = Some(date("2024-01-10"));
        let mut t1 = Task::new_child("t1", &m);
        t1.position = 1000;
        t1.start_date = Some(date("2024-01-03"));
        t1.due_date = Some(date("2024-01-05"));
        let mut t2 = Task::new_child("t2", &m);
        t2.position = 2000;
        t2.start_date = Some(date("2024-01-04"));
        let mut t3 = Task::new_child("t3", &m);
        t3.position = 3000;
        TaskTree::from_tasks(vec![m, t1, t2, t3])
    }

    #[test]
    fn missing_anchor_produces_no_updates() {
        let tree = scheduled_tree();
        assert!(compute_date_shifts(&tree, "m", None, Some(date("2024-02-01"))).is_empty());
        assert!(compute_date_shifts(&tree, "m", Some(date("2024-01-01")), None).is_empty());
    }

    #[test]
    fn zero_delta_produces_no_updates() {
        let tree = scheduled_tree();
        let shifts = compute_date_shifts(
            &tree,
            "m",
            Some(date("2024-01-01")),
            Some(date("2024-01-01")),
        );
        assert!(shifts.is_empty());
    }

    #[test]
    fn root_start_is_set_verbatim() {
        let tree = scheduled_tree();
        let shifts = compute_date_shifts(
            &tree,
            "m",
            Some(date("2024-01-01")),
            Some(date("2024-02-01")),
        );
        let root = shifts.iter().find(|s| s.task_id == "m").unwrap();
        assert_eq!(root.start_date, Some(date("2024-02-01")));
        // +31 days, same as every descendant
        assert_eq!(root.due_date, Some(date("2024-02-10")));
    }

    #[test]
    fn descendants_shift_by_delta() {
        let tree = scheduled_tree();
        let shifts = compute_date_shifts(
            &tree,
            "m",
            Some(date("2024-01-01")),
            Some(date("2024-02-01")),
        );
        let t1 = shifts.iter().find(|s| s.task_id == "t1").unwrap();
        assert_eq!(t1.start_date, Some(date("2024-02-03")));
        assert_eq!(t1.due_date, Some(date("2024-02-05")));
    }

    #[test]
    fn null_due_date_stays_null() {
        let tree = scheduled_tree();
        let shifts = compute_date_shifts(
            &tree,
            "m",
            Some(date("2024-01-01")),
            Some(date("2024-02-01")),
        );
        let t2 = shifts.iter().find(|s| s.task_id == "t2").unwrap();
        assert_eq!(t2.start_date, Some(date("2024-02-04")));
        assert_eq!(t2.due_date, None);
    }

    #[test]
    fn dateless_descendants_are_skipped() {
        let tree = scheduled_tree();
        let shifts = compute_date_shifts(
            &tree,
            "m",
            Some(date("2024-01-01")),
            Some(date("2024-02-01")),
        );
        assert!(shifts.iter().all(|s| s.task_id != "t3"));
    }

    #[test]
    fn negative_delta_shifts_backwards() {
        let tree = scheduled_tree();
        let shifts = compute_date_shifts(
            &tree,
            "m",
            Some(date("2024-01-01")),
            Some(date("2023-12-22")),
        );
        let t1 = shifts.iter().find(|s| s.task_id == "t1").unwrap();
        assert_eq!(t1.start_date, Some(date("2023-12-24")));
    }

    #[test]
    fn days_between_is_signed() {
        assert_eq!(days_between(date("2024-02-01"), date("2024-01-01")), 31);
        assert_eq!(days_between(date("2024-01-01"), date("2024-02-01")), -31);
    }
}
