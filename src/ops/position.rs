use thiserror::Error;

/// Position assigned to the first task in an empty sibling set
pub const POSITION_BASE: i64 = 1000;
/// Spacing between consecutive positions when appending or renormalizing
pub const POSITION_STEP: i64 = 1000;
/// Floor for front insertions; positions never shrink below this
pub const POSITION_MIN: i64 = 1;

/// The neighboring keys are too close together to bisect. Recovery is
/// renormalizing the sibling set and retrying the insertion; a duplicate or
/// out-of-order key is never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sibling positions too dense to bisect")]
pub struct PositionExhausted;

/// Compute a sort key for the slot between `prev` and `next`.
///
/// - Empty sibling set: the base value.
/// - Inserting at the end: one step past the last sibling.
/// - Inserting at the front: half the first sibling's key, floored at
///   `POSITION_MIN` so repeated front insertions don't race toward zero.
/// - Between two siblings: the integer midpoint.
pub fn compute_position(
    prev: Option<i64>,
    next: Option<i64>,
) -> Result<i64, PositionExhausted> {
    match (prev, next) {
        (None, None) => Ok(POSITION_BASE),
        (Some(prev), None) => Ok(prev + POSITION_STEP),
        (None, Some(next)) => {
            let half = (next / 2).max(POSITION_MIN);
            if half >= next {
                Err(PositionExhausted)
            } else {
                Ok(half)
            }
        }
        (Some(prev), Some(next)) => {
            let mid = prev + (next - prev) / 2;
            if mid == prev {
                Err(PositionExhausted)
            } else {
                Ok(mid)
            }
        }
    }
}

/// Re-space an ordered sibling set at fixed intervals, recovering insertion
/// headroom after bisection exhaustion. Input order is preserved; the first
/// sibling lands on `POSITION_STEP`, the second on `2 * POSITION_STEP`, etc.
pub fn renormalize<I, S>(ordered_ids: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ordered_ids
        .into_iter()
        .enumerate()
        .map(|(index, id)| (id.into(), (index as i64 + 1) * POSITION_STEP))
        .collect()
}
