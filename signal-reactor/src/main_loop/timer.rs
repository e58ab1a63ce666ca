use super::SourceId;

use std::cmp::Ordering;
use std::time::Instant;

/// An entry in the main loop timer queue.
///
/// `TimerEntry` only records when a source is due. The callback itself
/// lives in the loop's source table, so removing a source there is enough
/// to cancel it; the stale entry is skipped when it reaches the top.
pub(crate) struct TimerEntry {
    /// The time at which the source should fire.
    pub(crate) deadline: Instant,

    /// Source to dispatch when the deadline is reached.
    pub(crate) source: SourceId,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline.eq(&other.deadline) && self.source.eq(&other.source)
    }
}

impl Ord for TimerEntry {
    /// Orders timer entries by deadline, then by creation order.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap,
    /// where the earliest deadline is popped first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
