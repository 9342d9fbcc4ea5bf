//! Per-level wait queues.
//!
//! One ordered queue per [`Level`] holds admitted-but-not-yet-running
//! records. Records are appended in divert (arrival) order; before a drain
//! the queue is re-ordered by descending priority, with the submission
//! generation as a stable tie-break so equal priorities keep their
//! arrival order.

use crate::task::{Level, TaskRecord};

/// An ordered sequence of task records awaiting a slot.
#[derive(Debug, Default)]
pub(crate) struct LevelQueue {
    records: Vec<TaskRecord>,
}

impl LevelQueue {
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn push(&mut self, record: TaskRecord) {
        self.records.push(record);
    }

    /// Orders the queue for a drain: highest priority first, earlier
    /// generation first among equals.
    pub(crate) fn sort_for_admission(&mut self) {
        self.records
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.generation.cmp(&b.generation)));
    }

    /// The record that would be admitted next, after
    /// [`sort_for_admission`](Self::sort_for_admission).
    pub(crate) fn front(&self) -> Option<&TaskRecord> {
        self.records.first()
    }

    /// Removes and returns the front record.
    pub(crate) fn pop_front(&mut self) -> Option<TaskRecord> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records.remove(0))
        }
    }

    /// Increments the skip counter of every resident record.
    pub(crate) fn mark_skipped(&mut self) {
        for record in &mut self.records {
            record.skip += 1;
        }
    }

    /// Removes and returns every record whose skip counter has reached
    /// `threshold`, preserving the order of the remainder.
    pub(crate) fn take_starved(&mut self, threshold: u32) -> Vec<TaskRecord> {
        let mut starved = Vec::new();
        let mut index = 0;
        while index < self.records.len() {
            if self.records[index].skip >= threshold {
                starved.push(self.records.remove(index));
            } else {
                index += 1;
            }
        }
        starved
    }
}

/// The three level queues.
#[derive(Debug, Default)]
pub(crate) struct LevelQueues {
    pub low: LevelQueue,
    pub middle: LevelQueue,
    pub high: LevelQueue,
}

impl LevelQueues {
    pub(crate) fn queue_mut(&mut self, level: Level) -> &mut LevelQueue {
        match level {
            Level::Low => &mut self.low,
            Level::Middle => &mut self.middle,
            Level::High => &mut self.high,
        }
    }
}
