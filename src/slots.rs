//! Slot accounting and the admission gate.
//!
//! Three counters track running work: `running` (all levels, bounded by
//! `total_slots`), plus `middle_running` and `low_running` for the shared
//! middle/low pool. High-level tasks are bounded only by the global cap;
//! consuming all of it is how high-level work preempts the lower levels.
//!
//! A middle admission beyond `middle_slots` transfers its charge to
//! `low_running` (overflow rides the low share of the pool), which also
//! blocks concurrent low admission. Releases mirror the charge: a middle
//! release with `middle_running` already at zero returns the overflow
//! unit from `low_running`. Counters never go negative; an underflow here
//! would be a dispatcher bug, not a recoverable condition.

use crate::config::DispatcherConfig;
use crate::task::Level;

/// Running-task counters for one dispatcher instance.
///
/// Mutated only by the scheduling pass (charge) and the completion
/// handler (release); both run on the single cooperative timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SlotCounters {
    /// Total tasks currently executing.
    pub running: usize,
    /// Middle-level tasks charged against the reserved middle share.
    pub middle_running: usize,
    /// Low-level tasks plus overflowed middle tasks.
    pub low_running: usize,
}

impl SlotCounters {
    /// The admission gate: may a task of `level` start now?
    pub(crate) fn admits(&self, level: Level, config: &DispatcherConfig) -> bool {
        if self.running >= config.total_slots {
            return false;
        }
        match level {
            Level::High => true,
            Level::Middle => self.middle_running + self.low_running < config.shared_pool(),
            // Stricter than the configured low share: one low task at a
            // time, full stop.
            Level::Low => self.low_running == 0,
        }
    }

    /// True when the shared middle/low pool has spare capacity.
    pub(crate) fn shared_pool_spare(&self, config: &DispatcherConfig) -> bool {
        self.middle_running + self.low_running < config.shared_pool()
    }

    /// Records an admission. Must only be called after
    /// [`admits`](Self::admits) returned true for the same level.
    pub(crate) fn charge(&mut self, level: Level, config: &DispatcherConfig) {
        self.running += 1;
        debug_assert!(self.running <= config.total_slots);
        match level {
            Level::High => {}
            Level::Middle => {
                self.middle_running += 1;
                if self.middle_running > config.middle_slots {
                    // Overflow rides the low share of the pool.
                    self.middle_running -= 1;
                    self.low_running += 1;
                }
            }
            Level::Low => {
                self.low_running += 1;
            }
        }
    }

    /// Reverses the charge for a completed task of `level`.
    pub(crate) fn release(&mut self, level: Level) {
        debug_assert!(self.running > 0, "release without matching charge");
        self.running = self.running.saturating_sub(1);
        match level {
            Level::High => {}
            Level::Middle => {
                if self.middle_running > 0 {
                    self.middle_running -= 1;
                } else {
                    // This task's charge was transferred to the low share
                    // at admission time.
                    debug_assert!(self.low_running > 0, "middle release without pool charge");
                    self.low_running = self.low_running.saturating_sub(1);
                }
            }
            Level::Low => {
                debug_assert!(self.low_running > 0, "low release without charge");
                self.low_running = self.low_running.saturating_sub(1);
            }
        }
    }
}
