//! Task records and priority levels.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Number of scheduling passes a queued task may be skipped before it is
/// promoted one level.
pub(crate) const AGE_THRESHOLD: u32 = 6;

/// Priority assigned to promoted tasks so they are admitted ahead of
/// ordinary tasks at their new level.
pub(crate) const PROMOTED_PRIORITY: u32 = 1000;

/// Coarse priority class for submitted work.
///
/// Levels are ordered `Low < Middle < High`. Higher levels have scheduling
/// precedence and may consume the slot capacity lower levels would
/// otherwise use; that exhaustion is the preemption mechanism (running
/// lower-level work is never stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Background work. At most one low-level task runs at a time.
    Low,
    /// Shares a reserved pool with low-level work.
    Middle,
    /// Bounded only by the global slot cap.
    High,
}

impl Level {
    /// The level a starved task ages into, if any.
    ///
    /// High-level tasks are never aged; they have no higher level to
    /// promote into.
    #[must_use]
    pub const fn promoted(self) -> Option<Self> {
        match self {
            Self::Low => Some(Self::Middle),
            Self::Middle => Some(Self::High),
            Self::High => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Middle => write!(f, "middle"),
            Self::High => write!(f, "high"),
        }
    }
}

/// The work thunk carried by a queued task.
///
/// Invoked exactly once, when the task is granted a slot. The returned
/// future delivers the task's outcome through the oneshot sender the
/// thunk captured at submission time.
pub(crate) type WorkFn = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()>>>>;

/// A submitted task waiting for a slot, plus its scheduling bookkeeping.
///
/// Ownership: a record lives in the intake buffer or in exactly one level
/// queue until admission, at which point its thunk is handed to the
/// executor and the record is consumed.
pub(crate) struct TaskRecord {
    pub work: WorkFn,
    pub level: Level,
    /// Fine-grained ordering within a level; clamped to >= 1 at submission.
    pub priority: u32,
    /// Scheduling passes this record sat out while queued.
    pub skip: u32,
    /// Submission order, used as the stable tie-break among equal
    /// priorities.
    pub generation: u64,
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("level", &self.level)
            .field("priority", &self.priority)
            .field("skip", &self.skip)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(Level::Low < Level::Middle);
        assert!(Level::Middle < Level::High);
    }

    #[test]
    fn promotion_ladder_tops_out_at_high() {
        assert_eq!(Level::Low.promoted(), Some(Level::Middle));
        assert_eq!(Level::Middle.promoted(), Some(Level::High));
        assert_eq!(Level::High.promoted(), None);
    }

    #[test]
    fn level_display() {
        assert_eq!(Level::Low.to_string(), "low");
        assert_eq!(Level::Middle.to_string(), "middle");
        assert_eq!(Level::High.to_string(), "high");
    }
}
