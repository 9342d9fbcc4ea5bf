//! Error types for the dispatcher.
//!
//! Errors are explicit and typed. The dispatcher distinguishes two
//! failure classes:
//!
//! - **Configuration errors** ([`ConfigError`]): programming errors in the
//!   slot budgets, rejected eagerly at construction time.
//! - **Join errors** ([`JoinError`]): the outcome of a submitted task can
//!   no longer be delivered because the dispatcher was torn down.
//!
//! A task's own failure is not a dispatcher error: callers submit work
//! whose output carries its failure path (typically a `Result`), and the
//! dispatcher forwards that output untouched.

/// Error returned when a [`DispatcherConfig`](crate::DispatcherConfig) is
/// rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `total_slots` must admit at least one task.
    #[error("total_slots must be at least 1")]
    ZeroTotalSlots,
}

/// Error returned by a [`JoinHandle`](crate::JoinHandle) when the
/// dispatcher was dropped before the task's outcome could be delivered.
///
/// This is the only way a handle fails; a submitted task is otherwise
/// never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("dispatcher was torn down before the task completed")]
pub struct JoinError;
