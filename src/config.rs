//! Dispatcher configuration.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `total_slots` | 6 |
//! | `middle_slots` | 2 |
//! | `low_slots` | 1 |
//!
//! `middle_slots + low_slots` is the shared middle/low pool; middle tasks
//! admitted beyond `middle_slots` are charged against the low share of the
//! pool. `low_slots` only affects that shared-pool math: regardless of its
//! value, at most one low-level task runs at a time.

use crate::error::ConfigError;

/// Slot budgets for a [`Dispatcher`](crate::Dispatcher).
///
/// Construct with [`DispatcherConfig::default`] and override fields as
/// needed; validation happens in [`Dispatcher::new`](crate::Dispatcher::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Total number of concurrently running tasks, all levels combined.
    pub total_slots: usize,
    /// Reserved share of the middle/low pool for middle-level tasks.
    pub middle_slots: usize,
    /// Low share of the middle/low pool. Overflowing middle admissions are
    /// charged here, which also blocks concurrent low admission.
    pub low_slots: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            total_slots: 6,
            middle_slots: 2,
            low_slots: 1,
        }
    }
}

impl DispatcherConfig {
    /// Checks the budgets for construction-time misconfiguration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTotalSlots`] if `total_slots` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_slots == 0 {
            return Err(ConfigError::ZeroTotalSlots);
        }
        Ok(())
    }

    /// Size of the shared middle/low pool.
    pub(crate) fn shared_pool(&self) -> usize {
        self.middle_slots + self.low_slots
    }
}
