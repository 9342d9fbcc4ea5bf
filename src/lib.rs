//! # dispatchq
//!
//! Bounded-concurrency task dispatch with level preemption and
//! starvation-avoiding aging.
//!
//! A [`Dispatcher`] admits asynchronous units of work into a fixed number
//! of execution slots, partitioned by [`Level`] (low, middle, high).
//! High-level work may consume the entire slot budget, which preempts the
//! lower levels by exhaustion; queued middle and low tasks that sit out
//! too many scheduling passes are promoted a level so nothing waits
//! forever. Within a level, tasks are ordered by a caller-supplied
//! priority, with submission order as the stable tie-break.
//!
//! Work runs on the crate's own single-threaded cooperative [`Executor`]:
//! the dispatcher batches same-tick submissions, diverts them into level
//! queues one tick later, and re-runs its scheduling pass every time a
//! running task completes and frees a slot.
//!
//! ```
//! use dispatchq::{Dispatcher, DispatcherConfig, Executor, Level};
//!
//! let mut executor = Executor::new();
//! let dispatcher = Dispatcher::new(DispatcherConfig::default(), executor.spawner())?;
//!
//! let mut urgent = dispatcher.submit(|| async { "now" });
//! let mut background = dispatcher.submit_with(|| async { "later" }, Level::Low, 1);
//!
//! executor.run_until_idle();
//! assert_eq!(urgent.try_take(), Some("now"));
//! assert_eq!(background.try_take(), Some("later"));
//! # Ok::<(), dispatchq::ConfigError>(())
//! ```
//!
//! The [`coalesce`] module ships a related throttling utility: wrapping
//! an async operation so that overlapping invocations all resolve with
//! the outcome of the most recently started one.

pub mod coalesce;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
mod oneshot;
mod queue;
mod slots;
pub mod task;

pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherStats, JoinHandle};
pub use error::{ConfigError, JoinError};
pub use executor::{Executor, Spawner, yield_now};
pub use task::Level;
