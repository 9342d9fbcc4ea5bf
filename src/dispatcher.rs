//! The level-queue dispatcher.
//!
//! [`Dispatcher`] admits submitted work into a bounded set of execution
//! slots, partitioned by [`Level`]. Control flow:
//!
//! ```text
//! submit ──► intake buffer ──(one tick)──► divert into level queues
//!                                               │
//!                       scheduling pass ◄───────┘
//!                        │          ▲
//!                 admit into slot   │ release + re-pass
//!                        ▼          │
//!                  work runs ── completes
//! ```
//!
//! A burst of same-tick submissions is diverted together, so it is
//! prioritized as a batch rather than admitted in call order. Every
//! scheduling pass drains the high queue first, then middle, then low,
//! re-checking the admission gate after each admission; tasks left
//! queued in the middle or low queues accrue skips and are promoted one
//! level once they have sat out [`AGE_THRESHOLD`] passes.
//!
//! All mutable state lives behind one mutex and is only touched from the
//! submit / divert / completion call sequence on the executor's single
//! timeline; the lock is never held while user code runs.

use crate::config::DispatcherConfig;
use crate::error::{ConfigError, JoinError};
use crate::executor::{Spawner, yield_now};
use crate::oneshot;
use crate::queue::LevelQueues;
use crate::slots::SlotCounters;
use crate::task::{AGE_THRESHOLD, Level, PROMOTED_PRIORITY, TaskRecord, WorkFn};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Deferred outcome of a submitted task.
///
/// Resolves with the work's output once the task has been granted a slot
/// and run to completion. Fails with [`JoinError`] only if the dispatcher
/// is torn down first.
#[derive(Debug)]
pub struct JoinHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> JoinHandle<T> {
    /// Takes the outcome without waiting, if it is already available.
    pub fn try_take(&mut self) -> Option<T> {
        self.rx.try_recv()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut()
            .rx
            .poll_recv(cx)
            .map(|result| result.map_err(|()| JoinError))
    }
}

/// Snapshot of queue depths and slot occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Tasks currently executing, all levels.
    pub running: usize,
    /// Running middle tasks charged to the reserved middle share.
    pub middle_running: usize,
    /// Running low tasks plus overflowed middle tasks.
    pub low_running: usize,
    /// Records waiting in the high queue.
    pub queued_high: usize,
    /// Records waiting in the middle queue.
    pub queued_middle: usize,
    /// Records waiting in the low queue.
    pub queued_low: usize,
    /// Records submitted this tick, not yet diverted.
    pub intake: usize,
}

struct Core {
    config: DispatcherConfig,
    intake: SmallVec<[TaskRecord; 8]>,
    queues: LevelQueues,
    slots: SlotCounters,
    /// A divert is already scheduled for the next tick.
    divert_pending: bool,
    next_generation: u64,
}

impl Core {
    /// One scheduling pass: drain level queues into free slots, then age
    /// whatever stayed behind.
    ///
    /// Returns the admitted records; the caller starts them after
    /// releasing the lock.
    fn run_pass(&mut self) -> Vec<(WorkFn, Level)> {
        let mut admitted = Vec::new();
        if self.slots.running >= self.config.total_slots {
            // Saturated: no admission is attempted and no skips accrue.
            return admitted;
        }
        self.drain_level(Level::High, &mut admitted);
        if !self.queues.middle.is_empty() && self.slots.shared_pool_spare(&self.config) {
            self.drain_level(Level::Middle, &mut admitted);
        }
        if !self.queues.low.is_empty() && self.slots.low_running == 0 {
            self.drain_level(Level::Low, &mut admitted);
        }
        self.queues.middle.mark_skipped();
        self.queues.low.mark_skipped();
        self.promote_starved();
        admitted
    }

    /// Admits from one level queue, highest priority first, until the
    /// queue empties or the gate denies.
    fn drain_level(&mut self, level: Level, admitted: &mut Vec<(WorkFn, Level)>) {
        let queue = self.queues.queue_mut(level);
        if queue.is_empty() {
            return;
        }
        queue.sort_for_admission();
        while !queue.is_empty() && self.slots.admits(level, &self.config) {
            let Some(record) = queue.pop_front() else {
                break;
            };
            self.slots.charge(record.level, &self.config);
            tracing::trace!(
                level = %record.level,
                priority = record.priority,
                generation = record.generation,
                running = self.slots.running,
                "task admitted"
            );
            admitted.push((record.work, record.level));
        }
    }

    /// Promotes every record that has sat out [`AGE_THRESHOLD`] passes:
    /// low into middle, then middle into high. Promoted records restart
    /// their skip count and carry a sentinel priority so they are
    /// admitted ahead of ordinary tasks at the new level.
    fn promote_starved(&mut self) {
        for record in self.queues.low.take_starved(AGE_THRESHOLD) {
            self.promote(record);
        }
        for record in self.queues.middle.take_starved(AGE_THRESHOLD) {
            self.promote(record);
        }
    }

    fn promote(&mut self, mut record: TaskRecord) {
        let Some(next) = record.level.promoted() else {
            debug_assert!(false, "high queue is never aged");
            self.queues.high.push(record);
            return;
        };
        tracing::debug!(
            from = %record.level,
            to = %next,
            generation = record.generation,
            skipped = record.skip,
            "promoting starved task"
        );
        record.level = next;
        record.skip = 0;
        record.priority = PROMOTED_PRIORITY;
        self.queues.queue_mut(next).push(record);
    }

    fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            running: self.slots.running,
            middle_running: self.slots.middle_running,
            low_running: self.slots.low_running,
            queued_high: self.queues.high.len(),
            queued_middle: self.queues.middle.len(),
            queued_low: self.queues.low.len(),
            intake: self.intake.len(),
        }
    }
}

/// Bounded-concurrency task dispatcher with level preemption and aging.
///
/// Cheap to clone; clones share the same queues and slot budgets. Work is
/// executed on the [`Executor`](crate::Executor) whose [`Spawner`] the
/// dispatcher was built with.
///
/// # Example
///
/// ```
/// use dispatchq::{Dispatcher, DispatcherConfig, Executor, Level};
///
/// let mut executor = Executor::new();
/// let dispatcher = Dispatcher::new(DispatcherConfig::default(), executor.spawner())?;
///
/// let mut handle = dispatcher.submit_with(|| async { 2 + 2 }, Level::Middle, 10);
/// executor.run_until_idle();
/// assert_eq!(handle.try_take(), Some(4));
/// # Ok::<(), dispatchq::ConfigError>(())
/// ```
pub struct Dispatcher {
    core: Arc<Mutex<Core>>,
    spawner: Spawner,
}

impl Clone for Dispatcher {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            spawner: self.spawner.clone(),
        }
    }
}

impl Dispatcher {
    /// Creates a dispatcher with the given slot budgets, executing work
    /// through `spawner`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the budgets are invalid.
    pub fn new(config: DispatcherConfig, spawner: Spawner) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            core: Arc::new(Mutex::new(Core {
                config,
                intake: SmallVec::new(),
                queues: LevelQueues::default(),
                slots: SlotCounters::default(),
                divert_pending: false,
                next_generation: 0,
            })),
            spawner,
        })
    }

    /// Submits `work` at the default level (high) and priority (1).
    ///
    /// See [`submit_with`](Self::submit_with).
    pub fn submit<F, Fut>(&self, work: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: 'static,
    {
        self.submit_with(work, Level::High, 1)
    }

    /// Submits `work` for execution at `level` with `priority`.
    ///
    /// `work` is invoked once, when the task is granted a slot; its output
    /// resolves the returned handle. Priorities below 1 are clamped to 1.
    /// Submission never blocks: the task joins the current tick's intake
    /// batch and is diverted into its level queue one tick later, so a
    /// burst of same-tick submissions is prioritized together.
    pub fn submit_with<F, Fut>(&self, work: F, level: Level, priority: u32) -> JoinHandle<Fut::Output>
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let thunk: WorkFn = Box::new(move || {
            let future = work();
            Box::pin(async move {
                tx.send(future.await);
            })
        });

        let schedule_tick = {
            let mut core = self.core.lock();
            let generation = core.next_generation;
            core.next_generation += 1;
            tracing::trace!(%level, priority, generation, "task submitted");
            core.intake.push(TaskRecord {
                work: thunk,
                level,
                priority: priority.max(1),
                skip: 0,
                generation,
            });
            let first_of_tick = !core.divert_pending;
            if first_of_tick {
                core.divert_pending = true;
            }
            first_of_tick
        };

        if schedule_tick {
            let this = self.clone();
            self.spawner.spawn(async move {
                // Let the current synchronous burst finish before the
                // batch is diverted.
                yield_now().await;
                this.divert();
            });
        }

        JoinHandle { rx }
    }

    /// Snapshot of current queue depths and slot occupancy.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        self.core.lock().stats()
    }

    /// Moves the intake batch into the level queues and runs a
    /// scheduling pass.
    fn divert(&self) {
        let admitted = {
            let mut core = self.core.lock();
            core.divert_pending = false;
            let batch: SmallVec<[TaskRecord; 8]> = core.intake.drain(..).collect();
            tracing::trace!(batch = batch.len(), "diverting intake batch");
            for record in batch {
                core.queues.queue_mut(record.level).push(record);
            }
            core.run_pass()
        };
        self.start(admitted);
    }

    /// Invoked when a running task's work future has finished: the slot
    /// is released and the freed capacity immediately reconsidered.
    fn complete(&self, level: Level) {
        let admitted = {
            let mut core = self.core.lock();
            core.slots.release(level);
            tracing::trace!(%level, running = core.slots.running, "task completed, slot released");
            core.run_pass()
        };
        self.start(admitted);
    }

    /// Begins executing admitted records. Runs with the core lock
    /// released: instantiating the work future executes caller code,
    /// which may re-enter `submit`.
    fn start(&self, admitted: Vec<(WorkFn, Level)>) {
        for (work, level) in admitted {
            let this = self.clone();
            let future = work();
            self.spawner.spawn(async move {
                future.await;
                this.complete(level);
            });
        }
    }
}
