//! Latest-invocation-wins coalescing for async operations.
//!
//! [`Coalesce`] wraps repeated invocations of an asynchronous operation
//! so that every invocation overlapping in time resolves with the outcome
//! of the most recently started one. Useful when stale responses must
//! never overwrite fresh ones, e.g. a refresh endpoint called on every
//! keystroke: all pending callers settle together, with the newest
//! result, even when an earlier call fails.
//!
//! Outcomes are delivered to every overlapping caller, so the outcome
//! type must be `Clone`. A failure path travels inside the outcome
//! (typically a `Result`), exactly as it does for dispatched tasks.
//!
//! An invocation superseded by a newer one stops being driven once the
//! newer outcome arrives; its own in-flight operation is dropped at that
//! point rather than running to an ignored completion.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// One caller's delivery slot.
#[derive(Debug)]
struct WaiterCell<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T> Default for WaiterCell<T> {
    fn default() -> Self {
        Self {
            value: None,
            waker: None,
        }
    }
}

struct State<T> {
    /// Monotonic invocation counter; only the invocation holding the
    /// current epoch may resolve the waiters.
    epoch: u64,
    waiters: Vec<Arc<Mutex<WaiterCell<T>>>>,
}

/// Coalesces overlapping invocations of an async operation onto the most
/// recently started one.
///
/// Cheap to clone; clones share the same invocation window.
///
/// # Example
///
/// ```
/// use dispatchq::coalesce::Coalesce;
/// use dispatchq::Executor;
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// let mut executor = Executor::new();
/// let coalesce = Coalesce::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// for value in [1, 2, 3] {
///     let run = coalesce.run(async move { value });
///     let seen = Arc::clone(&seen);
///     executor.spawner().spawn(async move {
///         seen.lock().push(run.await);
///     });
/// }
/// executor.run_until_idle();
/// // Every caller observed the most recently started invocation.
/// assert_eq!(*seen.lock(), vec![3, 3, 3]);
/// ```
pub struct Coalesce<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Coalesce<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for Coalesce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Coalesce<T> {
    /// Creates an empty invocation window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                epoch: 0,
                waiters: Vec::new(),
            })),
        }
    }

    /// Starts an invocation.
    ///
    /// The returned future resolves with the outcome of whichever
    /// invocation was started last among those overlapping this one.
    /// The invocation counts as started when `run` is called, not when
    /// the future is first polled.
    pub fn run<Fut>(&self, operation: Fut) -> CoalesceRun<Fut, T>
    where
        Fut: Future<Output = T>,
    {
        let cell = Arc::new(Mutex::new(WaiterCell::default()));
        let epoch = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.waiters.push(Arc::clone(&cell));
            tracing::trace!(epoch = state.epoch, waiters = state.waiters.len(), "coalesced invocation started");
            state.epoch
        };
        CoalesceRun {
            state: Arc::clone(&self.state),
            epoch,
            operation: Some(Box::pin(operation)),
            cell,
        }
    }
}

/// Future returned by [`Coalesce::run`].
pub struct CoalesceRun<Fut, T>
where
    Fut: Future<Output = T>,
{
    state: Arc<Mutex<State<T>>>,
    /// Epoch assigned to this invocation at start.
    epoch: u64,
    /// The underlying operation; dropped once it completes or once a
    /// newer invocation's outcome arrives first.
    operation: Option<Pin<Box<Fut>>>,
    cell: Arc<Mutex<WaiterCell<T>>>,
}

impl<Fut, T> Future for CoalesceRun<Fut, T>
where
    Fut: Future<Output = T>,
    T: Clone,
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        // A newer invocation may already have delivered our outcome.
        {
            let mut cell = this.cell.lock();
            if let Some(value) = cell.value.take() {
                cell.waker = None;
                return Poll::Ready(value);
            }
            match &cell.waker {
                Some(existing) if existing.will_wake(cx.waker()) => {}
                _ => cell.waker = Some(cx.waker().clone()),
            }
        }

        // Drive our own operation; only the latest-started invocation
        // resolves the window.
        if let Some(operation) = this.operation.as_mut() {
            if let Poll::Ready(outcome) = operation.as_mut().poll(cx) {
                this.operation = None;
                let resolved = {
                    let mut state = this.state.lock();
                    if state.epoch == this.epoch {
                        std::mem::take(&mut state.waiters)
                    } else {
                        tracing::trace!(epoch = this.epoch, current = state.epoch, "stale invocation outcome discarded");
                        Vec::new()
                    }
                };
                for waiter in resolved {
                    let waker = {
                        let mut cell = waiter.lock();
                        cell.value = Some(outcome.clone());
                        cell.waker.take()
                    };
                    if let Some(waker) = waker {
                        waker.wake();
                    }
                }
                // If we were the resolving invocation, our own cell was
                // just filled.
                let mut cell = this.cell.lock();
                if let Some(value) = cell.value.take() {
                    cell.waker = None;
                    return Poll::Ready(value);
                }
            }
        }

        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Executor, yield_now};

    async fn delayed<T>(value: T, ticks: u32) -> T {
        for _ in 0..ticks {
            yield_now().await;
        }
        value
    }

    fn collect_runs<T, Fut>(executor: &mut Executor, runs: Vec<CoalesceRun<Fut, T>>) -> Vec<T>
    where
        T: Clone + 'static,
        Fut: Future<Output = T> + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for run in runs {
            let seen = Arc::clone(&seen);
            executor.spawner().spawn(async move {
                let value = run.await;
                seen.lock().push(value);
            });
        }
        executor.run_until_idle();
        Arc::try_unwrap(seen)
            .map(Mutex::into_inner)
            .unwrap_or_default()
    }

    #[test]
    fn all_callers_observe_the_latest_outcome() {
        let mut executor = Executor::new();
        let coalesce = Coalesce::new();
        let runs = vec![
            coalesce.run(delayed(1, 3)),
            coalesce.run(delayed(2, 5)),
            coalesce.run(delayed(3, 2)),
        ];
        assert_eq!(collect_runs(&mut executor, runs), vec![3, 3, 3]);
    }

    #[test]
    fn latest_wins_even_when_it_finishes_last() {
        let mut executor = Executor::new();
        let coalesce = Coalesce::new();
        let runs = vec![
            coalesce.run(delayed(1, 0)),
            coalesce.run(delayed(2, 1)),
            coalesce.run(delayed(3, 6)),
        ];
        assert_eq!(collect_runs(&mut executor, runs), vec![3, 3, 3]);
    }

    #[test]
    fn earlier_failures_are_superseded() {
        let mut executor = Executor::new();
        let coalesce = Coalesce::new();
        let runs = vec![
            coalesce.run(delayed(Err("first"), 3)),
            coalesce.run(delayed(Err("second"), 5)),
            coalesce.run(delayed(Ok(3), 2)),
        ];
        assert_eq!(
            collect_runs(&mut executor, runs),
            vec![Ok(3), Ok(3), Ok(3)]
        );
    }

    #[test]
    fn failing_latest_invocation_fails_every_caller() {
        let mut executor = Executor::new();
        let coalesce = Coalesce::new();
        let runs = vec![
            coalesce.run(delayed(Ok(1), 3)),
            coalesce.run(delayed(Ok(2), 5)),
            coalesce.run(delayed(Err("broken"), 2)),
        ];
        assert_eq!(
            collect_runs(&mut executor, runs),
            vec![Err("broken"), Err("broken"), Err("broken")]
        );
    }

    #[test]
    fn sequential_invocations_do_not_coalesce() {
        let mut executor = Executor::new();
        let coalesce = Coalesce::new();
        let first = collect_runs(&mut executor, vec![coalesce.run(delayed(1, 1))]);
        let second = collect_runs(&mut executor, vec![coalesce.run(delayed(2, 1))]);
        assert_eq!(first, vec![1]);
        assert_eq!(second, vec![2]);
    }
}
