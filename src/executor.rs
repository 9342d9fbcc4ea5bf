//! Minimal single-threaded cooperative executor.
//!
//! The dispatcher coordinates logically concurrent work on one
//! cooperative timeline; this executor is that timeline. It runs futures
//! to completion by stepping a ready queue, and it is deliberately tiny:
//! no timers, no I/O, no threads.
//!
//! New futures enter through a cloneable [`Spawner`] handle into an
//! injector queue; the executor drains the injector at the start of every
//! step, so tasks may spawn further tasks while being polled. This is the
//! deferred-tick primitive the dispatcher's intake batching relies on: a
//! future spawned during the current step is not polled before the step
//! finishes, and [`yield_now`] pushes work behind everything already
//! ready.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

/// FIFO of task ids whose wakers have fired.
///
/// Shared with wakers, so it must be `Send + Sync` even though the
/// executor itself never leaves its thread.
#[derive(Debug, Default)]
struct ReadyQueue {
    ids: Mutex<VecDeque<usize>>,
}

struct TaskWaker {
    id: usize,
    ready: Arc<ReadyQueue>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.ready.ids.lock().push_back(self.id);
    }
}

/// Futures spawned but not yet installed in the executor's task table.
#[derive(Default)]
struct Injector {
    incoming: Mutex<VecDeque<LocalFuture>>,
}

/// Cloneable handle for spawning futures onto an [`Executor`].
#[derive(Clone)]
pub struct Spawner {
    injector: Arc<Injector>,
}

impl Spawner {
    /// Queues `future` for execution. It will first be polled on a
    /// subsequent executor step, never re-entrantly within the current
    /// one.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.injector.incoming.lock().push_back(Box::pin(future));
    }
}

/// A single-threaded executor driving a set of `'static` futures.
pub struct Executor {
    tasks: Vec<Option<LocalFuture>>,
    free: Vec<usize>,
    live: usize,
    ready: Arc<ReadyQueue>,
    injector: Arc<Injector>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an empty executor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            free: Vec::new(),
            live: 0,
            ready: Arc::new(ReadyQueue::default()),
            injector: Arc::new(Injector::default()),
        }
    }

    /// Returns a handle for spawning futures onto this executor.
    #[must_use]
    pub fn spawner(&self) -> Spawner {
        Spawner {
            injector: Arc::clone(&self.injector),
        }
    }

    /// Number of installed, unfinished tasks.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.live
    }

    fn install_incoming(&mut self) {
        loop {
            let future = self.injector.incoming.lock().pop_front();
            let Some(future) = future else { break };
            let id = match self.free.pop() {
                Some(id) => {
                    self.tasks[id] = Some(future);
                    id
                }
                None => {
                    self.tasks.push(Some(future));
                    self.tasks.len() - 1
                }
            };
            self.live += 1;
            self.ready.ids.lock().push_back(id);
        }
    }

    /// Polls the next ready task, installing newly spawned futures first.
    ///
    /// Returns false when nothing was ready and nothing was pending
    /// installation. A panic in a polled future propagates to the caller.
    pub fn step(&mut self) -> bool {
        self.install_incoming();
        let Some(id) = self.ready.ids.lock().pop_front() else {
            return false;
        };
        // Stale wakeups for completed tasks leave empty slots behind.
        let Some(mut future) = self.tasks.get_mut(id).and_then(Option::take) else {
            return true;
        };
        let waker = Waker::from(Arc::new(TaskWaker {
            id,
            ready: Arc::clone(&self.ready),
        }));
        let mut cx = Context::from_waker(&waker);
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                self.live -= 1;
                self.free.push(id);
            }
            Poll::Pending => {
                self.tasks[id] = Some(future);
            }
        }
        true
    }

    /// Steps until no task is ready and no spawn is pending.
    ///
    /// Tasks blocked on wakers that nothing will fire (for example a
    /// handle whose dispatcher is gone) are left pending; this returns
    /// once the timeline is quiescent, not necessarily empty.
    pub fn run_until_idle(&mut self) {
        while self.step() {}
    }
}

/// Future that yields once, re-scheduling its task behind everything
/// currently ready.
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Yields execution back to the executor, allowing other tasks to run.
#[must_use]
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn runs_a_spawned_future() {
        let mut executor = Executor::new();
        let hit = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&hit);
        executor.spawner().spawn(async move {
            *flag.borrow_mut() = true;
        });
        executor.run_until_idle();
        assert!(*hit.borrow());
        assert_eq!(executor.live_tasks(), 0);
    }

    #[test]
    fn spawn_during_poll_runs_after_current_step() {
        let mut executor = Executor::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let spawner = executor.spawner();

        let outer_order = Rc::clone(&order);
        let inner_spawner = spawner.clone();
        spawner.spawn(async move {
            let inner_order = Rc::clone(&outer_order);
            inner_spawner.spawn(async move {
                inner_order.borrow_mut().push("inner");
            });
            outer_order.borrow_mut().push("outer");
        });

        executor.run_until_idle();
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn yield_now_runs_behind_ready_tasks() {
        let mut executor = Executor::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let spawner = executor.spawner();

        let first = Rc::clone(&order);
        spawner.spawn(async move {
            yield_now().await;
            first.borrow_mut().push("yielder");
        });
        let second = Rc::clone(&order);
        spawner.spawn(async move {
            second.borrow_mut().push("ready");
        });

        executor.run_until_idle();
        assert_eq!(*order.borrow(), vec!["ready", "yielder"]);
    }

    #[test]
    fn task_slots_are_reused() {
        let mut executor = Executor::new();
        let spawner = executor.spawner();
        for _ in 0..3 {
            spawner.spawn(async {});
            executor.run_until_idle();
        }
        assert!(executor.tasks.len() <= 2);
        assert_eq!(executor.live_tasks(), 0);
    }
}
