//! Single-use completion channel.
//!
//! Backs [`JoinHandle`](crate::JoinHandle): the dispatcher holds the
//! sender inside a task's work thunk and the submitting caller holds the
//! receiver. A value travels at most once; if the sender is dropped
//! without sending (dispatcher torn down before the task ran), the
//! receiver observes a closed channel.

use parking_lot::Mutex;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Debug)]
struct Inner<T> {
    value: Option<T>,
    sender_dropped: bool,
    receiver_dropped: bool,
    waker: Option<Waker>,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            value: None,
            sender_dropped: false,
            receiver_dropped: false,
            waker: None,
        }
    }
}

/// Creates a connected sender/receiver pair.
pub(crate) fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Mutex::new(Inner::new()));
    (
        Sender {
            inner: Arc::clone(&inner),
        },
        Receiver { inner },
    )
}

/// The sending half; consumed by [`send`](Sender::send).
#[derive(Debug)]
pub(crate) struct Sender<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Sender<T> {
    /// Delivers `value` and wakes a pending receiver.
    ///
    /// If the receiver was dropped the value is discarded: outcomes are
    /// delivered to their own caller only, and a caller that dropped its
    /// handle has declined delivery.
    pub(crate) fn send(self, value: T) {
        let waker = {
            let mut inner = self.inner.lock();
            inner.sender_dropped = true;
            if inner.receiver_dropped {
                None
            } else {
                inner.value = Some(value);
                // Wake outside the lock.
                inner.waker.take()
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let waker = {
            let mut inner = self.inner.lock();
            if inner.sender_dropped {
                None
            } else {
                inner.sender_dropped = true;
                inner.waker.take()
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// The receiving half.
#[derive(Debug)]
pub(crate) struct Receiver<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Receiver<T> {
    /// Polls for the value. `Err(())` means the sender was dropped
    /// without sending.
    pub(crate) fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Result<T, ()>> {
        let mut inner = self.inner.lock();
        if let Some(value) = inner.value.take() {
            inner.waker = None;
            return Poll::Ready(Ok(value));
        }
        if inner.sender_dropped {
            inner.waker = None;
            return Poll::Ready(Err(()));
        }
        match &inner.waker {
            Some(existing) if existing.will_wake(cx.waker()) => {}
            _ => inner.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }

    /// Non-waiting variant of [`poll_recv`](Self::poll_recv), for callers
    /// outside an async context.
    pub(crate) fn try_recv(&mut self) -> Option<T> {
        self.inner.lock().value.take()
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.inner.lock().receiver_dropped = true;
    }
}
