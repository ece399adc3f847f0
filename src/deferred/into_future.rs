use core::fmt;
use core::future::{Future, IntoFuture};
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_core::future::FusedFuture;

use super::Await;
use crate::{Cancel, Outcome};

/// A future driving one activation of an [`Await`].
///
/// This `struct` is created by the [`IntoFuture`] implementation of
/// [`Await`], which makes `.await` work on it directly. The activation starts
/// on the first poll. Dropping the future before it completed cancels the
/// activation.
#[must_use = "futures do nothing unless polled or .awaited"]
pub struct AwaitFuture<T> {
    source: Await<T>,
    shared: Arc<Mutex<Slot<T>>>,
    state: State,
}

/// The internal state
#[derive(Debug)]
enum State {
    Idle,
    Running(Cancel),
    Completed,
}

struct Slot<T> {
    outcome: Option<Outcome<T>>,
    waker: Option<Waker>,
}

fn lock<T>(shared: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + 'static> AwaitFuture<T> {
    fn new(source: Await<T>) -> Self {
        Self {
            source,
            shared: Arc::new(Mutex::new(Slot {
                outcome: None,
                waker: None,
            })),
            state: State::Idle,
        }
    }

    fn take_outcome(&mut self, cx: &mut Context<'_>) -> Option<Outcome<T>> {
        let mut slot = lock(&self.shared);
        match slot.outcome.take() {
            Some(outcome) => Some(outcome),
            None => {
                let stale = slot
                    .waker
                    .as_ref()
                    .map_or(true, |waker| !waker.will_wake(cx.waker()));
                if stale {
                    slot.waker = Some(cx.waker().clone());
                }
                None
            }
        }
    }
}

impl<T: Send + 'static> Future for AwaitFuture<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(
            !matches!(this.state, State::Completed),
            "Futures must not be polled after completing"
        );

        if let Some(outcome) = this.take_outcome(cx) {
            this.state = State::Completed;
            return Poll::Ready(outcome);
        }

        if let State::Idle = this.state {
            let shared = this.shared.clone();
            let cancel = this.source.start(move |outcome| {
                let waker = {
                    let mut slot = lock(&shared);
                    slot.outcome = Some(outcome);
                    slot.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            });
            this.state = State::Running(cancel);

            // The activation may have completed before `start` returned.
            if let Some(outcome) = lock(&this.shared).outcome.take() {
                this.state = State::Completed;
                return Poll::Ready(outcome);
            }
        }

        Poll::Pending
    }
}

impl<T: Send + 'static> FusedFuture for AwaitFuture<T> {
    fn is_terminated(&self) -> bool {
        matches!(self.state, State::Completed)
    }
}

impl<T> Drop for AwaitFuture<T> {
    fn drop(&mut self) {
        if let State::Running(cancel) = &self.state {
            tracing::trace!("dropping a running activation; cancelling it");
            cancel.cancel();
        }
    }
}

impl<T> fmt::Debug for AwaitFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitFuture")
            .field("source", &self.source)
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Send + 'static> IntoFuture for Await<T> {
    type Output = Outcome<T>;
    type IntoFuture = AwaitFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        AwaitFuture::new(self)
    }
}
