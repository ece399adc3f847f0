//! Bridging push-style event sources into [`Await`].

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use slab::Slab;

use super::{Await, Completer};
use crate::{fault, Cancel, Outcome, Result};

/// A callback registered with an event source.
pub type EventHandler<E> = Arc<dyn Fn(E) + Send + Sync + 'static>;

/// Removes a handler from the event source it was registered with.
pub type Unsubscribe = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Something an [`Await`] can listen to.
///
/// `subscribe` registers `handler` and returns the way to remove it again.
/// The handler may be called on any thread, including from within
/// `subscribe` itself.
///
/// Closures of the right shape are bridges already:
///
/// ```
/// use cps_concurrency::deferred::{EventBridge, EventHandler, Unsubscribe};
/// use cps_concurrency::Result;
///
/// fn assert_bridge<E>(_: &impl EventBridge<E>) {}
///
/// let bridge = |handler: EventHandler<u32>| -> Result<Unsubscribe> {
///     handler(7);
///     Ok(Box::new(|| Ok(())))
/// };
/// assert_bridge(&bridge);
/// ```
pub trait EventBridge<E>: Send + Sync {
    /// Register `handler`.
    fn subscribe(&self, handler: EventHandler<E>) -> Result<Unsubscribe>;
}

impl<E, F> EventBridge<E> for F
where
    F: Fn(EventHandler<E>) -> Result<Unsubscribe> + Send + Sync,
{
    fn subscribe(&self, handler: EventHandler<E>) -> Result<Unsubscribe> {
        self(handler)
    }
}

impl<T: Send + 'static> Await<T> {
    /// Wait until `choose` decides, re-evaluating it on every event.
    ///
    /// `choose` is first called with `None` before subscribing: if the
    /// condition already holds (or fails) the `Await` completes at once and
    /// `bridge` is never touched. It is asked once more right after
    /// subscribing, then with `Some(event)` for every event. `Ok(None)` keeps
    /// waiting.
    ///
    /// On completion, including cancellation, the handler is unsubscribed
    /// before the outcome is delivered. A failing unsubscribe replaces the
    /// outcome with its error.
    ///
    /// # Examples
    ///
    /// ```
    /// use cps_concurrency::prelude::*;
    /// use cps_concurrency::deferred::EventSource;
    ///
    /// let clicks = EventSource::<u32>::new();
    /// let third = Await::condition(clicks.clone(), |click| Ok(click.filter(|n| *n == 3)));
    ///
    /// let cancel = third.start(|outcome| assert!(matches!(outcome, Some(Ok(3)))));
    /// for n in 1..=3 {
    ///     clicks.emit(n);
    /// }
    /// assert_eq!(clicks.subscriber_count(), 0);
    /// # drop(cancel);
    /// ```
    pub fn condition<E, B, F>(bridge: B, choose: F) -> Self
    where
        E: 'static,
        B: EventBridge<E> + 'static,
        F: Fn(Option<E>) -> Result<Option<T>> + Send + Sync + 'static,
    {
        let bridge = Arc::new(bridge);
        let choose = Arc::new(choose);
        Self::new(move |complete| {
            match fault::catch_flatten(|| choose(None)) {
                Ok(None) => {}
                Ok(Some(value)) => {
                    tracing::trace!("condition held before subscribing");
                    complete(Some(Ok(value)));
                    return Cancel::nothing();
                }
                Err(error) => {
                    complete(Some(Err(error)));
                    return Cancel::nothing();
                }
            }

            let this = Arc::new(Listener {
                completer: Completer::new(complete),
                token: Mutex::new(Token::Pending),
            });

            let handler: EventHandler<E> = {
                let this = this.clone();
                let choose = choose.clone();
                Arc::new(move |event| {
                    if this.completer.is_done() {
                        return;
                    }
                    this.decide(fault::catch_flatten(|| choose(Some(event))));
                })
            };

            match fault::catch_flatten(|| bridge.subscribe(handler)) {
                Ok(unsubscribe) => this.store_token(unsubscribe),
                Err(error) => {
                    tracing::debug!(%error, "subscribing failed");
                    this.completer.complete(Some(Err(error)));
                    return Cancel::nothing();
                }
            }

            if !this.completer.is_done() {
                this.decide(fault::catch_flatten(|| choose(None)));
            }

            Cancel::new(move || this.finish(None))
        })
    }

    /// Wait until `choose` decides on an event.
    ///
    /// Unlike [`Await::condition`] nothing is decided before the first
    /// event arrives.
    pub fn event<E, B, F>(bridge: B, choose: F) -> Self
    where
        E: 'static,
        B: EventBridge<E> + 'static,
        F: Fn(E) -> Result<Option<T>> + Send + Sync + 'static,
    {
        Self::condition(bridge, move |event: Option<E>| match event {
            Some(event) => choose(event),
            None => Ok(None),
        })
    }
}

enum Token {
    /// `subscribe` has not returned yet.
    Pending,
    Held(Unsubscribe),
    /// Already unsubscribed, or finished before the token arrived.
    Spent,
}

struct Listener<T> {
    completer: Completer<T>,
    token: Mutex<Token>,
}

impl<T: Send + 'static> Listener<T> {
    fn token(&self) -> MutexGuard<'_, Token> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_token(&self, unsubscribe: Unsubscribe) {
        let late = {
            let mut token = self.token();
            match *token {
                Token::Pending => {
                    *token = Token::Held(unsubscribe);
                    None
                }
                _ => Some(unsubscribe),
            }
        };
        if let Some(unsubscribe) = late {
            tracing::trace!("finished while subscribing; unsubscribing late");
            if let Err(error) = fault::catch_flatten(unsubscribe) {
                tracing::debug!(%error, "late unsubscribe failed; outcome already delivered");
            }
        }
    }

    fn decide(&self, verdict: Result<Option<T>>) {
        match verdict {
            Ok(None) => {}
            Ok(Some(value)) => self.finish(Some(Ok(value))),
            Err(error) => self.finish(Some(Err(error))),
        }
    }

    fn finish(&self, outcome: Outcome<T>) {
        self.completer.complete_with(|| {
            let token = core::mem::replace(&mut *self.token(), Token::Spent);
            match token {
                Token::Held(unsubscribe) => match fault::catch_flatten(unsubscribe) {
                    Ok(()) => outcome,
                    Err(error) => {
                        tracing::debug!(%error, "unsubscribe failed");
                        Some(Err(error))
                    }
                },
                Token::Pending | Token::Spent => outcome,
            }
        });
    }
}

/// A minimal multicast event source.
///
/// Handlers are kept in a [`Slab`] and called outside the registry lock, so
/// a handler may subscribe or unsubscribe while being called.
pub struct EventSource<E> {
    handlers: Arc<Mutex<Slab<EventHandler<E>>>>,
}

impl<E> EventSource<E> {
    /// Create a source without subscribers.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(Slab::new())),
        }
    }

    fn handlers(&self) -> MutexGuard<'_, Slab<EventHandler<E>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The number of handlers currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.handlers().len()
    }
}

impl<E: Clone> EventSource<E> {
    /// Call every registered handler with a clone of `event`.
    pub fn emit(&self, event: E) {
        let handlers: Vec<EventHandler<E>> =
            self.handlers().iter().map(|(_, handler)| handler.clone()).collect();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

impl<E> Clone for EventSource<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<E> Default for EventSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<E: 'static> EventBridge<E> for EventSource<E> {
    fn subscribe(&self, handler: EventHandler<E>) -> Result<Unsubscribe> {
        let key = self.handlers().insert(handler);
        let handlers = self.handlers.clone();
        Ok(Box::new(move || {
            handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_remove(key);
            Ok(())
        }))
    }
}
