//! Deferred computations and their combinators.
//!
//! An [`Await<T>`] is a recipe: a function which, given a continuation,
//! starts one activation of a computation and returns a [`Cancel`] handle.
//! The continuation fires at most once per activation, possibly on another
//! thread, possibly before [`Await::start`] has even returned.
//!
//! # Examples
//!
//! ```
//! use cps_concurrency::prelude::*;
//! use cps_concurrency::config::Inline;
//! use std::sync::Arc;
//!
//! let double = |n: u32| Await::operation(move || n * 2, Arc::new(Inline));
//!
//! // Await multiple similarly-typed computations.
//! let results = vec![double(1), double(2), double(3)].all().wait_success(None).unwrap();
//! let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
//! assert_eq!(values, [2, 4, 6]);
//!
//! // Take whichever completes first.
//! let first = [double(5), Await::never()].any().wait_success(None).unwrap();
//! assert_eq!(first, 10);
//! ```
//!
//! # Operations
//!
//! | Name         | Output               | When does it complete?
//! | ---          | ---                  | ---
//! | [`All`]      | `Vec<Result<T>>`     | Every source reported
//! | [`Any`]      | `T`                  | First source reported, even with an error
//! | [`Many`]     | `R`                  | First decisive choice, or the default when all reported
//! | [`many2`]    | `R`                  | Two differently-typed sources, same rules as `Many`
//! | [`sequence`] | `T`                  | A chain of dependent steps finished

use core::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::gate::SingleFire;
use crate::{fault, Cancel, Config, Error, Outcome, Result};

pub use all::{all, All};
pub use any::{any, Any};
pub use awaiting::{sequence, sequence_unit, Step};
pub use event::{EventBridge, EventHandler, EventSource, Unsubscribe};
pub use into_future::AwaitFuture;
pub use many::{many, many2, Many};

mod all;
mod any;
mod awaiting;
mod common;
mod event;
mod into_future;
mod many;
mod operation;
mod wait;

/// Receives the outcome of one activation.
pub type Continuation<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// A deferred computation which eventually succeeds, fails, or is cancelled.
///
/// `Await` is cheap to clone and holds no per-run state, so the same recipe
/// may be started any number of times, concurrently, with independent
/// results.
#[must_use = "an `Await` does nothing until it is started"]
pub struct Await<T> {
    recipe: Arc<dyn Fn(Continuation<T>) -> Cancel + Send + Sync>,
}

impl<T> Clone for Await<T> {
    fn clone(&self) -> Self {
        Self {
            recipe: self.recipe.clone(),
        }
    }
}

impl<T> fmt::Debug for Await<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Await")
            .field("output", &core::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Await<T> {
    /// Build an `Await` from a raw recipe.
    ///
    /// The recipe must call the continuation at most once and should return
    /// an idempotent cancel handle; [`Cancel::once`] helps with the latter.
    ///
    /// # Examples
    ///
    /// ```
    /// use cps_concurrency::prelude::*;
    ///
    /// let answer = Await::new(|complete| {
    ///     complete(Some(Ok(42)));
    ///     Cancel::nothing()
    /// });
    /// assert_eq!(answer.wait_success(None).unwrap(), 42);
    /// ```
    pub fn new(recipe: impl Fn(Continuation<T>) -> Cancel + Send + Sync + 'static) -> Self {
        Self {
            recipe: Arc::new(recipe),
        }
    }

    /// Start one activation, delivering its outcome to `continuation`.
    pub fn start(&self, continuation: impl FnOnce(Outcome<T>) + Send + 'static) -> Cancel {
        (self.recipe)(Box::new(continuation))
    }

    /// Complete immediately with a clone of `value`.
    pub fn ready(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move |complete| {
            complete(Some(Ok(value.clone())));
            Cancel::nothing()
        })
    }

    /// Fail immediately with `error`.
    pub fn failed(error: impl Into<Error>) -> Self {
        let error = error.into();
        Self::new(move |complete| {
            complete(Some(Err(error.clone())));
            Cancel::nothing()
        })
    }

    /// Never complete on its own; cancelling delivers `None`.
    pub fn never() -> Self {
        Self::new(|complete| {
            let completer = Arc::new(Completer::new(complete));
            Cancel::new(move || {
                completer.complete(None);
            })
        })
    }

    /// Transform the success value.
    ///
    /// Cancellation and errors pass through untouched. A panic in `map`
    /// becomes the error of the resulting `Await`.
    pub fn map<R, F>(self, map: F) -> Await<R>
    where
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok(map(value)))
    }

    /// Transform the success value with a fallible function.
    pub fn try_map<R, F>(self, map: F) -> Await<R>
    where
        R: Send + 'static,
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
    {
        let map = Arc::new(map);
        Await::new(move |complete| {
            let completer = Arc::new(Completer::new(complete));
            let map = map.clone();
            let forward = completer.clone();
            let started = fault::catch(|| {
                self.start(move |outcome| {
                    forward.complete(outcome.map(|res| {
                        res.and_then(|value| fault::catch_flatten(|| map(value)))
                    }));
                })
            });
            match started {
                Ok(cancel) => cancel,
                Err(error) => {
                    completer.complete(Some(Err(error)));
                    Cancel::nothing()
                }
            }
        })
    }

    /// Observe the success value, discarding it.
    pub fn take<F>(self, take: F) -> Await<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.map(take)
    }

    /// Start one activation, routing each kind of outcome to its own callback.
    pub fn handle<S, E, C>(&self, on_success: S, on_error: E, on_cancel: C) -> Cancel
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.start(move |outcome| match outcome {
            Some(Ok(value)) => on_success(value),
            Some(Err(error)) => on_error(error),
            None => on_cancel(),
        })
    }

    /// Start one activation nobody waits on.
    ///
    /// A failure is handed to [`Config::report_unhandled`]; a success or a
    /// cancellation is dropped.
    pub fn forget(&self, config: &Config) {
        let config = config.clone();
        self.start(move |outcome| {
            if let Some(Err(error)) = outcome {
                config.report_unhandled(&error);
            }
        });
    }
}

/// Delivers the outcome of one activation exactly once.
///
/// Every path that may end an activation (the computation finishing, a
/// racing source deciding, a caller cancelling) goes through the same
/// completer; the first one wins and the rest are no-ops.
pub(crate) struct Completer<T> {
    gate: SingleFire,
    continuation: Mutex<Option<Continuation<T>>>,
}

impl<T> Completer<T> {
    pub(crate) fn new(continuation: Continuation<T>) -> Self {
        Self {
            gate: SingleFire::new(),
            continuation: Mutex::new(Some(continuation)),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.gate.is_closed()
    }

    pub(crate) fn complete(&self, outcome: Outcome<T>) -> bool {
        self.complete_with(|| outcome)
    }

    /// Run `finish` and deliver what it returns, if nobody completed first.
    pub(crate) fn complete_with(&self, finish: impl FnOnce() -> Outcome<T>) -> bool {
        self.gate.run_once(|| {
            let outcome = finish();
            let continuation = self
                .continuation
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(continuation) = continuation {
                continuation(outcome);
            }
        })
    }
}
