//! Sequential composition of dependent steps.

use core::any::type_name;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Await, Completer};
use crate::{fault, Cancel, ErrorKind, Outcome, Result};

/// One element of a [`sequence`].
#[derive(Debug)]
pub enum Step<T> {
    /// Finish the sequence with this value.
    Ready(T),
    /// Wait for this computation before pulling the next step.
    Proceed(Await<()>),
}

impl<T> From<Await<()>> for Step<T> {
    fn from(step: Await<()>) -> Self {
        Step::Proceed(step)
    }
}

/// Run the steps produced by `make` one after the other.
///
/// Every activation calls `make` for a fresh iterator and pulls it lazily:
/// the next step is only requested once the previous [`Step::Proceed`]
/// succeeded. A [`Step::Ready`] completes the sequence with its value. A
/// failing or cancelled step ends the sequence with that outcome. Running out
/// of steps without a value is an [`ErrorKind::Exhausted`] error.
///
/// Steps which complete synchronously do not nest, so arbitrarily long chains
/// run in constant stack space.
///
/// # Examples
///
/// ```
/// use cps_concurrency::prelude::*;
/// use cps_concurrency::deferred::{sequence, Step};
///
/// let countdown = sequence(|| {
///     (1..=3)
///         .map(|_| Step::Proceed(Await::ready(())))
///         .chain(std::iter::once(Step::Ready("liftoff")))
/// });
/// assert_eq!(countdown.wait_success(None).unwrap(), "liftoff");
/// ```
pub fn sequence<T, I, M>(make: M) -> Await<T>
where
    T: Send + 'static,
    I: Iterator<Item = Step<T>> + Send + 'static,
    M: Fn() -> I + Send + Sync + 'static,
{
    drive(make, exhausted::<T>)
}

/// Like [`sequence`], for step chains which produce no value.
///
/// Running out of steps completes with `Ok(())`.
pub fn sequence_unit<I, M>(make: M) -> Await<()>
where
    I: Iterator<Item = Step<()>> + Send + 'static,
    M: Fn() -> I + Send + Sync + 'static,
{
    drive(make, || Ok(()))
}

fn exhausted<T>() -> Result<T> {
    Err(ErrorKind::Exhausted(type_name::<T>()).into())
}

fn drive<T, I, M>(make: M, on_exhausted: fn() -> Result<T>) -> Await<T>
where
    T: Send + 'static,
    I: Iterator<Item = Step<T>> + Send + 'static,
    M: Fn() -> I + Send + Sync + 'static,
{
    Await::new(move |complete| {
        let steps = match fault::catch(&make) {
            Ok(steps) => steps,
            Err(error) => {
                complete(Some(Err(error)));
                return Cancel::nothing();
            }
        };

        let driver = Arc::new(Driver {
            steps: Mutex::new(steps),
            completer: Completer::new(complete),
            current: Mutex::new(None),
            on_exhausted,
        });
        driver.run();

        if driver.completer.is_done() {
            return Cancel::nothing();
        }
        Cancel::new(move || driver.cancel())
    })
}

/// The step was started and has not completed yet.
const STARTING: u8 = 0;
/// The step completed before `start` returned; the loop goes on.
const COMPLETED_SYNC: u8 = 1;
/// `start` returned first; the step's continuation resumes the loop.
const DETACHED: u8 = 2;

struct Driver<T, I> {
    steps: Mutex<I>,
    completer: Completer<T>,
    current: Mutex<Option<Cancel>>,
    on_exhausted: fn() -> Result<T>,
}

impl<T, I> Driver<T, I>
where
    T: Send + 'static,
    I: Iterator<Item = Step<T>> + Send + 'static,
{
    fn current(&self) -> MutexGuard<'_, Option<Cancel>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(self: &Arc<Self>) {
        loop {
            if self.completer.is_done() {
                return;
            }

            let next = fault::catch(|| {
                self.steps
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .next()
            });
            let step = match next {
                Ok(Some(Step::Proceed(step))) => step,
                Ok(Some(Step::Ready(value))) => {
                    self.completer.complete(Some(Ok(value)));
                    return;
                }
                Ok(None) => {
                    self.completer.complete(Some((self.on_exhausted)()));
                    return;
                }
                Err(error) => {
                    self.completer.complete(Some(Err(error)));
                    return;
                }
            };

            let state = Arc::new(AtomicU8::new(STARTING));
            let resume = {
                let this = self.clone();
                let state = state.clone();
                move |outcome: Outcome<()>| match outcome {
                    Some(Ok(())) => {
                        let resumed = state.compare_exchange(
                            STARTING,
                            COMPLETED_SYNC,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                        if resumed.is_err() {
                            this.run();
                        }
                    }
                    Some(Err(error)) => {
                        this.completer.complete(Some(Err(error)));
                    }
                    None => {
                        tracing::trace!("step cancelled; ending the sequence");
                        this.completer.complete(None);
                    }
                }
            };
            let cancel = match fault::catch(|| step.start(resume)) {
                Ok(cancel) => cancel,
                Err(error) => {
                    self.completer.complete(Some(Err(error)));
                    return;
                }
            };
            *self.current() = Some(cancel);

            let detached = state
                .compare_exchange(STARTING, DETACHED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
            if detached {
                if self.completer.is_done() {
                    // Cancelled while the step was being registered.
                    let current = self.current().take();
                    if let Some(cancel) = current {
                        cancel.cancel();
                    }
                }
                return;
            }
        }
    }

    fn cancel(&self) {
        self.completer.complete_with(|| {
            let current = self.current().take();
            if let Some(cancel) = current {
                cancel.cancel();
            }
            None
        });
    }
}
