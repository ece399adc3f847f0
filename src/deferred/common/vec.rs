use crate::deferred::{Await, Completer, Continuation};
use crate::gate::CountdownGate;
use crate::{fault, Cancel, Outcome, Result};

use core::fmt;
use core::marker::PhantomData;
use core::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

/// What a combinator does with each source's result.
///
/// One behavior value is created per activation, so it may keep per-run
/// state (for example the slots `All` fills in).
pub(crate) trait CombinatorBehaviorVec<T>: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Inspect the result of source `idx`.
    ///
    /// `Ok(Some(_))` completes the combinator right away, `Err(_)` fails it,
    /// and `Ok(None)` means "no opinion", counting towards the default.
    fn maybe_return(&self, idx: usize, res: Result<T>) -> Result<Option<Self::Output>>;

    /// Produce the result once every source reported without a decision.
    fn when_completed_vec(&self) -> Result<Self::Output>;
}

/// Build an `Await` racing `sources` under the behavior produced by `make`.
///
/// # Panics
///
/// Panics when `sources` is empty: with nothing to race there is nobody to
/// decide and nobody to report, so the combinator could never complete.
pub(crate) fn combine<T, B, M>(sources: Vec<Await<T>>, make: M) -> Await<B::Output>
where
    T: Send + 'static,
    B: CombinatorBehaviorVec<T>,
    M: Fn() -> B + Send + Sync + 'static,
{
    let count = match NonZeroUsize::new(sources.len()) {
        Some(count) => count,
        None => panic!("combinators only work on a non-empty set of sources"),
    };

    Await::new(move |complete| {
        let this = Arc::new(CombinatorVec::new(make(), count, complete));

        for (idx, source) in sources.iter().enumerate() {
            if this.completer.is_done() {
                tracing::trace!(idx, "decided early; not starting the remaining sources");
                break;
            }
            let activation = this.clone();
            let started = fault::catch(|| {
                source.start(move |outcome| activation.on_outcome(idx, outcome))
            });
            match started {
                Ok(cancel) => this.register(idx, cancel),
                Err(error) => {
                    tracing::debug!(idx, %error, "starting a source panicked");
                    this.finish(Some(Err(error)));
                    break;
                }
            }
        }

        if this.completer.is_done() {
            // Whatever registered after the winner drained the cancel list.
            this.cancel_pending();
            return Cancel::nothing();
        }
        Cancel::new(move || this.finish(None))
    })
}

/// Shared state of one activation of a vec combinator.
pub(crate) struct CombinatorVec<T, B>
where
    B: CombinatorBehaviorVec<T>,
{
    behavior: B,
    completer: Completer<B::Output>,
    countdown: CountdownGate,
    book: Mutex<Bookkeeping>,
    _source: PhantomData<fn(T)>,
}

struct Bookkeeping {
    /// Cancel handles of the sources still running, by index.
    cancels: SmallVec<[Option<Cancel>; 4]>,
    /// Sources which delivered a result. Each counts towards the default once.
    reported: FixedBitSet,
}

impl<T, B> CombinatorVec<T, B>
where
    T: Send + 'static,
    B: CombinatorBehaviorVec<T>,
{
    fn new(behavior: B, count: NonZeroUsize, complete: Continuation<B::Output>) -> Self {
        let len = count.get();
        Self {
            behavior,
            completer: Completer::new(complete),
            countdown: count.into(),
            book: Mutex::new(Bookkeeping {
                cancels: std::iter::repeat_with(|| None).take(len).collect(),
                reported: FixedBitSet::with_capacity(len),
            }),
            _source: PhantomData,
        }
    }

    fn book(&self) -> MutexGuard<'_, Bookkeeping> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, idx: usize, cancel: Cancel) {
        let mut book = self.book();
        if !book.reported.contains(idx) {
            book.cancels[idx] = Some(cancel);
        }
    }

    fn on_outcome(&self, idx: usize, outcome: Outcome<T>) {
        // A source delivering `None` was cancelled from the outside; that is
        // not a completion and does not count towards anything.
        let Some(res) = outcome else {
            tracing::trace!(idx, "ignoring cancelled source");
            return;
        };

        {
            let mut book = self.book();
            if book.reported.put(idx) {
                return;
            }
            book.cancels[idx] = None;
        }

        match fault::catch_flatten(|| self.behavior.maybe_return(idx, res)) {
            Ok(Some(output)) => {
                tracing::trace!(idx, "source decided the race");
                self.finish(Some(Ok(output)));
            }
            Err(error) => {
                tracing::trace!(idx, %error, "source decided the race with an error");
                self.finish(Some(Err(error)));
            }
            Ok(None) => {
                self.countdown.run_on_nth_hit(|| {
                    tracing::trace!("every source reported without a decision");
                    self.completer.complete_with(|| {
                        Some(fault::catch_flatten(|| self.behavior.when_completed_vec()))
                    });
                });
            }
        }
    }

    /// Cancel whatever is still running, then deliver `outcome`.
    fn finish(&self, outcome: Outcome<B::Output>) {
        self.completer.complete_with(|| {
            self.cancel_pending();
            outcome
        });
    }

    fn cancel_pending(&self) {
        let pending: SmallVec<[Cancel; 4]> = self
            .book()
            .cancels
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        if !pending.is_empty() {
            tracing::trace!(count = pending.len(), "cancelling pending sources");
        }
        for cancel in pending {
            cancel.cancel();
        }
    }
}

impl<T, B> fmt::Debug for CombinatorVec<T, B>
where
    B: CombinatorBehaviorVec<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinatorVec")
            .field("done", &self.completer.is_done())
            .field("remaining", &self.countdown.remaining())
            .finish()
    }
}
