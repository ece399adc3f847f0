use crate::deferred::{Await, Completer, Continuation};
use crate::gate::CountdownGate;
use crate::{fault, Cancel, ErrorKind, Outcome, Result};

use core::fmt;
use core::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Race two differently-typed sources against a chooser.
///
/// After every real report `choose` sees the latest result of each side,
/// `None` standing for "has not reported yet". The first `Ok(Some(_))` (or
/// error) decides and cancels the other side; once both sides reported
/// without a decision the result is `default`.
///
/// # Examples
///
/// ```
/// use cps_concurrency::prelude::*;
/// use cps_concurrency::deferred::many2;
///
/// let name = Await::ready("ferris");
/// let age = Await::<u8>::never();
///
/// let first = many2(name, age, "nobody", |name, _age| {
///     Ok(name.as_ref().and_then(|res| res.as_ref().ok().copied()))
/// });
/// assert_eq!(first.wait_success(None).unwrap(), "ferris");
/// ```
pub fn many2<T1, T2, R, F>(first: Await<T1>, second: Await<T2>, default: R, choose: F) -> Await<R>
where
    T1: Send + 'static,
    T2: Send + 'static,
    R: Clone + Send + Sync + 'static,
    F: Fn(&Option<Result<T1>>, &Option<Result<T2>>) -> Result<Option<R>> + Send + Sync + 'static,
{
    let choose = Arc::new(choose);
    Await::new(move |complete| {
        let this = Arc::new(Race2::new(choose.clone(), default.clone(), complete));

        let activation = this.clone();
        match fault::catch(|| first.start(move |outcome| activation.on_first(outcome))) {
            Ok(cancel) => this.state().register_first(cancel),
            Err(error) => this.finish(Some(Err(error))),
        }
        if this.completer.is_done() {
            this.cancel_pending();
            return Cancel::nothing();
        }

        let activation = this.clone();
        match fault::catch(|| second.start(move |outcome| activation.on_second(outcome))) {
            Ok(cancel) => this.state().register_second(cancel),
            Err(error) => this.finish(Some(Err(error))),
        }
        if this.completer.is_done() {
            this.cancel_pending();
            return Cancel::nothing();
        }

        Cancel::new(move || this.finish(None))
    })
}

impl<T1: Send + 'static> Await<T1> {
    /// Race this `Await` against `other`; see [`many2`].
    pub fn many_with<T2, R, F>(self, other: Await<T2>, default: R, choose: F) -> Await<R>
    where
        T2: Send + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(&Option<Result<T1>>, &Option<Result<T2>>) -> Result<Option<R>>
            + Send
            + Sync
            + 'static,
    {
        many2(self, other, default, choose)
    }
}

/// Both sides have to report before the default is used.
const SIDES: NonZeroUsize = match NonZeroUsize::new(2) {
    Some(sides) => sides,
    None => unreachable!(),
};

/// Shared state of one activation of [`many2`].
struct Race2<T1, T2, R, F> {
    choose: Arc<F>,
    default: Mutex<Option<R>>,
    completer: Completer<R>,
    countdown: CountdownGate,
    state: Mutex<State<T1, T2>>,
}

struct State<T1, T2> {
    first: Option<Result<T1>>,
    second: Option<Result<T2>>,
    cancel_first: Option<Cancel>,
    cancel_second: Option<Cancel>,
}

impl<T1, T2> State<T1, T2> {
    fn register_first(&mut self, cancel: Cancel) {
        if self.first.is_none() {
            self.cancel_first = Some(cancel);
        }
    }

    fn register_second(&mut self, cancel: Cancel) {
        if self.second.is_none() {
            self.cancel_second = Some(cancel);
        }
    }
}

impl<T1, T2, R, F> Race2<T1, T2, R, F>
where
    T1: Send + 'static,
    T2: Send + 'static,
    R: Send + 'static,
    F: Fn(&Option<Result<T1>>, &Option<Result<T2>>) -> Result<Option<R>> + Send + Sync + 'static,
{
    fn new(choose: Arc<F>, default: R, complete: Continuation<R>) -> Self {
        Self {
            choose,
            default: Mutex::new(Some(default)),
            completer: Completer::new(complete),
            countdown: SIDES.into(),
            state: Mutex::new(State {
                first: None,
                second: None,
                cancel_first: None,
                cancel_second: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T1, T2>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_first(&self, outcome: Outcome<T1>) {
        let Some(res) = outcome else { return };
        {
            let mut state = self.state();
            if state.first.is_some() {
                return;
            }
            state.first = Some(res);
            state.cancel_first = None;
        }
        self.decide();
    }

    fn on_second(&self, outcome: Outcome<T2>) {
        let Some(res) = outcome else { return };
        {
            let mut state = self.state();
            if state.second.is_some() {
                return;
            }
            state.second = Some(res);
            state.cancel_second = None;
        }
        self.decide();
    }

    fn decide(&self) {
        let verdict = {
            let state = self.state();
            fault::catch_flatten(|| (self.choose)(&state.first, &state.second))
        };
        match verdict {
            Ok(Some(output)) => self.finish(Some(Ok(output))),
            Err(error) => self.finish(Some(Err(error))),
            Ok(None) => {
                self.countdown.run_on_nth_hit(|| {
                    self.completer.complete_with(|| {
                        let default = self
                            .default
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        Some(default.ok_or_else(|| {
                            ErrorKind::Exhausted(core::any::type_name::<R>()).into()
                        }))
                    });
                });
            }
        }
    }

    fn finish(&self, outcome: Outcome<R>) {
        self.completer.complete_with(|| {
            self.cancel_pending();
            outcome
        });
    }

    fn cancel_pending(&self) {
        let (first, second) = {
            let mut state = self.state();
            (state.cancel_first.take(), state.cancel_second.take())
        };
        for cancel in first.into_iter().chain(second) {
            cancel.cancel();
        }
    }
}

impl<T1, T2, R, F> fmt::Debug for Race2<T1, T2, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Race2")
            .field("done", &self.completer.is_done())
            .finish_non_exhaustive()
    }
}
