use std::sync::Arc;

use super::{Await, Completer};
use crate::config::{Action, Invoker};
use crate::{fault, Cancel, Config, Error, Result};

impl<T: Send + 'static> Await<T> {
    /// Run `op` through `invoker` on every activation.
    ///
    /// A panic in `op` becomes the error of the activation. Cancelling first
    /// asks the invoker to drop the work, then delivers `None`; a result
    /// produced after that is discarded.
    ///
    /// # Examples
    ///
    /// ```
    /// use cps_concurrency::prelude::*;
    /// use cps_concurrency::config::SpawnThread;
    /// use std::sync::Arc;
    ///
    /// let answer = Await::operation(|| 6 * 7, Arc::new(SpawnThread::default()));
    /// assert_eq!(answer.wait_success(None).unwrap(), 42);
    /// ```
    pub fn operation<F>(op: F, invoker: Arc<dyn Invoker>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::try_operation(move || Ok::<_, Error>(op()), invoker)
    }

    /// Run the fallible `op` through `invoker` on every activation.
    pub fn try_operation<F, E>(op: F, invoker: Arc<dyn Invoker>) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        let op = Arc::new(op);
        Self::new(move |complete| {
            let completer = Arc::new(Completer::new(complete));

            let action: Action = {
                let completer = completer.clone();
                let op = op.clone();
                Box::new(move || {
                    if completer.is_done() {
                        tracing::trace!("operation cancelled before it ran");
                        return;
                    }
                    let res = fault::catch_flatten(|| op().map_err(Into::into));
                    completer.complete(Some(res));
                })
            };
            let invoked = invoker.invoke(action);

            Cancel::once(move || {
                invoked.cancel();
                completer.complete(None);
            })
        })
    }

    /// Run `op` on the configured background invoker.
    pub fn spawn<F>(config: &Config, op: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::operation(op, config.async_invoker())
    }

    /// Run the fallible `op` on the configured background invoker.
    pub fn try_spawn<F, E>(config: &Config, op: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        Self::try_operation(op, config.async_invoker())
    }

    /// Run `op` on the configured UI invoker.
    pub fn ui<F>(config: &Config, op: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::operation(op, config.ui_invoker())
    }

    /// Run the fallible `op` on the configured UI invoker.
    pub fn try_ui<F, E>(config: &Config, op: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        Self::try_operation(op, config.ui_invoker())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{Inline, SpawnThread};
    use crate::deferred::test_utils::Recorder;
    use crate::ErrorKind;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};

    #[test]
    fn inline_operation_completes_synchronously() {
        let rec = Recorder::new();
        Await::operation(|| "done", Arc::new(Inline)).start(rec.continuation());
        assert!(matches!(rec.take().as_slice(), [Some(Ok("done"))]));
    }

    #[test]
    fn failing_operation() {
        let res = Await::<u8>::try_operation(
            || Err(io::Error::new(io::ErrorKind::Other, "x")),
            Arc::new(SpawnThread::default()),
        )
        .wait(None);
        match res {
            Some(Err(e)) => {
                assert_eq!(e.to_string(), "x");
                assert!(e.downcast_ref::<io::Error>().is_some());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn panicking_operation() {
        let res = Await::operation(|| -> u8 { panic!("x") }, Arc::new(Inline)).wait(None);
        match res {
            Some(Err(e)) => assert!(matches!(e.kind(), ErrorKind::Panicked(m) if m == "x")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn cancel_reaches_the_invoker_before_none() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let parked: Arc<Mutex<Option<Action>>> = Arc::default();
        let invoker = {
            let log = log.clone();
            let parked = parked.clone();
            move |action: Action| {
                *parked.lock().unwrap() = Some(action);
                let log = log.clone();
                Cancel::new(move || log.lock().unwrap().push("invoker"))
            }
        };

        let sink = log.clone();
        let cancel = Await::operation(|| 1, Arc::new(invoker)).start(move |outcome| {
            assert!(outcome.is_none());
            sink.lock().unwrap().push("delivered");
        });
        cancel.cancel();
        cancel.cancel();
        assert_eq!(*log.lock().unwrap(), ["invoker", "delivered"]);

        // The parked work may still run; its result goes nowhere.
        let action = parked.lock().unwrap().take().unwrap();
        action();
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn cancel_racing_completion_delivers_once() {
        for _ in 0..200 {
            let parked: Arc<Mutex<Option<Action>>> = Arc::default();
            let invoker = {
                let parked = parked.clone();
                move |action: Action| {
                    *parked.lock().unwrap() = Some(action);
                    Cancel::nothing()
                }
            };
            let rec = Recorder::new();
            let cancel = Await::operation(|| 1u8, Arc::new(invoker)).start(rec.continuation());
            let action = parked.lock().unwrap().take().unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let runner = {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    action();
                })
            };
            barrier.wait();
            cancel.cancel();
            runner.join().unwrap();

            assert!(matches!(rec.take().as_slice(), [None] | [Some(Ok(1))]));
        }
    }

    #[test]
    fn every_activation_runs_the_operation() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = {
            let runs = runs.clone();
            Await::operation(move || runs.fetch_add(1, Ordering::SeqCst), Arc::new(Inline))
        };
        for _ in 0..3 {
            counted.wait_success(None).unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn config_selects_the_invoker() {
        let config = Config::new().with_ui_invoker(Inline);
        let here = std::thread::current().id();
        let there = Await::ui(&config, || std::thread::current().id())
            .wait_success(None)
            .unwrap();
        assert_eq!(here, there);

        let elsewhere = Await::spawn(&config, || std::thread::current().id())
            .wait_success(None)
            .unwrap();
        assert_ne!(here, elsewhere);
    }
}
