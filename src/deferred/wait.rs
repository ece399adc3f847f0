use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use super::Await;
use crate::{ErrorKind, Outcome, Result};

impl<T: Send + 'static> Await<T> {
    /// Start one activation and block the current thread until it completes.
    ///
    /// With a `timeout` the activation is cancelled once it elapses and
    /// `None` is returned, exactly as if it had been cancelled from the
    /// outside. `None` waits as long as it takes.
    ///
    /// Do not call this from a thread the computation itself needs, such as
    /// the only thread of a UI invoker.
    pub fn wait(&self, timeout: Option<Duration>) -> Outcome<T> {
        let (tx, rx) = mpsc::sync_channel(1);
        let cancel = self.start(move |outcome| {
            // The receiver is gone only after a timeout; nothing to deliver to.
            let _ = tx.send(outcome);
        });

        match timeout {
            None => rx.recv().unwrap_or(None),
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(?timeout, "wait timed out; cancelling");
                    cancel.cancel();
                    None
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
        }
    }

    /// Like [`wait`](Self::wait), mapping a missing result to an error.
    ///
    /// Gives [`ErrorKind::TimedOut`] when `timeout` elapsed and
    /// [`ErrorKind::Cancelled`] when the activation was cancelled otherwise.
    pub fn wait_success(&self, timeout: Option<Duration>) -> Result<T> {
        match self.wait(timeout) {
            Some(res) => res,
            None => Err(match timeout {
                Some(timeout) => ErrorKind::TimedOut(timeout),
                None => ErrorKind::Cancelled,
            }
            .into()),
        }
    }
}
