//! State owned by a single worker thread.
//!
//! An [`Agent`] serializes access to a value by moving it onto a dedicated
//! thread and feeding that thread jobs through a bounded queue. Jobs run one
//! at a time in the order they were posted, so the state needs no locking of
//! its own.

use core::fmt;
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use crate::deferred::Completer;
use crate::{fault, Await, Cancel, Config, ErrorKind, Result};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// A value owned by its own worker thread.
///
/// # Examples
///
/// ```
/// use cps_concurrency::prelude::*;
/// use cps_concurrency::{Agent, Config};
///
/// let counter = Agent::new(0u32, &Config::new()).unwrap();
/// for _ in 0..10 {
///     counter.post(|n| *n += 1).unwrap();
/// }
/// assert_eq!(counter.query(|n| *n).wait_success(None).unwrap(), 10);
/// ```
pub struct Agent<S> {
    sender: Option<Arc<SyncSender<Job<S>>>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> Agent<S> {
    /// How many jobs may wait in the queue before [`post`](Self::post) blocks.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Move `state` onto a new worker thread with the default queue capacity.
    pub fn new(state: S, config: &Config) -> Result<Self> {
        Self::with_capacity(state, Self::DEFAULT_CAPACITY, config)
    }

    /// Move `state` onto a new worker thread with room for `capacity` queued
    /// jobs.
    ///
    /// Fails with [`ErrorKind::InvalidArgument`] for a zero capacity, or with
    /// the OS error when the thread cannot be spawned.
    pub fn with_capacity(state: S, capacity: usize, config: &Config) -> Result<Self> {
        if capacity == 0 {
            let reason = "agent queues need a positive capacity".into();
            return Err(ErrorKind::InvalidArgument(reason).into());
        }

        let (sender, receiver) = mpsc::sync_channel::<Job<S>>(capacity);
        let config = config.clone();
        let worker = thread::Builder::new()
            .name("cps-agent".into())
            .spawn(move || {
                let mut state = state;
                for job in receiver {
                    if let Err(error) = fault::catch(|| job(&mut state)) {
                        config.report_unhandled(&error);
                    }
                }
                tracing::trace!("agent queue closed; worker exiting");
            })?;

        Ok(Self {
            sender: Some(Arc::new(sender)),
            worker: Some(worker),
        })
    }

    /// Queue `job` to run against the state.
    ///
    /// Blocks while the queue is full. A panicking job is handed to
    /// [`Config::report_unhandled`] and the agent keeps running. Fails with
    /// [`ErrorKind::Closed`] once the worker is gone.
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        match &self.sender {
            Some(sender) => send(sender, Box::new(job)),
            None => Err(ErrorKind::Closed.into()),
        }
    }

    /// Read from the state.
    ///
    /// Every activation of the returned `Await` posts a job running `query`
    /// and completes with its result. The `Await` does not keep the agent
    /// alive; once the agent is dropped it fails with [`ErrorKind::Closed`].
    ///
    /// Starting the `Await` blocks while the queue is full, so do not start
    /// it from within a job of the same agent.
    pub fn query<R, F>(&self, query: F) -> Await<R>
    where
        R: Send + 'static,
        F: Fn(&mut S) -> R + Send + Sync + 'static,
    {
        let sender = self.sender.as_ref().map(Arc::downgrade).unwrap_or_default();
        let query = Arc::new(query);
        Await::new(move |complete| {
            let completer = Arc::new(Completer::new(complete));
            let job: Job<S> = {
                let completer = completer.clone();
                let query = query.clone();
                Box::new(move |state| {
                    if completer.is_done() {
                        return;
                    }
                    completer.complete(Some(fault::catch(|| query(state))));
                })
            };

            let sent = match Weak::upgrade(&sender) {
                Some(sender) => send(&sender, job),
                None => Err(ErrorKind::Closed.into()),
            };
            if let Err(error) = sent {
                completer.complete(Some(Err(error)));
                return Cancel::nothing();
            }
            Cancel::new(move || {
                completer.complete(None);
            })
        })
    }
}

fn send<S>(sender: &SyncSender<Job<S>>, job: Job<S>) -> Result<()> {
    sender.send(job).map_err(|_| ErrorKind::Closed.into())
}

impl<S> Drop for Agent<S> {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain it and exit.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                tracing::debug!("agent dropped from its own worker; not joining");
                return;
            }
            if worker.join().is_err() {
                tracing::warn!("agent worker exited by panicking");
            }
        }
    }
}

impl<S> fmt::Debug for Agent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("open", &self.sender.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn jobs_run_in_posting_order() {
        let agent = Agent::new(Vec::new(), &Config::new()).unwrap();
        for n in 0..50 {
            agent.post(move |log: &mut Vec<u32>| log.push(n)).unwrap();
        }
        let log = agent.query(|log| log.clone()).wait_success(None).unwrap();
        assert_eq!(log, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_posters_share_one_state() {
        let agent = Arc::new(Agent::with_capacity(0u64, 4, &Config::new()).unwrap());
        let posters: Vec<_> = (0..8)
            .map(|_| {
                let agent = agent.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        agent.post(|n| *n += 1).unwrap();
                    }
                })
            })
            .collect();
        for poster in posters {
            poster.join().unwrap();
        }
        assert_eq!(agent.query(|n| *n).wait_success(None).unwrap(), 800);
    }

    #[test]
    fn panicking_job_is_reported_and_agent_survives() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let config = {
            let reported = reported.clone();
            Config::new().with_unhandled_failure(move |e: &Error| {
                reported.lock().unwrap().push(e.is_panic());
            })
        };
        let agent = Agent::new(1u8, &config).unwrap();
        agent.post(|_| panic!("job")).unwrap();
        assert_eq!(agent.query(|n| *n).wait_success(None).unwrap(), 1);
        assert_eq!(*reported.lock().unwrap(), [true]);
    }

    #[test]
    fn panicking_query_fails_its_await() {
        let agent = Agent::new((), &Config::new()).unwrap();
        let err = agent
            .query(|_| -> u8 { panic!("query") })
            .wait_success(None)
            .unwrap_err();
        assert!(err.is_panic());
    }

    #[test]
    fn drop_waits_for_queued_jobs() {
        let done = Arc::new(AtomicBool::new(false));
        let agent = Agent::new((), &Config::new()).unwrap();
        {
            let done = done.clone();
            agent
                .post(move |_| {
                    thread::sleep(Duration::from_millis(20));
                    done.store(true, Ordering::SeqCst);
                })
                .unwrap();
        }
        drop(agent);
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn queries_outliving_the_agent_are_closed() {
        let agent = Agent::new(5u8, &Config::new()).unwrap();
        let query = agent.query(|n| *n);
        drop(agent);
        let err = query.wait_success(None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Closed));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Agent::with_capacity((), 0, &Config::new()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
    }
}
