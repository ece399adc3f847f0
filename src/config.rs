//! Execution strategies and failure reporting.
//!
//! Where a computation runs is decided by an [`Invoker`]. This crate does not
//! own a scheduler or a thread pool: it only asks the invoker to run an action
//! and hands back whatever best-effort cancel the invoker returns. A
//! [`Config`] bundles the invokers used by [`Await::spawn`] and [`Await::ui`]
//! together with the sink for failures nobody is waiting on.
//!
//! Configs are plain values passed to the functions that need them, so two
//! tests (or two subsystems) can use different strategies side by side.
//!
//! [`Await::spawn`]: crate::Await::spawn
//! [`Await::ui`]: crate::Await::ui

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::{Cancel, Error};

/// A unit of work handed to an [`Invoker`].
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Decides where and how an action runs.
///
/// Implementations must call `action` at most once. The returned handle may
/// be [`Cancel::nothing`] when the strategy cannot retract work.
pub trait Invoker: Send + Sync {
    /// Schedule `action`.
    fn invoke(&self, action: Action) -> Cancel;
}

impl<F> Invoker for F
where
    F: Fn(Action) -> Cancel + Send + Sync,
{
    fn invoke(&self, action: Action) -> Cancel {
        self(action)
    }
}

/// Runs actions immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Invoker for Inline {
    fn invoke(&self, action: Action) -> Cancel {
        action();
        Cancel::nothing()
    }
}

/// Runs every action on a freshly spawned thread.
///
/// Cancelling before the thread picked the action up skips it. If the OS
/// refuses to spawn a thread the action runs inline instead, so it is never
/// silently lost.
#[derive(Debug, Clone, Default)]
pub struct SpawnThread {
    name: Option<String>,
}

impl SpawnThread {
    /// Name the spawned threads.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Invoker for SpawnThread {
    fn invoke(&self, action: Action) -> Cancel {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let job = move || {
            if !flag.load(Ordering::Acquire) {
                action();
            }
        };

        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        // `spawn` consumes the closure even on failure, so keep a way back
        // to the job for the inline fallback.
        let job = Arc::new(Mutex::new(Some(job)));
        let spawned = {
            let job = job.clone();
            builder.spawn(move || take_and_run(&job))
        };
        if let Err(error) = spawned {
            tracing::warn!(%error, "failed to spawn a worker thread; running inline");
            take_and_run(&job);
        }

        Cancel::new(move || cancelled.store(true, Ordering::Release))
    }
}

fn take_and_run<F: FnOnce()>(slot: &Mutex<Option<F>>) {
    let job = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(job) = job {
        job();
    }
}

/// Strategies used by the constructors that do not take an explicit invoker.
#[derive(Clone)]
pub struct Config {
    async_invoker: Arc<dyn Invoker>,
    ui_invoker: Arc<dyn Invoker>,
    on_unhandled_failure: Arc<dyn Fn(&Error) + Send + Sync>,
}

impl Config {
    /// Background work on spawned threads, "UI" work inline, and unhandled
    /// failures dropped.
    pub fn new() -> Self {
        Self {
            async_invoker: Arc::new(SpawnThread::named("cps-worker")),
            ui_invoker: Arc::new(Inline),
            on_unhandled_failure: Arc::new(|_: &Error| {}),
        }
    }

    /// Replace the invoker used by [`Await::spawn`](crate::Await::spawn).
    pub fn with_async_invoker(mut self, invoker: impl Invoker + 'static) -> Self {
        self.async_invoker = Arc::new(invoker);
        self
    }

    /// Replace the invoker used by [`Await::ui`](crate::Await::ui).
    pub fn with_ui_invoker(mut self, invoker: impl Invoker + 'static) -> Self {
        self.ui_invoker = Arc::new(invoker);
        self
    }

    /// Replace the sink for failures that no continuation observes.
    pub fn with_unhandled_failure(mut self, sink: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_unhandled_failure = Arc::new(sink);
        self
    }

    /// The invoker for background work.
    pub fn async_invoker(&self) -> Arc<dyn Invoker> {
        self.async_invoker.clone()
    }

    /// The invoker for UI-affine work.
    pub fn ui_invoker(&self) -> Arc<dyn Invoker> {
        self.ui_invoker.clone()
    }

    /// Hand a failure nobody is waiting on to the configured sink.
    ///
    /// A panicking sink is contained here; reporting never unwinds.
    pub fn report_unhandled(&self, error: &Error) {
        tracing::debug!(%error, "unhandled failure");
        let sink = &self.on_unhandled_failure;
        if let Err(panic) = crate::fault::catch(|| sink(error)) {
            tracing::debug!(error = %panic, "unhandled-failure sink panicked");
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").finish_non_exhaustive()
    }
}
