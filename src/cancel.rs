use core::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::fault;

/// A handle which cancels one activation of a deferred computation.
///
/// Cancelling is always best-effort: work which already started may keep
/// running, but its result will not be delivered. Handles produced by this
/// crate are idempotent, may be called after the computation completed (in
/// which case they do nothing), and never panic into the caller.
#[derive(Clone)]
pub struct Cancel {
    action: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Cancel {
    /// Create a handle which runs `action` every time it is invoked.
    ///
    /// Use this when `action` is itself idempotent; otherwise prefer
    /// [`Cancel::once`].
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            action: Some(Arc::new(action)),
        }
    }

    /// Create a handle which runs `action` on the first invocation only,
    /// however many clones of the handle get invoked.
    pub fn once(action: impl FnOnce() + Send + 'static) -> Self {
        let slot = Mutex::new(Some(action));
        Self::new(move || {
            let action = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(action) = action {
                action();
            }
        })
    }

    /// A handle with nothing to cancel.
    pub const fn nothing() -> Self {
        Self { action: None }
    }

    /// Whether this handle has nothing to cancel.
    pub fn is_nothing(&self) -> bool {
        self.action.is_none()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        if let Some(action) = &self.action {
            if let Err(error) = fault::catch(|| action()) {
                tracing::debug!(%error, "cancellation failed; ignoring");
            }
        }
    }
}

impl Default for Cancel {
    fn default() -> Self {
        Self::nothing()
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("nothing", &self.is_nothing())
            .finish()
    }
}
