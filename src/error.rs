use core::fmt;
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

/// A `Result` whose error defaults to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The reason a deferred computation failed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A user-supplied error.
    #[error("{0}")]
    Failed(Box<dyn StdError + Send + Sync + 'static>),

    /// An ad-hoc error created from a message.
    #[error("{0}")]
    Message(String),

    /// A user callback panicked and the panic was caught.
    #[error("panicked: {0}")]
    Panicked(String),

    /// A value of the named type was expected but the producer ended without one.
    #[error("expected a result of `{0}` but none was produced")]
    Exhausted(&'static str),

    /// A constructor received an argument it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking wait gave up before the computation completed.
    #[error("timed out after {0:?} without a result")]
    TimedOut(Duration),

    /// The computation was cancelled before it produced a result.
    #[error("cancelled before a result was available")]
    Cancelled,

    /// The receiving side is gone and can no longer accept work.
    #[error("closed")]
    Closed,
}

/// The error half of every [`Result`] delivered by this crate.
///
/// An `Error` is a cheap handle: cloning it shares the underlying
/// [`ErrorKind`] and the [`Backtrace`] captured where the error was first
/// created, so the original diagnostic context survives being moved to the
/// thread that eventually observes the failure.
#[derive(Clone)]
pub struct Error {
    inner: Arc<Inner>,
}

struct Inner {
    kind: ErrorKind,
    backtrace: Backtrace,
}

impl Error {
    /// Wrap a user error.
    ///
    /// An [`ErrorKind`] is used as the kind directly rather than wrapped, and
    /// an `Error` that was boxed into a `dyn std::error::Error` is unwrapped
    /// back into itself.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = Box::new(error);
        let boxed = match boxed.downcast::<ErrorKind>() {
            Ok(kind) => return Self::from_kind(*kind),
            Err(boxed) => boxed,
        };
        match boxed.downcast::<Shared>() {
            Ok(shared) => shared.0,
            Err(boxed) => Self::from_kind(ErrorKind::Failed(boxed)),
        }
    }

    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    /// Create an error from a displayable message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::from_kind(ErrorKind::Message(message.to_string()))
    }

    /// Convert a caught panic payload into an error.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(e) = payload.downcast_ref::<Error>() {
            return e.clone();
        } else {
            "Box<dyn Any>".to_owned()
        };
        Self::from_kind(ErrorKind::Panicked(message))
    }

    /// What went wrong.
    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }

    /// The backtrace captured when this error was created.
    ///
    /// Capturing follows the usual `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`
    /// rules, so this is frequently a disabled backtrace.
    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }

    /// Whether this error stands for a panic caught in a user callback.
    pub fn is_panic(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Panicked(_))
    }

    /// Attempt to view the wrapped user error as a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match &self.inner.kind {
            ErrorKind::Failed(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Re-raise this error as a panic on the current thread.
    ///
    /// The payload is the `Error` itself, so a fault barrier further up
    /// recovers the very same error, backtrace included.
    pub fn resume_unwind(self) -> ! {
        std::panic::resume_unwind(Box::new(self))
    }
}

impl<E> From<E> for Error
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Error::new(error)
    }
}

impl From<Error> for Box<dyn StdError + Send + Sync + 'static> {
    fn from(error: Error) -> Self {
        Box::new(Shared(error))
    }
}

/// Adapter so an [`Error`] can travel as a `dyn std::error::Error`.
struct Shared(Error);

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for Shared {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.kind, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("kind", &self.inner.kind)
                .finish();
        }
        write!(f, "{}", self.inner.kind)?;
        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\n\nStack backtrace:\n{}", self.inner.backtrace)?;
        }
        Ok(())
    }
}
