//! The three-way outcome of a deferred computation.
//!
//! Every continuation receives an [`Outcome<T>`]: `Some(Ok(value))` on
//! success, `Some(Err(error))` on failure, and `None` when the activation was
//! cancelled before producing anything. Cancellation is deliberately not an
//! error; combinators never turn one into the other.
//!
//! The standard `Result` and `Option` already are the tagged unions we need.
//! This module adds a handful of constructors plus the [`ResultExt`] and
//! [`OptionExt`] observation helpers and a diagnostic rendering.

use core::any::type_name;
use core::fmt;

use crate::{Error, Result};

/// What a continuation receives: a result, or `None` when cancelled.
pub type Outcome<T> = Option<Result<T>>;

/// A successful result.
pub fn success<T>(value: T) -> Result<T> {
    Ok(value)
}

/// A failed result.
pub fn error<T>(error: impl Into<Error>) -> Result<T> {
    Err(error.into())
}

/// The outcome of an activation which ran to completion.
pub fn completed<T>(result: Result<T>) -> Outcome<T> {
    Some(result)
}

/// The outcome of an activation which was cancelled.
pub fn cancelled<T>() -> Outcome<T> {
    None
}

/// Diagnostic rendering of a [`Result`] or [`Option`].
///
/// Created by [`ResultExt::show`] and [`OptionExt::show`]. The format is
/// meant for humans and may change; do not parse it.
pub struct Show<'a, V: ?Sized>(&'a V);

impl<V: ?Sized> fmt::Debug for Show<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Show").finish_non_exhaustive()
    }
}

impl<T: fmt::Debug> fmt::Display for Show<'_, Result<T>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ok(value) => write!(f, "Success<{}>({value:?})", type_name::<T>()),
            Err(error) => write!(f, "Error<{}>(\n{error}\n)", type_name::<T>()),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Show<'_, Option<T>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "Some<{}>({value:?})", type_name::<T>()),
            None => write!(f, "None<{}>()", type_name::<T>()),
        }
    }
}

/// Folding and observation helpers for [`Result`].
pub trait ResultExt<T>: Sized {
    /// Fold both variants into one value.
    fn fold<R>(self, success: impl FnOnce(T) -> R, error: impl FnOnce(Error) -> R) -> R;

    /// Observe the success value without consuming it.
    fn on_success(self, f: impl FnOnce(&T)) -> Self;

    /// Observe the error without consuming it.
    fn on_error(self, f: impl FnOnce(&Error)) -> Self;

    /// Render as `Success<T>(value)` or `Error<T>(error)`.
    fn show(&self) -> Show<'_, Self> {
        Show(self)
    }
}

impl<T> ResultExt<T> for Result<T> {
    fn fold<R>(self, success: impl FnOnce(T) -> R, error: impl FnOnce(Error) -> R) -> R {
        match self {
            Ok(value) => success(value),
            Err(e) => error(e),
        }
    }

    fn on_success(self, f: impl FnOnce(&T)) -> Self {
        if let Ok(value) = &self {
            f(value);
        }
        self
    }

    fn on_error(self, f: impl FnOnce(&Error)) -> Self {
        if let Err(e) = &self {
            f(e);
        }
        self
    }
}

/// Folding and observation helpers for [`Option`].
pub trait OptionExt<T>: Sized {
    /// Fold both variants into one value.
    fn fold<R>(self, some: impl FnOnce(T) -> R, none: impl FnOnce() -> R) -> R;

    /// Observe the contained value without consuming it.
    fn on_some(self, f: impl FnOnce(&T)) -> Self;

    /// Observe absence.
    fn on_none(self, f: impl FnOnce()) -> Self;

    /// Render as `Some<T>(value)` or `None<T>()`.
    fn show(&self) -> Show<'_, Self> {
        Show(self)
    }
}

impl<T> OptionExt<T> for Option<T> {
    fn fold<R>(self, some: impl FnOnce(T) -> R, none: impl FnOnce() -> R) -> R {
        match self {
            Some(value) => some(value),
            None => none(),
        }
    }

    fn on_some(self, f: impl FnOnce(&T)) -> Self {
        if let Some(value) = &self {
            f(value);
        }
        self
    }

    fn on_none(self, f: impl FnOnce()) -> Self {
        if self.is_none() {
            f();
        }
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn some_of_success_composes() {
        let outcome = completed(success(1));
        assert!(matches!(outcome, Some(Ok(1))));

        let outcome = cancelled::<u8>();
        assert!(outcome.is_none());
    }

    #[test]
    fn display_success() {
        assert_eq!(success(1i32).show().to_string(), "Success<i32>(1)");
    }

    #[test]
    fn display_error() {
        let res: Result<i32> = error(Error::msg("ex"));
        assert_eq!(res.show().to_string(), "Error<i32>(\nex\n)");
    }

    #[test]
    fn display_option() {
        assert_eq!(Some(3u8).show().to_string(), "Some<u8>(3)");
        assert_eq!(None::<u8>.show().to_string(), "None<u8>()");
    }

    #[test]
    fn nested_map() {
        let outcome = completed(success("hello, world"));
        let words = outcome.map(|res| res.map(|s| s.split(',').collect::<Vec<_>>()));
        assert_eq!(words.unwrap().unwrap(), vec!["hello", " world"]);
    }

    #[test]
    fn nested_fold() {
        let outcome = completed(success("hello, world"));
        let words = OptionExt::fold(
            outcome,
            |res| {
                ResultExt::fold(
                    res,
                    |s| s.split(',').collect::<Vec<_>>(),
                    |_| Vec::new(),
                )
            },
            Vec::new,
        );
        assert_eq!(words, vec!["hello", " world"]);
    }

    #[test]
    fn observers_leave_values_untouched() {
        let mut seen = None;
        let res = success(5).on_success(|v| seen = Some(*v)).on_error(|_| unreachable!());
        assert_eq!(seen, Some(5));
        assert_eq!(res.unwrap(), 5);

        let mut missing = false;
        let opt = None::<u8>.on_some(|_| unreachable!()).on_none(|| missing = true);
        assert!(missing);
        assert!(opt.is_none());
    }
}
