use super::Await;

pub(crate) mod array;
pub(crate) mod vec;

pub use vec::any;

/// Wait for the first source to complete.
///
/// Starts every source at once and completes with whatever the first source
/// delivered, even if that was an error. All remaining sources are cancelled.
pub trait Any {
    /// The resulting output type.
    type Output;

    /// Wait for the first source to complete.
    ///
    /// The first result wins regardless of whether it is a success or a
    /// failure: a source which fails fast propagates its error even while
    /// a slower source would have succeeded. Sources cancelled from the
    /// outside do not take part in the race.
    ///
    /// # Examples
    ///
    /// ```
    /// use cps_concurrency::prelude::*;
    ///
    /// let res = vec![Await::<u8>::failed(Error::msg("fast")), Await::never()]
    ///     .any()
    ///     .wait_success(None);
    ///
    /// assert_eq!(res.unwrap_err().to_string(), "fast");
    /// ```
    ///
    /// # Panics
    ///
    /// Panics when called on an empty set of sources.
    fn any(self) -> Await<Self::Output>;
}
