use super::Await;

pub(crate) mod array;
pub(crate) mod vec;

pub use vec::all;

/// Wait for all sources to complete.
///
/// Starts every source at once and completes when the last of them reported,
/// with one [`Result`](crate::Result) per source in source order. Failures
/// do not short-circuit; they are recorded in their slot like any other
/// result.
pub trait All {
    /// The resulting output type.
    type Output;

    /// Wait for all sources to complete.
    ///
    /// Results keep the order of the sources, not the order in which they
    /// completed. Sources which are cancelled from the outside never report,
    /// so the combined `Await` only completes once each of them produced a
    /// real result (or once the combined `Await` itself is cancelled).
    ///
    /// # Examples
    ///
    /// ```
    /// use cps_concurrency::prelude::*;
    ///
    /// let results = [Await::ready(1), Await::failed(Error::msg("no")), Await::ready(3)]
    ///     .all()
    ///     .wait_success(None)
    ///     .unwrap();
    ///
    /// assert!(matches!(results[0], Ok(1)));
    /// assert!(results[1].is_err());
    /// assert!(matches!(results[2], Ok(3)));
    /// ```
    fn all(self) -> Await<Self::Output>;
}
