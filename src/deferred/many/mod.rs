use super::Await;
use crate::Result;

pub(crate) mod array;
pub(crate) mod tuple;
pub(crate) mod vec;

pub use tuple::many2;
pub use vec::many;

/// Race sources against a chooser.
///
/// This is the operation [`All`](super::All) and [`Any`](super::Any) are
/// special cases of. Every source is started at once; each real result is
/// handed to the chooser together with the index of the source it came from.
pub trait Many {
    /// The output type of each source.
    type Item;

    /// Race sources against `choose`, falling back to `default`.
    ///
    /// For every source that completes:
    ///
    /// - `Ok(Some(r))` decides the race: the combined `Await` completes with
    ///   `r` and every source still running is cancelled.
    /// - `Err(e)` (or a panic in `choose`) fails the combined `Await` with
    ///   `e`, cancelling the rest the same way.
    /// - `Ok(None)` means "no opinion". Once every source has reported
    ///   without a decision, the combined `Await` completes with `default`.
    ///
    /// Ties between sources deciding at the same time go to whichever
    /// delivered first; the other decision is dropped. Sources cancelled from
    /// the outside are ignored entirely.
    ///
    /// # Examples
    ///
    /// Take the first even number, or zero:
    ///
    /// ```
    /// use cps_concurrency::prelude::*;
    ///
    /// let sources = vec![Await::ready(3), Await::ready(4), Await::ready(5)];
    /// let even = sources
    ///     .many(0, |res, _idx| Ok(res.ok().filter(|n| n % 2 == 0)))
    ///     .wait_success(None)
    ///     .unwrap();
    ///
    /// assert_eq!(even, 4);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics when called on an empty set of sources.
    fn many<R, F>(self, default: R, choose: F) -> Await<R>
    where
        R: Clone + Send + Sync + 'static,
        F: Fn(Result<Self::Item>, usize) -> Result<Option<R>> + Send + Sync + 'static;
}
