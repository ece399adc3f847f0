use super::super::common::{combine, CombinatorBehaviorVec};
use super::Many as ManyTrait;
use crate::deferred::Await;
use crate::{ErrorKind, Result};

use std::sync::{Arc, Mutex, PoisonError};

/// Defers to a user chooser, with a default taken at most once.
struct ManyBehavior<F, R> {
    choose: Arc<F>,
    default: Mutex<Option<R>>,
}

impl<T, R, F> CombinatorBehaviorVec<T> for ManyBehavior<F, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(Result<T>, usize) -> Result<Option<R>> + Send + Sync + 'static,
{
    type Output = R;

    fn maybe_return(&self, idx: usize, res: Result<T>) -> Result<Option<Self::Output>> {
        (self.choose)(res, idx)
    }

    fn when_completed_vec(&self) -> Result<Self::Output> {
        self.default
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ErrorKind::Exhausted(core::any::type_name::<R>()).into())
    }
}

/// Race `sources` against `choose`, falling back to `default`.
///
/// Accepts any iterator of sources; see [`Many::many`](super::Many::many)
/// for the semantics.
///
/// # Panics
///
/// Panics when `sources` is empty.
pub fn many<T, R, F>(choose: F, default: R, sources: impl IntoIterator<Item = Await<T>>) -> Await<R>
where
    T: Send + 'static,
    R: Clone + Send + Sync + 'static,
    F: Fn(Result<T>, usize) -> Result<Option<R>> + Send + Sync + 'static,
{
    let choose = Arc::new(choose);
    combine(sources.into_iter().collect(), move || ManyBehavior {
        choose: choose.clone(),
        default: Mutex::new(Some(default.clone())),
    })
}

impl<T> ManyTrait for Vec<Await<T>>
where
    T: Send + 'static,
{
    type Item = T;

    fn many<R, F>(self, default: R, choose: F) -> Await<R>
    where
        R: Clone + Send + Sync + 'static,
        F: Fn(Result<Self::Item>, usize) -> Result<Option<R>> + Send + Sync + 'static,
    {
        many(choose, default, self)
    }
}
