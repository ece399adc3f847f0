use super::super::common::{combine, CombinatorBehaviorVec};
use super::Any as AnyTrait;
use crate::deferred::Await;
use crate::{ErrorKind, Result};

use core::marker::PhantomData;

/// Every result is decisive, failures included.
struct AnyBehavior<T>(PhantomData<fn() -> T>);

impl<T: Send + 'static> CombinatorBehaviorVec<T> for AnyBehavior<T> {
    type Output = T;

    fn maybe_return(&self, _idx: usize, res: Result<T>) -> Result<Option<Self::Output>> {
        res.map(Some)
    }

    fn when_completed_vec(&self) -> Result<Self::Output> {
        // Unreachable in practice: every report above decides.
        Err(ErrorKind::Exhausted(core::any::type_name::<T>()).into())
    }
}

/// Wait for the first source in `sources` to complete.
///
/// # Panics
///
/// Panics when `sources` is empty.
pub fn any<T>(sources: impl IntoIterator<Item = Await<T>>) -> Await<T>
where
    T: Send + 'static,
{
    combine(sources.into_iter().collect(), || AnyBehavior(PhantomData))
}

impl<T> AnyTrait for Vec<Await<T>>
where
    T: Send + 'static,
{
    type Output = T;

    fn any(self) -> Await<Self::Output> {
        any(self)
    }
}
