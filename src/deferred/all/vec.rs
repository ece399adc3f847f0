use super::super::common::{combine, CombinatorBehaviorVec};
use super::All as AllTrait;
use crate::deferred::Await;
use crate::{Cancel, Result};

use core::mem;
use std::sync::{Mutex, PoisonError};

/// Per-activation slots, filled in as the sources report.
struct AllBehavior<T> {
    slots: Mutex<Vec<Option<Result<T>>>>,
}

impl<T: Send + 'static> CombinatorBehaviorVec<T> for AllBehavior<T> {
    type Output = Vec<Result<T>>;

    fn maybe_return(&self, idx: usize, res: Result<T>) -> Result<Option<Self::Output>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)[idx] = Some(res);
        Ok(None)
    }

    fn when_completed_vec(&self) -> Result<Self::Output> {
        let slots = mem::take(&mut *self.slots.lock().unwrap_or_else(PoisonError::into_inner));
        debug_assert!(
            slots.iter().all(Option::is_some),
            "every source should have reported"
        );
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Wait for every source in `sources` to complete.
///
/// Completes immediately with an empty `Vec` when there are no sources.
pub fn all<T>(sources: impl IntoIterator<Item = Await<T>>) -> Await<Vec<Result<T>>>
where
    T: Send + 'static,
{
    let sources: Vec<_> = sources.into_iter().collect();
    if sources.is_empty() {
        return Await::new(|complete| {
            complete(Some(Ok(Vec::new())));
            Cancel::nothing()
        });
    }

    let len = sources.len();
    combine(sources, move || AllBehavior {
        slots: Mutex::new(std::iter::repeat_with(|| None).take(len).collect()),
    })
}

impl<T> AllTrait for Vec<Await<T>>
where
    T: Send + 'static,
{
    type Output = Vec<Result<T>>;

    fn all(self) -> Await<Self::Output> {
        all(self)
    }
}
