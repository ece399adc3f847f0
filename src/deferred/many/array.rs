use super::vec::many;
use super::Many as ManyTrait;
use crate::deferred::Await;
use crate::Result;

impl<T, const N: usize> ManyTrait for [Await<T>; N]
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
