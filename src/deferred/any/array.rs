use super::vec::any;
use super::Any as AnyTrait;
use crate::deferred::Await;

impl<T, const N: usize> AnyTrait for [Await<T>; N]
where
    T: Send + 'static,
{
    type Output = T;

    fn any(self) -> Await<Self::Output> {
        any(self)
    }
}
