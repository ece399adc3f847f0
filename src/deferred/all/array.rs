use super::vec::all;
use super::All as AllTrait;
use crate::deferred::Await;
use crate::Result;

impl<T, const N: usize> AllTrait for [Await<T>; N]
where
    T: Send + 'static,
{
    type Output = Vec<Result<T>>;

    fn all(self) -> Await<Self::Output> {
        all(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn smoke() {
        let results = [Await::ready("hello"), Await::ready("world")]
            .all()
            .wait_success(None)
            .unwrap();
        let words: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(words, ["hello", "world"]);
    }
}
