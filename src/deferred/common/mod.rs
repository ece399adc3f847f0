mod vec;

pub(crate) use vec::{combine, CombinatorBehaviorVec};
