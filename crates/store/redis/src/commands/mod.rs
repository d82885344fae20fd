//! Per data-type command groups handed out by [`RedisHelper`](crate::RedisHelper).

mod hash;
mod list;
mod set;
mod sorted_set;
mod string;

pub use hash::Hashes;
pub use list::Lists;
pub use set::Sets;
pub use sorted_set::SortedSets;
pub use string::Strings;
