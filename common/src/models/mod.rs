mod coin;
mod filter;
mod global;

pub use coin::{Coin, DataSource};
pub use filter::{FilterState, Segment, SortDirection, SortKey};
pub use global::GlobalSnapshot;
