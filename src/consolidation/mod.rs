pub mod filter;
pub mod merge;

pub use filter::{filter_by_market_cap, DEFAULT_MIN_MARKET_CAP};
pub use merge::{merge_pair, merge_records};
