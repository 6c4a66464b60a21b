pub mod store;

pub use store::{PruneReport, RetryPolicy, StockStore};
