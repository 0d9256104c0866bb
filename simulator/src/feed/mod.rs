pub mod fetcher;
pub mod refresh;

pub use fetcher::{DispatchFeed, FeedConfig, FetchState};
