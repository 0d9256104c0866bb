use log::debug;
use std::time::Duration;

use crate::feed::fetcher::DispatchFeed;

/// Re-fetches on a fixed interval, starting immediately. Each result lands
/// in the session inbox and is swapped in between frames.
pub async fn run_refresh(mut feed: DispatchFeed, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let generation = feed.request();
        debug!("refresh requested batch {}", generation);
    }
}
