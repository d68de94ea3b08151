// =============================================================================
// scheduler.rs — BOUNDED FAN-OUT
// =============================================================================
//
// A task can carry dozens of report ids, and every one of them wants its
// own browser context. Chrome will happily eat all the RAM you own, so we
// cap how many run at once. The moment one finishes, the next one starts.
// =============================================================================

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `worker` over every item with at most `limit` in flight.
///
/// Returns once every item has been processed. Workers report their own
/// failures (through side effects), so one bad item never stops the batch.
/// Completion order is whatever the futures decide. A `limit` of zero is
/// treated as one.
pub async fn run_limited<T, F, Fut>(items: Vec<T>, limit: usize, worker: F)
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
{
    stream::iter(items)
        .for_each_concurrent(limit.max(1), worker)
        .await;
}
