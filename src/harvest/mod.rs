use async_trait::async_trait;
use chromiumoxide::page::Page;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::{Result, ScrapeError};
use crate::post::{Post, PostStore};

/// What the harvest loop needs from a page: trigger more content and read
/// back how far the feed has moved. Kept behind a trait so the loop's
/// termination behavior is testable without a browser.
#[async_trait]
pub trait FeedSurface {
    async fn scroll_feed(&self) -> Result<()>;
    async fn scroll_offset(&self) -> Result<f64>;
}

#[async_trait]
impl FeedSurface for Page {
    async fn scroll_feed(&self) -> Result<()> {
        self.evaluate("window.scrollBy(0, window.innerHeight)")
            .await
            .map_err(|e| ScrapeError::BrowserError(format!("Failed to scroll feed: {}", e)))?;
        Ok(())
    }

    async fn scroll_offset(&self) -> Result<f64> {
        let value = self
            .evaluate("window.scrollY")
            .await
            .map_err(|e| ScrapeError::BrowserError(format!("Failed to read scroll offset: {}", e)))?;
        Ok(value.into_value::<f64>().unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestState {
    Scrolling,
    AwaitingData,
    Stalled,
    Done,
}

#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Delay after navigation so the first batch of responses can resolve.
    pub settle: Duration,
    /// Poll interval while awaiting new data.
    pub poll_interval: Duration,
    /// How long the loop tolerates no new payloads before giving up on the
    /// current scroll, measured from the last batch received.
    pub data_ceiling: Duration,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(4),
            poll_interval: Duration::from_millis(500),
            data_ceiling: Duration::from_secs(5),
        }
    }
}

/// Scroll/wait/terminate state machine. Feeds have no end-of-feed signal,
/// so termination is inferred: either the target count is reached, or no
/// new data arrived for a whole ceiling window AND the scroll offset did
/// not move between iterations. Under-delivery is a normal outcome.
///
/// There is no overall wall-clock budget and no cancellation token; a feed
/// that keeps barely advancing runs until it genuinely stalls.
pub async fn run<S: FeedSurface>(
    surface: &S,
    batches: &mut UnboundedReceiver<Vec<Post>>,
    store: &mut PostStore,
    limit: usize,
    opts: &HarvestOptions,
) -> Result<HarvestState> {
    sleep(opts.settle).await;
    let mut last_data = Instant::now();
    drain_batches(batches, store, limit, &mut last_data);

    let mut state = HarvestState::Scrolling;
    let mut last_offset: Option<f64> = None;

    loop {
        state = match state {
            HarvestState::Scrolling => {
                if store.len() >= limit {
                    HarvestState::Done
                } else {
                    surface.scroll_feed().await?;
                    HarvestState::AwaitingData
                }
            }
            HarvestState::AwaitingData => {
                let mut advanced = false;
                loop {
                    sleep(opts.poll_interval).await;
                    if drain_batches(batches, store, limit, &mut last_data) > 0 {
                        advanced = true;
                    }
                    if store.len() >= limit {
                        break;
                    }
                    if last_data.elapsed() >= opts.data_ceiling {
                        break;
                    }
                }
                if store.len() >= limit {
                    HarvestState::Done
                } else {
                    let offset = surface.scroll_offset().await?;
                    debug!("scroll offset {} after awaiting data (advanced: {})", offset, advanced);
                    // stalled only when both signals agree: the offset did
                    // not move AND nothing arrived within the ceiling window
                    if Some(offset) == last_offset && !advanced {
                        HarvestState::Stalled
                    } else {
                        last_offset = Some(offset);
                        HarvestState::Scrolling
                    }
                }
            }
            HarvestState::Stalled => {
                info!(
                    "feed stalled with {} of {} requested posts",
                    store.len(),
                    limit
                );
                return Ok(HarvestState::Stalled);
            }
            HarvestState::Done => {
                info!("target of {} posts reached", limit);
                return Ok(HarvestState::Done);
            }
        };
    }
}

/// Pulls every pending batch into the store. Inserts stop once the target
/// count is reached (surplus candidates are dropped, collected posts are
/// never discarded). Returns how many batches arrived, empty ones included,
/// since any matched payload counts as "the feed is still delivering".
fn drain_batches(
    batches: &mut UnboundedReceiver<Vec<Post>>,
    store: &mut PostStore,
    limit: usize,
    last_data: &mut Instant,
) -> usize {
    let mut received = 0;
    while let Ok(batch) = batches.try_recv() {
        received += 1;
        for post in batch {
            if store.len() >= limit {
                break;
            }
            store.add(post);
        }
    }
    if received > 0 {
        *last_data = Instant::now();
    }
    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct FakeSurface {
        scrolls: AtomicUsize,
        offsets: Mutex<Vec<f64>>,
        cursor: AtomicUsize,
    }

    impl FakeSurface {
        fn with_offsets(offsets: Vec<f64>) -> Self {
            Self {
                scrolls: AtomicUsize::new(0),
                offsets: Mutex::new(offsets),
                cursor: AtomicUsize::new(0),
            }
        }

        fn scroll_count(&self) -> usize {
            self.scrolls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedSurface for FakeSurface {
        async fn scroll_feed(&self) -> Result<()> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn scroll_offset(&self) -> Result<f64> {
            let offsets = self.offsets.lock().unwrap();
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            Ok(*offsets.get(i).or(offsets.last()).unwrap_or(&0.0))
        }
    }

    fn fast_opts() -> HarvestOptions {
        HarvestOptions {
            settle: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
            data_ceiling: Duration::from_millis(5),
        }
    }

    fn posts(ids: &[&str]) -> Vec<Post> {
        ids.iter().map(|id| Post::new(*id, "", vec![], None)).collect()
    }

    #[tokio::test]
    async fn test_target_reached_terminates_without_scrolling() {
        let surface = FakeSurface::with_offsets(vec![0.0]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(posts(&["1", "2", "3"])).unwrap();

        let mut store = PostStore::new();
        let state = run(&surface, &mut rx, &mut store, 3, &fast_opts())
            .await
            .unwrap();

        assert_eq!(state, HarvestState::Done);
        assert_eq!(store.len(), 3);
        assert_eq!(surface.scroll_count(), 0);
    }

    #[tokio::test]
    async fn test_stagnation_terminates_with_partial_result() {
        // offset never moves and nothing arrives after the first batch
        let surface = FakeSurface::with_offsets(vec![120.0, 120.0]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(posts(&["only"])).unwrap();
        drop(tx);

        let mut store = PostStore::new();
        let state = run(&surface, &mut rx, &mut store, 10, &fast_opts())
            .await
            .unwrap();

        assert_eq!(state, HarvestState::Stalled);
        assert_eq!(store.len(), 1);
        // stagnation needs two consecutive identical offsets
        assert_eq!(surface.scroll_count(), 2);
    }

    #[tokio::test]
    async fn test_surplus_candidates_are_dropped_at_limit() {
        let surface = FakeSurface::with_offsets(vec![0.0]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(posts(&["1", "2"])).unwrap();
        tx.send(posts(&["3", "4", "5", "6", "7"])).unwrap();

        let mut store = PostStore::new();
        let state = run(&surface, &mut rx, &mut store, 4, &fast_opts())
            .await
            .unwrap();

        assert_eq!(state, HarvestState::Done);
        // bounded at the target, nothing already collected was discarded
        assert_eq!(store.len(), 4);
        let ids: Vec<&str> = store.posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_reoffered_ids_do_not_count_toward_limit() {
        let surface = FakeSurface::with_offsets(vec![50.0, 50.0]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(posts(&["a", "b"])).unwrap();
        tx.send(posts(&["a", "b"])).unwrap();
        drop(tx);

        let mut store = PostStore::new();
        let state = run(&surface, &mut rx, &mut store, 5, &fast_opts())
            .await
            .unwrap();

        // duplicates were ignored, so the feed stalls short of the target
        assert_eq!(state, HarvestState::Stalled);
        assert_eq!(store.len(), 2);
    }
}
