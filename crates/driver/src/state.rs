use std::sync::Arc;

use alloy::{rpc::types::Header, transports::TransportResult};
use argo_clients::execution::ExecutionClient;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics::DriverMetrics;

/// The capacity of the L1 head feed. Sized so short bursts of L1 blocks do
/// not drop deliveries for a subscriber that is busy syncing.
const L1_HEAD_FEED_CAPACITY: usize = 1024;

/// The observable L1 chain state.
///
/// Holds the latest L1 head observed over the header subscription and
/// publishes head changes through a multi-subscriber feed. Deliveries on the
/// feed are best-effort: a lagging subscriber loses the oldest entries, so a
/// notification is only ever a request to re-read the snapshot, never a
/// value carrier.
#[derive(Debug)]
pub struct State {
    /// The latest observed L1 head.
    l1_head: watch::Sender<Option<Header>>,
    /// The multi-subscriber L1 head feed.
    heads_feed: broadcast::Sender<Header>,
}

impl State {
    /// Create a new [`State`] and spawn the background task that keeps it
    /// updated from the client's header subscription.
    ///
    /// The returned handle joins once the given token is cancelled.
    pub async fn new(
        el: ExecutionClient,
        cancel: CancellationToken,
    ) -> TransportResult<(Arc<Self>, JoinHandle<()>)> {
        let initial = el.get_header(None).await?;
        DriverMetrics::set_l1_head_number(initial.number);

        let (l1_head, _) = watch::channel(Some(initial));
        let (heads_feed, _) = broadcast::channel(L1_HEAD_FEED_CAPACITY);
        let state = Arc::new(Self { l1_head, heads_feed });

        let (mut headers, sub_handle) = el.subscribe_headers(L1_HEAD_FEED_CAPACITY, cancel);
        let watcher = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                while let Some(header) = headers.next().await {
                    state.on_new_head(header);
                }
                let _ = sub_handle.await;
            }
        });

        Ok((state, watcher))
    }

    /// Record a new L1 head and publish it on the feed.
    pub(crate) fn on_new_head(&self, header: Header) {
        debug!(number = header.number, hash = %header.hash, "📦 New L1 head");
        DriverMetrics::set_l1_head_number(header.number);

        self.l1_head.send_replace(Some(header.clone()));
        let _ = self.heads_feed.send(header);
    }

    /// The latest observed L1 head, if any.
    pub fn l1_head(&self) -> Option<Header> {
        self.l1_head.borrow().clone()
    }

    /// Subscribe to the L1 head feed.
    pub fn sub_l1_heads(&self) -> broadcast::Receiver<Header> {
        self.heads_feed.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Arc<Self> {
        let (l1_head, _) = watch::channel(None);
        let (heads_feed, _) = broadcast::channel(L1_HEAD_FEED_CAPACITY);
        Arc::new(Self { l1_head, heads_feed })
    }
}
