use std::{any::type_name, marker::PhantomData, time::Duration};

use alloy::{
    network::Ethereum,
    providers::{Provider, ProviderBuilder, RootProvider, fillers::FillProvider},
    rpc::{
        client::{ClientBuilder, RpcClient},
        types::{Block, BlockNumberOrTag, Filter, Header, Log, SyncStatus, Transaction},
    },
    transports::{TransportErrorKind, TransportResult},
};
use alloy_primitives::{B256, Bytes, U64};
use alloy_sol_types::SolEvent;
use argo_chainio::DefaultProvider;
use argo_primitives::{
    BlockId,
    retries::{DEFAULT_RETRY_LAYER, RetryWsConnect},
    rollup::L1Origin,
};
use derive_more::derive::{Deref, DerefMut};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Time to wait before retrying when a subscription drops or fails to open.
const SUBSCRIPTION_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Polling interval of [`ExecutionClient::wait_l1_origin`].
const L1_ORIGIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling interval of [`ExecutionClient::wait_till_synced`].
const SYNC_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// An HTTP + WebSocket JSON-RPC execution client.
///
/// This struct wraps an inner provider (accessible via dereferencing) and
/// extends it with the subscription management and rollup-specific queries
/// the client roles rely on.
#[derive(Clone, Debug, Deref, DerefMut)]
pub struct ExecutionClient<CHAIN = Ethereum> {
    /// The raw RPC client, used for methods the provider does not expose.
    rpc: RpcClient,
    /// The inner provider implementing the standard JSON-RPC surface.
    #[deref]
    #[deref_mut]
    inner: FillProvider<alloy::providers::utils::JoinedRecommendedFillers, RootProvider>,
    /// The WebSocket provider backing subscriptions.
    ws_provider: DefaultProvider,
    /// The chain type marker.
    _chain: PhantomData<CHAIN>,
}

/// The chain type marker for the L2 rollup execution engine.
///
/// Methods under this marker are only served by rollup-aware nodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rollup;

/// The type alias for an L2 rollup execution client.
pub type RollupExecutionClient = ExecutionClient<Rollup>;

impl RollupExecutionClient {
    /// ROLLUP-SPECIFIC: returns the L1 origin of the L2 block with the given
    /// proposal id, or a "not found" error if the block is not local yet.
    pub async fn l1_origin_by_id(&self, block_id: BlockId) -> TransportResult<L1Origin> {
        self.rpc.request("rollup_l1OriginByID", [U64::from(block_id)]).await
    }

    /// ROLLUP-SPECIFIC: returns the L1 origin of the latest L2 block synced
    /// by the node, or `None` if no block has been synced yet.
    pub async fn head_l1_origin(&self) -> TransportResult<Option<L1Origin>> {
        let res: TransportResult<L1Origin> = self.rpc.request("rollup_headL1Origin", ()).await;
        match res {
            Ok(origin) => Ok(Some(origin)),
            Err(e) if e.to_string().contains("not found") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Polls the L2 engine until it reports an L1 origin record for the given
    /// proposal id, or the token is cancelled.
    ///
    /// This is the synchronisation point that lets a prover read the parent
    /// hash of a block the local engine has not imported yet.
    pub async fn wait_l1_origin(
        &self,
        cancel: &CancellationToken,
        block_id: BlockId,
    ) -> TransportResult<L1Origin> {
        loop {
            if cancel.is_cancelled() {
                return Err(TransportErrorKind::custom_str(&format!(
                    "cancelled while waiting for L1 origin of block {block_id}"
                )));
            }

            match self.l1_origin_by_id(block_id).await {
                Ok(origin) => return Ok(origin),
                Err(e) if e.to_string().contains("not found") => {
                    debug!(block_id, "L1 origin not found yet, retrying");
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                () = cancel.cancelled() => {}
                () = sleep(L1_ORIGIN_POLL_INTERVAL) => {}
            }
        }
    }
}

impl<CHAIN> ExecutionClient<CHAIN> {
    /// Create a new [`ExecutionClient`] with the given HTTP and WS URLs.
    pub async fn new<U: Into<Url>>(http_url: U, ws_url: U) -> TransportResult<Self> {
        let rpc = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(http_url.into());
        let inner = ProviderBuilder::new().connect_client(rpc.clone());

        let ws_connection = RetryWsConnect::from_url(ws_url.into());
        let ws_client =
            ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).pubsub(ws_connection).await?;
        let ws_provider = ProviderBuilder::new().connect_client(ws_client);

        Ok(Self { rpc, inner, ws_provider, _chain: PhantomData })
    }

    /// Get the latest block number.
    pub async fn get_head(&self) -> TransportResult<u64> {
        let result: U64 = self.rpc.request("eth_blockNumber", ()).await?;
        Ok(result.to())
    }

    /// Get the header of the block with the given number. If `None`, the
    /// latest header is returned.
    pub async fn get_header(&self, block_number: Option<u64>) -> TransportResult<Header> {
        let tag = block_number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number);

        let header: Option<Header> = self.rpc.request("eth_getHeaderByNumber", vec![tag]).await?;
        header.ok_or_else(|| TransportErrorKind::custom_str(&format!("Header not found: {tag}")))
    }

    /// Get the header of the block with the given hash.
    pub async fn header_by_hash(&self, hash: B256) -> TransportResult<Header> {
        let block: Option<Block> = self.rpc.request("eth_getBlockByHash", (hash, false)).await?;
        block
            .map(|b| b.header)
            .ok_or_else(|| TransportErrorKind::custom_str(&format!("Block not found: {hash}")))
    }

    /// Get the transaction at the given index of the block with the given hash.
    pub async fn transaction_in_block(
        &self,
        block_hash: B256,
        index: u64,
    ) -> TransportResult<Option<Transaction>> {
        self.rpc
            .request("eth_getTransactionByBlockHashAndIndex", (block_hash, U64::from(index)))
            .await
    }

    /// Get the number of peers connected to the client.
    pub async fn peer_count(&self) -> TransportResult<u64> {
        let count: U64 = self.rpc.request("net_peerCount", ()).await?;
        Ok(count.to())
    }

    /// Send a raw transaction to the network.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> TransportResult<B256> {
        self.rpc.request("eth_sendRawTransaction", [raw]).await
    }

    /// Check if the client is synced. Returns `true` if the client is synced.
    pub async fn is_synced(&self) -> TransportResult<bool> {
        let status = self.syncing().await?;
        Ok(matches!(status, SyncStatus::None))
    }

    /// Blocks until the client reports itself fully synced, or the token is
    /// cancelled. Sync progress is logged while waiting.
    pub async fn wait_till_synced(&self, cancel: &CancellationToken) -> TransportResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(TransportErrorKind::custom_str("cancelled while waiting for sync"));
            }

            match self.syncing().await? {
                SyncStatus::None => return Ok(()),
                SyncStatus::Info(progress) => {
                    info!(
                        current_block = %progress.current_block,
                        highest_block = %progress.highest_block,
                        "Execution engine is syncing..."
                    );
                }
            }

            tokio::select! {
                () = cancel.cancelled() => {}
                () = sleep(SYNC_PROBE_INTERVAL) => {}
            }
        }
    }

    /// Spawn a background task that subscribes to new chain heads over the
    /// WebSocket connection and forwards the headers into the returned stream.
    ///
    /// The subscription re-opens itself with a constant delay when it drops.
    /// The task exits when the token is cancelled or every receiver is gone.
    pub fn subscribe_headers(
        &self,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (ReceiverStream<Header>, JoinHandle<()>) {
        let ws = self.ws_provider.clone();
        let (header_tx, header_rx) = mpsc::channel(capacity);

        let handle = tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    return;
                }

                let mut sub = match ws.subscribe_blocks().await {
                    Ok(sub) => sub,
                    Err(e) => {
                        error!(error = %e, "Failed to subscribe to new headers");
                        if sleep_or_cancelled(&cancel, SUBSCRIPTION_RETRY_DELAY).await {
                            return;
                        }
                        continue;
                    }
                };

                loop {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        res = sub.recv() => match res {
                            Ok(header) => {
                                if header_tx.send(header).await.is_err() {
                                    debug!("Header subscriber dropped, stopping subscription");
                                    return;
                                }
                            }
                            Err(_) => break,
                        }
                    }
                }

                warn!("Subscription to new headers closed, retrying...");
            }
        });

        (ReceiverStream::new(header_rx), handle)
    }

    /// Spawn a background task that subscribes to log events of the given
    /// type and forwards `(raw log, decoded event)` pairs into the returned
    /// stream.
    ///
    /// The subscription re-opens itself with a constant delay when it drops;
    /// events emitted while disconnected are recovered by the owner's
    /// cursor-based replay, not by this subscription.
    pub fn subscribe_log_event<T: SolEvent + Send + 'static>(
        &self,
        filter: Filter,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (ReceiverStream<(Log, T)>, JoinHandle<()>) {
        let ws = self.ws_provider.clone();
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let handle = tokio::spawn(async move {
            let event_name = type_name::<T>();

            loop {
                if cancel.is_cancelled() {
                    return;
                }

                let mut sub = match ws.subscribe_logs(&filter).await {
                    Ok(sub) => sub,
                    Err(e) => {
                        error!(error = %e, "Failed to subscribe to {event_name} events");
                        if sleep_or_cancelled(&cancel, SUBSCRIPTION_RETRY_DELAY).await {
                            return;
                        }
                        continue;
                    }
                };

                debug!(address = ?filter.address, "Subscribed to {event_name} events");

                loop {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        res = sub.recv() => match res {
                            Ok(log) => match log.log_decode::<T>() {
                                Ok(decoded) => {
                                    let data = decoded.into_inner().data;
                                    if event_tx.send((log, data)).await.is_err() {
                                        debug!("{event_name} subscriber dropped, stopping subscription");
                                        return;
                                    }
                                }
                                Err(e) => {
                                    error!(topic0 = ?log.topic0(), error = %e, "Error decoding {event_name} event");
                                }
                            },
                            Err(_) => break,
                        }
                    }
                }

                warn!("Subscription to {event_name} events closed, retrying...");
            }
        });

        (ReceiverStream::new(event_rx), handle)
    }
}

/// Sleeps for the given duration. Returns `true` if the token was cancelled
/// before the sleep completed.
async fn sleep_or_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => true,
        () = sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// This test is ignored because it requires a local devnet running.
    /// It is still useful for manually debugging L1 origin queries.
    #[ignore]
    #[tokio::test]
    async fn test_l1_origin_by_id_devnet() {
        let url = Url::parse("http://localhost:28545").unwrap();
        let ws = Url::parse("ws://localhost:28546").unwrap();
        let client = RollupExecutionClient::new(url, ws).await.unwrap();

        let origin = client.l1_origin_by_id(1).await.unwrap();
        println!("l1 origin: {origin:?}");
    }
}
