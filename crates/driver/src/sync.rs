use std::time::Duration;

use alloy::{rpc::types::Header, transports::TransportError};
use argo_clients::{engine::EngineClient, execution::RollupExecutionClient};
use argo_config::DriverOpts;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Errors that can occur during a sync pass.
#[derive(Debug, Error)]
pub enum SyncerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// The seam between the driver's event loop and whatever applies the
/// canonical L1 view to the local L2 chain.
pub trait ChainSyncer: Send + Sync + 'static {
    /// Bring the local L2 chain in line with the given L1 head.
    fn sync(&self, l1_head: Header) -> impl Future<Output = Result<(), SyncerError>> + Send;
}

/// A [`ChainSyncer`] that drives the L2 execution engine through its
/// authenticated engine API: the engine derives the rollup chain itself,
/// this syncer only moves its L1 cursor forward.
#[derive(Debug)]
pub struct EngineChainSyncer {
    l2: RollupExecutionClient,
    engine: EngineClient,
    p2p_sync_verified_blocks: bool,
    p2p_sync_timeout: Duration,
    cancel: CancellationToken,
}

impl EngineChainSyncer {
    /// Creates a new [`EngineChainSyncer`] instance.
    pub fn new(
        l2: RollupExecutionClient,
        engine: EngineClient,
        opts: &DriverOpts,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            l2,
            engine,
            p2p_sync_verified_blocks: opts.p2p_sync_verified_blocks,
            p2p_sync_timeout: Duration::from_secs(opts.p2p_sync_timeout_secs),
            cancel,
        }
    }
}

impl ChainSyncer for EngineChainSyncer {
    async fn sync(&self, l1_head: Header) -> Result<(), SyncerError> {
        // Prefer letting the engine download verified blocks from its P2P
        // network before falling back to deriving them from L1 one by one.
        if self.p2p_sync_verified_blocks && !self.l2.is_synced().await? {
            let p2p_sync = self.l2.wait_till_synced(&self.cancel);
            match tokio::time::timeout(self.p2p_sync_timeout, p2p_sync).await {
                Ok(res) => res?,
                Err(_) => {
                    warn!("P2P sync of verified blocks timed out, deriving from L1 instead");
                }
            }
        }

        let status = self.engine.sync_to_l1_head(l1_head.number, l1_head.hash).await?;
        debug!(
            l1_head = l1_head.number,
            l2_head = status.l2_head_number,
            l2_head_hash = %status.l2_head_hash,
            "L2 engine synced to L1 head"
        );

        Ok(())
    }
}
