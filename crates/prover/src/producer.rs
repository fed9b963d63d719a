use std::time::Duration;

use alloy::{
    rpc::{client::ClientBuilder, types::Header},
    transports::{RpcError, TransportErrorKind},
};
use alloy_primitives::{Address, Bytes};
use argo_chainio::rollup::inbox::IRollupInbox::BlockMetadata;
use argo_primitives::{BlockId, retries::DEFAULT_RETRY_LAYER};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info};
use url::Url;

/// The proof bytes the dummy producer hands out.
const DUMMY_PROOF: [u8; 32] = [0xff; 32];

/// The circuit the rpcd backend is asked to prove.
const RPCD_CIRCUIT: &str = "evm";

/// Errors that can occur while producing a proof.
#[derive(Debug, Error)]
pub(crate) enum ProofProducerError {
    #[error("Transport error: {0}")]
    Transport(#[from] RpcError<TransportErrorKind>),
    #[error("proof result channel closed")]
    ResultChannelClosed,
}

/// Everything a producer needs to generate a proof for one block.
#[derive(Debug, Clone)]
pub(crate) struct ProofRequest {
    /// The proposal id of the block.
    pub block_id: BlockId,
    /// The metadata the block was proposed with.
    pub meta: BlockMetadata,
    /// The header of the L2 block being proven.
    pub header: Header,
    /// The rollup anchor contract on L2, part of the circuit's public inputs.
    pub anchor_contract: Address,
}

/// A generated proof, with enough context to build the submission transaction.
#[derive(Debug, Clone)]
pub(crate) struct ProofWithHeader {
    /// The proposal id of the proven block.
    pub block_id: BlockId,
    /// The metadata the block was proposed with.
    pub meta: BlockMetadata,
    /// The header of the proven L2 block.
    pub header: Header,
    /// The serialized proof.
    pub zk_proof: Bytes,
}

/// The available proving backends. The concrete selector lives in the
/// prover's init; everything downstream only sees this capability set.
#[derive(Debug)]
pub(crate) enum ProofProducer {
    /// A delay-simulating producer emitting constant dummy proofs, used for
    /// bring-up and chaos testing (the "oracle" mode).
    Dummy(DummyProofProducer),
    /// A producer backed by a zkEVM rpcd proving service.
    Rpcd(RpcdProofProducer),
}

impl ProofProducer {
    /// Generate a proof for the given request and push the result into
    /// `result_tx`. Blocks for the whole duration of the proof generation,
    /// which is what makes the caller's concurrency guard effective.
    pub(crate) async fn request_proof(
        &self,
        req: ProofRequest,
        result_tx: &mpsc::Sender<ProofWithHeader>,
    ) -> Result<(), ProofProducerError> {
        match self {
            Self::Dummy(producer) => producer.request_proof(req, result_tx).await,
            Self::Rpcd(producer) => producer.request_proof(req, result_tx).await,
        }
    }
}

/// A proof producer that sleeps for a random delay within the configured
/// bounds and then emits a constant dummy proof.
#[derive(Debug, Clone, Default)]
pub(crate) struct DummyProofProducer {
    /// Lower bound of the simulated proving delay.
    pub delay_lower_bound: Option<Duration>,
    /// Upper bound of the simulated proving delay.
    pub delay_upper_bound: Option<Duration>,
}

impl DummyProofProducer {
    async fn request_proof(
        &self,
        req: ProofRequest,
        result_tx: &mpsc::Sender<ProofWithHeader>,
    ) -> Result<(), ProofProducerError> {
        if let Some(delay) = self.random_delay() {
            debug!(block_id = req.block_id, ?delay, "Simulating proof generation delay");
            sleep(delay).await;
        }

        result_tx
            .send(ProofWithHeader {
                block_id: req.block_id,
                meta: req.meta,
                header: req.header,
                zk_proof: Bytes::from_static(&DUMMY_PROOF),
            })
            .await
            .map_err(|_| ProofProducerError::ResultChannelClosed)
    }

    /// Pick a delay uniformly within the configured bounds.
    fn random_delay(&self) -> Option<Duration> {
        let (lower, upper) = match (self.delay_lower_bound, self.delay_upper_bound) {
            (None, None) => return None,
            (lower, upper) => {
                let lower = lower.unwrap_or_default();
                (lower, upper.unwrap_or(lower))
            }
        };

        if upper <= lower {
            return Some(lower);
        }

        let span_ms = (upper - lower).as_millis() as u64;
        Some(lower + Duration::from_millis(rand::rng().random_range(0..=span_ms)))
    }
}

/// A proof producer backed by a zkEVM rpcd proving service, spoken to over
/// JSON-RPC.
#[derive(Debug, Clone)]
pub(crate) struct RpcdProofProducer {
    rpc: alloy::rpc::client::RpcClient,
    l2_rpc_url: Url,
    params_path: String,
}

/// The request payload of the rpcd `proof` method.
#[derive(Debug, Clone, Serialize)]
struct RpcdRequestParam {
    circuit: &'static str,
    block: u64,
    rpc: String,
    param: String,
    retry: bool,
}

/// The response payload of the rpcd `proof` method.
#[derive(Debug, Clone, Deserialize)]
struct RpcdProofResponse {
    proof: Bytes,
}

impl RpcdProofProducer {
    /// Creates a new [`RpcdProofProducer`] talking to the given rpcd endpoint.
    pub(crate) fn new(endpoint: Url, params_path: String, l2_rpc_url: Url) -> Self {
        let rpc = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(endpoint);
        Self { rpc, l2_rpc_url, params_path }
    }

    async fn request_proof(
        &self,
        req: ProofRequest,
        result_tx: &mpsc::Sender<ProofWithHeader>,
    ) -> Result<(), ProofProducerError> {
        info!(block_id = req.block_id, "Requesting proof from zkEVM rpcd");
        let start = tokio::time::Instant::now();

        let param = RpcdRequestParam {
            circuit: RPCD_CIRCUIT,
            block: req.block_id,
            rpc: self.l2_rpc_url.to_string(),
            param: self.params_path.clone(),
            retry: true,
        };

        let response: RpcdProofResponse = self.rpc.request("proof", [param]).await?;

        info!(block_id = req.block_id, elapsed = ?start.elapsed(), "Proof generated");

        result_tx
            .send(ProofWithHeader {
                block_id: req.block_id,
                meta: req.meta,
                header: req.header,
                zk_proof: response.proof,
            })
            .await
            .map_err(|_| ProofProducerError::ResultChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request(block_id: BlockId) -> ProofRequest {
        ProofRequest {
            block_id,
            meta: BlockMetadata::default(),
            header: Header::default(),
            anchor_contract: Address::ZERO,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dummy_proof_arrives_within_the_delay_bounds() {
        let producer = DummyProofProducer {
            delay_lower_bound: Some(Duration::from_secs(1)),
            delay_upper_bound: Some(Duration::from_secs(3)),
        };
        let (tx, mut rx) = mpsc::channel(1);

        let start = tokio::time::Instant::now();
        producer.request_proof(test_request(5), &tx).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed <= Duration::from_secs(3));

        let pwh = rx.recv().await.unwrap();
        assert_eq!(pwh.block_id, 5);
        assert_eq!(pwh.zk_proof.as_ref(), DUMMY_PROOF);
    }

    #[tokio::test]
    async fn dummy_proof_without_bounds_is_immediate() {
        let producer = DummyProofProducer::default();
        let (tx, mut rx) = mpsc::channel(1);

        producer.request_proof(test_request(1), &tx).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().block_id, 1);
    }

    #[tokio::test]
    async fn dropped_receiver_is_reported() {
        let producer = DummyProofProducer::default();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = producer.request_proof(test_request(1), &tx).await.unwrap_err();
        assert!(matches!(err, ProofProducerError::ResultChannelClosed));
    }

    #[test]
    fn delay_with_equal_bounds_is_constant() {
        let producer = DummyProofProducer {
            delay_lower_bound: Some(Duration::from_secs(2)),
            delay_upper_bound: Some(Duration::from_secs(2)),
        };

        assert_eq!(producer.random_delay(), Some(Duration::from_secs(2)));
    }
}
