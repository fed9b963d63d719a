use std::sync::Arc;

use alloy::{contract::Error as ContractError, transports::TransportError};
use alloy_primitives::Address;
use argo_chainio::rollup::inbox::{
    IRollupInbox::{BlockProposed, Evidence},
    RollupInboxWriter,
};
use argo_clients::execution::RollupExecutionClient;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    metrics::ProverMetrics,
    producer::{ProofProducer, ProofProducerError, ProofRequest, ProofWithHeader},
};

/// Errors that can occur while requesting or submitting a proof.
#[derive(Debug, Error)]
pub(crate) enum ProofSubmitterError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Producer(#[from] ProofProducerError),
    #[error("invalidation block gas limit mismatch: expected {expected}, got {got}")]
    InvalidationGasLimit { expected: u64, got: u64 },
}

/// Requests validity proofs for well-formed proposed blocks and submits them
/// to the rollup inbox.
#[derive(Debug, Clone)]
pub(crate) struct ValidProofSubmitter {
    l2: RollupExecutionClient,
    inbox: RollupInboxWriter,
    producer: Arc<ProofProducer>,
    result_tx: mpsc::Sender<ProofWithHeader>,
    prover_address: Address,
    anchor_contract: Address,
    submit_tx_mutex: Arc<Mutex<()>>,
    cancel: CancellationToken,
}

impl ValidProofSubmitter {
    /// Creates a new [`ValidProofSubmitter`] instance.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        l2: RollupExecutionClient,
        inbox: RollupInboxWriter,
        producer: Arc<ProofProducer>,
        result_tx: mpsc::Sender<ProofWithHeader>,
        prover_address: Address,
        anchor_contract: Address,
        submit_tx_mutex: Arc<Mutex<()>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            l2,
            inbox,
            producer,
            result_tx,
            prover_address,
            anchor_contract,
            submit_tx_mutex,
            cancel,
        }
    }

    /// Kick off proof generation for the given proposed block. The result
    /// lands on the valid-proof channel owned by this submitter.
    pub(crate) async fn request_proof(
        &self,
        event: &BlockProposed,
    ) -> Result<(), ProofSubmitterError> {
        let block_id = event.block_id();

        // The block must exist locally before its header can be proven.
        let origin = self.l2.wait_l1_origin(&self.cancel, block_id).await?;
        let header = self.l2.header_by_hash(origin.l2_block_hash).await?;

        debug!(block_id, block_hash = %header.hash, "Requesting validity proof");

        let req = ProofRequest {
            block_id,
            meta: event.meta.clone(),
            header,
            anchor_contract: self.anchor_contract,
        };
        self.producer.request_proof(req, &self.result_tx).await?;

        Ok(())
    }

    /// Format and send the validity proof transaction.
    pub(crate) async fn submit_proof(
        &self,
        proof_with_header: &ProofWithHeader,
        is_oracle: bool,
    ) -> Result<(), ProofSubmitterError> {
        let evidence = Evidence::new(
            proof_with_header.meta.clone(),
            &proof_with_header.header,
            self.prover_address,
            proof_with_header.zk_proof.clone(),
        );
        let input = evidence.abi_encode_input();

        // Proof transactions of one prover identity serialise on this mutex,
        // held until the receipt lands, so nonces cannot race.
        let guard = self.submit_tx_mutex.lock().await;
        let receipt = self.inbox.prove_block(proof_with_header.block_id, vec![input]).await?;
        drop(guard);

        ProverMetrics::increment_proofs_submitted(true);
        info!(
            block_id = proof_with_header.block_id,
            tx_hash = %receipt.transaction_hash,
            is_oracle,
            "✅ Valid block proof submitted"
        );

        Ok(())
    }
}

/// Requests invalidity proofs for malformed proposed blocks and submits them
/// to the rollup inbox.
///
/// An invalid proposal never becomes a regular L2 block: the engine
/// materialises a throwaway invalidation block for it, and the proof covers
/// that block instead.
#[derive(Debug, Clone)]
pub(crate) struct InvalidProofSubmitter {
    l2: RollupExecutionClient,
    inbox: RollupInboxWriter,
    producer: Arc<ProofProducer>,
    result_tx: mpsc::Sender<ProofWithHeader>,
    prover_address: Address,
    anchor_tx_gas_limit: u64,
    submit_tx_mutex: Arc<Mutex<()>>,
    cancel: CancellationToken,
}

impl InvalidProofSubmitter {
    /// Creates a new [`InvalidProofSubmitter`] instance.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        l2: RollupExecutionClient,
        inbox: RollupInboxWriter,
        producer: Arc<ProofProducer>,
        result_tx: mpsc::Sender<ProofWithHeader>,
        prover_address: Address,
        anchor_tx_gas_limit: u64,
        submit_tx_mutex: Arc<Mutex<()>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            l2,
            inbox,
            producer,
            result_tx,
            prover_address,
            anchor_tx_gas_limit,
            submit_tx_mutex,
            cancel,
        }
    }

    /// Kick off proof generation over the throwaway invalidation block of
    /// the given proposal. The result lands on the invalid-proof channel
    /// owned by this submitter.
    pub(crate) async fn request_proof(
        &self,
        event: &BlockProposed,
    ) -> Result<(), ProofSubmitterError> {
        let block_id = event.block_id();

        let origin = self.l2.wait_l1_origin(&self.cancel, block_id).await?;
        if !origin.throwaway {
            debug!(block_id, "L1 origin of an invalid proposal is not marked as throwaway");
        }

        let header = self.l2.header_by_hash(origin.l2_block_hash).await?;

        // The invalidation block holds exactly one transaction, so its gas
        // limit must match the protocol's anchor transaction gas limit.
        if header.gas_limit != self.anchor_tx_gas_limit {
            return Err(ProofSubmitterError::InvalidationGasLimit {
                expected: self.anchor_tx_gas_limit,
                got: header.gas_limit,
            });
        }

        debug!(block_id, block_hash = %header.hash, "Requesting invalidity proof");

        let req = ProofRequest {
            block_id,
            meta: event.meta.clone(),
            header,
            anchor_contract: Address::ZERO,
        };
        self.producer.request_proof(req, &self.result_tx).await?;

        Ok(())
    }

    /// Format and send the invalidity proof transaction.
    pub(crate) async fn submit_proof(
        &self,
        proof_with_header: &ProofWithHeader,
    ) -> Result<(), ProofSubmitterError> {
        let evidence = Evidence::new(
            proof_with_header.meta.clone(),
            &proof_with_header.header,
            self.prover_address,
            proof_with_header.zk_proof.clone(),
        );
        let input = evidence.abi_encode_input();

        let guard = self.submit_tx_mutex.lock().await;
        let receipt =
            self.inbox.prove_block_invalid(proof_with_header.block_id, vec![input]).await?;
        drop(guard);

        ProverMetrics::increment_proofs_submitted(false);
        info!(
            block_id = proof_with_header.block_id,
            tx_hash = %receipt.transaction_hash,
            "🚫 Invalid block proof submitted"
        );

        Ok(())
    }
}
