use std::{ops::ControlFlow, sync::Arc, time::Duration};

use alloy::{
    consensus::Transaction as _, contract::Error as ContractError, providers::Provider,
    rpc::types::Log, transports::TransportError,
};
use alloy_primitives::B256;
use argo_chainio::rollup::inbox::{
    IRollupInbox::{BlockProposed, BlockVerified},
    RollupInbox, RollupInboxWriter,
};
use argo_clients::execution::{ExecutionClient, RollupExecutionClient};
use argo_config::{Opts, ProverOpts};
use argo_primitives::{
    BlockId,
    notify::notify_channel,
    retries::{constant_backoff, exponential_backoff},
    summary::Summary,
    task::TaskGroup,
};
use backoff::future::retry;
use thiserror::Error;
use tokio::{
    sync::{Mutex, Semaphore, mpsc},
    time::MissedTickBehavior,
};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    dispatch::{CursorSource, DispatchCursor, ParityFilter, cursor_source},
    iterator::EventIterator,
    metrics::ProverMetrics,
    producer::{DummyProofProducer, ProofProducer, ProofWithHeader, RpcdProofProducer},
    submitter::{InvalidProofSubmitter, ProofSubmitterError, ValidProofSubmitter},
    validator::{TxListHint, TxListValidator},
};

/// The capacity of the proposal, verification and proof result channels.
/// Sized to absorb the event flood that follows a subscription reconnect.
const EVENT_CHANNEL_CAPACITY: usize = 204_800;

/// When the protocol's pending queue is saturated no new proposal events
/// arrive, so a ticker periodically forces a replay pass to keep going.
const FORCE_PROVING_INTERVAL: Duration = Duration::from_secs(15);

/// The interval between two pending-blocks metric samples.
const PENDING_BLOCKS_REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// The delay between two submission attempts of an oracle proof.
const ORACLE_RESUBMISSION_DELAY: Duration = Duration::from_secs(12);

/// The errors that can occur during the prover's operation.
/// Once the event loop has started, none of these are fatal.
#[derive(Debug, Error)]
pub enum ProverError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Submitter(#[from] ProofSubmitterError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("event log is missing the {0} field")]
    MissingLogField(&'static str),
    #[error("proposal transaction of block {0} not found")]
    MissingProposalTx(BlockId),
    #[error("prover is shutting down")]
    ShuttingDown,
}

/// Argo prover.
///
/// Replays `BlockProposed` events from its L1 cursor, classifies each
/// proposed block's transaction list, runs bounded-concurrency proving jobs
/// and submits the resulting proofs through a serialised transaction path.
#[derive(Debug)]
pub struct Prover {
    /// Which proposal ids this instance dispatches.
    parity: ParityFilter,
    /// Whether proofs come from the dummy (oracle) producer.
    oracle_mode: bool,
    /// L1 execution client connection.
    l1: ExecutionClient,
    /// Rollup inbox contract instance (read-only).
    inbox: RollupInbox,
    /// The context cloned into every per-proposal worker task.
    handler: ProposalHandler,
    /// The replay cursor. Only mutated by the event-loop task.
    cursor: DispatchCursor,
    /// The L1 height of the latest observed block verification.
    latest_verified_l1_height: u64,
    /// Senders of the proof result channels, also used to peek at whether
    /// results are waiting to be submitted.
    valid_proof_tx: mpsc::Sender<ProofWithHeader>,
    invalid_proof_tx: mpsc::Sender<ProofWithHeader>,
    /// Receivers of the proof result channels, taken by the event loop.
    proof_rx: Option<(mpsc::Receiver<ProofWithHeader>, mpsc::Receiver<ProofWithHeader>)>,
    /// Bounds the number of in-flight proving jobs.
    propose_guard: Arc<Semaphore>,
    /// Bounds the number of in-flight submission jobs.
    submit_guard: Arc<Semaphore>,
    /// The root cancellation token of this role.
    cancel: CancellationToken,
}

impl Prover {
    /// Create a new [`Prover`] instance from the given configuration.
    ///
    /// This is the only fatal path of the role: connectivity or protocol
    /// errors here are returned to the process owner.
    pub async fn init_from_config(
        cancel: CancellationToken,
        opts: &Opts,
        prover_opts: &ProverOpts,
    ) -> Result<Self, ProverError> {
        let parity = match (
            prover_opts.only_prove_even_number_blocks,
            prover_opts.only_prove_odd_number_blocks,
        ) {
            (true, true) => {
                return Err(ProverError::Config(
                    "only one of the even/odd block id filters may be enabled".to_owned(),
                ));
            }
            (true, false) => ParityFilter::EvenOnly,
            (false, true) => ParityFilter::OddOnly,
            (false, false) => ParityFilter::None,
        };

        let delay_lower_bound =
            prover_opts.random_dummy_proof_delay_lower_bound.map(Duration::from_secs);
        let delay_upper_bound =
            prover_opts.random_dummy_proof_delay_upper_bound.map(Duration::from_secs);
        if let (Some(lower), Some(upper)) = (delay_lower_bound, delay_upper_bound) {
            if lower > upper {
                return Err(ProverError::Config(
                    "random dummy proof delay lower bound exceeds the upper bound".to_owned(),
                ));
            }
        }

        let l1 = ExecutionClient::new(opts.l1.el_url.clone(), opts.l1.el_ws_url.clone()).await?;
        let l2 =
            RollupExecutionClient::new(opts.l2.el_url.clone(), opts.l2.el_ws_url.clone()).await?;
        let inbox = RollupInbox::new(opts.l1.el_url.clone(), opts.contracts.rollup_inbox);

        let protocol_config = inbox.get_config().await?;
        info!(?protocol_config, "Protocol configs");

        let chain_id = l2.get_chain_id().await?;
        let validator = TxListValidator::new(&protocol_config, chain_id);
        let prover_address = prover_opts.l1_prover_private_key.address();

        let (valid_proof_tx, valid_proof_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (invalid_proof_tx, invalid_proof_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let producer = if prover_opts.dummy {
            ProofProducer::Dummy(DummyProofProducer { delay_lower_bound, delay_upper_bound })
        } else {
            let endpoint = prover_opts.zkevm_rpcd_endpoint.clone().ok_or_else(|| {
                ProverError::Config(
                    "a zkevm rpcd endpoint is required unless dummy mode is enabled".to_owned(),
                )
            })?;
            let params_path = prover_opts.zkevm_rpcd_params_path.clone().ok_or_else(|| {
                ProverError::Config(
                    "a zkevm rpcd params path is required unless dummy mode is enabled".to_owned(),
                )
            })?;

            ProofProducer::Rpcd(RpcdProofProducer::new(
                endpoint,
                params_path,
                opts.l2.el_url.clone(),
            ))
        };
        let producer = Arc::new(producer);

        let submit_tx_mutex = Arc::new(Mutex::new(()));
        let submitter_key = prover_opts
            .proof_submitter_private_key
            .clone()
            .unwrap_or_else(|| prover_opts.l1_prover_private_key.clone());

        let valid_submitter = ValidProofSubmitter::new(
            l2.clone(),
            RollupInboxWriter::new(
                opts.l1.el_url.clone(),
                opts.contracts.rollup_inbox,
                submitter_key,
            ),
            Arc::clone(&producer),
            valid_proof_tx.clone(),
            prover_address,
            opts.contracts.rollup_anchor,
            Arc::clone(&submit_tx_mutex),
            cancel.clone(),
        );

        let invalid_submitter = InvalidProofSubmitter::new(
            l2.clone(),
            RollupInboxWriter::new(
                opts.l1.el_url.clone(),
                opts.contracts.rollup_inbox,
                prover_opts.l1_prover_private_key.clone(),
            ),
            producer,
            invalid_proof_tx.clone(),
            prover_address,
            protocol_config.anchorTxGasLimit.to(),
            submit_tx_mutex,
            cancel.clone(),
        );

        let mut cursor = DispatchCursor::default();
        init_l1_current(&mut cursor, &l2, &inbox, prover_opts.starting_block_id, &cancel).await;
        if cancel.is_cancelled() {
            return Err(ProverError::ShuttingDown);
        }

        let max_jobs = prover_opts.max_concurrent_proving_jobs.max(1);

        let handler = ProposalHandler {
            l1: l1.clone(),
            l2,
            inbox: inbox.clone(),
            validator,
            valid_submitter,
            invalid_submitter,
            cancel: cancel.clone(),
        };

        Ok(Self {
            parity,
            oracle_mode: prover_opts.dummy,
            l1,
            inbox,
            handler,
            cursor,
            latest_verified_l1_height: 0,
            valid_proof_tx,
            invalid_proof_tx,
            proof_rx: Some((valid_proof_rx, invalid_proof_rx)),
            propose_guard: Arc::new(Semaphore::new(max_jobs)),
            submit_guard: Arc::new(Semaphore::new(max_jobs)),
            cancel,
        })
    }

    /// Returns the name of this role.
    pub const fn name(&self) -> &'static str {
        "prover"
    }

    /// Start the prover's background tasks and return a handle to close them.
    pub fn start(self) -> ProverHandle {
        let cancel = self.cancel.clone();
        let mut tasks = TaskGroup::new();

        let (proposed_rx, sub) = self.l1.subscribe_log_event::<BlockProposed>(
            self.inbox.block_proposed_filter(),
            EVENT_CHANNEL_CAPACITY,
            cancel.clone(),
        );
        tasks.add_handle("block proposed subscription", sub);

        let (verified_rx, sub) = self.l1.subscribe_log_event::<BlockVerified>(
            self.inbox.block_verified_filter(),
            EVENT_CHANNEL_CAPACITY,
            cancel.clone(),
        );
        tasks.add_handle("block verified subscription", sub);

        tasks.spawn(
            "pending blocks reporter",
            report_pending_blocks(self.inbox.clone(), cancel.clone()),
        );

        info!("🧭 Starting prover event loop");
        let event_loop: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> =
            Box::pin(self.event_loop(proposed_rx, verified_rx));
        tasks.spawn("prover event loop", event_loop);

        ProverHandle { cancel, tasks }
    }

    /// The prover's event loop.
    ///
    /// Biased ordering: finished proofs are submitted before anything else,
    /// then replay passes run, then incoming events are folded into the
    /// single-slot prove trigger.
    async fn event_loop(
        mut self,
        mut proposed_rx: ReceiverStream<(Log, BlockProposed)>,
        mut verified_rx: ReceiverStream<(Log, BlockVerified)>,
    ) {
        let (mut valid_proof_rx, mut invalid_proof_rx) =
            self.proof_rx.take().expect("prover event loop started twice");

        let cancel = self.cancel.clone();
        let (notifier, mut prove_notify) = notify_channel();

        let mut force_proving_ticker = tokio::time::interval(FORCE_PROVING_INTERVAL);
        force_proving_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Request a proving pass right away to catch up with the latest state.
        notifier.notify();

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                Some(proof) = valid_proof_rx.recv() => self.submit_proof_op(proof, true).await,

                Some(proof) = invalid_proof_rx.recv() => self.submit_proof_op(proof, false).await,

                Some(()) = prove_notify.recv() => {
                    if let Err(e) = self.prove_op().await {
                        error!(error = ?e, "Prove new blocks error");
                    }
                }

                Some((_, event)) = proposed_rx.next() => {
                    debug!("Observed proposed block: {}", event.summary());
                    notifier.notify();
                }

                Some((log, event)) = verified_rx.next() => self.on_block_verified(&log, &event),

                _ = force_proving_ticker.tick() => notifier.notify(),
            }
        }
    }

    /// Replay proposal events from the current cursor up to the L1 head,
    /// dispatching a proving job for each block that needs one.
    async fn prove_op(&mut self) -> Result<(), ProverError> {
        let iter = EventIterator::<BlockProposed>::new(
            self.l1.clone(),
            self.inbox.block_proposed_filter(),
            self.cursor.l1_current(),
            self.cancel.clone(),
        );

        iter.iterate(|log, event| Box::pin(self.on_block_proposed(&log, event))).await
    }

    /// Handle one replayed proposal event.
    async fn on_block_proposed(
        &mut self,
        log: &Log,
        event: BlockProposed,
    ) -> Result<ControlFlow<()>, ProverError> {
        // Finished proofs must reach the contract before more work is fetched.
        if self.has_pending_proofs() {
            return Ok(ControlFlow::Break(()));
        }

        let block_id = event.block_id();
        if let Some(reason) = self.cursor.check(block_id, self.parity) {
            info!(block_id, ?reason, "Skipping proposed block");
            return Ok(ControlFlow::Continue(()));
        }

        info!(block_id, "Proposed block");
        ProverMetrics::set_received_proposed_block(block_id);

        let l1_block_number = log.block_number.ok_or(ProverError::MissingLogField("blockNumber"))?;
        let l1_block_hash = log.block_hash.ok_or(ProverError::MissingLogField("blockHash"))?;
        let tx_index =
            log.transaction_index.ok_or(ProverError::MissingLogField("transactionIndex"))?;

        // Blocks while all proving slots are busy, which is what pushes
        // backpressure into the replay.
        let cancelled = self.cancel.clone().cancelled_owned();
        let permit = tokio::select! {
            () = cancelled => return Ok(ControlFlow::Break(())),
            permit = Arc::clone(&self.propose_guard).acquire_owned() => {
                permit.map_err(|_| ProverError::ShuttingDown)?
            }
        };

        // Responsibility for this proposal is declared before the work
        // spawns; a replay of the same event is a no-op from here on.
        self.cursor.advance(l1_block_number, block_id);

        let handler = self.handler.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handler.handle(event, l1_block_hash, tx_index).await {
                error!(block_id, error = ?e, "Handle new BlockProposed event error");
            }
        });

        Ok(ControlFlow::Continue(()))
    }

    /// Launch a submission job for a finished proof.
    async fn submit_proof_op(&self, proof_with_header: ProofWithHeader, is_valid: bool) {
        // Blocks the event loop while all submission slots are busy.
        let cancelled = self.cancel.clone().cancelled_owned();
        let permit = tokio::select! {
            () = cancelled => return,
            permit = Arc::clone(&self.submit_guard).acquire_owned() => {
                let Ok(permit) = permit else { return };
                permit
            }
        };

        let oracle_mode = self.oracle_mode;
        let cancel = self.cancel.clone();
        let valid_submitter = self.handler.valid_submitter.clone();
        let invalid_submitter = self.handler.invalid_submitter.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let block_id = proof_with_header.block_id;

            let result = if is_valid {
                if oracle_mode {
                    submit_oracle_proof(&valid_submitter, &proof_with_header, &cancel).await
                } else {
                    valid_submitter.submit_proof(&proof_with_header, false).await
                }
            } else {
                invalid_submitter.submit_proof(&proof_with_header).await
            };

            if let Err(e) = result {
                error!(block_id, is_valid, error = ?e, "Submit proof error");
            }
        });
    }

    /// Record a block verification observed on L1.
    fn on_block_verified(&mut self, log: &Log, event: &BlockVerified) {
        let block_id = event.block_id();
        ProverMetrics::set_latest_verified_id(block_id);

        if let Some(l1_height) = log.block_number {
            self.latest_verified_l1_height = l1_height;
        }

        if event.is_invalid() {
            info!(
                block_id,
                verified_at_l1_height = self.latest_verified_l1_height,
                "New verified invalid block"
            );
        } else {
            info!(
                block_id,
                block_hash = %event.blockHash,
                verified_at_l1_height = self.latest_verified_l1_height,
                "New verified valid block"
            );
        }
    }

    /// Returns true if any generated proof is waiting on a result channel.
    fn has_pending_proofs(&self) -> bool {
        self.valid_proof_tx.max_capacity() > self.valid_proof_tx.capacity()
            || self.invalid_proof_tx.max_capacity() > self.invalid_proof_tx.capacity()
    }
}

/// A handle over a started [`Prover`], used to shut it down.
#[derive(Debug)]
pub struct ProverHandle {
    cancel: CancellationToken,
    tasks: TaskGroup,
}

impl ProverHandle {
    /// Cancel the prover's tasks, tear down its subscriptions and wait for
    /// everything to drain.
    pub async fn close(self) {
        self.cancel.cancel();
        self.tasks.join_all().await;
    }
}

/// The context every per-proposal worker task runs with.
#[derive(Debug, Clone)]
struct ProposalHandler {
    l1: ExecutionClient,
    l2: RollupExecutionClient,
    inbox: RollupInbox,
    validator: TxListValidator,
    valid_submitter: ValidProofSubmitter,
    invalid_submitter: InvalidProofSubmitter,
    cancel: CancellationToken,
}

impl ProposalHandler {
    /// Process one dispatched proposal: bail out if the block no longer
    /// needs a proof, otherwise classify its transaction list and hand it
    /// to the matching submitter.
    async fn handle(
        &self,
        event: BlockProposed,
        l1_block_hash: B256,
        tx_index: u64,
    ) -> Result<(), ProverError> {
        let block_id = event.block_id();

        if self.is_block_verified(block_id).await? {
            info!(block_id, "📋 Block has been verified");
            return Ok(());
        }

        if !self.need_new_proof(block_id).await? {
            return Ok(());
        }

        let proposal_tx = self
            .l1
            .transaction_in_block(l1_block_hash, tx_index)
            .await?
            .ok_or(ProverError::MissingProposalTx(block_id))?;

        let hint = self.validator.validate(block_id, proposal_tx.input());

        if hint == TxListHint::Ok {
            self.valid_submitter.request_proof(&event).await?;
        } else {
            info!(block_id, ?hint, "Proposed block has an invalid transaction list");
            self.invalid_submitter.request_proof(&event).await?;
        }

        Ok(())
    }

    /// Check whether the block has already been verified by the protocol.
    async fn is_block_verified(&self, block_id: BlockId) -> Result<bool, ProverError> {
        let vars = self.inbox.get_state_variables().await?;
        Ok(block_id <= vars.latestVerifiedId)
    }

    /// Check whether the block still needs a proof from us, i.e. whether the
    /// fork choice for its (id, parent hash) pair is still unproven.
    async fn need_new_proof(&self, block_id: BlockId) -> Result<bool, ProverError> {
        let parent_hash = if block_id == 1 {
            self.l2.get_header(Some(0)).await?.hash
        } else {
            let parent_origin = self.l2.wait_l1_origin(&self.cancel, block_id - 1).await?;
            parent_origin.l2_block_hash
        };

        let fork_choice = self.inbox.get_fork_choice(block_id, parent_hash).await?;
        if !fork_choice.is_unproven() {
            info!(block_id, prover = %fork_choice.prover, "📬 Block's proof has already been submitted");
            return Ok(false);
        }

        Ok(true)
    }
}

/// Submit an oracle proof, retrying forever with a constant delay until it
/// lands or the token is cancelled.
async fn submit_oracle_proof(
    submitter: &ValidProofSubmitter,
    proof_with_header: &ProofWithHeader,
    cancel: &CancellationToken,
) -> Result<(), ProofSubmitterError> {
    let result = retry(constant_backoff(ORACLE_RESUBMISSION_DELAY), || async move {
        if cancel.is_cancelled() {
            return Err(backoff::Error::permanent(None));
        }

        submitter.submit_proof(proof_with_header, true).await.map_err(|e| {
            info!(block_id = proof_with_header.block_id, error = %e, "Retrying oracle proof submission");
            backoff::Error::transient(Some(e))
        })
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(Some(e)) => Err(e),
        Err(None) => Ok(()),
    }
}

/// Recover the replay cursor, retrying transient failures with an
/// exponential backoff. Best-effort: a permanent failure leaves the cursor
/// at its default and is only logged.
async fn init_l1_current(
    cursor: &mut DispatchCursor,
    l2: &RollupExecutionClient,
    inbox: &RollupInbox,
    starting_block_id: Option<BlockId>,
    cancel: &CancellationToken,
) {
    let result = retry(exponential_backoff(), || async move {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        resolve_l1_cursor(l2, inbox, starting_block_id, cancel).await.map(Some).map_err(|e| {
            warn!(error = ?e, "Failed to resolve the L1 replay cursor, retrying");
            backoff::Error::transient(e)
        })
    })
    .await;

    match result {
        Ok(Some(height)) => {
            info!(l1_current = height, "Initialized L1 replay cursor");
            cursor.set_l1_current(height);
        }
        Ok(None) => {}
        Err(e) => error!(error = ?e, "Failed to initialize the L1 replay cursor"),
    }
}

/// Resolve the L1 height the replay cursor starts from.
async fn resolve_l1_cursor(
    l2: &RollupExecutionClient,
    inbox: &RollupInbox,
    starting_block_id: Option<BlockId>,
    cancel: &CancellationToken,
) -> Result<u64, ProverError> {
    l2.wait_till_synced(cancel).await?;

    let source = if let Some(id) = starting_block_id {
        CursorSource::OriginOf(id)
    } else {
        let vars = inbox.get_state_variables().await?;
        cursor_source(None, vars.latestVerifiedId, vars.genesisHeight)
    };

    match source {
        CursorSource::Genesis(height) => Ok(height),
        CursorSource::OriginOf(id) => Ok(l2.l1_origin_by_id(id).await?.l1_height()),
    }
}

/// Periodically sample the protocol's pending block count into a gauge.
async fn report_pending_blocks(inbox: RollupInbox, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(PENDING_BLOCKS_REPORT_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        match inbox.get_state_variables().await {
            Ok(vars) => {
                let pending =
                    vars.nextBlockId.saturating_sub(vars.latestVerifiedId).saturating_sub(1);
                ProverMetrics::set_pending_blocks(pending);
            }
            Err(e) => error!(error = %e, "Get protocol state variables error"),
        }
    }
}
