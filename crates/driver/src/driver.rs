use std::sync::Arc;

use alloy::{rpc::types::Header, transports::TransportError};
use argo_chainio::rollup::inbox::RollupInbox;
use argo_clients::{
    engine::EngineClient,
    execution::{ExecutionClient, RollupExecutionClient},
};
use argo_config::{DriverOpts, Opts};
use argo_primitives::{notify::notify_channel, retries::exponential_backoff, task::TaskGroup};
use backoff::future::retry;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    state::State,
    status::StatusReporter,
    sync::{ChainSyncer, EngineChainSyncer, SyncerError},
};

/// The errors that can occur during the driver's operation.
/// Note that these errors won't halt the event loop once it has started.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Error while syncing the L2 chain: {0}")]
    Syncer(#[from] SyncerError),
}

/// Argo driver.
///
/// The driver keeps the local L2 execution engine's chain in sync with the
/// canonical view recorded by the rollup inbox on L1. It subscribes to the
/// L1 head feed published by [`State`] and coalesces head changes into
/// sync passes: at most one pass runs at a time, and any number of heads
/// arriving during a pass collapse into exactly one follow-up pass.
#[derive(Debug)]
pub struct Driver<S: ChainSyncer = EngineChainSyncer> {
    /// The observable L1 chain state.
    state: Arc<State>,
    /// Component responsible for applying the L1 view to the L2 engine.
    syncer: S,
    /// The periodic protocol status reporter.
    reporter: Option<StatusReporter>,
    /// Token stopping the state's head watcher, cancelled after the loops.
    state_cancel: CancellationToken,
    /// Handle of the state's head watcher task.
    state_watcher: Option<JoinHandle<()>>,
    /// The root cancellation token of this role.
    cancel: CancellationToken,
}

impl Driver {
    /// Create a new [`Driver`] instance from the given configuration.
    ///
    /// This is the only fatal path of the role: connectivity or protocol
    /// errors here are returned to the process owner.
    pub async fn init_from_config(
        cancel: CancellationToken,
        opts: &Opts,
        driver_opts: &DriverOpts,
    ) -> Result<Self, DriverError> {
        let l1 = ExecutionClient::new(opts.l1.el_url.clone(), opts.l1.el_ws_url.clone()).await?;
        let l2 =
            RollupExecutionClient::new(opts.l2.el_url.clone(), opts.l2.el_ws_url.clone()).await?;
        let engine = EngineClient::new(opts.l2.engine_url.clone(), opts.l2.jwt_secret);
        let inbox = RollupInbox::new(opts.l1.el_url.clone(), opts.contracts.rollup_inbox);

        let peers = l2.peer_count().await?;
        if driver_opts.p2p_sync_verified_blocks && peers == 0 {
            warn!("P2P syncing of verified blocks enabled, but the L2 engine has no peers");
        }

        let state_cancel = CancellationToken::new();
        let (state, state_watcher) = State::new(l1, state_cancel.clone()).await?;

        let syncer = EngineChainSyncer::new(l2, engine, driver_opts, cancel.clone());
        let reporter = StatusReporter::new(inbox, cancel.clone());

        Ok(Self {
            state,
            syncer,
            reporter: Some(reporter),
            state_cancel,
            state_watcher: Some(state_watcher),
            cancel,
        })
    }
}

impl<S: ChainSyncer> Driver<S> {
    /// Returns the name of this role.
    pub const fn name(&self) -> &'static str {
        "driver"
    }

    /// Start the driver's background tasks and return a handle to close them.
    pub fn start(mut self) -> DriverHandle {
        let mut tasks = TaskGroup::new();

        if let Some(reporter) = self.reporter.take() {
            tasks.spawn("protocol status reporter", reporter.run());
        }

        let cancel = self.cancel.clone();
        let state_cancel = self.state_cancel.clone();
        let state_watcher = self.state_watcher.take();

        let heads_rx = self.state.sub_l1_heads();
        info!("🛞 Starting driver event loop");
        tasks.spawn("driver event loop", self.event_loop(heads_rx));

        DriverHandle { cancel, state_cancel, state_watcher, tasks }
    }

    /// The driver's event loop.
    ///
    /// An eager sync pass runs at startup to catch up with the latest known
    /// L1 head. Afterwards, incoming heads only ever publish a token into the
    /// single-slot sync trigger, and the trigger drives the actual passes.
    /// The select is biased so that pending heads are always drained (and
    /// coalesced) before the next pass starts.
    async fn event_loop(self, mut heads_rx: broadcast::Receiver<Header>) {
        let cancel = self.cancel.clone();
        let (notifier, mut sync_notify) = notify_channel();

        self.do_sync_with_backoff().await;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                head = heads_rx.recv() => match head {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => notifier.notify(),
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("L1 head feed closed, stopping driver event loop");
                        break;
                    }
                },

                Some(()) = sync_notify.recv() => self.do_sync_with_backoff().await,
            }
        }
    }

    /// Perform a sync pass, retrying transient failures with an exponential
    /// backoff.
    async fn do_sync_with_backoff(&self) {
        let this = self;
        let result = retry(exponential_backoff(), || async move {
            this.do_sync().await.map_err(|e| {
                warn!(error = ?e, "Sync attempt failed, retrying");
                backoff::Error::transient(e)
            })
        })
        .await;

        if let Err(e) = result {
            error!(error = ?e, "Sync L2 execution engine's block chain error");
        }
    }

    /// Read the current L1 head snapshot and delegate to the chain syncer.
    async fn do_sync(&self) -> Result<(), DriverError> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let Some(l1_head) = self.state.l1_head() else {
            debug!("No L1 head observed yet, skipping sync pass");
            return Ok(());
        };

        self.syncer.sync(l1_head).await?;

        Ok(())
    }
}

/// A handle over a started [`Driver`], used to shut it down.
#[derive(Debug)]
pub struct DriverHandle {
    cancel: CancellationToken,
    state_cancel: CancellationToken,
    state_watcher: Option<JoinHandle<()>>,
    tasks: TaskGroup,
}

impl DriverHandle {
    /// Cancel the driver's tasks and wait for them to drain. The state's
    /// head feed is only torn down after the loops that consume it.
    pub async fn close(self) {
        self.cancel.cancel();
        self.tasks.join_all().await;

        self.state_cancel.cancel();
        if let Some(watcher) = self.state_watcher {
            let _ = watcher.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use tokio::sync::Semaphore;

    use super::*;

    /// A [`ChainSyncer`] that counts sync passes and holds each one until
    /// the test releases a permit.
    struct GatedSyncer {
        calls: Arc<AtomicUsize>,
        gate: Arc<Semaphore>,
    }

    impl ChainSyncer for GatedSyncer {
        async fn sync(&self, _l1_head: Header) -> Result<(), SyncerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            Ok(())
        }
    }

    fn test_header(number: u64) -> Header {
        Header {
            inner: alloy::consensus::Header { number, ..Default::default() },
            ..Default::default()
        }
    }

    fn test_driver(
        state: Arc<State>,
        syncer: GatedSyncer,
        cancel: CancellationToken,
    ) -> Driver<GatedSyncer> {
        Driver {
            state,
            syncer,
            reporter: None,
            state_cancel: CancellationToken::new(),
            state_watcher: None,
            cancel,
        }
    }

    /// Short cooperative pause that lets the event loop task run.
    async fn breathe() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn heads_arriving_during_a_sync_coalesce_into_one_pass() {
        let state = State::detached();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let cancel = CancellationToken::new();

        let syncer = GatedSyncer { calls: Arc::clone(&calls), gate: Arc::clone(&gate) };
        let heads_rx = state.sub_l1_heads();
        state.on_new_head(test_header(1));

        let driver = test_driver(Arc::clone(&state), syncer, cancel.clone());
        let event_loop = tokio::spawn(driver.event_loop(heads_rx));

        // The eager startup sync runs first and blocks on the gate.
        breathe().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Deliver a burst of heads while the sync pass is still running.
        for number in 2..=10 {
            state.on_new_head(test_header(number));
        }

        // Release the startup sync: the burst must collapse into exactly one
        // follow-up pass.
        gate.add_permits(1);
        breathe().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // No further passes happen without new heads.
        gate.add_permits(1);
        breathe().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A head arriving after the quiescent point triggers a fresh pass.
        state.on_new_head(test_header(11));
        breathe().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        cancel.cancel();
        gate.add_permits(10);
        event_loop.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_token_stops_the_event_loop() {
        let state = State::detached();
        let calls = Arc::new(AtomicUsize::new(0));
        // Open gate: sync passes complete immediately.
        let gate = Arc::new(Semaphore::new(100));
        let cancel = CancellationToken::new();

        let syncer = GatedSyncer { calls: Arc::clone(&calls), gate };
        let heads_rx = state.sub_l1_heads();

        let driver = test_driver(state, syncer, cancel.clone());
        let event_loop = tokio::spawn(driver.event_loop(heads_rx));

        breathe().await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), event_loop)
            .await
            .expect("event loop should exit after cancellation")
            .unwrap();
    }
}
