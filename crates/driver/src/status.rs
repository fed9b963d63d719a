use std::time::Duration;

use argo_chainio::rollup::inbox::RollupInbox;
use argo_primitives::retries::constant_backoff;
use backoff::future::retry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::metrics::DriverMetrics;

/// The interval between two protocol status reports.
const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Time to wait before retrying a failed protocol config read at startup.
const CONFIG_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Periodically reads the protocol state variables and reports them as a
/// structured log record and a set of gauges.
#[derive(Debug)]
pub(crate) struct StatusReporter {
    inbox: RollupInbox,
    cancel: CancellationToken,
}

impl StatusReporter {
    /// Creates a new [`StatusReporter`] instance.
    pub(crate) const fn new(inbox: RollupInbox, cancel: CancellationToken) -> Self {
        Self { inbox, cancel }
    }

    /// Run the reporter until the token is cancelled.
    pub(crate) async fn run(self) {
        // The ring buffer size is a protocol constant, read it once.
        let Some(max_num_blocks) = self.read_max_num_blocks().await else {
            return;
        };

        let mut ticker = tokio::time::interval(REPORT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let vars = match self.inbox.get_state_variables().await {
                Ok(vars) => vars,
                Err(e) => {
                    error!(error = %e, "Failed to get protocol state variables");
                    continue;
                }
            };

            let pending_blocks =
                vars.nextBlockId.saturating_sub(vars.latestVerifiedId).saturating_sub(1);
            let available_slots =
                (vars.latestVerifiedId + max_num_blocks).saturating_sub(vars.nextBlockId);

            DriverMetrics::set_latest_verified_id(vars.latestVerifiedId);
            DriverMetrics::set_latest_verified_height(vars.latestVerifiedHeight);
            DriverMetrics::set_pending_blocks(pending_blocks);
            DriverMetrics::set_available_slots(available_slots);

            info!(
                latest_verified_id = vars.latestVerifiedId,
                latest_verified_height = vars.latestVerifiedHeight,
                pending_blocks,
                available_slots,
                "📖 Protocol status"
            );
        }
    }

    /// Read the protocol's `maxNumBlocks` under a constant retry policy.
    async fn read_max_num_blocks(&self) -> Option<u64> {
        let inbox = &self.inbox;
        let cancel = &self.cancel;

        let result = retry(constant_backoff(CONFIG_RETRY_DELAY), || async move {
            if cancel.is_cancelled() {
                return Err(backoff::Error::permanent(None));
            }

            inbox
                .get_config()
                .await
                .map(|config| config.maxNumBlocks.to::<u64>())
                .map_err(|e| backoff::Error::transient(Some(e)))
        })
        .await;

        match result {
            Ok(max_num_blocks) => Some(max_num_blocks),
            Err(e) => {
                if let Some(e) = e {
                    error!(error = %e, "Failed to read protocol config");
                }
                None
            }
        }
    }
}
