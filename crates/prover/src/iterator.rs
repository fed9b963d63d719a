use std::{marker::PhantomData, ops::ControlFlow};

use alloy::{
    providers::Provider,
    rpc::types::{Filter, Log},
    transports::TransportError,
};
use alloy_sol_types::SolEvent;
use argo_clients::execution::ExecutionClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// How many L1 blocks each `eth_getLogs` call covers during a replay.
const BLOCKS_PER_FETCH: u64 = 1_000;

/// A replay primitive over contract events.
///
/// Reads events of type `T` from `start_height` up to the chain head
/// observed when the iteration starts, in ascending (L1 height, log index)
/// order, and hands each one to the callback. Iteration is single-threaded
/// across events; the callback may spawn background work, and may stop the
/// replay early by returning [`ControlFlow::Break`].
#[derive(Debug)]
pub(crate) struct EventIterator<T> {
    client: ExecutionClient,
    filter: Filter,
    start_height: u64,
    cancel: CancellationToken,
    _event: PhantomData<T>,
}

impl<T: SolEvent> EventIterator<T> {
    /// Creates a new [`EventIterator`] replaying from the given L1 height.
    pub(crate) fn new(
        client: ExecutionClient,
        filter: Filter,
        start_height: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self { client, filter, start_height, cancel, _event: PhantomData }
    }

    /// Run the replay to completion.
    ///
    /// Returns when the range is exhausted, the callback broke out, or the
    /// token was cancelled. The chain head is snapshotted once at call time;
    /// blocks arriving during the replay are left to the next replay.
    pub(crate) async fn iterate<F, E>(self, mut on_event: F) -> Result<(), E>
    where
        F: AsyncFnMut(Log, T) -> Result<ControlFlow<()>, E>,
        E: From<TransportError>,
    {
        let head = self.client.get_head().await?;
        debug!(start = self.start_height, head, "Replaying contract events");

        for (from, to) in block_ranges(self.start_height, head, BLOCKS_PER_FETCH) {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let filter = self.filter.clone().from_block(from).to_block(to);
            let mut logs = self.client.get_logs(&filter).await?;
            logs.sort_by_key(|log| (log.block_number, log.log_index));

            for log in logs {
                let event = match log.log_decode::<T>() {
                    Ok(decoded) => decoded.into_inner().data,
                    Err(e) => {
                        error!(topic0 = ?log.topic0(), error = %e, "Error decoding replayed event");
                        continue;
                    }
                };

                if on_event(log, event).await?.is_break() {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

/// Split `[start, head]` into inclusive ranges of at most `step` blocks.
fn block_ranges(start: u64, head: u64, step: u64) -> Vec<(u64, u64)> {
    let mut ranges = vec![];
    let mut from = start;

    while from <= head {
        let to = from.saturating_add(step - 1).min(head);
        ranges.push((from, to));

        let Some(next) = to.checked_add(1) else { break };
        from = next;
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_range() {
        assert_eq!(block_ranges(100, 100, 1_000), vec![(100, 100)]);
    }

    #[test]
    fn range_splits_into_fixed_chunks() {
        assert_eq!(block_ranges(0, 2_500, 1_000), vec![(0, 999), (1_000, 1_999), (2_000, 2_500)]);
    }

    #[test]
    fn exact_multiple_of_step() {
        assert_eq!(block_ranges(0, 1_999, 1_000), vec![(0, 999), (1_000, 1_999)]);
    }

    #[test]
    fn start_beyond_head_yields_nothing() {
        assert!(block_ranges(200, 100, 1_000).is_empty());
    }

    #[test]
    fn ranges_cover_the_whole_span_without_overlap() {
        let ranges = block_ranges(17, 5_432, 1_000);

        assert_eq!(ranges.first().unwrap().0, 17);
        assert_eq!(ranges.last().unwrap().1, 5_432);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0);
        }
    }
}
