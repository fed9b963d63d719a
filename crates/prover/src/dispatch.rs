use argo_primitives::BlockId;

/// Restricts which proposal ids this prover instance dispatches, letting
/// two instances split the work by block id parity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum ParityFilter {
    /// Dispatch every proposal.
    #[default]
    None,
    /// Only dispatch proposals with an even block id.
    EvenOnly,
    /// Only dispatch proposals with an odd block id.
    OddOnly,
}

/// Why a proposal event was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipReason {
    /// The proposal was already dispatched in this session.
    AlreadyHandled,
    /// The parity filter excludes odd block ids.
    OddBlockId,
    /// The parity filter excludes even block ids.
    EvenBlockId,
}

/// The prover's replay cursor.
///
/// Tracks the L1 height up to which proposal events have been processed and
/// the highest proposal id already dispatched. Only the event-loop task
/// mutates this state, which is what makes dispatch strictly ordered.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DispatchCursor {
    /// All proposal events up to and including this L1 block are processed.
    l1_current: u64,
    /// The highest proposal id already handed to a submitter.
    last_handled_block_id: BlockId,
}

impl DispatchCursor {
    /// The L1 height event replay should resume from.
    pub(crate) const fn l1_current(&self) -> u64 {
        self.l1_current
    }

    /// Overwrite the replay height, used when recovering the cursor at startup.
    pub(crate) const fn set_l1_current(&mut self, height: u64) {
        self.l1_current = height;
    }

    /// Decide whether the given proposal id should be skipped.
    pub(crate) fn check(&self, id: BlockId, parity: ParityFilter) -> Option<SkipReason> {
        if id <= self.last_handled_block_id {
            return Some(SkipReason::AlreadyHandled);
        }

        match parity {
            ParityFilter::EvenOnly if id % 2 != 0 => Some(SkipReason::OddBlockId),
            ParityFilter::OddOnly if id % 2 == 0 => Some(SkipReason::EvenBlockId),
            _ => None,
        }
    }

    /// Declare responsibility for the given proposal: move the replay height
    /// to the event's L1 block and record the id as handled. Must happen
    /// before the proving work is spawned.
    pub(crate) const fn advance(&mut self, l1_block_number: u64, id: BlockId) {
        self.l1_current = l1_block_number;
        self.last_handled_block_id = id;
    }
}

/// Where the replay cursor starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorSource {
    /// Start from the protocol's genesis L1 height.
    Genesis(u64),
    /// Start from the L1 origin of the given proposal id.
    OriginOf(BlockId),
}

/// Resolve where the replay cursor starts, given an optional configured
/// starting id and the protocol state.
pub(crate) fn cursor_source(
    starting_block_id: Option<BlockId>,
    latest_verified_id: BlockId,
    genesis_height: u64,
) -> CursorSource {
    match starting_block_id {
        Some(id) => CursorSource::OriginOf(id),
        None if latest_verified_id == 0 => CursorSource::Genesis(genesis_height),
        None => CursorSource::OriginOf(latest_verified_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replayed_ids_are_skipped_and_fresh_ids_dispatch() {
        let mut cursor = DispatchCursor::default();
        cursor.advance(90, 4);

        // Stream [5, 6, 5]: the two fresh ids dispatch, the replay is skipped.
        assert_eq!(cursor.check(5, ParityFilter::None), None);
        cursor.advance(100, 5);

        assert_eq!(cursor.check(6, ParityFilter::None), None);
        cursor.advance(101, 6);

        assert_eq!(cursor.check(5, ParityFilter::None), Some(SkipReason::AlreadyHandled));
        assert_eq!(cursor.last_handled_block_id, 6);
    }

    #[test]
    fn dispatched_ids_are_strictly_increasing() {
        let mut cursor = DispatchCursor::default();
        let mut dispatched = vec![];

        for id in [3u64, 1, 3, 4, 2, 7, 7, 9] {
            if cursor.check(id, ParityFilter::None).is_none() {
                cursor.advance(id * 10, id);
                dispatched.push(id);
            }
        }

        assert_eq!(dispatched, vec![3, 4, 7, 9]);
        assert!(dispatched.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn l1_current_never_decreases_over_an_ascending_replay() {
        let mut cursor = DispatchCursor::default();
        cursor.set_l1_current(50);

        let mut previous = cursor.l1_current();
        for (l1_block, id) in [(60u64, 1u64), (60, 2), (75, 3), (90, 4)] {
            if cursor.check(id, ParityFilter::None).is_none() {
                cursor.advance(l1_block, id);
            }
            assert!(cursor.l1_current() >= previous);
            previous = cursor.l1_current();
        }
    }

    #[test]
    fn even_parity_filter_never_dispatches_odd_ids() {
        let cursor = DispatchCursor::default();

        for id in 1u64..=20 {
            let skip = cursor.check(id, ParityFilter::EvenOnly);
            if id % 2 == 0 {
                assert_eq!(skip, None);
            } else {
                assert_eq!(skip, Some(SkipReason::OddBlockId));
            }
        }
    }

    #[test]
    fn odd_parity_filter_never_dispatches_even_ids() {
        let cursor = DispatchCursor::default();

        for id in 1u64..=20 {
            let skip = cursor.check(id, ParityFilter::OddOnly);
            if id % 2 == 1 {
                assert_eq!(skip, None);
            } else {
                assert_eq!(skip, Some(SkipReason::EvenBlockId));
            }
        }
    }

    #[test]
    fn cursor_starts_at_genesis_when_nothing_verified() {
        let source = cursor_source(None, 0, 100);
        assert_eq!(source, CursorSource::Genesis(100));
    }

    #[test]
    fn cursor_starts_at_origin_of_latest_verified_block() {
        let source = cursor_source(None, 7, 100);
        assert_eq!(source, CursorSource::OriginOf(7));
    }

    #[test]
    fn configured_starting_id_takes_precedence() {
        let source = cursor_source(Some(42), 7, 100);
        assert_eq!(source, CursorSource::OriginOf(42));
    }
}
