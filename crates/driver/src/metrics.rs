use metrics::{counter, gauge};

#[derive(Debug, Clone, Copy)]
pub(crate) struct DriverMetrics;

impl DriverMetrics {
    /// Sets the L1 execution client head (aka: latest block number)
    pub(crate) fn set_l1_head_number(value: u64) {
        counter!("driver_l1_head_number").absolute(value);
    }

    /// Sets the latest verified block id reported by the protocol
    pub(crate) fn set_latest_verified_id(value: u64) {
        counter!("driver_latest_verified_id").absolute(value);
    }

    /// Sets the latest verified block height reported by the protocol
    pub(crate) fn set_latest_verified_height(value: u64) {
        counter!("driver_latest_verified_height").absolute(value);
    }

    /// Sets the amount of proposed blocks still awaiting verification
    pub(crate) fn set_pending_blocks(value: u64) {
        gauge!("driver_pending_blocks").set(value as f64);
    }

    /// Sets the amount of proposal slots left in the protocol ring buffer
    pub(crate) fn set_available_slots(value: u64) {
        gauge!("driver_available_slots").set(value as f64);
    }
}
