use metrics::{counter, gauge};

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProverMetrics;

impl ProverMetrics {
    /// Sets the id of the latest proposed block received by the prover
    pub(crate) fn set_received_proposed_block(id: u64) {
        counter!("prover_received_proposed_block").absolute(id);
    }

    /// Sets the id of the latest verified block observed by the prover
    pub(crate) fn set_latest_verified_id(id: u64) {
        counter!("prover_latest_verified_id").absolute(id);
    }

    /// Sets the amount of proposed blocks still awaiting verification
    pub(crate) fn set_pending_blocks(value: u64) {
        gauge!("prover_pending_blocks").set(value as f64);
    }

    /// Increments the amount of proofs submitted, labelled by kind
    pub(crate) fn increment_proofs_submitted(valid: bool) {
        let kind = if valid { "valid" } else { "invalid" };
        counter!("prover_proofs_submitted", "kind" => kind).increment(1);
    }
}
