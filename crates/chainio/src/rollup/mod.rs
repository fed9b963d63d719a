/// Rollup inbox contract bindings and wrappers.
pub mod inbox;

/// ABI encoding of proof evidence payloads.
pub mod evidence;
