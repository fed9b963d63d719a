#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Argo rollup client primitive types, utilities and constants.

/// Rollup-specific primitive types.
pub mod rollup;

/// Transport retries utilities.
pub mod retries;

/// Single-slot coalescing notification channels.
pub mod notify;

/// Utilities for summarizing objects into a string for logging purposes.
pub mod summary;

/// Utilities for handling process shutdown signals.
pub mod shutdown;

/// Utilities for handling long-running tasks.
pub mod task;

/// The identifier the rollup inbox contract assigns to each proposed block.
/// Monotonically increasing, without gaps within a chain epoch.
pub type BlockId = u64;
