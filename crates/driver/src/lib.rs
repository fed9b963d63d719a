#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Argo driver
//!
//! The driver keeps the local L2 execution engine's chain in sync with what
//! the rollup inbox contract says is canonical, by driving the chain syncer
//! on every L1 head change.

/// The main driver module with the core event loop.
mod driver;
pub use driver::{Driver, DriverHandle};

/// The observable L1 chain state and its head feed.
mod state;
pub use state::State;

/// The chain syncer seam, responsible for applying the canonical L1 view
/// to the local L2 execution engine.
mod sync;
pub use sync::{ChainSyncer, EngineChainSyncer, SyncerError};

/// The periodic protocol status reporter.
mod status;

/// The metrics for the driver.
mod metrics;
