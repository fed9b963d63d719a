#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Argo prover
//!
//! The prover watches the rollup inbox for proposed blocks, classifies each
//! embedded transaction list, schedules bounded-concurrency proving jobs and
//! submits the resulting validity or invalidity proofs back to the contract.

/// The main prover module with the core event loop.
mod prover;
pub use prover::{Prover, ProverError, ProverHandle};

/// The proposal dispatch cursor and its skip rules.
mod dispatch;

/// The contract event replay primitive.
mod iterator;

/// The proof producer backends.
mod producer;

/// The valid and invalid proof submitters.
mod submitter;

/// The transaction list validator.
mod validator;

/// The metrics for the prover.
mod metrics;
