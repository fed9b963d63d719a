#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! JSON-RPC clients for the L1 and L2 endpoints used by the Argo roles.

/// Execution layer clients (HTTP + WebSocket).
pub mod execution;

/// JWT-authenticated L2 engine client.
pub mod engine;
