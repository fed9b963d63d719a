use alloy::primitives::Address;
use alloy_rpc_types_engine::JwtSecret;
use clap::Parser;
use url::Url;

/// L1-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct L1Opts {
    /// The URL of the L1 execution client HTTP connection
    #[clap(long = "l1.el-url", env = "ARGO_L1_EXECUTION_URL", id = "l1-el-url")]
    pub el_url: Url,
    /// The URL of the L1 execution client WebSocket connection
    #[clap(long = "l1.el-ws-url", env = "ARGO_L1_EXECUTION_WS_URL", id = "l1-el-ws-url")]
    pub el_ws_url: Url,
}

/// L2-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct L2Opts {
    /// The URL of the L2 execution client HTTP connection
    #[clap(long = "l2.el-url", env = "ARGO_L2_EXECUTION_URL", id = "l2-el-url")]
    pub el_url: Url,
    /// The URL of the L2 execution client WebSocket connection
    #[clap(long = "l2.el-ws-url", env = "ARGO_L2_EXECUTION_WS_URL", id = "l2-el-ws-url")]
    pub el_ws_url: Url,
    /// The URL of the L2 engine API HTTP connection
    #[clap(long = "l2.engine-url", env = "ARGO_L2_ENGINE_URL")]
    pub engine_url: Url,
    /// The JWT secret to communicate with the L2 engine API
    #[clap(long = "l2.jwt-secret", env = "ARGO_L2_JWT_SECRET")]
    pub jwt_secret: JwtSecret,
}

/// The contract addresses required to run the client.
#[derive(Debug, Clone, Parser)]
pub struct ContractAddresses {
    /// The address of the rollup inbox contract on L1
    #[clap(long = "contracts.rollup-inbox", env = "ARGO_ROLLUP_INBOX")]
    pub rollup_inbox: Address,
    /// The address of the rollup anchor contract on L2
    #[clap(long = "contracts.rollup-anchor", env = "ARGO_ROLLUP_ANCHOR")]
    pub rollup_anchor: Address,
}
