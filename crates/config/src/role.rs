use alloy::signers::local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use url::Url;

/// The role this process runs.
#[derive(Debug, Clone, Subcommand)]
pub enum RoleOpts {
    /// Keep the local L2 execution engine in sync with the rollup inbox.
    Driver(DriverOpts),
    /// Watch for proposed blocks, generate proofs and submit them.
    Prover(ProverOpts),
}

/// Driver-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct DriverOpts {
    /// Whether to let the L2 engine sync verified blocks from its P2P network
    /// before deriving from L1
    #[clap(
        long = "driver.p2p-sync-verified-blocks",
        env = "ARGO_P2P_SYNC_VERIFIED_BLOCKS",
        default_value_t = false
    )]
    pub p2p_sync_verified_blocks: bool,
    /// How long to wait for the P2P sync before falling back to L1 derivation,
    /// in seconds
    #[clap(long = "driver.p2p-sync-timeout", env = "ARGO_P2P_SYNC_TIMEOUT", default_value_t = 600)]
    pub p2p_sync_timeout_secs: u64,
    /// The private key used to build throwaway invalidation blocks
    #[clap(
        long = "driver.throwaway-blocks-builder-private-key",
        env = "ARGO_THROWAWAY_BLOCKS_BUILDER_PRIVATE_KEY"
    )]
    pub throwaway_blocks_builder_private_key: Option<PrivateKeySigner>,
}

/// Prover-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct ProverOpts {
    /// The private key identifying this prover on L1
    #[clap(long = "prover.private-key", env = "ARGO_PROVER_PRIVATE_KEY")]
    pub l1_prover_private_key: PrivateKeySigner,
    /// The private key used to sign proof submission transactions.
    /// Defaults to the prover private key.
    #[clap(long = "prover.proof-submitter-private-key", env = "ARGO_PROOF_SUBMITTER_PRIVATE_KEY")]
    pub proof_submitter_private_key: Option<PrivateKeySigner>,
    /// The maximum number of proving jobs running concurrently
    #[clap(
        long = "prover.max-concurrent-proving-jobs",
        env = "ARGO_MAX_CONCURRENT_PROVING_JOBS",
        default_value_t = 8
    )]
    pub max_concurrent_proving_jobs: usize,
    /// The proposal id to start proving from. If unset, the cursor is
    /// recovered from the latest verified block
    #[clap(long = "prover.starting-block-id", env = "ARGO_STARTING_BLOCK_ID")]
    pub starting_block_id: Option<u64>,
    /// Use the dummy (oracle) proof producer instead of a proving backend
    #[clap(long = "prover.dummy", env = "ARGO_DUMMY_PROVER", default_value_t = false)]
    pub dummy: bool,
    /// The URL of the zkEVM rpcd proving backend
    #[clap(long = "prover.zkevm-rpcd-endpoint", env = "ARGO_ZKEVM_RPCD_ENDPOINT")]
    pub zkevm_rpcd_endpoint: Option<Url>,
    /// The path to the zkEVM circuit parameters file, as seen by the rpcd
    #[clap(long = "prover.zkevm-rpcd-params-path", env = "ARGO_ZKEVM_RPCD_PARAMS_PATH")]
    pub zkevm_rpcd_params_path: Option<String>,
    /// Lower bound of the random dummy proof delay, in seconds
    #[clap(
        long = "prover.random-dummy-proof-delay-lower-bound",
        env = "ARGO_RANDOM_DUMMY_PROOF_DELAY_LOWER_BOUND"
    )]
    pub random_dummy_proof_delay_lower_bound: Option<u64>,
    /// Upper bound of the random dummy proof delay, in seconds
    #[clap(
        long = "prover.random-dummy-proof-delay-upper-bound",
        env = "ARGO_RANDOM_DUMMY_PROOF_DELAY_UPPER_BOUND"
    )]
    pub random_dummy_proof_delay_upper_bound: Option<u64>,
    /// Only dispatch proposals with an even block id
    #[clap(
        long = "prover.only-prove-even-number-blocks",
        env = "ARGO_ONLY_PROVE_EVEN_NUMBER_BLOCKS",
        default_value_t = false
    )]
    pub only_prove_even_number_blocks: bool,
    /// Only dispatch proposals with an odd block id
    #[clap(
        long = "prover.only-prove-odd-number-blocks",
        env = "ARGO_ONLY_PROVE_ODD_NUMBER_BLOCKS",
        default_value_t = false
    )]
    pub only_prove_odd_number_blocks: bool,
}
