use IRollupInbox::{
    ForkChoice, IRollupInboxErrors, IRollupInboxInstance, ProtocolConfig, StateVariables,
};
use alloy::{
    contract::Result as ContractResult,
    providers::ProviderBuilder,
    rpc::{
        client::ClientBuilder,
        types::{Filter, TransactionReceipt},
    },
    signers::local::PrivateKeySigner,
    sol,
};
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::Error as SolError;
use argo_primitives::{retries::DEFAULT_RETRY_LAYER, summary::Summary};
use derive_more::derive::Deref;
use url::Url;

use crate::{DefaultProvider, ProofTxProvider, new_proof_tx_provider, try_parse_contract_error};

/// A read-only wrapper over the rollup inbox contract, exposing the
/// protocol reads and event filters the client roles need.
#[derive(Debug, Clone, Deref)]
pub struct RollupInbox(IRollupInboxInstance<DefaultProvider>);

impl RollupInbox {
    /// Create a new read-only `RollupInbox` instance at the given address.
    pub fn new<U: Into<Url>>(el_client_url: U, address: Address) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(el_client_url.into());
        let provider = ProviderBuilder::new().connect_client(client);

        Self(IRollupInboxInstance::new(address, provider))
    }

    /// Retrieves the protocol configuration.
    pub async fn get_config(&self) -> ContractResult<ProtocolConfig> {
        match self.0.getConfig().call().await {
            Ok(config) => Ok(config),
            Err(err) => {
                let decoded = try_parse_contract_error::<IRollupInboxErrors>(err)?;
                Err(SolError::custom(format!("{decoded:?}")).into())
            }
        }
    }

    /// Retrieves the protocol state variables.
    pub async fn get_state_variables(&self) -> ContractResult<StateVariables> {
        match self.0.getStateVariables().call().await {
            Ok(vars) => Ok(vars),
            Err(err) => {
                let decoded = try_parse_contract_error::<IRollupInboxErrors>(err)?;
                Err(SolError::custom(format!("{decoded:?}")).into())
            }
        }
    }

    /// Retrieves the fork choice record for the given (block id, parent hash) pair.
    pub async fn get_fork_choice(&self, id: u64, parent_hash: B256) -> ContractResult<ForkChoice> {
        self.0.getForkChoice(U256::from(id), parent_hash).call().await
    }

    /// Returns a log [`Filter`] matching `BlockProposed` events of this inbox.
    pub fn block_proposed_filter(&self) -> Filter {
        self.0.BlockProposed_filter().filter
    }

    /// Returns a log [`Filter`] matching `BlockVerified` events of this inbox.
    pub fn block_verified_filter(&self) -> Filter {
        self.0.BlockVerified_filter().filter
    }
}

/// A wallet-backed wrapper over the rollup inbox contract, used to submit
/// proof transactions.
#[derive(Debug, Clone, Deref)]
pub struct RollupInboxWriter(IRollupInboxInstance<ProofTxProvider>);

impl RollupInboxWriter {
    /// Create a new `RollupInboxWriter` instance at the given address,
    /// signing transactions with the given wallet.
    pub fn new<U: Into<Url>>(el_client_url: U, address: Address, wallet: PrivateKeySigner) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(el_client_url.into());
        let provider = new_proof_tx_provider(client, wallet);

        Self(IRollupInboxInstance::new(address, provider))
    }

    /// Submit a validity proof for the given block.
    pub async fn prove_block(
        &self,
        block_id: u64,
        inputs: Vec<Bytes>,
    ) -> ContractResult<TransactionReceipt> {
        match self.0.proveBlock(U256::from(block_id), inputs).send().await {
            Ok(pending) => Ok(pending.get_receipt().await?),
            Err(err) => {
                let decoded = try_parse_contract_error::<IRollupInboxErrors>(err)?;
                Err(SolError::custom(format!("{decoded:?}")).into())
            }
        }
    }

    /// Submit an invalidity proof for the given block.
    pub async fn prove_block_invalid(
        &self,
        block_id: u64,
        inputs: Vec<Bytes>,
    ) -> ContractResult<TransactionReceipt> {
        match self.0.proveBlockInvalid(U256::from(block_id), inputs).send().await {
            Ok(pending) => Ok(pending.get_receipt().await?),
            Err(err) => {
                let decoded = try_parse_contract_error::<IRollupInboxErrors>(err)?;
                Err(SolError::custom(format!("{decoded:?}")).into())
            }
        }
    }
}

impl ForkChoice {
    /// Returns true if no prover has submitted a proof for this fork choice yet.
    pub fn is_unproven(&self) -> bool {
        self.prover == Address::ZERO
    }
}

impl IRollupInbox::BlockProposed {
    /// The proposal id of this event as a `u64`.
    pub fn block_id(&self) -> u64 {
        self.id.to()
    }
}

impl IRollupInbox::BlockVerified {
    /// The proposal id of this event as a `u64`.
    pub fn block_id(&self) -> u64 {
        self.id.to()
    }

    /// A zero block hash marks the block as verified *invalid*.
    pub fn is_invalid(&self) -> bool {
        self.blockHash == B256::ZERO
    }
}

impl Summary for IRollupInbox::BlockProposed {
    fn summary(&self) -> String {
        format!(
            "id: {}, l1 height: {}, beneficiary: {}, gas limit: {}, timestamp: {}, tx list hash: {:?}",
            self.meta.id,
            self.meta.l1Height,
            self.meta.beneficiary,
            self.meta.gasLimit,
            self.meta.timestamp,
            self.meta.txListHash,
        )
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface IRollupInbox {
        error RI_ALREADY_PROVEN();
        error RI_BLOCK_NOT_FOUND();
        error RI_CANNOT_BE_FIRST_PROPOSAL();
        error RI_HALTED();
        error RI_ID_MISMATCH();
        error RI_INVALID_EVIDENCE();
        error RI_INVALID_PARAMS();
        error RI_INVALID_PROOF();
        error RI_NOT_PROVEABLE();
        error RI_TOO_LATE();
        error Error(string);

        /// @dev Metadata assigned to a block at proposal time. Everything a
        /// prover needs to reconstruct the proposed block offchain.
        #[derive(Default)]
        struct BlockMetadata {
            uint256 id;
            uint256 l1Height;
            bytes32 l1Hash;
            address beneficiary;
            bytes32 txListHash;
            bytes32 mixHash;
            bytes extraData;
            uint64 gasLimit;
            uint64 timestamp;
        }

        /// @dev Records which prover first proved a (block, parent) pair.
        #[derive(Copy, Default)]
        struct ForkChoice {
            bytes32 blockHash;
            address prover;
            uint64 provenAt;
        }

        #[derive(Default)]
        struct ProtocolConfig {
            uint256 chainId;
            uint256 maxNumBlocks;
            uint256 blockMaxGasLimit;
            uint256 maxTransactionsPerBlock;
            uint256 maxBytesPerTxList;
            uint256 minTxGasLimit;
            uint256 anchorTxGasLimit;
        }

        #[derive(Copy, Default)]
        struct StateVariables {
            uint64 genesisHeight;
            uint64 latestVerifiedHeight;
            uint64 latestVerifiedId;
            uint64 nextBlockId;
        }

        /// @dev The contract-side layout of an L2 block header, checked
        /// against the proof's public inputs.
        #[derive(Default)]
        struct EvidenceHeader {
            bytes32 parentHash;
            bytes32 ommersHash;
            address beneficiary;
            bytes32 stateRoot;
            bytes32 transactionsRoot;
            bytes32 receiptsRoot;
            bytes32[8] logsBloom;
            uint256 difficulty;
            uint128 height;
            uint64 gasLimit;
            uint64 gasUsed;
            uint64 timestamp;
            bytes extraData;
            bytes32 mixHash;
            uint64 nonce;
            uint256 baseFeePerGas;
        }

        /// @dev The payload both proof submission entrypoints expect as
        /// their first ABI-encoded input.
        #[derive(Default)]
        struct Evidence {
            BlockMetadata meta;
            EvidenceHeader header;
            address prover;
            bytes[] proofs;
        }

        #[derive(Default)]
        event BlockProposed(uint256 indexed id, BlockMetadata meta);

        #[derive(Default)]
        event BlockVerified(uint256 indexed id, bytes32 blockHash);

        /// @notice Retrieves the protocol configuration.
        function getConfig() public view returns (ProtocolConfig memory);

        /// @notice Retrieves the protocol state variables.
        function getStateVariables() public view returns (StateVariables memory);

        /// @notice Retrieves the fork choice for the given block and parent hash.
        function getForkChoice(uint256 id, bytes32 parentHash) public view returns (ForkChoice memory);

        /// @notice Proves that the given proposed block is valid.
        /// @param blockId The proposal id of the block.
        /// @param inputs ABI-encoded Evidence, followed by circuit-specific extras.
        function proveBlock(uint256 blockId, bytes[] calldata inputs) external;

        /// @notice Proves that the given proposed block is invalid.
        /// @param blockId The proposal id of the block.
        /// @param inputs ABI-encoded Evidence, followed by circuit-specific extras.
        function proveBlockInvalid(uint256 blockId, bytes[] calldata inputs) external;
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn fork_choice_zero_prover_is_unproven() {
        let fc = ForkChoice::default();
        assert!(fc.is_unproven());

        let fc = ForkChoice {
            prover: Address::from_str("0x00000000000000000000000000000000000000aa").unwrap(),
            ..Default::default()
        };
        assert!(!fc.is_unproven());
    }

    #[test]
    fn block_verified_zero_hash_is_invalid() {
        let event = IRollupInbox::BlockVerified { id: U256::from(3), blockHash: B256::ZERO };
        assert!(event.is_invalid());

        let event =
            IRollupInbox::BlockVerified { id: U256::from(3), blockHash: B256::repeat_byte(1) };
        assert!(!event.is_invalid());
    }

    /// This test is ignored because it requires a local devnet running.
    /// It is still useful for manually inspecting protocol state.
    #[ignore]
    #[tokio::test]
    async fn test_get_state_variables_devnet() {
        let inbox = RollupInbox::new(
            Url::parse("http://localhost:8545").unwrap(),
            Address::from_str("0x9fCF7D13d10dEdF17d0f24C62f0cf4ED462f65b7").unwrap(),
        );

        let vars = inbox.get_state_variables().await.unwrap();
        println!("state variables: {vars:?}");
    }
}
