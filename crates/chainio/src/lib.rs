#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Chain I/O module to interact with the rollup protocol contracts.

use alloy::{
    contract::Error as ContractError,
    network::EthereumWallet,
    providers::{
        RootProvider,
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            SimpleNonceManager, WalletFiller,
        },
        utils::JoinedRecommendedFillers,
    },
    rpc::client::RpcClient,
    signers::local::PrivateKeySigner,
};
use alloy_sol_types::SolInterface;

/// Rollup protocol contract bindings.
pub mod rollup;

/// Alias to the default provider with all recommended fillers (read-only).
pub type DefaultProvider = FillProvider<JoinedRecommendedFillers, RootProvider>;

/// Alias to the fill stack used for proof submission transactions: the
/// recommended fillers, but with a simple (non-caching) nonce manager.
///
/// Proof transactions for one prover identity are serialised behind a mutex,
/// so the nonce must be re-read from the node for every transaction rather
/// than cached across submissions that may have raced on other machines.
pub type ProofTxFillers = JoinFill<
    JoinFill<
        GasFiller,
        JoinFill<BlobGasFiller, JoinFill<NonceFiller<SimpleNonceManager>, ChainIdFiller>>,
    >,
    WalletFiller<EthereumWallet>,
>;

/// Alias to the wallet provider used for proof submission transactions.
pub type ProofTxProvider = FillProvider<ProofTxFillers, RootProvider>;

/// Build a wallet provider with a simple nonce manager on top of the given
/// RPC client. The fill stack has to be assembled by hand because the
/// recommended fillers hardcode the cached nonce manager.
pub fn new_proof_tx_provider(rpc_client: RpcClient, wallet: PrivateKeySigner) -> ProofTxProvider {
    let fillers = JoinFill::new(
        GasFiller,
        JoinFill::new(
            BlobGasFiller::default(),
            JoinFill::new(
                NonceFiller::new(SimpleNonceManager::default()),
                ChainIdFiller::default(),
            ),
        ),
    );

    FillProvider::new(
        RootProvider::new(rpc_client),
        JoinFill::new(fillers, WalletFiller::new(wallet.into())),
    )
}

/// Try to decode a contract error into a specific Solidity error interface.
/// If the error cannot be decoded, or it is not a contract error at all,
/// the original error is returned untouched.
pub fn try_parse_contract_error<I: SolInterface>(error: ContractError) -> Result<I, ContractError> {
    error.as_decoded_interface_error::<I>().ok_or(error)
}
