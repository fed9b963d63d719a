use alloy::{
    consensus::{Transaction as _, TxEnvelope},
    rlp::Decodable,
};
use argo_chainio::rollup::inbox::IRollupInbox::ProtocolConfig;
use argo_primitives::BlockId;
use tracing::debug;

/// The outcome of classifying a proposed block's transaction list.
///
/// Anything other than [`TxListHint::Ok`] means the block must be proven
/// *invalid*; the hint itself is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxListHint {
    /// The transaction list is well-formed.
    Ok,
    /// The raw byte list exceeds the protocol maximum.
    BinaryTooLarge,
    /// The bytes do not RLP-decode into a list of transactions.
    BinaryNotDecodable,
    /// The list carries more transactions than a block may include.
    TooManyTransactions,
    /// The sum of transaction gas limits exceeds the block gas limit.
    BlockGasLimitExceeded,
    /// A transaction carries less gas than the protocol minimum.
    TxGasLimitTooSmall,
    /// A transaction targets a different chain.
    InvalidChainId,
}

/// Classifies the transaction list embedded in a block proposal against the
/// protocol limits.
#[derive(Debug, Clone)]
pub(crate) struct TxListValidator {
    block_max_gas_limit: u64,
    max_transactions_per_block: u64,
    max_bytes_per_tx_list: u64,
    min_tx_gas_limit: u64,
    chain_id: u64,
}

impl TxListValidator {
    /// Creates a new [`TxListValidator`] from the protocol configuration.
    pub(crate) fn new(config: &ProtocolConfig, chain_id: u64) -> Self {
        Self {
            block_max_gas_limit: config.blockMaxGasLimit.to(),
            max_transactions_per_block: config.maxTransactionsPerBlock.to(),
            max_bytes_per_tx_list: config.maxBytesPerTxList.to(),
            min_tx_gas_limit: config.minTxGasLimit.to(),
            chain_id,
        }
    }

    /// Classify the given raw transaction list.
    pub(crate) fn validate(&self, block_id: BlockId, tx_list: &[u8]) -> TxListHint {
        if tx_list.len() as u64 > self.max_bytes_per_tx_list {
            return TxListHint::BinaryTooLarge;
        }

        let Ok(txs) = Vec::<TxEnvelope>::decode(&mut &tx_list[..]) else {
            return TxListHint::BinaryNotDecodable;
        };

        debug!(block_id, txs = txs.len(), "Decoded transaction list");

        if txs.len() as u64 > self.max_transactions_per_block {
            return TxListHint::TooManyTransactions;
        }

        let mut sum_gas_limit = 0u64;
        for tx in &txs {
            if tx.gas_limit() < self.min_tx_gas_limit {
                return TxListHint::TxGasLimitTooSmall;
            }
            sum_gas_limit = sum_gas_limit.saturating_add(tx.gas_limit());

            if let Some(chain_id) = tx.chain_id() {
                if chain_id != self.chain_id {
                    return TxListHint::InvalidChainId;
                }
            }
        }

        if sum_gas_limit > self.block_max_gas_limit {
            return TxListHint::BlockGasLimitExceeded;
        }

        TxListHint::Ok
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        consensus::{Signed, TxLegacy},
        rlp,
    };
    use alloy_primitives::{Address, B256, Signature, U256};

    use super::*;

    const CHAIN_ID: u64 = 167;

    fn validator() -> TxListValidator {
        TxListValidator {
            block_max_gas_limit: 1_000_000,
            max_transactions_per_block: 4,
            max_bytes_per_tx_list: 10_000,
            min_tx_gas_limit: 21_000,
            chain_id: CHAIN_ID,
        }
    }

    fn legacy_tx(gas_limit: u64, chain_id: Option<u64>) -> TxEnvelope {
        let tx = TxLegacy {
            chain_id,
            nonce: 0,
            gas_price: 1,
            gas_limit,
            to: Address::ZERO.into(),
            value: U256::ZERO,
            input: Default::default(),
        };

        let signature = Signature::new(U256::from(1), U256::from(1), false);
        TxEnvelope::Legacy(Signed::new_unchecked(tx, signature, B256::ZERO))
    }

    fn encode_list(txs: &[TxEnvelope]) -> Vec<u8> {
        rlp::encode(txs)
    }

    #[test]
    fn well_formed_list_is_ok() {
        let txs = vec![legacy_tx(21_000, Some(CHAIN_ID)), legacy_tx(50_000, Some(CHAIN_ID))];
        assert_eq!(validator().validate(1, &encode_list(&txs)), TxListHint::Ok);
    }

    #[test]
    fn empty_list_is_ok() {
        assert_eq!(validator().validate(1, &encode_list(&[])), TxListHint::Ok);
    }

    #[test]
    fn garbage_bytes_are_not_decodable() {
        let hint = validator().validate(1, &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(hint, TxListHint::BinaryNotDecodable);
    }

    #[test]
    fn oversized_payload_is_rejected_before_decoding() {
        let bytes = vec![0u8; 10_001];
        assert_eq!(validator().validate(1, &bytes), TxListHint::BinaryTooLarge);
    }

    #[test]
    fn too_many_transactions_are_rejected() {
        let txs = vec![legacy_tx(21_000, Some(CHAIN_ID)); 5];
        assert_eq!(validator().validate(1, &encode_list(&txs)), TxListHint::TooManyTransactions);
    }

    #[test]
    fn block_gas_limit_is_enforced_over_the_sum() {
        let txs = vec![legacy_tx(600_000, Some(CHAIN_ID)), legacy_tx(600_000, Some(CHAIN_ID))];
        assert_eq!(validator().validate(1, &encode_list(&txs)), TxListHint::BlockGasLimitExceeded);
    }

    #[test]
    fn tiny_transaction_gas_limit_is_rejected() {
        let txs = vec![legacy_tx(20_999, Some(CHAIN_ID))];
        assert_eq!(validator().validate(1, &encode_list(&txs)), TxListHint::TxGasLimitTooSmall);
    }

    #[test]
    fn foreign_chain_id_is_rejected() {
        let txs = vec![legacy_tx(21_000, Some(CHAIN_ID + 1))];
        assert_eq!(validator().validate(1, &encode_list(&txs)), TxListHint::InvalidChainId);
    }

    #[test]
    fn pre_eip155_transactions_skip_the_chain_id_check() {
        let txs = vec![legacy_tx(21_000, None)];
        assert_eq!(validator().validate(1, &encode_list(&txs)), TxListHint::Ok);
    }
}
