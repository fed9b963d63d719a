use alloy::rpc::types::Header;
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolValue;

use super::inbox::IRollupInbox::{BlockMetadata, Evidence, EvidenceHeader};

impl Evidence {
    /// Assemble the evidence payload for a proof submission.
    pub fn new(meta: BlockMetadata, header: &Header, prover: Address, proof: Bytes) -> Self {
        Self { meta, header: encode_block_header(header), prover, proofs: vec![proof] }
    }

    /// ABI-encode the evidence into the first `inputs` entry of a proof
    /// submission transaction.
    pub fn abi_encode_input(&self) -> Bytes {
        self.abi_encode().into()
    }
}

/// Flatten an execution header into the contract's `EvidenceHeader` layout.
pub fn encode_block_header(header: &Header) -> EvidenceHeader {
    EvidenceHeader {
        parentHash: header.parent_hash,
        ommersHash: header.ommers_hash,
        beneficiary: header.beneficiary,
        stateRoot: header.state_root,
        transactionsRoot: header.transactions_root,
        receiptsRoot: header.receipts_root,
        logsBloom: bloom_to_words(header.logs_bloom.as_slice()),
        difficulty: header.difficulty,
        height: header.number.into(),
        gasLimit: header.gas_limit,
        gasUsed: header.gas_used,
        timestamp: header.timestamp,
        extraData: header.extra_data.clone(),
        mixHash: header.mix_hash,
        nonce: u64::from_be_bytes(header.nonce.0),
        baseFeePerGas: U256::from(header.base_fee_per_gas.unwrap_or_default()),
    }
}

/// Split the 256-byte logs bloom into the eight 32-byte words the contract
/// stores it as.
fn bloom_to_words(bloom: &[u8]) -> [B256; 8] {
    let mut words = [B256::ZERO; 8];
    for (i, chunk) in bloom.chunks(32).enumerate().take(8) {
        words[i] = B256::from_slice(chunk);
    }
    words
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{B64, Bloom};

    use super::*;

    fn test_header() -> Header {
        Header {
            inner: alloy::consensus::Header {
                parent_hash: B256::repeat_byte(1),
                beneficiary: Address::repeat_byte(2),
                logs_bloom: Bloom::repeat_byte(0xab),
                number: 42,
                gas_limit: 30_000_000,
                gas_used: 21_000,
                timestamp: 1_700_000_000,
                nonce: B64::from([0, 0, 0, 0, 0, 0, 1, 0]),
                base_fee_per_gas: Some(7),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn header_fields_map_into_evidence_layout() {
        let header = test_header();
        let encoded = encode_block_header(&header);

        assert_eq!(encoded.parentHash, B256::repeat_byte(1));
        assert_eq!(encoded.beneficiary, Address::repeat_byte(2));
        assert_eq!(encoded.height, 42u128);
        assert_eq!(encoded.gasLimit, 30_000_000);
        assert_eq!(encoded.nonce, 256);
        assert_eq!(encoded.baseFeePerGas, U256::from(7));
    }

    #[test]
    fn bloom_splits_into_eight_words() {
        let bloom = Bloom::repeat_byte(0xab);
        let words = bloom_to_words(bloom.as_slice());

        assert_eq!(words.len(), 8);
        for word in words {
            assert_eq!(word, B256::repeat_byte(0xab));
        }
    }

    #[test]
    fn evidence_round_trips_through_abi_encoding() {
        let meta = BlockMetadata { id: U256::from(9), gasLimit: 5_000_000, ..Default::default() };
        let evidence =
            Evidence::new(meta, &test_header(), Address::repeat_byte(3), Bytes::from_static(&[1]));

        let encoded = evidence.abi_encode_input();
        let decoded = Evidence::abi_decode(&encoded).unwrap();

        assert_eq!(decoded.meta.id, U256::from(9));
        assert_eq!(decoded.prover, Address::repeat_byte(3));
        assert_eq!(decoded.proofs.len(), 1);
        assert_eq!(decoded.header.height, 42u128);
    }
}
