use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

/// A per-L2-block record mapping an L2 block back to the L1 block that
/// proposed it. Served by the L2 execution engine under the `rollup_`
/// RPC namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Origin {
    /// The proposal id of the L2 block.
    pub block_id: U256,
    /// The hash of the L2 block.
    pub l2_block_hash: B256,
    /// The height of the L1 block that proposed this L2 block.
    pub l1_block_height: U256,
    /// The hash of the L1 block that proposed this L2 block.
    pub l1_block_hash: B256,
    /// Whether the L2 block is a throwaway invalidation block.
    #[serde(default)]
    pub throwaway: bool,
}

impl L1Origin {
    /// The proposal id as a `u64`.
    pub fn block_id(&self) -> u64 {
        self.block_id.to()
    }

    /// The L1 height that proposed this block as a `u64`.
    pub fn l1_height(&self) -> u64 {
        self.l1_block_height.to()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l1_origin_deserializes_without_throwaway_flag() {
        let raw = r#"{
            "blockId": "0x7",
            "l2BlockHash": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "l1BlockHeight": "0x200",
            "l1BlockHash": "0x0202020202020202020202020202020202020202020202020202020202020202"
        }"#;

        let origin: L1Origin = serde_json::from_str(raw).unwrap();
        assert_eq!(origin.block_id(), 7);
        assert_eq!(origin.l1_height(), 512);
        assert!(!origin.throwaway);
    }
}
