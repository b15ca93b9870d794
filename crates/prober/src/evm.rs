use crate::utils::Quantity;
use crate::{Block, Dialect, RpcClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Ethereum-style JSON-RPC node (`eth_getBlockByNumber`, `eth_syncing`).
/// Also the fallback for chains without a dedicated dialect.
pub struct EvmDialect {
    lenient_sync: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvmBlock {
    number: Quantity,
    timestamp: Option<Quantity>,
    hash: Option<String>,
    parent_hash: Option<String>,
}

impl TryFrom<EvmBlock> for Block {
    type Error = eyre::Error;

    fn try_from(block: EvmBlock) -> eyre::Result<Self> {
        Ok(Block {
            number: block.number,
            timestamp: block.timestamp.map(|ts| ts.unix_secs()).transpose()?,
            hash: block.hash,
            parent_hash: block.parent_hash,
            parent_slot: None,
        })
    }
}

/// Reply of `eth_syncing` and its dialect variants: `false`, or a progress
/// object in camelCase or snake_case
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SyncStatus {
    Flag(bool),
    Progress(SyncProgress),
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyncProgress {
    #[serde(rename = "currentBlock", alias = "current_block_num")]
    current: Option<Quantity>,
    #[serde(rename = "highestBlock", alias = "highest_block_num")]
    highest: Option<Quantity>,
}

impl SyncStatus {
    /// With `lenient`, a node reporting a highest block of zero counts as synced.
    pub(crate) fn is_syncing(&self, lenient: bool) -> bool {
        match self {
            SyncStatus::Flag(syncing) => *syncing,
            SyncStatus::Progress(progress) => match (&progress.current, &progress.highest) {
                (_, Some(highest)) if lenient && highest.value == 0 => false,
                (Some(current), Some(highest)) => current.value != highest.value,
                _ => true,
            },
        }
    }
}

impl EvmDialect {
    pub const fn new() -> Self {
        Self {
            lenient_sync: false,
        }
    }

    pub const fn lenient() -> Self {
        Self { lenient_sync: true }
    }

    async fn block_by_number(&self, rpc: &RpcClient, target: &str, tag: &str) -> eyre::Result<Block> {
        let block: EvmBlock = rpc
            .call(target, "eth_getBlockByNumber", json!([tag, false]))
            .await?;
        block.try_into()
    }
}

impl Default for EvmDialect {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialect for EvmDialect {
    async fn latest_block(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Block> {
        self.block_by_number(rpc, target, "latest").await
    }

    async fn previous_block(
        &self,
        rpc: &RpcClient,
        target: &str,
        latest: &Block,
    ) -> eyre::Result<Block> {
        let number = latest
            .number
            .value
            .checked_sub(1)
            .ok_or_else(|| eyre::eyre!("latest block is genesis"))?;
        self.block_by_number(rpc, target, &latest.number.encode(number))
            .await
    }

    async fn is_syncing(&self, rpc: &RpcClient, target: &str) -> eyre::Result<bool> {
        let status: SyncStatus = rpc.call(target, "eth_syncing", json!([])).await?;
        Ok(status.is_syncing(self.lenient_sync))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(value: serde_json::Value) -> SyncStatus {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sync_false_is_synced() {
        assert!(!status(json!(false)).is_syncing(false));
    }

    #[test]
    fn test_sync_progress_equal_heads() {
        let synced = status(json!({"currentBlock": "0x64", "highestBlock": "0x64"}));
        assert!(!synced.is_syncing(false));

        let behind = status(json!({"currentBlock": "0x63", "highestBlock": "0x64"}));
        assert!(behind.is_syncing(false));
    }

    #[test]
    fn test_sync_snake_case_progress() {
        let synced = status(json!({"current_block_num": 10, "highest_block_num": "10"}));
        assert!(!synced.is_syncing(false));
    }

    #[test]
    fn test_lenient_zero_highest_block() {
        let zero = status(json!({"currentBlock": "0x5", "highestBlock": "0x0"}));
        assert!(zero.is_syncing(false));
        assert!(!zero.is_syncing(true));
    }

    #[test]
    fn test_unknown_progress_object_is_syncing() {
        assert!(status(json!({"startingBlock": "0x1"})).is_syncing(false));
    }

    #[test]
    fn test_block_fields_decimal_numbers() {
        let block: EvmBlock = serde_json::from_value(json!({
            "number": "100",
            "timestamp": 96,
            "hash": "0xaa",
            "parentHash": "0xbb"
        }))
        .unwrap();
        let block: Block = block.try_into().unwrap();
        assert_eq!(block.number.value, 100);
        assert_eq!(block.number.encode(99), "99");
        assert_eq!(block.timestamp, Some(96));
        assert_eq!(block.parent_hash.as_deref(), Some("0xbb"));
    }
}
