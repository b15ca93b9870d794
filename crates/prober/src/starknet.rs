use crate::evm::SyncStatus;
use crate::utils::Quantity;
use crate::{Block, Dialect, RpcClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Starknet JSON-RPC node
pub struct StarknetDialect;

#[derive(Deserialize)]
struct StarknetBlock {
    block_number: Quantity,
    timestamp: Option<Quantity>,
    block_hash: Option<String>,
    parent_hash: Option<String>,
}

impl StarknetDialect {
    async fn block(&self, rpc: &RpcClient, target: &str, block_id: Value) -> eyre::Result<Block> {
        let block: StarknetBlock = rpc
            .call(target, "starknet_getBlockWithTxHashes", json!([block_id]))
            .await?;
        Ok(Block {
            number: block.block_number,
            timestamp: block.timestamp.map(|ts| ts.unix_secs()).transpose()?,
            hash: block.block_hash,
            parent_hash: block.parent_hash,
            parent_slot: None,
        })
    }
}

#[async_trait]
impl Dialect for StarknetDialect {
    async fn latest_block(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Block> {
        self.block(rpc, target, json!("latest")).await
    }

    async fn previous_block(
        &self,
        rpc: &RpcClient,
        target: &str,
        latest: &Block,
    ) -> eyre::Result<Block> {
        let parent = latest
            .parent_hash
            .as_deref()
            .ok_or_else(|| eyre::eyre!("latest block has no parent hash"))?;
        self.block(rpc, target, json!({ "block_hash": parent })).await
    }

    async fn is_syncing(&self, rpc: &RpcClient, target: &str) -> eyre::Result<bool> {
        let status: SyncStatus = rpc.call(target, "starknet_syncing", json!([])).await?;
        Ok(status.is_syncing(false))
    }
}
