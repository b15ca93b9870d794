use crate::utils::Quantity;
use crate::{Block, Dialect, RpcClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// NEAR JSON-RPC node
pub struct NearDialect;

#[derive(Deserialize)]
struct NearBlock {
    header: Header,
}

#[derive(Deserialize)]
struct Header {
    height: Quantity,
    /// Nanoseconds since the epoch
    timestamp: Option<Quantity>,
    hash: Option<String>,
    prev_hash: Option<String>,
}

#[derive(Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    syncing: bool,
}

impl NearDialect {
    async fn block(&self, rpc: &RpcClient, target: &str, params: Value) -> eyre::Result<Block> {
        let block: NearBlock = rpc.call(target, "block", params).await?;
        let header = block.header;
        Ok(Block {
            number: header.height,
            timestamp: header
                .timestamp
                .map(|ns| (ns.value / 1_000_000_000) as i64),
            hash: header.hash,
            parent_hash: header.prev_hash,
            parent_slot: None,
        })
    }
}

#[async_trait]
impl Dialect for NearDialect {
    async fn latest_block(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Block> {
        self.block(rpc, target, json!({ "finality": "final" })).await
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
            .ok_or_else(|| eyre::eyre!("latest block has no prev_hash"))?;
        self.block(rpc, target, json!({ "block_id": parent })).await
    }

    async fn is_syncing(&self, rpc: &RpcClient, target: &str) -> eyre::Result<bool> {
        let status: StatusResult = rpc.call(target, "status", json!([])).await?;
        Ok(status.sync_info.syncing)
    }
}
