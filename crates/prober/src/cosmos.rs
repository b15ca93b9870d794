use crate::utils::Quantity;
use crate::{Block, Dialect, RpcClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Cosmos node implementation (uses the Tendermint/CometBFT REST RPC)
pub struct CosmosDialect;

#[derive(Deserialize)]
struct BlockResult {
    block_id: BlockId,
    block: CosmosBlock,
}

#[derive(Deserialize)]
struct BlockId {
    hash: Option<String>,
}

#[derive(Deserialize)]
struct CosmosBlock {
    header: Header,
}

#[derive(Deserialize)]
struct Header {
    height: Quantity,
    time: DateTime<Utc>,
    last_block_id: Option<BlockId>,
}

#[derive(Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    catching_up: bool,
}

#[derive(Deserialize)]
struct ApiResult<T> {
    result: T,
}

impl CosmosDialect {
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        rpc: &RpcClient,
        target: &str,
        endpoint: &str,
    ) -> eyre::Result<T> {
        let url = format!("{}/{}", target.trim_end_matches('/'), endpoint);
        let result: ApiResult<T> = rpc.get(&url).await?;
        Ok(result.result)
    }

    async fn block(&self, rpc: &RpcClient, target: &str, endpoint: &str) -> eyre::Result<Block> {
        let result: BlockResult = self.get(rpc, target, endpoint).await?;
        let header = result.block.header;
        Ok(Block {
            number: header.height,
            timestamp: Some(header.time.timestamp()),
            hash: result.block_id.hash,
            parent_hash: header.last_block_id.and_then(|id| id.hash),
            parent_slot: None,
        })
    }
}

#[async_trait]
impl Dialect for CosmosDialect {
    async fn latest_block(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Block> {
        self.block(rpc, target, "block").await
    }

    async fn previous_block(
        &self,
        rpc: &RpcClient,
        target: &str,
        latest: &Block,
    ) -> eyre::Result<Block> {
        let height = latest
            .number
            .value
            .checked_sub(1)
            .ok_or_else(|| eyre::eyre!("latest block is genesis"))?;
        self.block(rpc, target, &format!("block?height={}", height))
            .await
    }

    async fn is_syncing(&self, rpc: &RpcClient, target: &str) -> eyre::Result<bool> {
        let status: StatusResult = self.get(rpc, target, "status").await?;
        Ok(status.sync_info.catching_up)
    }
}
