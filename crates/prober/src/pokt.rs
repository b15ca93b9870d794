use crate::utils::Quantity;
use crate::{Block, Dialect, RpcClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Pocket Network node. Only the chain height is available: no timestamp,
/// no hashes, no previous block and no sync RPC.
pub struct PoktDialect;

#[derive(Deserialize)]
struct HeightResult {
    height: Quantity,
}

impl PoktDialect {
    async fn height(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Quantity> {
        let url = format!("{}/v1/query/height", target.trim_end_matches('/'));
        let result: HeightResult = rpc.post(&url, &json!({ "height": 0 })).await?;
        Ok(result.height)
    }
}

#[async_trait]
impl Dialect for PoktDialect {
    async fn latest_block(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Block> {
        let height = self.height(rpc, target).await?;
        Ok(Block {
            number: height,
            timestamp: None,
            hash: None,
            parent_hash: None,
            parent_slot: None,
        })
    }

    fn has_previous(&self) -> bool {
        false
    }

    /// A node answering the height query with a non-zero height is synced
    async fn is_syncing(&self, rpc: &RpcClient, target: &str) -> eyre::Result<bool> {
        Ok(self.height(rpc, target).await?.value == 0)
    }
}
