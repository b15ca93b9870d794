use crate::client::request;
use crate::utils::Quantity;
use crate::{Block, Dialect, RpcClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Solana-style node (also Velas): blocks are addressed by slot
pub struct SolanaDialect;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolanaBlock {
    block_height: Quantity,
    block_time: Option<i64>,
    blockhash: Option<String>,
    previous_blockhash: Option<String>,
    parent_slot: Option<u64>,
}

#[derive(Deserialize)]
struct HealthReply {
    result: Option<Value>,
}

impl SolanaDialect {
    async fn block(&self, rpc: &RpcClient, target: &str, slot: u64) -> eyre::Result<Block> {
        let params = json!([
            slot,
            {
                "encoding": "json",
                "maxSupportedTransactionVersion": 0,
                "transactionDetails": "none",
                "rewards": false
            }
        ]);
        let block: SolanaBlock = rpc.call(target, "getBlock", params).await?;
        Ok(Block {
            number: block.block_height,
            timestamp: block.block_time,
            hash: block.blockhash,
            parent_hash: block.previous_blockhash,
            parent_slot: block.parent_slot,
        })
    }
}

#[async_trait]
impl Dialect for SolanaDialect {
    async fn latest_block(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Block> {
        let slot: u64 = rpc.call(target, "getSlot", json!([])).await?;
        self.block(rpc, target, slot).await
    }

    async fn previous_block(
        &self,
        rpc: &RpcClient,
        target: &str,
        latest: &Block,
    ) -> eyre::Result<Block> {
        let parent_slot = latest
            .parent_slot
            .ok_or_else(|| eyre::eyre!("latest block has no parent slot"))?;
        self.block(rpc, target, parent_slot).await
    }

    /// `getHealth` answers `"result":"ok"` only when the node is synced;
    /// otherwise the envelope carries an `error` member instead.
    async fn is_syncing(&self, rpc: &RpcClient, target: &str) -> eyre::Result<bool> {
        let reply: HealthReply = rpc.post(target, &request("getHealth", json!([]))).await?;
        Ok(reply.result.as_ref().and_then(Value::as_str) != Some("ok"))
    }
}
