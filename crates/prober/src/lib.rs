use async_trait::async_trait;
use prober_api::BlockInfo;

pub use prober_api::{Failure, Phase, ProbeRecord, ProbeStatus, SyncInfo, ERROR, NOT_DEFINED};

/// One chain-protocol family's view of a node: how to fetch its latest
/// block, the block before it and its sync status.
#[async_trait]
pub trait Dialect: Send + Sync {
    async fn latest_block(&self, rpc: &RpcClient, target: &str) -> eyre::Result<Block>;

    /// Whether the dialect can address the block preceding the latest one
    fn has_previous(&self) -> bool {
        true
    }

    async fn previous_block(
        &self,
        _rpc: &RpcClient,
        _target: &str,
        _latest: &Block,
    ) -> eyre::Result<Block> {
        eyre::bail!("previous block is not available for this dialect")
    }

    /// `true` while the node is still catching up with the chain head
    async fn is_syncing(&self, rpc: &RpcClient, target: &str) -> eyre::Result<bool>;
}

/// Block header fields extracted from a dialect-specific reply
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub number: Quantity,
    /// Unix seconds
    pub timestamp: Option<i64>,
    pub hash: Option<String>,
    pub parent_hash: Option<String>,
    /// Slot of the parent block for slot-addressed chains
    pub parent_slot: Option<u64>,
}

impl Block {
    pub fn info(&self, duration_ns: u64, now: i64) -> BlockInfo {
        BlockInfo {
            number: self.number.value,
            age: self.timestamp.and_then(|ts| now.checked_sub(ts)),
            hash: self.hash.clone(),
            parent_hash: self.parent_hash.clone(),
            duration_ns,
        }
    }
}

pub mod client;
pub mod cosmos;
pub mod evm;
pub mod exposition;
pub mod near;
pub mod pokt;
pub mod probe;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod solana;
pub mod starknet;
mod utils;

pub use client::RpcClient;
pub use cosmos::CosmosDialect;
pub use evm::EvmDialect;
pub use near::NearDialect;
pub use pokt::PoktDialect;
pub use probe::Prober;
pub use registry::{Protocol, Route};
pub use server::ProbeServer;
pub use solana::SolanaDialect;
pub use starknet::StarknetDialect;
pub use utils::{Quantity, Radix};

#[cfg(test)]
mod tests {
    use super::*;

    fn block(timestamp: Option<i64>) -> Block {
        Block {
            number: Quantity::decimal(7),
            timestamp,
            hash: None,
            parent_hash: None,
            parent_slot: None,
        }
    }

    #[test]
    fn test_block_age() {
        assert_eq!(block(Some(90)).info(0, 100).age, Some(10));
        assert_eq!(block(None).info(0, 100).age, None);
        assert_eq!(block(Some(i64::MIN)).info(0, 100).age, None);
    }
}
