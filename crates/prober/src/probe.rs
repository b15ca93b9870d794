use crate::registry::Route;
use crate::utils::elapsed_ns;
use crate::{Block, Dialect, RpcClient};
use prober_api::{BlockInfo, Failure, Phase, ProbeRecord, ProbeStatus, SyncInfo};
use std::future::Future;
use std::time::Instant;

/// Runs one health probe of one endpoint. Stateless: every call re-runs all
/// phases and nothing is shared between concurrent probes.
#[derive(Clone)]
pub struct Prober {
    rpc: RpcClient,
}

async fn timed<T>(fut: impl Future<Output = T>) -> (T, u64) {
    let start = Instant::now();
    let out = fut.await;
    (out, elapsed_ns(start))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Prober {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Probe `target` with the dialect registered for `chain_id`. Never
    /// fails: every failure is reported through the record's status.
    pub async fn probe(&self, target: &str, chain_id: &str) -> ProbeRecord {
        let start = Instant::now();

        let mut record = match self.run(target, chain_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Caught exception probing {} ({}): {:#}", target, chain_id, e);
                ProbeRecord::uncaught()
            }
        };
        record.invalidate();
        record.total_duration_ns = elapsed_ns(start);

        tracing::debug!(
            "Probed {} ({}) with status {}",
            target,
            chain_id,
            record.status.code()
        );
        record
    }

    async fn run(&self, target: &str, chain_id: &str) -> eyre::Result<ProbeRecord> {
        let route = Route::for_chain(chain_id);
        let target = route.target(target)?;
        let dialect = route.dialect();
        let rpc = &self.rpc;
        let mut status = ProbeStatus::default();

        let (latest, duration_ns) = timed(dialect.latest_block(rpc, &target)).await;
        let latest = match latest {
            Ok(block) => Some((block, duration_ns)),
            Err(e) => {
                tracing::warn!("Failed to get latest block from {}: {:#}", target, e);
                status.record(Failure::LastBlock);
                None
            }
        };

        let prev_block = self
            .previous_block(dialect, &target, latest.as_ref().map(|(b, _)| b), &mut status)
            .await;

        let (syncing, duration_ns) = timed(dialect.is_syncing(rpc, &target)).await;
        let syncing = match syncing {
            Ok(is_syncing) => Phase::Measured(SyncInfo {
                is_syncing,
                duration_ns,
            }),
            Err(e) => {
                tracing::warn!("Failed to get syncing status from {}: {:#}", target, e);
                status.record(Failure::Syncing);
                Phase::Failed
            }
        };

        let last_block = match latest {
            Some((block, duration_ns)) => Phase::Measured(block.info(duration_ns, now())),
            None => Phase::Failed,
        };

        Ok(ProbeRecord {
            last_block,
            prev_block,
            syncing,
            status,
            total_duration_ns: 0,
        })
    }

    async fn previous_block(
        &self,
        dialect: &dyn Dialect,
        target: &str,
        latest: Option<&Block>,
        status: &mut ProbeStatus,
    ) -> Phase<BlockInfo> {
        if !dialect.has_previous() {
            return Phase::Skipped;
        }
        let Some(latest) = latest else {
            tracing::warn!("Failed to get previous block from {}: latest block unknown", target);
            status.record(Failure::PrevBlock);
            return Phase::Failed;
        };

        match timed(dialect.previous_block(&self.rpc, target, latest)).await {
            (Ok(block), duration_ns) => Phase::Measured(block.info(duration_ns, now())),
            (Err(e), _) => {
                tracing::warn!("Failed to get previous block from {}: {:#}", target, e);
                status.record(Failure::PrevBlock);
                Phase::Failed
            }
        }
    }
}
