use metrics_derive::Metrics;
use metrics_exporter_prometheus::PrometheusBuilder;
use prober_api::{BlockInfo, Phase, ProbeRecord, SyncInfo, NOT_DEFINED};

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Gauges of one block phase. The scope is `last_block` or `prev_block`.
#[derive(Metrics, Clone)]
#[metrics(dynamic = true)]
pub struct BlockMetrics {
    /// Block number
    #[metric(describe = "Number of the node's block")]
    pub number: metrics::Gauge,

    /// Block age
    #[metric(describe = "How many seconds old is the node's block")]
    pub age: metrics::Gauge,

    /// Request duration
    #[metric(describe = "How many nanoseconds took to get the block")]
    pub duration_ns: metrics::Gauge,
}

/// Sync gauges, built with the `node` scope. Dynamic like the block
/// gauges: a fixed scope caches its handles on the first recorder it sees.
#[derive(Metrics, Clone)]
#[metrics(dynamic = true)]
pub struct NodeMetrics {
    /// Is the node syncing
    #[metric(describe = "Is the node syncing 0/1")]
    pub syncing: metrics::Gauge,

    #[metric(describe = "How many nanoseconds took to get syncing status")]
    pub syncing_duration_ns: metrics::Gauge,
}

/// Built with the `probe` scope
#[derive(Metrics, Clone)]
#[metrics(dynamic = true)]
pub struct ProbeMetrics {
    /// Composite status, 1 on success
    #[metric(describe = "Whether the probe was successful (1 - success, >1 failure)")]
    pub success: metrics::Gauge,
}

/// Unscoped series name kept for existing dashboards
pub const TOTAL_DURATION_NS: &str = "total_duration_ns";

/// Process-wide counters of the probe server
#[derive(Metrics, Clone)]
#[metrics(scope = "prober")]
pub struct ServerMetrics {
    /// Probes served
    #[metric(describe = "Total number of probes served")]
    pub probes_total: metrics::Counter,

    /// Probes with a status other than 1
    #[metric(describe = "Total number of probes with at least one failed category")]
    pub probe_failures_total: metrics::Counter,
}

impl BlockMetrics {
    pub fn update(&self, scope: &str, phase: &Phase<BlockInfo>) {
        match phase {
            Phase::Measured(block) => {
                self.number.set(block.number as f64);
                self.age.set(block.age.unwrap_or(NOT_DEFINED) as f64);
                self.duration_ns.set(block.duration_ns as f64);
                hash_info(scope, "hash", block.hash.as_deref());
                hash_info(scope, "parent_hash", block.parent_hash.as_deref());
            }
            other => {
                let sentinel = other.sentinel().unwrap_or(NOT_DEFINED) as f64;
                self.number.set(sentinel);
                self.age.set(sentinel);
                self.duration_ns.set(sentinel);
                hash_info(scope, "hash", None);
                hash_info(scope, "parent_hash", None);
            }
        }
    }
}

impl NodeMetrics {
    pub fn update(&self, phase: &Phase<SyncInfo>) {
        match phase {
            Phase::Measured(sync) => {
                self.syncing.set(if sync.is_syncing { 1.0 } else { 0.0 });
                self.syncing_duration_ns.set(sync.duration_ns as f64);
            }
            other => {
                let sentinel = other.sentinel().unwrap_or(NOT_DEFINED) as f64;
                self.syncing.set(sentinel);
                self.syncing_duration_ns.set(sentinel);
            }
        }
    }
}

/// Info-style series: constant 1 carrying the hash as a label
fn hash_info(scope: &str, field: &str, hash: Option<&str>) {
    let hash = hash.unwrap_or("none").to_string();
    metrics::gauge!(format!("{}_{}_info", scope, field), "hash" => hash).set(1.0);
}

/// Render `record` in the Prometheus text format. Each call records into
/// its own recorder, so concurrent probes never see each other's values.
pub fn render(record: &ProbeRecord) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        BlockMetrics::new("last_block").update("last_block", &record.last_block);
        BlockMetrics::new("prev_block").update("prev_block", &record.prev_block);
        NodeMetrics::new("node").update(&record.syncing);
        ProbeMetrics::new("probe")
            .success
            .set(record.status.code() as f64);

        metrics::describe_gauge!(TOTAL_DURATION_NS, "How many nanoseconds took the whole probe");
        metrics::gauge!(TOTAL_DURATION_NS).set(record.total_duration_ns as f64);
    });

    handle.render()
}
