use jsonrpsee::proc_macros::rpc;
use serde::{Deserialize, Serialize};

/// Sentinel for values the dialect cannot provide (no timestamp, skipped phase)
pub const NOT_DEFINED: i64 = -1;

/// Sentinel for values whose measurement failed
pub const ERROR: i64 = -2;

/// Independent failure categories of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    LastBlock,
    PrevBlock,
    Syncing,
    Uncaught,
}

impl Failure {
    pub const ALL: [Failure; 4] = [
        Failure::LastBlock,
        Failure::PrevBlock,
        Failure::Syncing,
        Failure::Uncaught,
    ];

    /// Prime factor of the category in the legacy `probe_success` scalar
    pub const fn factor(self) -> u64 {
        match self {
            Failure::LastBlock => 2,
            Failure::PrevBlock => 3,
            Failure::Syncing => 5,
            Failure::Uncaught => 7,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Failure::LastBlock => 1,
            Failure::PrevBlock => 1 << 1,
            Failure::Syncing => 1 << 2,
            Failure::Uncaught => 1 << 3,
        }
    }
}

/// Set of failure categories recorded during a probe.
///
/// Kept as flags internally; [`ProbeStatus::code`] gives the composite
/// scalar where every failed category contributes its prime factor, so a
/// code of exactly 1 means nothing failed and membership is a divisibility
/// test.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u64", from = "u64")]
pub struct ProbeStatus(u8);

impl ProbeStatus {
    pub fn record(&mut self, failure: Failure) {
        self.0 |= failure.bit();
    }

    pub fn has(&self, failure: Failure) -> bool {
        self.0 & failure.bit() != 0
    }

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = Failure> + '_ {
        Failure::ALL.into_iter().filter(|f| self.has(*f))
    }

    pub fn code(&self) -> u64 {
        self.failures().map(Failure::factor).product()
    }

    /// Decode a composite scalar. Factors other than the four category
    /// primes are ignored.
    pub fn from_code(code: u64) -> Self {
        let mut status = Self::default();
        if code == 0 {
            return status;
        }
        for failure in Failure::ALL {
            if code % failure.factor() == 0 {
                status.record(failure);
            }
        }
        status
    }
}

impl From<ProbeStatus> for u64 {
    fn from(status: ProbeStatus) -> Self {
        status.code()
    }
}

impl From<u64> for ProbeStatus {
    fn from(code: u64) -> Self {
        ProbeStatus::from_code(code)
    }
}

/// Outcome of one probe phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Phase<T> {
    Measured(T),
    /// The dialect has no such concept
    Skipped,
    Failed,
}

impl<T> Phase<T> {
    pub fn measured(&self) -> Option<&T> {
        match self {
            Phase::Measured(value) => Some(value),
            _ => None,
        }
    }

    /// Sentinel to report for every field of a phase that was not measured
    pub fn sentinel(&self) -> Option<i64> {
        match self {
            Phase::Measured(_) => None,
            Phase::Skipped => Some(NOT_DEFINED),
            Phase::Failed => Some(ERROR),
        }
    }
}

/// Normalized block header fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    /// Seconds since the block timestamp, `None` when the dialect has no timestamp
    pub age: Option<i64>,
    pub hash: Option<String>,
    pub parent_hash: Option<String>,
    pub duration_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncInfo {
    pub is_syncing: bool,
    pub duration_ns: u64,
}

/// Normalized result of probing one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub last_block: Phase<BlockInfo>,
    pub prev_block: Phase<BlockInfo>,
    pub syncing: Phase<SyncInfo>,
    pub status: ProbeStatus,
    pub total_duration_ns: u64,
}

impl ProbeRecord {
    /// Record where every phase is invalid, used when dispatch itself failed
    pub fn uncaught() -> Self {
        let mut status = ProbeStatus::default();
        status.record(Failure::Uncaught);
        let mut record = Self {
            last_block: Phase::Failed,
            prev_block: Phase::Failed,
            syncing: Phase::Failed,
            status,
            total_duration_ns: 0,
        };
        record.invalidate();
        record
    }

    /// Replace the data of every flagged category with `Phase::Failed`.
    /// An uncaught failure invalidates every phase but keeps its own flag
    /// only, so the code stays decodable.
    pub fn invalidate(&mut self) {
        let uncaught = self.status.has(Failure::Uncaught);
        if uncaught || self.status.has(Failure::LastBlock) {
            self.last_block = Phase::Failed;
        }
        if uncaught || self.status.has(Failure::PrevBlock) {
            self.prev_block = Phase::Failed;
        }
        if uncaught || self.status.has(Failure::Syncing) {
            self.syncing = Phase::Failed;
        }
    }
}

/// JSON-RPC API exposing the probe cycle
#[rpc(server, client, namespace = "prober")]
pub trait ProberApi {
    /// Probe `target` using the dialect registered for `chain_id`
    #[method(name = "probe")]
    async fn probe(
        &self,
        target: String,
        chain_id: String,
    ) -> Result<ProbeRecord, jsonrpsee::types::ErrorObjectOwned>;
}
