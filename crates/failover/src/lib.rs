pub mod billing;
pub mod catalog;
pub mod config;
pub mod gateway;
pub mod ledger;
pub mod oracle;
pub mod selector;

pub use billing::{billing_report, BillingRow};
pub use catalog::{Altruist, Catalog, Chain, JsonCatalog, ServingLogEntry};
pub use config::{FailoverConfig, Timeouts};
pub use gateway::{normalize_url, Gateway, PhdGateway};
pub use ledger::{record_switch, Clock, SystemClock};
pub use oracle::{HealthOracle, PrometheusOracle};
pub use selector::{rank, Candidate, ChainOutcome, CycleReport, Selector};
