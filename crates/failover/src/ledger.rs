use crate::catalog::{Altruist, Catalog, ServingLogEntry};
use chrono::{DateTime, Utc};

/// Source of "now" for the selector and the ledger
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Record that `altruist` starts serving its chain at `now`: the chain's
/// open entry is re-saved (its finish time becomes `now`) and a new entry
/// is appended for `altruist`.
///
/// The two writes are not atomic. A crash in between leaves the previous
/// entry with a stale finish time and no new entry; the next switch closes
/// whatever entry is newest.
pub async fn record_switch(
    catalog: &dyn Catalog,
    altruist: &Altruist,
    now: DateTime<Utc>,
) -> eyre::Result<ServingLogEntry> {
    if let Some(open) = catalog.open_entry(&altruist.chain_id).await? {
        catalog.touch_entry(open.id, now).await?;
    }
    catalog.append_entry(altruist, now).await
}
