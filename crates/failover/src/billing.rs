use crate::catalog::{Catalog, ServingLogEntry};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Served time of one altruist within the report range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingRow {
    pub url: String,
    pub chain_id: String,
    pub owner: Option<String>,
    pub total_duration_secs: i64,
    /// Percentage of the chain's served time, `None` when the chain served
    /// nothing in the range
    pub total_ratio: Option<f64>,
    pub total_altruists: usize,
    pub preferred_altruists: usize,
}

/// Midnight UTC of the first day of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Midnight UTC of a `YYYY-MM-DD` date
pub fn parse_day(day: &str) -> eyre::Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| eyre::eyre!("Invalid date {:?}: {}", day, e))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn served_in<'a>(
    log: &'a [ServingLogEntry],
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
) -> impl Iterator<Item = &'a ServingLogEntry> {
    log.iter()
        .filter(move |e| e.start_time >= start && e.start_time <= finish)
}

/// Served seconds per altruist for entries started in `[start, finish]`
pub async fn billing_report(
    catalog: &dyn Catalog,
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
    preferred_domain: Option<&str>,
) -> eyre::Result<Vec<BillingRow>> {
    let altruists = catalog.altruists().await?;
    let log = catalog.serving_log().await?;

    let mut by_altruist: HashMap<u64, i64> = HashMap::new();
    let mut by_chain: HashMap<&str, i64> = HashMap::new();
    for entry in served_in(&log, start, finish) {
        *by_altruist.entry(entry.altruist_id).or_default() += entry.duration_secs();
        *by_chain.entry(entry.chain_id.as_str()).or_default() += entry.duration_secs();
    }

    let domain = preferred_domain
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase);
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for altruist in &altruists {
        let (total, preferred) = counts.entry(altruist.chain_id.as_str()).or_default();
        *total += 1;
        if domain
            .as_deref()
            .is_some_and(|d| altruist.url.to_lowercase().contains(d))
        {
            *preferred += 1;
        }
    }

    Ok(altruists
        .iter()
        .map(|altruist| {
            let total_duration_secs = by_altruist.get(&altruist.id).copied().unwrap_or(0);
            let chain_total = by_chain
                .get(altruist.chain_id.as_str())
                .copied()
                .unwrap_or(0);
            let (total_altruists, preferred_altruists) = counts
                .get(altruist.chain_id.as_str())
                .copied()
                .unwrap_or_default();

            BillingRow {
                url: altruist.url.clone(),
                chain_id: altruist.chain_id.clone(),
                owner: altruist.owner.clone(),
                total_duration_secs,
                total_ratio: (chain_total != 0)
                    .then(|| 100.0 * total_duration_secs as f64 / chain_total as f64),
                total_altruists,
                preferred_altruists,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::JsonCatalog;
    use crate::ledger::{record_switch, tests::ManualClock, Clock};
    use chrono::Duration;

    #[test]
    fn test_dates() {
        let now = parse_day("2024-03-17").unwrap() + Duration::hours(5);
        assert_eq!(month_start(now), parse_day("2024-03-01").unwrap());
        assert!(parse_day("17/03/2024").is_err());
    }

    #[tokio::test]
    async fn test_report_shares() {
        let clock = ManualClock::new();
        let catalog = JsonCatalog::in_memory();
        catalog.add_chain("0021", "Ethereum").await.unwrap();
        catalog.add_chain("0001", "Pocket").await.unwrap();
        let a = catalog
            .add_altruist("0021", "https://a.example.com", Some("alice".into()))
            .await
            .unwrap();
        let b = catalog
            .add_altruist("0021", "https://b.Chains.example.org", Some("bob".into()))
            .await
            .unwrap();
        catalog
            .add_altruist("0001", "https://pokt.example.com", None)
            .await
            .unwrap();

        let start = clock.now();
        record_switch(&catalog, &a, clock.now()).await.unwrap();
        clock.advance(Duration::seconds(300));
        record_switch(&catalog, &b, clock.now()).await.unwrap();
        clock.advance(Duration::seconds(100));
        record_switch(&catalog, &a, clock.now()).await.unwrap();

        let rows = billing_report(&catalog, start, clock.now(), Some("chains.example.org"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);

        let row_a = rows.iter().find(|r| r.url == "https://a.example.com").unwrap();
        assert_eq!(row_a.total_duration_secs, 300);
        assert_eq!(row_a.total_ratio, Some(75.0));
        assert_eq!(row_a.owner.as_deref(), Some("alice"));
        assert_eq!(row_a.total_altruists, 2);
        assert_eq!(row_a.preferred_altruists, 1);

        let row_b = rows.iter().find(|r| r.chain_id == "0021" && r.url != row_a.url).unwrap();
        assert_eq!(row_b.total_duration_secs, 100);
        assert_eq!(row_b.total_ratio, Some(25.0));

        let pokt = rows.iter().find(|r| r.chain_id == "0001").unwrap();
        assert_eq!(pokt.total_duration_secs, 0);
        assert_eq!(pokt.total_ratio, None);
        assert_eq!(pokt.total_altruists, 1);
    }

    #[tokio::test]
    async fn test_range_is_by_start_time() {
        let clock = ManualClock::new();
        let catalog = JsonCatalog::in_memory();
        catalog.add_chain("0021", "Ethereum").await.unwrap();
        let a = catalog
            .add_altruist("0021", "https://a.example.com", None)
            .await
            .unwrap();
        let b = catalog
            .add_altruist("0021", "https://b.example.com", None)
            .await
            .unwrap();

        record_switch(&catalog, &a, clock.now()).await.unwrap();
        clock.advance(Duration::seconds(60));
        let later = clock.now();
        record_switch(&catalog, &b, clock.now()).await.unwrap();
        clock.advance(Duration::seconds(60));
        record_switch(&catalog, &a, clock.now()).await.unwrap();

        let rows = billing_report(&catalog, later, clock.now(), None)
            .await
            .unwrap();
        let row_a = rows.iter().find(|r| r.url == "https://a.example.com").unwrap();
        assert_eq!(row_a.total_duration_secs, 0);
        assert_eq!(row_a.preferred_altruists, 0);
        let row_b = rows.iter().find(|r| r.url == "https://b.example.com").unwrap();
        assert_eq!(row_b.total_duration_secs, 60);
        assert_eq!(row_b.total_ratio, Some(100.0));
    }
}
