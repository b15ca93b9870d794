use crate::catalog::{Altruist, Catalog, Chain};
use crate::gateway::Gateway;
use crate::ledger::{self, Clock};
use crate::oracle::HealthOracle;
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;

/// An enabled altruist with the signals used to rank it
#[derive(Debug, Clone)]
pub struct Candidate {
    pub altruist: Altruist,
    /// URL is on the preferred domain
    pub preferred: bool,
    /// Serving log entries started within the last hour
    pub last_hour_sessions: usize,
}

/// Preferred altruists first, then the least recently served. Stable, so
/// catalog order breaks the remaining ties.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.preferred
            .cmp(&a.preferred)
            .then(a.last_hour_sessions.cmp(&b.last_hour_sessions))
    });
    candidates
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainOutcome {
    pub chain_id: String,
    /// URL of the altruist now serving the chain, if a switch happened
    pub selected: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub chains: Vec<ChainOutcome>,
}

impl CycleReport {
    /// Any chain with at least one error degrades the whole cycle
    pub fn is_degraded(&self) -> bool {
        self.chains.iter().any(|c| !c.errors.is_empty())
    }

    pub fn error_count(&self) -> usize {
        self.chains.iter().map(|c| c.errors.len()).sum()
    }
}

pub struct Selector {
    catalog: Arc<dyn Catalog>,
    oracle: Arc<dyn HealthOracle>,
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
    preferred_domain: Option<String>,
}

impl Selector {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        oracle: Arc<dyn HealthOracle>,
        gateway: Arc<dyn Gateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            oracle,
            gateway,
            clock,
            preferred_domain: None,
        }
    }

    pub fn with_preferred_domain(mut self, domain: Option<String>) -> Self {
        self.preferred_domain = domain.filter(|d| !d.is_empty());
        self
    }

    /// One selection pass over the chains in `filter` (all when empty)
    pub async fn run(&self, filter: &[String]) -> eyre::Result<CycleReport> {
        let chains = self.catalog.chains(filter).await?;
        let mut report = CycleReport::default();

        for chain in chains {
            let outcome = self.select_chain(&chain).await;
            if !outcome.errors.is_empty() {
                tracing::warn!(
                    "Chain {} finished with {} error(s)",
                    chain.chain_id,
                    outcome.errors.len()
                );
            }
            report.chains.push(outcome);
        }

        Ok(report)
    }

    pub async fn select_chain(&self, chain: &Chain) -> ChainOutcome {
        let mut outcome = ChainOutcome {
            chain_id: chain.chain_id.clone(),
            ..Default::default()
        };

        let healthy = match self.oracle.healthy(&chain.chain_id).await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::error!("Health query for chain {} failed: {:#}", chain.chain_id, e);
                outcome.errors.push(format!("{:#}", e));
                return outcome;
            }
        };
        let ranked = match self.candidates(chain).await {
            Ok(ranked) => ranked,
            Err(e) => {
                tracing::error!("Selection for chain {} aborted: {:#}", chain.chain_id, e);
                outcome.errors.push(format!("{:#}", e));
                return outcome;
            }
        };

        for candidate in ranked {
            let url = &candidate.altruist.url;
            if !healthy.contains(url) {
                tracing::debug!("Skipping unhealthy altruist {} for {}", url, chain.chain_id);
                continue;
            }

            if let Err(e) = self.gateway.publish(&chain.chain_id, url).await {
                tracing::error!("Couldn't update altruist {}: {}: {:#}", chain.chain_id, url, e);
                outcome.errors.push(format!("{}: {:#}", url, e));
                continue;
            }

            let now = self.clock.now();
            let switched =
                ledger::record_switch(self.catalog.as_ref(), &candidate.altruist, now).await;
            if let Err(e) = switched {
                tracing::error!("Failed to record switch for {}: {:#}", chain.chain_id, e);
                outcome.errors.push(format!("{}: {:#}", url, e));
            }

            tracing::info!(
                "Changed altruist: {}, served {} times within last hour for {}",
                url,
                candidate.last_hour_sessions,
                chain.chain_id
            );
            outcome.selected = Some(url.clone());
            return outcome;
        }

        tracing::error!("No altruist could be published for chain {}", chain.chain_id);
        outcome
            .errors
            .push("no healthy altruist could be published".to_string());
        outcome
    }

    async fn candidates(&self, chain: &Chain) -> eyre::Result<Vec<Candidate>> {
        let since = self.clock.now() - Duration::hours(1);
        let mut candidates = Vec::new();

        for altruist in self.catalog.enabled_altruists(&chain.chain_id).await? {
            let last_hour_sessions = self.catalog.sessions_since(altruist.id, since).await?;
            let preferred = self
                .preferred_domain
                .as_deref()
                .is_some_and(|domain| altruist.url.contains(domain));
            candidates.push(Candidate {
                altruist,
                preferred,
                last_hour_sessions,
            });
        }

        Ok(rank(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::JsonCatalog;
    use crate::ledger::tests::ManualClock;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct StaticOracle(HashSet<String>);

    #[async_trait]
    impl HealthOracle for StaticOracle {
        async fn healthy(&self, _chain_id: &str) -> eyre::Result<HashSet<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl HealthOracle for FailingOracle {
        async fn healthy(&self, _chain_id: &str) -> eyre::Result<HashSet<String>> {
            eyre::bail!("Reply status_code: 500 != 200")
        }
    }

    /// Records every attempt and rejects URLs in its failing set
    #[derive(Default)]
    struct RecordingGateway {
        failing: HashSet<String>,
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Gateway for RecordingGateway {
        async fn publish(&self, _chain_id: &str, altruist_url: &str) -> eyre::Result<()> {
            self.attempts.lock().unwrap().push(altruist_url.to_string());
            if self.failing.contains(altruist_url) {
                eyre::bail!("status 500");
            }
            Ok(())
        }
    }

    fn candidate(id: u64, url: &str, preferred: bool, last_hour_sessions: usize) -> Candidate {
        Candidate {
            altruist: Altruist {
                id,
                chain_id: "0021".to_string(),
                url: url.to_string(),
                enabled: true,
                owner: None,
            },
            preferred,
            last_hour_sessions,
        }
    }

    fn urls(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.altruist.url.as_str()).collect()
    }

    fn set(urls: &[&str]) -> HashSet<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_rank_priority_then_sessions() {
        let ranked = rank(vec![
            candidate(1, "A", false, 3),
            candidate(2, "B", true, 5),
            candidate(3, "C", false, 0),
        ]);
        assert_eq!(urls(&ranked), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_rank_is_stable() {
        let ranked = rank(vec![
            candidate(1, "A", false, 1),
            candidate(2, "B", false, 1),
            candidate(3, "C", true, 1),
        ]);
        assert_eq!(urls(&ranked), vec!["C", "A", "B"]);
    }

    /// Catalog with B on the preferred domain and sessions giving [B, C, A]
    async fn seeded(clock: &ManualClock) -> Arc<JsonCatalog> {
        let catalog = JsonCatalog::in_memory();
        catalog.add_chain("0021", "Ethereum").await.unwrap();
        let a = catalog
            .add_altruist("0021", "https://a.example.com", None)
            .await
            .unwrap();
        let b = catalog
            .add_altruist("0021", "https://b.chains.example.org", None)
            .await
            .unwrap();
        catalog
            .add_altruist("0021", "https://c.example.com", None)
            .await
            .unwrap();

        for _ in 0..3 {
            catalog.append_entry(&a, clock.now()).await.unwrap();
        }
        for _ in 0..5 {
            catalog.append_entry(&b, clock.now()).await.unwrap();
        }
        clock.advance(Duration::minutes(1));
        Arc::new(catalog)
    }

    #[tokio::test]
    async fn test_skip_unhealthy_and_try_next_on_publish_failure() {
        let clock = Arc::new(ManualClock::new());
        let catalog = seeded(&clock).await;
        let entries_before = catalog.serving_log().await.unwrap().len();

        let oracle = StaticOracle(set(&["https://c.example.com", "https://a.example.com"]));
        let gateway = Arc::new(RecordingGateway {
            failing: set(&["https://c.example.com"]),
            ..Default::default()
        });

        let selector = Selector::new(
            catalog.clone(),
            Arc::new(oracle),
            gateway.clone(),
            clock.clone(),
        )
        .with_preferred_domain(Some("chains.example.org".to_string()));
        let report = selector.run(&[]).await.unwrap();

        assert_eq!(
            *gateway.attempts.lock().unwrap(),
            vec!["https://c.example.com", "https://a.example.com"]
        );

        let outcome = &report.chains[0];
        assert_eq!(outcome.selected.as_deref(), Some("https://a.example.com"));
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("https://c.example.com"));
        assert!(report.is_degraded());

        let log = catalog.serving_log().await.unwrap();
        assert_eq!(log.len(), entries_before + 1);
        let open = catalog.open_entry("0021").await.unwrap().unwrap();
        assert_eq!(open.altruist_id, 1);
        assert_eq!(open.start_time, clock.now());
    }

    #[tokio::test]
    async fn test_first_healthy_candidate_wins() {
        let clock = Arc::new(ManualClock::new());
        let catalog = seeded(&clock).await;
        let gateway = Arc::new(RecordingGateway::default());

        let selector = Selector::new(
            catalog.clone(),
            Arc::new(StaticOracle(set(&[
                "https://a.example.com",
                "https://b.chains.example.org",
                "https://c.example.com",
            ]))),
            gateway.clone(),
            clock.clone(),
        )
        .with_preferred_domain(Some("chains.example.org".to_string()));
        let report = selector.run(&["0021".to_string()]).await.unwrap();

        assert!(!report.is_degraded());
        assert_eq!(
            report.chains[0].selected.as_deref(),
            Some("https://b.chains.example.org")
        );
        assert_eq!(gateway.attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_older_than_an_hour_do_not_count() {
        let clock = Arc::new(ManualClock::new());
        let catalog = seeded(&clock).await;
        clock.advance(Duration::hours(2));

        let selector = Selector::new(
            catalog.clone(),
            Arc::new(StaticOracle(set(&[]))),
            Arc::new(RecordingGateway::default()),
            clock.clone(),
        );
        let chain = catalog.chains(&[]).await.unwrap().remove(0);
        let ranked = selector.candidates(&chain).await.unwrap();

        assert!(ranked.iter().all(|c| c.last_hour_sessions == 0));
        assert!(ranked.iter().all(|c| !c.preferred));
        assert_eq!(
            urls(&ranked),
            vec![
                "https://a.example.com",
                "https://b.chains.example.org",
                "https://c.example.com"
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_published_is_an_error() {
        let clock = Arc::new(ManualClock::new());
        let catalog = seeded(&clock).await;
        let gateway = Arc::new(RecordingGateway::default());
        let entries_before = catalog.serving_log().await.unwrap().len();

        let selector = Selector::new(
            catalog.clone(),
            Arc::new(StaticOracle(set(&["https://elsewhere.example.com"]))),
            gateway.clone(),
            clock.clone(),
        );
        let report = selector.run(&[]).await.unwrap();

        assert!(report.is_degraded());
        assert_eq!(report.chains[0].selected, None);
        assert!(gateway.attempts.lock().unwrap().is_empty());
        assert_eq!(catalog.serving_log().await.unwrap().len(), entries_before);
    }

    #[tokio::test]
    async fn test_oracle_failure_aborts_only_that_chain() {
        let clock = Arc::new(ManualClock::new());
        let catalog = seeded(&clock).await;
        catalog.add_chain("0001", "Pocket").await.unwrap();

        let selector = Selector::new(
            catalog.clone(),
            Arc::new(FailingOracle),
            Arc::new(RecordingGateway::default()),
            clock.clone(),
        );
        let report = selector.run(&[]).await.unwrap();

        assert_eq!(report.chains.len(), 2);
        assert!(report.chains.iter().all(|c| c.selected.is_none()));
        assert_eq!(report.error_count(), 2);
        assert!(report.chains[0].errors[0].contains("500"));
    }
}
