use async_trait::async_trait;
use eyre::WrapErr;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Answers which altruists of a chain were healthy over the trailing window
#[async_trait]
pub trait HealthOracle: Send + Sync {
    async fn healthy(&self, chain_id: &str) -> eyre::Result<HashSet<String>>;
}

/// Health oracle backed by a Prometheus-compatible query API (Prometheus,
/// VictoriaMetrics). Probe scrape jobs are named after the chain id and the
/// `instance` label carries the altruist URL.
pub struct PrometheusOracle {
    client: reqwest::Client,
    base_url: String,
    window: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Deserialize)]
struct QueryData {
    result: Vec<Sample>,
}

#[derive(Deserialize)]
struct Sample {
    metric: HashMap<String, String>,
}

impl PrometheusOracle {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        window: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            window: window.into(),
        }
    }

    /// Altruists with latency samples, no sync lag and only successful
    /// probes throughout the window
    pub fn query(&self, chain_id: &str) -> String {
        let job = format!("{{job=\"{}\"}}", chain_id);
        let window = &self.window;
        format!(
            "sort(\
             sum_over_time(last_block_duration_ns{job}[{window}])\
             +sum_over_time(node_syncing_duration_ns{job}[{window}]) \
             and node_syncing{job}[{window}]==0 \
             and probe_success{job}[{window}]==1\
             )"
        )
    }
}

#[async_trait]
impl HealthOracle for PrometheusOracle {
    async fn healthy(&self, chain_id: &str) -> eyre::Result<HashSet<String>> {
        let url = format!("{}/api/v1/query", self.base_url);
        let query = self.query(chain_id);
        tracing::debug!("Health query for {}: {}", chain_id, query);

        let response = self
            .client
            .get(&url)
            .query(&[("query", query.as_str())])
            .send()
            .await
            .wrap_err_with(|| format!("Failed to query health oracle at {}", url))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            eyre::bail!("Reply status_code: {} != 200", status.as_u16());
        }

        let body: QueryResponse = response
            .json()
            .await
            .wrap_err("Failed to decode health oracle reply")?;

        Ok(body
            .data
            .result
            .into_iter()
            .filter_map(|mut sample| sample.metric.remove("instance"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oracle(server: &MockServer) -> PrometheusOracle {
        PrometheusOracle::new(reqwest::Client::new(), server.uri(), "30m")
    }

    #[test]
    fn test_query_shape() {
        let oracle = PrometheusOracle::new(reqwest::Client::new(), "http://vm:8428/", "30m");
        assert_eq!(
            oracle.query("0021"),
            "sort(sum_over_time(last_block_duration_ns{job=\"0021\"}[30m])\
             +sum_over_time(node_syncing_duration_ns{job=\"0021\"}[30m]) \
             and node_syncing{job=\"0021\"}[30m]==0 \
             and probe_success{job=\"0021\"}[30m]==1)"
        );
        assert_eq!(oracle.base_url, "http://vm:8428");
    }

    #[tokio::test]
    async fn test_healthy_instances() {
        let server = MockServer::start().await;
        let oracle = oracle(&server);
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .and(query_param("query", oracle.query("0021")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        {"metric": {"instance": "https://a.example.com", "job": "0021"}, "value": [1, "10"]},
                        {"metric": {"instance": "https://b.example.com", "job": "0021"}, "value": [1, "20"]},
                        {"metric": {"job": "0021"}, "value": [1, "30"]}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let healthy = oracle.healthy("0021").await.unwrap();
        assert_eq!(healthy.len(), 2);
        assert!(healthy.contains("https://a.example.com"));
        assert!(healthy.contains("https://b.example.com"));
    }

    #[tokio::test]
    async fn test_non_200_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = oracle(&server).healthy("0021").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
