use eyre::WrapErr;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP transport shared by all dialects. Every request is bounded by the
/// connect and read timeouts given at construction.
#[derive(Clone)]
pub struct RpcClient {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<Value>,
}

impl RpcClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + read_timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> eyre::Result<T> {
        let response = self.client.get(url).send().await?;
        Self::decode(url, response).await
    }

    pub async fn post<T: DeserializeOwned>(&self, url: &str, body: &Value) -> eyre::Result<T> {
        let response = self.client.post(url).json(body).send().await?;
        Self::decode(url, response).await
    }

    /// JSON-RPC 2.0 call returning the `result` member
    pub async fn call<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> eyre::Result<T> {
        let envelope: Envelope<T> = self.post(url, &request(method, params)).await?;
        match (envelope.result, envelope.error) {
            (_, Some(error)) => eyre::bail!("{} returned an error: {}", method, error),
            (Some(result), None) => Ok(result),
            (None, None) => eyre::bail!("{} returned no result", method),
        }
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> eyre::Result<T> {
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("{} replied {}: {}", url, status, body);
            eyre::bail!("Reply status_code: {} != 200", status.as_u16());
        }
        response
            .json::<T>()
            .await
            .wrap_err_with(|| format!("Failed to decode reply from {}", url))
    }
}

pub fn request(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    })
}
