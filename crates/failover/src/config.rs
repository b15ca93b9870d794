use eyre::WrapErr;
use std::time::Duration;

/// Connection settings shared by the oracle and gateway clients
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Timeouts {
    pub fn http_client(&self) -> eyre::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect)
            .timeout(self.connect + self.read)
            .build()
            .wrap_err("Failed to build HTTP client")
    }
}

/// Settings of one selection cycle
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    pub oracle_url: String,
    pub gateway_url: String,
    pub gateway_api_key: String,
    /// Altruists whose URL contains this string are tried first
    pub preferred_domain: Option<String>,
    pub health_window: String,
    pub timeouts: Timeouts,
}

/// Accepts PromQL durations such as `30m`, `1h` or `90s`
pub fn parse_window(window: &str) -> Result<String, String> {
    let unit_at = window
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in {:?}", window))?;
    let (amount, unit) = window.split_at(unit_at);
    if amount.is_empty() || amount.chars().all(|c| c == '0') {
        return Err(format!("window must be positive: {:?}", window));
    }
    if !matches!(unit, "ms" | "s" | "m" | "h" | "d" | "w" | "y") {
        return Err(format!("unknown unit {:?} in {:?}", unit, window));
    }
    Ok(window.to_string())
}
