use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Length of every chain identifier
pub const CHAIN_ID_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: String,
    pub chain_name: String,
}

/// An endpoint that can back the gateway for one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Altruist {
    pub id: u64,
    pub chain_id: String,
    /// May carry basic-auth credentials as userinfo
    pub url: String,
    pub enabled: bool,
    pub owner: Option<String>,
}

/// One interval during which an altruist backed its chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingLogEntry {
    pub id: u64,
    pub altruist_id: u64,
    pub chain_id: String,
    pub start_time: DateTime<Utc>,
    /// Re-stamped every time the entry is saved
    pub finish_time: DateTime<Utc>,
}

impl ServingLogEntry {
    pub fn duration_secs(&self) -> i64 {
        (self.finish_time - self.start_time).num_seconds()
    }
}

/// Read access to chains and altruists, append/re-save access to the
/// serving log
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Chains whose id is in `filter`, or every chain when `filter` is empty
    async fn chains(&self, filter: &[String]) -> eyre::Result<Vec<Chain>>;

    /// Every altruist, enabled or not
    async fn altruists(&self) -> eyre::Result<Vec<Altruist>>;

    async fn enabled_altruists(&self, chain_id: &str) -> eyre::Result<Vec<Altruist>>;

    /// Number of serving log entries of `altruist_id` started at or after `since`
    async fn sessions_since(&self, altruist_id: u64, since: DateTime<Utc>) -> eyre::Result<usize>;

    /// The chain's most recently started entry
    async fn open_entry(&self, chain_id: &str) -> eyre::Result<Option<ServingLogEntry>>;

    /// Re-save an entry, stamping its finish time with `now`
    async fn touch_entry(&self, id: u64, now: DateTime<Utc>) -> eyre::Result<()>;

    async fn append_entry(
        &self,
        altruist: &Altruist,
        now: DateTime<Utc>,
    ) -> eyre::Result<ServingLogEntry>;

    async fn serving_log(&self) -> eyre::Result<Vec<ServingLogEntry>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    chains: Vec<Chain>,
    #[serde(default)]
    altruists: Vec<Altruist>,
    #[serde(default)]
    serving_log: Vec<ServingLogEntry>,
}

impl CatalogData {
    fn next_altruist_id(&self) -> u64 {
        self.altruists.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }

    fn next_entry_id(&self) -> u64 {
        self.serving_log.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }
}

/// Catalog kept in memory and, when opened from a file, written back as
/// pretty JSON after every mutation.
pub struct JsonCatalog {
    path: Option<PathBuf>,
    data: Mutex<CatalogData>,
}

impl JsonCatalog {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(CatalogData::default()),
        }
    }

    /// Load the catalog at `path`. A missing file is an empty catalog.
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .wrap_err_with(|| format!("Failed to read catalog {}", path.display()))?;
            serde_json::from_str(&contents)
                .wrap_err_with(|| format!("Failed to parse catalog {}", path.display()))?
        } else {
            tracing::info!("Catalog {} not found, starting empty", path.display());
            CatalogData::default()
        };

        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    pub async fn add_chain(&self, chain_id: &str, chain_name: &str) -> eyre::Result<Chain> {
        if chain_id.len() != CHAIN_ID_LEN {
            eyre::bail!(
                "Chain id must be {} characters long: {:?}",
                CHAIN_ID_LEN,
                chain_id
            );
        }

        let mut data = self.data.lock().await;
        if data.chains.iter().any(|c| c.chain_id == chain_id) {
            eyre::bail!("Chain {} already exists", chain_id);
        }

        let chain = Chain {
            chain_id: chain_id.to_string(),
            chain_name: chain_name.to_string(),
        };
        data.chains.push(chain.clone());
        self.persist(&data).await?;
        Ok(chain)
    }

    pub async fn add_altruist(
        &self,
        chain_id: &str,
        url: &str,
        owner: Option<String>,
    ) -> eyre::Result<Altruist> {
        let parsed = url::Url::parse(url).wrap_err_with(|| format!("Invalid URL {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            eyre::bail!("Altruist URL must be http(s) with a host: {}", url);
        }

        let mut data = self.data.lock().await;
        if !data.chains.iter().any(|c| c.chain_id == chain_id) {
            eyre::bail!("Unknown chain {}", chain_id);
        }
        if data
            .altruists
            .iter()
            .any(|a| a.chain_id == chain_id && a.url == url)
        {
            eyre::bail!("Altruist {} already exists for chain {}", url, chain_id);
        }

        let altruist = Altruist {
            id: data.next_altruist_id(),
            chain_id: chain_id.to_string(),
            url: url.to_string(),
            enabled: true,
            owner,
        };
        data.altruists.push(altruist.clone());
        self.persist(&data).await?;
        Ok(altruist)
    }

    /// Altruists are disabled rather than deleted so their history stays
    pub async fn set_enabled(&self, altruist_id: u64, enabled: bool) -> eyre::Result<()> {
        let mut data = self.data.lock().await;
        let altruist = data
            .altruists
            .iter_mut()
            .find(|a| a.id == altruist_id)
            .ok_or_else(|| eyre::eyre!("Unknown altruist {}", altruist_id))?;
        altruist.enabled = enabled;
        self.persist(&data).await
    }

    async fn persist(&self, data: &CatalogData) -> eyre::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string_pretty(data)?)
            .await
            .wrap_err_with(|| format!("Failed to write catalog {}", path.display()))
    }
}

#[async_trait]
impl Catalog for JsonCatalog {
    async fn chains(&self, filter: &[String]) -> eyre::Result<Vec<Chain>> {
        let data = self.data.lock().await;
        Ok(data
            .chains
            .iter()
            .filter(|c| filter.is_empty() || filter.contains(&c.chain_id))
            .cloned()
            .collect())
    }

    async fn altruists(&self) -> eyre::Result<Vec<Altruist>> {
        Ok(self.data.lock().await.altruists.clone())
    }

    async fn enabled_altruists(&self, chain_id: &str) -> eyre::Result<Vec<Altruist>> {
        let data = self.data.lock().await;
        Ok(data
            .altruists
            .iter()
            .filter(|a| a.enabled && a.chain_id == chain_id)
            .cloned()
            .collect())
    }

    async fn sessions_since(&self, altruist_id: u64, since: DateTime<Utc>) -> eyre::Result<usize> {
        let data = self.data.lock().await;
        Ok(data
            .serving_log
            .iter()
            .filter(|e| e.altruist_id == altruist_id && e.start_time >= since)
            .count())
    }

    async fn open_entry(&self, chain_id: &str) -> eyre::Result<Option<ServingLogEntry>> {
        let data = self.data.lock().await;
        Ok(data
            .serving_log
            .iter()
            .filter(|e| e.chain_id == chain_id)
            .max_by_key(|e| (e.start_time, e.id))
            .cloned())
    }

    async fn touch_entry(&self, id: u64, now: DateTime<Utc>) -> eyre::Result<()> {
        let mut data = self.data.lock().await;
        let entry = data
            .serving_log
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| eyre::eyre!("Unknown serving log entry {}", id))?;
        entry.finish_time = now;
        self.persist(&data).await
    }

    async fn append_entry(
        &self,
        altruist: &Altruist,
        now: DateTime<Utc>,
    ) -> eyre::Result<ServingLogEntry> {
        let mut data = self.data.lock().await;
        let entry = ServingLogEntry {
            id: data.next_entry_id(),
            altruist_id: altruist.id,
            chain_id: altruist.chain_id.clone(),
            start_time: now,
            finish_time: now,
        };
        data.serving_log.push(entry.clone());
        self.persist(&data).await?;
        Ok(entry)
    }

    async fn serving_log(&self) -> eyre::Result<Vec<ServingLogEntry>> {
        Ok(self.data.lock().await.serving_log.clone())
    }
}
