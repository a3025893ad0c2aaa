use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{coin::Coin, portfolio::Portfolio};

/// Storage key of the holdings snapshot.
pub const SNAPSHOT_KEY: &str = "COINS";
pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub saved_at: DateTime<Utc>,
    pub coins: HashMap<String, Coin>,
}

impl Snapshot {
    pub fn new(portfolio: &Portfolio) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            coins: portfolio.coins.clone(),
        }
    }

    pub fn into_portfolio(self) -> Portfolio {
        Portfolio::from(self.coins)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a snapshot, migrating older shapes.
    ///
    /// Version 0 is the bare `name -> coin` map without an envelope.
    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("Snapshot is not valid json")?;
        match value.get("version").map(Value::as_u64) {
            Some(Some(SNAPSHOT_VERSION)) => {
                serde_json::from_value(value).context("Malformed snapshot")
            }
            Some(Some(version)) => bail!("Unsupported snapshot version {}", version),
            // a coin literally named "version" in a bare map
            Some(None) | None => {
                let coins: HashMap<String, Coin> =
                    serde_json::from_value(value).context("Malformed unversioned snapshot")?;
                debug!("Migrating unversioned snapshot with {} coins", coins.len());
                Ok(Self {
                    version: SNAPSHOT_VERSION,
                    saved_at: Utc::now(),
                    coins,
                })
            }
        }
    }
}

/// Where holdings snapshots are kept.
pub trait SnapshotStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Result<Option<Snapshot>>> + Send;
    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<()>> + Send;
}

/// Snapshot kept as `<data dir>/COINS.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{SNAPSHOT_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let snapshot = Snapshot::from_json(&content)
            .with_context(|| format!("Corrupted snapshot {}", self.path.display()))?;
        info!(
            "Loaded {} holdings from {}",
            snapshot.coins.len(),
            self.path.display()
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = snapshot.to_json()?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .await
                .with_context(|| format!("Failed to open {}", tmp_path.display()))?;
            file.write_all(json.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(
            "Saved {} holdings to {}",
            snapshot.coins.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Snapshot kept in memory as serialized json.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    content: Arc<RwLock<Option<String>>>,
    read_only: Arc<RwLock<bool>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: &str) -> Self {
        Self {
            content: Arc::new(RwLock::new(Some(content.to_owned()))),
            ..Default::default()
        }
    }

    pub async fn content(&self) -> Option<String> {
        self.content.read().await.clone()
    }

    /// Makes every following save fail.
    pub async fn set_read_only(&self, read_only: bool) {
        let mut current = self.read_only.write().await;
        *current = read_only;
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let content = self.content.read().await;
        content.as_deref().map(Snapshot::from_json).transpose()
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if *self.read_only.read().await {
            return Err(anyhow!("Snapshot store is read only"));
        }
        let json = snapshot.to_json()?;
        let mut content = self.content.write().await;
        *content = Some(json);
        Ok(())
    }
}
