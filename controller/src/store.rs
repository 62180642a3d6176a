use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use switch_common::{GroupConfig, GroupStatus};

/// Persistence of group definitions and their last status, keyed by group id.
#[async_trait]
pub trait GroupStore: Send + Sync + 'static {
    async fn load_configs(&self) -> anyhow::Result<Vec<GroupConfig>>;
    async fn save_config(&self, config: &GroupConfig) -> anyhow::Result<()>;
    async fn load_config(&self, group: i32) -> anyhow::Result<Option<GroupConfig>>;
    async fn load_status(&self, group: i32) -> anyhow::Result<Option<GroupStatus>>;
    async fn save_status(&self, status: &GroupStatus) -> anyhow::Result<()>;
    async fn delete_group(&self, group: i32) -> anyhow::Result<()>;
}

/// One JSON file per group under `groups/config` and `groups/status`.
#[derive(Clone)]
pub struct FileStore {
    config_dir: Arc<PathBuf>,
    status_dir: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(data_dir: &Path) -> Self {
        let groups = data_dir.join("groups");
        Self {
            config_dir: Arc::new(groups.join("config")),
            status_dir: Arc::new(groups.join("status")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn config_path(&self, group: i32) -> PathBuf {
        self.config_dir.join(format!("{group}.json"))
    }

    fn status_path(&self, group: i32) -> PathBuf {
        self.status_dir.join(format!("{group}.json"))
    }
}

#[async_trait]
impl GroupStore for FileStore {
    async fn load_configs(&self) -> anyhow::Result<Vec<GroupConfig>> {
        let _guard = self.lock.lock().await;
        let mut entries = match tokio::fs::read_dir(self.config_dir.as_ref()).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut configs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match read_json::<GroupConfig>(&path).await {
                Ok(Some(config)) => configs.push(config),
                Ok(None) => {}
                Err(err) => warn!("skipping group config {}: {err:#}", path.display()),
            }
        }
        configs.sort_by_key(|config| config.group);
        Ok(configs)
    }

    async fn save_config(&self, config: &GroupConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        write_json(&self.config_path(config.group), &config.settings()).await
    }

    async fn load_config(&self, group: i32) -> anyhow::Result<Option<GroupConfig>> {
        let _guard = self.lock.lock().await;
        read_json(&self.config_path(group)).await
    }

    async fn load_status(&self, group: i32) -> anyhow::Result<Option<GroupStatus>> {
        let _guard = self.lock.lock().await;
        read_json(&self.status_path(group)).await
    }

    async fn save_status(&self, status: &GroupStatus) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        write_json(&self.status_path(status.group), status).await
    }

    async fn delete_group(&self, group: i32) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        for path in [self.config_path(group), self.status_path(group)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to remove {}", path.display()))
                }
            }
        }
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(Some(
            serde_json::from_slice(&raw)
                .with_context(|| format!("invalid json in {}", path.display()))?,
        )),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, payload)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
