use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{info, warn};

use switch_common::{GroupConfig, GroupEngine, GroupStatus};

use crate::{
    group::{GroupHandle, GroupMessage},
    store::GroupStore,
    transport::Transport,
};

/// Running groups keyed by id.
#[derive(Clone)]
pub struct GroupRegistry {
    groups: Arc<RwLock<BTreeMap<i32, GroupHandle>>>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn GroupStore>,
}

impl GroupRegistry {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn GroupStore>) -> Self {
        Self {
            groups: Arc::new(RwLock::new(BTreeMap::new())),
            transport,
            store,
        }
    }

    /// Starts a group, or reloads it when it is already running.
    pub async fn create(&self, config: GroupConfig, restore: Option<GroupStatus>) {
        let id = config.group;
        let mut groups = self.groups.write().await;
        if let Some(handle) = groups.get(&id) {
            if handle.send(GroupMessage::Change(config.clone())) {
                return;
            }
            warn!("group {id}: loop is gone, starting a new one");
        }

        let mut engine = GroupEngine::new(config);
        if let Some(status) = restore {
            engine.restore(&status);
        }
        info!("group {id}: created in {} mode", engine.mode().as_str());
        let handle = GroupHandle::spawn(engine, self.transport.clone(), self.store.clone());
        groups.insert(id, handle);
    }

    pub async fn reload(&self, id: i32, delta: GroupConfig) -> bool {
        self.dispatch(id, GroupMessage::Change(delta)).await
    }

    /// Swaps the whole definition of a running group.
    pub async fn replace(&self, id: i32, config: GroupConfig) -> bool {
        self.dispatch(id, GroupMessage::Replace(config)).await
    }

    pub async fn dispatch(&self, id: i32, message: GroupMessage) -> bool {
        let groups = self.groups.read().await;
        let Some(handle) = groups.get(&id) else {
            warn!("group {id}: unknown group, message dropped");
            return false;
        };
        handle.send(message)
    }

    pub async fn contains(&self, id: i32) -> bool {
        self.groups.read().await.contains_key(&id)
    }

    /// Stops the group, waits for its loop to exit, then clears what the
    /// store holds for it.
    pub async fn delete(&self, id: i32) -> anyhow::Result<bool> {
        let Some(handle) = self.groups.write().await.remove(&id) else {
            warn!("group {id}: unknown group, nothing to delete");
            return Ok(false);
        };
        if let Err(err) = handle.stop().await {
            warn!("group {id}: unclean stop: {err:#}");
        }
        self.store.delete_group(id).await?;
        info!("group {id}: deleted");
        Ok(true)
    }

    pub async fn status(&self, id: i32) -> Option<GroupStatus> {
        self.groups.read().await.get(&id).map(GroupHandle::status)
    }

    pub async fn statuses(&self) -> Vec<GroupStatus> {
        self.groups
            .read()
            .await
            .values()
            .map(GroupHandle::status)
            .collect()
    }

    pub async fn shutdown(&self) {
        let groups = std::mem::take(&mut *self.groups.write().await);
        for (id, handle) in groups {
            if let Err(err) = handle.stop().await {
                warn!("group {id}: unclean stop: {err:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{store::testing::MemoryStore, transport::testing::RecordingTransport};

    fn registry() -> (GroupRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let registry = GroupRegistry::new(Arc::new(RecordingTransport::default()), store.clone());
        (registry, store)
    }

    #[tokio::test(start_paused = true)]
    async fn create_twice_reloads_the_running_group() {
        let (registry, _store) = registry();
        registry.create(GroupConfig::new(3), None).await;
        registry
            .create(
                GroupConfig {
                    friendly_name: Some("Lobby".to_string()),
                    ..GroupConfig::new(3)
                },
                None,
            )
            .await;
        tokio::time::sleep(Duration::from_millis(1_001)).await;

        let statuses = registry.statuses().await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].friendly_name, "Lobby");

        registry.shutdown().await;
        assert!(registry.statuses().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_groups_are_dropped() {
        let (registry, _store) = registry();
        assert!(!registry.reload(42, GroupConfig::new(42)).await);
        assert!(!registry.delete(42).await.unwrap());
        assert!(!registry.contains(42).await);
        assert!(registry.status(42).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_clears_persisted_state_after_stop() {
        let (registry, store) = registry();
        store.save_config(&GroupConfig::new(5)).await.unwrap();
        registry.create(GroupConfig::new(5), None).await;
        tokio::time::sleep(Duration::from_millis(1_001)).await;
        assert!(store.statuses.lock().await.contains_key(&5));

        assert!(registry.delete(5).await.unwrap());
        assert!(!registry.contains(5).await);
        assert!(store.configs.lock().await.is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(store.statuses.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_clears_store_when_loop_crashed() {
        let (registry, store) = registry();
        store.save_config(&GroupConfig::new(7)).await.unwrap();
        let status = GroupEngine::new(GroupConfig::new(7)).status(chrono::Utc::now());
        registry
            .groups
            .write()
            .await
            .insert(7, GroupHandle::crashed(status));

        assert!(registry.delete(7).await.unwrap());
        assert!(!registry.contains(7).await);
        assert!(store.configs.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restore_rehydrates_mode_and_setpoint() {
        let (registry, _store) = registry();
        let mut previous = GroupEngine::new(GroupConfig::new(6));
        previous.apply_config(&GroupConfig {
            auto: Some(false),
            ..GroupConfig::new(6)
        });
        let mut status = previous.status(chrono::Utc::now());
        status.setpoint_leds = 35;

        registry.create(GroupConfig::new(6), Some(status)).await;
        let restored = registry.status(6).await.unwrap();
        assert!(!restored.auto);
        assert_eq!(restored.setpoint_leds, 35);

        registry.shutdown().await;
    }
}
