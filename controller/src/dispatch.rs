use std::sync::Arc;

use tracing::{debug, info, warn};

use switch_common::{
    events::decode_json, group_command_topic, parse_local_topic, parse_server_topic, GroupCommand,
    GroupConfig, LocalRoute, ServerRoute, SwitchSetup, Telemetry,
};

use crate::{group::GroupMessage, registry::GroupRegistry, store::GroupStore, transport::Transport};

/// Routes broker messages to the groups.
pub struct Dispatcher {
    registry: GroupRegistry,
    store: Arc<dyn GroupStore>,
    local: Arc<dyn Transport>,
    server: Option<Arc<dyn Transport>>,
    mac: String,
    max_payload_bytes: usize,
}

impl Dispatcher {
    pub fn new(
        registry: GroupRegistry,
        store: Arc<dyn GroupStore>,
        local: Arc<dyn Transport>,
        server: Option<Arc<dyn Transport>>,
        mac: String,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            registry,
            store,
            local,
            server,
            mac,
            max_payload_bytes,
        }
    }

    pub async fn handle_local(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        if self.oversized(topic, payload) {
            return Ok(());
        }

        match parse_local_topic(topic)? {
            LocalRoute::Telemetry { group, class } => {
                let telemetry = Telemetry::decode(class, payload)?;
                self.registry
                    .dispatch(group, GroupMessage::Telemetry(telemetry))
                    .await;
                self.rebroadcast(topic, payload);
            }
            LocalRoute::DeviceError { group, class } => {
                let telemetry = Telemetry::decode_error(class, payload)?;
                warn!("group {group}: {} {} reported an error", class.as_str(), telemetry.mac());
                self.registry
                    .dispatch(group, GroupMessage::Telemetry(telemetry))
                    .await;
                self.rebroadcast(topic, payload);
            }
            LocalRoute::GroupCommand { group } => {
                let mut command: GroupCommand = decode_json(payload)?;
                command.group = group;
                self.registry.reload(group, command.into_delta()).await;
            }
            LocalRoute::SwitchCommand => {
                let command: GroupCommand = decode_json(payload)?;
                let target = group_command_topic(command.group);
                debug!("forwarding switch command to {target}");
                self.local.publish(&target, payload.to_vec());
                self.rebroadcast(&target, payload);
            }
        }
        Ok(())
    }

    pub async fn handle_server(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        if self.oversized(topic, payload) {
            return Ok(());
        }
        let Some(route) = parse_server_topic(topic, &self.mac) else {
            debug!("ignoring server topic {topic}");
            return Ok(());
        };

        let setup: SwitchSetup = decode_json(payload)?;
        if !setup.mac.is_empty() && !setup.mac.eq_ignore_ascii_case(&self.mac) {
            debug!("ignoring setup addressed to {}", setup.mac);
            return Ok(());
        }

        match route {
            ServerRoute::Setup | ServerRoute::Update => {
                for config in setup.into_configs() {
                    self.apply_server_config(route, config).await;
                }
            }
            ServerRoute::Remove => {
                for group in setup.groups.into_keys() {
                    if let Err(err) = self.registry.delete(group).await {
                        warn!("group {group}: removal failed: {err:#}");
                    }
                }
            }
        }
        Ok(())
    }

    async fn apply_server_config(&self, route: ServerRoute, config: GroupConfig) {
        let id = config.group;
        let mut stored = match route {
            ServerRoute::Update => self.store.load_config(id).await.unwrap_or_else(|err| {
                warn!("group {id}: cannot load stored config: {err:#}");
                None
            }),
            _ => None,
        }
        .unwrap_or_else(|| GroupConfig::new(id));
        stored.merge_settings(&config);

        if let Err(err) = self.store.save_config(&stored).await {
            warn!("group {id}: cannot persist config: {err:#}");
        }

        if self.registry.contains(id).await {
            info!("group {id}: reloading config");
            match route {
                ServerRoute::Setup => self.registry.replace(id, config).await,
                _ => self.registry.reload(id, config).await,
            };
        } else {
            self.registry.create(stored, None).await;
        }
    }

    fn rebroadcast(&self, topic: &str, payload: &[u8]) {
        if let Some(server) = &self.server {
            server.publish(topic, payload.to_vec());
        }
    }

    fn oversized(&self, topic: &str, payload: &[u8]) -> bool {
        if payload.len() > self.max_payload_bytes {
            warn!(
                "dropping oversized MQTT payload on topic {} ({} bytes)",
                topic,
                payload.len()
            );
            return true;
        }
        false
    }
}
