use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::net::TcpListener;
use tracing::{info, warn};

use switch_common::{
    server_remove_topic, server_setup_topic, server_update_topic, BrokerConfig, ControllerConfig,
    TOPIC_GROUP_COMMANDS, TOPIC_GROUP_ERRORS, TOPIC_GROUP_EVENTS, TOPIC_SWITCH_COMMANDS,
};

use crate::{
    api,
    dispatch::Dispatcher,
    registry::GroupRegistry,
    store::{FileStore, GroupStore},
    transport::{MqttTransport, Transport},
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("SWITCH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.switch"));

    let mut config = load_controller_config(&data_dir).await.unwrap_or_else(|err| {
        warn!("failed to load controller config: {err:#}");
        ControllerConfig::default()
    });
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();

    let store: Arc<dyn GroupStore> = Arc::new(FileStore::new(&data_dir));

    let (local_client, local_loop) = AsyncClient::new(
        mqtt_options(format!("switch-local-{}", config.mac), &config.local),
        64,
    );
    let local: Arc<dyn Transport> = Arc::new(MqttTransport::new(local_client.clone(), "local"));

    let server = config.server.as_ref().map(|broker| {
        AsyncClient::new(
            mqtt_options(format!("switch-server-{}", config.mac), broker),
            64,
        )
    });
    let server_transport = server.as_ref().map(|(client, _)| {
        Arc::new(MqttTransport::new(client.clone(), "server")) as Arc<dyn Transport>
    });

    let registry = GroupRegistry::new(local.clone(), store.clone());
    bootstrap(&registry, store.as_ref()).await;

    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        store.clone(),
        local,
        server_transport,
        config.mac.clone(),
        config.max_payload_bytes,
    ));

    subscribe_local(&local_client).await?;
    spawn_mqtt_loop("local", dispatcher.clone(), local_loop);

    if let Some((client, eventloop)) = server {
        subscribe_server(&client, &config.mac).await?;
        spawn_mqtt_loop("server", dispatcher.clone(), eventloop);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status server at {addr}"))?;

    info!("switch {} listening on http://{addr}", config.mac);
    axum::serve(listener, api::router(registry.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("stopping groups");
    registry.shutdown().await;
    Ok(())
}

async fn load_controller_config(data_dir: &Path) -> anyhow::Result<ControllerConfig> {
    let path = data_dir.join("controller.json");
    match tokio::fs::read(&path).await {
        Ok(raw) => Ok(serde_json::from_slice(&raw)
            .with_context(|| format!("invalid json in {}", path.display()))?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(ControllerConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn apply_env_overrides(config: &mut ControllerConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(mac) = var("SWITCH_MAC") {
        config.mac = mac;
    }
    if let Some(host) = var("MQTT_HOST") {
        config.local.host = host;
    }
    if let Some(port) = var("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
        config.local.port = port;
    }
    if let Some(user) = var("MQTT_USER") {
        config.local.user = user;
    }
    if let Some(pass) = var("MQTT_PASS") {
        config.local.pass = pass;
    }
    if let Some(host) = var("SERVER_MQTT_HOST") {
        config.server.get_or_insert_with(BrokerConfig::default).host = host;
    }
    if let Some(port) = var("CONTROLLER_HTTP_PORT").and_then(|value| value.parse::<u16>().ok()) {
        config.http_port = port;
    }
}

fn mqtt_options(client_id: String, broker: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
    options.set_keep_alive(Duration::from_secs(30));
    if !broker.user.is_empty() {
        options.set_credentials(broker.user.clone(), broker.pass.clone());
    }
    options
}

async fn bootstrap(registry: &GroupRegistry, store: &dyn GroupStore) {
    let configs = store.load_configs().await.unwrap_or_else(|err| {
        warn!("failed to load group configs from store: {err:#}");
        Vec::new()
    });

    for config in configs {
        let id = config.group;
        let status = store.load_status(id).await.unwrap_or_else(|err| {
            warn!("group {id}: failed to load last status: {err:#}");
            None
        });
        registry.create(config, status).await;
    }
}

async fn subscribe_local(client: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_GROUP_EVENTS,
        TOPIC_GROUP_ERRORS,
        TOPIC_GROUP_COMMANDS,
        TOPIC_SWITCH_COMMANDS,
    ];
    for topic in topics {
        client.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

async fn subscribe_server(client: &AsyncClient, mac: &str) -> anyhow::Result<()> {
    let topics = [
        server_setup_topic(mac),
        server_update_topic(mac),
        server_remove_topic(mac),
    ];
    for topic in topics {
        client.subscribe(topic, QoS::AtLeastOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(bus: &'static str, dispatcher: Arc<Dispatcher>, mut eventloop: EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    let result = if bus == "server" {
                        dispatcher
                            .handle_server(&message.topic, &message.payload)
                            .await
                    } else {
                        dispatcher.handle_local(&message.topic, &message.payload).await
                    };
                    if let Err(err) = result {
                        warn!("{bus} message on {} dropped: {err:#}", message.topic);
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("{bus} mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("{bus} mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
