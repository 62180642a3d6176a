use std::{ops::ControlFlow, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use switch_common::{GroupAction, GroupConfig, GroupEngine, GroupEvent, GroupStatus, Telemetry};

use crate::{commands, store::GroupStore, transport::Transport};

const TICK_PERIOD: Duration = Duration::from_secs(1);

pub enum GroupMessage {
    Telemetry(Telemetry),
    Change(GroupConfig),
    Replace(GroupConfig),
    Event(GroupEvent),
    Stop(oneshot::Sender<()>),
}

/// Owner side of a running group loop.
pub struct GroupHandle {
    tx: mpsc::UnboundedSender<GroupMessage>,
    status: watch::Receiver<GroupStatus>,
    task: JoinHandle<()>,
}

impl GroupHandle {
    pub fn spawn(
        engine: GroupEngine,
        transport: Arc<dyn Transport>,
        store: Arc<dyn GroupStore>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(engine.status(Utc::now()));
        let group = GroupLoop {
            engine,
            inbox: tx.downgrade(),
            transport,
            store,
            status: status_tx,
        };
        let task = tokio::spawn(group.run(rx));
        Self { tx, status, task }
    }

    /// Queues a message. Returns `false` once the loop is gone.
    pub fn send(&self, message: GroupMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn status(&self) -> GroupStatus {
        self.status.borrow().clone()
    }

    /// Stops the loop and waits until it has exited.
    pub async fn stop(self) -> anyhow::Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(GroupMessage::Stop(ack_tx)).is_ok() {
            ack_rx.await.context("group loop exited without acknowledging stop")?;
        }
        self.task.await.context("group loop panicked")?;
        Ok(())
    }
}

#[cfg(test)]
impl GroupHandle {
    /// Handle over a loop that died without acknowledging anything.
    pub fn crashed(status: GroupStatus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_, status) = watch::channel(status);
        let task = tokio::spawn(async move {
            drop(rx);
            panic!("group loop crashed");
        });
        Self { tx, status, task }
    }
}

struct GroupLoop {
    engine: GroupEngine,
    inbox: mpsc::WeakUnboundedSender<GroupMessage>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn GroupStore>,
    status: watch::Sender<GroupStatus>,
}

impl GroupLoop {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<GroupMessage>) {
        let id = self.engine.id();
        let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("group {id}: control loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                message = rx.recv() => {
                    let Some(message) = message else {
                        debug!("group {id}: every sender dropped, leaving");
                        return;
                    };
                    if self.handle(message).await.is_break() {
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&mut self) {
        let id = self.engine.id();
        let mode = self.engine.mode();
        let presence = self.engine.presence();

        let actions = self.engine.tick();

        if mode != self.engine.mode() && self.engine.mode().is_auto() {
            info!("group {id}: back to automatic mode");
        }
        if presence != self.engine.presence() {
            if self.engine.presence() {
                info!("group {id}: someone came in");
            } else {
                info!("group {id}: is now empty");
            }
        }
        self.execute(actions).await;
    }

    async fn handle(&mut self, message: GroupMessage) -> ControlFlow<()> {
        let id = self.engine.id();
        match message {
            GroupMessage::Telemetry(telemetry) => {
                let mac = telemetry.mac().to_string();
                if !self.engine.on_telemetry(telemetry) {
                    debug!("group {id}: ignoring report from non-member {mac}");
                }
            }
            GroupMessage::Change(delta) => {
                debug!("group {id}: applying config change");
                let events = self.engine.apply_config(&delta);
                self.post(events);
            }
            GroupMessage::Replace(config) => {
                debug!("group {id}: replacing config");
                let events = self.engine.replace_config(&config);
                self.post(events);
            }
            GroupMessage::Event(event) => {
                info!("group {id}: {event:?} event");
                let actions = self.engine.handle_event(event);
                self.execute(actions).await;
            }
            GroupMessage::Stop(ack) => {
                info!("group {id}: control loop stopped");
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // Sub-events go through the queue so they run after anything already
    // waiting in it.
    fn post(&self, events: Vec<GroupEvent>) {
        let Some(inbox) = self.inbox.upgrade() else {
            return;
        };
        for event in events {
            let _ = inbox.send(GroupMessage::Event(event));
        }
    }

    async fn execute(&mut self, actions: Vec<GroupAction>) {
        let id = self.engine.id();
        for action in actions {
            if action == GroupAction::PersistStatus {
                self.persist_status().await;
                continue;
            }
            match commands::encode(&action) {
                Ok(Some((topic, payload))) => self.transport.publish(&topic, payload),
                Ok(None) => {}
                Err(err) => warn!("group {id}: cannot encode {action:?}: {err:#}"),
            }
        }
    }

    async fn persist_status(&mut self) {
        let status = self.engine.status(Utc::now());
        if let Err(err) = self.store.save_status(&status).await {
            warn!("group {}: cannot dump status: {err:#}", status.group);
        }
        self.status.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use switch_common::{events::SensorEvent, AutoMode, GroupCommand};

    use super::*;
    use crate::{store::testing::MemoryStore, transport::testing::RecordingTransport};

    fn office() -> GroupConfig {
        GroupConfig {
            leds: Some(vec!["L1".to_string()]),
            sensors: Some(vec!["S1".to_string()]),
            rule_brightness: Some(400),
            watchdog: Some(3),
            ..GroupConfig::new(1)
        }
    }

    fn spawn(
        config: GroupConfig,
    ) -> (GroupHandle, Arc<RecordingTransport>, Arc<MemoryStore>) {
        let transport = Arc::new(RecordingTransport::default());
        let store = Arc::new(MemoryStore::default());
        let handle = GroupHandle::spawn(GroupEngine::new(config), transport.clone(), store.clone());
        (handle, transport, store)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_after_one_period() {
        let (handle, transport, store) = spawn(GroupConfig {
            sensors: None,
            rule_brightness: None,
            ..office()
        });

        settle().await;
        assert!(transport.take().is_empty());

        tokio::time::sleep(Duration::from_millis(1_001)).await;
        settle().await;
        let messages = transport.take();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "/write/led/L1/update/settings");
        assert_eq!(messages[0].1["setpointAuto"], 100);
        assert!(store.statuses.lock().await.contains_key(&1));
        assert!(handle.status().presence);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn manual_command_reverts_after_watchdog() {
        let (handle, transport, _store) = spawn(office());
        handle.send(GroupMessage::Telemetry(Telemetry::Sensor(SensorEvent {
            mac: "S1".to_string(),
            brightness: 100,
            presence: true,
            ..SensorEvent::default()
        })));
        let command = GroupCommand {
            group: 1,
            leds: Some(40),
            ..GroupCommand::default()
        };
        handle.send(GroupMessage::Change(command.into_delta()));
        settle().await;

        let messages = transport.take();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1["setpointAuto"], 40);
        let status = handle.status();
        assert!(!status.auto);
        assert_eq!(status.setpoint_leds, 40);
        assert_eq!(status.time_to_auto, 3);

        tokio::time::sleep(Duration::from_millis(3_001)).await;
        settle().await;
        let status = handle.status();
        assert!(status.auto);
        assert_eq!(status.time_to_auto, 0);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_acknowledged() {
        let (handle, _transport, _store) = spawn(office());
        let tx = handle.tx.clone();
        handle.stop().await.unwrap();
        assert!(tx.send(GroupMessage::Event(GroupEvent::Manual)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn non_member_telemetry_is_ignored() {
        let (handle, _transport, _store) = spawn(office());
        handle.send(GroupMessage::Telemetry(Telemetry::Sensor(SensorEvent {
            mac: "S9".to_string(),
            presence: true,
            ..SensorEvent::default()
        })));
        tokio::time::sleep(Duration::from_millis(1_001)).await;
        settle().await;

        let status = handle.status();
        assert!(!status.presence);
        assert_eq!(status.sensors, vec!["S1"]);
        assert_eq!(AutoMode::from(Some(status.auto)), AutoMode::Auto);

        handle.stop().await.unwrap();
    }
}
