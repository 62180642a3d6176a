use rumqttc::{AsyncClient, QoS};
use tracing::warn;

/// Fire-and-forget publisher. Implementations must never block the caller.
pub trait Transport: Send + Sync + 'static {
    fn publish(&self, topic: &str, payload: Vec<u8>);
}

#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    name: &'static str,
}

impl MqttTransport {
    pub fn new(client: AsyncClient, name: &'static str) -> Self {
        Self { client, name }
    }
}

impl Transport for MqttTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>) {
        if let Err(err) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
        {
            warn!("{} publish on {topic} dropped: {err}", self.name);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::Transport;

    #[derive(Default)]
    pub struct RecordingTransport {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingTransport {
        pub fn take(&self) -> Vec<(String, serde_json::Value)> {
            let mut messages = self.messages.lock().unwrap();
            messages
                .drain(..)
                .map(|(topic, payload)| (topic, serde_json::from_slice(&payload).unwrap()))
                .collect()
        }

        pub fn topics(&self) -> Vec<String> {
            self.take().into_iter().map(|(topic, _)| topic).collect()
        }
    }

    impl Transport for RecordingTransport {
        fn publish(&self, topic: &str, payload: Vec<u8>) {
            self.messages
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
        }
    }
}
