//! Thin pub/sub abstraction over the MQTT broker. The broker's own wire
//! protocol is used as-is (out of scope to reimplement); this module only
//! adapts it to the `{command, data}` envelope and topic scheme.

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use crate::protocol::Envelope;
use crate::utils::CardClusterError;

/// An inbound publish delivered to a subscribed topic.
#[derive(Debug, Clone)]
pub struct TopicEvent {
    pub topic: String,
    pub envelope: Envelope,
}

/// What [`NotificationFanout`](crate::fanout::NotificationFanout) and
/// [`SessionRegistry`](crate::session::SessionRegistry) need from the
/// broker: publish and subscribe by topic string.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        envelope: &Envelope,
    ) -> Result<(), CardClusterError>;

    async fn subscribe(&self, topic_filter: &str) -> Result<(), CardClusterError>;
}

/// Real MQTT-backed broker client.
pub struct MqttBroker {
    client: AsyncClient,
}

impl MqttBroker {
    /// Connects to `broker_url` (`host:port`) under `client_id`, spawning
    /// the background event loop that feeds inbound publishes to `tx`.
    pub fn connect(
        broker_url: &str,
        client_id: &str,
        tx: mpsc::UnboundedSender<TopicEvent>,
    ) -> Result<Self, CardClusterError> {
        let (host, port) = broker_url
            .rsplit_once(':')
            .ok_or_else(|| CardClusterError::msg("broker url must be host:port"))?;
        let port: u16 = port
            .parse()
            .map_err(|_| CardClusterError::msg("invalid broker port"))?;

        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(std::time::Duration::from_secs(15));

        let (client, mut eventloop) = AsyncClient::new(opts, 64);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        let topic = p.topic.clone();
                        match serde_json::from_slice::<Envelope>(&p.payload) {
                            Ok(envelope) => {
                                if tx.send(TopicEvent { topic, envelope }).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                log::warn!("dropping malformed publish on {}: {}", topic, e);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("mqtt event loop error: {}", e);
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(MqttBroker { client })
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn publish(
        &self,
        topic: &str,
        envelope: &Envelope,
    ) -> Result<(), CardClusterError> {
        let payload = serde_json::to_vec(envelope)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(CardClusterError::from)
    }

    async fn subscribe(&self, topic_filter: &str) -> Result<(), CardClusterError> {
        self.client
            .subscribe(topic_filter, QoS::AtLeastOnce)
            .await
            .map_err(CardClusterError::from)
    }
}

/// In-memory broker used by integration tests and the smoke-test client's
/// local mode: publishes are recorded rather than sent over the network.
#[derive(Default)]
pub struct RecordingBroker {
    pub published: std::sync::Mutex<Vec<(String, Envelope)>>,
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(
        &self,
        topic: &str,
        envelope: &Envelope,
    ) -> Result<(), CardClusterError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), envelope.clone()));
        Ok(())
    }

    async fn subscribe(&self, _topic_filter: &str) -> Result<(), CardClusterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_broker_captures_publishes() {
        let broker = RecordingBroker::default();
        let env = Envelope::new("LOGIN_OK", &serde_json::json!({"clientId": "p1"})).unwrap();
        broker.publish("clients/p1/events", &env).await.unwrap();
        assert_eq!(broker.published.lock().unwrap().len(), 1);
    }
}
