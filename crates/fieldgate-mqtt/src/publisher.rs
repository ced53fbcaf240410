use crate::topic;
use async_trait::async_trait;
use fieldgate_domain::{DevicePublisher, GatewayError, GatewayResult};
use rumqttc::{AsyncClient, QoS};
use tracing::debug;

/// Publishes gateway-originated messages over the shared broker session.
///
/// At-least-once delivery; duplicates on the response path are tolerable
/// because responses are not replay-protected.
#[derive(Clone)]
pub struct MqttDevicePublisher {
    client: AsyncClient,
}

impl MqttDevicePublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    async fn publish(&self, topic: String, payload: &[u8]) -> GatewayResult<()> {
        debug!(topic = %topic, size_bytes = payload.len(), "publishing to device topic");
        self.client
            .publish(topic.clone(), QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(|e| {
                GatewayError::Publish(anyhow::anyhow!("failed to publish to {}: {}", topic, e))
            })
    }
}

#[async_trait]
impl DevicePublisher for MqttDevicePublisher {
    async fn publish_response(&self, device_id: &str, body: &[u8]) -> GatewayResult<()> {
        self.publish(topic::response_topic(device_id), body).await
    }

    async fn publish_command(&self, device_id: &str, command: &[u8]) -> GatewayResult<()> {
        self.publish(topic::command_topic(device_id), command).await
    }
}
