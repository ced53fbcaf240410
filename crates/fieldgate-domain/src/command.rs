use crate::error::CommandError;
use crate::ports::{Clock, CredentialStore, DevicePublisher};
use crate::signature;
use crate::stats::GatewayStats;
use crate::types::DispatchedCommand;
use serde::Serialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// On-wire shape of a backend→device command. The target device is implied
/// by the publication topic, so no `device_id` field is carried, and the
/// signed region is `decimal(timestamp) || message_id || payload`.
#[derive(Serialize)]
struct CommandEnvelope<'a> {
    timestamp: i64,
    message_id: &'a str,
    payload: &'a RawValue,
    signature: &'a str,
}

/// Builds, signs, and publishes backend-initiated commands.
///
/// The command path generates both the payload bytes and the MAC locally:
/// the payload is serialized exactly once and embedded verbatim in the
/// published envelope, so the bytes on the wire are the bytes that were
/// signed.
pub struct CommandService {
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn DevicePublisher>,
    stats: Arc<GatewayStats>,
}

impl CommandService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn DevicePublisher>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        Self {
            credentials,
            clock,
            publisher,
            stats,
        }
    }

    /// Sign `payload` for `device_id` and publish it to the device's
    /// command topic.
    pub async fn dispatch(
        &self,
        device_id: &str,
        payload: &serde_json::Value,
    ) -> Result<DispatchedCommand, CommandError> {
        if !payload.is_object() {
            return Err(CommandError::InvalidPayload);
        }

        let record = self
            .credentials
            .lookup(device_id)
            .await
            .map_err(|e| CommandError::Internal(anyhow::Error::new(e)))?
            .ok_or_else(|| CommandError::UnknownDevice(device_id.to_string()))?;

        // Serialize once; these exact bytes are both signed and published.
        let payload_text = serde_json::to_string(payload)
            .map_err(|e| CommandError::Internal(anyhow::Error::new(e)))?;
        let payload_raw = RawValue::from_string(payload_text.clone())
            .map_err(|e| CommandError::Internal(anyhow::Error::new(e)))?;

        let timestamp = self.clock.now_epoch_secs();
        let message_id = Uuid::new_v4().to_string();
        let signature = signature::sign_command(
            timestamp,
            &message_id,
            &payload_text,
            record.shared_secret.as_bytes(),
        );

        let wire_bytes = serde_json::to_vec(&CommandEnvelope {
            timestamp,
            message_id: &message_id,
            payload: &payload_raw,
            signature: &signature,
        })
        .map_err(|e| CommandError::Internal(anyhow::Error::new(e)))?;

        self.publisher
            .publish_command(device_id, &wire_bytes)
            .await
            .map_err(|e| CommandError::PublishFailed(anyhow::Error::new(e)))?;

        self.stats.record_command_dispatched();
        info!(
            device_id = %device_id,
            message_id = %message_id,
            payload_size = payload_text.len(),
            "command dispatched"
        );

        Ok(DispatchedCommand {
            device_id: device_id.to_string(),
            message_id,
            timestamp,
            wire_bytes,
        })
    }
}
