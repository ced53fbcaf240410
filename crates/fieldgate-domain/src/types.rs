/// A provisioned device as loaded from the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: String,
    /// Shared HMAC secret, at least 16 bytes. Used as a MAC key, never compared.
    pub shared_secret: String,
    /// Seconds since the epoch at provisioning time.
    pub created_at: i64,
}

/// A device message that passed all five validation checks.
///
/// `payload` holds the exact byte region the device serialized and signed;
/// it is forwarded to the backend verbatim and must never be re-serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMessage {
    pub device_id: String,
    pub message_id: String,
    pub timestamp: i64,
    pub payload: String,
}

/// What the backend answered. Any HTTP status lands here; only transport
/// failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A signed command as published to a device's command topic.
///
/// Commands carry no `device_id` field; the target is implied by the topic
/// and the signed region is `decimal(timestamp) || message_id || payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedCommand {
    pub device_id: String,
    pub message_id: String,
    pub timestamp: i64,
    /// The exact bytes published to the command topic.
    pub wire_bytes: Vec<u8>,
}
