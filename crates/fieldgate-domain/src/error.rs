use thiserror::Error;

/// Why a device message was rejected. Peer-induced, per-message, never fatal.
///
/// The variants are ordered the way the validator runs its checks; when a
/// message would trip several checks the earliest one is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("device_id '{claimed}' does not match transport identity '{transport}'")]
    IdentityMismatch { claimed: String, transport: String },

    #[error("stale timestamp: delta {delta_secs}s exceeds budget {budget_secs}s")]
    Stale { delta_secs: i64, budget_secs: i64 },

    #[error("message_id already seen")]
    Replay,

    #[error("device not found in credential store")]
    UnknownDevice,

    #[error("signature mismatch")]
    BadSignature,
}

impl RejectReason {
    /// Stable label for logs and counters.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Malformed(_) => "malformed",
            RejectReason::IdentityMismatch { .. } => "identity_mismatch",
            RejectReason::Stale { .. } => "stale",
            RejectReason::Replay => "replay",
            RejectReason::UnknownDevice => "unknown_device",
            RejectReason::BadSignature => "bad_signature",
        }
    }
}

/// Infrastructure and downstream failures. Per-message unless noted.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The backend could not be reached or timed out. No retry in the core.
    #[error("backend transport error: {0}")]
    BackendTransport(#[source] anyhow::Error),

    /// Publishing to the device topic failed. Transient, per-message.
    #[error("publish error: {0}")]
    Publish(#[source] anyhow::Error),

    /// Invalid configuration or credential data. Fatal at startup only.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected failure; the message is abandoned and the process survives.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures on the backend→device command path. Each variant maps to one
/// HTTP status on the command API.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("command payload must be a JSON object")]
    InvalidPayload,

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("command publish failed: {0}")]
    PublishFailed(#[source] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
