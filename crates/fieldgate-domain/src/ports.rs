use crate::error::GatewayResult;
use crate::types::{BackendResponse, DeviceRecord};
use async_trait::async_trait;

/// Resolves a device identifier to its provisioned record.
/// Infrastructure (fieldgate-sqlite) loads the store once at startup and
/// implements this trait over the immutable result.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a device by ID. `Ok(None)` means the device is not provisioned.
    async fn lookup(&self, device_id: &str) -> GatewayResult<Option<DeviceRecord>>;
}

/// Wall-clock reading used for freshness checks. Not assumed monotonic;
/// backward jumps only reject fresh messages until realignment.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current wall-clock seconds since the epoch.
    fn now_epoch_secs(&self) -> i64;
}

/// Forwards a validated payload to the trusting backend.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BackendForwarder: Send + Sync {
    /// POST the verbatim payload bytes for `device_id`. Any HTTP status is
    /// `Ok`; only network-level failures are errors.
    async fn forward(&self, device_id: &str, payload: &str) -> GatewayResult<BackendResponse>;
}

/// Publishes gateway-originated messages to a device's egress topics.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DevicePublisher: Send + Sync {
    /// Publish `body` to `device/{device_id}/response`.
    async fn publish_response(&self, device_id: &str, body: &[u8]) -> GatewayResult<()>;

    /// Publish signed command bytes to `device/{device_id}/command`.
    async fn publish_command(&self, device_id: &str, command: &[u8]) -> GatewayResult<()>;
}
