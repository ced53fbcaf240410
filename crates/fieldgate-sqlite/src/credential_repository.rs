use async_trait::async_trait;
use fieldgate_domain::{CredentialStore, DeviceRecord, GatewayError, GatewayResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use tracing::{debug, info};

/// Secrets shorter than this are rejected at load time.
const MIN_SECRET_BYTES: usize = 16;

/// Credential store backed by the `devices` SQLite table.
///
/// The table is read exactly once at startup into an immutable map; the
/// connection is closed afterwards and every lookup is served from memory.
/// There is no dynamic reload.
pub struct SqliteCredentialStore {
    devices: HashMap<String, DeviceRecord>,
}

impl SqliteCredentialStore {
    /// Open the database at `path` read-only and load all device records.
    pub async fn load(path: &str) -> GatewayResult<Self> {
        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                GatewayError::Configuration(format!(
                    "cannot open credential store at {}: {}",
                    path, e
                ))
            })?;

        let store = Self::from_pool(&pool).await;
        pool.close().await;
        store
    }

    /// Load all device records from an already-open pool.
    pub async fn from_pool(pool: &SqlitePool) -> GatewayResult<Self> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT device_id, shared_secret, created_at FROM devices")
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    GatewayError::Configuration(format!("failed to read devices table: {}", e))
                })?;

        let mut devices = HashMap::with_capacity(rows.len());
        for (device_id, shared_secret, created_at) in rows {
            if device_id.is_empty() {
                return Err(GatewayError::Configuration(
                    "devices table contains an empty device_id".to_string(),
                ));
            }
            if shared_secret.len() < MIN_SECRET_BYTES {
                return Err(GatewayError::Configuration(format!(
                    "shared secret for device '{}' is shorter than {} bytes",
                    device_id, MIN_SECRET_BYTES
                )));
            }
            let record = DeviceRecord {
                device_id: device_id.clone(),
                shared_secret,
                created_at,
            };
            if devices.insert(device_id.clone(), record).is_some() {
                return Err(GatewayError::Configuration(format!(
                    "duplicate device_id in devices table: {}",
                    device_id
                )));
            }
        }

        info!(device_count = devices.len(), "credential store loaded");
        Ok(Self { devices })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn lookup(&self, device_id: &str) -> GatewayResult<Option<DeviceRecord>> {
        let record = self.devices.get(device_id).cloned();
        debug!(device_id, found = record.is_some(), "credential lookup");
        Ok(record)
    }
}
