use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Broker configuration
    /// MQTT broker host
    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    /// MQTT broker port (mutual-TLS listener)
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// MQTT client identifier
    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    /// MQTT keep-alive interval in seconds
    #[serde(default = "default_mqtt_keep_alive_seconds")]
    pub mqtt_keep_alive_seconds: u64,

    /// Trust anchor the broker certificate must chain to
    #[serde(default = "default_ca_file")]
    pub ca_file: String,

    /// Gateway client certificate
    #[serde(default = "default_cert_file")]
    pub cert_file: String,

    /// Gateway client key
    #[serde(default = "default_key_file")]
    pub key_file: String,

    // Backend configuration
    /// URL prefix for backend forwarding
    #[serde(default = "default_backend_base_url")]
    pub backend_base_url: String,

    /// Backend HTTP timeout in seconds
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    // Validation configuration
    /// Freshness tolerance in seconds
    #[serde(default = "default_skew_budget_seconds")]
    pub skew_budget_seconds: i64,

    /// Per-device replay identifier retention
    #[serde(default = "default_replay_cache_size")]
    pub replay_cache_size: usize,

    /// Whole-pipeline deadline per message in seconds
    #[serde(default = "default_message_deadline_seconds")]
    pub message_deadline_seconds: u64,

    /// Route non-2xx backend bodies to the device response topic
    #[serde(default)]
    pub publish_backend_errors: bool,

    /// Publish a failure notice when the backend is unreachable
    #[serde(default)]
    pub notify_transport_failures: bool,

    // Command API configuration
    /// Bind address for the backend-facing command API
    #[serde(default = "default_command_listen_addr")]
    pub command_listen_addr: String,

    /// Shared bearer token accepted by the command API
    #[serde(default = "default_command_bearer_token")]
    pub command_bearer_token: String,

    // Credential store configuration
    /// Path to the SQLite devices database
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,

    // Statistics
    /// Interval between statistics log lines in seconds
    #[serde(default = "default_stats_interval_seconds")]
    pub stats_interval_seconds: u64,

    // OpenTelemetry configuration
    /// OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// Service name for the OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// Broker defaults
fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    8883
}

fn default_mqtt_client_id() -> String {
    "fieldgate".to_string()
}

fn default_mqtt_keep_alive_seconds() -> u64 {
    30
}

fn default_ca_file() -> String {
    "certs/ca.crt".to_string()
}

fn default_cert_file() -> String {
    "certs/gateway.crt".to_string()
}

fn default_key_file() -> String {
    "certs/gateway.key".to_string()
}

// Backend defaults
fn default_backend_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    10
}

// Validation defaults
fn default_skew_budget_seconds() -> i64 {
    300
}

fn default_replay_cache_size() -> usize {
    1000
}

fn default_message_deadline_seconds() -> u64 {
    15
}

// Command API defaults
fn default_command_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_command_bearer_token() -> String {
    "change-me-in-production".to_string()
}

// Credential store defaults
fn default_credentials_path() -> String {
    "devices.db".to_string()
}

// Statistics defaults
fn default_stats_interval_seconds() -> u64 {
    60
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "fieldgate".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FIELDGATE"))
            .build()?
            .try_deserialize()
    }
}
