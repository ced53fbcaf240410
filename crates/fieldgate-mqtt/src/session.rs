use fieldgate_domain::{GatewayError, GatewayResult};
use rumqttc::{AsyncClient, EventLoop, MqttOptions, TlsConfiguration, Transport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Connection settings for the mutually-authenticated broker session.
#[derive(Debug, Clone)]
pub struct MqttSessionConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Trust anchor the broker's certificate must chain to.
    pub ca_file: PathBuf,
    /// Gateway client certificate presented to the broker.
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub channel_capacity: usize,
}

/// Build the shared MQTT client and its event loop with mutual TLS.
///
/// The client is created once for the process lifetime; `EventLoop::poll`
/// re-establishes the connection after failures, so callers keep polling
/// instead of rebuilding the session.
pub fn connect_session(config: &MqttSessionConfig) -> GatewayResult<(AsyncClient, EventLoop)> {
    let ca = read_pem(&config.ca_file, "CA certificate")?;
    let client_cert = read_pem(&config.cert_file, "client certificate")?;
    let client_key = read_pem(&config.key_file, "client key")?;

    let mut options = MqttOptions::new(
        &config.client_id,
        &config.broker_host,
        config.broker_port,
    );
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);
    options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth: Some((client_cert, client_key)),
    }));

    info!(
        broker_host = %config.broker_host,
        broker_port = config.broker_port,
        client_id = %config.client_id,
        "configured mutual-TLS MQTT session"
    );

    Ok(AsyncClient::new(options, config.channel_capacity))
}

fn read_pem(path: &Path, what: &str) -> GatewayResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        GatewayError::Configuration(format!("cannot read {} at {}: {}", what, path.display(), e))
    })
}
