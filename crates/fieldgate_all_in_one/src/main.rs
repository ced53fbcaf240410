mod config;
mod telemetry;

use config::ServiceConfig;
use fieldgate_domain::{
    BridgeConfig, BridgeService, Clock, CommandService, CredentialStore, DevicePublisher,
    GatewayStats, MessageValidator, ReplayCache, SystemClock,
};
use fieldgate_http::{serve_command_api, CommandApiState, HttpBackendForwarder};
use fieldgate_mqtt::{connect_session, MqttDevicePublisher, MqttIngress, MqttSessionConfig};
use fieldgate_runner::Runner;
use fieldgate_sqlite::SqliteCredentialStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{Telemetry, TelemetrySettings};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry = match Telemetry::init(&TelemetrySettings {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        broker_host = %config.broker_host,
        broker_port = config.broker_port,
        backend_base_url = %config.backend_base_url,
        command_listen_addr = %config.command_listen_addr,
        "starting fieldgate"
    );

    if let Err(e) = run(config, telemetry).await {
        error!(error = %format!("{:#}", e), "fieldgate exiting with error");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig, telemetry: Telemetry) -> anyhow::Result<()> {
    // Credential store first: nothing else is useful without it.
    info!(credentials_path = %config.credentials_path, "loading credential store");
    let credentials_impl = Arc::new(SqliteCredentialStore::load(&config.credentials_path).await?);
    info!(device_count = credentials_impl.len(), "credential store ready");
    let credentials: Arc<dyn CredentialStore> = credentials_impl;

    let replay_cache = Arc::new(ReplayCache::new(config.replay_cache_size));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stats = Arc::new(GatewayStats::new());

    // One broker session for the process lifetime; the ingress loop polls
    // it and the publisher shares its client handle.
    let (mqtt_client, mqtt_eventloop) = connect_session(&MqttSessionConfig {
        broker_host: config.broker_host.clone(),
        broker_port: config.broker_port,
        client_id: config.mqtt_client_id.clone(),
        keep_alive: Duration::from_secs(config.mqtt_keep_alive_seconds),
        ca_file: PathBuf::from(&config.ca_file),
        cert_file: PathBuf::from(&config.cert_file),
        key_file: PathBuf::from(&config.key_file),
        channel_capacity: 100,
    })?;
    let publisher: Arc<dyn DevicePublisher> = Arc::new(MqttDevicePublisher::new(mqtt_client.clone()));

    let backend = Arc::new(HttpBackendForwarder::new(
        &config.backend_base_url,
        Duration::from_secs(config.http_timeout_seconds),
    )?);

    let validator = MessageValidator::new(
        Arc::clone(&credentials),
        Arc::clone(&replay_cache),
        Arc::clone(&clock),
        config.skew_budget_seconds,
    );
    let bridge = Arc::new(BridgeService::new(
        validator,
        backend,
        Arc::clone(&publisher),
        Arc::clone(&stats),
        BridgeConfig {
            message_deadline: Duration::from_secs(config.message_deadline_seconds),
            publish_backend_errors: config.publish_backend_errors,
            notify_transport_failures: config.notify_transport_failures,
        },
    ));
    let ingress = MqttIngress::new(mqtt_client, mqtt_eventloop, bridge);

    let commands = Arc::new(CommandService::new(
        Arc::clone(&credentials),
        clock,
        publisher,
        Arc::clone(&stats),
    ));
    let command_state = CommandApiState {
        commands,
        bearer_token: Arc::new(config.command_bearer_token.clone()),
    };
    let command_listen_addr = config.command_listen_addr.clone();

    let stats_interval = Duration::from_secs(config.stats_interval_seconds);
    let stats_for_reporter = Arc::clone(&stats);

    Runner::new()
        .with_process("mqtt_ingress", move |ctx| ingress.run(ctx))
        .with_process("command_api", move |ctx| async move {
            serve_command_api(&command_listen_addr, command_state, ctx).await
        })
        .with_process("stats_reporter", move |ctx| async move {
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tokio::time::sleep(stats_interval) => {
                        let snapshot = stats_for_reporter.snapshot();
                        info!(
                            received = snapshot.received,
                            accepted = snapshot.accepted,
                            rejected = snapshot.rejected.total(),
                            rejected_malformed = snapshot.rejected.malformed,
                            rejected_identity_mismatch = snapshot.rejected.identity_mismatch,
                            rejected_stale = snapshot.rejected.stale,
                            rejected_replay = snapshot.rejected.replay,
                            rejected_unknown_device = snapshot.rejected.unknown_device,
                            rejected_bad_signature = snapshot.rejected.bad_signature,
                            forwarded = snapshot.forwarded,
                            abandoned = snapshot.abandoned,
                            commands_dispatched = snapshot.commands_dispatched,
                            "gateway statistics"
                        );
                    }
                }
            }
            Ok(())
        })
        .with_closer(move || async move {
            info!("flushing telemetry");
            telemetry.shutdown();
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await
}
