use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::{logs, runtime, trace, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Transport crates whose debug chatter would drown out the per-message
/// validation logs; clamped to warn unless RUST_LOG overrides.
const QUIET_DEPS: &[&str] = &["rumqttc", "hyper", "h2", "tower"];

pub struct TelemetrySettings {
    pub service_name: String,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    pub log_level: String,
}

/// Handle to the installed exporters.
///
/// Logging is always JSON-structured `tracing` output; with OTLP enabled
/// the same spans and events also flow to the collector, so one device
/// message can be followed from broker publication to backend response by
/// the `device_id` and `message_id` fields its root span carries. Call
/// [`Telemetry::shutdown`] before exit or buffered spans for the last
/// messages are lost.
pub struct Telemetry {
    tracer_provider: Option<trace::TracerProvider>,
    logger_provider: Option<logs::LoggerProvider>,
}

impl Telemetry {
    /// Install the global tracing subscriber, with OTLP export when enabled.
    pub fn init(settings: &TelemetrySettings) -> Result<Self> {
        let filter = gateway_filter(&settings.log_level);
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);

        if !settings.otel_enabled {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
            return Ok(Self {
                tracer_provider: None,
                logger_provider: None,
            });
        }

        // W3C trace context, so backend calls carry the message trace on.
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let resource = gateway_resource(&settings.service_name);

        let span_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&settings.otel_endpoint)
            .build()?;
        let tracer_provider = trace::TracerProvider::builder()
            .with_batch_exporter(span_exporter, runtime::Tokio)
            .with_sampler(trace::Sampler::AlwaysOn)
            .with_id_generator(trace::RandomIdGenerator::default())
            .with_resource(resource.clone())
            .build();

        let log_exporter = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(&settings.otel_endpoint)
            .build()?;
        let logger_provider = logs::LoggerProvider::builder()
            .with_batch_exporter(log_exporter, runtime::Tokio)
            .with_resource(resource)
            .build();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(
                tracing_opentelemetry::layer()
                    .with_tracer(tracer_provider.tracer("fieldgate-gateway")),
            )
            .with(OpenTelemetryTracingBridge::new(&logger_provider))
            .init();

        Ok(Self {
            tracer_provider: Some(tracer_provider),
            logger_provider: Some(logger_provider),
        })
    }

    /// Flush buffered spans and logs and stop the exporters.
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("tracer provider shutdown failed: {:?}", e);
            }
        }
        if let Some(provider) = self.logger_provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("logger provider shutdown failed: {:?}", e);
            }
        }
    }
}

/// RUST_LOG wins when set; otherwise the configured level, with the noisy
/// transport crates clamped to warn.
fn gateway_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = log_level.to_string();
        for dep in QUIET_DEPS {
            directives.push_str(&format!(",{}=warn", dep));
        }
        EnvFilter::new(directives)
    })
}

/// Resource attributes identifying this gateway instance to the collector.
fn gateway_resource(service_name: &str) -> Resource {
    Resource::new([
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            service_name.to_string(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_filter_quiets_transport_crates() {
        let filter = gateway_filter("debug").to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("rumqttc=warn"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn test_gateway_resource_carries_service_identity() {
        let resource = gateway_resource("fieldgate-test");
        let service_name = resource
            .iter()
            .find(|(key, _)| key.as_str() == "service.name")
            .map(|(_, value)| value.to_string());
        assert_eq!(service_name.as_deref(), Some("fieldgate-test"));

        let version = resource
            .iter()
            .find(|(key, _)| key.as_str() == "service.version")
            .map(|(_, value)| value.to_string());
        assert_eq!(version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
    }
}
