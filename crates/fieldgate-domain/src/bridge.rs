use crate::error::RejectReason;
use crate::ports::{BackendForwarder, DevicePublisher};
use crate::stats::GatewayStats;
use crate::types::AcceptedMessage;
use crate::validator::{MessageValidator, ValidationOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Bridging policy knobs.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Deadline covering the whole pipeline for one message, larger than
    /// the backend HTTP timeout. On expiry the message is abandoned.
    pub message_deadline: Duration,
    /// Route non-2xx backend bodies to the device's response topic.
    pub publish_backend_errors: bool,
    /// Publish a failure notice to the device when the backend is
    /// unreachable.
    pub notify_transport_failures: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            message_deadline: Duration::from_secs(15),
            publish_backend_errors: false,
            notify_transport_failures: false,
        }
    }
}

/// Terminal state of one bridged publication.
#[derive(Debug)]
pub enum BridgeOutcome {
    Rejected(RejectReason),
    /// The backend answered; `responded` records whether its body was
    /// routed back to the device.
    Forwarded { status: u16, responded: bool },
    BackendUnreachable,
    DeadlineExceeded,
    /// Internal failure; the message was abandoned, the process survives.
    Abandoned,
}

/// Drives one publication through validate → forward → respond.
///
/// Every peer- or downstream-induced failure is fully handled here and
/// surfaced only as a structured log record and a counter increment; no
/// error propagates across messages.
pub struct BridgeService {
    validator: MessageValidator,
    backend: Arc<dyn BackendForwarder>,
    publisher: Arc<dyn DevicePublisher>,
    stats: Arc<GatewayStats>,
    config: BridgeConfig,
}

impl BridgeService {
    pub fn new(
        validator: MessageValidator,
        backend: Arc<dyn BackendForwarder>,
        publisher: Arc<dyn DevicePublisher>,
        stats: Arc<GatewayStats>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            validator,
            backend,
            publisher,
            stats,
            config,
        }
    }

    /// Process one raw publication under the per-message deadline.
    pub async fn handle_publication(&self, tls_identity: &str, raw: &[u8]) -> BridgeOutcome {
        self.stats.record_received();

        match tokio::time::timeout(
            self.config.message_deadline,
            self.process(tls_identity, raw),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                self.stats.record_abandoned();
                warn!(
                    transport_identity = %tls_identity,
                    deadline_secs = self.config.message_deadline.as_secs(),
                    "message deadline exceeded, abandoning"
                );
                BridgeOutcome::DeadlineExceeded
            }
        }
    }

    async fn process(&self, tls_identity: &str, raw: &[u8]) -> BridgeOutcome {
        // 1. Validate: the five ordered checks.
        let accepted = match self.validator.validate(tls_identity, raw).await {
            Ok(ValidationOutcome::Accepted(accepted)) => accepted,
            Ok(ValidationOutcome::Rejected(reason)) => {
                self.stats.record_rejected(&reason);
                self.log_rejection(tls_identity, &reason);
                return BridgeOutcome::Rejected(reason);
            }
            Err(err) => {
                self.stats.record_abandoned();
                error!(
                    transport_identity = %tls_identity,
                    error = %err,
                    "validation aborted by internal error"
                );
                return BridgeOutcome::Abandoned;
            }
        };
        self.stats.record_accepted();

        // 2. Forward the verbatim payload bytes to the backend.
        let response = match self
            .backend
            .forward(&accepted.device_id, &accepted.payload)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                error!(
                    device_id = %accepted.device_id,
                    message_id = %accepted.message_id,
                    error = %err,
                    "backend unreachable, message not forwarded"
                );
                if self.config.notify_transport_failures {
                    self.notify_failure(&accepted).await;
                }
                return BridgeOutcome::BackendUnreachable;
            }
        };
        self.stats.record_forwarded();

        // 3. Route the backend's answer to the device. A non-2xx status is
        // still successful bridging: the device observes the backend's
        // error, if configured.
        let should_respond = response.is_success() || self.config.publish_backend_errors;
        let mut responded = false;
        if should_respond {
            match self
                .publisher
                .publish_response(&accepted.device_id, response.body.as_bytes())
                .await
            {
                Ok(()) => responded = true,
                Err(err) => {
                    warn!(
                        device_id = %accepted.device_id,
                        error = %err,
                        "failed to publish backend response"
                    );
                }
            }
        }

        info!(
            device_id = %accepted.device_id,
            message_id = %accepted.message_id,
            backend_status = response.status,
            responded,
            "message bridged"
        );
        BridgeOutcome::Forwarded {
            status: response.status,
            responded,
        }
    }

    fn log_rejection(&self, tls_identity: &str, reason: &RejectReason) {
        match reason {
            RejectReason::Malformed(_) => info!(
                transport_identity = %tls_identity,
                reason = reason.label(),
                detail = %reason,
                "message rejected"
            ),
            _ => warn!(
                transport_identity = %tls_identity,
                reason = reason.label(),
                detail = %reason,
                "message rejected"
            ),
        }
    }

    async fn notify_failure(&self, accepted: &AcceptedMessage) {
        let notice = br#"{"error":"backend_unreachable"}"#;
        if let Err(err) = self
            .publisher
            .publish_response(&accepted.device_id, notice)
            .await
        {
            warn!(
                device_id = %accepted.device_id,
                error = %err,
                "failed to publish transport-failure notice"
            );
        }
    }

    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }
}

impl BridgeOutcome {
    /// Stable label for logs and counters.
    pub fn label(&self) -> &'static str {
        match self {
            BridgeOutcome::Rejected(_) => "rejected",
            BridgeOutcome::Forwarded { .. } => "forwarded",
            BridgeOutcome::BackendUnreachable => "backend_unreachable",
            BridgeOutcome::DeadlineExceeded => "deadline_exceeded",
            BridgeOutcome::Abandoned => "abandoned",
        }
    }
}
