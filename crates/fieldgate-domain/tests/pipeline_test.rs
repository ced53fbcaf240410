//! End-to-end pipeline tests: raw publication bytes in, backend forwarding
//! and device responses out, with mocked transport adapters.

use fieldgate_domain::signature::sign_data_message;
use fieldgate_domain::{
    BackendResponse, BridgeConfig, BridgeOutcome, BridgeService, DeviceRecord, GatewayStats,
    MessageValidator, MockBackendForwarder, MockClock, MockCredentialStore, MockDevicePublisher,
    RejectReason, ReplayCache,
};
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 1727712050;
const SKEW: i64 = 300;
const DEVICE: &str = "sensor_001";
const SECRET: &str = "supersecretkey123";
const MSG_ID: &str = "550e8400-e29b-41d4-a716-446655440000";
const PAYLOAD: &str = r#"{"temperature":22.5,"humidity":60}"#;

fn signed_message(device_id: &str, timestamp: i64, message_id: &str, payload: &str) -> Vec<u8> {
    let sig = sign_data_message(device_id, timestamp, message_id, payload, SECRET.as_bytes());
    format!(
        r#"{{"device_id":"{}","timestamp":{},"message_id":"{}","payload":{},"signature":"{}"}}"#,
        device_id, timestamp, message_id, payload, sig,
    )
    .into_bytes()
}

struct Harness {
    credentials: MockCredentialStore,
    backend: MockBackendForwarder,
    publisher: MockDevicePublisher,
    config: BridgeConfig,
}

impl Harness {
    fn new() -> Self {
        let mut credentials = MockCredentialStore::new();
        credentials.expect_lookup().returning(|id| {
            if id == DEVICE {
                Ok(Some(DeviceRecord {
                    device_id: DEVICE.to_string(),
                    shared_secret: SECRET.to_string(),
                    created_at: 1700000000,
                }))
            } else {
                Ok(None)
            }
        });
        Self {
            credentials,
            backend: MockBackendForwarder::new(),
            publisher: MockDevicePublisher::new(),
            config: BridgeConfig::default(),
        }
    }

    fn build(self) -> (BridgeService, Arc<GatewayStats>) {
        let mut clock = MockClock::new();
        clock.expect_now_epoch_secs().returning(|| NOW);

        let validator = MessageValidator::new(
            Arc::new(self.credentials),
            Arc::new(ReplayCache::new(1000)),
            Arc::new(clock),
            SKEW,
        );
        let stats = Arc::new(GatewayStats::new());
        let bridge = BridgeService::new(
            validator,
            Arc::new(self.backend),
            Arc::new(self.publisher),
            Arc::clone(&stats),
            self.config,
        );
        (bridge, stats)
    }
}

// S1: a fully valid message is forwarded with the exact payload bytes and
// the backend's answer is republished to the device.
#[tokio::test]
async fn test_happy_path_forwards_and_responds() {
    let mut harness = Harness::new();
    harness
        .backend
        .expect_forward()
        .withf(|device_id, payload| device_id == DEVICE && payload == PAYLOAD)
        .times(1)
        .returning(|_, _| {
            Ok(BackendResponse {
                status: 200,
                body: r#"{"status":"ok"}"#.to_string(),
            })
        });
    harness
        .publisher
        .expect_publish_response()
        .withf(|device_id, body| device_id == DEVICE && body == br#"{"status":"ok"}"#)
        .times(1)
        .returning(|_, _| Ok(()));

    let (bridge, stats) = harness.build();
    let raw = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;

    assert!(matches!(
        outcome,
        BridgeOutcome::Forwarded { status: 200, responded: true }
    ));
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.received, 1);
    assert_eq!(snapshot.accepted, 1);
    assert_eq!(snapshot.forwarded, 1);
    assert_eq!(snapshot.rejected.total(), 0);
}

// S2: a stale message never reaches the backend and leaves no replay entry.
#[tokio::test]
async fn test_stale_message_is_not_forwarded() {
    let mut harness = Harness::new();
    // Exactly one forward: the later, fresh resubmission. The stale message
    // itself must never reach the backend.
    harness.backend.expect_forward().times(1).returning(|_, _| {
        Ok(BackendResponse {
            status: 200,
            body: "{}".to_string(),
        })
    });
    harness
        .publisher
        .expect_publish_response()
        .times(1)
        .returning(|_, _| Ok(()));

    let (bridge, stats) = harness.build();
    let raw = signed_message(DEVICE, 1727711000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;

    match outcome {
        BridgeOutcome::Rejected(RejectReason::Stale { delta_secs, .. }) => {
            assert_eq!(delta_secs, -1050);
        }
        other => panic!("expected stale rejection, got {:?}", other),
    }
    assert_eq!(stats.snapshot().rejected.stale, 1);
    assert_eq!(stats.snapshot().forwarded, 0);

    // Cache unchanged by the stale attempt: the same message_id with a
    // fresh timestamp is accepted and forwarded.
    let fresh = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let second = bridge.handle_publication(DEVICE, &fresh).await;
    assert!(matches!(second, BridgeOutcome::Forwarded { .. }));
}

// S3: identical bytes submitted twice yield one acceptance and one replay
// rejection; the backend sees exactly one POST.
#[tokio::test]
async fn test_replay_is_forwarded_exactly_once() {
    let mut harness = Harness::new();
    harness.backend.expect_forward().times(1).returning(|_, _| {
        Ok(BackendResponse {
            status: 200,
            body: "{}".to_string(),
        })
    });
    harness
        .publisher
        .expect_publish_response()
        .times(1)
        .returning(|_, _| Ok(()));

    let (bridge, stats) = harness.build();
    let raw = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);

    let first = bridge.handle_publication(DEVICE, &raw).await;
    assert!(matches!(first, BridgeOutcome::Forwarded { .. }));

    let second = bridge.handle_publication(DEVICE, &raw).await;
    assert!(matches!(
        second,
        BridgeOutcome::Rejected(RejectReason::Replay)
    ));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.received, 2);
    assert_eq!(snapshot.accepted, 1);
    assert_eq!(snapshot.rejected.replay, 1);
    assert_eq!(snapshot.rejected.total(), 1);
    assert_eq!(snapshot.forwarded, 1);
}

// S4 + S4b: a tampered payload is rejected on the signature check, and the
// replay entry recorded at check 4 now blocks the original bytes too.
#[tokio::test]
async fn test_tampered_payload_burns_message_id() {
    let mut harness = Harness::new();
    harness.backend.expect_forward().times(0);
    harness.publisher.expect_publish_response().times(0);

    let (bridge, _stats) = harness.build();
    let original = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let tampered = String::from_utf8(original.clone())
        .unwrap()
        .replace("22.5", "99.9")
        .into_bytes();

    let first = bridge.handle_publication(DEVICE, &tampered).await;
    assert!(matches!(
        first,
        BridgeOutcome::Rejected(RejectReason::BadSignature)
    ));

    let second = bridge.handle_publication(DEVICE, &original).await;
    assert!(matches!(
        second,
        BridgeOutcome::Rejected(RejectReason::Replay)
    ));
}

// S5: identity mismatch rejects before any credential lookup.
#[tokio::test]
async fn test_identity_mismatch_skips_lookup_and_backend() {
    let mut credentials = MockCredentialStore::new();
    credentials.expect_lookup().times(0);
    let mut harness = Harness::new();
    harness.credentials = credentials;
    harness.backend.expect_forward().times(0);
    harness.publisher.expect_publish_response().times(0);

    let (bridge, _stats) = harness.build();
    let raw = signed_message("sensor_002", 1727712000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;

    match outcome {
        BridgeOutcome::Rejected(RejectReason::IdentityMismatch { claimed, transport }) => {
            assert_eq!(claimed, "sensor_002");
            assert_eq!(transport, DEVICE);
        }
        other => panic!("expected identity mismatch, got {:?}", other),
    }
}

// Backend non-2xx is successful bridging; the body is dropped unless
// publish_backend_errors is set.
#[tokio::test]
async fn test_backend_error_body_dropped_by_default() {
    let mut harness = Harness::new();
    harness.backend.expect_forward().times(1).returning(|_, _| {
        Ok(BackendResponse {
            status: 503,
            body: r#"{"error":"overloaded"}"#.to_string(),
        })
    });
    harness.publisher.expect_publish_response().times(0);

    let (bridge, stats) = harness.build();
    let raw = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;

    assert!(matches!(
        outcome,
        BridgeOutcome::Forwarded { status: 503, responded: false }
    ));
    assert_eq!(stats.snapshot().forwarded, 1);
}

#[tokio::test]
async fn test_backend_error_body_routed_when_enabled() {
    let mut harness = Harness::new();
    harness.config.publish_backend_errors = true;
    harness.backend.expect_forward().times(1).returning(|_, _| {
        Ok(BackendResponse {
            status: 503,
            body: r#"{"error":"overloaded"}"#.to_string(),
        })
    });
    harness
        .publisher
        .expect_publish_response()
        .withf(|device_id, body| device_id == DEVICE && body == br#"{"error":"overloaded"}"#)
        .times(1)
        .returning(|_, _| Ok(()));

    let (bridge, _stats) = harness.build();
    let raw = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;
    assert!(matches!(
        outcome,
        BridgeOutcome::Forwarded { status: 503, responded: true }
    ));
}

// Backend transport failure: no retry, no response by default, and a
// failure notice only when configured.
#[tokio::test]
async fn test_backend_transport_failure_silent_by_default() {
    let mut harness = Harness::new();
    harness.backend.expect_forward().times(1).returning(|_, _| {
        Err(fieldgate_domain::GatewayError::BackendTransport(
            anyhow::anyhow!("connection refused"),
        ))
    });
    harness.publisher.expect_publish_response().times(0);

    let (bridge, stats) = harness.build();
    let raw = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;

    assert!(matches!(outcome, BridgeOutcome::BackendUnreachable));
    assert_eq!(stats.snapshot().forwarded, 0);
}

#[tokio::test]
async fn test_backend_transport_failure_notice_when_enabled() {
    let mut harness = Harness::new();
    harness.config.notify_transport_failures = true;
    harness.backend.expect_forward().times(1).returning(|_, _| {
        Err(fieldgate_domain::GatewayError::BackendTransport(
            anyhow::anyhow!("timed out"),
        ))
    });
    harness
        .publisher
        .expect_publish_response()
        .withf(|device_id, body| device_id == DEVICE && body == br#"{"error":"backend_unreachable"}"#)
        .times(1)
        .returning(|_, _| Ok(()));

    let (bridge, _stats) = harness.build();
    let raw = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;
    assert!(matches!(outcome, BridgeOutcome::BackendUnreachable));
}

// A backend that stalls past the per-message deadline causes the message to
// be abandoned.
#[tokio::test]
async fn test_message_deadline_abandons_slow_backend() {
    struct SlowBackend;

    #[async_trait::async_trait]
    impl fieldgate_domain::BackendForwarder for SlowBackend {
        async fn forward(
            &self,
            _device_id: &str,
            _payload: &str,
        ) -> fieldgate_domain::GatewayResult<BackendResponse> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(BackendResponse {
                status: 200,
                body: "{}".to_string(),
            })
        }
    }

    let mut credentials = MockCredentialStore::new();
    credentials.expect_lookup().returning(|_| {
        Ok(Some(DeviceRecord {
            device_id: DEVICE.to_string(),
            shared_secret: SECRET.to_string(),
            created_at: 1700000000,
        }))
    });
    let mut clock = MockClock::new();
    clock.expect_now_epoch_secs().returning(|| NOW);
    let mut publisher = MockDevicePublisher::new();
    publisher.expect_publish_response().times(0);

    let validator = MessageValidator::new(
        Arc::new(credentials),
        Arc::new(ReplayCache::new(1000)),
        Arc::new(clock),
        SKEW,
    );
    let bridge = BridgeService::new(
        validator,
        Arc::new(SlowBackend),
        Arc::new(publisher),
        Arc::new(GatewayStats::new()),
        BridgeConfig {
            message_deadline: Duration::from_millis(50),
            ..BridgeConfig::default()
        },
    );

    let raw = signed_message(DEVICE, 1727712000, MSG_ID, PAYLOAD);
    let outcome = bridge.handle_publication(DEVICE, &raw).await;
    assert!(matches!(outcome, BridgeOutcome::DeadlineExceeded));
}
