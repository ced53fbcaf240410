use crate::topic::{self, DATA_TOPIC_FILTER};
use fieldgate_domain::BridgeService;
use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Subscribes to the device data topic and hands each publication to the
/// bridge as an `(identity, raw bytes)` tuple, untransformed.
///
/// Each publication runs on its own tracked task so a slow backend call
/// never stalls the broker event loop; shutdown drains the tracker before
/// returning.
pub struct MqttIngress {
    client: AsyncClient,
    eventloop: EventLoop,
    bridge: Arc<BridgeService>,
}

impl MqttIngress {
    pub fn new(client: AsyncClient, eventloop: EventLoop, bridge: Arc<BridgeService>) -> Self {
        Self {
            client,
            eventloop,
            bridge,
        }
    }

    /// Run the ingress loop until the token is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let tracker = TaskTracker::new();
        let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_CAP);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown signal received, stopping ingress");
                    break;
                }
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to broker");
                        backoff.reset();
                        if let Err(e) = self
                            .client
                            .subscribe(DATA_TOPIC_FILTER, QoS::AtLeastOnce)
                            .await
                        {
                            error!(error = %e, "failed to request subscription");
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        info!(topic = DATA_TOPIC_FILTER, "subscription acknowledged");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        dispatch_publication(
                            &tracker,
                            &self.bridge,
                            &publish.topic,
                            publish.payload.to_vec(),
                        );
                    }
                    Ok(_) => {
                        // Pings, outgoing acks and the rest of the protocol
                        // chatter.
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        warn!(
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "broker connection error, backing off"
                        );
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        // Stop accepting publications, then drain in-flight validations to
        // a terminal state.
        let _ = self.client.disconnect().await;
        tracker.close();
        tracker.wait().await;
        info!("ingress stopped");
        Ok(())
    }
}

/// Hand one publication to the bridge on its own tracked task.
///
/// Each message gets an independent root span rather than nesting under the
/// long-lived connection span.
fn dispatch_publication(
    tracker: &TaskTracker,
    bridge: &Arc<BridgeService>,
    raw_topic: &str,
    payload: Vec<u8>,
) {
    let parsed = match topic::parse_data_topic(raw_topic) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(topic = %raw_topic, error = %e, "unroutable topic, skipping message");
            return;
        }
    };

    let span = info_span!(
        parent: Span::none(),
        "device_message",
        device_id = %parsed.device_id,
        topic = %raw_topic,
        payload_size = payload.len(),
    );

    let bridge = Arc::clone(bridge);
    tracker.spawn(
        async move {
            let outcome = bridge
                .handle_publication(&parsed.device_id, &payload)
                .await;
            debug!(outcome = outcome.label(), "publication handled");
        }
        .instrument(span),
    );
}

/// Exponential backoff with full jitter: each delay is drawn uniformly from
/// zero to the current exponential ceiling.
struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let ceiling = self
            .base
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        let millis = ceiling.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}
