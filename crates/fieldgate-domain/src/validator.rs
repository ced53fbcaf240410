use crate::error::{GatewayResult, RejectReason};
use crate::ports::{Clock, CredentialStore};
use crate::replay::ReplayCache;
use crate::signature;
use crate::types::AcceptedMessage;
use crate::wire;
use std::sync::Arc;
use tracing::debug;

/// Terminal state of a single message validation.
#[derive(Debug)]
pub enum ValidationOutcome {
    Accepted(AcceptedMessage),
    Rejected(RejectReason),
}

/// Runs the fixed ordered sequence of five checks that bind transport
/// identity to application identity, enforce freshness and replay
/// protection, and verify the message signature.
///
/// Ordering: cheap structural checks first; freshness precedes replay so
/// obviously-stale messages never pollute the cache; the signature check is
/// last because it is the most expensive and requires a secret lookup. The
/// first failing check aborts and names the reason.
pub struct MessageValidator {
    credentials: Arc<dyn CredentialStore>,
    replay_cache: Arc<ReplayCache>,
    clock: Arc<dyn Clock>,
    skew_budget_secs: i64,
}

impl MessageValidator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        replay_cache: Arc<ReplayCache>,
        clock: Arc<dyn Clock>,
        skew_budget_secs: i64,
    ) -> Self {
        Self {
            credentials,
            replay_cache,
            clock,
            skew_budget_secs,
        }
    }

    /// Validate one raw publication received over a session authenticated
    /// as `tls_identity`.
    ///
    /// Side effects: exactly one replay-cache insertion when the message
    /// reaches check 4, zero otherwise. The insertion happens before the
    /// signature check, so a message whose signature fails still leaves its
    /// message_id recorded.
    pub async fn validate(
        &self,
        tls_identity: &str,
        raw: &[u8],
    ) -> GatewayResult<ValidationOutcome> {
        // 1. Parse and schema
        let message = match wire::parse_message(raw) {
            Ok(message) => message,
            Err(detail) => {
                return Ok(ValidationOutcome::Rejected(RejectReason::Malformed(detail)));
            }
        };

        // 2. Identity consistency: the self-claimed device_id must match
        // the transport identity. No credential lookup happens before this
        // check passes.
        if message.device_id != tls_identity {
            return Ok(ValidationOutcome::Rejected(RejectReason::IdentityMismatch {
                claimed: message.device_id,
                transport: tls_identity.to_string(),
            }));
        }

        // 3. Freshness: closed boundary on the accept side.
        let now = self.clock.now_epoch_secs();
        let delta_secs = message.timestamp - now;
        if delta_secs.abs() > self.skew_budget_secs {
            return Ok(ValidationOutcome::Rejected(RejectReason::Stale {
                delta_secs,
                budget_secs: self.skew_budget_secs,
            }));
        }

        // 4. Replay: atomic check-and-add keyed by (device_id, message_id).
        if !self
            .replay_cache
            .check_and_insert(&message.device_id, &message.message_id)
        {
            return Ok(ValidationOutcome::Rejected(RejectReason::Replay));
        }

        // 5. Signature: recompute the MAC over the exact on-wire payload
        // bytes and compare in constant time.
        let record = match self.credentials.lookup(&message.device_id).await? {
            Some(record) => record,
            None => return Ok(ValidationOutcome::Rejected(RejectReason::UnknownDevice)),
        };

        if !signature::verify_data_message(
            &message.device_id,
            message.timestamp,
            &message.message_id,
            message.payload.get(),
            record.shared_secret.as_bytes(),
            &message.signature,
        ) {
            return Ok(ValidationOutcome::Rejected(RejectReason::BadSignature));
        }

        debug!(
            device_id = %message.device_id,
            message_id = %message.message_id,
            "message passed all validation checks"
        );

        Ok(ValidationOutcome::Accepted(AcceptedMessage {
            device_id: message.device_id,
            message_id: message.message_id,
            timestamp: message.timestamp,
            payload: message.payload.get().to_string(),
        }))
    }
}
