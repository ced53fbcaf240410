use crate::error::RejectReason;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime message counters. Plain atomics so the hot path never
/// takes a lock for accounting. Rejections are counted per reason label.
#[derive(Debug, Default)]
pub struct GatewayStats {
    received: AtomicU64,
    accepted: AtomicU64,
    rejected: RejectionCounters,
    forwarded: AtomicU64,
    /// Messages dropped by internal errors or the per-message deadline,
    /// as opposed to peer-induced rejections.
    abandoned: AtomicU64,
    commands_dispatched: AtomicU64,
}

#[derive(Debug, Default)]
struct RejectionCounters {
    malformed: AtomicU64,
    identity_mismatch: AtomicU64,
    stale: AtomicU64,
    replay: AtomicU64,
    unknown_device: AtomicU64,
    bad_signature: AtomicU64,
}

/// Point-in-time copy of the counters, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub rejected: RejectionSnapshot,
    pub forwarded: u64,
    pub abandoned: u64,
    pub commands_dispatched: u64,
}

/// Rejections broken down by validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RejectionSnapshot {
    pub malformed: u64,
    pub identity_mismatch: u64,
    pub stale: u64,
    pub replay: u64,
    pub unknown_device: u64,
    pub bad_signature: u64,
}

impl RejectionSnapshot {
    pub fn total(&self) -> u64 {
        self.malformed
            + self.identity_mismatch
            + self.stale
            + self.replay
            + self.unknown_device
            + self.bad_signature
    }
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, reason: &RejectReason) {
        let counter = match reason {
            RejectReason::Malformed(_) => &self.rejected.malformed,
            RejectReason::IdentityMismatch { .. } => &self.rejected.identity_mismatch,
            RejectReason::Stale { .. } => &self.rejected.stale,
            RejectReason::Replay => &self.rejected.replay,
            RejectReason::UnknownDevice => &self.rejected.unknown_device,
            RejectReason::BadSignature => &self.rejected.bad_signature,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: RejectionSnapshot {
                malformed: self.rejected.malformed.load(Ordering::Relaxed),
                identity_mismatch: self.rejected.identity_mismatch.load(Ordering::Relaxed),
                stale: self.rejected.stale.load(Ordering::Relaxed),
                replay: self.rejected.replay.load(Ordering::Relaxed),
                unknown_device: self.rejected.unknown_device.load(Ordering::Relaxed),
                bad_signature: self.rejected.bad_signature.load(Ordering::Relaxed),
            },
            forwarded: self.forwarded.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
        }
    }
}
