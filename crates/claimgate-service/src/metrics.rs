//! Issuance outcome counters.

use std::sync::atomic::{AtomicU64, Ordering};

use claimgate_core::error::{AppError, ErrorKind};
use claimgate_entity::claim::ClaimStatus;

use crate::issue::ClaimTicket;

/// Monotonic counters over issuance outcomes. Cheap enough to bump on
/// every attempt; surfaced through periodic log lines.
#[derive(Debug, Default)]
pub struct IssueMetrics {
    attempts: AtomicU64,
    issued: AtomicU64,
    pending: AtomicU64,
    exhausted: AtomicU64,
    out_of_window: AtomicU64,
    lock_timeouts: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of the issuance counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total issuance attempts.
    pub attempts: u64,
    /// Claims made durable synchronously.
    pub issued: u64,
    /// Claims admitted and handed to the fulfillment queue.
    pub pending: u64,
    /// Attempts rejected because capacity ran out.
    pub exhausted: u64,
    /// Attempts rejected outside the validity window.
    pub out_of_window: u64,
    /// Attempts that timed out waiting for the resource lock.
    pub lock_timeouts: u64,
    /// Attempts that failed for any other reason.
    pub failures: u64,
}

impl IssueMetrics {
    /// Create a zeroed metrics block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempt and classify its outcome.
    pub fn record(&self, outcome: &Result<ClaimTicket, AppError>) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Ok(ticket) if ticket.status == ClaimStatus::Pending => {
                self.pending.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {
                self.issued.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                let counter = match err.kind {
                    ErrorKind::Exhausted => &self.exhausted,
                    ErrorKind::OutOfWindow => &self.out_of_window,
                    ErrorKind::LockTimeout => &self.lock_timeouts,
                    _ => &self.failures,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            issued: self.issued.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            out_of_window: self.out_of_window.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
