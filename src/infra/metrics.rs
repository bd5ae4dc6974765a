//! Lock-free counters for classification, custody, and notification activity
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Lock-free metrics collector
#[derive(Default)]
pub struct Metrics {
    /// Rows matched by an existing rule
    rows_classified: AtomicU64,
    /// Rows routed to manual classification
    rows_pending: AtomicU64,
    /// Pasted lines dropped by the row parser
    rows_dropped: AtomicU64,
    /// Derived rules written during confirmation
    rules_persisted: AtomicU64,
    /// Confirmations aborted and rolled back
    confirmations_rolled_back: AtomicU64,
    /// Parcels created from confirmed rows
    parcels_created: AtomicU64,
    /// Parcels whose status or archive flag actually changed
    transitions_applied: AtomicU64,
    /// Outbound messages built
    messages_generated: AtomicU64,
    /// Parcels excluded from a batch for lack of a phone
    messages_skipped: AtomicU64,
}

/// Point-in-time view of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub rows_classified: u64,
    pub rows_pending: u64,
    pub rows_dropped: u64,
    pub rules_persisted: u64,
    pub confirmations_rolled_back: u64,
    pub parcels_created: u64,
    pub transitions_applied: u64,
    pub messages_generated: u64,
    pub messages_skipped: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            rows_classified = %self.rows_classified,
            rows_pending = %self.rows_pending,
            rows_dropped = %self.rows_dropped,
            rules_persisted = %self.rules_persisted,
            confirmations_rolled_back = %self.confirmations_rolled_back,
            parcels_created = %self.parcels_created,
            transitions_applied = %self.transitions_applied,
            messages_generated = %self.messages_generated,
            messages_skipped = %self.messages_skipped,
            "metrics"
        );
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_classification(&self, classified: usize, pending: usize, dropped: usize) {
        self.rows_classified.fetch_add(classified as u64, Ordering::Relaxed);
        self.rows_pending.fetch_add(pending as u64, Ordering::Relaxed);
        self.rows_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rules_persisted(&self, count: usize) {
        self.rules_persisted.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rollback(&self) {
        self.confirmations_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_parcels_created(&self, count: usize) {
        self.parcels_created.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transitions(&self, count: usize) {
        self.transitions_applied.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_messages(&self, generated: usize, skipped: usize) {
        self.messages_generated.fetch_add(generated as u64, Ordering::Relaxed);
        self.messages_skipped.fetch_add(skipped as u64, Ordering::Relaxed);
    }

    /// Read all counters without resetting
    pub fn report(&self) -> MetricsSummary {
        MetricsSummary {
            rows_classified: self.rows_classified.load(Ordering::Relaxed),
            rows_pending: self.rows_pending.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
            rules_persisted: self.rules_persisted.load(Ordering::Relaxed),
            confirmations_rolled_back: self.confirmations_rolled_back.load(Ordering::Relaxed),
            parcels_created: self.parcels_created.load(Ordering::Relaxed),
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            messages_generated: self.messages_generated.load(Ordering::Relaxed),
            messages_skipped: self.messages_skipped.load(Ordering::Relaxed),
        }
    }
}
