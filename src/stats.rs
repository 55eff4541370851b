//! # Run Statistics
//!
//! [`Counters`] is the accumulator a scheme's main loop updates on every
//! message. It is shared with the periodic reporter task, so every field is
//! an atomic: the loop is the only writer and the reporter only loads.
//!
//! [`SnapshotBuilder`] turns counter totals into [`StatsSnapshot`]s, keeping
//! track of what was already reported so each interval snapshot carries the
//! rate since the previous one.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::utils::{format_duration, format_message_rate, format_rate, per_second};

/// Which half of a test produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Writer,
    Reader,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Writer => write!(f, "writer"),
            Role::Reader => write!(f, "reader"),
        }
    }
}

/// Cumulative counter values at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub sent: u64,
    pub received: u64,
    pub in_order: u64,
    pub out_of_order: u64,
    pub duplicates: u64,
    pub lost: u64,
    pub late: u64,
    pub errors: u64,
    pub bytes: u64,
}

/// Lock-free accumulator shared between a scheme loop and its reporter.
#[derive(Debug, Default)]
pub struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    in_order: AtomicU64,
    out_of_order: AtomicU64,
    duplicates: AtomicU64,
    lost: AtomicU64,
    late: AtomicU64,
    errors: AtomicU64,
    bytes: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// A new highest sequence number, `skipped` numbers behind it never seen.
    pub fn record_in_order(&self, skipped: u64) {
        self.in_order.fetch_add(1, Ordering::Relaxed);
        if skipped > 0 {
            self.lost.fetch_add(skipped, Ordering::Relaxed);
        }
    }

    /// A number previously counted as lost arrived after all.
    pub fn record_out_of_order(&self) {
        self.out_of_order.fetch_add(1, Ordering::Relaxed);
        self.lost.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late(&self) {
        self.late.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the error count before this one was added.
    pub fn record_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed)
    }

    pub fn load(&self) -> Totals {
        Totals {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            in_order: self.in_order.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            late: self.late.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time aggregate emitted periodically and at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub run_id: String,
    pub scheme: String,
    pub role: Role,
    #[serde(rename = "final")]
    pub is_final: bool,
    #[serde(flatten)]
    pub totals: Totals,
    /// Messages sent (writer) or received (reader) since the previous
    /// snapshot; the whole run for the final one.
    pub interval_messages: u64,
    pub interval_bytes: u64,
    /// Time since the previous snapshot; the whole run for the final one.
    pub elapsed_ns: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StatsSnapshot {
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns)
    }

    pub fn messages_per_second(&self) -> f64 {
        per_second(self.interval_messages, self.elapsed())
    }

    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.interval_bytes, self.elapsed())
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = if self.is_final { "final" } else { "interval" };
        write!(
            f,
            "[{} {}] {} {}: {} ({})",
            self.scheme,
            self.role,
            label,
            format_duration(self.elapsed()),
            format_message_rate(self.messages_per_second()),
            format_rate(self.bytes_per_second()),
        )?;
        let t = &self.totals;
        match self.role {
            Role::Writer => write!(f, " sent={} errors={}", t.sent, t.errors),
            Role::Reader => write!(
                f,
                " received={} lost={} out_of_order={} duplicates={} late={} errors={}",
                t.received, t.lost, t.out_of_order, t.duplicates, t.late, t.errors
            ),
        }
    }
}

/// Produces snapshots for one run.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    run_id: String,
    scheme: &'static str,
    role: Role,
    last_at: Instant,
    last_messages: u64,
    last_bytes: u64,
}

impl SnapshotBuilder {
    pub fn new(scheme: &'static str, role: Role) -> Self {
        Self {
            run_id: crate::utils::generate_run_id(),
            scheme,
            role,
            last_at: Instant::now(),
            last_messages: 0,
            last_bytes: 0,
        }
    }

    fn messages(&self, totals: &Totals) -> u64 {
        match self.role {
            Role::Writer => totals.sent,
            Role::Reader => totals.received,
        }
    }

    /// Measure the next interval from now, discarding time spent waiting.
    pub fn restart_interval(&mut self) {
        self.last_at = Instant::now();
    }

    /// Snapshot covering the time since the previous interval snapshot.
    pub fn interval(&mut self, totals: Totals) -> StatsSnapshot {
        let now = Instant::now();
        let messages = self.messages(&totals);
        let snapshot = self.build(
            totals,
            false,
            messages.saturating_sub(self.last_messages),
            totals.bytes.saturating_sub(self.last_bytes),
            now.duration_since(self.last_at),
        );
        self.last_at = now;
        self.last_messages = messages;
        self.last_bytes = totals.bytes;
        snapshot
    }

    /// Snapshot covering the whole run, measured over `elapsed`.
    pub fn finish(&self, totals: Totals, elapsed: Duration) -> StatsSnapshot {
        let messages = self.messages(&totals);
        self.build(totals, true, messages, totals.bytes, elapsed)
    }

    fn build(
        &self,
        totals: Totals,
        is_final: bool,
        interval_messages: u64,
        interval_bytes: u64,
        elapsed: Duration,
    ) -> StatsSnapshot {
        StatsSnapshot {
            run_id: self.run_id.clone(),
            scheme: self.scheme.to_string(),
            role: self.role,
            is_final,
            totals,
            interval_messages,
            interval_bytes,
            elapsed_ns: elapsed.as_nanos() as u64,
            timestamp: chrono::Utc::now(),
        }
    }
}
