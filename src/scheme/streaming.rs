//! Paced, sequence-numbered streaming test.
//!
//! The writer stamps every message with a monotonically increasing sequence
//! number and sends at `streaming.messages_per_second`. The reader runs each
//! number through a [`SequenceWindow`] to account for loss, reordering and
//! duplication. Both sides emit an interval snapshot every
//! `streaming.report_interval_ms` and a final snapshot when they stop.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::{Arrival, PeriodicReporter, Scheme, SequenceWindow};
use crate::config::Config;
use crate::error::{InitError, TimeoutError};
use crate::message::{decode_sequence, SequencedMessage, HEADER_LEN};
use crate::report::Reporter;
use crate::shutdown::Shutdown;
use crate::stats::{Counters, Role, SnapshotBuilder, StatsSnapshot};
use crate::transport::{Reader, Writer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingSettings {
    /// `None` sends as fast as the transport accepts.
    pub send_interval: Option<Duration>,
    /// `None` runs until another stop condition hits.
    pub duration: Option<Duration>,
    pub message_count: Option<u64>,
    pub message_size: usize,
    pub report_interval: Duration,
    pub idle_timeout: Duration,
    /// `None` waits for the first message until shutdown.
    pub start_timeout: Option<Duration>,
    pub window: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        use crate::defaults;
        Self {
            send_interval: send_interval(defaults::MESSAGES_PER_SECOND),
            duration: Some(defaults::STREAMING_DURATION),
            message_count: None,
            message_size: defaults::STREAMING_MESSAGE_SIZE,
            report_interval: defaults::REPORT_INTERVAL,
            idle_timeout: defaults::IDLE_TIMEOUT,
            start_timeout: None,
            window: defaults::WINDOW,
        }
    }
}

fn send_interval(messages_per_second: u64) -> Option<Duration> {
    match 1_000_000_000u64.checked_div(messages_per_second) {
        Some(nanos) if nanos > 0 => Some(Duration::from_nanos(nanos)),
        _ => None,
    }
}

impl StreamingSettings {
    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        use crate::defaults;

        let rate = config.get_usize(
            "streaming.messages_per_second",
            defaults::MESSAGES_PER_SECOND as usize,
        )?;
        let duration =
            config.get_duration_ms("streaming.duration_ms", defaults::STREAMING_DURATION)?;
        let count = config.get_usize("streaming.message_count", 0)?;

        let settings = Self {
            send_interval: send_interval(rate as u64),
            duration: Some(duration).filter(|d| !d.is_zero()),
            message_count: Some(count as u64).filter(|c| *c > 0),
            message_size: config
                .get_usize("streaming.message_size", defaults::STREAMING_MESSAGE_SIZE)?,
            report_interval: config
                .get_duration_ms("streaming.report_interval_ms", defaults::REPORT_INTERVAL)?,
            idle_timeout: config
                .get_duration_ms("streaming.idle_timeout_ms", defaults::IDLE_TIMEOUT)?,
            start_timeout: Some(config.get_duration_ms("streaming.start_timeout_ms", Duration::ZERO)?)
                .filter(|d| !d.is_zero()),
            window: config.get_usize("streaming.window", defaults::WINDOW as usize)? as u64,
        };

        if settings.message_size < HEADER_LEN {
            return Err(InitError::Invalid(format!(
                "streaming.message_size must be at least {} bytes, got {}",
                HEADER_LEN, settings.message_size
            )));
        }
        if settings.report_interval.is_zero() {
            return Err(InitError::Invalid(
                "streaming.report_interval_ms must be positive".into(),
            ));
        }
        if settings.idle_timeout.is_zero() {
            return Err(InitError::Invalid(
                "streaming.idle_timeout_ms must be positive".into(),
            ));
        }
        if settings.window == 0 {
            return Err(InitError::Invalid("streaming.window must be positive".into()));
        }
        Ok(settings)
    }
}

#[derive(Debug, Default)]
pub struct StreamingScheme {
    settings: StreamingSettings,
    reporter: Arc<Reporter>,
}

impl StreamingScheme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &StreamingSettings {
        &self.settings
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

#[async_trait]
impl Scheme for StreamingScheme {
    fn init(&mut self, config: &Config) -> Result<(), InitError> {
        self.settings = StreamingSettings::from_config(config)?;
        self.reporter = Arc::new(Reporter::from_config(config)?);
        debug!("Streaming scheme settings: {:?}", self.settings);
        Ok(())
    }

    async fn run_writer(&mut self, writer: &mut dyn Writer, mut shutdown: Shutdown) -> StatsSnapshot {
        let settings = self.settings.clone();
        let counters = Arc::new(Counters::new());
        let builder = SnapshotBuilder::new(self.name(), Role::Writer);
        let mut message = SequencedMessage::new(settings.message_size);

        info!(
            "Streaming {} byte messages via {} ({})",
            message.len(),
            writer.name(),
            match settings.send_interval {
                Some(interval) => format!("one every {:?}", interval),
                None => "unpaced".to_string(),
            }
        );

        let start = Instant::now();
        let deadline = settings.duration.map(|d| start + d);
        let periodic = PeriodicReporter::spawn(
            counters.clone(),
            self.reporter.clone(),
            builder.clone(),
            settings.report_interval,
        );

        let mut sequence: u64 = 0;
        let mut last_send: Option<Instant> = None;
        loop {
            if shutdown.is_triggered() {
                info!("Shutdown requested after {} messages", sequence);
                break;
            }
            if settings.message_count.map_or(false, |limit| sequence >= limit) {
                break;
            }

            // Pace from the previous send, not from the start of the run, so
            // a stall is never followed by a burst.
            if let (Some(interval), Some(previous)) = (settings.send_interval, last_send) {
                let due = previous + interval;
                let wake = deadline.map_or(due, |d| d.min(due));
                tokio::select! {
                    _ = shutdown.wait() => {
                        info!("Shutdown requested after {} messages", sequence);
                        break;
                    }
                    _ = sleep_until(wake) => {}
                }
            }
            if deadline.map_or(false, |d| Instant::now() >= d) {
                break;
            }

            let payload = match message.stamp(sequence) {
                Ok(payload) => payload,
                Err(e) => {
                    counters.record_error();
                    warn!("Failed to encode sequence {}: {}", sequence, e);
                    sequence += 1;
                    continue;
                }
            };
            last_send = Some(Instant::now());
            match writer.write(payload).await {
                Ok(_) => counters.record_sent(payload.len()),
                Err(e) => {
                    if counters.record_error() == 0 {
                        warn!("Write of sequence {} failed: {}", sequence, e);
                    } else {
                        debug!("Write of sequence {} failed: {}", sequence, e);
                    }
                }
            }
            // Consumed even on failure; the reader sees the gap as loss.
            sequence += 1;
        }

        periodic.stop().await;
        let snapshot = builder.finish(counters.load(), start.elapsed());
        self.reporter.report(&snapshot);
        snapshot
    }

    async fn run_reader(&mut self, reader: &mut dyn Reader, mut shutdown: Shutdown) -> StatsSnapshot {
        let settings = self.settings.clone();
        let counters = Arc::new(Counters::new());
        let mut builder = SnapshotBuilder::new(self.name(), Role::Reader);
        let mut window = SequenceWindow::new(settings.window);

        info!("Waiting for stream via {}", reader.name());

        let mut periodic: Option<PeriodicReporter> = None;
        let mut first: Option<Instant> = None;
        let mut last: Option<Instant> = None;
        loop {
            if shutdown.is_triggered() {
                info!("Shutdown requested");
                break;
            }

            let end = match (first, settings.duration) {
                (Some(first), Some(duration)) => Some(first + duration),
                _ => None,
            };
            if end.map_or(false, |end| Instant::now() >= end) {
                info!("Stream duration of {:?} elapsed", settings.duration);
                break;
            }

            // Until the first message arrives only the start timeout applies.
            let outcome = if first.is_none() {
                let started = async {
                    match settings.start_timeout {
                        Some(limit) => timeout(limit, reader.read()).await.ok(),
                        None => Some(reader.read().await),
                    }
                };
                tokio::select! {
                    _ = shutdown.wait() => {
                        info!("Shutdown requested");
                        break;
                    }
                    outcome = started => match (outcome, settings.start_timeout) {
                        (Some(outcome), _) => Some(outcome),
                        (None, limit) => {
                            warn!(
                                "No stream started: {}",
                                TimeoutError(limit.unwrap_or(settings.idle_timeout))
                            );
                            break;
                        }
                    },
                }
            } else {
                let idle = Instant::now() + settings.idle_timeout;
                let deadline = end.map_or(idle, |end| end.min(idle));
                tokio::select! {
                    _ = shutdown.wait() => {
                        info!("Shutdown requested");
                        break;
                    }
                    outcome = timeout_at(deadline, reader.read()) => outcome.ok(),
                }
            };

            let message = match outcome {
                // Past the duration the loop head logs and stops.
                None if end.map_or(false, |end| Instant::now() >= end) => continue,
                None => {
                    info!("{}", TimeoutError(settings.idle_timeout));
                    break;
                }
                Some(Ok(message)) => message,
                Some(Err(e)) if e.is_terminal() => {
                    info!("Reader stopped: {}", e);
                    break;
                }
                Some(Err(e)) => {
                    if counters.record_error() == 0 {
                        warn!("Read failed: {}", e);
                    } else {
                        debug!("Read failed: {}", e);
                    }
                    continue;
                }
            };

            let now = Instant::now();
            if first.is_none() {
                first = Some(now);
                debug!("First message received, stream started");
                builder.restart_interval();
                periodic = Some(PeriodicReporter::spawn(
                    counters.clone(),
                    self.reporter.clone(),
                    builder.clone(),
                    settings.report_interval,
                ));
            }
            last = Some(now);

            let sequence = match decode_sequence(&message) {
                Ok(sequence) => sequence,
                Err(e) => {
                    if counters.record_error() == 0 {
                        warn!("Discarding message: {}", e);
                    } else {
                        debug!("Discarding message: {}", e);
                    }
                    continue;
                }
            };
            counters.record_received(message.len());
            match window.observe(sequence) {
                Arrival::InOrder { skipped } => counters.record_in_order(skipped),
                Arrival::OutOfOrder => counters.record_out_of_order(),
                Arrival::Duplicate => counters.record_duplicate(),
                Arrival::Late => counters.record_late(),
            }
        }

        if let Some(periodic) = periodic {
            periodic.stop().await;
        }
        let elapsed = match (first, last) {
            (Some(first), Some(last)) => last.duration_since(first),
            _ => Duration::ZERO,
        };
        let snapshot = builder.finish(counters.load(), elapsed);
        self.reporter.report(&snapshot);
        snapshot
    }

    fn name(&self) -> &'static str {
        "streaming"
    }
}
