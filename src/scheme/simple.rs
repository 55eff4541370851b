//! Fixed-count burst test.
//!
//! The writer sends `simple.message_count` messages of
//! `simple.message_size` bytes back-to-back and reports the aggregate
//! throughput. The reader counts what actually arrives, from the first
//! message to the last, so partial delivery still yields a (lower)
//! throughput figure.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::Scheme;
use crate::config::Config;
use crate::error::{InitError, TimeoutError};
use crate::report::Reporter;
use crate::shutdown::Shutdown;
use crate::stats::{Counters, Role, SnapshotBuilder, StatsSnapshot};
use crate::transport::{Reader, Writer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleSettings {
    pub message_count: usize,
    pub message_size: usize,
    /// Reader gives up once no message arrived for this long.
    pub timeout: Duration,
    /// How long the reader waits for the first message; `None` waits until
    /// shutdown.
    pub start_timeout: Option<Duration>,
}

impl Default for SimpleSettings {
    fn default() -> Self {
        Self {
            message_count: crate::defaults::MESSAGE_COUNT,
            message_size: crate::defaults::MESSAGE_SIZE,
            timeout: crate::defaults::SIMPLE_TIMEOUT,
            start_timeout: None,
        }
    }
}

impl SimpleSettings {
    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        let defaults = Self::default();
        let settings = Self {
            message_count: config.get_usize("simple.message_count", defaults.message_count)?,
            message_size: config.get_usize("simple.message_size", defaults.message_size)?,
            timeout: config.get_duration_ms("simple.timeout_ms", defaults.timeout)?,
            start_timeout: Some(config.get_duration_ms("simple.start_timeout_ms", Duration::ZERO)?)
                .filter(|d| !d.is_zero()),
        };
        if settings.message_count == 0 {
            return Err(InitError::Invalid(
                "simple.message_count must be positive".into(),
            ));
        }
        if settings.timeout.is_zero() {
            return Err(InitError::Invalid("simple.timeout_ms must be positive".into()));
        }
        Ok(settings)
    }
}

/// Shortest span a reader run is credited with, so rates stay finite.
const MIN_SPAN: Duration = Duration::from_micros(1);

/// Time over which `received` messages arrived, given the first and last
/// arrival instants.
///
/// First-to-last only covers `received - 1` gaps, so it is stretched by one
/// mean gap to account for the last message as well.
fn receive_span(first: Instant, last: Instant, received: u64) -> Duration {
    let span = last.duration_since(first);
    let span = if received > 1 {
        let nanos = span.as_nanos() * received as u128 / (received - 1) as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    } else {
        span
    };
    span.max(MIN_SPAN)
}

#[derive(Debug, Default)]
pub struct SimpleScheme {
    settings: SimpleSettings,
    reporter: Arc<Reporter>,
}

impl SimpleScheme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &SimpleSettings {
        &self.settings
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

#[async_trait]
impl Scheme for SimpleScheme {
    fn init(&mut self, config: &Config) -> Result<(), InitError> {
        self.settings = SimpleSettings::from_config(config)?;
        self.reporter = Arc::new(Reporter::from_config(config)?);
        debug!("Simple scheme settings: {:?}", self.settings);
        Ok(())
    }

    async fn run_writer(&mut self, writer: &mut dyn Writer, shutdown: Shutdown) -> StatsSnapshot {
        let counters = Counters::new();
        let builder = SnapshotBuilder::new(self.name(), Role::Writer);
        let message = vec![0u8; self.settings.message_size];

        info!(
            "Writing {} messages of {} bytes via {}",
            self.settings.message_count,
            self.settings.message_size,
            writer.name()
        );

        let start = Instant::now();
        for index in 0..self.settings.message_count {
            if shutdown.is_triggered() {
                info!("Shutdown requested after {} messages", index);
                break;
            }
            match writer.write(&message).await {
                Ok(_) => counters.record_sent(message.len()),
                Err(e) => {
                    if counters.record_error() == 0 {
                        warn!("Write failed: {}", e);
                    } else {
                        debug!("Write failed: {}", e);
                    }
                }
            }
        }
        let elapsed = start.elapsed();

        let snapshot = builder.finish(counters.load(), elapsed);
        self.reporter.report(&snapshot);
        snapshot
    }

    async fn run_reader(&mut self, reader: &mut dyn Reader, mut shutdown: Shutdown) -> StatsSnapshot {
        let counters = Counters::new();
        let builder = SnapshotBuilder::new(self.name(), Role::Reader);
        let idle = self.settings.timeout;
        let mut first: Option<Instant> = None;
        let mut last: Option<Instant> = None;

        info!(
            "Reading up to {} messages via {}",
            self.settings.message_count,
            reader.name()
        );

        while (counters.load().received as usize) < self.settings.message_count {
            if shutdown.is_triggered() {
                info!("Shutdown requested");
                break;
            }

            // The idle timeout only starts once traffic has begun.
            let limit = if first.is_some() {
                Some(idle)
            } else {
                self.settings.start_timeout
            };
            let outcome = tokio::select! {
                _ = shutdown.wait() => {
                    info!("Shutdown requested");
                    break;
                }
                outcome = async {
                    match limit {
                        Some(limit) => timeout(limit, reader.read()).await.ok(),
                        None => Some(reader.read().await),
                    }
                } => outcome,
            };

            match outcome {
                None => {
                    let waited = limit.unwrap_or(idle);
                    if first.is_some() {
                        info!("{}", TimeoutError(waited));
                    } else {
                        warn!("No message arrived: {}", TimeoutError(waited));
                    }
                    break;
                }
                Some(Ok(message)) => {
                    let now = Instant::now();
                    first.get_or_insert(now);
                    last = Some(now);
                    counters.record_received(message.len());
                }
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
                }
            }
        }

        let totals = counters.load();
        let elapsed = match (first, last) {
            (Some(first), Some(last)) => receive_span(first, last, totals.received),
            _ => Duration::ZERO,
        };
        let snapshot = builder.finish(totals, elapsed);
        self.reporter.report(&snapshot);
        snapshot
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}
