//! # Test Schemes
//!
//! A scheme is a test protocol: it decides what to send, how fast, and how
//! to account for what arrives. The runner hands a scheme exactly one
//! transport half and the scheme owns the rest of the run.
//!
//! - [`SimpleScheme`]: fixed-count burst, aggregate throughput.
//! - [`StreamingScheme`]: paced, sequence-numbered stream with loss,
//!   duplicate and reordering accounting and periodic snapshots.
//!
//! Run methods are infallible: per-message transport errors are absorbed
//! into the statistics, and the final snapshot is returned (and reported)
//! even when the run was cut short by shutdown.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Config;
use crate::error::InitError;
use crate::report::Reporter;
use crate::shutdown::Shutdown;
use crate::stats::{Counters, SnapshotBuilder, StatsSnapshot};
use crate::transport::{Reader, Writer};

pub mod simple;
pub mod streaming;
pub mod window;

pub use simple::SimpleScheme;
pub use streaming::StreamingScheme;
pub use window::{Arrival, SequenceWindow};

#[async_trait]
pub trait Scheme: Send {
    /// Read the scheme's settings from `config`. Calling it again replaces
    /// the previous settings entirely.
    fn init(&mut self, config: &Config) -> Result<(), InitError>;

    /// Drive the sending half of a test to completion.
    async fn run_writer(&mut self, writer: &mut dyn Writer, shutdown: Shutdown) -> StatsSnapshot;

    /// Drive the receiving half of a test to completion.
    async fn run_reader(&mut self, reader: &mut dyn Reader, shutdown: Shutdown) -> StatsSnapshot;

    /// Registered name, for identification in logs and reports.
    fn name(&self) -> &'static str;
}

/// Background task emitting an interval snapshot every `period`.
pub(crate) struct PeriodicReporter {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicReporter {
    pub(crate) fn spawn(
        counters: Arc<Counters>,
        reporter: Arc<Reporter>,
        mut builder: SnapshotBuilder,
        period: Duration,
    ) -> Self {
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => reporter.report(&builder.interval(counters.load())),
                    _ = &mut stopped => break,
                }
            }
        });
        Self { stop, handle }
    }

    /// Stop the task and wait for any in-progress report to finish.
    pub(crate) async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            debug!("Periodic reporter ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transports for exercising schemes without sockets.

    use super::*;
    use crate::error::{ReadError, WriteError};
    use crate::message::SequencedMessage;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Replays a fixed list of read outcomes, then reports the transport
    /// closed.
    pub struct ScriptedReader {
        script: VecDeque<Result<Vec<u8>, ReadError>>,
    }

    impl ScriptedReader {
        pub fn new(script: Vec<Result<Vec<u8>, ReadError>>) -> Self {
            Self {
                script: script.into(),
            }
        }

        pub fn sequences(sequences: &[u64]) -> Self {
            let mut message = SequencedMessage::new(16);
            Self::new(
                sequences
                    .iter()
                    .map(|s| Ok(message.stamp(*s).unwrap().to_vec()))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl Reader for ScriptedReader {
        async fn init(&mut self, _config: &Config) -> Result<(), InitError> {
            Ok(())
        }

        async fn read(&mut self) -> Result<Vec<u8>, ReadError> {
            self.script.pop_front().unwrap_or(Err(ReadError::Closed))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Accepts every message, failing the ones whose index is listed, and
    /// records when each write started.
    #[derive(Default)]
    pub struct RecordingWriter {
        pub fail_indices: Vec<usize>,
        pub write_delay: Option<(usize, Duration)>,
        pub messages: Vec<Vec<u8>>,
        pub started: Vec<Instant>,
    }

    #[async_trait]
    impl Writer for RecordingWriter {
        async fn init(&mut self, _config: &Config) -> Result<(), InitError> {
            Ok(())
        }

        async fn write(&mut self, message: &[u8]) -> Result<usize, WriteError> {
            let index = self.started.len();
            self.started.push(Instant::now());
            if let Some((slow, delay)) = self.write_delay {
                if slow == index {
                    tokio::time::sleep(delay).await;
                }
            }
            if self.fail_indices.contains(&index) {
                return Err(WriteError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "injected failure",
                )));
            }
            self.messages.push(message.to_vec());
            Ok(message.len())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }
}
