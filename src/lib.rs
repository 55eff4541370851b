//! # netspel
//!
//! Measures message throughput, loss, duplication and reordering between a
//! writer process and a reader process over a pluggable transport.
//!
//! ## Architecture Overview
//!
//! - `registry`: name → constructor maps for writers, readers and schemes
//! - `config`: the run configuration, loaded from JSON and overridden from
//!   the command line
//! - `transport`: the `Writer`/`Reader` contracts and the UDP, TCP and
//!   in-process memory transports
//! - `scheme`: test protocols (`simple` burst, `streaming` paced stream)
//! - `stats` and `report`: counters, snapshots and where snapshots go
//! - `runner`: resolves the configured components and drives one run
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use netspel::{registry, runner, shutdown, Config, Role};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     registry::register_builtins()?;
//!     let config = Config::default()
//!         .with_scheme_type("streaming")
//!         .with_int("streaming.messages_per_second", 5000);
//!
//!     let (_trigger, shutdown) = shutdown::channel();
//!     let snapshot = runner::run(Role::Reader, &config, shutdown).await?;
//!     println!("lost {} of {}", snapshot.totals.lost, snapshot.totals.received);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod registry;
pub mod report;
pub mod runner;
pub mod scheme;
pub mod shutdown;
pub mod stats;
pub mod transport;
pub mod utils;

pub use config::{Config, ConfigOverrides};
pub use error::{ConfigError, InitError, ReadError, RegistryError, TimeoutError, WriteError};
pub use registry::{register_builtins, Category, Registry};
pub use report::Reporter;
pub use scheme::{Scheme, SimpleScheme, StreamingScheme};
pub use shutdown::Shutdown;
pub use stats::{Role, StatsSnapshot, Totals};
pub use transport::{Reader, Writer};

/// The current netspel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Every setting a scheme or transport reads falls back to one of these when
/// the configuration does not mention it.
pub mod defaults {
    use std::time::Duration;

    /// Scheme used when neither the config file nor the command line names one
    pub const SCHEME_TYPE: &str = "simple";

    /// Writer and reader transport used when none is named
    pub const TRANSPORT_TYPE: &str = "udp";

    /// Host for network transports
    pub const HOST: &str = "127.0.0.1";

    /// Default simple scheme message size in bytes
    pub const MESSAGE_SIZE: usize = 1024;

    /// Default number of messages in a simple run
    pub const MESSAGE_COUNT: usize = 10000;

    /// How long a simple reader waits for the next message
    pub const SIMPLE_TIMEOUT: Duration = Duration::from_secs(5);

    pub const MESSAGES_PER_SECOND: u64 = 1000;

    pub const STREAMING_DURATION: Duration = Duration::from_secs(10);

    /// Default streaming message size; the sequence header needs 8 bytes
    pub const STREAMING_MESSAGE_SIZE: usize = 64;

    pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

    pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Sequence numbers below the highest seen that are still tracked
    pub const WINDOW: u64 = 65536;
}
