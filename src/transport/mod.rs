//! # Transport Contracts
//!
//! A transport moves opaque messages from one process to another. It is
//! split into a [`Writer`] half and a [`Reader`] half because the two ends of
//! a test always run in separate processes.
//!
//! Both halves follow the same lifecycle: construct (via the registry),
//! [`init`](Writer::init) from the run's [`Config`], then loop on
//! `write`/`read`. Calling `init` again releases whatever the previous call
//! acquired and applies the config from scratch.

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{InitError, ReadError, WriteError};

pub mod memory;
pub mod tcp;
pub mod udp;

pub use memory::{MemoryReader, MemoryWriter};
pub use tcp::{TcpReader, TcpWriter};
pub use udp::{UdpReader, UdpWriter};

/// Sending half of a transport.
#[async_trait]
pub trait Writer: Send {
    /// Acquire transport resources described by `config`.
    async fn init(&mut self, config: &Config) -> Result<(), InitError>;

    /// Send one message, returning the number of payload bytes written.
    ///
    /// May block according to the transport's own backpressure.
    async fn write(&mut self, message: &[u8]) -> Result<usize, WriteError>;

    /// Registered name, for identification in logs and reports.
    fn name(&self) -> &'static str;
}

/// Receiving half of a transport.
#[async_trait]
pub trait Reader: Send {
    /// Acquire transport resources described by `config`.
    async fn init(&mut self, config: &Config) -> Result<(), InitError>;

    /// Wait for the next message.
    ///
    /// Returns [`ReadError::Closed`] once no further message can arrive.
    async fn read(&mut self) -> Result<Vec<u8>, ReadError>;

    /// Registered name, for identification in logs and reports.
    fn name(&self) -> &'static str;
}

/// Socket address for a transport from its `<prefix>.host` / `<prefix>.port`
/// settings.
pub(crate) fn endpoint(
    config: &Config,
    prefix: &str,
    default_port: u16,
) -> Result<String, InitError> {
    let host = config.get_string(&format!("{}.host", prefix), crate::defaults::HOST)?;
    let port = config.get_int(&format!("{}.port", prefix), default_port as i64)?;
    let port = u16::try_from(port)
        .map_err(|_| InitError::Invalid(format!("{}.port out of range: {}", prefix, port)))?;
    Ok(format!("{}:{}", host, port))
}
