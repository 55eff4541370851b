//! UDP datagram transport.
//!
//! One message is one datagram. The writer sends on a connected socket, the
//! reader receives on a bound socket. Datagram loss and reordering are left
//! exactly as the network produces them; that is what the schemes measure.
//!
//! Settings: `udp.host`, `udp.port`, `udp.max_datagram` (reader receive
//! buffer) and `udp.buffer_size` (SO_SNDBUF/SO_RCVBUF, 0 keeps the OS
//! default).

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::debug;

use super::{endpoint, Reader, Writer};
use crate::config::Config;
use crate::error::{InitError, ReadError, WriteError};

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM: usize = 65507;

const DEFAULT_PORT: u16 = 57955;

async fn resolve(config: &Config) -> Result<SocketAddr, InitError> {
    let addr = endpoint(config, "udp", DEFAULT_PORT)?;
    let resolved = tokio::net::lookup_host(addr.as_str()).await?.next();
    resolved.ok_or_else(|| InitError::Invalid(format!("udp address did not resolve: {}", addr)))
}

fn socket_buffer_size(config: &Config) -> Result<usize, InitError> {
    Ok(config.get_usize("udp.buffer_size", 0)?)
}

fn new_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    Socket::new(Domain::for_address(*addr), Type::DGRAM, Some(Protocol::UDP))
}

fn into_tokio(socket: Socket) -> std::io::Result<UdpSocket> {
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

#[derive(Default)]
pub struct UdpWriter {
    socket: Option<UdpSocket>,
}

impl UdpWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Writer for UdpWriter {
    async fn init(&mut self, config: &Config) -> Result<(), InitError> {
        self.socket = None;

        let target = resolve(config).await?;
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = new_socket(&target)?;
        let buffer_size = socket_buffer_size(config)?;
        if buffer_size > 0 {
            socket.set_send_buffer_size(buffer_size)?;
        }
        socket.bind(&local.into())?;
        socket.connect(&target.into())?;

        self.socket = Some(into_tokio(socket)?);
        debug!("UDP writer sending to {}", target);
        Ok(())
    }

    async fn write(&mut self, message: &[u8]) -> Result<usize, WriteError> {
        let socket = self.socket.as_ref().ok_or(WriteError::NotInitialized)?;
        if message.len() > MAX_DATAGRAM {
            return Err(WriteError::TooLarge {
                size: message.len(),
                limit: MAX_DATAGRAM,
            });
        }
        Ok(socket.send(message).await?)
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

pub struct UdpReader {
    socket: Option<UdpSocket>,
    buffer: Vec<u8>,
}

impl Default for UdpReader {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpReader {
    pub fn new() -> Self {
        Self {
            socket: None,
            buffer: Vec::new(),
        }
    }

    /// Address the reader is bound to, once initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

#[async_trait]
impl Reader for UdpReader {
    async fn init(&mut self, config: &Config) -> Result<(), InitError> {
        // Release a previous binding before rebinding the same port.
        self.socket = None;

        let addr = resolve(config).await?;
        let max_datagram = config.get_usize("udp.max_datagram", MAX_DATAGRAM)?;
        if max_datagram == 0 {
            return Err(InitError::Invalid("udp.max_datagram must be positive".into()));
        }

        let socket = new_socket(&addr)?;
        let buffer_size = socket_buffer_size(config)?;
        if buffer_size > 0 {
            socket.set_recv_buffer_size(buffer_size)?;
        }
        socket.bind(&addr.into())?;

        self.socket = Some(into_tokio(socket)?);
        self.buffer = vec![0u8; max_datagram];
        debug!("UDP reader listening on {:?}", self.local_addr());
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>, ReadError> {
        let socket = self.socket.as_ref().ok_or(ReadError::NotInitialized)?;
        let len = socket.recv(&mut self.buffer).await?;
        Ok(self.buffer[..len].to_vec())
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback(port: u16) -> Config {
        Config::default()
            .with_string("udp.host", "127.0.0.1")
            .with_int("udp.port", port as i64)
    }

    #[tokio::test]
    async fn test_loopback_datagram() {
        let mut reader = UdpReader::new();
        reader.init(&loopback(0)).await.unwrap();
        let port = reader.local_addr().unwrap().port();

        let mut writer = UdpWriter::new();
        writer.init(&loopback(port)).await.unwrap();
        assert_eq!(writer.write(b"datagram").await.unwrap(), 8);

        let received = reader.read().await.unwrap();
        assert_eq!(received, b"datagram".to_vec());
    }

    #[tokio::test]
    async fn test_resolve_configured_endpoint() {
        let addr = resolve(&loopback(4321)).await.unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 4321)));

        let default = resolve(&Config::default()).await.unwrap();
        assert_eq!(default.port(), DEFAULT_PORT);
    }

    #[tokio::test]
    async fn test_uninitialized() {
        let mut writer = UdpWriter::new();
        assert!(matches!(
            writer.write(b"x").await,
            Err(WriteError::NotInitialized)
        ));
        let mut reader = UdpReader::new();
        assert!(matches!(reader.read().await, Err(ReadError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_reinit_rebinds_same_port() {
        let mut reader = UdpReader::new();
        reader.init(&loopback(0)).await.unwrap();
        let port = reader.local_addr().unwrap().port();

        reader.init(&loopback(port)).await.unwrap();
        assert_eq!(reader.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_oversized_datagram() {
        let mut writer = UdpWriter::new();
        writer.init(&loopback(9)).await.unwrap();
        let big = vec![0u8; MAX_DATAGRAM + 1];
        assert!(matches!(
            writer.write(&big).await,
            Err(WriteError::TooLarge { .. })
        ));
    }
}
