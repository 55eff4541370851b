//! TCP stream transport.
//!
//! Messages are framed with a 4-byte little-endian length prefix. The reader
//! binds during `init` and accepts a single peer lazily on its first `read`;
//! the writer connects during `init`, retrying until the reader is listening
//! or `tcp.connect_timeout_ms` passes.
//!
//! Settings: `tcp.host`, `tcp.port`, `tcp.max_frame`,
//! `tcp.connect_timeout_ms` and `tcp.buffer_size` (0 keeps the OS default).

use async_trait::async_trait;
use socket2::SockRef;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tracing::debug;

use super::{endpoint, Reader, Writer};
use crate::config::Config;
use crate::error::{InitError, ReadError, WriteError};

const DEFAULT_PORT: u16 = 57956;
const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;
const CONNECT_RETRY: Duration = Duration::from_millis(100);

fn configure_stream(stream: &TcpStream, buffer_size: usize) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    if buffer_size > 0 {
        let socket = SockRef::from(stream);
        socket.set_recv_buffer_size(buffer_size)?;
        socket.set_send_buffer_size(buffer_size)?;
    }
    Ok(())
}

/// `tcp.max_frame`, bounded by what the 4-byte length prefix can encode.
fn max_frame(config: &Config) -> Result<usize, InitError> {
    let max_frame = config.get_usize("tcp.max_frame", DEFAULT_MAX_FRAME)?;
    if max_frame as u64 > u32::MAX as u64 {
        return Err(InitError::Invalid(format!(
            "tcp.max_frame of {} exceeds the frame length limit of {}",
            max_frame,
            u32::MAX
        )));
    }
    Ok(max_frame)
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
    )
}

pub struct TcpWriter {
    stream: Option<TcpStream>,
    max_frame: usize,
}

impl Default for TcpWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpWriter {
    pub fn new() -> Self {
        Self {
            stream: None,
            max_frame: DEFAULT_MAX_FRAME,
        }
    }
}

#[async_trait]
impl Writer for TcpWriter {
    async fn init(&mut self, config: &Config) -> Result<(), InitError> {
        self.stream = None;

        let addr = endpoint(config, "tcp", DEFAULT_PORT)?;
        let connect_timeout =
            config.get_duration_ms("tcp.connect_timeout_ms", Duration::from_secs(5))?;
        let buffer_size = config.get_usize("tcp.buffer_size", 0)?;
        self.max_frame = max_frame(config)?;

        let deadline = Instant::now() + connect_timeout;
        let stream = loop {
            match TcpStream::connect(&addr).await {
                Ok(stream) => break stream,
                Err(e) if e.kind() == ErrorKind::ConnectionRefused && Instant::now() < deadline => {
                    debug!("TCP reader at {} not listening yet, retrying", addr);
                    sleep(CONNECT_RETRY).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        configure_stream(&stream, buffer_size)?;

        debug!("TCP writer connected to {}", addr);
        self.stream = Some(stream);
        Ok(())
    }

    async fn write(&mut self, message: &[u8]) -> Result<usize, WriteError> {
        let stream = self.stream.as_mut().ok_or(WriteError::NotInitialized)?;
        if message.len() > self.max_frame {
            return Err(WriteError::TooLarge {
                size: message.len(),
                limit: self.max_frame,
            });
        }

        // max_frame is capped at u32::MAX during init.
        let len = (message.len() as u32).to_le_bytes();
        let result = async {
            stream.write_all(&len).await?;
            stream.write_all(message).await
        }
        .await;

        match result {
            Ok(()) => Ok(message.len()),
            Err(e) if is_disconnect(e.kind()) => Err(WriteError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

pub struct TcpReader {
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
    max_frame: usize,
    buffer_size: usize,
}

impl Default for TcpReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpReader {
    pub fn new() -> Self {
        Self {
            listener: None,
            stream: None,
            max_frame: DEFAULT_MAX_FRAME,
            buffer_size: 0,
        }
    }

    /// Address the listener is bound to, once initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    async fn read_frame(stream: &mut TcpStream, max_frame: usize) -> Result<Vec<u8>, ReadError> {
        let mut len_bytes = [0u8; 4];
        stream.read_exact(&mut len_bytes).await?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > max_frame {
            return Err(ReadError::Malformed(format!(
                "frame of {} bytes exceeds limit of {}",
                len, max_frame
            )));
        }

        let mut frame = vec![0u8; len];
        stream.read_exact(&mut frame).await?;
        Ok(frame)
    }
}

#[async_trait]
impl Reader for TcpReader {
    async fn init(&mut self, config: &Config) -> Result<(), InitError> {
        self.stream = None;
        self.listener = None;

        let addr = endpoint(config, "tcp", DEFAULT_PORT)?;
        self.max_frame = max_frame(config)?;
        self.buffer_size = config.get_usize("tcp.buffer_size", 0)?;

        let listener = TcpListener::bind(&addr).await?;
        debug!("TCP reader listening on {:?}", listener.local_addr().ok());
        self.listener = Some(listener);
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>, ReadError> {
        if self.stream.is_none() {
            let listener = self.listener.as_ref().ok_or(ReadError::NotInitialized)?;
            let (stream, peer) = listener.accept().await?;
            configure_stream(&stream, self.buffer_size)?;
            debug!("TCP reader accepted connection from {}", peer);
            self.stream = Some(stream);
        }

        let stream = self.stream.as_mut().ok_or(ReadError::NotInitialized)?;
        match Self::read_frame(stream, self.max_frame).await {
            Ok(frame) => Ok(frame),
            Err(ReadError::Io(e)) if is_disconnect(e.kind()) => {
                self.stream = None;
                Err(ReadError::Closed)
            }
            Err(e) => {
                // The stream is out of sync after a bad frame.
                self.stream = None;
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback(port: u16) -> Config {
        Config::default()
            .with_string("tcp.host", "127.0.0.1")
            .with_int("tcp.port", port as i64)
    }

    #[tokio::test]
    async fn test_framed_round_trip() {
        let mut reader = TcpReader::new();
        reader.init(&loopback(0)).await.unwrap();
        let port = reader.local_addr().unwrap().port();

        let mut writer = TcpWriter::new();
        writer.init(&loopback(port)).await.unwrap();
        writer.write(b"first").await.unwrap();
        writer.write(b"").await.unwrap();
        writer.write(b"third message").await.unwrap();

        assert_eq!(reader.read().await.unwrap(), b"first".to_vec());
        assert_eq!(reader.read().await.unwrap(), Vec::<u8>::new());
        assert_eq!(reader.read().await.unwrap(), b"third message".to_vec());

        drop(writer);
        assert!(matches!(reader.read().await, Err(ReadError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_refused_after_timeout() {
        // Grab a free port, then release it so nothing listens there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = loopback(port).with_int("tcp.connect_timeout_ms", 200);

        let mut writer = TcpWriter::new();
        assert!(matches!(
            writer.init(&config).await,
            Err(InitError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_max_frame_beyond_length_prefix_rejected() {
        let config = loopback(0).with_int("tcp.max_frame", u32::MAX as i64 + 1);

        let mut reader = TcpReader::new();
        assert!(matches!(
            reader.init(&config).await,
            Err(InitError::Invalid(_))
        ));
        let mut writer = TcpWriter::new();
        assert!(matches!(
            writer.init(&config).await,
            Err(InitError::Invalid(_))
        ));

        let mut reader = TcpReader::new();
        reader
            .init(&loopback(0).with_int("tcp.max_frame", u32::MAX as i64))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut reader = TcpReader::new();
        reader
            .init(&loopback(0).with_int("tcp.max_frame", 4))
            .await
            .unwrap();
        let port = reader.local_addr().unwrap().port();

        let mut writer = TcpWriter::new();
        writer.init(&loopback(port)).await.unwrap();
        writer.write(b"too long").await.unwrap();

        assert!(matches!(reader.read().await, Err(ReadError::Malformed(_))));
    }
}
