//! In-process transport over a bounded queue.
//!
//! Both halves come from one [`channel`] call, so this transport is not
//! registered by name. It backs the end-to-end tests and library users that
//! want to exercise a scheme without sockets.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Reader, Writer};
use crate::config::Config;
use crate::error::{InitError, ReadError, WriteError};

/// Create a connected writer/reader pair holding at most `capacity`
/// in-flight messages. A full queue blocks the writer.
pub fn channel(capacity: usize) -> (MemoryWriter, MemoryReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MemoryWriter { tx }, MemoryReader { rx })
}

pub struct MemoryWriter {
    tx: mpsc::Sender<Vec<u8>>,
}

pub struct MemoryReader {
    rx: mpsc::Receiver<Vec<u8>>,
}

#[async_trait]
impl Writer for MemoryWriter {
    async fn init(&mut self, _config: &Config) -> Result<(), InitError> {
        Ok(())
    }

    async fn write(&mut self, message: &[u8]) -> Result<usize, WriteError> {
        self.tx
            .send(message.to_vec())
            .await
            .map_err(|_| WriteError::Closed)?;
        Ok(message.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl Reader for MemoryReader {
    async fn init(&mut self, _config: &Config) -> Result<(), InitError> {
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>, ReadError> {
        self.rx.recv().await.ok_or(ReadError::Closed)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_close() {
        let (mut writer, mut reader) = channel(4);
        assert_eq!(writer.write(b"hello").await.unwrap(), 5);
        assert_eq!(reader.read().await.unwrap(), b"hello".to_vec());

        drop(writer);
        assert!(matches!(reader.read().await, Err(ReadError::Closed)));
    }

    #[tokio::test]
    async fn test_write_after_reader_dropped() {
        let (mut writer, reader) = channel(1);
        drop(reader);
        assert!(matches!(writer.write(b"x").await, Err(WriteError::Closed)));
    }
}
