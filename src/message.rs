//! Sequence-numbered message layout used by the streaming scheme.
//!
//! ```text
//! +----------------------+---------------------------+
//! | sequence (8 bytes)   | zero padding              |
//! | bincode u64, LE      | up to the message size    |
//! +----------------------+---------------------------+
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ReadError;

/// Encoded size of [`SequenceHeader`].
pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceHeader {
    pub sequence: u64,
}

/// Reusable outgoing message buffer.
#[derive(Debug, Clone)]
pub struct SequencedMessage {
    buffer: Vec<u8>,
}

impl SequencedMessage {
    /// Buffer of `size` bytes; never smaller than the header.
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0u8; size.max(HEADER_LEN)],
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Write `sequence` into the header and return the full message.
    pub fn stamp(&mut self, sequence: u64) -> bincode::Result<&[u8]> {
        bincode::serialize_into(
            &mut self.buffer[..HEADER_LEN],
            &SequenceHeader { sequence },
        )?;
        Ok(self.buffer.as_slice())
    }
}

/// Extract the sequence number from a received message.
pub fn decode_sequence(message: &[u8]) -> Result<u64, ReadError> {
    if message.len() < HEADER_LEN {
        return Err(ReadError::Malformed(format!(
            "{} bytes is shorter than the {} byte sequence header",
            message.len(),
            HEADER_LEN
        )));
    }
    let header: SequenceHeader = bincode::deserialize(&message[..HEADER_LEN])
        .map_err(|e| ReadError::Malformed(e.to_string()))?;
    Ok(header.sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_and_decode() {
        let mut message = SequencedMessage::new(64);
        let bytes = message.stamp(0xDEAD_BEEF).unwrap();
        assert_eq!(bytes.len(), 64);
        assert_eq!(decode_sequence(bytes).unwrap(), 0xDEAD_BEEF);

        // Restamping overwrites the header only.
        let bytes = message.stamp(7).unwrap();
        assert_eq!(decode_sequence(bytes).unwrap(), 7);
        assert!(bytes[HEADER_LEN..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_header_is_little_endian() {
        let mut message = SequencedMessage::new(HEADER_LEN);
        let bytes = message.stamp(1).unwrap();
        assert_eq!(bytes, &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_minimum_size() {
        assert_eq!(SequencedMessage::new(2).len(), HEADER_LEN);
    }

    #[test]
    fn test_short_message_rejected() {
        assert!(matches!(
            decode_sequence(&[1, 2, 3]),
            Err(ReadError::Malformed(_))
        ));
    }
}
