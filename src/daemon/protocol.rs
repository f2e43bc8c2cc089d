//! Startup result codec
//!
//! The worker sends exactly one [`ResultMessage`] to the monitor over the
//! startup pipe. The frame is small enough to be written with a single
//! `write(2)` below the pipe's atomic-write limit, so the monitor never
//! observes a partially written report.
//!
//! ```text
//! ┌────────────┬─────────────────────────────────────────┐
//! │   Length   │            Payload (bincode)            │
//! │  (4 bytes) │  tag │ code │ message len │ message    │
//! └────────────┴─────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// Largest frame guaranteed to be written atomically to a pipe (POSIX `_POSIX_PIPE_BUF`)
pub const ATOMIC_WRITE_LIMIT: usize = 512;

/// Size of the little-endian length prefix
const FRAME_HEADER_LEN: usize = 4;

/// Outcome reported by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultMessage {
    /// Initialization finished; the worker keeps running
    Success,
    /// Initialization failed; the worker exits with `code`
    Failure {
        /// Exit code the worker is about to terminate with
        code: i32,
        /// Human-readable reason, also recorded in the log file
        message: String,
    },
}

impl ResultMessage {
    /// Build a failure report, truncating `message` so the frame fits the atomic-write limit
    pub fn failure(code: i32, message: &str) -> Self {
        let room = ATOMIC_WRITE_LIMIT - FRAME_HEADER_LEN - failure_overhead();
        ResultMessage::Failure {
            code,
            message: truncate_on_char_boundary(message, room).to_string(),
        }
    }
}

/// Bytes bincode spends on a failure report besides the message text
fn failure_overhead() -> usize {
    let empty = ResultMessage::Failure {
        code: 0,
        message: String::new(),
    };
    bincode::serialized_size(&empty).map(|n| n as usize).unwrap_or(16)
}

fn truncate_on_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Encode a result into its wire frame
///
/// Fails with `InvalidData` if the frame would exceed [`ATOMIC_WRITE_LIMIT`];
/// use [`ResultMessage::failure`] to build failures that always fit.
pub fn encode_result(message: &ResultMessage) -> io::Result<Vec<u8>> {
    let payload = bincode::serialize(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let total_len = FRAME_HEADER_LEN + payload.len();
    if total_len > ATOMIC_WRITE_LIMIT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Result frame too large: {} bytes", total_len),
        ));
    }

    let mut buffer = Vec::with_capacity(total_len);
    buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

/// Decode a result frame from a byte slice
pub fn decode_result(bytes: &[u8]) -> io::Result<ResultMessage> {
    let mut cursor = io::Cursor::new(bytes);
    read_result(&mut cursor)
}

/// Read one result frame from a stream
///
/// Returns `UnexpectedEof` if the stream ends before a full frame arrives and
/// `InvalidData` for frames that cannot be a valid report.
pub fn read_result<R: Read>(reader: &mut R) -> io::Result<ResultMessage> {
    let mut len_bytes = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut len_bytes)?;
    let payload_len = u32::from_le_bytes(len_bytes) as usize;

    if payload_len == 0 || payload_len > ATOMIC_WRITE_LIMIT - FRAME_HEADER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid result frame length: {}", payload_len),
        ));
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    bincode::deserialize(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write a result frame with a single write call
pub fn write_result<W: Write>(writer: &mut W, message: &ResultMessage) -> io::Result<()> {
    let bytes = encode_result(message)?;
    writer.write_all(&bytes)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_success() {
        let encoded = encode_result(&ResultMessage::Success).unwrap();
        assert_eq!(decode_result(&encoded).unwrap(), ResultMessage::Success);
    }

    #[test]
    fn test_encode_decode_failure() {
        let message = ResultMessage::Failure {
            code: 3,
            message: "example failure for tests".to_string(),
        };
        let encoded = encode_result(&message).unwrap();
        assert_eq!(decode_result(&encoded).unwrap(), message);
    }

    #[test]
    fn test_encode_decode_failure_unicode_and_negative_code() {
        let message = ResultMessage::failure(-7, "mount échoué: 💥 /mnt/ü");
        let encoded = encode_result(&message).unwrap();
        assert_eq!(decode_result(&encoded).unwrap(), message);
    }

    #[test]
    fn test_long_failure_message_is_truncated_to_fit() {
        let long = "é".repeat(ATOMIC_WRITE_LIMIT);
        let message = ResultMessage::failure(1, &long);

        let encoded = encode_result(&message).unwrap();
        assert!(encoded.len() <= ATOMIC_WRITE_LIMIT);

        match decode_result(&encoded).unwrap() {
            ResultMessage::Failure { code, message } => {
                assert_eq!(code, 1);
                assert!(!message.is_empty());
                assert!(long.starts_with(&message));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let message = ResultMessage::Failure {
            code: 1,
            message: "x".repeat(ATOMIC_WRITE_LIMIT),
        };
        let err = encode_result(&message).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_empty_stream_is_eof() {
        let err = decode_result(&[]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_truncated_frame_is_error() {
        let encoded = encode_result(&ResultMessage::failure(9, "cut short")).unwrap();
        for len in 1..encoded.len() {
            assert!(
                decode_result(&encoded[..len]).is_err(),
                "prefix of {} bytes decoded",
                len
            );
        }
    }

    #[test]
    fn test_bogus_length_prefix_is_invalid() {
        let mut bytes = (u32::MAX).to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        let err = decode_result(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = decode_result(&0u32.to_le_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_garbage_payload_is_invalid() {
        let mut bytes = 4u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let err = decode_result(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_write_result_single_frame() {
        let mut sink = Vec::new();
        write_result(&mut sink, &ResultMessage::Success).unwrap();
        assert_eq!(sink, encode_result(&ResultMessage::Success).unwrap());
    }
}
