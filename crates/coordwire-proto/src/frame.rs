//! Length-prefixed framing.
//!
//! Each direction of a connection is a sequence of frames:
//! ```text
//! <length: i32, big-endian><payload: length bytes>
//! ```
//! There is no other metadata; message boundaries are entirely length
//! delimited.

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream between two frames.
    #[error("connection closed by peer")]
    Eof,

    /// The stream ended part way through a frame.
    #[error("connection closed mid-frame after {read} of {expected} bytes")]
    Truncated {
        /// Bytes received before the stream ended.
        read: usize,
        /// Bytes the frame required.
        expected: usize,
    },

    /// The length prefix was negative.
    #[error("invalid frame length {0}")]
    NegativeLength(i32),

    /// The frame is larger than the permitted ceiling.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    Oversized {
        /// Length of the offending frame.
        len: u64,
        /// Configured ceiling.
        max: u64,
    },

    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Writes `payload` as one frame and flushes the writer.
///
/// The header and payload are handed to the writer as a single buffer so a
/// frame is never split across separate writes.
///
/// # Errors
///
/// Returns [`FrameError::Oversized`] if the payload cannot be described by a
/// signed 32-bit length, or [`FrameError::Io`] if writing fails.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = i32::try_from(payload.len()).map_err(|_| FrameError::Oversized {
        len: payload.len() as u64,
        max: i32::MAX.unsigned_abs().into(),
    })?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame (blocks until complete).
///
/// Short reads are accumulated until the header and the whole payload have
/// arrived.
///
/// # Errors
///
/// Returns [`FrameError::Eof`] if the stream ends cleanly before a new frame,
/// [`FrameError::Truncated`] if it ends inside one,
/// [`FrameError::NegativeLength`] or [`FrameError::Oversized`] for an
/// unacceptable length prefix, and [`FrameError::Io`] for read failures.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R, max_len: u32) -> Result<Vec<u8>, FrameError> {
    let mut header = [0_u8; HEADER_LEN];
    match read_full(reader, &mut header)? {
        0 => return Err(FrameError::Eof),
        HEADER_LEN => {}
        read => {
            return Err(FrameError::Truncated {
                read,
                expected: HEADER_LEN,
            });
        }
    }

    let raw_len = i32::from_be_bytes(header);
    let len = u32::try_from(raw_len).map_err(|_| FrameError::NegativeLength(raw_len))?;
    if len > max_len {
        return Err(FrameError::Oversized {
            len: len.into(),
            max: max_len.into(),
        });
    }

    let expected = usize::try_from(len).map_err(|_| FrameError::Oversized {
        len: len.into(),
        max: max_len.into(),
    })?;
    let mut payload = vec![0_u8; expected];
    let read = read_full(reader, &mut payload)?;
    if read < expected {
        return Err(FrameError::Truncated { read, expected });
    }
    Ok(payload)
}

/// Fills `buf` unless the stream ends first, returning the bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while let Some(rest) = buf.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }
        match reader.read(rest) {
            Ok(0) => break,
            Ok(count) => filled += count,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
    Ok(filled)
}
