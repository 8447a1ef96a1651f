//! Message serialisation.
//!
//! The connection treats serialisation as an opaque step: requests become
//! frame payloads and frame payloads become responses. [`Codec`] is the seam;
//! [`ProtobufCodec`] is the encoding the store speaks.

use prost::Message;
use thiserror::Error;

use crate::message::{Request, Response};

/// Errors raised while encoding a request or decoding a response.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The encoded request does not fit in a single frame.
    #[error("encoded request of {len} bytes exceeds the {max} byte frame limit")]
    Oversized {
        /// Encoded length.
        len: usize,
        /// Configured frame ceiling.
        max: u32,
    },

    /// A request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] prost::EncodeError),

    /// A frame did not hold a valid response.
    #[error("failed to decode response: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Converts between message records and frame payloads.
pub trait Codec: Send + 'static {
    /// Serialises a request into a frame payload.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the request cannot be represented.
    fn encode(&self, request: &Request) -> Result<Vec<u8>, CodecError>;

    /// Deserialises a frame payload into a response.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the payload is not a valid response.
    fn decode(&self, payload: &[u8]) -> Result<Response, CodecError>;
}

/// Protobuf encoding bounded by a frame size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtobufCodec {
    max_frame_bytes: u32,
}

impl ProtobufCodec {
    /// Creates a codec that refuses to encode requests larger than `max_frame_bytes`.
    #[must_use]
    pub const fn new(max_frame_bytes: u32) -> Self {
        Self { max_frame_bytes }
    }

    /// Frame ceiling this codec was built with.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> u32 {
        self.max_frame_bytes
    }
}

impl Codec for ProtobufCodec {
    fn encode(&self, request: &Request) -> Result<Vec<u8>, CodecError> {
        let len = request.encoded_len();
        let fits = u32::try_from(len).is_ok_and(|len32| len32 <= self.max_frame_bytes);
        if !fits {
            return Err(CodecError::Oversized {
                len,
                max: self.max_frame_bytes,
            });
        }
        let mut payload = Vec::with_capacity(len);
        request.encode(&mut payload)?;
        Ok(payload)
    }

    fn decode(&self, payload: &[u8]) -> Result<Response, CodecError> {
        Ok(Response::decode(payload)?)
    }
}
