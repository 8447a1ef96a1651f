//! Wire types for the coordination store protocol.
//!
//! A connection carries length-prefixed frames in both directions (see
//! [`frame`]). Each frame holds one protobuf-encoded [`Request`] or
//! [`Response`]; the [`Codec`] trait is the seam the client uses to turn
//! records into payloads and back.

pub mod codec;
pub mod frame;
pub mod message;

pub use codec::{Codec, CodecError, ProtobufCodec};
pub use frame::{FrameError, HEADER_LEN, read_frame, write_frame};
pub use message::{CLOBBER, ErrCode, FLAG_DEL, FLAG_SET, MISSING, Request, Response, Verb};
