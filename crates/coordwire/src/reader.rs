//! Reader loop: pulls frames off the socket and hands them to the coordinator.

use std::io::{BufReader, Read};

use coordwire_proto::read_frame;
use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::error::ClientError;

pub(crate) const READER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reader");

/// What the reader loop reports to the coordinator.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A complete frame payload, not yet decoded.
    Frame(Vec<u8>),
    /// The read side failed; no further frames will follow.
    Failed(ClientError),
}

/// Reads frames until the stream fails, forwarding each one in arrival order.
///
/// Clean EOF counts as a failure: the server never closes a healthy
/// connection. Exactly one [`Inbound::Failed`] is sent before returning,
/// unless the coordinator has already gone away.
pub(crate) fn run_reader<R: Read>(stream: R, max_frame_bytes: u32, inbound: &Sender<Inbound>) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_frame(&mut reader, max_frame_bytes) {
            Ok(frame) => {
                trace!(target: READER_TARGET, len = frame.len(), "frame received");
                if inbound.send(Inbound::Frame(frame)).is_err() {
                    debug!(target: READER_TARGET, "coordinator gone; reader exiting");
                    return;
                }
            }
            Err(error) => {
                debug!(target: READER_TARGET, %error, "read side failed");
                if inbound.send(Inbound::Failed(error.into())).is_err() {
                    trace!(target: READER_TARGET, "coordinator already closed");
                }
                return;
            }
        }
    }
}
