//! Blocking client for a coordination store, multiplexed over one socket.
//!
//! A [`Connection`] carries many concurrent requests over a single TCP or
//! Unix-domain stream. Each request is stamped with a correlation tag that
//! the server echoes back, so responses may arrive in any order and still
//! reach the right caller.
//!
//! Two worker threads run behind every connection. The coordinator owns the
//! write side of the socket and the table of pending requests; the reader
//! pulls length-prefixed frames off the socket and hands them to the
//! coordinator. Callers never touch the socket or take a lock: they submit a
//! transaction over a channel and block on its completion.
//!
//! Failures come in two scopes. A server-reported error
//! ([`ClientError::Application`]) or a request that cannot be encoded
//! ([`ClientError::Serialization`]) affects only the call that caused it. A
//! transport failure closes the connection, fails every pending call with the
//! same error, and makes every later call fail with it straight away.
//!
//! ```no_run
//! use coordwire::{CLOBBER, Connection};
//!
//! # fn main() -> Result<(), coordwire::ClientError> {
//! let connection = Connection::connect("tcp://127.0.0.1:8046")?;
//! let rev = connection.set("/config/mode", CLOBBER, b"active")?;
//! let (body, _) = connection.get("/config/mode", rev)?;
//! assert_eq!(body, b"active");
//! connection.close()?;
//! # Ok(())
//! # }
//! ```

mod connection;
mod coordinator;
mod error;
mod event;
mod reader;
mod stream;
mod tags;
pub mod telemetry;
mod txn;

pub use connection::Connection;
pub use coordwire_config::{ClientConfig, Endpoint, EndpointParseError, LogFormat};
pub use coordwire_proto::{CLOBBER, MISSING};
pub use error::{ApplicationError, ClientError, ErrorKind};
pub use event::Event;
pub use stream::ConnectionStream;
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
