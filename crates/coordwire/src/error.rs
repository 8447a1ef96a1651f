//! Error types returned by connection operations.

use std::fmt;
use std::io;
use std::sync::Arc;

use coordwire_config::EndpointParseError;
use coordwire_proto::{CodecError, ErrCode, FrameError};
use thiserror::Error;

/// Errors returned by [`Connection`](crate::Connection) operations.
///
/// The type is `Clone` so the single error that terminates a connection can
/// be handed to every pending call and every later one; sources that are not
/// `Clone` are shared behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The address string could not be parsed.
    #[error("invalid endpoint '{input}': {source}")]
    Endpoint {
        /// The rejected address.
        input: String,
        /// Why it was rejected.
        #[source]
        source: Arc<EndpointParseError>,
    },

    /// Host name resolution failed.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// The endpoint being dialled.
        endpoint: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Host name resolution produced no addresses.
    #[error("no addresses resolved for {endpoint}")]
    NoAddrs {
        /// The endpoint being dialled.
        endpoint: String,
    },

    /// Establishing the socket failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// The endpoint being dialled.
        endpoint: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A connection worker thread could not be started.
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        /// Name of the thread.
        thread: &'static str,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Reading from or writing to the socket failed. Fatal to the connection.
    #[error("transport failure: {0}")]
    Transport(#[source] Arc<FrameError>),

    /// The request could not be encoded. Affects only the one call.
    #[error("failed to serialise request: {0}")]
    Serialization(#[source] Arc<CodecError>),

    /// Every correlation tag is held by a pending request.
    #[error("no free request tag")]
    TagsExhausted,

    /// The server rejected the request.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// The connection was closed.
    #[error("connection closed")]
    Closed,

    /// A connection worker thread panicked.
    #[error("connection worker thread panicked")]
    WorkerPanicked,
}

impl ClientError {
    /// Returns the server-reported failure kind, if this is an application error.
    #[must_use]
    pub const fn application_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Application(error) => Some(error.kind()),
            _ => None,
        }
    }

    /// Returns `true` for failures that terminated the connection.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<FrameError> for ClientError {
    fn from(error: FrameError) -> Self {
        Self::Transport(Arc::new(error))
    }
}

impl From<CodecError> for ClientError {
    fn from(error: CodecError) -> Self {
        Self::Serialization(Arc::new(error))
    }
}

/// Category of a server-reported failure.
///
/// Decoupled from the wire enumeration: codes this client does not know map
/// to [`ErrorKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unclassified failure.
    Other,
    /// The request tag was already in use on the server.
    TagInUse,
    /// The server did not understand the verb.
    UnknownVerb,
    /// The server does not accept writes.
    ReadOnly,
    /// The requested revision is no longer retained.
    TooLate,
    /// The file changed since the supplied revision.
    RevMismatch,
    /// The path is malformed.
    BadPath,
    /// A required argument was missing.
    MissingArg,
    /// An argument was out of range.
    Range,
    /// A path component is not a directory.
    NotDir,
    /// The path names a directory.
    IsDir,
    /// No such file.
    NoEnt,
}

impl ErrorKind {
    /// Maps a raw wire error code to a kind.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match ErrCode::try_from(code) {
            Ok(ErrCode::TagInUse) => Self::TagInUse,
            Ok(ErrCode::UnknownVerb) => Self::UnknownVerb,
            Ok(ErrCode::Readonly) => Self::ReadOnly,
            Ok(ErrCode::TooLate) => Self::TooLate,
            Ok(ErrCode::RevMismatch) => Self::RevMismatch,
            Ok(ErrCode::BadPath) => Self::BadPath,
            Ok(ErrCode::MissingArg) => Self::MissingArg,
            Ok(ErrCode::Range) => Self::Range,
            Ok(ErrCode::NotDir) => Self::NotDir,
            Ok(ErrCode::IsDir) => Self::IsDir,
            Ok(ErrCode::NoEnt) => Self::NoEnt,
            Ok(ErrCode::Nil | ErrCode::Other) | Err(_) => Self::Other,
        }
    }

    /// Stable name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Other => "OTHER",
            Self::TagInUse => "TAG_IN_USE",
            Self::UnknownVerb => "UNKNOWN_VERB",
            Self::ReadOnly => "READONLY",
            Self::TooLate => "TOO_LATE",
            Self::RevMismatch => "REV_MISMATCH",
            Self::BadPath => "BAD_PATH",
            Self::MissingArg => "MISSING_ARG",
            Self::Range => "RANGE",
            Self::NotDir => "NOTDIR",
            Self::IsDir => "ISDIR",
            Self::NoEnt => "NOENT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A failure reported by the server in an otherwise well-formed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationError {
    kind: ErrorKind,
    detail: Option<String>,
}

impl ApplicationError {
    /// Creates an application error.
    #[must_use]
    pub const fn new(kind: ErrorKind, detail: Option<String>) -> Self {
        Self { kind, detail }
    }

    /// Builds an error from a raw wire code and optional detail, dropping an empty detail.
    #[must_use]
    pub fn from_wire(code: i32, detail: Option<String>) -> Self {
        Self::new(
            ErrorKind::from_code(code),
            detail.filter(|text| !text.is_empty()),
        )
    }

    /// The failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Server-supplied detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(formatter, "{}: {detail}", self.kind),
            None => write!(formatter, "{}", self.kind),
        }
    }
}

impl std::error::Error for ApplicationError {}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ErrCode::RevMismatch, ErrorKind::RevMismatch)]
    #[case(ErrCode::NoEnt, ErrorKind::NoEnt)]
    #[case(ErrCode::Readonly, ErrorKind::ReadOnly)]
    #[case(ErrCode::Other, ErrorKind::Other)]
    fn maps_wire_codes(#[case] code: ErrCode, #[case] expected: ErrorKind) {
        assert_eq!(ErrorKind::from_code(code.into()), expected);
    }

    #[rstest]
    fn unknown_codes_are_other() {
        assert_eq!(ErrorKind::from_code(64), ErrorKind::Other);
    }

    #[rstest]
    #[case(None, "NOENT")]
    #[case(Some("/a".to_owned()), "NOENT: /a")]
    #[case(Some(String::new()), "NOENT")]
    fn renders_kind_and_detail(#[case] detail: Option<String>, #[case] expected: &str) {
        let error = ApplicationError::from_wire(ErrCode::NoEnt.into(), detail);

        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    fn application_errors_pass_through_client_error_display() {
        let error = ClientError::from(ApplicationError::new(ErrorKind::TooLate, None));

        assert_eq!(error.to_string(), "TOO_LATE");
        assert_eq!(error.application_kind(), Some(ErrorKind::TooLate));
        assert!(!error.is_transport());
    }

    #[rstest]
    fn frame_errors_become_transport_failures() {
        let error = ClientError::from(FrameError::Eof);

        assert!(error.is_transport());
        assert_eq!(error.to_string(), "transport failure: connection closed by peer");
    }
}
