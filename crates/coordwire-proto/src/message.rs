//! Request and response records exchanged with the coordination store.
//!
//! Field numbers follow the store's protobuf schema. Every field is optional
//! on the wire; the accessors generated by `prost` return the type default
//! when a field is absent.

/// Bit set in [`Response::flags`] when a `WAIT` event reports a write.
pub const FLAG_SET: i32 = 1 << 2;

/// Bit set in [`Response::flags`] when a `WAIT` event reports a deletion.
pub const FLAG_DEL: i32 = 1 << 3;

/// Revision value accepted by `SET` and `DEL` to skip the revision check.
pub const CLOBBER: i64 = -1;

/// Revision value accepted by `SET` to require that the file does not exist.
pub const MISSING: i64 = 0;

/// Operation requested from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Verb {
    /// Read the body and revision of a file.
    Get = 1,
    /// Write a file if it has not changed since the given revision.
    Set = 2,
    /// Delete a file if it has not changed since the given revision.
    Del = 3,
    /// Report the store's current revision.
    Rev = 5,
    /// Block until a change matching a glob occurs at or after a revision.
    Wait = 6,
    /// No operation.
    Nop = 7,
    /// Enumerate files matching a glob.
    Walk = 9,
    /// Enumerate the entries of a directory.
    Getdir = 14,
    /// Report file metadata.
    Stat = 16,
    /// Report the identity of the node serving the connection.
    SelfId = 20,
    /// Present an access token.
    Access = 99,
}

/// Application-level failure reported by the store inside a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrCode {
    /// No failure; equivalent to the field being absent.
    Nil = 0,
    /// Unclassified failure.
    Other = 127,
    /// The request tag is already in use on this connection.
    TagInUse = 1,
    /// The verb is not understood by the server.
    UnknownVerb = 2,
    /// The server does not accept writes.
    Readonly = 3,
    /// The requested revision has been discarded from history.
    TooLate = 4,
    /// The file changed since the supplied revision.
    RevMismatch = 5,
    /// The path is malformed.
    BadPath = 6,
    /// A required request field was absent.
    MissingArg = 7,
    /// An offset or revision is out of range.
    Range = 8,
    /// A path component is not a directory.
    NotDir = 20,
    /// The path names a directory.
    IsDir = 21,
    /// The path does not exist.
    NoEnt = 22,
}

/// A request sent by the client.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    /// Correlation tag, assigned by the connection before the request is sent.
    #[prost(int32, optional, tag = "1")]
    pub tag: ::core::option::Option<i32>,
    /// Requested operation, see [`Verb`].
    #[prost(enumeration = "Verb", optional, tag = "2")]
    pub verb: ::core::option::Option<i32>,
    /// File path, or glob for `WAIT`.
    #[prost(string, optional, tag = "4")]
    pub path: ::core::option::Option<::prost::alloc::string::String>,
    /// File body for `SET`.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub value: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    /// Tag of another request, used by cancellation verbs.
    #[prost(int32, optional, tag = "6")]
    pub other_tag: ::core::option::Option<i32>,
    /// Offset for enumeration verbs.
    #[prost(int32, optional, tag = "7")]
    pub offset: ::core::option::Option<i32>,
    /// Revision argument.
    #[prost(int64, optional, tag = "9")]
    pub rev: ::core::option::Option<i64>,
}

impl Request {
    fn with_verb(verb: Verb) -> Self {
        Self {
            verb: Some(verb.into()),
            ..Self::default()
        }
    }

    /// Builds a `GET` request for `path` as of `rev`.
    #[must_use]
    pub fn get(path: impl Into<String>, rev: i64) -> Self {
        Self {
            path: Some(path.into()),
            rev: Some(rev),
            ..Self::with_verb(Verb::Get)
        }
    }

    /// Builds a `SET` request writing `body` to `path` if it is still at `old_rev`.
    #[must_use]
    pub fn set(path: impl Into<String>, old_rev: i64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path: Some(path.into()),
            rev: Some(old_rev),
            value: Some(body.into()),
            ..Self::with_verb(Verb::Set)
        }
    }

    /// Builds a `DEL` request removing `path` if it is still at `rev`.
    #[must_use]
    pub fn del(path: impl Into<String>, rev: i64) -> Self {
        Self {
            path: Some(path.into()),
            rev: Some(rev),
            ..Self::with_verb(Verb::Del)
        }
    }

    /// Builds a `REV` request.
    #[must_use]
    pub fn current_rev() -> Self {
        Self::with_verb(Verb::Rev)
    }

    /// Builds a `SELF` request.
    #[must_use]
    pub fn self_id() -> Self {
        Self::with_verb(Verb::SelfId)
    }

    /// Builds a `WAIT` request for the first change matching `glob` at or after `rev`.
    #[must_use]
    pub fn wait(glob: impl Into<String>, rev: i64) -> Self {
        Self {
            path: Some(glob.into()),
            rev: Some(rev),
            ..Self::with_verb(Verb::Wait)
        }
    }
}

/// A response sent by the server.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    /// Tag copied from the request this response answers.
    #[prost(int32, optional, tag = "1")]
    pub tag: ::core::option::Option<i32>,
    /// Event flags, see [`FLAG_SET`] and [`FLAG_DEL`].
    #[prost(int32, optional, tag = "2")]
    pub flags: ::core::option::Option<i32>,
    /// Revision of the file, event or store.
    #[prost(int64, optional, tag = "3")]
    pub rev: ::core::option::Option<i64>,
    /// Path of the file an event refers to.
    #[prost(string, optional, tag = "5")]
    pub path: ::core::option::Option<::prost::alloc::string::String>,
    /// File body or node identity.
    #[prost(bytes = "vec", optional, tag = "6")]
    pub value: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    /// Length reported by metadata verbs.
    #[prost(int32, optional, tag = "8")]
    pub len: ::core::option::Option<i32>,
    /// Application error code, absent or [`ErrCode::Nil`] on success.
    #[prost(enumeration = "ErrCode", optional, tag = "100")]
    pub err_code: ::core::option::Option<i32>,
    /// Free-form detail accompanying `err_code`.
    #[prost(string, optional, tag = "101")]
    pub err_detail: ::core::option::Option<::prost::alloc::string::String>,
}
