//! Change notifications returned by [`Connection::wait`](crate::Connection::wait).

use coordwire_proto::{FLAG_DEL, FLAG_SET, Response};

/// A change to a file matching a `wait` glob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// Revision at which the change happened.
    pub rev: i64,
    /// Path of the changed file.
    pub path: String,
    /// New body of the file; empty for deletions.
    pub body: Vec<u8>,
    /// Change flags, restricted to the set and delete bits.
    pub flags: i32,
}

impl Event {
    /// Returns `true` if the file was written.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.flags & FLAG_SET != 0
    }

    /// Returns `true` if the file was deleted.
    #[must_use]
    pub const fn is_del(&self) -> bool {
        self.flags & FLAG_DEL != 0
    }
}

impl From<Response> for Event {
    fn from(response: Response) -> Self {
        Self {
            rev: response.rev(),
            flags: response.flags() & (FLAG_SET | FLAG_DEL),
            path: response.path.unwrap_or_default(),
            body: response.value.unwrap_or_default(),
        }
    }
}
