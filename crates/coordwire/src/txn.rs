//! One request awaiting its response.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use coordwire_proto::{Request, Response};
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::trace;

use crate::error::ClientError;

/// Source of transaction identifiers, shared by every connection in the process.
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Debug identity of a transaction; appears in logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TxnId(u64);

impl TxnId {
    fn next() -> Self {
        Self(NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "txn-{}", self.0)
    }
}

/// Result delivered to the waiting caller.
pub(crate) type Outcome = Result<Response, ClientError>;

/// A request paired with the slot its outcome is delivered through.
///
/// Completing consumes the transaction, so an outcome is delivered at most
/// once.
pub(crate) struct Transaction {
    id: TxnId,
    request: Request,
    slot: Sender<Outcome>,
}

/// The caller's end of a [`Transaction`].
pub(crate) struct Completion {
    id: TxnId,
    slot: Receiver<Outcome>,
}

impl Transaction {
    /// Creates a transaction for `request` and the completion its caller waits on.
    pub(crate) fn new(request: Request) -> (Self, Completion) {
        let id = TxnId::next();
        let (slot_tx, slot_rx) = bounded(1);
        (
            Self {
                id,
                request,
                slot: slot_tx,
            },
            Completion { id, slot: slot_rx },
        )
    }

    pub(crate) const fn id(&self) -> TxnId {
        self.id
    }

    pub(crate) const fn request(&self) -> &Request {
        &self.request
    }

    /// Writes the correlation tag into the outbound request.
    pub(crate) const fn stamp(&mut self, tag: i32) {
        self.request.tag = Some(tag);
    }

    /// Delivers the response.
    pub(crate) fn respond(self, response: Response) {
        self.complete(Ok(response));
    }

    /// Delivers an error.
    pub(crate) fn fail(self, error: ClientError) {
        self.complete(Err(error));
    }

    fn complete(self, outcome: Outcome) {
        // The slot has capacity for exactly this one outcome; a send error
        // only means the caller has stopped waiting.
        if self.slot.try_send(outcome).is_err() {
            trace!(txn = %self.id, "caller no longer waiting");
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Transaction")
            .field("id", &self.id)
            .field("tag", &self.request.tag)
            .field("verb", &self.request.verb)
            .finish_non_exhaustive()
    }
}

impl Completion {
    pub(crate) const fn id(&self) -> TxnId {
        self.id
    }

    /// Channel the outcome arrives on, for use in `select!`.
    pub(crate) const fn slot(&self) -> &Receiver<Outcome> {
        &self.slot
    }

    /// Takes an outcome that has already been delivered, without blocking.
    pub(crate) fn try_take(&self) -> Option<Outcome> {
        self.slot.try_recv().ok()
    }
}
