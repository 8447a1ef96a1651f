//! The coordinator thread: the single owner of connection state.
//!
//! Callers, the reader loop and `close` talk to the coordinator only through
//! channels. The coordinator assigns tags, writes requests, matches responses
//! to pending transactions and, once something fatal happens, fails every
//! pending transaction with the same error before announcing that the
//! connection is closed.
//!
//! The run loop is the running state. Leaving it moves the connection to
//! closing, where the terminal error is recorded and pending work is failed.
//! Dropping the closed-signal sender is the final transition to closed.

use std::io::{self, Write};
use std::sync::{Arc, OnceLock};

use coordwire_proto::{Codec, write_frame};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select, unbounded};
use tracing::{debug, info, trace, warn};

use crate::error::ClientError;
use crate::reader::Inbound;
use crate::stream::ConnectionStream;
use crate::tags::TagTable;
use crate::txn::Transaction;

pub(crate) const COORDINATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::coordinator");

/// The write half of a connection.
pub(crate) trait Outbound: Write + Send + 'static {
    /// Releases the underlying socket so a blocked reader wakes up.
    ///
    /// Called once, while the connection is closing.
    fn release(&mut self);
}

impl Outbound for ConnectionStream {
    fn release(&mut self) {
        if let Err(error) = self.shutdown()
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(target: COORDINATOR_TARGET, %error, "socket shutdown failed");
        }
    }
}

/// Messages accepted on the control channel.
#[derive(Debug)]
pub(crate) enum Control {
    Stop,
}

/// Uninhabited: nothing is ever sent on the closed channel, it only disconnects.
#[derive(Debug)]
pub(crate) enum Never {}

/// The error that ended a connection, written once by the coordinator.
#[derive(Debug, Default)]
pub(crate) struct Terminal {
    error: OnceLock<ClientError>,
}

impl Terminal {
    fn record(&self, error: ClientError) {
        if self.error.set(error).is_err() {
            trace!(target: COORDINATOR_TARGET, "terminal error already recorded");
        }
    }

    /// The recorded error, or `None` while the connection is running.
    pub(crate) fn get(&self) -> Option<&ClientError> {
        self.error.get()
    }

    /// The error to report to a caller that observed the closed signal.
    pub(crate) fn error(&self) -> ClientError {
        self.get().cloned().unwrap_or(ClientError::Closed)
    }
}

/// Channel ends held by everything outside the coordinator thread.
#[derive(Debug)]
pub(crate) struct CoordinatorHandle {
    /// Rendezvous channel for new transactions.
    pub(crate) submit: Sender<Transaction>,
    /// Sending end for the reader loop.
    pub(crate) inbound: Sender<Inbound>,
    pub(crate) control: Sender<Control>,
    /// Disconnects when the connection has closed.
    pub(crate) closed: Receiver<Never>,
    pub(crate) terminal: Arc<Terminal>,
}

struct Mailboxes {
    submissions: Receiver<Transaction>,
    inbound: Receiver<Inbound>,
    control: Receiver<Control>,
}

/// State touched while the coordinator is running.
struct Session<W, C> {
    writer: W,
    codec: C,
    tags: TagTable,
}

enum Step {
    Continue,
    Close(ClientError),
}

/// The coordinator actor. Build one with [`Coordinator::new`] and move it onto
/// its own thread with [`Coordinator::run`].
pub(crate) struct Coordinator<W, C> {
    session: Session<W, C>,
    mailboxes: Mailboxes,
    terminal: Arc<Terminal>,
    closed: Sender<Never>,
}

impl<W: Outbound, C: Codec> Coordinator<W, C> {
    pub(crate) fn new(writer: W, codec: C) -> (Self, CoordinatorHandle) {
        let (submit, submissions) = bounded(0);
        let (inbound_tx, inbound_rx) = unbounded();
        let (control_tx, control_rx) = bounded(1);
        let (closed_tx, closed_rx) = bounded(0);
        let terminal = Arc::new(Terminal::default());

        let coordinator = Self {
            session: Session {
                writer,
                codec,
                tags: TagTable::new(),
            },
            mailboxes: Mailboxes {
                submissions,
                inbound: inbound_rx,
                control: control_rx,
            },
            terminal: Arc::clone(&terminal),
            closed: closed_tx,
        };
        let handle = CoordinatorHandle {
            submit,
            inbound: inbound_tx,
            control: control_tx,
            closed: closed_rx,
            terminal,
        };
        (coordinator, handle)
    }

    /// Runs until a stop request, a transport failure, or every handle is gone.
    pub(crate) fn run(self) {
        let Self {
            mut session,
            mailboxes,
            terminal,
            closed,
        } = self;
        debug!(target: COORDINATOR_TARGET, "coordinator running");

        let error = loop {
            // Stop requests win over any queued work.
            match mailboxes.control.try_recv() {
                Ok(Control::Stop) | Err(TryRecvError::Disconnected) => break ClientError::Closed,
                Err(TryRecvError::Empty) => {}
            }

            let step = select! {
                recv(mailboxes.control) -> _ => Step::Close(ClientError::Closed),
                recv(mailboxes.inbound) -> message => match message {
                    Ok(Inbound::Frame(payload)) => {
                        session.demultiplex(&payload);
                        Step::Continue
                    }
                    Ok(Inbound::Failed(error)) => Step::Close(error),
                    Err(_) => Step::Close(ClientError::Closed),
                },
                recv(mailboxes.submissions) -> submission => match submission {
                    Ok(txn) => session.dispatch(txn),
                    Err(_) => Step::Close(ClientError::Closed),
                },
            };
            if let Step::Close(error) = step {
                break error;
            }
        };

        session.close(&error, &terminal);
        drop(closed);
    }
}

impl<W: Outbound, C: Codec> Session<W, C> {
    fn dispatch(&mut self, txn: Transaction) -> Step {
        let id = txn.id();
        let (tag, encoded) = match self.tags.admit(txn) {
            Ok((tag, pending)) => (tag, self.codec.encode(pending.request())),
            Err(refused) => {
                warn!(target: COORDINATOR_TARGET, txn = %id, "no free tag");
                refused.fail(ClientError::TagsExhausted);
                return Step::Continue;
            }
        };

        let payload = match encoded {
            Ok(payload) => payload,
            Err(error) => {
                warn!(target: COORDINATOR_TARGET, txn = %id, tag, %error, "request not sent");
                if let Some(unsent) = self.tags.take(tag) {
                    unsent.fail(error.into());
                }
                return Step::Continue;
            }
        };

        trace!(target: COORDINATOR_TARGET, txn = %id, tag, len = payload.len(), "sending request");
        match write_frame(&mut self.writer, &payload) {
            Ok(()) => Step::Continue,
            Err(error) => {
                warn!(target: COORDINATOR_TARGET, txn = %id, tag, %error, "write failed");
                Step::Close(error.into())
            }
        }
    }

    fn demultiplex(&mut self, payload: &[u8]) {
        let response = match self.codec.decode(payload) {
            Ok(response) => response,
            Err(error) => {
                warn!(target: COORDINATOR_TARGET, %error, "dropping undecodable frame");
                return;
            }
        };
        let Some(tag) = response.tag else {
            warn!(target: COORDINATOR_TARGET, "dropping response without a tag");
            return;
        };
        match self.tags.take(tag) {
            Some(txn) => {
                trace!(target: COORDINATOR_TARGET, txn = %txn.id(), tag, "response matched");
                txn.respond(response);
            }
            None => warn!(target: COORDINATOR_TARGET, tag, "dropping response for unknown tag"),
        }
    }

    fn close(&mut self, error: &ClientError, terminal: &Terminal) {
        // Recorded before the closed signal fires so observers always find it.
        terminal.record(error.clone());
        let pending = self.tags.len();
        for (tag, txn) in self.tags.drain() {
            trace!(target: COORDINATOR_TARGET, txn = %txn.id(), tag, "failing pending call");
            txn.fail(error.clone());
        }
        self.writer.release();
        info!(target: COORDINATOR_TARGET, %error, pending, "connection closed");
    }
}
