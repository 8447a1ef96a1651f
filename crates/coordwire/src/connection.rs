//! The public connection handle and its blocking verbs.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use coordwire_config::{ClientConfig, Endpoint};
use coordwire_proto::{ErrCode, ProtobufCodec, Request, Response};
use crossbeam_channel::{Receiver, Sender, TrySendError, select};
use tracing::{debug, info, trace};

use crate::coordinator::{Control, Coordinator, CoordinatorHandle, Never, Terminal};
use crate::error::{ApplicationError, ClientError};
use crate::event::Event;
use crate::reader::run_reader;
use crate::stream::{ConnectionStream, dial};
use crate::txn::Transaction;

const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

const COORDINATOR_THREAD: &str = "coordwire-coordinator";
const READER_THREAD: &str = "coordwire-reader";

/// A multiplexed connection to a coordination store.
///
/// Every verb blocks the calling thread until the server answers or the
/// connection dies. The handle is `Sync`: share it between threads (for
/// example behind an [`Arc`]) to keep many requests in flight at once over
/// the one socket. Responses are matched to callers by tag, so calls complete
/// in whatever order the server answers them.
///
/// The first transport failure closes the connection for good. Every call
/// pending at that moment, and every later call, fails with that same error.
///
/// Dropping the handle stops the connection without waiting for its worker
/// threads; use [`Connection::close`] to wait for them.
#[derive(Debug)]
pub struct Connection {
    endpoint: Endpoint,
    submit: Sender<Transaction>,
    control: Sender<Control>,
    closed: Receiver<Never>,
    terminal: Arc<Terminal>,
    workers: Mutex<Option<Workers>>,
}

#[derive(Debug)]
struct Workers {
    coordinator: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Connects to `address` using the default configuration.
    ///
    /// `address` is either a URL (`tcp://host:port`, `unix:///path`) or a bare
    /// `host[:port]`, which defaults to port 8046.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Endpoint`] for a malformed address and a dial
    /// error if the server cannot be reached.
    pub fn connect(address: &str) -> Result<Self, ClientError> {
        Self::connect_with(&ClientConfig::for_endpoint(parse_endpoint(address)?))
    }

    /// Connects to `address`, giving up on each connect attempt after `timeout`.
    ///
    /// # Errors
    ///
    /// As for [`Connection::connect`].
    pub fn connect_timeout(address: &str, timeout: Duration) -> Result<Self, ClientError> {
        let config = ClientConfig::for_endpoint(parse_endpoint(address)?)
            .with_connect_timeout(timeout);
        Self::connect_with(&config)
    }

    /// Connects using an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns a dial error if the endpoint cannot be reached, or
    /// [`ClientError::Spawn`] if a worker thread cannot be started.
    pub fn connect_with(config: &ClientConfig) -> Result<Self, ClientError> {
        debug!(target: CONNECTION_TARGET, endpoint = %config.endpoint(), "dialling");
        let stream = dial(config.endpoint(), config.connect_timeout())?;
        Self::from_stream(stream, config)
    }

    /// Runs a connection over an already established stream.
    ///
    /// The endpoint in `config` is only used for reporting.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] if the stream cannot be split into read
    /// and write handles, or [`ClientError::Spawn`] if a worker thread cannot
    /// be started.
    pub fn from_stream(
        stream: impl Into<ConnectionStream>,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let endpoint = config.endpoint().clone();
        let codec = ProtobufCodec::new(config.max_frame_bytes());
        let max_frame_bytes = codec.max_frame_bytes();
        let writer = stream.into();
        let read_half = writer
            .try_clone()
            .map_err(|source| ClientError::Connect {
                endpoint: endpoint.to_string(),
                source: Arc::new(source),
            })?;

        let (coordinator, handle) = Coordinator::new(writer, codec);
        let CoordinatorHandle {
            submit,
            inbound,
            control,
            closed,
            terminal,
        } = handle;

        let coordinator = spawn(COORDINATOR_THREAD, move || coordinator.run())?;
        let reader = match spawn(READER_THREAD, move || {
            run_reader(read_half, max_frame_bytes, &inbound);
        }) {
            Ok(reader) => reader,
            Err(error) => {
                // The coordinator releases the socket on its way out.
                if control.try_send(Control::Stop).is_err() {
                    trace!(target: CONNECTION_TARGET, "coordinator already stopping");
                }
                if coordinator.join().is_err() {
                    return Err(ClientError::WorkerPanicked);
                }
                return Err(error);
            }
        };

        info!(target: CONNECTION_TARGET, %endpoint, "connected");
        Ok(Self {
            endpoint,
            submit,
            control,
            closed,
            terminal,
            workers: Mutex::new(Some(Workers {
                coordinator,
                reader,
            })),
        })
    }

    /// Closes the connection and waits for its worker threads to finish.
    ///
    /// Calls still in flight fail with [`ClientError::Closed`], as does every
    /// later call. Closing an already closed connection does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::WorkerPanicked`] if a worker thread panicked.
    pub fn close(&self) -> Result<(), ClientError> {
        match self.control.try_send(Control::Stop) {
            Ok(()) => debug!(target: CONNECTION_TARGET, endpoint = %self.endpoint, "stop requested"),
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                trace!(target: CONNECTION_TARGET, "stop already requested");
            }
        }
        self.await_closed();

        let workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Workers {
            coordinator,
            reader,
        }) = workers
        else {
            return Ok(());
        };
        let coordinator_joined = coordinator.join().is_ok();
        let reader_joined = reader.join().is_ok();
        if coordinator_joined && reader_joined {
            Ok(())
        } else {
            Err(ClientError::WorkerPanicked)
        }
    }

    /// Returns `true` once the connection has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.terminal.get().is_some()
    }

    /// The error that closed the connection, if it has closed.
    #[must_use]
    pub fn terminal_error(&self) -> Option<ClientError> {
        self.terminal.get().cloned()
    }

    /// The endpoint this connection was made to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Writes `body` to `path` if the file is still at revision `old_rev`.
    ///
    /// Pass [`MISSING`](coordwire_proto::MISSING) to require that the file
    /// does not exist yet, or [`CLOBBER`](coordwire_proto::CLOBBER) to write
    /// unconditionally. Returns the revision of the write.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplicationError`] of kind `RevMismatch` if the file has
    /// changed, or the connection's error if it has closed.
    pub fn set(&self, path: &str, old_rev: i64, body: &[u8]) -> Result<i64, ClientError> {
        self.call(Request::set(path, old_rev, body)).map(|response| response.rev())
    }

    /// Deletes `path` if the file is still at revision `rev`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplicationError`] if the server refuses the deletion, or
    /// the connection's error if it has closed.
    pub fn del(&self, path: &str, rev: i64) -> Result<(), ClientError> {
        self.call(Request::del(path, rev)).map(drop)
    }

    /// Reads the body and revision of `path` as of revision `rev`.
    ///
    /// A `rev` of zero reads the current state.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplicationError`] if the server cannot answer, or the
    /// connection's error if it has closed.
    pub fn get(&self, path: &str, rev: i64) -> Result<(Vec<u8>, i64), ClientError> {
        self.call(Request::get(path, rev)).map(|response| {
            let rev = response.rev();
            (response.value.unwrap_or_default(), rev)
        })
    }

    /// Returns the identity of the server node answering this connection.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if it has closed.
    pub fn self_id(&self) -> Result<Vec<u8>, ClientError> {
        self.call(Request::self_id())
            .map(|response| response.value.unwrap_or_default())
    }

    /// Returns the store's current revision.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if it has closed.
    pub fn rev(&self) -> Result<i64, ClientError> {
        self.call(Request::current_rev()).map(|response| response.rev())
    }

    /// Blocks until a file matching `glob` changes at or after revision `rev`.
    ///
    /// In the glob, `?` matches one character other than `/`, `*` matches any
    /// run of characters other than `/` and `**` matches across directories.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplicationError`] of kind `TooLate` if `rev` has been
    /// discarded from the server's history, or the connection's error if it
    /// closes first.
    pub fn wait(&self, glob: &str, rev: i64) -> Result<Event, ClientError> {
        self.call(Request::wait(glob, rev)).map(Event::from)
    }

    fn call(&self, request: Request) -> Result<Response, ClientError> {
        if let Some(error) = self.terminal_error() {
            return Err(error);
        }

        let (txn, completion) = Transaction::new(request);
        trace!(target: CONNECTION_TARGET, txn = %completion.id(), "submitting");
        select! {
            send(self.submit, txn) -> sent => {
                if sent.is_err() {
                    return Err(self.terminal.error());
                }
            }
            recv(self.closed) -> _ => return Err(self.terminal.error()),
        }

        let outcome = select! {
            recv(completion.slot()) -> delivered => {
                delivered.unwrap_or_else(|_| Err(self.terminal.error()))
            }
            // Pending calls are failed before the closed signal fires, so an
            // outcome may already be waiting.
            recv(self.closed) -> _ => completion
                .try_take()
                .unwrap_or_else(|| Err(self.terminal.error())),
        };
        interpret(outcome?)
    }

    fn await_closed(&self) {
        match self.closed.recv() {
            Ok(never) => match never {},
            Err(_) => trace!(target: CONNECTION_TARGET, "connection closed"),
        }
    }
}

fn parse_endpoint(address: &str) -> Result<Endpoint, ClientError> {
    address.parse().map_err(|source| ClientError::Endpoint {
        input: address.to_owned(),
        source: Arc::new(source),
    })
}

fn spawn<F>(name: &'static str, body: F) -> Result<JoinHandle<()>, ClientError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(body)
        .map_err(|source| ClientError::Spawn {
            thread: name,
            source: Arc::new(source),
        })
}

fn interpret(mut response: Response) -> Result<Response, ClientError> {
    let nil = i32::from(ErrCode::Nil);
    let Some(code) = response.err_code.filter(|code| *code != nil) else {
        return Ok(response);
    };
    Err(ApplicationError::from_wire(code, response.err_detail.take()).into())
}
