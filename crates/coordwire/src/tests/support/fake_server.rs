//! A scripted coordination server for exercising real connections.

use std::io::{BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use coordwire_config::Endpoint;
use coordwire_proto::{FrameError, Request, Response, read_frame, write_frame};
use prost::Message;

#[cfg(unix)]
use std::os::unix::net::UnixListener;

use super::store::Store;
use crate::stream::ConnectionStream;

const SERVER_MAX_FRAME: u32 = 1 << 20;
const POLL: Duration = Duration::from_millis(5);
const PATIENCE: Duration = Duration::from_secs(5);

/// How the server answers requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Answers every request as soon as it arrives.
    Store,
    /// Records requests and never answers.
    Silent,
    /// Holds requests until `n` have arrived, then answers them newest first.
    ReverseBatch(usize),
}

/// What the server does once a client connects.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    mode: Mode,
    preamble: Vec<Vec<u8>>,
    seed: Vec<(String, Vec<u8>)>,
    self_id: Vec<u8>,
}

impl Script {
    pub(crate) fn new(mode: Mode) -> Self {
        Self {
            mode,
            preamble: Vec::new(),
            seed: Vec::new(),
            self_id: b"fake-node".to_vec(),
        }
    }

    /// Sends `response` before reading any request.
    pub(crate) fn unsolicited(mut self, response: &Response) -> Self {
        self.preamble.push(response.encode_to_vec());
        self
    }

    /// Sends a frame holding arbitrary bytes before reading any request.
    pub(crate) fn raw_frame(mut self, payload: &[u8]) -> Self {
        self.preamble.push(payload.to_vec());
        self
    }

    /// Starts the store with `path` holding `body`.
    pub(crate) fn with_file(mut self, path: &str, body: &[u8]) -> Self {
        self.seed.push((path.to_owned(), body.to_vec()));
        self
    }
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    fn accept(&self) -> Result<ConnectionStream> {
        let stream = match self {
            Self::Tcp(listener) => listener.accept().map(|(stream, _)| stream.into()),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().map(|(stream, _)| stream.into()),
        };
        stream.context("accept client")
    }
}

#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<Request>>,
    client: Mutex<Option<ConnectionStream>>,
}

/// A server that accepts a single client and follows a [`Script`].
pub(crate) struct FakeServer {
    endpoint: Endpoint,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<Result<()>>>,
    _socket_dir: Option<tempfile::TempDir>,
}

impl FakeServer {
    /// Listens on an ephemeral loopback TCP port.
    pub(crate) fn start(script: Script) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind tcp listener")?;
        let addr: SocketAddr = listener.local_addr()?;
        let endpoint = Endpoint::tcp(addr.ip().to_string(), addr.port());
        Ok(Self::spawn(Listener::Tcp(listener), endpoint, script, None))
    }

    /// Listens on a Unix socket in a fresh temporary directory.
    #[cfg(unix)]
    pub(crate) fn start_unix(script: Script) -> Result<Self> {
        let dir = tempfile::tempdir().context("socket directory")?;
        let path = dir.path().join("store.sock");
        let listener = UnixListener::bind(&path).context("bind unix listener")?;
        let path = path
            .to_str()
            .context("socket path is not UTF-8")?
            .to_owned();
        Ok(Self::spawn(
            Listener::Unix(listener),
            Endpoint::unix(path),
            script,
            Some(dir),
        ))
    }

    fn spawn(
        listener: Listener,
        endpoint: Endpoint,
        script: Script,
        socket_dir: Option<tempfile::TempDir>,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        let thread = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || serve(&listener, &script, &shared))
        };
        Self {
            endpoint,
            shared,
            thread: Some(thread),
            _socket_dir: socket_dir,
        }
    }

    pub(crate) const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Every request received so far, in arrival order.
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.shared
            .requests
            .lock()
            .expect("requests lock")
            .clone()
    }

    /// Blocks until at least `count` requests have arrived.
    pub(crate) fn await_requests(&self, count: usize) -> Vec<Request> {
        let deadline = Instant::now() + PATIENCE;
        loop {
            let requests = self.requests();
            if requests.len() >= count {
                return requests;
            }
            assert!(
                Instant::now() < deadline,
                "expected {count} requests, saw {}",
                requests.len()
            );
            thread::sleep(POLL);
        }
    }

    /// Drops the client connection from the server side.
    pub(crate) fn disconnect(&self) {
        let deadline = Instant::now() + PATIENCE;
        loop {
            if let Some(client) = self.shared.client.lock().expect("client lock").take() {
                drop(client.shutdown());
                return;
            }
            assert!(Instant::now() < deadline, "no client connected");
            thread::sleep(POLL);
        }
    }

    /// Waits for the server thread and reports how it ended.
    pub(crate) fn finish(mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))?
    }
}

fn serve(listener: &Listener, script: &Script, shared: &Shared) -> Result<()> {
    let stream = listener.accept()?;
    *shared.client.lock().expect("client lock") = Some(stream.try_clone()?);
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    let mut store = Store::new(&script.self_id);
    for (path, body) in &script.seed {
        store.seed(path, body);
    }
    for payload in &script.preamble {
        write_frame(&mut writer, payload)?;
    }

    let mut held = Vec::new();
    loop {
        let payload = match read_frame(&mut reader, SERVER_MAX_FRAME) {
            Ok(payload) => payload,
            Err(error) if hung_up(&error) => return Ok(()),
            Err(error) => return Err(error).context("read request"),
        };
        let request = Request::decode(payload.as_slice()).context("decode request")?;
        shared
            .requests
            .lock()
            .expect("requests lock")
            .push(request.clone());

        let batch = match script.mode {
            Mode::Silent => continue,
            Mode::Store => vec![request],
            Mode::ReverseBatch(size) => {
                held.push(request);
                if held.len() < size {
                    continue;
                }
                held.drain(..).rev().collect()
            }
        };
        for pending in batch {
            for response in store.apply(pending) {
                match write_frame(&mut writer, &response.encode_to_vec()) {
                    Ok(()) => {}
                    Err(error) if hung_up(&error) => return Ok(()),
                    Err(error) => return Err(error).context("write response"),
                }
            }
        }
    }
}

/// The client went away; not a server failure.
fn hung_up(error: &FrameError) -> bool {
    match error {
        FrameError::Eof => true,
        FrameError::Io(io) => matches!(
            io.kind(),
            ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
        ),
        _ => false,
    }
}
