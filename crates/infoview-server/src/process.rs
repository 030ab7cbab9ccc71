//! Direct stdio connection to a backend process.
//!
//! The process is driven by two background threads (writer and reader) that only talk to the
//! owner through `std::sync::mpsc` channels. Inbound messages are buffered until the owner calls
//! [`Connection::poll`], which fires the connection events on the owner's thread.

use crate::transport::{Connection, Transport, TransportError, read_json_line, write_json_line};
use infoview_core::{Disposable, Event};
use serde_json::Value;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, trace, warn};

enum Inbound {
    Message(Value),
    Malformed(String),
    IoError(String),
    Closed,
}

/// Spawns a backend process per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTransport {
    /// Executable to run.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory, if different from the current one.
    pub current_dir: Option<PathBuf>,
}

impl ProcessTransport {
    /// Run `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl Transport for ProcessTransport {
    type Connection = ProcessConnection;

    fn connect(&self) -> Result<ProcessConnection, TransportError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stderr(Stdio::null());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        debug!(program = %self.program, args = ?self.args, "spawning backend");
        Ok(ProcessConnection::spawn(cmd)?)
    }
}

/// A connection to a spawned backend process.
pub struct ProcessConnection {
    child: Child,
    tx: Option<mpsc::Sender<Value>>,
    rx: mpsc::Receiver<Inbound>,
    json_message: Event<Value>,
    error: Event<TransportError>,
    alive: bool,
}

impl ProcessConnection {
    /// Spawn `cmd` and connect via its stdio.
    ///
    /// This overrides `stdin` / `stdout` to be piped.
    pub fn spawn(mut cmd: Command) -> io::Result<Self> {
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
        let child = cmd.spawn()?;
        Self::from_child(child)
    }

    /// Create a connection from an already-spawned process child.
    pub fn from_child(mut child: Child) -> io::Result<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("Failed to open backend stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to open backend stdout"))?;

        let (tx_out, rx_out) = mpsc::channel::<Value>();
        let (tx_in, rx_in) = mpsc::channel::<Inbound>();

        {
            let tx_in = tx_in.clone();
            thread::spawn(move || write_loop(stdin, rx_out, tx_in));
        }
        thread::spawn(move || read_loop(stdout, tx_in));

        Ok(Self {
            child,
            tx: Some(tx_out),
            rx: rx_in,
            json_message: Event::new(),
            error: Event::new(),
            alive: true,
        })
    }

    /// Process id of the backend.
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Connection for ProcessConnection {
    fn send(&mut self, message: &Value) -> Result<(), TransportError> {
        let Some(tx) = self.tx.as_ref().filter(|_| self.alive) else {
            return Err(TransportError::Disposed);
        };
        trace!(%message, "backend <-");
        tx.send(message.clone())
            .map_err(|_| TransportError::Io("backend writer thread stopped".to_string()))
    }

    fn json_message(&self) -> &Event<Value> {
        &self.json_message
    }

    fn error(&self) -> &Event<TransportError> {
        &self.error
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn poll(&mut self) -> usize {
        let mut delivered = 0;
        while self.alive
            && let Ok(inbound) = self.rx.try_recv()
        {
            match inbound {
                Inbound::Message(value) => {
                    trace!(message = %value, "backend ->");
                    delivered += 1;
                    self.json_message.fire(value);
                }
                Inbound::Malformed(err) => {
                    warn!(error = %err, "dropping malformed backend line");
                    self.error.fire(TransportError::Json(err));
                }
                Inbound::IoError(err) => {
                    warn!(error = %err, "backend connection failed");
                    self.error.fire(TransportError::Io(err));
                }
                Inbound::Closed => {
                    debug!("backend closed its stdout");
                    self.alive = false;
                    self.error
                        .fire(TransportError::Io("backend closed the connection".to_string()));
                }
            }
        }
        delivered
    }
}

impl Disposable for ProcessConnection {
    fn dispose(&mut self) {
        if self.tx.take().is_none() {
            return;
        }
        self.alive = false;
        self.json_message.dispose();
        self.error.dispose();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ProcessConnection {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn write_loop(stdin: ChildStdin, rx: mpsc::Receiver<Value>, tx_in: mpsc::Sender<Inbound>) {
    let mut writer = BufWriter::new(stdin);
    for value in rx {
        if let Err(err) = write_json_line(&mut writer, &value) {
            let _ = tx_in.send(Inbound::IoError(err.to_string()));
            break;
        }
    }
}

fn read_loop(stdout: ChildStdout, tx: mpsc::Sender<Inbound>) {
    let mut reader = BufReader::new(stdout);
    loop {
        match read_json_line(&mut reader) {
            Ok(Some(value)) => {
                if tx.send(Inbound::Message(value)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                let _ = tx.send(Inbound::Closed);
                break;
            }
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                // A bad line does not end the stream.
                if tx.send(Inbound::Malformed(err.to_string())).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Inbound::IoError(err.to_string()));
                break;
            }
        }
    }
}
