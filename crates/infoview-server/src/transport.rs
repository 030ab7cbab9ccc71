//! Transport abstraction and newline-delimited JSON framing.
//!
//! A [`Transport`] produces [`Connection`]s. A connection sends JSON values and reports inbound
//! values on its `json_message` event and failures on its `error` event. Framing on byte streams
//! is one JSON document per line:
//!
//! ```text
//! {"command":"info","seq_num":1,"file_name":"/a.lean","line":3,"column":5}\n
//! ```

use infoview_core::{Disposable, Event};
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Errors surfaced on a connection's `error` event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    /// Reading from or writing to the underlying stream failed.
    Io(String),
    #[error("invalid json: {0}")]
    /// A frame was not valid JSON.
    Json(String),
    #[error("malformed message: {0}")]
    /// A message was valid JSON but not of the expected shape.
    Malformed(String),
    #[error("remote error: {0}")]
    /// An error reported by the other side of a proxy.
    Remote(Value),
    #[error("connection disposed")]
    /// The connection was disposed.
    Disposed,
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl TransportError {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Malformed(_) => "malformed",
            Self::Remote(_) => "remote",
            Self::Disposed => "disposed",
        }
    }

    /// JSON form used when the error crosses a proxy.
    ///
    /// Remote errors are forwarded as-is.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Remote(value) => value.clone(),
            other => json!({ "error": other.kind(), "message": other.to_string() }),
        }
    }
}

/// A live, bidirectional JSON message channel.
pub trait Connection: Disposable {
    /// Send a JSON value to the other side.
    fn send(&mut self, message: &Value) -> Result<(), TransportError>;

    /// Fired once per inbound message, already deserialized.
    fn json_message(&self) -> &Event<Value>;

    /// Fired for transport failures and malformed inbound frames.
    fn error(&self) -> &Event<TransportError>;

    /// Returns `false` once the connection was disposed or the peer went away.
    fn is_alive(&self) -> bool;

    /// Deliver buffered inbound messages on the caller's thread. Returns the number delivered.
    ///
    /// Event-driven connections deliver as messages arrive and need no polling.
    fn poll(&mut self) -> usize {
        0
    }
}

/// A factory for [`Connection`]s.
pub trait Transport {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Open a new connection.
    fn connect(&self) -> Result<Self::Connection, TransportError>;
}

/// Write `value` as one line of JSON.
pub fn write_json_line<W: Write>(writer: &mut W, value: &Value) -> io::Result<()> {
    let body =
        serde_json::to_vec(value).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    writer.write_all(&body)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read one line of JSON from `reader`.
///
/// Blank lines are skipped. Returns:
/// - `Ok(Some(value))` when a message is successfully read.
/// - `Ok(None)` on clean EOF.
pub fn read_json_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Value>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str(trimmed)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        return Ok(Some(value));
    }
}
