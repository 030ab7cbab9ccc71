#![warn(missing_docs)]
//! `infoview-server` - backend protocol, transports and panel proxy for `infoview-core`.
//!
//! This crate connects the headless engine to the outside world:
//! - [`transport`]: the [`Connection`] / [`Transport`] abstraction and JSON-lines framing
//! - [`process`]: a stdio connection to a spawned backend process
//! - [`proxy`]: forwarding backend traffic between a detached panel and the host
//! - [`server`]: the backend client ([`InfoServer`]), usable as an engine backend
//! - [`surface`]: panel-side dispatch of host messages ([`InfoviewEvents`])
//! - [`session`]: engine + backend + renderer wiring ([`InfoviewSession`])
//!
//! Everything is runtime-agnostic: connections either fire events as messages arrive or buffer
//! them until [`Connection::poll`] is called.

pub mod messages;
pub mod process;
pub mod proxy;
pub mod server;
pub mod session;
pub mod surface;
pub mod transport;

pub use messages::{ServerRequest, ServerResponse, ServerStatus, Task};
pub use process::{ProcessConnection, ProcessTransport};
pub use proxy::{MessageSink, ProxyConnection, ProxyHost, ProxyTransport};
pub use server::{InfoReply, InfoServer};
pub use session::{InfoviewSession, SessionEvent};
pub use surface::InfoviewEvents;
pub use transport::{Connection, Transport, TransportError, read_json_line, write_json_line};
