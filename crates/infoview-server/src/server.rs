//! Backend client.
//!
//! [`InfoServer`] speaks the backend protocol over any [`Connection`]. It allocates sequence
//! numbers, remembers which goal fetch each `info` request belongs to, and turns inbound messages
//! into typed events:
//!
//! - [`InfoServer::all_messages`]: a new global diagnostics snapshot
//! - [`InfoServer::status_changed`]: the busy state or task list changed
//! - [`InfoServer::info_replies`]: the answer to a goal fetch, keyed by [`FetchTicket`]
//! - [`InfoServer::errors`]: transport failures and backend errors without a request
//!
//! A connection failure (`Io` or `Disposed` on the connection's error event) rejects every goal
//! fetch still in flight with [`BackendError::Disconnected`].
//!
//! `InfoServer` implements [`InfoBackend`], so it plugs directly into an
//! [`InfoProvider`](infoview_core::InfoProvider). Replies are only delivered from inbound
//! messages, never from inside `request_info`.

use crate::messages::{ServerRequest, ServerResponse, ServerStatus};
use crate::transport::{Connection, TransportError};
use infoview_core::{
    BackendError, DiagnosticMessage, Disposable, DisposableBag, Event, FetchTicket, InfoBackend,
    InfoRecord, Location,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The answer to one goal fetch.
pub type InfoReply = (FetchTicket, Result<Option<InfoRecord>, BackendError>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingRequest {
    Info(FetchTicket),
    Sync,
}

struct Shared {
    pending: Mutex<HashMap<u64, PendingRequest>>,
    status: Mutex<ServerStatus>,
    all_messages: Event<Vec<DiagnosticMessage>>,
    status_changed: Event<ServerStatus>,
    info_replies: Event<InfoReply>,
    errors: Event<TransportError>,
}

impl Shared {
    fn handle_message(&self, value: &Value) {
        let response: ServerResponse = match serde_json::from_value(value.clone()) {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "unrecognized backend message");
                self.errors
                    .fire(TransportError::Malformed(format!("backend message: {err}")));
                return;
            }
        };

        match response {
            ServerResponse::Ok { seq_num, record } => {
                let pending = self.pending.lock().remove(&seq_num);
                match pending {
                    Some(PendingRequest::Info(ticket)) => {
                        trace!(seq_num, ticket = ticket.0, "info reply");
                        self.info_replies.fire((ticket, Ok(record)));
                    }
                    Some(PendingRequest::Sync) => trace!(seq_num, "sync acknowledged"),
                    None => debug!(seq_num, "reply for unknown or cancelled request"),
                }
            }
            ServerResponse::Error { seq_num, message } => {
                let pending = seq_num.and_then(|seq| self.pending.lock().remove(&seq));
                match pending {
                    Some(PendingRequest::Info(ticket)) => {
                        self.info_replies
                            .fire((ticket, Err(BackendError::Request { message })));
                    }
                    Some(PendingRequest::Sync) => {
                        warn!(message = %message, "sync failed");
                        self.errors.fire(TransportError::Remote(
                            serde_json::json!({ "error": "sync", "message": message }),
                        ));
                    }
                    None => {
                        warn!(?seq_num, message = %message, "backend error");
                        self.errors.fire(TransportError::Remote(
                            serde_json::json!({ "error": "backend", "message": message }),
                        ));
                    }
                }
            }
            ServerResponse::AllMessages { msgs } => {
                debug!(count = msgs.len(), "diagnostics snapshot");
                self.all_messages.fire(msgs);
            }
            ServerResponse::CurrentTasks { is_running, tasks } => {
                let next = ServerStatus { is_running, tasks };
                {
                    let mut status = self.status.lock();
                    if *status == next {
                        return;
                    }
                    *status = next.clone();
                }
                debug!(is_running = next.is_running, tasks = next.tasks.len(), "status changed");
                self.status_changed.fire(next);
            }
        }
    }

    fn fail_pending(&self, err: &BackendError) {
        let drained: Vec<(u64, PendingRequest)> = self.pending.lock().drain().collect();
        for (_, request) in drained {
            if let PendingRequest::Info(ticket) = request {
                self.info_replies.fire((ticket, Err(err.clone())));
            }
        }
    }
}

/// A backend client over a [`Connection`].
pub struct InfoServer<C> {
    connection: C,
    next_seq: u64,
    shared: Arc<Shared>,
    subscriptions: DisposableBag,
}

impl<C: Connection> InfoServer<C> {
    /// Start speaking the backend protocol over `connection`.
    pub fn new(connection: C) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            status: Mutex::new(ServerStatus::default()),
            all_messages: Event::new(),
            status_changed: Event::new(),
            info_replies: Event::new(),
            errors: Event::new(),
        });

        let mut subscriptions = DisposableBag::new();
        {
            let shared = Arc::clone(&shared);
            subscriptions.push(
                connection
                    .json_message()
                    .subscribe(move |value: &Value| shared.handle_message(value)),
            );
        }
        {
            let shared = Arc::clone(&shared);
            subscriptions.push(connection.error().subscribe(move |err: &TransportError| {
                shared.errors.fire(err.clone());
                if matches!(err, TransportError::Io(_) | TransportError::Disposed) {
                    shared.fail_pending(&BackendError::Disconnected);
                }
            }));
        }

        Self {
            connection,
            next_seq: 1,
            shared,
            subscriptions,
        }
    }

    /// Fired with every diagnostics snapshot.
    pub fn all_messages(&self) -> &Event<Vec<DiagnosticMessage>> {
        &self.shared.all_messages
    }

    /// Fired when the busy state or task list changes.
    pub fn status_changed(&self) -> &Event<ServerStatus> {
        &self.shared.status_changed
    }

    /// Fired with the answer to each goal fetch.
    pub fn info_replies(&self) -> &Event<InfoReply> {
        &self.shared.info_replies
    }

    /// Fired for transport failures and backend errors not tied to a request.
    pub fn errors(&self) -> &Event<TransportError> {
        &self.shared.errors
    }

    /// The last reported busy state.
    pub fn status(&self) -> ServerStatus {
        self.shared.status.lock().clone()
    }

    /// Number of requests awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Mutable access to the underlying connection.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Deliver buffered inbound messages (see [`Connection::poll`]).
    pub fn poll(&mut self) -> usize {
        self.connection.poll()
    }

    /// Query the info record at `location` on behalf of `ticket`. Returns the sequence number.
    pub fn info(&mut self, ticket: FetchTicket, location: &Location) -> Result<u64, BackendError> {
        let seq_num = self.allocate_seq();
        self.shared
            .pending
            .lock()
            .insert(seq_num, PendingRequest::Info(ticket));
        let request = ServerRequest::Info {
            seq_num,
            file_name: location.file_name.clone(),
            line: location.line,
            column: location.column,
        };
        self.send(&request)?;
        Ok(seq_num)
    }

    /// Replace the backend's copy of `file_name`. Returns the sequence number.
    pub fn sync(&mut self, file_name: &str, content: &str) -> Result<u64, BackendError> {
        let seq_num = self.allocate_seq();
        self.shared
            .pending
            .lock()
            .insert(seq_num, PendingRequest::Sync);
        let request = ServerRequest::Sync {
            seq_num,
            file_name: file_name.to_string(),
            content: content.to_string(),
        };
        self.send(&request)?;
        Ok(seq_num)
    }

    /// Forget the request(s) issued for `ticket`; a late reply is dropped.
    pub fn cancel(&mut self, ticket: FetchTicket) {
        self.shared
            .pending
            .lock()
            .retain(|_, request| *request != PendingRequest::Info(ticket));
    }

    /// Fail every outstanding goal fetch with `err`.
    pub fn fail_pending(&self, err: BackendError) {
        self.shared.fail_pending(&err);
    }

    fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        seq
    }

    fn send(&mut self, request: &ServerRequest) -> Result<(), BackendError> {
        let value = serde_json::to_value(request).map_err(|err| BackendError::Request {
            message: err.to_string(),
        })?;
        if let Err(err) = self.connection.send(&value) {
            warn!(error = %err, seq_num = request.seq_num(), "request not sent");
            self.shared.pending.lock().remove(&request.seq_num());
            return Err(match err {
                TransportError::Disposed | TransportError::Io(_) => BackendError::Disconnected,
                other => BackendError::Request {
                    message: other.to_string(),
                },
            });
        }
        Ok(())
    }
}

impl<C: Connection> InfoBackend for InfoServer<C> {
    fn request_info(
        &mut self,
        ticket: FetchTicket,
        location: &Location,
    ) -> Result<(), BackendError> {
        self.info(ticket, location).map(|_| ())
    }

    fn cancel_info(&mut self, ticket: FetchTicket) {
        self.cancel(ticket);
    }
}

impl<C: Connection> Disposable for InfoServer<C> {
    fn dispose(&mut self) {
        self.subscriptions.dispose();
        self.shared.pending.lock().clear();
        self.connection.dispose();
        self.shared.all_messages.dispose();
        self.shared.status_changed.dispose();
        self.shared.info_replies.dispose();
        self.shared.errors.dispose();
    }
}
