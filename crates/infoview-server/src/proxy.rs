//! Transport proxy between a detached panel and the host.
//!
//! The panel cannot reach the backend directly. Instead it talks through the host:
//!
//! ```text
//! panel: ProxyConnection::send(v)  ->  server_request { payload: "<v>" }  ->  host: ProxyHost
//! host:  backend message m         ->  server_event   { payload: "<m>" }  ->  panel: json_message(m)
//! host:  backend error e           ->  server_error   { payload: "<e>" }  ->  panel: error(Remote(e))
//! ```
//!
//! Messages travel through [`MessageSink`]s, so the same code works with an in-process
//! [`Event`] or a channel to another thread.

use crate::transport::{Connection, Transport, TransportError};
use infoview_core::{Disposable, DisposableBag, Event, FromInfoviewMessage, ToInfoviewMessage};
use serde_json::Value;
use std::sync::mpsc;
use tracing::{trace, warn};

/// Somewhere to post messages of type `M`.
pub trait MessageSink<M>: Clone + Send + 'static {
    /// Post `message`. Delivery failures are ignored.
    fn post(&self, message: M);
}

impl<M: Send + 'static> MessageSink<M> for Event<M> {
    fn post(&self, message: M) {
        self.fire(message);
    }
}

impl<M: Send + 'static> MessageSink<M> for mpsc::Sender<M> {
    fn post(&self, message: M) {
        let _ = self.send(message);
    }
}

/// Panel-side transport: every connection forwards through the host.
pub struct ProxyTransport<S> {
    outbound: S,
    inbound: Event<ToInfoviewMessage>,
}

impl<S: MessageSink<FromInfoviewMessage>> ProxyTransport<S> {
    /// `outbound` carries panel requests to the host; `inbound` delivers host messages.
    pub fn new(outbound: S, inbound: Event<ToInfoviewMessage>) -> Self {
        Self { outbound, inbound }
    }
}

impl<S: MessageSink<FromInfoviewMessage>> Transport for ProxyTransport<S> {
    type Connection = ProxyConnection<S>;

    fn connect(&self) -> Result<ProxyConnection<S>, TransportError> {
        if self.inbound.is_disposed() {
            return Err(TransportError::Disposed);
        }
        Ok(ProxyConnection::new(self.outbound.clone(), &self.inbound))
    }
}

/// Panel-side end of the proxy.
pub struct ProxyConnection<S> {
    outbound: S,
    json_message: Event<Value>,
    error: Event<TransportError>,
    listener: DisposableBag,
    alive: bool,
}

impl<S: MessageSink<FromInfoviewMessage>> ProxyConnection<S> {
    fn new(outbound: S, inbound: &Event<ToInfoviewMessage>) -> Self {
        let json_message = Event::new();
        let error = Event::new();

        let mut listener = DisposableBag::new();
        {
            let json_message = json_message.clone();
            let error = error.clone();
            listener.push(inbound.subscribe(move |msg: &ToInfoviewMessage| match msg {
                ToInfoviewMessage::ServerEvent { payload } => {
                    match serde_json::from_str::<Value>(payload) {
                        Ok(value) => json_message.fire(value),
                        Err(err) => error.fire(TransportError::Malformed(format!(
                            "server_event payload: {err}"
                        ))),
                    }
                }
                ToInfoviewMessage::ServerError { payload } => {
                    match serde_json::from_str::<Value>(payload) {
                        Ok(value) => error.fire(TransportError::Remote(value)),
                        Err(err) => error.fire(TransportError::Malformed(format!(
                            "server_error payload: {err}"
                        ))),
                    }
                }
                _ => {}
            }));
        }

        Self {
            outbound,
            json_message,
            error,
            listener,
            alive: true,
        }
    }
}

impl<S: MessageSink<FromInfoviewMessage>> Connection for ProxyConnection<S> {
    fn send(&mut self, message: &Value) -> Result<(), TransportError> {
        if !self.alive {
            return Err(TransportError::Disposed);
        }
        self.outbound.post(FromInfoviewMessage::ServerRequest {
            payload: message.to_string(),
        });
        Ok(())
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
}

impl<S> Disposable for ProxyConnection<S> {
    fn dispose(&mut self) {
        self.alive = false;
        self.listener.dispose();
        self.json_message.dispose();
        self.error.dispose();
    }
}

/// Host-side relay between the panel and a real backend connection.
pub struct ProxyHost<C, S> {
    backend: C,
    panel: S,
    subscriptions: DisposableBag,
}

impl<C: Connection, S: MessageSink<ToInfoviewMessage>> ProxyHost<C, S> {
    /// Relay every message and error of `backend` to `panel`.
    pub fn new(backend: C, panel: S) -> Self {
        let mut subscriptions = DisposableBag::new();
        {
            let panel = panel.clone();
            subscriptions.push(backend.json_message().subscribe(move |value: &Value| {
                trace!(message = %value, "relaying backend message to panel");
                panel.post(ToInfoviewMessage::ServerEvent {
                    payload: value.to_string(),
                });
            }));
        }
        {
            let panel = panel.clone();
            subscriptions.push(backend.error().subscribe(move |err: &TransportError| {
                panel.post(server_error(err));
            }));
        }

        Self {
            backend,
            panel,
            subscriptions,
        }
    }

    /// Handle one message from the panel.
    ///
    /// A malformed request payload or a failed send is reported to the panel as `server_error`
    /// and returned.
    pub fn handle(&mut self, message: &FromInfoviewMessage) -> Result<(), TransportError> {
        let FromInfoviewMessage::ServerRequest { payload } = message;
        let value = match serde_json::from_str::<Value>(payload) {
            Ok(value) => value,
            Err(err) => {
                let err = TransportError::Malformed(format!("server_request payload: {err}"));
                warn!(error = %err, "rejecting panel request");
                self.panel.post(server_error(&err));
                return Err(err);
            }
        };
        self.backend.send(&value).inspect_err(|err| {
            warn!(error = %err, "panel request not delivered to backend");
            self.panel.post(server_error(err));
        })
    }

    /// The backend connection.
    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Mutable access to the backend connection (e.g. to poll it).
    pub fn backend_mut(&mut self) -> &mut C {
        &mut self.backend
    }
}

impl<C: Connection, S> Disposable for ProxyHost<C, S> {
    fn dispose(&mut self) {
        self.subscriptions.dispose();
        self.backend.dispose();
    }
}

fn server_error(err: &TransportError) -> ToInfoviewMessage {
    ToInfoviewMessage::ServerError {
        payload: err.to_json().to_string(),
    }
}
