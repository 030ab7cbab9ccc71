//! Host-side wiring of the engine to the backend client.
//!
//! [`InfoviewSession`] owns an [`InfoProvider`] whose backend is an [`InfoServer`]. Server events
//! are not applied to the provider from inside their handlers (the provider is busy polling at
//! that point). They are queued and applied by [`InfoviewSession::pump`]:
//!
//! ```text
//! pump():  connection.poll() -> server events -> queue
//!          queue -> provider.on_diagnostics / on_status_changed / on_info_response
//! ```
//!
//! Redraws are rendered to HTML and published on [`InfoviewSession::html`]; lightweight notices
//! and configuration patches for the panel are published on [`InfoviewSession::panel`].

use crate::messages::ServerStatus;
use crate::server::{InfoReply, InfoServer};
use crate::transport::{Connection, TransportError};
use infoview_core::{
    ConfigPatch, DiagnosticMessage, Disposable, DisposableBag, DocumentSelector, EditorHost,
    Event, InfoProvider, InfoSnapshot, InfoviewCommand, RenderAssets, Result, ToInfoviewMessage,
    render_html,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// A server event waiting to be applied to the provider.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// New global diagnostics snapshot.
    Diagnostics(Vec<DiagnosticMessage>),
    /// Backend busy state changed.
    StatusChanged(ServerStatus),
    /// Answer to a goal fetch.
    InfoReply(InfoReply),
    /// Transport or backend failure.
    TransportError(TransportError),
}

/// Engine + backend client + renderer.
pub struct InfoviewSession<E, C> {
    provider: InfoProvider<E, InfoServer<C>>,
    queue: Arc<Mutex<VecDeque<SessionEvent>>>,
    html: Event<String>,
    panel: Event<ToInfoviewMessage>,
    transport_errors: Event<TransportError>,
    subscriptions: DisposableBag,
}

impl<E: EditorHost, C: Connection> InfoviewSession<E, C> {
    /// Wire `editor` and a backend `connection` together.
    pub fn new(
        editor: E,
        connection: C,
        selector: DocumentSelector,
        assets: RenderAssets,
    ) -> Self {
        let server = InfoServer::new(connection);
        let queue: Arc<Mutex<VecDeque<SessionEvent>>> = Arc::new(Mutex::new(VecDeque::new()));
        let mut subscriptions = DisposableBag::new();

        {
            let queue = Arc::clone(&queue);
            subscriptions.push(server.all_messages().subscribe(
                move |msgs: &Vec<DiagnosticMessage>| {
                    queue.lock().push_back(SessionEvent::Diagnostics(msgs.clone()));
                },
            ));
        }
        {
            let queue = Arc::clone(&queue);
            subscriptions.push(server.status_changed().subscribe(
                move |status: &ServerStatus| {
                    queue.lock().push_back(SessionEvent::StatusChanged(status.clone()));
                },
            ));
        }
        {
            let queue = Arc::clone(&queue);
            subscriptions.push(server.info_replies().subscribe(move |reply: &InfoReply| {
                queue.lock().push_back(SessionEvent::InfoReply(reply.clone()));
            }));
        }
        {
            let queue = Arc::clone(&queue);
            subscriptions.push(server.errors().subscribe(move |err: &TransportError| {
                queue.lock().push_back(SessionEvent::TransportError(err.clone()));
            }));
        }

        let provider = InfoProvider::new(editor, server, selector);

        let html = Event::new();
        {
            let html = html.clone();
            let config = provider.config_signal().clone();
            subscriptions.push(provider.redraw_event().subscribe(
                move |snapshot: &InfoSnapshot| {
                    let page =
                        config.with_current(|config| render_html(snapshot, config, &assets));
                    html.fire(page);
                },
            ));
        }

        let panel = Event::new();
        {
            let panel = panel.clone();
            subscriptions.push(
                provider
                    .post_event()
                    .subscribe(move |msg: &ToInfoviewMessage| panel.fire(msg.clone())),
            );
        }

        Self {
            provider,
            queue,
            html,
            panel,
            transport_errors: Event::new(),
            subscriptions,
        }
    }

    /// The engine.
    pub fn provider(&self) -> &InfoProvider<E, InfoServer<C>> {
        &self.provider
    }

    /// Mutable access to the engine, for editor triggers.
    pub fn provider_mut(&mut self) -> &mut InfoProvider<E, InfoServer<C>> {
        &mut self.provider
    }

    /// Fired with the rendered page after each redraw.
    pub fn html(&self) -> &Event<String> {
        &self.html
    }

    /// Fired with messages for the panel (notices and configuration patches).
    pub fn panel(&self) -> &Event<ToInfoviewMessage> {
        &self.panel
    }

    /// Fired with transport and backend failures not tied to a goal fetch.
    pub fn transport_errors(&self) -> &Event<TransportError> {
        &self.transport_errors
    }

    /// Number of server events waiting to be applied.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Poll the connection and apply queued server events to the engine.
    ///
    /// Stops at the first engine error and returns it; remaining events stay queued for the
    /// next call. Returns the number of events applied.
    pub fn pump(&mut self) -> Result<usize> {
        self.provider.backend_mut().poll();

        let mut applied = 0;
        loop {
            let Some(event) = self.queue.lock().pop_front() else {
                break;
            };
            applied += 1;
            match event {
                SessionEvent::Diagnostics(msgs) => self.provider.on_diagnostics(msgs)?,
                SessionEvent::StatusChanged(_) => self.provider.on_status_changed()?,
                SessionEvent::InfoReply((ticket, result)) => {
                    self.provider.on_info_response(ticket, result)?
                }
                SessionEvent::TransportError(err) => {
                    warn!(error = %err, "backend transport error");
                    self.transport_errors.fire(err);
                }
            }
        }
        Ok(applied)
    }

    /// Forward a document's content to the backend.
    pub fn sync_document(&mut self, file_name: &str, content: &str) -> Result<()> {
        self.provider.backend_mut().sync(file_name, content)?;
        Ok(())
    }

    /// Apply a configuration patch to the engine and forward it to the panel.
    pub fn on_config_change(&mut self, patch: ConfigPatch) {
        if patch.is_empty() {
            return;
        }
        self.panel.fire(ToInfoviewMessage::OnConfigChange {
            config: patch.clone(),
        });
        self.provider.on_config_change(patch);
    }

    /// Run the command encoded in a `command:` URI clicked in the panel.
    pub fn run_command_uri(&mut self, uri: &str) -> Result<()> {
        let command = InfoviewCommand::from_uri(uri)?;
        debug!(command = command.id(), "panel command");
        self.provider.execute(command)
    }
}

impl<E: EditorHost, C: Connection> Disposable for InfoviewSession<E, C> {
    fn dispose(&mut self) {
        self.subscriptions.dispose();
        self.queue.lock().clear();
        self.provider.backend_mut().dispose();
        self.provider.dispose();
        self.html.dispose();
        self.panel.dispose();
        self.transport_errors.dispose();
    }
}
