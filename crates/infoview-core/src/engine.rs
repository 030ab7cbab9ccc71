//! The reconciliation engine.
//!
//! [`InfoProvider`] owns the panel state (cursor, display mode, paused flag, goal state,
//! diagnostics subset) and decides, for every trigger, whether the panel must be redrawn, can be
//! nudged with a lightweight notice, or left alone.
//!
//! # Triggers
//!
//! | trigger                         | method                                   |
//! |---------------------------------|------------------------------------------|
//! | editor selection changed        | [`InfoProvider::on_selection_changed`]   |
//! | backend diagnostics snapshot    | [`InfoProvider::on_diagnostics`]         |
//! | backend status changed          | [`InfoProvider::on_status_changed`]      |
//! | goal-state response             | [`InfoProvider::on_info_response`]       |
//! | configuration patch             | [`InfoProvider::on_config_change`]       |
//! | pause / continue / mode switch  | [`InfoProvider::pause`], [`InfoProvider::resume`], [`InfoProvider::set_mode`] |
//! | panel/editor command            | [`InfoProvider::execute`]                |
//!
//! # Goal fetches
//!
//! Goal-state queries are the only asynchronous step. The engine never blocks on them: it asks
//! the [`InfoBackend`] for the state under a fresh [`FetchTicket`] and defers the redraw decision
//! until the host feeds the answer back through [`InfoProvider::on_info_response`]. Only the
//! latest ticket is applied; a superseded fetch is cancelled and its redraw reasons are carried
//! over to the fetch that replaced it.
//!
//! # Outputs
//!
//! - [`InfoProvider::redraw_event`]: fired with a fresh [`InfoSnapshot`] when content changed.
//! - [`InfoProvider::post_event`]: fired with lightweight panel notices (`position`, `pause`,
//!   `continue`).
//!
//! Handlers of these events must not call back into the provider synchronously.

use crate::config::{Config, ConfigPatch, config_signal};
use crate::diagnostics::{DiagnosticMessage, messages_equal, relevant_messages};
use crate::error::{BackendError, Result};
use crate::event::{Event, Signal};
use crate::position::{Location, Position};
use crate::protocol::{InfoviewCommand, ToInfoviewMessage};
use crate::render::render_text;
use crate::snapshot::{DisplayMode, InfoSnapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, trace, warn};

/// The editor's active cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCursor {
    /// File name of the active document.
    pub file_name: String,
    /// Language id of the active document (e.g. `"lean"`).
    pub language_id: String,
    /// Zero-based cursor position.
    pub position: Position,
}

/// Editor capabilities the engine depends on.
///
/// Implemented by the editor integration; the engine never reaches into ambient editor state.
pub trait EditorHost {
    /// The active editor's cursor, or `None` if no editor is active.
    fn active_cursor(&self) -> Option<ActiveCursor>;

    /// Move the selection of a visible editor showing `file_name` to `position` and reveal it.
    fn reveal_position(&mut self, file_name: &str, position: Position);

    /// Highlight the character at `position` in visible editors showing `file_name`.
    fn hover_position(&mut self, file_name: &str, position: Position);

    /// Clear all hover highlights.
    fn stop_hover(&mut self);

    /// Insert `text` at the start of `line` (zero-based) in `file_name`.
    fn insert_text(&mut self, file_name: &str, line: usize, text: &str);
}

/// Decides which documents the engine follows.
///
/// A document matches if its language id is listed, or its file extension is listed. An empty
/// selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSelector {
    languages: Vec<String>,
    extensions: Vec<String>,
}

impl DocumentSelector {
    /// A selector matching every document.
    pub fn any() -> Self {
        Self::default()
    }

    /// A selector matching a single language id.
    pub fn language(language_id: impl Into<String>) -> Self {
        Self {
            languages: vec![language_id.into()],
            extensions: Vec::new(),
        }
    }

    /// Also match files with `extension` (without the leading dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    /// Returns `true` if the engine should follow `cursor`'s document.
    pub fn matches(&self, cursor: &ActiveCursor) -> bool {
        if self.languages.is_empty() && self.extensions.is_empty() {
            return true;
        }
        if self.languages.iter().any(|l| *l == cursor.language_id) {
            return true;
        }
        Path::new(&cursor.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Identifies one goal-state fetch. Tickets increase monotonically per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchTicket(pub u64);

/// The backend's answer to an info query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRecord {
    /// Goal state text at the queried position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Fully qualified name of the identifier at the position.
    #[serde(default, rename = "full-id", skip_serializing_if = "Option::is_none")]
    pub full_id: Option<String>,
    /// Type of the identifier at the position.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Documentation string of the identifier at the position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Goal-state query capability.
pub trait InfoBackend {
    /// Start fetching the info record at `location`.
    ///
    /// The answer must be delivered later via [`InfoProvider::on_info_response`] with the same
    /// ticket. Implementations must not deliver it synchronously from inside this call.
    fn request_info(
        &mut self,
        ticket: FetchTicket,
        location: &Location,
    ) -> std::result::Result<(), BackendError>;

    /// The engine no longer needs the answer for `ticket`.
    fn cancel_info(&mut self, _ticket: FetchTicket) {}
}

/// The engine's mutable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    /// Updates are paused.
    pub stopped: bool,
    /// File of the last accepted cursor.
    pub cur_file: Option<String>,
    /// Last accepted cursor position (zero-based).
    pub cur_position: Option<Position>,
    /// Last accepted goal state.
    pub cur_goal_state: Option<String>,
    /// Last accepted diagnostics subset.
    pub cur_messages: Option<Vec<DiagnosticMessage>>,
    /// Current display mode.
    pub display_mode: DisplayMode,
}

impl EngineState {
    /// The current cursor as a backend location.
    pub fn location(&self) -> Option<Location> {
        let file = self.cur_file.as_ref()?;
        let position = self.cur_position?;
        Some(Location::from_cursor(file.clone(), position))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RedrawReasons {
    position_changed: bool,
    messages_changed: bool,
    forced: bool,
}

impl RedrawReasons {
    fn merge(self, other: RedrawReasons) -> RedrawReasons {
        RedrawReasons {
            position_changed: self.position_changed || other.position_changed,
            messages_changed: self.messages_changed || other.messages_changed,
            forced: self.forced || other.forced,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingFetch {
    ticket: FetchTicket,
    reasons: RedrawReasons,
}

/// The info view reconciliation engine.
pub struct InfoProvider<E, B> {
    editor: E,
    backend: B,
    selector: DocumentSelector,

    state: EngineState,
    all_messages: Vec<DiagnosticMessage>,

    config_patches: Event<ConfigPatch>,
    config: Signal<Config>,

    next_ticket: u64,
    pending: Option<PendingFetch>,

    redraw: Event<InfoSnapshot>,
    post: Event<ToInfoviewMessage>,
}

impl<E: EditorHost, B: InfoBackend> InfoProvider<E, B> {
    /// Create an engine following documents matched by `selector`.
    pub fn new(editor: E, backend: B, selector: DocumentSelector) -> Self {
        let config_patches = Event::new();
        let config = config_signal(&config_patches);
        Self {
            editor,
            backend,
            selector,
            state: EngineState::default(),
            all_messages: Vec::new(),
            config_patches,
            config,
            next_ticket: 0,
            pending: None,
            redraw: Event::new(),
            post: Event::new(),
        }
    }

    /// Apply an initial configuration patch (builder style).
    pub fn with_config(self, patch: ConfigPatch) -> Self {
        self.config_patches.fire(patch);
        self
    }

    /// Read-only view of the engine state.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Copy the engine state into a snapshot.
    pub fn snapshot(&self) -> InfoSnapshot {
        InfoSnapshot {
            stopped: self.state.stopped,
            display_mode: self.state.display_mode,
            location: self.state.location(),
            goal_state: self.state.cur_goal_state.clone(),
            messages: self.state.cur_messages.clone().unwrap_or_default(),
        }
    }

    /// The current configuration.
    pub fn config(&self) -> Config {
        self.config.current()
    }

    /// The configuration signal (folded patches).
    pub fn config_signal(&self) -> &Signal<Config> {
        &self.config
    }

    /// Fired with a snapshot whenever the panel must be re-rendered.
    pub fn redraw_event(&self) -> &Event<InfoSnapshot> {
        &self.redraw
    }

    /// Fired with lightweight notices for the panel.
    pub fn post_event(&self) -> &Event<ToInfoviewMessage> {
        &self.post
    }

    /// The editor integration.
    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Mutable access to the editor integration.
    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The ticket of the fetch whose answer is still awaited, if any.
    pub fn pending_ticket(&self) -> Option<FetchTicket> {
        self.pending.map(|p| p.ticket)
    }

    /// The editor selection changed.
    pub fn on_selection_changed(&mut self) -> Result<()> {
        self.update_position(RedrawReasons::default())
    }

    /// Re-synchronize with the editor without treating it as a position change.
    ///
    /// If nothing changed, the panel only receives a `continue` notice.
    pub fn refresh(&mut self) -> Result<()> {
        self.update_position(RedrawReasons {
            forced: true,
            ..RedrawReasons::default()
        })
    }

    /// The backend published a new global diagnostics snapshot.
    pub fn on_diagnostics(&mut self, messages: Vec<DiagnosticMessage>) -> Result<()> {
        self.all_messages = messages;
        if self.state.stopped {
            return Ok(());
        }
        if !self.update_messages() {
            trace!("diagnostics update left the visible subset unchanged");
            return Ok(());
        }
        debug!("diagnostics changed");
        self.decide(RedrawReasons {
            messages_changed: true,
            ..RedrawReasons::default()
        })
    }

    /// The backend's status (busy/idle) changed.
    pub fn on_status_changed(&mut self) -> Result<()> {
        if self.state.stopped || self.state.display_mode != DisplayMode::OnlyState {
            return Ok(());
        }
        self.fetch_goal(RedrawReasons::default())
    }

    /// Fold a configuration patch into the current configuration and redraw.
    pub fn on_config_change(&mut self, patch: ConfigPatch) {
        self.config_patches.fire(patch);
        self.update_messages();
        self.emit_redraw();
    }

    /// Pause updates. Later triggers are ignored until [`InfoProvider::resume`].
    pub fn pause(&mut self) {
        self.state.stopped = true;
        self.cancel_pending();
        debug!("updates paused");
        self.post.fire(ToInfoviewMessage::Pause);
    }

    /// Resume updates in the current display mode.
    pub fn resume(&mut self) -> Result<()> {
        self.set_mode(self.state.display_mode)
    }

    /// Switch display mode and resume.
    ///
    /// Switching to the active mode while running is a no-op. Otherwise the panel is fully
    /// repainted, even if nothing changed externally.
    pub fn set_mode(&mut self, mode: DisplayMode) -> Result<()> {
        if self.state.display_mode == mode && !self.state.stopped {
            return Ok(());
        }
        debug!(?mode, "display mode set");
        if mode != DisplayMode::OnlyState {
            self.cancel_pending();
        }
        self.state.display_mode = mode;
        self.state.stopped = false;
        self.update_position(RedrawReasons {
            position_changed: true,
            messages_changed: false,
            forced: true,
        })
    }

    /// Pause when running, resume when paused.
    pub fn toggle_updating(&mut self) -> Result<()> {
        if self.state.stopped {
            self.resume()
        } else {
            self.pause();
            Ok(())
        }
    }

    /// Deliver the backend's answer for `ticket`.
    ///
    /// Answers for superseded tickets are dropped. A failed fetch keeps the last accepted state
    /// and is returned to the caller; it is not retried.
    pub fn on_info_response(
        &mut self,
        ticket: FetchTicket,
        result: std::result::Result<Option<InfoRecord>, BackendError>,
    ) -> Result<()> {
        let Some(pending) = self.pending.take_if(|p| p.ticket == ticket) else {
            debug!(ticket = ticket.0, "dropping stale info response");
            return Ok(());
        };
        if self.state.stopped || self.state.display_mode != DisplayMode::OnlyState {
            return Ok(());
        }

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!(ticket = ticket.0, error = %err, "goal fetch failed; keeping last state");
                return Err(err.into());
            }
        };

        let goal_changed = self.apply_goal(record);
        let reasons = pending.reasons;
        debug!(ticket = ticket.0, goal_changed, ?reasons, "goal fetch completed");

        if reasons.position_changed || reasons.messages_changed || goal_changed {
            self.emit_redraw();
        } else if reasons.forced {
            self.post.fire(ToInfoviewMessage::Continue);
        }
        Ok(())
    }

    /// Run a panel/editor command.
    pub fn execute(&mut self, command: InfoviewCommand) -> Result<()> {
        trace!(command = command.id(), "execute");
        match command {
            InfoviewCommand::RevealPosition {
                file_name,
                line,
                column,
            } => {
                let position = Location::new(file_name.clone(), line, column).to_position();
                self.editor.reveal_position(&file_name, position);
                Ok(())
            }
            InfoviewCommand::HoverPosition {
                file_name,
                line,
                column,
            } => {
                let position = Location::new(file_name.clone(), line, column).to_position();
                self.editor.hover_position(&file_name, position);
                Ok(())
            }
            InfoviewCommand::StopHover => {
                self.editor.stop_hover();
                Ok(())
            }
            InfoviewCommand::Pause => {
                self.pause();
                Ok(())
            }
            InfoviewCommand::Continue => self.resume(),
            InfoviewCommand::ToggleUpdating => self.toggle_updating(),
            InfoviewCommand::SetDisplayMode(mode) => self.set_mode(mode),
            InfoviewCommand::CopyToComment => {
                self.copy_to_comment();
                Ok(())
            }
        }
    }

    /// Insert the current state as a block comment on the line after the cursor.
    pub fn copy_to_comment(&mut self) {
        let Some(cursor) = self.editor.active_cursor() else {
            return;
        };
        let text = render_text(&self.snapshot());
        self.editor.insert_text(
            &cursor.file_name,
            cursor.position.line + 1,
            &format!("/-\n{text}\n-/\n"),
        );
    }

    /// Stop publishing and reset the configuration to its default.
    pub fn dispose(&mut self) {
        self.cancel_pending();
        self.redraw.dispose();
        self.post.dispose();
        self.config.reset();
    }

    fn update_position(&mut self, reasons: RedrawReasons) -> Result<()> {
        if self.state.stopped {
            return Ok(());
        }

        let position_changed = self.change_position();
        if !position_changed && !reasons.forced {
            return Ok(());
        }
        let messages_changed = self.update_messages();

        self.decide(reasons.merge(RedrawReasons {
            position_changed,
            messages_changed,
            forced: false,
        }))
    }

    fn decide(&mut self, reasons: RedrawReasons) -> Result<()> {
        match self.state.display_mode {
            DisplayMode::OnlyState => {
                if self.state.location().is_some() {
                    self.fetch_goal(reasons)
                } else {
                    if reasons.forced {
                        self.emit_redraw();
                    }
                    Ok(())
                }
            }
            DisplayMode::AllMessages => {
                self.cancel_pending();
                if reasons.forced || reasons.messages_changed {
                    self.emit_redraw();
                } else if let Some(location) = self.state.location() {
                    self.post.fire(ToInfoviewMessage::Position(location));
                }
                Ok(())
            }
        }
    }

    fn change_position(&mut self) -> bool {
        let Some(cursor) = self.editor.active_cursor() else {
            return false;
        };
        if !self.selector.matches(&cursor) {
            return false;
        }

        let changed = self.state.cur_file.as_deref() != Some(cursor.file_name.as_str())
            || self.state.cur_position != Some(cursor.position);
        self.state.cur_file = Some(cursor.file_name);
        self.state.cur_position = Some(cursor.position);
        changed
    }

    fn update_messages(&mut self) -> bool {
        if self.state.stopped {
            return false;
        }
        let Some(location) = self.state.location() else {
            return false;
        };

        let all_errors_on_line = self.config.with_current(|c| c.all_errors_on_line);
        let msgs = relevant_messages(
            &self.all_messages,
            &location,
            self.state.display_mode,
            all_errors_on_line,
        );

        if let Some(old) = &self.state.cur_messages
            && messages_equal(old, &msgs)
        {
            return false;
        }
        self.state.cur_messages = Some(msgs);
        true
    }

    fn fetch_goal(&mut self, reasons: RedrawReasons) -> Result<()> {
        let Some(location) = self.state.location() else {
            return Ok(());
        };

        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;

        let mut reasons = reasons;
        if let Some(prev) = self.pending.take() {
            debug!(old = prev.ticket.0, new = ticket.0, "superseding goal fetch");
            reasons = reasons.merge(prev.reasons);
            self.backend.cancel_info(prev.ticket);
        }

        match self.backend.request_info(ticket, &location) {
            Ok(()) => {
                trace!(
                    ticket = ticket.0,
                    line = location.line,
                    column = location.column,
                    "goal fetch issued"
                );
                self.pending = Some(PendingFetch { ticket, reasons });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "goal fetch could not be issued");
                Err(err.into())
            }
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(prev) = self.pending.take() {
            trace!(ticket = prev.ticket.0, "cancelling goal fetch");
            self.backend.cancel_info(prev.ticket);
        }
    }

    fn apply_goal(&mut self, record: Option<InfoRecord>) -> bool {
        match record.and_then(|r| r.state).filter(|s| !s.is_empty()) {
            Some(state) => {
                if self.state.cur_goal_state.as_deref() == Some(state.as_str()) {
                    return false;
                }
                self.state.cur_goal_state = Some(state);
                true
            }
            // Clearing a visible goal is a change.
            None => self.state.cur_goal_state.take().is_some(),
        }
    }

    fn emit_redraw(&self) {
        debug!(mode = ?self.state.display_mode, "redraw");
        self.redraw.fire(self.snapshot());
    }
}
