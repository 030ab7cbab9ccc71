//! Panel-side dispatch of host messages.
//!
//! The panel receives every [`ToInfoviewMessage`] on a single channel. [`InfoviewEvents`] splits
//! them into one [`Event`] per command kind and keeps the panel's view of the configuration as a
//! [`Signal`] folding `on_config_change` patches over the default.
//!
//! Backend traffic (`server_event` / `server_error`) is not dispatched here; a
//! [`ProxyConnection`](crate::ProxyConnection) consumes it.

use infoview_core::{
    Config, ConfigPatch, Disposable, Event, Location, Signal, ToInfoviewMessage, config_signal,
};
use tracing::trace;

/// One event per host-to-panel command.
pub struct InfoviewEvents {
    position: Event<Location>,
    config_patches: Event<ConfigPatch>,
    config: Signal<Config>,
    sync_pin: Event<Vec<Location>>,
    pause: Event<()>,
    continue_: Event<()>,
    toggle_updating: Event<()>,
    copy_to_comment: Event<()>,
    toggle_pin: Event<()>,
    restart: Event<()>,
}

impl Default for InfoviewEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl InfoviewEvents {
    /// Create a dispatcher with the default configuration.
    pub fn new() -> Self {
        let config_patches = Event::new();
        let config = config_signal(&config_patches);
        Self {
            position: Event::new(),
            config_patches,
            config,
            sync_pin: Event::new(),
            pause: Event::new(),
            continue_: Event::new(),
            toggle_updating: Event::new(),
            copy_to_comment: Event::new(),
            toggle_pin: Event::new(),
            restart: Event::new(),
        }
    }

    /// Route `message` to its event.
    pub fn dispatch(&self, message: &ToInfoviewMessage) {
        trace!(?message, "panel message");
        match message {
            ToInfoviewMessage::Position(location) => self.position.fire(location.clone()),
            ToInfoviewMessage::OnConfigChange { config } => {
                self.config_patches.fire(config.clone())
            }
            ToInfoviewMessage::SyncPin { pins } => self.sync_pin.fire(pins.clone()),
            ToInfoviewMessage::Pause => self.pause.fire(()),
            ToInfoviewMessage::Continue => self.continue_.fire(()),
            ToInfoviewMessage::ToggleUpdating => self.toggle_updating.fire(()),
            ToInfoviewMessage::CopyToComment => self.copy_to_comment.fire(()),
            ToInfoviewMessage::TogglePin => self.toggle_pin.fire(()),
            ToInfoviewMessage::Restart => self.restart.fire(()),
            ToInfoviewMessage::ServerEvent { .. } | ToInfoviewMessage::ServerError { .. } => {}
        }
    }

    /// The cursor moved.
    pub fn position(&self) -> &Event<Location> {
        &self.position
    }

    /// The folded configuration.
    pub fn config(&self) -> &Signal<Config> {
        &self.config
    }

    /// The pinned locations were replaced.
    pub fn sync_pin(&self) -> &Event<Vec<Location>> {
        &self.sync_pin
    }

    /// Updates were paused.
    pub fn pause(&self) -> &Event<()> {
        &self.pause
    }

    /// Updates resumed without a content change.
    pub fn continue_(&self) -> &Event<()> {
        &self.continue_
    }

    /// The panel should flip between paused and running.
    pub fn toggle_updating(&self) -> &Event<()> {
        &self.toggle_updating
    }

    /// The panel should copy its state into a comment.
    pub fn copy_to_comment(&self) -> &Event<()> {
        &self.copy_to_comment
    }

    /// The panel should pin or unpin the current location.
    pub fn toggle_pin(&self) -> &Event<()> {
        &self.toggle_pin
    }

    /// The backend was restarted.
    pub fn restart(&self) -> &Event<()> {
        &self.restart
    }
}

impl Disposable for InfoviewEvents {
    fn dispose(&mut self) {
        self.position.dispose();
        self.config.dispose();
        self.config.reset();
        self.config_patches.dispose();
        self.sync_pin.dispose();
        self.pause.dispose();
        self.continue_.dispose();
        self.toggle_updating.dispose();
        self.copy_to_comment.dispose();
        self.toggle_pin.dispose();
        self.restart.dispose();
    }
}
