#![warn(missing_docs)]
//! `infoview-core` - headless synchronization core for a proof assistant info view.
//!
//! The crate tracks the cursor in a source document, reconciles it with the backend's goal state
//! and diagnostics, and decides when the detached info panel must be redrawn. It does not talk to
//! a backend process or a panel runtime itself: those are reached through the [`EditorHost`] and
//! [`InfoBackend`] traits and the [`Event`]s the engine publishes.
//!
//! # Overview
//!
//! - [`event`]: synchronous event bus ([`Event`], [`Signal`], [`Subscription`]).
//! - [`diagnostics`]: diagnostic messages and the relevant-subset computation.
//! - [`engine`]: the reconciliation engine ([`InfoProvider`]).
//! - [`render`]: HTML and plain-text rendering of engine snapshots.
//! - [`protocol`]: host/panel messages and `command:` URIs.
//!
//! ```rust
//! use infoview_core::{DiagnosticMessage, DisplayMode, Location, Severity, relevant_messages};
//!
//! let all = vec![
//!     DiagnosticMessage::new("a.lean", 3, 9, Severity::Error, "", "c"),
//!     DiagnosticMessage::new("a.lean", 3, 2, Severity::Warning, "", "a"),
//!     DiagnosticMessage::new("a.lean", 3, 5, Severity::Error, "", "b"),
//! ];
//! let visible = relevant_messages(&all, &Location::new("a.lean", 3, 7), DisplayMode::OnlyState, false);
//! assert_eq!(visible.iter().map(|m| m.pos_col).collect::<Vec<_>>(), vec![5, 9]);
//! ```

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod event;
pub mod position;
pub mod protocol;
pub mod render;
pub mod snapshot;
pub mod uri;

pub use config::{Config, ConfigPatch, config_signal};
pub use diagnostics::{
    DiagnosticMessage, Severity, messages_equal, nearest_left_start, relevant_messages,
};
pub use engine::{
    ActiveCursor, DocumentSelector, EditorHost, EngineState, FetchTicket, InfoBackend,
    InfoProvider, InfoRecord,
};
pub use error::{BackendError, InfoviewError, Result};
pub use event::{
    Disposable, DisposableBag, Event, MAX_REENTRANT_FIRES, Signal, Subscription,
};
pub use position::{Location, Position};
pub use protocol::{FromInfoviewMessage, InfoviewCommand, ToInfoviewMessage, command_ids};
pub use render::{RenderAssets, colorize_message, escape_html, render_html, render_text};
pub use snapshot::{DisplayMode, InfoSnapshot};
