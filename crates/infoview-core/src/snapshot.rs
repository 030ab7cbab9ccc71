//! Serializable engine snapshots.
//!
//! The engine never hands out its mutable state. Everything that leaves it (redraw
//! notifications, rendering input, panel messages) is an [`InfoSnapshot`] copied out at the time
//! of the event.

use crate::diagnostics::DiagnosticMessage;
use crate::position::Location;
use serde::{Deserialize, Serialize};

/// Which subset of information the panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// The goal state at the cursor plus the diagnostics attached to it.
    OnlyState,
    /// Every diagnostic of the current file; no goal state is fetched.
    #[default]
    AllMessages,
}

/// A point-in-time copy of the engine state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoSnapshot {
    /// `true` while updates are paused.
    pub stopped: bool,
    /// Current display mode.
    pub display_mode: DisplayMode,
    /// Cursor location (file + backend coordinates), if a matching document was seen.
    pub location: Option<Location>,
    /// Goal state text at the cursor (only tracked in [`DisplayMode::OnlyState`]).
    pub goal_state: Option<String>,
    /// The accepted diagnostics subset, in display order.
    pub messages: Vec<DiagnosticMessage>,
}

impl InfoSnapshot {
    /// File name of the current location, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.location.as_ref().map(|loc| loc.file_name.as_str())
    }

    /// Returns `true` if the goal block should be shown.
    pub fn shows_goal(&self) -> bool {
        self.display_mode == DisplayMode::OnlyState
            && self.goal_state.as_deref().is_some_and(|goal| !goal.is_empty())
    }
}
