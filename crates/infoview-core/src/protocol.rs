//! Messages exchanged between the host and the panel, and the panel's command vocabulary.
//!
//! The host and the panel share no memory. They talk through JSON objects tagged by a
//! `command` field:
//!
//! ```text
//! host  -> panel : ToInfoviewMessage   { "command": "position", "fileName": ..., ... }
//! panel -> host  : FromInfoviewMessage { "command": "server_request", "payload": "<json>" }
//! ```
//!
//! User actions inside rendered markup are expressed as `command:` URIs that decode into
//! [`InfoviewCommand`] values.

use crate::config::ConfigPatch;
use crate::error::{InfoviewError, Result};
use crate::position::Location;
use crate::snapshot::DisplayMode;
use crate::uri::{file_name_to_uri, percent_decode, percent_encode_component, uri_to_file_name};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Messages sent from the host to the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ToInfoviewMessage {
    /// The cursor moved; the panel may move its marker without re-rendering.
    Position(Location),
    /// A partial configuration update.
    OnConfigChange {
        /// Fields that changed.
        config: ConfigPatch,
    },
    /// Replace the set of pinned locations.
    SyncPin {
        /// Pinned locations.
        pins: Vec<Location>,
    },
    /// Updates are paused.
    Pause,
    /// Updates resumed without a content change.
    Continue,
    /// Flip between paused and running.
    ToggleUpdating,
    /// Copy the current state into a comment in the editor.
    CopyToComment,
    /// Pin or unpin the current location.
    TogglePin,
    /// The backend was restarted.
    Restart,
    /// A backend message forwarded to the panel (JSON text).
    ServerEvent {
        /// Serialized backend message.
        payload: String,
    },
    /// A backend transport error forwarded to the panel (JSON text).
    ServerError {
        /// Serialized error.
        payload: String,
    },
}

/// Messages sent from the panel to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum FromInfoviewMessage {
    /// An opaque request to forward to the backend (JSON text).
    ServerRequest {
        /// Serialized backend request.
        payload: String,
    },
}

/// Command ids used in `command:` URIs.
pub mod command_ids {
    /// Reveal a position in the editor: `[uri, line, column]`.
    pub const REVEAL_POSITION: &str = "infoview.revealPosition";
    /// Highlight a position in the editor: `[uri, line, column]`.
    pub const HOVER_POSITION: &str = "infoview.hoverPosition";
    /// Clear hover highlights.
    pub const STOP_HOVER: &str = "infoview.stopHover";
    /// Pause updates.
    pub const PAUSE: &str = "infoview.pause";
    /// Resume updates in the current display mode.
    pub const CONTINUE: &str = "infoview.continue";
    /// Pause when running, resume when paused.
    pub const TOGGLE_UPDATING: &str = "infoview.toggleUpdating";
    /// Switch to [`DisplayMode::OnlyState`](crate::DisplayMode::OnlyState).
    pub const DISPLAY_GOAL: &str = "infoview.displayGoal";
    /// Switch to [`DisplayMode::AllMessages`](crate::DisplayMode::AllMessages).
    pub const DISPLAY_LIST: &str = "infoview.displayList";
    /// Insert the current state as a comment below the cursor.
    pub const COPY_TO_COMMENT: &str = "infoview.copyToComment";
}

/// A user action targeted at the engine or the editor integration.
///
/// Positions use backend coordinates (one-based line, zero-based column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoviewCommand {
    /// Move the editor selection to a position and reveal it.
    RevealPosition {
        /// Target file.
        file_name: String,
        /// One-based line.
        line: usize,
        /// Zero-based column.
        column: usize,
    },
    /// Highlight a position in the editor.
    HoverPosition {
        /// Target file.
        file_name: String,
        /// One-based line.
        line: usize,
        /// Zero-based column.
        column: usize,
    },
    /// Remove hover highlights.
    StopHover,
    /// Pause updates.
    Pause,
    /// Resume updates.
    Continue,
    /// Pause when running, resume when paused.
    ToggleUpdating,
    /// Switch display mode (also resumes).
    SetDisplayMode(DisplayMode),
    /// Insert the current state as a comment below the cursor.
    CopyToComment,
}

impl InfoviewCommand {
    /// The command id used in `command:` URIs.
    pub fn id(&self) -> &'static str {
        match self {
            Self::RevealPosition { .. } => command_ids::REVEAL_POSITION,
            Self::HoverPosition { .. } => command_ids::HOVER_POSITION,
            Self::StopHover => command_ids::STOP_HOVER,
            Self::Pause => command_ids::PAUSE,
            Self::Continue => command_ids::CONTINUE,
            Self::ToggleUpdating => command_ids::TOGGLE_UPDATING,
            Self::SetDisplayMode(DisplayMode::OnlyState) => command_ids::DISPLAY_GOAL,
            Self::SetDisplayMode(DisplayMode::AllMessages) => command_ids::DISPLAY_LIST,
            Self::CopyToComment => command_ids::COPY_TO_COMMENT,
        }
    }

    /// JSON arguments for this command.
    pub fn args(&self) -> Value {
        match self {
            Self::RevealPosition {
                file_name,
                line,
                column,
            }
            | Self::HoverPosition {
                file_name,
                line,
                column,
            } => json!([file_name_to_uri(file_name), line, column]),
            _ => json!([]),
        }
    }

    /// Encode as a `command:<id>?<args>` URI suitable for an `href`.
    pub fn to_uri(&self) -> String {
        format!(
            "command:{}?{}",
            self.id(),
            percent_encode_component(&self.args().to_string())
        )
    }

    /// Decode a command from its id and JSON arguments.
    pub fn from_id_and_args(id: &str, args: &Value) -> Result<Self> {
        match id {
            command_ids::REVEAL_POSITION => {
                let (file_name, line, column) = position_args(id, args)?;
                Ok(Self::RevealPosition {
                    file_name,
                    line,
                    column,
                })
            }
            command_ids::HOVER_POSITION => {
                let (file_name, line, column) = position_args(id, args)?;
                Ok(Self::HoverPosition {
                    file_name,
                    line,
                    column,
                })
            }
            command_ids::STOP_HOVER => Ok(Self::StopHover),
            command_ids::PAUSE => Ok(Self::Pause),
            command_ids::CONTINUE => Ok(Self::Continue),
            command_ids::TOGGLE_UPDATING => Ok(Self::ToggleUpdating),
            command_ids::DISPLAY_GOAL => Ok(Self::SetDisplayMode(DisplayMode::OnlyState)),
            command_ids::DISPLAY_LIST => Ok(Self::SetDisplayMode(DisplayMode::AllMessages)),
            command_ids::COPY_TO_COMMENT => Ok(Self::CopyToComment),
            other => Err(InfoviewError::UnknownCommand(other.to_string())),
        }
    }

    /// Decode a `command:<id>?<args>` URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let Some(rest) = uri.strip_prefix("command:") else {
            return Err(InfoviewError::UnknownCommand(uri.to_string()));
        };
        let (id, query) = rest.split_once('?').unwrap_or((rest, ""));
        let args = if query.is_empty() {
            Value::Array(Vec::new())
        } else {
            serde_json::from_str(&percent_decode(query))?
        };
        Self::from_id_and_args(id, &args)
    }
}

fn position_args(command: &str, args: &Value) -> Result<(String, usize, usize)> {
    let invalid = |message: &str| InfoviewError::InvalidCommandArgs {
        command: command.to_string(),
        message: message.to_string(),
    };

    let items = args
        .as_array()
        .ok_or_else(|| invalid("expected [uri, line, column]"))?;
    let [uri, line, column] = items.as_slice() else {
        return Err(invalid("expected [uri, line, column]"));
    };

    let uri = uri.as_str().ok_or_else(|| invalid("uri must be a string"))?;
    let file_name = if uri.starts_with("file://") {
        uri_to_file_name(uri).ok_or_else(|| invalid("malformed file uri"))?
    } else {
        uri.to_string()
    };
    let line = line
        .as_u64()
        .ok_or_else(|| invalid("line must be a non-negative integer"))?;
    let column = column
        .as_u64()
        .ok_or_else(|| invalid("column must be a non-negative integer"))?;

    Ok((file_name, line as usize, column as usize))
}
