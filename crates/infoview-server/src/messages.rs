//! Backend wire messages.
//!
//! The backend speaks newline-delimited JSON. Requests carry a `command` tag and a `seq_num`
//! chosen by the client; responses carry a `response` tag:
//!
//! ```text
//! -> {"command":"info","seq_num":4,"file_name":"/a.lean","line":3,"column":5}
//! <- {"response":"ok","seq_num":4,"record":{"state":"⊢ P"}}
//! <- {"response":"all_messages","msgs":[...]}
//! <- {"response":"current_tasks","is_running":true,"tasks":[...]}
//! ```

use infoview_core::{DiagnosticMessage, InfoRecord};
use serde::{Deserialize, Serialize};

/// Requests sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ServerRequest {
    /// Query the info record at a position.
    Info {
        /// Client-chosen sequence number echoed in the response.
        seq_num: u64,
        /// File to query.
        file_name: String,
        /// One-based line.
        line: usize,
        /// Zero-based column.
        column: usize,
    },
    /// Replace the backend's copy of a file.
    Sync {
        /// Client-chosen sequence number echoed in the response.
        seq_num: u64,
        /// File to update.
        file_name: String,
        /// Full file content.
        content: String,
    },
}

impl ServerRequest {
    /// The request's sequence number.
    pub fn seq_num(&self) -> u64 {
        match self {
            Self::Info { seq_num, .. } | Self::Sync { seq_num, .. } => *seq_num,
        }
    }
}

/// A running backend task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// File being processed.
    pub file_name: String,
    /// One-based start line.
    pub pos_line: usize,
    /// Zero-based start column.
    pub pos_col: usize,
    /// One-based end line.
    pub end_pos_line: usize,
    /// Zero-based end column.
    pub end_pos_col: usize,
    /// Human-readable description.
    #[serde(default)]
    pub desc: String,
}

/// Messages received from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum ServerResponse {
    /// A request succeeded.
    Ok {
        /// Sequence number of the request.
        seq_num: u64,
        /// Info record (only for `info` requests, absent when nothing is known).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record: Option<InfoRecord>,
    },
    /// A request failed, or the backend reports a general error.
    Error {
        /// Sequence number of the failed request, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq_num: Option<u64>,
        /// Error text.
        message: String,
    },
    /// The complete current diagnostics set.
    AllMessages {
        /// Every diagnostic known to the backend.
        msgs: Vec<DiagnosticMessage>,
    },
    /// The backend's task list changed.
    CurrentTasks {
        /// Whether the backend is busy.
        is_running: bool,
        /// Running tasks.
        #[serde(default)]
        tasks: Vec<Task>,
    },
}

/// The backend's busy state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatus {
    /// Whether the backend is busy.
    pub is_running: bool,
    /// Running tasks.
    pub tasks: Vec<Task>,
}
