//! Diagnostics index: selects and orders the diagnostics relevant to the cursor.
//!
//! The backend publishes one global snapshot of diagnostics for the whole workspace. The panel
//! only shows a subset of it, chosen by [`relevant_messages`]:
//!
//! - [`DisplayMode::AllMessages`]: every diagnostic of the current file, ordered by
//!   `(line, column)`.
//! - [`DisplayMode::OnlyState`]: the diagnostics on the cursor line, ordered by column, trimmed
//!   to start at the nearest diagnostic at or left of the cursor (see [`nearest_left_start`]).
//!
//! [`messages_equal`] is the change detector the engine uses to skip redundant redraws.

use crate::position::Location;
use crate::snapshot::DisplayMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity levels reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error diagnostics.
    Error,
    /// Warning diagnostics.
    Warning,
    /// Informational diagnostics (including `#eval`/`#check` output).
    Information,
}

impl Severity {
    /// The wire name of this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "information",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic message from the backend.
///
/// Equality compares exactly the six identifying fields (`file_name`, `pos_line`, `pos_col`,
/// `severity`, `caption`, `text`); the optional end position is carried along but ignored.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    /// File the diagnostic belongs to.
    pub file_name: String,
    /// One-based line.
    pub pos_line: usize,
    /// Zero-based column.
    pub pos_col: usize,
    /// Severity.
    pub severity: Severity,
    /// Short caption (may be empty).
    #[serde(default)]
    pub caption: String,
    /// Message body.
    #[serde(default)]
    pub text: String,
    /// One-based end line, if the backend reported a range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pos_line: Option<usize>,
    /// Zero-based end column, if the backend reported a range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pos_col: Option<usize>,
}

impl DiagnosticMessage {
    /// Create a diagnostic without an end position.
    pub fn new(
        file_name: impl Into<String>,
        pos_line: usize,
        pos_col: usize,
        severity: Severity,
        caption: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            pos_line,
            pos_col,
            severity,
            caption: caption.into(),
            text: text.into(),
            end_pos_line: None,
            end_pos_col: None,
        }
    }
}

impl PartialEq for DiagnosticMessage {
    fn eq(&self, other: &Self) -> bool {
        self.file_name == other.file_name
            && self.pos_line == other.pos_line
            && self.pos_col == other.pos_col
            && self.severity == other.severity
            && self.caption == other.caption
            && self.text == other.text
    }
}

/// Returns `true` if both ordered subsets have the same length and are pointwise equal.
pub fn messages_equal(a: &[DiagnosticMessage], b: &[DiagnosticMessage]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// Select the diagnostics relevant to `location` under `mode`.
///
/// `all_errors_on_line` disables the nearest-left trimming in [`DisplayMode::OnlyState`].
pub fn relevant_messages(
    all: &[DiagnosticMessage],
    location: &Location,
    mode: DisplayMode,
    all_errors_on_line: bool,
) -> Vec<DiagnosticMessage> {
    match mode {
        DisplayMode::AllMessages => {
            let mut msgs: Vec<DiagnosticMessage> = all
                .iter()
                .filter(|m| m.file_name == location.file_name)
                .cloned()
                .collect();
            msgs.sort_by(|a, b| {
                a.pos_line
                    .cmp(&b.pos_line)
                    .then_with(|| a.pos_col.cmp(&b.pos_col))
            });
            msgs
        }
        DisplayMode::OnlyState => {
            let mut msgs: Vec<DiagnosticMessage> = all
                .iter()
                .filter(|m| m.file_name == location.file_name && m.pos_line == location.line)
                .cloned()
                .collect();
            msgs.sort_by_key(|m| m.pos_col);

            if !all_errors_on_line
                && let Some(start) = nearest_left_start(&msgs, location.column)
            {
                msgs.drain(..start);
            }
            msgs
        }
    }
}

/// Index of the first diagnostic to keep for a cursor at `column`.
///
/// `msgs` must be sorted by column. Scans left to right, tracking the diagnostic with the
/// greatest column `<= column`; an exact match wins immediately. Returns `None` when nothing
/// should be trimmed: no diagnostic lies at or left of the cursor, or the tracked one is
/// already the first.
pub fn nearest_left_start(msgs: &[DiagnosticMessage], column: usize) -> Option<usize> {
    let mut start: Option<(usize, usize)> = None;
    for (idx, msg) in msgs.iter().enumerate() {
        if column < msg.pos_col {
            break;
        }
        if column == msg.pos_col {
            start = Some((msg.pos_col, idx));
            break;
        }
        if start.is_none_or(|(col, _)| col < msg.pos_col) {
            start = Some((msg.pos_col, idx));
        }
    }

    match start {
        Some((_, idx)) if idx > 0 => Some(idx),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(line: usize, col: usize) -> DiagnosticMessage {
        DiagnosticMessage::new("/a.lean", line, col, Severity::Error, "", format!("{line}:{col}"))
    }

    #[test]
    fn test_nearest_left_start() {
        let line = vec![msg(1, 2), msg(1, 5), msg(1, 9)];
        assert_eq!(nearest_left_start(&line, 7), Some(1));
        assert_eq!(nearest_left_start(&line, 2), None);
        assert_eq!(nearest_left_start(&line, 1), None);
        assert_eq!(nearest_left_start(&line, 9), Some(2));
        assert_eq!(nearest_left_start(&line, 100), Some(2));
        assert_eq!(nearest_left_start(&[], 3), None);
    }

    #[test]
    fn test_end_position_ignored_by_equality() {
        let a = msg(1, 2);
        let mut b = msg(1, 2);
        b.end_pos_line = Some(4);
        b.end_pos_col = Some(0);
        assert_eq!(a, b);
    }
}
