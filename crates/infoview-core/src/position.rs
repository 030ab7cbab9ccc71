//! Cursor positions and file locations.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Zero-based logical cursor position, as reported by editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based logical line index.
    pub line: usize,
    /// Zero-based column in characters within the logical line.
    pub column: usize,
}

impl Position {
    /// Create a new logical position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A position inside a named file, in backend coordinates.
///
/// `line` is one-based, `column` is zero-based. This is the shape used on the wire between the
/// host and the panel (`{ "fileName", "line", "column" }`) and for backend queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// File identifier (usually an absolute path).
    pub file_name: String,
    /// One-based line number.
    pub line: usize,
    /// Zero-based column.
    pub column: usize,
}

impl Location {
    /// Create a location from backend coordinates.
    pub fn new(file_name: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file_name: file_name.into(),
            line,
            column,
        }
    }

    /// Convert an editor cursor position (zero-based line) into a location.
    pub fn from_cursor(file_name: impl Into<String>, position: Position) -> Self {
        Self::new(file_name, position.line + 1, position.column)
    }

    /// The zero-based editor position for this location.
    pub fn to_position(&self) -> Position {
        Position::new(self.line.saturating_sub(1), self.column)
    }
}
