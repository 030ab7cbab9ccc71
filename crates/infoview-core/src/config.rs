//! Panel configuration.
//!
//! Configuration arrives as partial updates ([`ConfigPatch`]) that are folded onto the previous
//! full [`Config`]: `new = { ...old, ...patch }`. [`config_signal`] wires that fold to an
//! [`Event`] so the current value is always queryable.

use crate::event::{Event, Signal};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration keys read from an external configuration store.
pub mod keys {
    /// Editor font family (string).
    pub const FONT_FAMILY: &str = "editor.fontFamily";
    /// Editor font size in pixels (number).
    pub const FONT_SIZE: &str = "editor.fontSize";
    /// Extra CSS appended to the panel stylesheet (string).
    pub const INFO_VIEW_STYLE: &str = "infoview.style";
    /// Show every diagnostic on the cursor line instead of trimming (bool).
    pub const ALL_ERRORS_ON_LINE: &str = "infoview.allErrorsOnLine";
}

/// Full panel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Font family used for goal and message bodies.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: u32,
    /// Custom stylesheet appended after the built-in one.
    pub info_view_style: String,
    /// Disable nearest-left trimming of diagnostics on the cursor line.
    pub all_errors_on_line: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_family: "monospace".to_string(),
            font_size: 14,
            info_view_style: String::new(),
            all_errors_on_line: false,
        }
    }
}

impl Config {
    /// Return a copy of `self` with every field set in `patch` replaced.
    pub fn merged(&self, patch: &ConfigPatch) -> Config {
        Config {
            font_family: patch
                .font_family
                .clone()
                .unwrap_or_else(|| self.font_family.clone()),
            font_size: patch.font_size.unwrap_or(self.font_size),
            info_view_style: patch
                .info_view_style
                .clone()
                .unwrap_or_else(|| self.info_view_style.clone()),
            all_errors_on_line: patch.all_errors_on_line.unwrap_or(self.all_errors_on_line),
        }
    }
}

/// A partial configuration update. Unset fields keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    /// New font family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// New font size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    /// New custom stylesheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_view_style: Option<String>,
    /// New "all errors on line" flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_errors_on_line: Option<bool>,
}

impl ConfigPatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &ConfigPatch::default()
    }

    /// Build a patch from key/value lookups against an external store (see [`keys`]).
    ///
    /// Missing keys and values of the wrong JSON type are left unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<Value>) -> Self {
        Self {
            font_family: lookup(keys::FONT_FAMILY).and_then(|v| v.as_str().map(str::to_string)),
            font_size: lookup(keys::FONT_SIZE)
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok()),
            info_view_style: lookup(keys::INFO_VIEW_STYLE)
                .and_then(|v| v.as_str().map(str::to_string)),
            all_errors_on_line: lookup(keys::ALL_ERRORS_ON_LINE).and_then(|v| v.as_bool()),
        }
    }
}

/// Fold every patch fired on `source` onto [`Config::default`].
pub fn config_signal(source: &Event<ConfigPatch>) -> Signal<Config> {
    Signal::scan(|config, patch| config.merged(patch), Config::default(), source)
}
