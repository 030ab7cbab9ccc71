//! Presentation adapter: turns an [`InfoSnapshot`] into panel markup or plain text.
//!
//! Rendering is a pure function of the snapshot, the configuration and a few host-provided asset
//! locations. The engine never renders; hosts call [`render_html`] from their redraw handler.

use crate::config::Config;
use crate::diagnostics::{DiagnosticMessage, Severity};
use crate::protocol::InfoviewCommand;
use crate::snapshot::{DisplayMode, InfoSnapshot};
use crate::uri::file_name_to_uri;
use regex::Regex;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

/// Host-provided resources referenced by the rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderAssets {
    /// Base stylesheet text, inlined before the generated rules.
    pub base_stylesheet: String,
    /// URI of the panel control script. Omitted when empty.
    pub script_uri: String,
    /// URI of the "continue" icon.
    pub continue_icon_uri: String,
    /// URI of the "pause" icon.
    pub pause_icon_uri: String,
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

struct ColorRule {
    regex: Regex,
    replacement: &'static str,
}

static COLOR_RULES: LazyLock<Vec<ColorRule>> = LazyLock::new(|| {
    [
        (r"(?m)^([|⊢]) ", r#"<strong class="goal-vdash">${1}</strong> "#),
        (r"(?m)^(\d+ goals)", r#"<strong class="goal-goals">${1}</strong>"#),
        (r"(?m)^(context|state):", r#"<strong class="goal-goals">${1}</strong>:"#),
        (r"(?m)^(case) ", r#"<strong class="goal-case">${1}</strong> "#),
        (r"(?m)^([^:\n< ][^:\n⊢]*) :", r#"<strong class="goal-hyp">${1}</strong> :"#),
    ]
    .into_iter()
    .map(|(pattern, replacement)| ColorRule {
        regex: Regex::new(pattern).expect("valid colorize regex"),
        replacement,
    })
    .collect()
});

/// HTML-escape a goal or error text and highlight its structure.
///
/// Marks turnstiles, `N goals` banners, `context:`/`state:` headers, `case` tags and hypothesis
/// names with `<strong class="goal-*">`.
pub fn colorize_message(text: &str) -> String {
    let mut out = escape_html(text);
    for rule in COLOR_RULES.iter() {
        out = rule.regex.replace_all(&out, rule.replacement).into_owned();
    }
    out
}

/// The full stylesheet: base rules, `pre` font rules, then the user's custom style.
pub fn stylesheet(config: &Config, assets: &RenderAssets) -> String {
    let font_family: String = config
        .font_family
        .chars()
        .filter(|c| *c != '\'' && *c != '"')
        .collect();
    format!(
        "{}\npre {{\n    font-family: {};\n    font-size: {}px;\n    white-space: pre-wrap;\n}}\n{}",
        assets.base_stylesheet, font_family, config.font_size, config.info_view_style
    )
}

/// Render the panel page.
pub fn render_html(snapshot: &InfoSnapshot, config: &Config, assets: &RenderAssets) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta http-equiv=\"Content-type\" content=\"text/html;charset=utf-8\">\n");
    // `</` would close the style element early.
    let _ = writeln!(
        html,
        "<style>{}</style>",
        stylesheet(config, assets).replace("</", "<\\/")
    );
    if !assets.script_uri.is_empty() {
        let _ = writeln!(
            html,
            "<script charset=\"utf-8\" src=\"{}\"></script>",
            escape_html(&assets.script_uri)
        );
    }
    html.push_str("</head>\n");

    let Some(location) = &snapshot.location else {
        html.push_str("<body>No file active</body></html>");
        return html;
    };

    let _ = write!(
        html,
        "<body data-uri=\"{}\" data-line=\"{}\" data-column=\"{}\"",
        escape_html(&file_name_to_uri(&location.file_name)),
        location.line,
        location.column
    );
    if snapshot.display_mode == DisplayMode::AllMessages {
        html.push_str(" data-messages=''");
    }
    if snapshot.stopped {
        html.push_str(" data-paused=''");
    }
    html.push_str(">\n");

    render_run_state(&mut html, assets);
    render_goal(&mut html, snapshot);
    html.push_str("<div id=\"messages\">");
    for (i, msg) in snapshot.messages.iter().enumerate() {
        if i > 0 {
            html.push('\n');
        }
        render_message(&mut html, msg);
    }
    html.push_str("</div>\n</body></html>");
    html
}

fn render_run_state(html: &mut String, assets: &RenderAssets) {
    html.push_str("<div id=\"run-state\">\n");
    let _ = writeln!(
        html,
        "<span id=\"state-continue\">Stopped <a href=\"{}\"><img title=\"Continue Updating\" src=\"{}\"></a></span>",
        escape_html(&InfoviewCommand::Continue.to_uri()),
        escape_html(&assets.continue_icon_uri)
    );
    let _ = writeln!(
        html,
        "<span id=\"state-pause\">Updating <a href=\"{}\"><img title=\"Stop Updating\" src=\"{}\"></a></span>",
        escape_html(&InfoviewCommand::Pause.to_uri()),
        escape_html(&assets.pause_icon_uri)
    );
    html.push_str("</div>\n");
}

fn render_goal(html: &mut String, snapshot: &InfoSnapshot) {
    let Some(goal) = snapshot.goal_state.as_deref().filter(|_| snapshot.shows_goal()) else {
        return;
    };
    let _ = writeln!(
        html,
        "<div id=\"goal\"><h1>Tactic State</h1><pre>{}</pre></div>",
        colorize_message(goal)
    );
}

fn render_message(html: &mut String, msg: &DiagnosticMessage) {
    let reveal = InfoviewCommand::RevealPosition {
        file_name: msg.file_name.clone(),
        line: msg.pos_line,
        column: msg.pos_col,
    };
    let body = if msg.severity == Severity::Error {
        colorize_message(&msg.text)
    } else {
        escape_html(&msg.text)
    };
    let _ = write!(
        html,
        "<div class=\"message {sev}\" data-line=\"{line}\" data-column=\"{col}\">\
         <h1 title=\"{file}:{line}:{col}\"><a href=\"{href}\">{base}:{line}:{col}: {sev} {caption}</a></h1>\
         <pre>{body}</pre></div>",
        sev = msg.severity,
        line = msg.pos_line,
        col = msg.pos_col,
        file = escape_html(&msg.file_name),
        href = escape_html(&reveal.to_uri()),
        base = escape_html(basename(&msg.file_name)),
        caption = escape_html(&msg.caption),
        body = body,
    );
}

fn basename(file_name: &str) -> &str {
    Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file_name)
}

/// Plain-text rendering of the goal state and the visible diagnostics.
pub fn render_text(snapshot: &InfoSnapshot) -> String {
    let mut out = String::new();
    if let Some(goal) = snapshot.goal_state.as_deref().filter(|g| !g.is_empty()) {
        let _ = writeln!(out, "Tactic State:\n{goal}");
    }
    let msgs: Vec<String> = snapshot
        .messages
        .iter()
        .map(|m| {
            format!(
                "{}:{}:{}: {} {}\n{}",
                basename(&m.file_name),
                m.pos_line,
                m.pos_col,
                m.severity,
                m.caption,
                m.text
            )
        })
        .collect();
    out.push_str(&msgs.join("\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Location;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#039;"
        );
    }

    #[test]
    fn test_colorize_goal() {
        let goal = "2 goals\nh : a < b\n⊢ P";
        assert_eq!(
            colorize_message(goal),
            "<strong class=\"goal-goals\">2 goals</strong>\n\
             <strong class=\"goal-hyp\">h</strong> : a &lt; b\n\
             <strong class=\"goal-vdash\">⊢</strong> P"
        );
    }

    #[test]
    fn test_colorize_case_and_context() {
        assert_eq!(
            colorize_message("case inl\ncontext:"),
            "<strong class=\"goal-case\">case</strong> inl\n\
             <strong class=\"goal-goals\">context</strong>:"
        );
    }

    #[test]
    fn test_stylesheet_strips_font_quotes() {
        let config = Config {
            font_family: "'Fira Code', \"DejaVu\"".to_string(),
            font_size: 12,
            ..Config::default()
        };
        let css = stylesheet(&config, &RenderAssets::default());
        assert!(css.contains("font-family: Fira Code, DejaVu;"));
        assert!(css.contains("font-size: 12px;"));
    }

    #[test]
    fn test_no_file_active() {
        let html = render_html(
            &InfoSnapshot::default(),
            &Config::default(),
            &RenderAssets::default(),
        );
        assert!(html.ends_with("<body>No file active</body></html>"));
    }

    #[test]
    fn test_goal_only_shown_in_only_state() {
        let mut snapshot = InfoSnapshot {
            location: Some(Location::new("/a.lean", 3, 5)),
            goal_state: Some("⊢ P".to_string()),
            display_mode: DisplayMode::AllMessages,
            ..InfoSnapshot::default()
        };
        let html = render_html(&snapshot, &Config::default(), &RenderAssets::default());
        assert!(!html.contains("Tactic State"));

        snapshot.display_mode = DisplayMode::OnlyState;
        let html = render_html(&snapshot, &Config::default(), &RenderAssets::default());
        assert!(html.contains("<div id=\"goal\"><h1>Tactic State</h1>"));
    }

    #[test]
    fn test_render_text() {
        let snapshot = InfoSnapshot {
            location: Some(Location::new("/src/a.lean", 3, 5)),
            goal_state: Some("⊢ P".to_string()),
            messages: vec![DiagnosticMessage::new(
                "/src/a.lean",
                3,
                0,
                Severity::Error,
                "",
                "type mismatch",
            )],
            ..InfoSnapshot::default()
        };
        assert_eq!(
            render_text(&snapshot),
            "Tactic State:\n⊢ P\na.lean:3:0: error \ntype mismatch"
        );
    }
}
