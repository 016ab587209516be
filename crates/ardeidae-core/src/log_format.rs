//! Terminal log formatter.
//!
//! Host log lines arrive with ANSI *Select Graphic Rendition* sequences
//! (`ESC [ <params> m`) embedded in them.  [`format_line`] walks the text
//! once, tracks the cumulative [`Style`], and emits a [`StyledSegment`] for
//! every run of text that shares a style.
//!
//! The output is data, not markup: callers decide how to present a segment.
//! The vocabulary is fixed:
//!
//! | Code | Effect |
//! |---|---|
//! | `0` / empty | reset every attribute |
//! | `1` / `22` | bold on / off |
//! | `4` / `24` | underline on / off |
//! | `30..=37` / `39` | foreground colour / default |
//! | `40..=47` / `49` | background colour / default |
//!
//! Any other SGR parameter is dropped, any other CSI sequence is removed
//! from the text, and a lone `ESC` is removed.
//!
//! # Example
//!
//! ```rust
//! use ardeidae_core::log_format::format_line;
//! use ardeidae_types::Color;
//!
//! let segments = format_line("\x1b[32mRing connected\x1b[0m (SR pius)");
//! assert_eq!(segments.len(), 2);
//! assert_eq!(segments[0].style.foreground, Some(Color::Green));
//! assert_eq!(segments[1].text, " (SR pius)");
//! ```

use ardeidae_types::{Color, Style, StyledSegment};
use tracing::debug;

const ESC: char = '\u{1b}';

/// Split `raw` into styled segments.
///
/// Text without control sequences comes back unchanged as a single plain
/// segment; an input that contains no text at all yields one empty plain
/// segment.
pub fn format_line(raw: &str) -> Vec<StyledSegment> {
    let mut segments = Vec::new();
    let mut style = Style::default();
    let mut text = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ESC {
            text.push(c);
            continue;
        }
        if chars.peek() != Some(&'[') {
            continue;
        }
        chars.next();

        let mut params = String::new();
        let mut final_byte = None;
        for p in chars.by_ref() {
            if ('\u{40}'..='\u{7e}').contains(&p) {
                final_byte = Some(p);
                break;
            }
            params.push(p);
        }

        if final_byte != Some('m') {
            debug!(?final_byte, "dropping non-SGR control sequence");
            continue;
        }

        let next = apply_sgr(style, &params);
        if next != style {
            flush(&mut segments, &mut text, style);
            style = next;
        }
    }
    flush(&mut segments, &mut text, style);

    if segments.is_empty() {
        segments.push(StyledSegment::plain(String::new()));
    }
    segments
}

fn flush(segments: &mut Vec<StyledSegment>, text: &mut String, style: Style) {
    if text.is_empty() {
        return;
    }
    segments.push(StyledSegment {
        style,
        text: std::mem::take(text),
    });
}

/// Apply one `;`-separated SGR parameter list to `style`.
fn apply_sgr(mut style: Style, params: &str) -> Style {
    if params.is_empty() {
        return Style::default();
    }
    for raw in params.split(';') {
        let code = if raw.is_empty() { Ok(0) } else { raw.parse::<u8>() };
        match code {
            Ok(0) => style = Style::default(),
            Ok(1) => style.bold = true,
            Ok(4) => style.underline = true,
            Ok(22) => style.bold = false,
            Ok(24) => style.underline = false,
            Ok(n @ 30..=37) => style.foreground = Color::from_offset(n - 30),
            Ok(39) => style.foreground = None,
            Ok(n @ 40..=47) => style.background = Color::from_offset(n - 40),
            Ok(49) => style.background = None,
            _ => debug!(code = raw, "unknown style code dropped"),
        }
    }
    style
}
