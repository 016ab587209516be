//! Event Log Stream.
//!
//! Append-only record of host log lines in arrival order.  Each line is run
//! through [`format_line`] on the way in, so consumers only ever see
//! structured [`LogEntry`] values.
//!
//! The stream also derives the *connected* flag: it turns on the first time
//! a line contains one of the configured markers and never turns off again.
//!
//! [`LogViewport`] models the visible window of the log.  It follows the
//! newest entry after every refresh.

use ardeidae_types::LogEntry;
use tracing::info;

use crate::log_format::format_line;

/// Marker the rig's host prints once the ring has paired.
pub const DEFAULT_CONNECT_MARKER: &str = "Ring connected";

/// Default number of log lines visible at once.
const DEFAULT_VIEWPORT_HEIGHT: usize = 20;

/// Visible window over the log, auto-following the newest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogViewport {
    height: usize,
    offset: usize,
}

impl LogViewport {
    pub fn new(height: usize) -> Self {
        Self {
            height: height.max(1),
            offset: 0,
        }
    }

    /// Scroll so the last `height` of `total` entries are visible.
    pub fn refresh(&mut self, total: usize) {
        self.offset = total.saturating_sub(self.height);
    }

    /// Index of the first visible entry.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Change the window height and re-follow the tail.
    pub fn resize(&mut self, height: usize, total: usize) {
        self.height = height.max(1);
        self.refresh(total);
    }

    /// The slice of `entries` inside the window.
    pub fn visible<'a>(&self, entries: &'a [LogEntry]) -> &'a [LogEntry] {
        let start = self.offset.min(entries.len());
        let end = (start + self.height).min(entries.len());
        &entries[start..end]
    }
}

impl Default for LogViewport {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_HEIGHT)
    }
}

/// Ordered, append-only log with a monotonic connection flag.
#[derive(Debug, Clone)]
pub struct EventLogStream {
    entries: Vec<LogEntry>,
    markers: Vec<String>,
    connected: bool,
    viewport: LogViewport,
}

impl EventLogStream {
    /// Create an empty stream recognising a single connect `marker`.
    pub fn new(marker: impl Into<String>) -> Self {
        Self::with_markers(vec![marker.into()])
    }

    /// Create an empty stream recognising any of `markers`.
    pub fn with_markers(markers: Vec<String>) -> Self {
        Self {
            entries: Vec::new(),
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
            connected: false,
            viewport: LogViewport::default(),
        }
    }

    /// Format and append `line`, then scroll the viewport to it.
    ///
    /// The marker is matched against both the raw line and its plain text so
    /// that colour codes inside the marker do not hide it.
    pub fn append(&mut self, line: &str) -> &LogEntry {
        let entry = LogEntry {
            index: self.entries.len(),
            segments: format_line(line),
        };

        if !self.connected {
            let plain = entry.plain_text();
            if self
                .markers
                .iter()
                .any(|m| line.contains(m.as_str()) || plain.contains(m.as_str()))
            {
                self.connected = true;
                info!(index = entry.index, "device connection marker seen");
            }
        }

        self.entries.push(entry);
        self.viewport.refresh(self.entries.len());
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` once a connect marker has been seen.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn viewport(&self) -> LogViewport {
        self.viewport
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport.resize(height, self.entries.len());
    }

    /// Entries currently inside the viewport.
    pub fn visible(&self) -> &[LogEntry] {
        self.viewport.visible(&self.entries)
    }
}

impl Default for EventLogStream {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_arrival_order() {
        let mut log = EventLogStream::default();
        let lines = ["boot", "scan", "\x1b[33mwarn\x1b[0m", "done"];
        for l in lines {
            log.append(l);
        }
        let texts: Vec<String> = log.entries().iter().map(|e| e.plain_text()).collect();
        assert_eq!(texts, vec!["boot", "scan", "warn", "done"]);
        let indices: Vec<usize> = log.entries().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn connection_flag_is_monotonic() {
        let mut log = EventLogStream::default();
        log.append("scanning…");
        assert!(!log.is_connected());

        log.append("Ring connected: SR pius");
        assert!(log.is_connected());

        log.append("Ring disconnected");
        log.append("unrelated");
        assert!(log.is_connected());
    }

    #[test]
    fn marker_split_by_colour_codes_still_matches() {
        let mut log = EventLogStream::default();
        log.append("\x1b[32mRing\x1b[0m connected");
        assert!(log.is_connected());
    }

    #[test]
    fn custom_markers() {
        let mut log = EventLogStream::with_markers(vec!["paired".into(), String::new()]);
        log.append("anything");
        assert!(!log.is_connected());
        log.append("device paired");
        assert!(log.is_connected());
    }

    #[test]
    fn viewport_follows_newest_entry() {
        let mut log = EventLogStream::default();
        log.set_viewport_height(3);
        for i in 0..10 {
            log.append(&format!("line {i}"));
            let visible = log.visible();
            assert_eq!(visible.last().unwrap().index, i);
        }
        let visible: Vec<usize> = log.visible().iter().map(|e| e.index).collect();
        assert_eq!(visible, vec![7, 8, 9]);
        assert_eq!(log.viewport().offset(), 7);
    }

    #[test]
    fn viewport_shows_everything_when_short() {
        let mut log = EventLogStream::default();
        log.append("one");
        log.append("two");
        assert_eq!(log.viewport().offset(), 0);
        assert_eq!(log.visible().len(), 2);
    }

    #[test]
    fn viewport_height_never_zero() {
        let vp = LogViewport::new(0);
        assert_eq!(vp.height(), 1);
    }
}
