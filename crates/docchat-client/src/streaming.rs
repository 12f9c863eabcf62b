//! Server-Sent Events frame parser for the reply stream.
//!
//! Records are runs of `data:` lines terminated by a blank line. Bytes are
//! pushed in as they arrive from the network; complete records are decoded
//! into [`StreamEvent`]s immediately, partial ones stay buffered. One parser
//! per request: after a terminal event it ignores further input.

use tracing::{debug, warn};

use crate::protocol::{decode_record, StreamEvent};

/// Field marker of data lines.
pub const DATA_FIELD: &str = "data:";

/// Default upper bound for a single buffered record.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Text of the implicit error when the connection closes without `done`.
pub const CLOSED_EARLY: &str = "The connection closed before the reply was complete.";

#[derive(Debug)]
pub struct SseFrameParser {
    /// Bytes after the last newline seen.
    pending: Vec<u8>,
    /// Data lines of the record being assembled.
    data: String,
    max_record_bytes: usize,
    finished: bool,
    skipped: usize,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::with_max_record_bytes(DEFAULT_MAX_RECORD_BYTES)
    }

    pub fn with_max_record_bytes(max_record_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            data: String::new(),
            max_record_bytes,
            finished: false,
            skipped: 0,
        }
    }

    /// True once a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of malformed records skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Push the next network read and return the events it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        // `pending` never holds a newline between calls, so only the new
        // bytes need scanning.
        let mut buf = std::mem::take(&mut self.pending);
        let mut scan_from = buf.len();
        let mut line_start = 0;
        buf.extend_from_slice(bytes);

        while let Some(offset) = buf[scan_from..].iter().position(|&b| b == b'\n') {
            let newline = scan_from + offset;
            let line = &buf[line_start..newline];
            let line = match line.last() {
                Some(b'\r') => &line[..line.len() - 1],
                _ => line,
            };

            self.process_line(line, &mut events);
            if self.finished {
                return events;
            }
            line_start = newline + 1;
            scan_from = line_start;
        }

        buf.drain(..line_start);
        self.pending = buf;

        if self.pending.len() + self.data.len() > self.max_record_bytes {
            self.fail(
                &mut events,
                format!(
                    "event stream record exceeds {} bytes",
                    self.max_record_bytes
                ),
            );
        }

        events
    }

    /// Signal end of input. Flushes a trailing record that lacked its blank
    /// line; if no terminal event was seen, yields the implicit error.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.process_line(&line, &mut events);
        }
        if !self.finished && !self.data.is_empty() {
            self.dispatch(&mut events);
        }
        if !self.finished {
            debug!("event stream ended without a terminator");
            self.fail(&mut events, CLOSED_EARLY.to_string());
        }
        events
    }

    fn process_line(&mut self, line: &[u8], events: &mut Vec<StreamEvent>) {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line,
            Err(e) => {
                self.fail(events, format!("event stream is not valid UTF-8: {e}"));
                return;
            }
        };

        if line.is_empty() {
            if !self.data.is_empty() {
                self.dispatch(events);
            }
            return;
        }

        if line.starts_with(':') {
            // comment / keep-alive
            return;
        }

        if let Some(value) = line.strip_prefix(DATA_FIELD) {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(value);
            return;
        }

        if ["event:", "id:", "retry:"].iter().any(|f| line.starts_with(f)) {
            return;
        }

        warn!(line = %truncate(line, 120), "Skipping unrecognised event stream line");
    }

    fn dispatch(&mut self, events: &mut Vec<StreamEvent>) {
        let data = std::mem::take(&mut self.data);
        match decode_record(&data) {
            Ok(decoded) => {
                for event in decoded {
                    let terminal = event.is_terminal();
                    events.push(event);
                    if terminal {
                        self.finished = true;
                        return;
                    }
                }
            }
            Err(reason) => {
                self.skipped += 1;
                warn!(%reason, "Skipping malformed event stream record");
            }
        }
    }

    fn fail(&mut self, events: &mut Vec<StreamEvent>, message: String) {
        warn!(%message, "Event stream framing failure");
        self.finished = true;
        self.data.clear();
        self.pending.clear();
        events.push(StreamEvent::Error(message));
    }
}

impl Default for SseFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
