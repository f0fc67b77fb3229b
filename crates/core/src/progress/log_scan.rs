use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::{encoder::EncoderObserver, format::parse_clock};

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d\d:\d\d:\d\d\.\d\d)").expect("duration marker regex is valid")
});
static ELAPSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(\d\d:\d\d:\d\d\.\d\d)").expect("elapsed marker regex is valid")
});

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogMarker {
    Duration(f64),
    Elapsed(f64),
}

/// Extract a progress marker from one encoder log line.
pub fn scan_line(line: &str) -> Option<LogMarker> {
    if let Some(caps) = DURATION_RE.captures(line) {
        return parse_clock(&caps[1]).map(LogMarker::Duration);
    }
    if let Some(caps) = ELAPSED_RE.captures(line) {
        return parse_clock(&caps[1]).map(LogMarker::Elapsed);
    }
    None
}

/// Forward a log line to `observer` as a structured event. Unmatched lines are dropped.
pub fn dispatch_line(line: &str, observer: &mut dyn EncoderObserver) {
    match scan_line(line) {
        Some(LogMarker::Duration(seconds)) => observer.on_duration_known(seconds),
        Some(LogMarker::Elapsed(seconds)) => observer.on_progress(seconds),
        None => trace!(line, "ignored encoder log line"),
    }
}

/// Splits a byte stream into lines on `\n` or `\r` (the encoder redraws its status line with `\r`).
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}
