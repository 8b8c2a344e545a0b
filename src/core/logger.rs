//! AT traffic transcript
//!
//! Records every command written and every line read, with timestamps, to a
//! bounded in-memory buffer and optionally to a file.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Transcript shared between the engine and its owner
pub type SharedTranscript = Arc<Mutex<Transcript>>;

/// Transcript file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    /// `[timestamp] > AT` / `[timestamp] < OK`
    #[default]
    Text,
    /// One JSON object per line
    JsonLines,
}

impl TranscriptFormat {
    /// File extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "log",
            Self::JsonLines => "jsonl",
        }
    }
}

/// Traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Command written to the modem
    Sent,
    /// Line read from the modem
    Received,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// When the entry was recorded
    pub timestamp: DateTime<Local>,
    /// Direction
    pub direction: Direction,
    /// Command or line text, without terminators
    pub text: String,
}

impl TranscriptEntry {
    /// Create an entry stamped now
    pub fn new(direction: Direction, text: &str) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            text: text.to_string(),
        }
    }

    /// Format as a text line
    pub fn to_text(&self) -> String {
        let arrow = match self.direction {
            Direction::Sent => '>',
            Direction::Received => '<',
        };
        format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            arrow,
            self.text
        )
    }

    /// Format as a JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Command/response transcript
pub struct Transcript {
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    format: TranscriptFormat,
    buffer: VecDeque<TranscriptEntry>,
    max_buffer: usize,
    lines_logged: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// In-memory transcript holding the last 1000 entries
    pub fn new() -> Self {
        Self {
            file: None,
            path: None,
            format: TranscriptFormat::Text,
            buffer: VecDeque::new(),
            max_buffer: 1000,
            lines_logged: 0,
        }
    }

    /// Wrap for sharing with the engine
    pub fn shared(self) -> SharedTranscript {
        Arc::new(Mutex::new(self))
    }

    /// Start appending to `path`
    pub fn start(&mut self, path: &Path, format: TranscriptFormat) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = Some(BufWriter::new(file));
        self.path = Some(path.to_path_buf());
        self.format = format;
        self.lines_logged = 0;
        Ok(())
    }

    /// Stop writing to the file
    pub fn stop(&mut self) {
        if let Some(ref mut file) = self.file {
            let _ = file.flush();
        }
        self.file = None;
    }

    /// File being written, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an entry
    pub fn log(&mut self, direction: Direction, text: &str) {
        let entry = TranscriptEntry::new(direction, text);

        if let Some(ref mut file) = self.file {
            let line = match self.format {
                TranscriptFormat::Text => entry.to_text(),
                TranscriptFormat::JsonLines => entry.to_json(),
            };
            if let Err(e) = writeln!(file, "{line}") {
                tracing::warn!("Transcript write failed, closing file: {}", e);
                self.file = None;
            } else {
                self.lines_logged += 1;
                if self.lines_logged % 50 == 0 {
                    let _ = file.flush();
                }
            }
        }

        self.buffer.push_back(entry);
        while self.buffer.len() > self.max_buffer {
            self.buffer.pop_front();
        }
    }

    /// Record a written command
    pub fn log_tx(&mut self, command: &str) {
        self.log(Direction::Sent, command);
    }

    /// Record a received line
    pub fn log_rx(&mut self, line: &str) {
        self.log(Direction::Received, line);
    }

    /// Buffered entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.buffer.iter()
    }

    /// Number of buffered entries
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Set max buffer size
    pub fn set_max_buffer(&mut self, size: usize) {
        self.max_buffer = size;
        while self.buffer.len() > self.max_buffer {
            self.buffer.pop_front();
        }
    }

    /// Flush to disk
    pub fn flush(&mut self) {
        if let Some(ref mut file) = self.file {
            let _ = file.flush();
        }
    }
}

impl Drop for Transcript {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Transcript filename with a timestamp, e.g. `modem_20240101_120000.log`
pub fn transcript_filename(prefix: &str, format: TranscriptFormat) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_text() {
        let entry = TranscriptEntry::new(Direction::Sent, "AT+CSQ");
        assert!(entry.to_text().ends_with("> AT+CSQ"));
        let entry = TranscriptEntry::new(Direction::Received, "OK");
        assert!(entry.to_text().ends_with("< OK"));
    }

    #[test]
    fn test_entry_json() {
        let entry = TranscriptEntry::new(Direction::Received, "+CSQ: 14,0");
        let value: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(value["direction"], "received");
        assert_eq!(value["text"], "+CSQ: 14,0");
    }

    #[test]
    fn test_buffer_limit() {
        let mut transcript = Transcript::new();
        transcript.set_max_buffer(3);
        for i in 0..10 {
            transcript.log_rx(&i.to_string());
        }
        let texts: Vec<_> = transcript.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["7", "8", "9"]);
    }

    #[test]
    fn test_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modem.log");

        let mut transcript = Transcript::new();
        transcript.start(&path, TranscriptFormat::Text).unwrap();
        transcript.log_tx("AT");
        transcript.log_rx("OK");
        transcript.stop();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("> AT"));
        assert!(lines[1].ends_with("< OK"));
    }

    #[test]
    fn test_filename() {
        let name = transcript_filename("modem", TranscriptFormat::JsonLines);
        assert!(name.starts_with("modem_"));
        assert!(name.ends_with(".jsonl"));
    }
}
