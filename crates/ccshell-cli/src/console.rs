//! Terminal log surface with per-severity colors.

use std::io::Write;
use std::sync::Mutex;

use ccshell_core::{LogEntry, LogSink, Severity};
use owo_colors::{OwoColorize, Stream};

/// Prints compile log entries to stdout as they arrive.
pub struct ConsoleLogSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleLogSink {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

/// Color and prefix one entry. Colors apply only when stdout supports them.
pub fn render(entry: &LogEntry) -> String {
    let tag = format!("[{}]", entry.severity);
    let tag = match entry.severity {
        Severity::Info => tag
            .if_supports_color(Stream::Stdout, |t| t.bright_blue())
            .to_string(),
        Severity::Success => tag
            .if_supports_color(Stream::Stdout, |t| t.bright_green())
            .to_string(),
        Severity::Error => tag
            .if_supports_color(Stream::Stdout, |t| t.bright_red())
            .to_string(),
        Severity::Warning => tag
            .if_supports_color(Stream::Stdout, |t| t.yellow())
            .to_string(),
    };
    format!("{tag} {}", entry.message.trim_end())
}

impl LogSink for ConsoleLogSink {
    fn append(&self, entry: LogEntry) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // A closed stdout is not worth failing a compile over.
        let _ = writeln!(out, "{}", render(&entry));
        let _ = out.flush();
    }

    fn clear(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(out);
    }
}
