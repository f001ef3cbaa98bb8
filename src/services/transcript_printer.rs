//! Console transcript of one attempt.

use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Prints the human-readable transcript of an attempt and keeps a copy of
/// everything printed so it can be stored with the attempt record.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    buffer: String,
    echo: bool,
}

impl TranscriptPrinter {
    /// Printer that echoes to stdout.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            echo: true,
        }
    }

    /// Printer that only records.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn print(&mut self, line: impl AsRef<str>) {
        self.emit(line.as_ref());
    }

    /// Print every line of `text` indented one level.
    pub fn indented_print(&mut self, text: impl AsRef<str>) {
        let indented = text
            .as_ref()
            .lines()
            .map(|line| format!("{INDENT}{line}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.emit(&indented);
    }

    fn emit(&mut self, text: &str) {
        if self.echo {
            println!("{text}");
        }
        let _ = writeln!(self.buffer, "{text}");
    }

    pub fn log(&self) -> &str {
        &self.buffer
    }

    pub fn into_log(self) -> String {
        self.buffer
    }
}
