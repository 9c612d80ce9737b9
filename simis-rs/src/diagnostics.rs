/// Identifies where in a content file a diagnostic was raised.
///
/// Binary readers report the running byte offset of the underlying stream;
/// text readers report the tokenizer's line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Byte offset from the start of the (possibly decompressed) stream.
    Byte(u64),
    /// One-based line and column within a text file.
    LineColumn { line: u32, column: u32 },
}

/// A file name paired with a [`Position`], used to contextualize diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    /// The file the diagnostic refers to.
    pub file: &'a str,
    /// Where within that file it was raised.
    pub position: Position,
}

impl std::fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Position::Byte(offset) => write!(f, "{}:byte {}", self.file, offset),
            Position::LineColumn { line, column } => {
                write!(f, "{}:line {}, column {}", self.file, line, column)
            }
        }
    }
}

/// Caller-supplied hooks for diagnostic reporting.
///
/// Every variant reader funnels its recoverable warnings and informational
/// notices through one sink, so a loader can collect, filter, or silence
/// them. `fail` is fired immediately before the reader returns a fatal
/// [`SimisError`](crate::error::SimisError); it does not itself abort.
pub trait Diagnostics {
    /// Reports an informational notice.
    fn info(&mut self, at: &Location, message: &str);
    /// Reports a recoverable warning; parsing continues after the call.
    fn warn(&mut self, at: &Location, message: &str);
    /// Reports a fatal condition; the current file load aborts after the call.
    fn fail(&mut self, at: &Location, message: &str);
}

/// The default sink: one line per diagnostic on standard error.
#[derive(Debug, Default)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
    fn info(&mut self, at: &Location, message: &str) {
        eprintln!("Information: {message} in {at}");
    }

    fn warn(&mut self, at: &Location, message: &str) {
        eprintln!("Warning: {message} in {at}");
    }

    fn fail(&mut self, at: &Location, message: &str) {
        eprintln!("Error: {message} in {at}");
    }
}
