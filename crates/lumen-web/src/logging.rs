// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `tracing` output routed to the browser console.
//!
//! Each formatted event is buffered and flushed as one console call whose
//! method matches the event level, so devtools level filters keep working.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// [`MakeWriter`] that hands out one [`ConsoleWriter`] per event.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(*meta.level())
    }
}

/// Buffers one formatted event and emits it on flush or drop.
#[derive(Debug)]
pub struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: Level) -> Self {
        Self {
            level,
            buf: Vec::new(),
        }
    }

    fn emit(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.buf);
        let line = text.trim_end();
        if !line.is_empty() {
            console_line(self.level, line);
        }
        self.buf.clear();
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit();
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        self.emit();
    }
}

#[cfg(target_arch = "wasm32")]
fn console_line(level: Level, line: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let value = JsValue::from_str(line);
    match level {
        Level::ERROR => console::error_1(&value),
        Level::WARN => console::warn_1(&value),
        Level::INFO => console::info_1(&value),
        _ => console::debug_1(&value),
    }
}

// Native builds (unit tests, tooling) have no console; fall back to stderr.
#[cfg(not(target_arch = "wasm32"))]
fn console_line(_level: Level, line: &str) {
    use std::io::Write as _;

    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{line}");
}

/// Parse a level name; unknown names fall back to `info`.
pub fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

/// Install the console subscriber at `level`.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging(level: Level) {
    let installed = tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .with_max_level(level)
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(%level, "console logging installed");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level(" debug "), Level::DEBUG);
        assert_eq!(parse_level("chatty"), Level::INFO);
    }

    #[test]
    fn untargeted_writer_logs_at_info() {
        let writer = ConsoleMakeWriter.make_writer();
        assert_eq!(writer.level, Level::INFO);
    }

    #[test]
    fn flush_drains_the_buffer() {
        let mut writer = ConsoleWriter::new(Level::DEBUG);
        assert!(writeln!(writer, "frame 3").is_ok());
        assert_eq!(writer.buf, b"frame 3\n");
        assert!(writer.flush().is_ok());
        assert!(writer.buf.is_empty());
    }
}
