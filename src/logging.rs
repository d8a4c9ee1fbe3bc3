//! `tracing` setup for extension pages and workers.
//!
//! Each formatted event is forwarded to the browser console at the matching
//! severity. Timestamps are omitted; the devtools console adds its own.

use std::io;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(max_level: Level) {
    let result = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .without_time()
        .with_target(true)
        .with_writer(ConsoleMakeWriter)
        .try_init();

    if result.is_ok() {
        tracing::debug!(%max_level, "logging initialised");
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            level: Level::INFO,
            buf: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        ConsoleWriter {
            level: *meta.level(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event and emits it on drop.
struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        emit(self.level, line);
    }
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, line: &str) {
    let v = wasm_bindgen::JsValue::from_str(line);
    match level {
        Level::ERROR => web_sys::console::error_1(&v),
        Level::WARN => web_sys::console::warn_1(&v),
        Level::INFO => web_sys::console::info_1(&v),
        _ => web_sys::console::debug_1(&v),
    }
}

// Native builds (unit tests) have no console object.
#[cfg(not(target_arch = "wasm32"))]
fn emit(level: Level, line: &str) {
    if level <= Level::WARN {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}
