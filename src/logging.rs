//! Host-side and embedding-time `log` facade wiring.
//!
//! Grounded on the teacher's `utils::logger::CluuLogger` (a `log::Log`
//! implementor that funnels `log::Record`s to `serial_println!`),
//! generalized so it isn't tied to the teacher's VGA/serial writer: a caller
//! supplies any [`LogSink`] (a serial port driver, a ring buffer like the
//! teacher's `utils::debug::log_buffer`, or a host-side stdout writer for a
//! standalone test binary). The `std`-enabled test configuration uses
//! `env_logger` directly instead (see `tests/mod.rs`) — this module is for a
//! `no_std` embedder that has no such crate available.

use log::{Level, LevelFilter, Log, Metadata, Record};

/// One formatted log line. Kept narrower than `core::fmt::Write` because a
/// sink wants whole records, not a stream of partial writes interleaved from
/// multiple log calls.
pub trait LogSink: Sync {
    fn write_line(&self, level: Level, args: core::fmt::Arguments);
}

struct SinkLogger {
    sink: &'static dyn LogSink,
}

impl Log for SinkLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        // Filtering is delegated entirely to `log::set_max_level`; this
        // logger forwards whatever the facade already decided to let through.
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.sink.write_line(record.level(), *record.args());
        }
    }

    fn flush(&self) {}
}

/// Installs `sink` as the global `log` backend at `max_level`, the same role
/// the teacher's `logger::init` plays at boot. Returns the facade's own
/// error if a logger was already installed (`log::set_logger` is one-shot
/// for the lifetime of the process).
///
/// `sink` must already be `'static` — typically a `static` the embedder
/// defines itself, exactly as the teacher's `static LOGGER: CluuLogger` is.
pub fn init(sink: &'static dyn LogSink, max_level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let logger = alloc::boxed::Box::leak(alloc::boxed::Box::new(SinkLogger { sink }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(())
}
