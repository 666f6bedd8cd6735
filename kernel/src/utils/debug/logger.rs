/*
 * Kernel Logging System
 *
 * This module implements the `log::Log` backend used by the scheduler.
 * Records are formatted as `[LEVEL] target: message` into a fixed-size
 * stack string and appended to the global log buffer, so logging works in
 * any context that may take a spin lock and never allocates.
 *
 * Why this is important:
 * - Every lifecycle transition and policy switch is traceable
 * - Fatal invariant violations log their reason before panicking
 * - The embedding kernel decides where buffered records finally go
 */

use core::fmt::Write;

use heapless::String;
use log::{LevelFilter, Metadata, Record, SetLoggerError};

use super::log_buffer;

/// Longest single formatted record; longer records are truncated
const RECORD_CAPACITY: usize = 256;

/// Logger writing into the global ring buffer
struct CluuLogger;

impl log::Log for CluuLogger {
    /// Checks if the given log level is enabled.
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    /// Formats the record and appends it to the log buffer.
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line: String<RECORD_CAPACITY> = String::new();
        // A full buffer only truncates the record
        let _ = write!(line, "[{}] {}: {}", record.level(), record.target(), record.args());
        if line.push('\n').is_err() {
            line.pop();
            let _ = line.push('\n');
        }

        log_buffer::write_log(&line);
    }

    /// Nothing to flush; the buffer is drained by its owner.
    fn flush(&self) {}
}

/// The CluuLogger instance used for logging.
static LOGGER: CluuLogger = CluuLogger;

/// Installs the buffered logger
///
/// # Arguments
/// * `level` - Maximum level that will be recorded
///
/// # Returns
/// An error if another logger is already installed. The maximum level is
/// applied either way, so repeated calls (for example from several tests)
/// are harmless.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let result = log::set_logger(&LOGGER);
    log::set_max_level(level);

    match result {
        Ok(()) => {
            log::info!("Logger initialized at level {}", level);
            Ok(())
        }
        Err(err) => {
            log::warn!("Logger already installed: {}", err);
            Err(err)
        }
    }
}
