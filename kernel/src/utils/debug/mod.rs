/*
 * Debugging and Logging Utilities
 *
 * This module contains the scheduler's logging backend: a `log::Log`
 * implementation that formats records into a fixed-size ring buffer which
 * the embedding kernel (or a test) drains whenever it likes.
 */

pub mod log_buffer;
pub mod logger;
pub mod ring_buffer;

pub use logger::init;
