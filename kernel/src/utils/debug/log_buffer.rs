/*
 * Buffered Logging System
 *
 * Global log buffer shared by every CPU. Records are appended under a short
 * `spin::Mutex` critical section and drained later by whoever owns the
 * console (the kernel's idle path, or a test asserting on log output).
 *
 * Benefits:
 * - Logging never waits on a slow device
 * - Safe to call with the process-table lock held
 */

use spin::Mutex;

use super::ring_buffer::RingBuffer;

/// Global log buffer
static LOG_BUFFER: Mutex<RingBuffer> = Mutex::new(RingBuffer::new());

/// Held by tests that drain the buffer and assert on what they got
#[cfg(test)]
pub static TEST_DRAIN: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Append a formatted record to the buffer
pub fn write_log(message: &str) {
    LOG_BUFFER.lock().write(message.as_bytes());
}

/// Drain everything currently buffered into `sink`
///
/// The sink is called with chunks of at most 256 bytes, in order. Chunks
/// may split a UTF-8 sequence; sinks that need text should collect first.
///
/// # Returns
/// Total number of bytes drained
pub fn drain_into<F: FnMut(&[u8])>(mut sink: F) -> usize {
    let mut temp_buf = [0u8; 256];
    let mut total = 0;

    loop {
        // Re-lock per chunk so a slow sink does not stall loggers
        let read = LOG_BUFFER.lock().read(&mut temp_buf);
        if read == 0 {
            break;
        }
        sink(&temp_buf[..read]);
        total += read;
    }

    total
}

/// Number of bytes waiting to be drained
pub fn pending() -> usize {
    LOG_BUFFER.lock().len()
}
