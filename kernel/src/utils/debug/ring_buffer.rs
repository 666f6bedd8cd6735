/*
 * Ring Buffer for Logging
 *
 * Fixed-size circular byte buffer backing the scheduler log. Writers never
 * block and never allocate: when the buffer is full the oldest bytes are
 * overwritten.
 *
 * Design:
 * - Fixed-size storage (16KB), no heap allocations
 * - Head (write) and tail (read) indices plus an explicit length, so a
 *   completely full buffer is distinguishable from an empty one
 * - Overwrite on overflow (loses old messages)
 *
 * The buffer itself is not synchronized; `log_buffer` wraps it in a
 * `spin::Mutex`.
 */

/// Size of the ring buffer
pub const BUFFER_SIZE: usize = 16 * 1024;

/// Ring buffer for log messages
pub struct RingBuffer {
    /// Circular buffer storage
    buffer: [u8; BUFFER_SIZE],

    /// Write position
    head: usize,

    /// Read position
    tail: usize,

    /// Bytes currently stored
    len: usize,
}

impl RingBuffer {
    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Write bytes to the ring buffer
    ///
    /// If there is not enough room the oldest data is dropped. A message
    /// longer than the whole buffer keeps only its last `BUFFER_SIZE` bytes.
    ///
    /// # Returns
    /// Number of bytes stored
    pub fn write(&mut self, data: &[u8]) -> usize {
        let data = if data.len() > BUFFER_SIZE {
            &data[data.len() - BUFFER_SIZE..]
        } else {
            data
        };

        for &byte in data {
            self.buffer[self.head] = byte;
            self.head = (self.head + 1) % BUFFER_SIZE;

            if self.len == BUFFER_SIZE {
                // Full: the byte we just wrote replaced the oldest one
                self.tail = (self.tail + 1) % BUFFER_SIZE;
            } else {
                self.len += 1;
            }
        }

        data.len()
    }

    /// Read and remove up to `dest.len()` bytes
    ///
    /// # Returns
    /// Number of bytes copied into `dest`
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let to_read = self.len.min(dest.len());

        for slot in dest.iter_mut().take(to_read) {
            *slot = self.buffer[self.tail];
            self.tail = (self.tail + 1) % BUFFER_SIZE;
        }
        self.len -= to_read;

        to_read
    }

    /// Check if the ring buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the number of bytes currently in the buffer
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let mut rb = RingBuffer::new();

        let written = rb.write(b"pid 3 runnable");
        assert_eq!(written, 14);

        let mut buf = [0u8; 20];
        let read = rb.read(&mut buf);
        assert_eq!(read, 14);
        assert_eq!(&buf[..14], b"pid 3 runnable");
        assert!(rb.is_empty());
    }

    #[test]
    fn test_overflow_keeps_newest_bytes() {
        let mut rb = Box::new(RingBuffer::new());

        rb.write(&vec![b'x'; BUFFER_SIZE - 2]);
        rb.write(b"WRAP");
        assert_eq!(rb.len(), BUFFER_SIZE);

        let mut out = vec![0u8; BUFFER_SIZE];
        let read = rb.read(&mut out);
        assert_eq!(read, BUFFER_SIZE);
        assert_eq!(&out[BUFFER_SIZE - 4..], b"WRAP");
        assert_eq!(out[0], b'x');
    }

    #[test]
    fn test_partial_read() {
        let mut rb = RingBuffer::new();
        rb.write(b"abcdef");

        let mut buf = [0u8; 4];
        assert_eq!(rb.read(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(rb.len(), 2);
    }
}
