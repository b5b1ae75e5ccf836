//! Single-producer/single-consumer byte FIFO feeding the audio sink (spec §4.4).
//!
//! `write` never blocks: once the buffer is full, excess bytes are dropped so
//! the worker can never stall on audio. `read` is a pull — the sink calls it
//! from its own callback thread and gets back however many bytes are ready.

use parking_lot::Mutex;

/// ~167ms at 48 kHz stereo 16-bit (48_000 * 2 channels * 2 bytes/sample * 0.167s).
pub const DEFAULT_CAPACITY: usize = 32_064;

struct RingInner {
    buf: Vec<u8>,
    head: usize,
    len: usize,
    closed: bool,
}

pub struct AudioRingBuffer {
    inner: Mutex<RingInner>,
    capacity: usize,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RingInner { buf: vec![0; capacity.max(1)], head: 0, len: 0, closed: false }),
            capacity: capacity.max(1),
        }
    }

    /// Appends `bytes`, dropping whatever doesn't fit.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut inner = self.inner.lock();
        if inner.closed {
            return 0;
        }
        let free = self.capacity - inner.len;
        let n = bytes.len().min(free);
        let tail = (inner.head + inner.len) % self.capacity;
        for (i, &b) in bytes[..n].iter().enumerate() {
            inner.buf[(tail + i) % self.capacity] = b;
        }
        inner.len += n;
        n
    }

    /// Copies up to `buf.len()` bytes out, returning the count copied.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut inner = self.inner.lock();
        let n = buf.len().min(inner.len);
        for slot in buf.iter_mut().take(n) {
            *slot = inner.buf[inner.head];
            inner.head = (inner.head + 1) % self.capacity;
        }
        inner.len -= n;
        n
    }

    pub fn buffered(&self) -> usize {
        self.inner.lock().len
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.head = 0;
        inner.len = 0;
    }

    /// Marks the ring closed: subsequent writes are discarded and a reader
    /// observing `len == 0` after this knows no more data is coming.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Default for AudioRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_round_trip() {
        let ring = AudioRingBuffer::new(16);
        assert_eq!(ring.write(&[1, 2, 3, 4]), 4);
        assert_eq!(ring.buffered(), 4);
        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(ring.buffered(), 0);
    }

    #[test]
    fn write_drops_excess_on_full() {
        let ring = AudioRingBuffer::new(4);
        assert_eq!(ring.write(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(ring.buffered(), 4);
        let mut out = [0u8; 4];
        ring.read(&mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn wraparound_preserves_order() {
        let ring = AudioRingBuffer::new(4);
        ring.write(&[1, 2, 3]);
        let mut out = [0u8; 2];
        ring.read(&mut out);
        assert_eq!(out, [1, 2]);
        ring.write(&[4, 5, 6]);
        let mut out = [0u8; 4];
        let n = ring.read(&mut out);
        assert_eq!(n, 4);
        assert_eq!(&out[..4], &[3, 4, 5, 6]);
    }

    #[test]
    fn read_returns_less_than_requested_when_underfull() {
        let ring = AudioRingBuffer::new(16);
        ring.write(&[9, 9]);
        let mut out = [0u8; 8];
        assert_eq!(ring.read(&mut out), 2);
    }

    #[test]
    fn close_discards_subsequent_writes() {
        let ring = AudioRingBuffer::new(16);
        ring.write(&[1, 2]);
        ring.close();
        assert_eq!(ring.write(&[3, 4]), 0);
        let mut out = [0u8; 16];
        // Data written before close is still readable.
        assert_eq!(ring.read(&mut out), 2);
        assert!(ring.is_closed());
    }

    #[test]
    fn clear_empties_buffer() {
        let ring = AudioRingBuffer::new(16);
        ring.write(&[1, 2, 3]);
        ring.clear();
        assert_eq!(ring.buffered(), 0);
    }
}
