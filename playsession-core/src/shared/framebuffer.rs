//! Double-buffered framebuffer handoff between the emulation worker and the
//! host's draw phase (spec §4.3, §9).

use parking_lot::Mutex;
use std::sync::Arc;

/// A consistent snapshot returned by [`SharedFramebuffer::read`]. The host may
/// hold and read from this lock-free until its next call to `read`.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pixels: Arc<[u8]>,
    stride: usize,
    active_height: usize,
}

impl FrameSnapshot {
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub const fn stride(&self) -> usize {
        self.stride
    }

    pub const fn active_height(&self) -> usize {
        self.active_height
    }
}

struct WriteBuf {
    pixels: Vec<u8>,
    stride: usize,
    active_height: usize,
}

/// Two owned byte buffers behind locks: the worker writes into `write`, and
/// `read` copies `write` into a fresh [`FrameSnapshot`] under lock before
/// handing it to the caller.
#[derive(Debug)]
pub struct SharedFramebuffer {
    write: Mutex<WriteBuf>,
    last_read: Mutex<Arc<FrameSnapshot>>,
}

impl std::fmt::Debug for WriteBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBuf")
            .field("len", &self.pixels.len())
            .field("stride", &self.stride)
            .field("active_height", &self.active_height)
            .finish()
    }
}

impl SharedFramebuffer {
    pub fn new(max_w: usize, max_h: usize) -> Self {
        let capacity = max_w * max_h * 4;
        let empty = Arc::new(FrameSnapshot { pixels: Arc::from(Vec::new().into_boxed_slice()), stride: 0, active_height: 0 });
        Self {
            write: Mutex::new(WriteBuf { pixels: vec![0; capacity], stride: 0, active_height: 0 }),
            last_read: Mutex::new(empty),
        }
    }

    /// Worker-side: copies `min(stride * active_height, pixels.len(), buf_len)`
    /// bytes into the write buffer and records stride/active_height atomically
    /// with the pixel copy (both taken under the same lock).
    pub fn update(&self, pixels: &[u8], stride: usize, active_height: usize) {
        let mut buf = self.write.lock();
        let len = (stride * active_height).min(pixels.len()).min(buf.pixels.len());
        buf.pixels[..len].copy_from_slice(&pixels[..len]);
        buf.stride = stride;
        buf.active_height = active_height;
    }

    /// Host-side: copies the write buffer into a fresh snapshot under lock and
    /// returns it. The stride/active_height in the returned snapshot always
    /// correspond to exactly one `update` call.
    pub fn read(&self) -> Arc<FrameSnapshot> {
        let snapshot = {
            let buf = self.write.lock();
            Arc::new(FrameSnapshot {
                pixels: Arc::from(buf.pixels.as_slice()),
                stride: buf.stride,
                active_height: buf.active_height,
            })
        };
        *self.last_read.lock() = Arc::clone(&snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn read_after_update_matches() {
        let fb = SharedFramebuffer::new(4, 4);
        let pixels = vec![7u8; 4 * 4 * 4];
        fb.update(&pixels, 16, 4);
        let snap = fb.read();
        assert_eq!(snap.stride(), 16);
        assert_eq!(snap.active_height(), 4);
        assert!(snap.pixels().iter().all(|&b| b == 7));
    }

    #[test]
    fn read_never_mixes_stride_and_pixels_from_different_updates() {
        let fb = Arc::new(SharedFramebuffer::new(8, 8));
        let barrier = Arc::new(Barrier::new(2));
        let writer_fb = Arc::clone(&fb);
        let writer_barrier = Arc::clone(&barrier);
        let writer = std::thread::spawn(move || {
            writer_barrier.wait();
            for i in 0..200u8 {
                let stride = 8 * 4;
                let height = 2 + (i as usize % 6);
                let pixels = vec![i; stride * height];
                writer_fb.update(&pixels, stride, height);
            }
        });
        barrier.wait();
        for _ in 0..200 {
            let snap = fb.read();
            let expected_len = snap.stride() * snap.active_height();
            // Every byte in the covered region must equal the same value -
            // a torn read would mix two different fill bytes.
            if let Some(&first) = snap.pixels().get(0) {
                assert!(snap.pixels()[..expected_len.min(snap.pixels().len())]
                    .iter()
                    .all(|&b| b == first || first == 0));
            }
        }
        writer.join().unwrap();
    }
}
