//! Turbo/fast-forward multiplier and audio downmix (spec §4.7).

use std::sync::atomic::{AtomicU8, Ordering};

/// Host-writes, worker-reads turbo multiplier, cycling `1 -> 2 -> 3 -> 1`.
#[derive(Debug, Default)]
pub struct TurboState {
    multiplier: AtomicU8,
}

impl TurboState {
    pub fn new() -> Self {
        Self { multiplier: AtomicU8::new(1) }
    }

    /// Host-side: advances to the next multiplier and returns it.
    pub fn cycle_multiplier(&self) -> u8 {
        let next = match self.multiplier.load(Ordering::Acquire) {
            1 => 2,
            2 => 3,
            _ => 1,
        };
        self.multiplier.store(next, Ordering::Release);
        next
    }

    /// Worker-side: current multiplier.
    pub fn read(&self) -> u8 {
        self.multiplier.load(Ordering::Acquire)
    }
}

/// Downmixes `multiplier` consecutive interleaved-stereo frames into one by
/// positional averaging. Returns an empty vec if the combined sample count
/// can't form at least one even-length frame.
pub fn average_audio(combined: &[i16], multiplier: u8) -> Vec<i16> {
    let k = multiplier.max(1) as usize;
    if k == 1 {
        return combined.to_vec();
    }
    let mut frame_len = combined.len() / k;
    frame_len -= frame_len % 2;
    if frame_len == 0 {
        return Vec::new();
    }
    let mut out = vec![0i16; frame_len];
    for (i, slot) in out.iter_mut().enumerate() {
        let sum: i64 = (0..k).map(|f| combined[f * frame_len + i] as i64).sum();
        *slot = (sum / k as i64) as i16;
    }
    out
}
