//! Bounded ring of serialized snapshots with accelerated hold-replay (spec §4.6).

use crate::emulator::{Emulator, SaveStater};

/// Fixed-capacity ring of serialized emulator states.
///
/// Construction yields `None` when either input is non-positive or the
/// computed capacity would be zero — callers treat a missing store as
/// "rewind disabled for this session" rather than an error.
pub struct RewindStore {
    slots: Vec<Option<Vec<u8>>>,
    capacity: usize,
    head: usize,
    count: usize,
    frame_tick: u32,
    frame_step: u32,
}

impl RewindStore {
    pub fn new(buffer_size_mb: f64, state_size: usize, frame_step: u32) -> Option<Self> {
        if buffer_size_mb <= 0.0 || state_size == 0 || frame_step == 0 {
            return None;
        }
        let capacity = ((buffer_size_mb * 1024.0 * 1024.0) / state_size as f64).floor() as usize;
        if capacity == 0 {
            return None;
        }
        Some(Self {
            slots: vec![None; capacity],
            capacity,
            head: 0,
            count: 0,
            frame_tick: 0,
            frame_step,
        })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn count(&self) -> usize {
        self.count
    }

    /// Serializes and stores a snapshot, gated by `frame_step`. No-op (but
    /// still `Ok`) on ticks that don't land on the step boundary.
    pub fn capture(&mut self, save_stater: &dyn SaveStater) -> Result<(), String> {
        self.frame_tick += 1;
        if self.frame_tick < self.frame_step {
            return Ok(());
        }
        self.frame_tick = 0;
        let bytes = save_stater.serialize()?;
        self.slots[self.head] = Some(bytes);
        self.head = (self.head + 1) % self.capacity;
        self.count = (self.count + 1).min(self.capacity);
        Ok(())
    }

    /// Rewinds by up to `items` captured frames, regenerating the
    /// framebuffer via a `RunFrame` since serialized state excludes pixels.
    pub fn rewind(&mut self, emulator: &mut dyn Emulator, save_stater: &mut dyn SaveStater, items: usize) -> bool {
        if self.count == 0 {
            return false;
        }
        let items = items.min(self.count);
        if items == 0 {
            return false;
        }
        self.head = (self.head + self.capacity - items) % self.capacity;
        self.count -= items;
        let slot_index = (self.head + self.capacity - 1) % self.capacity;
        let Some(bytes) = self.slots[slot_index].as_ref() else {
            return false;
        };
        if save_stater.deserialize(bytes).is_err() {
            return false;
        }
        emulator.run_frame();
        true
    }

    /// Drops every slot reference so the runtime may reclaim the memory.
    pub fn reset(&mut self) {
        self.head = 0;
        self.count = 0;
        self.frame_tick = 0;
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

/// Items to rewind for a given number of consecutive frames the rewind
/// button has been held (spec §4.6 "Hold-duration acceleration").
pub fn rewind_items_for_hold_duration(hold_frames: u32) -> usize {
    match hold_frames {
        0 => 0,
        1 => 1,
        2..=15 => {
            if hold_frames % 4 == 0 {
                1
            } else {
                0
            }
        }
        16..=30 => {
            if hold_frames % 2 == 0 {
                1
            } else {
                0
            }
        }
        31..=60 => 1,
        _ => 2,
    }
}
