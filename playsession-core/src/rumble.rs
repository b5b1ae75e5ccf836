//! CHT-file rumble/haptics engine: parser, per-frame memory-watch evaluator,
//! and dispatch scaling (spec §4.9).

use crate::emulator::MemoryInspector;
use std::collections::HashMap;

const WARMUP_FRAMES: u32 = 30;
const MIN_MAGNITUDE: f32 = 0.40;
const MIN_DURATION_MS: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RumbleType {
    Changed,
    Unchanged,
    Increased,
    Decreased,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    IncreasedByExact,
    DecreasedByExact,
    Unknown,
}

impl From<u8> for RumbleType {
    fn from(value: u8) -> Self {
        match value {
            0 | 1 => RumbleType::Changed,
            2 => RumbleType::Unchanged,
            3 => RumbleType::Increased,
            4 => RumbleType::Decreased,
            5 => RumbleType::Equals,
            6 => RumbleType::NotEquals,
            7 => RumbleType::LessThan,
            8 => RumbleType::GreaterThan,
            9 => RumbleType::IncreasedByExact,
            10 => RumbleType::DecreasedByExact,
            _ => RumbleType::Unknown,
        }
    }
}

/// One parsed `cheatN_*` record from a CHT file.
#[derive(Debug, Clone)]
pub struct RumbleEntry {
    pub address: u32,
    pub memory_search_size: u8,
    pub rumble_type: u8,
    pub rumble_value: u32,
    pub rumble_port: u8,
    pub big_endian: bool,
    pub primary_strength: u16,
    pub primary_duration_ms: u32,
    pub secondary_strength: u16,
    pub secondary_duration_ms: u32,
}

impl Default for RumbleEntry {
    fn default() -> Self {
        Self {
            address: 0,
            memory_search_size: 0,
            rumble_type: 0,
            rumble_value: 0,
            rumble_port: 1,
            big_endian: false,
            primary_strength: 0,
            primary_duration_ms: 0,
            secondary_strength: 0,
            secondary_duration_ms: 0,
        }
    }
}

/// A single emitted haptic event, already scaled for dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumbleEvent {
    pub port: u8,
    pub strong_magnitude: f32,
    pub weak_magnitude: f32,
    pub strong_duration_ms: u32,
    pub weak_duration_ms: u32,
}

/// Parses a whitespace-tolerant `key = "value"` CHT file with `#` comments.
/// Unknown or malformed top-level structure yields an error; individual
/// missing entry fields silently take their documented defaults.
pub fn parse_cht(text: &str) -> Result<Vec<RumbleEntry>, String> {
    let mut top: HashMap<String, String> = HashMap::new();
    let mut by_entry: HashMap<usize, HashMap<String, String>> = HashMap::new();

    for raw_line in text.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"').to_string();
        if let Some(rest) = key.strip_prefix("cheat") {
            let Some(underscore) = rest.find('_') else { continue };
            let (index_str, field) = rest.split_at(underscore);
            let Ok(index) = index_str.parse::<usize>() else { continue };
            by_entry.entry(index).or_default().insert(field[1..].to_string(), value);
        } else {
            top.insert(key.to_string(), value);
        }
    }

    let count: usize = top
        .get("cheats")
        .ok_or_else(|| "missing required key 'cheats'".to_string())?
        .parse()
        .map_err(|_| "cheats value is not an integer".to_string())?;

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let fields = by_entry.get(&i).cloned().unwrap_or_default();
        let get = |k: &str| fields.get(k).cloned();
        let entry = RumbleEntry {
            address: get("address").and_then(|v| v.parse().ok()).unwrap_or(0),
            memory_search_size: get("memory_search_size").and_then(|v| v.parse().ok()).unwrap_or(0),
            rumble_type: get("rumble_type").and_then(|v| v.parse().ok()).unwrap_or(0),
            rumble_value: get("rumble_value").and_then(|v| v.parse().ok()).unwrap_or(0),
            rumble_port: get("rumble_port").and_then(|v| v.parse().ok()).unwrap_or(1),
            big_endian: get("big_endian").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
            primary_strength: get("rumble_primary_strength").and_then(|v| v.parse().ok()).unwrap_or(0),
            primary_duration_ms: get("rumble_primary_duration").and_then(|v| v.parse().ok()).unwrap_or(0),
            secondary_strength: get("rumble_secondary_strength").and_then(|v| v.parse().ok()).unwrap_or(0),
            secondary_duration_ms: get("rumble_secondary_duration").and_then(|v| v.parse().ok()).unwrap_or(0),
        };
        entries.push(entry);
    }
    Ok(entries)
}

struct EntryState {
    prev_value: u32,
    primary_ends_at_frame: u64,
    secondary_ends_at_frame: u64,
}

/// Per-frame memory-watch evaluator driving a set of [`RumbleEntry`] records.
pub struct RumbleEngine {
    entries: Vec<RumbleEntry>,
    state: Vec<EntryState>,
    frame: u64,
    warmup_remaining: u32,
    system_big_endian: bool,
}

impl RumbleEngine {
    pub fn new(entries: Vec<RumbleEntry>, system_big_endian: bool) -> Self {
        let state = entries
            .iter()
            .map(|_| EntryState { prev_value: 0, primary_ends_at_frame: 0, secondary_ends_at_frame: 0 })
            .collect();
        Self { entries, state, frame: 0, warmup_remaining: WARMUP_FRAMES, system_big_endian }
    }

    pub fn reset(&mut self) {
        self.warmup_remaining = WARMUP_FRAMES;
        for s in &mut self.state {
            s.prev_value = 0;
            s.primary_ends_at_frame = 0;
            s.secondary_ends_at_frame = 0;
        }
    }

    fn read_value(entry: &RumbleEntry, memory: &dyn MemoryInspector, system_big_endian: bool) -> u32 {
        let swap = entry.big_endian != system_big_endian;
        let read_bytes = |addr: u32, n: usize| -> [u8; 4] {
            let mut buf = [0u8; 4];
            memory.read_memory(addr, &mut buf[..n]);
            buf
        };
        let (raw, mask): (u32, u32) = match entry.memory_search_size {
            0 => {
                let addr = if swap { entry.address ^ 1 } else { entry.address };
                (read_bytes(addr, 1)[0] as u32, 0x1)
            }
            1 => {
                let addr = if swap { entry.address ^ 1 } else { entry.address };
                (read_bytes(addr, 1)[0] as u32, 0x3)
            }
            2 => {
                let addr = if swap { entry.address ^ 1 } else { entry.address };
                (read_bytes(addr, 1)[0] as u32, 0x0F)
            }
            3 => {
                let addr = if swap { entry.address ^ 1 } else { entry.address };
                (read_bytes(addr, 1)[0] as u32, 0xFF)
            }
            4 => {
                let b = read_bytes(entry.address, 2);
                let v = if swap { u16::from_be_bytes([b[0], b[1]]) } else { u16::from_le_bytes([b[0], b[1]]) };
                (v as u32, 0xFFFF)
            }
            5 => {
                let b = read_bytes(entry.address, 4);
                let v = if swap {
                    u32::from_be_bytes(b)
                } else {
                    u32::from_le_bytes(b)
                };
                (v, 0xFFFF_FFFF)
            }
            _ => (0, 0),
        };
        raw & mask
    }

    fn evaluate_condition(rumble_type: u8, prev: u32, current: u32, rumble_value: u32) -> bool {
        match RumbleType::from(rumble_type) {
            RumbleType::Changed => current != prev,
            RumbleType::Unchanged => current == prev,
            RumbleType::Increased => current > prev,
            RumbleType::Decreased => current < prev,
            RumbleType::Equals => current == rumble_value,
            RumbleType::NotEquals => current != rumble_value,
            RumbleType::LessThan => current < rumble_value,
            RumbleType::GreaterThan => current > rumble_value,
            RumbleType::IncreasedByExact => current >= prev && current - prev == rumble_value,
            RumbleType::DecreasedByExact => prev >= current && prev - current == rumble_value,
            RumbleType::Unknown => false,
        }
    }

    /// Reads memory, evaluates every entry's condition, and returns the
    /// events firing this frame. During warmup (first 30 frames), baseline
    /// values are populated but no events are emitted.
    pub fn evaluate(&mut self, memory: &dyn MemoryInspector) -> Vec<RumbleEvent> {
        self.frame += 1;
        let warming_up = self.warmup_remaining > 0;
        if warming_up {
            self.warmup_remaining -= 1;
        }

        let system_big_endian = self.system_big_endian;
        let mut events = Vec::new();
        for (entry, state) in self.entries.iter().zip(self.state.iter_mut()) {
            let current = Self::read_value(entry, memory, system_big_endian);
            if warming_up {
                state.prev_value = current;
                continue;
            }
            let fires = Self::evaluate_condition(entry.rumble_type, state.prev_value, current, entry.rumble_value);
            if fires {
                let mut strong = 0.0f32;
                let mut weak = 0.0f32;
                let mut strong_dur = 0;
                let mut weak_dur = 0;

                if entry.primary_strength > 0
                    && entry.primary_duration_ms > 0
                    && self.frame >= state.primary_ends_at_frame
                {
                    strong = entry.primary_strength as f32 / 65535.0;
                    strong_dur = entry.primary_duration_ms;
                    let frames = (entry.primary_duration_ms as u64 * 60).div_ceil(1000).max(1);
                    state.primary_ends_at_frame = self.frame + frames;
                }
                if entry.secondary_strength > 0
                    && entry.secondary_duration_ms > 0
                    && self.frame >= state.secondary_ends_at_frame
                {
                    weak = entry.secondary_strength as f32 / 65535.0;
                    weak_dur = entry.secondary_duration_ms;
                    let frames = (entry.secondary_duration_ms as u64 * 60).div_ceil(1000).max(1);
                    state.secondary_ends_at_frame = self.frame + frames;
                }

                if strong > 0.0 || weak > 0.0 {
                    events.push(RumbleEvent {
                        port: entry.rumble_port,
                        strong_magnitude: strong,
                        weak_magnitude: weak,
                        strong_duration_ms: strong_dur,
                        weak_duration_ms: weak_dur,
                    });
                }
            }
            state.prev_value = current;
        }
        events
    }

}

/// Scales a raw event by a 1..5 intensity level and enforces the platform
/// perceptibility floor on any non-zero field.
pub fn dispatch_scale(event: RumbleEvent, level: u8) -> RumbleEvent {
    let (intensity_mul, duration_mul, force_max) = match level {
        4 => (4.0, 2.0, false),
        5 => (1.0, 2.0, true),
        1..=3 => (level as f32, 1.0, false),
        _ => (1.0, 1.0, false),
    };

    let scale_magnitude = |m: f32| -> f32 {
        if m <= 0.0 {
            return 0.0;
        }
        let scaled = if force_max { 1.0 } else { (m * intensity_mul).min(1.0) };
        scaled.max(MIN_MAGNITUDE)
    };
    let scale_duration = |d: u32| -> u32 {
        if d == 0 {
            return 0;
        }
        ((d as f32 * duration_mul) as u32).max(MIN_DURATION_MS)
    };

    RumbleEvent {
        port: event.port,
        strong_magnitude: scale_magnitude(event.strong_magnitude),
        weak_magnitude: scale_magnitude(event.weak_magnitude),
        strong_duration_ms: scale_duration(event.strong_duration_ms),
        weak_duration_ms: scale_duration(event.weak_duration_ms),
    }
}
