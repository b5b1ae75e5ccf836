//! The dedicated emulation worker: reads input, advances frames, and drives
//! every per-frame collaborator in the order the concurrency model requires
//! (spec §4.2, §5). Grounded in `tetanes`'s emulation thread loop, with the
//! wgpu/egui rendering split out — this crate only produces framebuffer bytes
//! and audio samples, never draws them.

use crate::achievements::AchievementManager;
use crate::audio::samples_to_bytes;
use crate::config::Config;
use parking_lot::Mutex;
use playsession_core::audio_ring::AudioRingBuffer;
use playsession_core::emulator::{BatterySaver, Emulator, MemoryInspector, SaveStater};
use playsession_core::rewind::RewindStore;
use playsession_core::rumble::RumbleEngine;
use playsession_core::shared::{EmuControl, SharedFramebuffer, SharedInput};
use playsession_core::turbo::{average_audio, TurboState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Target buffered-audio band ADT steers toward, in bytes (spec §9): 9.6-19.2 KB.
const ADT_TARGET_LOW: usize = 9_600;
const ADT_TARGET_HIGH: usize = 19_200;
const ADT_BIAS: f64 = 0.10;
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// The emulator plus its optional detected capabilities, bundled so the
/// worker and the host (while paused) can share one lock rather than four.
pub struct LoadedEmulator {
    pub emulator: Box<dyn Emulator>,
    pub save_stater: Option<Box<dyn SaveStater + Send>>,
    pub battery: Option<Box<dyn BatterySaver + Send>>,
    pub memory: Option<Arc<dyn MemoryInspector + Send + Sync>>,
}

/// Mutex-guarded handoff for an auto-saved snapshot: the worker publishes
/// bytes and sets `ready`; the host drains it and clears the flag once the
/// disk write is dispatched (spec §5).
#[derive(Default)]
pub struct AutoSaveSlot {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl AutoSaveSlot {
    pub fn publish(&self, bytes: Vec<u8>) {
        *self.bytes.lock() = Some(bytes);
    }

    /// Takes the pending snapshot, if any, clearing the ready flag.
    pub fn take(&self) -> Option<Vec<u8>> {
        self.bytes.lock().take()
    }
}

/// Shared handles the worker reads/writes every frame. The host holds clones
/// of the same `Arc`s so it can read framebuffer/audio state and drive
/// pause/resume without touching the worker thread directly.
pub struct WorkerHandles {
    pub emulator: Arc<Mutex<LoadedEmulator>>,
    pub input: Arc<SharedInput>,
    pub framebuffer: Arc<SharedFramebuffer>,
    pub control: Arc<EmuControl>,
    pub audio_ring: Arc<AudioRingBuffer>,
    pub turbo: Arc<TurboState>,
    pub auto_save: Arc<AutoSaveSlot>,
    /// `Reset()` on either is only legal while the worker is paused (spec §5);
    /// shared with the host for that reason.
    pub rewind: Arc<Mutex<Option<RewindStore>>>,
    pub rumble: Arc<Mutex<Option<RumbleEngine>>>,
    pub config: Config,
    pub achievements: Arc<dyn AchievementManager>,
}

pub struct EmulationWorker {
    handles: WorkerHandles,
    auto_save_interval: Duration,
    last_auto_save: Instant,
    scratch_audio: Vec<i16>,
}

impl EmulationWorker {
    pub fn new(handles: WorkerHandles, auto_save_interval: Duration) -> Self {
        Self { handles, auto_save_interval, last_auto_save: Instant::now(), scratch_audio: Vec::new() }
    }

    /// Runs until `EmuControl::check_pause` signals termination. Intended to
    /// be the body of the dedicated worker thread.
    pub fn run(&mut self) {
        while self.handles.control.check_pause() {
            self.step();
        }
    }

    fn step(&mut self) {
        let frame_start = Instant::now();
        let mut loaded = self.handles.emulator.lock();

        for (player, bitmask) in self.handles.input.read().into_iter().enumerate() {
            loaded.emulator.set_input(player, bitmask);
        }

        let multiplier = self.handles.turbo.read();
        let mute_during_turbo = self.handles.config.read(|cfg| cfg.fast_forward_mute);
        self.scratch_audio.clear();

        for _ in 1..multiplier {
            loaded.emulator.run_frame();
            if !mute_during_turbo {
                self.scratch_audio.extend_from_slice(loaded.emulator.audio_samples());
            }
            loaded.emulator.clear_audio_samples();
        }

        loaded.emulator.run_frame();
        if multiplier == 1 {
            let bytes = samples_to_bytes(loaded.emulator.audio_samples());
            self.handles.audio_ring.write(&bytes);
        } else if !mute_during_turbo {
            self.scratch_audio.extend_from_slice(loaded.emulator.audio_samples());
            let downmixed = average_audio(&self.scratch_audio, multiplier);
            let bytes = samples_to_bytes(&downmixed);
            self.handles.audio_ring.write(&bytes);
        }
        loaded.emulator.clear_audio_samples();

        self.handles.framebuffer.update(loaded.emulator.framebuffer(), loaded.emulator.framebuffer_stride(), loaded.emulator.active_height());

        let rewind_enabled = self.handles.config.read(|cfg| cfg.rewind_enabled);
        if rewind_enabled {
            if let (Some(rewind), Some(save_stater)) = (self.handles.rewind.lock().as_mut(), loaded.save_stater.as_ref()) {
                let _ = rewind.capture(save_stater.as_ref());
            }
        }

        if self.last_auto_save.elapsed() >= self.auto_save_interval {
            if let Some(save_stater) = loaded.save_stater.as_ref() {
                if let Ok(bytes) = save_stater.serialize() {
                    self.handles.auto_save.publish(bytes);
                }
            }
            self.last_auto_save = Instant::now();
        }

        self.handles.achievements.do_frame();

        let rumble_enabled = self.handles.config.read(|cfg| cfg.rumble_enabled);
        if rumble_enabled {
            if let (Some(rumble), Some(memory)) = (self.handles.rumble.lock().as_mut(), loaded.memory.as_ref()) {
                let events = rumble.evaluate(memory.as_ref());
                let level = self.handles.config.read(|cfg| cfg.rumble_level);
                for event in events {
                    let scaled = playsession_core::rumble::dispatch_scale(event, level);
                    tracing::trace!(?scaled, "rumble event");
                }
            }
        }

        let frame_time = Duration::from_secs_f64(1.0 / loaded.emulator.timing().fps as f64);
        drop(loaded);
        self.pace(frame_start, frame_time);
    }

    fn pace(&self, frame_start: Instant, frame_time: Duration) {
        let elapsed = frame_start.elapsed();
        let Some(base_sleep) = frame_time.checked_sub(elapsed) else { return };

        let buffered = self.handles.audio_ring.buffered();
        let band_mid = (ADT_TARGET_LOW + ADT_TARGET_HIGH) / 2;
        let bias = if buffered < ADT_TARGET_LOW {
            -ADT_BIAS
        } else if buffered > ADT_TARGET_HIGH {
            ADT_BIAS
        } else {
            let offset = buffered as f64 - band_mid as f64;
            ADT_BIAS * (offset / (band_mid as f64)).clamp(-1.0, 1.0)
        };

        let biased_secs = (base_sleep.as_secs_f64() * (1.0 + bias)).max(0.0);
        let sleep = Duration::from_secs_f64(biased_secs);
        if sleep > MIN_SLEEP {
            std::thread::sleep(sleep);
        }
    }
}

/// Spawns the worker as a dedicated OS thread, returning its join handle.
pub fn spawn(mut worker: EmulationWorker) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("playsession-worker".into())
        .spawn(move || worker.run())
        .expect("failed to spawn emulation worker thread")
}

/// Set once the worker thread has produced its first frame, letting the host
/// avoid drawing stale/empty framebuffers before `Launch` settles.
#[derive(Debug, Default)]
pub struct WorkerReady(AtomicBool);

impl WorkerReady {
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::NullAchievementManager;
    use playsession_core::emulator::{Region, Timing};
    use std::sync::atomic::AtomicUsize;

    struct StubEmulator {
        run_frame_calls: Arc<AtomicUsize>,
    }

    impl Emulator for StubEmulator {
        fn run_frame(&mut self) {
            self.run_frame_calls.fetch_add(1, Ordering::SeqCst);
        }
        fn set_input(&mut self, _player: usize, _bitmask: u32) {}
        fn framebuffer(&self) -> &[u8] {
            &[]
        }
        fn framebuffer_stride(&self) -> usize {
            0
        }
        fn active_height(&self) -> usize {
            0
        }
        fn audio_samples(&self) -> &[i16] {
            &[]
        }
        fn clear_audio_samples(&mut self) {}
        fn timing(&self) -> Timing {
            Timing { fps: 1000 }
        }
        fn set_region(&mut self, _region: Region) {}
        fn set_option(&mut self, _key: &str, _value: &str) {}
        fn close(&mut self) {}
    }

    fn test_handles(run_frame_calls: Arc<AtomicUsize>) -> WorkerHandles {
        WorkerHandles {
            emulator: Arc::new(Mutex::new(LoadedEmulator {
                emulator: Box::new(StubEmulator { run_frame_calls }),
                save_stater: None,
                battery: None,
                memory: None,
            })),
            input: Arc::new(SharedInput::new()),
            framebuffer: Arc::new(SharedFramebuffer::new(4, 4)),
            control: Arc::new(EmuControl::new()),
            audio_ring: Arc::new(AudioRingBuffer::new(64)),
            turbo: Arc::new(TurboState::new()),
            auto_save: Arc::new(AutoSaveSlot::default()),
            rewind: Arc::new(Mutex::new(None)),
            rumble: Arc::new(Mutex::new(None)),
            config: Config::default(),
            achievements: Arc::new(NullAchievementManager),
        }
    }

    #[test]
    fn worker_stops_promptly_after_stop() {
        let run_frame_calls = Arc::new(AtomicUsize::new(0));
        let handles = test_handles(Arc::clone(&run_frame_calls));
        let control = Arc::clone(&handles.control);
        let mut worker = EmulationWorker::new(handles, Duration::from_secs(600));

        let handle = std::thread::spawn(move || worker.run());
        std::thread::sleep(Duration::from_millis(20));
        control.stop();
        handle.join().unwrap();
        assert!(run_frame_calls.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn auto_save_publishes_once_interval_elapses() {
        struct AlwaysSerializes;
        impl SaveStater for AlwaysSerializes {
            fn serialize(&self) -> Result<Vec<u8>, String> {
                Ok(vec![42])
            }
            fn deserialize(&mut self, _bytes: &[u8]) -> Result<(), String> {
                Ok(())
            }
        }
        let run_frame_calls = Arc::new(AtomicUsize::new(0));
        let handles = test_handles(Arc::clone(&run_frame_calls));
        handles.emulator.lock().save_stater = Some(Box::new(AlwaysSerializes));
        let auto_save = Arc::clone(&handles.auto_save);
        let mut worker = EmulationWorker::new(handles, Duration::from_millis(0));
        worker.step();
        assert_eq!(auto_save.take(), Some(vec![42]));
    }
}
