//! The gameplay manager: `Launch`/`Update`/`Draw`/`Exit` (spec §4.1).

use crate::achievements::{AchievementManager, LOAD_GAME_TIMEOUT};
use crate::audio::AudioPlayer;
use crate::config::Config;
use crate::emulation::{self, AutoSaveSlot, EmulationWorker, LoadedEmulator, WorkerHandles};
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::renderer::FramebufferRenderer;
use parking_lot::Mutex;
use playsession_core::emulator::Region;
use playsession_core::notify::LibraryRecorder;
use playsession_core::play_time::PlayTime;
use playsession_core::rewind::{rewind_items_for_hold_duration, RewindStore};
use playsession_core::rumble::{parse_cht, RumbleEngine};
use playsession_core::save_state::SaveStateManager;
use playsession_core::shared::{EmuControl, SharedFramebuffer, SharedInput};
use playsession_core::turbo::TurboState;
use std::sync::Arc;
use std::time::Duration;

const MAX_NATIVE_W: usize = 1024;
const MAX_NATIVE_H: usize = 960;
const AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(60);
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);
const AUTO_SAVE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Loads ROM bytes for a game id; out of scope to implement here (spec §1
/// scopes the library/metadata database and asset loading out of this crate).
pub trait RomLoader: Send + Sync {
    fn load(&self, game_id: &str) -> std::result::Result<Vec<u8>, String>;
    /// Best-effort NTSC/PAL heuristic (filename convention, header bytes,
    /// etc); `Launch` still applies any per-game override on top.
    fn region_hint(&self, game_id: &str) -> Region;
}

/// Constructs the emulator capability and detects its optional capabilities.
pub trait EmulatorFactory: Send + Sync {
    fn create(&self, rom: &[u8], region: Region) -> std::result::Result<LoadedEmulator, String>;
    /// Serialized state size, used to size the rewind ring; `0` disables rewind.
    fn state_size_hint(&self) -> usize;
}

struct ActiveSession {
    game_id: String,
    control: Arc<EmuControl>,
    input: Arc<SharedInput>,
    framebuffer: Arc<SharedFramebuffer>,
    emulator: Arc<Mutex<LoadedEmulator>>,
    audio_ring: Arc<playsession_core::audio_ring::AudioRingBuffer>,
    audio_player: Option<AudioPlayer>,
    renderer: FramebufferRenderer,
    turbo: Arc<TurboState>,
    auto_save: Arc<AutoSaveSlot>,
    rewind: Arc<Mutex<Option<RewindStore>>>,
    rumble: Arc<Mutex<Option<RumbleEngine>>>,
    save_state_manager: SaveStateManager,
    play_time: PlayTime,
    rewind_hold_frames: u32,
    worker: Option<std::thread::JoinHandle<()>>,
}

/// The single active gameplay instance (spec §3 `Session`).
pub struct GameplayManager {
    config: Config,
    notifier: Arc<dyn Notifier>,
    library: Arc<dyn LibraryRecorder>,
    rom_loader: Arc<dyn RomLoader>,
    emulator_factory: Arc<dyn EmulatorFactory>,
    achievements: Arc<dyn AchievementManager>,
    active: Option<ActiveSession>,
}

impl GameplayManager {
    pub fn new(
        config: Config,
        notifier: Arc<dyn Notifier>,
        library: Arc<dyn LibraryRecorder>,
        rom_loader: Arc<dyn RomLoader>,
        emulator_factory: Arc<dyn EmulatorFactory>,
        achievements: Arc<dyn AchievementManager>,
    ) -> Self {
        Self { config, notifier, library, rom_loader, emulator_factory, achievements, active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Loads `game_id`, wires up shared state and the worker, and starts it.
    /// Returns `false` on any construction failure, reported via `notifier`.
    pub fn launch(&mut self, game_id: &str, resume: bool) -> bool {
        match self.try_launch(game_id, resume) {
            Ok(()) => true,
            Err(err) => {
                self.notifier.notify(&format!("Failed to launch {game_id}: {err}"));
                tracing::warn!(game_id, %err, "launch failed");
                false
            }
        }
    }

    fn try_launch(&mut self, game_id: &str, resume: bool) -> Result<()> {
        let rom = self.rom_loader.load(game_id).map_err(Error::RomLoadFailure)?;
        // A per-game library override would take precedence here once the
        // library is wired up; for now the loader's heuristic decides.
        let region = self.rom_loader.region_hint(game_id);
        let loaded = self.emulator_factory.create(&rom, region).map_err(Error::EmulatorCreationFailure)?;

        let save_dir = self.config.read(|cfg| cfg.save_dir.clone());
        let save_state_manager = SaveStateManager::new(save_dir, game_id);

        let mut loaded = loaded;
        if let Some(battery) = loaded.battery.as_deref_mut() {
            let _ = save_state_manager.load_sram(battery);
        }

        let (rewind_buffer_mb, frame_step) = self.config.read(|cfg| (cfg.rewind_buffer_size_mb, cfg.rewind_frame_step));
        let state_size = self.emulator_factory.state_size_hint();
        let rewind = RewindStore::new(rewind_buffer_mb, state_size, frame_step);

        let rumble_path = save_state_manager.game_dir().parent().map(|p| p.join("rumble").join(format!("{game_id}.cht")));
        let rumble_engine = rumble_path.filter(|p| p.exists()).and_then(|path| {
            let parsed = std::fs::read_to_string(&path).map_err(|err| err.to_string()).and_then(|text| parse_cht(&text));
            match parsed {
                Ok(entries) => Some(entries),
                Err(err) => {
                    let err = playsession_core::Error::CHTParseError(err);
                    tracing::warn!(game_id, %err, "disabling rumble for this session");
                    None
                }
            }
        }).map(|entries| RumbleEngine::new(entries, false));

        if resume {
            if let Some(save_stater) = loaded.save_stater.as_deref_mut() {
                let _ = save_state_manager.load_resume(save_stater);
            }
        }

        if let Some(memory) = loaded.memory.as_ref() {
            self.achievements.set_emulator(Arc::clone(memory));
        }
        self.load_achievements(&rom, game_id);

        let emulator = Arc::new(Mutex::new(loaded));
        let control = Arc::new(EmuControl::new());
        let input = Arc::new(SharedInput::new());
        let framebuffer = Arc::new(SharedFramebuffer::new(MAX_NATIVE_W, MAX_NATIVE_H));
        let audio_ring = Arc::new(playsession_core::audio_ring::AudioRingBuffer::default());
        let turbo = Arc::new(TurboState::new());
        let auto_save = Arc::new(AutoSaveSlot::default());
        let rewind = Arc::new(Mutex::new(rewind));
        let rumble = Arc::new(Mutex::new(rumble_engine));

        let audio_player = match AudioPlayer::new(Arc::clone(&audio_ring)) {
            Ok(player) => Some(player),
            Err(err) => {
                tracing::warn!(%err, "audio unavailable; continuing without sound");
                None
            }
        };

        let handles = WorkerHandles {
            emulator: Arc::clone(&emulator),
            input: Arc::clone(&input),
            framebuffer: Arc::clone(&framebuffer),
            control: Arc::clone(&control),
            audio_ring: Arc::clone(&audio_ring),
            turbo: Arc::clone(&turbo),
            auto_save: Arc::clone(&auto_save),
            rewind: Arc::clone(&rewind),
            rumble: Arc::clone(&rumble),
            config: self.config.clone(),
            achievements: Arc::clone(&self.achievements),
        };
        let worker = emulation::spawn(EmulationWorker::new(handles, AUTO_SAVE_INTERVAL));

        let mut play_time = PlayTime::new();
        play_time.start(epoch_secs());

        self.active = Some(ActiveSession {
            game_id: game_id.to_string(),
            control,
            input,
            framebuffer,
            emulator,
            audio_ring,
            audio_player,
            renderer: FramebufferRenderer::new(MAX_NATIVE_W as u32, MAX_NATIVE_H as u32),
            turbo,
            auto_save,
            rewind,
            rumble,
            save_state_manager,
            play_time,
            rewind_hold_frames: 0,
            worker: Some(worker),
        });
        self.notifier.notify(&format!("Loaded {game_id}"));
        Ok(())
    }

    /// Blocks the caller up to `LOAD_GAME_TIMEOUT` (spec §4.8); a timeout or
    /// a backend failure is logged and otherwise ignored — achievements are
    /// a peripheral subsystem that degrades independently (spec §7).
    fn load_achievements(&self, rom: &[u8], game_id: &str) {
        let achievements = Arc::clone(&self.achievements);
        let rom = rom.to_vec();
        let game_id = game_id.to_string();
        let handle = std::thread::spawn(move || achievements.load_game(&rom, &game_id, None));
        match bounded_join(handle, LOAD_GAME_TIMEOUT) {
            Some(Ok(())) => {}
            Some(Err(err)) => tracing::warn!(%err, "achievement load failed; continuing without achievements"),
            None => {
                let err = Error::AchievementLoadTimeout(LOAD_GAME_TIMEOUT);
                tracing::warn!(%err, "continuing without achievements");
            }
        }
    }

    /// Host-thread input setter, forwarded to `SharedInput`.
    pub fn set_input(&self, player: usize, bitmask: u32) {
        if let Some(session) = &self.active {
            session.input.set(player, bitmask);
        }
    }

    /// Polls cached worker output and applies any pending host-triggered
    /// action. Returns `true` if this call opened the pause overlay.
    pub fn update(&mut self, rewind_held: bool) -> bool {
        let Some(session) = &mut self.active else { return false };

        if let Some(bytes) = session.auto_save.take() {
            if let Err(err) = session.save_state_manager.save_resume_data(&bytes) {
                tracing::warn!(%err, "auto-save write failed");
            }
        }

        if rewind_held {
            session.rewind_hold_frames += 1;
        } else {
            session.rewind_hold_frames = 0;
        }
        let items = rewind_items_for_hold_duration(session.rewind_hold_frames);
        if items > 0 {
            self.apply_rewind(items);
        }

        false
    }

    fn apply_rewind(&mut self, items: usize) {
        let Some(session) = &mut self.active else { return };
        session.control.request_pause();
        {
            let mut loaded = session.emulator.lock();
            let mut rewind_guard = session.rewind.lock();
            let loaded = &mut *loaded;
            let emulator = loaded.emulator.as_mut();
            if let (Some(rewind), Some(save_stater)) = (rewind_guard.as_mut(), loaded.save_stater.as_deref_mut()) {
                if rewind.rewind(emulator, save_stater, items) {
                    session.audio_ring.clear();
                }
            }
        }
        session.control.request_resume();
    }

    /// Reads the framebuffer snapshot and renders it into `screen`-sized pixels.
    pub fn draw(&mut self) -> Option<&image::RgbaImage> {
        let session = self.active.as_mut()?;
        let snapshot = session.framebuffer.read();
        session.renderer.draw(snapshot.pixels(), snapshot.stride(), snapshot.active_height());
        Some(session.renderer.screen())
    }

    pub fn cycle_turbo(&self) -> Option<u8> {
        let session = self.active.as_ref()?;
        let multiplier = session.turbo.cycle_multiplier();
        self.notifier.notify(&format!("Turbo x{multiplier}"));
        Some(multiplier)
    }

    pub fn save_slot(&mut self) -> Result<()> {
        let Some(session) = &mut self.active else { return Ok(()) };
        session.control.request_pause();
        let result = {
            let loaded = session.emulator.lock();
            match loaded.save_stater.as_deref() {
                Some(save_stater) => session.save_state_manager.save(save_stater, self.notifier.as_ref()),
                None => Ok(()),
            }
        };
        session.control.request_resume();
        Ok(result?)
    }

    pub fn load_slot(&mut self) -> Result<()> {
        let Some(session) = &mut self.active else { return Ok(()) };
        session.control.request_pause();
        let result = {
            let mut loaded = session.emulator.lock();
            match loaded.save_stater.as_deref_mut() {
                Some(save_stater) => session.save_state_manager.load(save_stater, self.notifier.as_ref()),
                None => Ok(()),
            }
        };
        if result.is_ok() {
            session.audio_ring.clear();
            if let Some(rumble) = session.rumble.lock().as_mut() {
                rumble.reset();
            }
        }
        session.control.request_resume();
        Ok(result?)
    }

    pub fn next_slot(&mut self) {
        if let Some(session) = &mut self.active {
            session.save_state_manager.next_slot(self.library.as_ref(), self.notifier.as_ref());
        }
    }

    pub fn previous_slot(&mut self) {
        if let Some(session) = &mut self.active {
            session.save_state_manager.previous_slot(self.library.as_ref(), self.notifier.as_ref());
        }
    }

    pub fn request_pause(&self) {
        if let Some(session) = &self.active {
            session.control.request_pause();
            if let Some(player) = &session.audio_player {
                let _ = player.pause();
            }
        }
    }

    pub fn request_resume(&self) {
        if let Some(session) = &self.active {
            session.control.request_resume();
            if let Some(player) = &session.audio_player {
                let _ = player.resume();
            }
        }
    }

    /// Orderly shutdown: stop worker, join it, wait on pending auto-save work,
    /// save battery/resume, free buffers (spec §5 cancellation & timeouts).
    pub fn exit(&mut self, save_resume: bool) {
        let Some(mut session) = self.active.take() else { return };

        session.control.stop();
        if let Some(worker) = session.worker.take() {
            if bounded_join(worker, WORKER_JOIN_TIMEOUT).is_none() {
                tracing::warn!("emulation worker did not join within the platform frame budget");
            }
        }

        if let Some(bytes) = wait_for_auto_save(&session.auto_save, AUTO_SAVE_DRAIN_TIMEOUT) {
            let _ = session.save_state_manager.save_resume_data(&bytes);
        }

        session.play_time.stop(epoch_secs());
        self.library.add_session_seconds(&session.game_id, session.play_time.session_seconds(epoch_secs()));

        let mut loaded = session.emulator.lock();
        if save_resume {
            if let Some(save_stater) = loaded.save_stater.as_deref() {
                let _ = session.save_state_manager.save_resume(save_stater);
            }
        }
        if let Some(battery) = loaded.battery.as_deref() {
            let _ = session.save_state_manager.save_sram(battery);
        }
        loaded.emulator.close();
        drop(loaded);
        self.achievements.unload_game();
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// `JoinHandle` has no native timed join; poll completion instead. Returns
/// `None` on timeout, leaking the handle (the thread keeps running).
fn bounded_join<T: Send + 'static>(handle: std::thread::JoinHandle<T>, timeout: Duration) -> Option<T> {
    let start = std::time::Instant::now();
    while !handle.is_finished() {
        if start.elapsed() >= timeout {
            return None;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    handle.join().ok()
}

fn wait_for_auto_save(slot: &AutoSaveSlot, timeout: Duration) -> Option<Vec<u8>> {
    let start = std::time::Instant::now();
    loop {
        if let Some(bytes) = slot.take() {
            return Some(bytes);
        }
        if start.elapsed() >= timeout {
            return None;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::NullAchievementManager;
    use crate::notify::NullNotifier;
    use playsession_core::emulator::{Emulator, Region as CoreRegion, Timing};
    use playsession_core::notify::NullLibraryRecorder;

    struct StubEmulator;
    impl Emulator for StubEmulator {
        fn run_frame(&mut self) {}
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
            Timing { fps: 60 }
        }
        fn set_region(&mut self, _region: CoreRegion) {}
        fn set_option(&mut self, _key: &str, _value: &str) {}
        fn close(&mut self) {}
    }

    struct StubRomLoader;
    impl RomLoader for StubRomLoader {
        fn load(&self, _game_id: &str) -> std::result::Result<Vec<u8>, String> {
            Ok(vec![0; 16])
        }
        fn region_hint(&self, _game_id: &str) -> Region {
            Region::Ntsc
        }
    }

    struct StubFactory;
    impl EmulatorFactory for StubFactory {
        fn create(&self, _rom: &[u8], _region: Region) -> std::result::Result<LoadedEmulator, String> {
            Ok(LoadedEmulator { emulator: Box::new(StubEmulator), save_stater: None, battery: None, memory: None })
        }
        fn state_size_hint(&self) -> usize {
            1024
        }
    }

    fn test_manager(save_dir: std::path::PathBuf) -> GameplayManager {
        let config = Config::default();
        config.write(|cfg| cfg.save_dir = save_dir);
        GameplayManager::new(
            config,
            Arc::new(NullNotifier),
            Arc::new(NullLibraryRecorder),
            Arc::new(StubRomLoader),
            Arc::new(StubFactory),
            Arc::new(NullAchievementManager),
        )
    }

    #[test]
    fn launch_then_exit_succeeds_without_a_real_rom() {
        let dir = std::env::temp_dir().join(format!("playsession-session-test-{}", std::process::id()));
        let mut manager = test_manager(dir.clone());
        assert!(!manager.is_active());
        assert!(manager.launch("game1", false));
        assert!(manager.is_active());
        manager.exit(false);
        assert!(!manager.is_active());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn update_is_a_no_op_when_idle() {
        let dir = std::env::temp_dir().join(format!("playsession-session-test-idle-{}", std::process::id()));
        let mut manager = test_manager(dir);
        assert!(!manager.update(false));
    }
}
