//! Achievement memory-inspection hook (spec §4.8): an external collaborator
//! the worker drives once per frame, decoupled from any specific backend.

use playsession_core::emulator::MemoryInspector;
use std::sync::Arc;
use std::time::Duration;

pub const LOAD_GAME_TIMEOUT: Duration = Duration::from_secs(30);

/// The achievement backend's contract. A real implementation identifies the
/// loaded game (by hash or path), tracks per-game achievement state, and
/// reads memory through the routed [`MemoryInspector`].
pub trait AchievementManager: Send + Sync {
    fn set_emulator(&self, memory_inspector: Arc<dyn MemoryInspector + Send + Sync>);
    /// Identifies and prepares per-game state. Implementations must bound
    /// their own work to [`LOAD_GAME_TIMEOUT`] and return promptly on overrun.
    fn load_game(&self, rom: &[u8], path: &str, precomputed_md5: Option<&str>) -> Result<(), String>;
    fn do_frame(&self);
    fn idle(&self);
    fn unload_game(&self);
}

/// No-op backend for sessions launched without achievement support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAchievementManager;

impl AchievementManager for NullAchievementManager {
    fn set_emulator(&self, _memory_inspector: Arc<dyn MemoryInspector + Send + Sync>) {}
    fn load_game(&self, _rom: &[u8], _path: &str, _precomputed_md5: Option<&str>) -> Result<(), String> {
        Ok(())
    }
    fn do_frame(&self) {}
    fn idle(&self) {}
    fn unload_game(&self) {}
}
