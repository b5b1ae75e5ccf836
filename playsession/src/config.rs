//! Runtime configuration shared between the host thread and the emulation
//! worker. Grounded in `tetanes`'s `self.config.read(|cfg| ...)` /
//! `self.config.write(|cfg| ...)` call pattern — each side only ever holds
//! the lock for the duration of one closure.

use playsession_core::emulator::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigInner {
    pub region: Region,
    pub target_fps: u32,
    pub rewind_enabled: bool,
    pub rewind_buffer_size_mb: f64,
    pub rewind_frame_step: u32,
    pub fast_forward_mute: bool,
    pub rumble_enabled: bool,
    pub rumble_level: u8,
    pub save_dir: PathBuf,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            region: Region::Ntsc,
            target_fps: 60,
            rewind_enabled: true,
            rewind_buffer_size_mb: 8.0,
            rewind_frame_step: 2,
            fast_forward_mute: true,
            rumble_enabled: true,
            rumble_level: 2,
            save_dir: dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("playsession").join("saves"),
        }
    }
}

/// Cheap-to-clone handle around a shared, lock-protected `ConfigInner`.
#[derive(Debug, Clone)]
pub struct Config {
    inner: Arc<RwLock<ConfigInner>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(ConfigInner::default())
    }
}

impl Config {
    pub fn new(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(RwLock::new(inner)) }
    }

    pub fn read<T>(&self, f: impl FnOnce(&ConfigInner) -> T) -> T {
        f(&self.inner.read().expect("config lock poisoned"))
    }

    pub fn write<T>(&self, f: impl FnOnce(&mut ConfigInner) -> T) -> T {
        f(&mut self.inner.write().expect("config lock poisoned"))
    }

    /// Loads from `path` if present, falling back to defaults on any error
    /// (a malformed config file should never prevent launch).
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path).ok().and_then(|s| serde_json::from_str(&s).ok()) {
            Some(inner) => Self::new(inner),
            None => Self::default(),
        }
    }

    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = self.read(|cfg| serde_json::to_string_pretty(cfg)).map_err(std::io::Error::other)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(tmp, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trips() {
        let config = Config::default();
        config.write(|cfg| cfg.rumble_level = 5);
        assert_eq!(config.read(|cfg| cfg.rumble_level), 5);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = Config::load(std::path::Path::new("/nonexistent/playsession-config.json"));
        assert_eq!(config.read(|cfg| cfg.target_fps), 60);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("playsession-config-test-{}", std::process::id()));
        let path = dir.join("config.json");
        let config = Config::default();
        config.write(|cfg| cfg.rewind_frame_step = 9);
        config.save(&path).unwrap();
        let loaded = Config::load(&path);
        assert_eq!(loaded.read(|cfg| cfg.rewind_frame_step), 9);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
