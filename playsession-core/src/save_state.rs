//! Slot/resume/battery persistence (spec §4.10, §6 disk layout).

use crate::emulator::{BatterySaver, SaveStater};
use crate::error::{Error, Result};
use crate::fs;
use crate::notify::{LibraryRecorder, Notifier};
use std::path::{Path, PathBuf};

pub const SLOT_COUNT: u8 = 10;

/// Owns the `<save_dir>/<game_id>/` layout for one loaded game: numbered
/// slots, the resume snapshot, and (optionally) battery-backed cartridge RAM.
pub struct SaveStateManager {
    root: PathBuf,
    game_id: String,
    slot: u8,
}

impl SaveStateManager {
    pub fn new(save_dir: impl Into<PathBuf>, game_id: impl Into<String>) -> Self {
        Self { root: save_dir.into(), game_id: game_id.into(), slot: 0 }
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    fn slot_path(&self, slot: u8) -> PathBuf {
        self.root.join(&self.game_id).join(format!("state-{slot}.state"))
    }

    fn resume_path(&self) -> PathBuf {
        self.root.join(&self.game_id).join("resume.state")
    }

    fn sram_path(&self) -> PathBuf {
        self.root.join(&self.game_id).join("cart.srm")
    }

    pub fn save(&self, save_stater: &dyn SaveStater, notifier: &dyn Notifier) -> Result<()> {
        let bytes = save_stater.serialize().map_err(Error::SerializeFailure)?;
        fs::save_raw(self.slot_path(self.slot), &bytes).map_err(Error::DiskWriteFailure)?;
        notifier.notify(&format!("Saved slot {}", self.slot));
        Ok(())
    }

    pub fn load(&self, save_stater: &mut dyn SaveStater, notifier: &dyn Notifier) -> Result<()> {
        let path = self.slot_path(self.slot);
        if !fs::exists(&path) {
            notifier.notify(&format!("No save in slot {}", self.slot));
            return Err(Error::SlotEmpty(self.slot));
        }
        let bytes = fs::load_raw(&path).map_err(Error::DiskWriteFailure)?;
        save_stater.deserialize(&bytes).map_err(Error::DeserializeFailure)?;
        Ok(())
    }

    pub fn next_slot(&mut self, recorder: &dyn LibraryRecorder, notifier: &dyn Notifier) {
        self.slot = (self.slot + 1) % SLOT_COUNT;
        recorder.set_save_slot(&self.game_id, self.slot);
        notifier.notify(&format!("Slot {}", self.slot));
    }

    pub fn previous_slot(&mut self, recorder: &dyn LibraryRecorder, notifier: &dyn Notifier) {
        self.slot = (self.slot + SLOT_COUNT - 1) % SLOT_COUNT;
        recorder.set_save_slot(&self.game_id, self.slot);
        notifier.notify(&format!("Slot {}", self.slot));
    }

    pub fn save_resume(&self, save_stater: &dyn SaveStater) -> Result<()> {
        let bytes = save_stater.serialize().map_err(Error::SerializeFailure)?;
        fs::save_raw(self.resume_path(), &bytes).map_err(Error::DiskWriteFailure)
    }

    pub fn load_resume(&self, save_stater: &mut dyn SaveStater) -> Result<()> {
        let path = self.resume_path();
        if !fs::exists(&path) {
            return Err(Error::SlotEmpty(255));
        }
        let bytes = fs::load_raw(&path).map_err(Error::DiskWriteFailure)?;
        save_stater.deserialize(&bytes).map_err(Error::DeserializeFailure)
    }

    /// Writes an already-serialized snapshot, used when the worker produces
    /// the bytes directly rather than through a `SaveStater` call here.
    pub fn save_resume_data(&self, bytes: &[u8]) -> Result<()> {
        fs::save_raw(self.resume_path(), bytes).map_err(Error::DiskWriteFailure)
    }

    pub fn save_sram(&self, battery: &dyn BatterySaver) -> Result<()> {
        if !battery.has_sram() {
            return Ok(());
        }
        fs::save_raw(self.sram_path(), &battery.get_sram()).map_err(Error::DiskWriteFailure)
    }

    /// Missing SRAM on load is not an error: a fresh cartridge simply has none yet.
    pub fn load_sram(&self, battery: &mut dyn BatterySaver) -> Result<()> {
        let path = self.sram_path();
        if !fs::exists(&path) {
            return Ok(());
        }
        let bytes = fs::load_raw(&path).map_err(Error::DiskWriteFailure)?;
        battery.set_sram(&bytes);
        Ok(())
    }

    pub fn game_dir(&self) -> PathBuf {
        self.root.join(&self.game_id)
    }

    pub fn screenshot_path(&self, unix_ts: u64) -> PathBuf {
        self.root_for("screenshots").join(&self.game_id).join(format!("{unix_ts}.png"))
    }

    fn root_for(&self, kind: &str) -> PathBuf {
        // `root` is `.../saves`; siblings live one level up.
        self.root.parent().map(|p| p.join(kind)).unwrap_or_else(|| Path::new(kind).to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NullLibraryRecorder, NullNotifier};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSaveStater {
        value: Cell<u8>,
        fail: bool,
    }

    impl SaveStater for StubSaveStater {
        fn serialize(&self) -> std::result::Result<Vec<u8>, String> {
            if self.fail {
                return Err("boom".into());
            }
            Ok(vec![self.value.get()])
        }
        fn deserialize(&mut self, bytes: &[u8]) -> std::result::Result<(), String> {
            self.value.set(*bytes.first().unwrap_or(&0));
            Ok(())
        }
    }

    struct StubBattery {
        sram: Option<Vec<u8>>,
    }

    impl BatterySaver for StubBattery {
        fn has_sram(&self) -> bool {
            self.sram.is_some()
        }
        fn get_sram(&self) -> Vec<u8> {
            self.sram.clone().unwrap_or_default()
        }
        fn set_sram(&mut self, bytes: &[u8]) {
            self.sram = Some(bytes.to_vec());
        }
    }

    fn temp_dir() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("playsession-savestate-test-{}-{id}", std::process::id()))
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = temp_dir();
        let manager = SaveStateManager::new(&dir, "game1");
        let stater = StubSaveStater { value: Cell::new(7), fail: false };
        manager.save(&stater, &NullNotifier).unwrap();
        let mut loaded = StubSaveStater { value: Cell::new(0), fail: false };
        manager.load(&mut loaded, &NullNotifier).unwrap();
        assert_eq!(loaded.value.get(), 7);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_slot_returns_slot_empty() {
        let dir = temp_dir();
        let manager = SaveStateManager::new(&dir, "game1");
        let mut stater = StubSaveStater { value: Cell::new(0), fail: false };
        let err = manager.load(&mut stater, &NullNotifier).unwrap_err();
        assert!(matches!(err, Error::SlotEmpty(0)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn next_and_previous_slot_cycle_modulo_ten() {
        let dir = temp_dir();
        let mut manager = SaveStateManager::new(&dir, "game1");
        for expected in 1..10 {
            manager.next_slot(&NullLibraryRecorder, &NullNotifier);
            assert_eq!(manager.slot(), expected);
        }
        manager.next_slot(&NullLibraryRecorder, &NullNotifier);
        assert_eq!(manager.slot(), 0);
        manager.previous_slot(&NullLibraryRecorder, &NullNotifier);
        assert_eq!(manager.slot(), 9);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sram_missing_on_load_is_not_an_error() {
        let dir = temp_dir();
        let manager = SaveStateManager::new(&dir, "game1");
        let mut battery = StubBattery { sram: None };
        assert!(manager.load_sram(&mut battery).is_ok());
        assert!(battery.sram.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sram_round_trips_when_present() {
        let dir = temp_dir();
        let manager = SaveStateManager::new(&dir, "game1");
        let battery = StubBattery { sram: Some(vec![1, 2, 3]) };
        manager.save_sram(&battery).unwrap();
        let mut loaded = StubBattery { sram: None };
        manager.load_sram(&mut loaded).unwrap();
        assert_eq!(loaded.sram, Some(vec![1, 2, 3]));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_resume_data_writes_raw_bytes() {
        let dir = temp_dir();
        let manager = SaveStateManager::new(&dir, "game1");
        manager.save_resume_data(&[9, 9, 9]).unwrap();
        let mut stater = StubSaveStater { value: Cell::new(0), fail: false };
        manager.load_resume(&mut stater).unwrap();
        assert_eq!(stater.value.get(), 9);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
