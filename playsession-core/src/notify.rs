//! External collaborators for user-facing messages and library persistence
//! (spec: ADDED §4, §3 — "persisted into the per-game library entry").

/// Delivers a short human-readable status message. Implemented by the host;
/// this crate never renders anything itself.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// A `Notifier` that discards every message, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}

/// Per-game library bookkeeping the save-state manager and play-time tracker
/// flush into, out of scope for this crate's own persistence (spec §1).
pub trait LibraryRecorder: Send + Sync {
    fn set_save_slot(&self, game_id: &str, slot: u8);
    fn add_session_seconds(&self, game_id: &str, seconds: u64);
}

/// A `LibraryRecorder` that discards every update, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLibraryRecorder;

impl LibraryRecorder for NullLibraryRecorder {
    fn set_save_slot(&self, _game_id: &str, _slot: u8) {}
    fn add_session_seconds(&self, _game_id: &str, _seconds: u64) {}
}
