//! Host-level error kinds (spec §7).

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load ROM: {0}")]
    RomLoadFailure(String),
    #[error("failed to construct emulator: {0}")]
    EmulatorCreationFailure(String),
    #[error("no audio output device available: {0}")]
    AudioUnavailable(String),
    #[error("achievement load timed out after {0:?}")]
    AchievementLoadTimeout(std::time::Duration),
    #[error(transparent)]
    Core(#[from] playsession_core::Error),
}
