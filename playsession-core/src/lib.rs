#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_compatibility, rust_2018_idioms, rust_2021_compatibility, unused)]

pub mod audio_ring;
pub mod emulator;
pub mod error;
pub mod fs;
pub mod notify;
pub mod play_time;
pub mod rewind;
pub mod rumble;
pub mod save_state;
pub mod shared;
pub mod turbo;

pub use error::{Error, Result};
