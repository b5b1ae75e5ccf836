#![warn(
    clippy::all,
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2018_idioms,
    rust_2021_compatibility,
    unused
)]

pub mod achievements;
pub mod audio;
pub mod config;
pub mod emulation;
pub mod error;
pub mod logging;
pub mod notify;
pub mod renderer;
pub mod session;

pub use error::{Error, Result};
