//! Lock-protected handoffs between the host thread and the emulation worker.

mod control;
mod framebuffer;
mod input;

pub use control::EmuControl;
pub use framebuffer::{FrameSnapshot, SharedFramebuffer};
pub use input::{SharedInput, MAX_PLAYERS};
