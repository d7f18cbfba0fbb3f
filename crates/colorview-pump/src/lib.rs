// colorview-pump/src/lib.rs
// ============================================================
// Frame pump for colorview
// Session init once → one frame cycle per render tick →
// session teardown once. No threads; the host drives ticks.
// ------------------------------------------------------------
// Public API
//   * FramePump::loaded / rendering / unloaded – lifecycle
//   * Session::initialize / teardown – device session
//   * FrameCycle::tick – acquire → convert → release
//   * BufferConverter::convert – sub-frame → Bitmap
// ============================================================

//! colorview – frame pump
//!
//! A failed acquisition skips the tick silently. A failed conversion
//! also skips the tick: the frame is released, a warning is logged and
//! the surface keeps showing the previous [`Bitmap`].

pub mod convert;
pub mod cycle;
pub mod pump;
pub mod session;
pub mod surface;

pub use convert::{Bitmap, BitmapFormat, BufferConverter, ConvertError, BITMAP_DPI};
pub use cycle::{CycleStats, FrameCycle, TickOutcome};
pub use pump::FramePump;
pub use session::{InitStage, Session, SessionError, COLOR_FPS, COLOR_HEIGHT, COLOR_STREAM, COLOR_WIDTH};
pub use surface::{DisplaySurface, ImageSurface};
