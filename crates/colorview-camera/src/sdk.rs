//! Backend seam.
//!
//! The shape follows a vendor capture SDK: a manager owns the pipeline,
//! hands out the active device after `init`, and exposes one composite
//! sample between `acquire_frame` and `release_frame`. Anything that
//! fails returns `Err` instead of a status code to compare against.

use crate::{ImageAccess, ImageData, ImageInfo, MirrorMode, PixelFormat, Projection, Result, StreamConfig};

/// A colour sub-frame. Pixels are readable only while access is held.
pub trait ColorImage {
    fn info(&self) -> ImageInfo;

    /// Map the pixels for `access` in `format`.
    fn acquire_access(&mut self, access: ImageAccess, format: PixelFormat) -> Result<ImageData>;

    /// Copy `len` bytes of plane `plane` starting at its first row, which
    /// need not be the first byte of the underlying buffer.
    fn read_plane(&self, data: &ImageData, plane: usize, len: usize) -> Result<Vec<u8>>;

    fn release_access(&mut self, data: &ImageData);
}

/// Composite sample for the currently acquired frame.
pub struct Sample<'a> {
    pub color: Option<&'a mut dyn ColorImage>,
}

pub trait Device {
    fn set_mirror_mode(&mut self, mode: MirrorMode) -> Result<()>;
    fn create_projection(&self) -> Result<Projection>;
}

pub trait SenseManager {
    /// Request a stream. Must be called before [`init`](Self::init).
    fn enable_stream(&mut self, config: StreamConfig) -> Result<()>;

    /// Finalise the pipeline and start streaming.
    fn init(&mut self) -> Result<()>;

    /// Active device; only available after a successful `init`.
    fn device(&mut self) -> Result<&mut dyn Device>;

    /// Block until the next frame is ready. With `wait_all` every enabled
    /// stream must have delivered, otherwise whatever is ready is returned.
    fn acquire_frame(&mut self, wait_all: bool) -> Result<()>;

    /// Sample of the acquired frame, `None` outside acquire/release.
    fn sample(&mut self) -> Option<Sample<'_>>;

    fn release_frame(&mut self);

    /// Stop streaming and drop every backend resource. Safe to repeat.
    fn close(&mut self);
}
