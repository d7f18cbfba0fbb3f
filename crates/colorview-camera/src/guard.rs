//! Scoped acquire/release pairs.

use crate::{ColorImage, ImageAccess, ImageData, ImageInfo, PixelFormat, Result, Sample, SenseManager};

/// An acquired frame. Dropping it releases the frame.
pub struct FrameGuard<'a, S: SenseManager + ?Sized> {
    manager: &'a mut S,
}

impl<'a, S: SenseManager + ?Sized> FrameGuard<'a, S> {
    /// Acquire the next frame. On error nothing was acquired and nothing
    /// will be released.
    pub fn acquire(manager: &'a mut S, wait_all: bool) -> Result<Self> {
        manager.acquire_frame(wait_all)?;
        Ok(Self { manager })
    }

    pub fn sample(&mut self) -> Option<Sample<'_>> {
        self.manager.sample()
    }
}

impl<S: SenseManager + ?Sized> Drop for FrameGuard<'_, S> {
    fn drop(&mut self) {
        self.manager.release_frame();
    }
}

/// Held access to an image's pixels. Dropping it releases access.
pub struct AccessGuard<'a, I: ColorImage + ?Sized> {
    image: &'a mut I,
    data:  ImageData,
}

impl<'a, I: ColorImage + ?Sized> AccessGuard<'a, I> {
    pub fn acquire(image: &'a mut I, access: ImageAccess, format: PixelFormat) -> Result<Self> {
        let data = image.acquire_access(access, format)?;
        Ok(Self { image, data })
    }

    pub fn info(&self) -> ImageInfo {
        self.image.info()
    }

    /// Row stride of plane 0.
    pub fn pitch(&self) -> u32 {
        self.data.pitches[0]
    }

    pub fn read_plane(&self, plane: usize, len: usize) -> Result<Vec<u8>> {
        self.image.read_plane(&self.data, plane, len)
    }
}

impl<I: ColorImage + ?Sized> Drop for AccessGuard<'_, I> {
    fn drop(&mut self) {
        self.image.release_access(&self.data);
    }
}
