//! Colour sub-frame → owned `Bgr32` bitmap.

use colorview_camera::{AccessGuard, CameraError, ColorImage, ImageAccess, PixelFormat};
use thiserror::Error;

use crate::surface::DisplaySurface;

pub const BITMAP_DPI: f64 = 96.0;

/// Bytes per pixel of every bitmap this crate builds.
const BGR32_BYTES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFormat {
    /// 4 bytes per pixel, B, G, R then an unused byte.
    Bgr32,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("color image access failed: {0}")]
    Access(#[source] CameraError),
    #[error("reading color pixels failed: {0}")]
    Read(#[source] CameraError),
    #[error("stride {stride} is smaller than a {width}px Bgr32 row")]
    StrideTooSmall { stride: u32, width: u32 },
    #[error("pixel buffer holds {actual} bytes, {expected} required")]
    ShortBuffer { expected: usize, actual: usize },
}

/// Read-only pixel snapshot. Owns its bytes; nothing ties it to the frame
/// it was copied from.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width:  u32,
    height: u32,
    dpi_x:  f64,
    dpi_y:  f64,
    format: BitmapFormat,
    stride: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn create(
        width: u32,
        height: u32,
        dpi_x: f64,
        dpi_y: f64,
        format: BitmapFormat,
        pixels: Vec<u8>,
        stride: u32,
    ) -> Result<Self, ConvertError> {
        if stride < width * BGR32_BYTES {
            return Err(ConvertError::StrideTooSmall { stride, width });
        }
        let expected = stride as usize * height as usize;
        if pixels.len() < expected {
            return Err(ConvertError::ShortBuffer { expected, actual: pixels.len() });
        }
        Ok(Self { width, height, dpi_x, dpi_y, format, stride, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dpi(&self) -> (f64, f64) {
        (self.dpi_x, self.dpi_y)
    }

    pub fn format(&self) -> BitmapFormat {
        self.format
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Visible bytes of row `y`, padding excluded.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = (y * self.stride) as usize;
        self.pixels.get(start..start + (self.width * BGR32_BYTES) as usize)
    }
}

/// Copies colour sub-frames out of the camera SDK.
#[derive(Debug, Clone)]
pub struct BufferConverter {
    format: PixelFormat,
}

impl Default for BufferConverter {
    fn default() -> Self {
        Self { format: PixelFormat::Rgb32 }
    }
}

impl BufferConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `image` as 32-bit RGB and copy `stride × height` bytes into a
    /// 96-DPI `Bgr32` bitmap. Read access is released before returning,
    /// on every path.
    pub fn convert<I: ColorImage + ?Sized>(&self, image: &mut I) -> Result<Bitmap, ConvertError> {
        let (info, stride, buffer) = {
            let access = AccessGuard::acquire(image, ImageAccess::Read, self.format)
                .map_err(ConvertError::Access)?;
            let info = access.info();
            let stride = access.pitch();
            let length = stride as usize * info.height as usize;
            let buffer = access.read_plane(0, length).map_err(ConvertError::Read)?;
            (info, stride, buffer)
        };

        Bitmap::create(
            info.width,
            info.height,
            BITMAP_DPI,
            BITMAP_DPI,
            BitmapFormat::Bgr32,
            buffer,
            stride,
        )
    }

    /// Convert `image` and make the result `surface`'s new source. On
    /// error the surface keeps its previous source.
    pub fn update<I, D>(&self, image: &mut I, surface: &mut D) -> Result<(), ConvertError>
    where
        I: ColorImage + ?Sized,
        D: DisplaySurface + ?Sized,
    {
        let bitmap = self.convert(image)?;
        surface.set_source(bitmap);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colorview_camera::{ImageData, ImageInfo};

    /// Hand-built colour image with explicit pitch and access bookkeeping.
    struct FakeImage {
        width:    u32,
        height:   u32,
        pitch:    u32,
        pixels:   Vec<u8>,
        deny:     bool,
        held:     bool,
        releases: u32,
    }

    impl FakeImage {
        fn new(width: u32, height: u32, pitch: u32) -> Self {
            let pixels = (0..pitch * height).map(|i| (i % 251) as u8).collect();
            Self { width, height, pitch, pixels, deny: false, held: false, releases: 0 }
        }
    }

    impl ColorImage for FakeImage {
        fn info(&self) -> ImageInfo {
            ImageInfo { width: self.width, height: self.height, format: PixelFormat::Rgb32 }
        }

        fn acquire_access(&mut self, access: ImageAccess, format: PixelFormat) -> colorview_camera::Result<ImageData> {
            if self.deny {
                return Err(CameraError::BufferMap);
            }
            self.held = true;
            Ok(ImageData::new(access, format, self.pitch))
        }

        fn read_plane(&self, _data: &ImageData, _plane: usize, len: usize) -> colorview_camera::Result<Vec<u8>> {
            assert!(self.held, "read without access");
            self.pixels
                .get(..len)
                .map(<[u8]>::to_vec)
                .ok_or(CameraError::OutOfBounds { offset: 0, len, available: self.pixels.len() })
        }

        fn release_access(&mut self, _data: &ImageData) {
            self.held = false;
            self.releases += 1;
        }
    }

    #[derive(Default)]
    struct Slot(Option<Bitmap>);

    impl DisplaySurface for Slot {
        fn set_source(&mut self, bitmap: Bitmap) {
            self.0 = Some(bitmap);
        }

        fn source(&self) -> Option<&Bitmap> {
            self.0.as_ref()
        }
    }

    #[test]
    fn bitmap_matches_frame_geometry() {
        let mut image = FakeImage::new(16, 4, 64);
        let bitmap = BufferConverter::new().convert(&mut image).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (16, 4));
        assert_eq!(bitmap.stride(), 64);
        assert_eq!(bitmap.pixels().len(), 64 * 4);
        assert_eq!(bitmap.dpi(), (96.0, 96.0));
        assert_eq!(bitmap.format(), BitmapFormat::Bgr32);
        assert_eq!(image.releases, 1);
        assert!(!image.held);
    }

    #[test]
    fn padded_stride_is_kept() {
        let mut image = FakeImage::new(10, 3, 48);
        let bitmap = BufferConverter::new().convert(&mut image).unwrap();
        assert_eq!(bitmap.stride(), 48);
        assert_eq!(bitmap.pixels(), &image.pixels[..]);
        assert_eq!(bitmap.row(1).unwrap(), &image.pixels[48..88]);
        assert!(bitmap.row(3).is_none());
    }

    #[test]
    fn denied_access_is_an_error_without_release() {
        let mut image = FakeImage::new(4, 4, 16);
        image.deny = true;
        let err = BufferConverter::new().convert(&mut image).unwrap_err();
        assert!(matches!(err, ConvertError::Access(_)));
        assert_eq!(image.releases, 0);
    }

    #[test]
    fn short_buffer_still_releases_access() {
        let mut image = FakeImage::new(4, 4, 16);
        image.pixels.truncate(40);
        let err = BufferConverter::new().convert(&mut image).unwrap_err();
        assert!(matches!(err, ConvertError::Read(CameraError::OutOfBounds { len: 64, .. })));
        assert_eq!(image.releases, 1);
        assert!(!image.held);
    }

    #[test]
    fn narrow_stride_is_rejected_after_release() {
        let mut image = FakeImage::new(8, 2, 16);
        let err = BufferConverter::new().convert(&mut image).unwrap_err();
        assert!(matches!(err, ConvertError::StrideTooSmall { stride: 16, width: 8 }));
        assert_eq!(image.releases, 1);
    }

    #[test]
    fn failed_update_keeps_previous_source() {
        let converter = BufferConverter::new();
        let mut surface = Slot::default();
        let mut good = FakeImage::new(4, 2, 16);
        converter.update(&mut good, &mut surface).unwrap();
        let before = surface.source().cloned();

        let mut bad = FakeImage::new(4, 2, 16);
        bad.deny = true;
        assert!(converter.update(&mut bad, &mut surface).is_err());
        assert_eq!(surface.source().cloned(), before);
    }
}
