//! Plain value types shared by every backend.

/// Data channel a session can enable. Only colour is consumed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Color,
    Depth,
}

/// Requested stream: kind, resolution and frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub kind:   StreamKind,
    pub width:  u32,
    pub height: u32,
    pub fps:    u32,
}

impl StreamConfig {
    pub const fn color(width: u32, height: u32, fps: u32) -> Self {
        Self { kind: StreamKind::Color, width, height, fps }
    }
}

/// Pixel layouts an image can be accessed as.
///
/// `Rgb32` follows the vendor naming: 4 bytes per pixel stored B, G, R, X
/// in memory, which is what a `Bgr32` bitmap expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb32,
    Yuy2,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgb32 => 4,
            PixelFormat::Yuy2  => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAccess {
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorMode {
    #[default]
    Disabled,
    Horizontal,
}

/// Size and native format of an image, readable without access rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width:  u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Result of a successful access request.
///
/// Holds no pixels itself; bytes are read back through
/// [`ColorImage::read_plane`](crate::ColorImage::read_plane) while access
/// is held. `pitches[p]` is the row stride of plane `p` in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub access:  ImageAccess,
    pub format:  PixelFormat,
    pub pitches: [u32; 4],
}

impl ImageData {
    pub fn new(access: ImageAccess, format: PixelFormat, pitch: u32) -> Self {
        Self { access, format, pitches: [pitch, 0, 0, 0] }
    }
}

/// Coordinate-projection helper created from the active device.
///
/// Colour-only capture never projects anything; the handle is kept so the
/// session owns the same set of device objects a depth-aware caller would.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub width:  u32,
    pub height: u32,
    pub mirror: MirrorMode,
}

/// Copy `len` bytes of a plane that starts `offset` bytes into `bytes`.
pub(crate) fn copy_plane(bytes: &[u8], offset: usize, len: usize) -> crate::Result<Vec<u8>> {
    let available = bytes.len().saturating_sub(offset);
    if len > available {
        return Err(crate::CameraError::OutOfBounds { offset, len, available });
    }
    Ok(bytes[offset..offset + len].to_vec())
}
