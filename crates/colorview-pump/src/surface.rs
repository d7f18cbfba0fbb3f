use crate::convert::Bitmap;

/// Image element whose source is replaced on every rendered tick.
pub trait DisplaySurface {
    /// Replace the current source. The previous bitmap is dropped once the
    /// surface stops referencing it.
    fn set_source(&mut self, bitmap: Bitmap);

    fn source(&self) -> Option<&Bitmap>;
}

/// In-memory surface. The generation counter lets a host upload the
/// bitmap only when it changed.
#[derive(Debug, Default)]
pub struct ImageSurface {
    source:     Option<Bitmap>,
    generation: u64,
}

impl ImageSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the source has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl DisplaySurface for ImageSurface {
    fn set_source(&mut self, bitmap: Bitmap) {
        self.source = Some(bitmap);
        self.generation += 1;
    }

    fn source(&self) -> Option<&Bitmap> {
        self.source.as_ref()
    }
}
