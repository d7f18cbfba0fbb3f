//! Synthetic backend.
//!
//! Produces a moving BGRX gradient (or a caller-supplied repeating byte
//! fill) with optional row padding, and lets tests inject a failure at
//! any stage. A shared [`Recorder`] counts every call so tests can observe
//! acquire/release pairing after the manager has been moved into a
//! session.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::debug;

use crate::types::copy_plane;
use crate::{
    CameraError, ColorImage, Device, ImageAccess, ImageData, ImageInfo, MirrorMode, PixelFormat,
    Projection, Result, Sample, SenseManager, StreamConfig, StreamKind,
};

/// Stage at which the synthetic device reports failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Create,
    EnableStream,
    Init,
    Device,
    Mirror,
    Projection,
    AcquireFrame,
    AcquireAccess,
}

#[derive(Debug, Default)]
struct RecorderState {
    faults:         HashSet<Fault>,
    acquire_frame:  u32,
    release_frame:  u32,
    acquire_access: u32,
    release_access: u32,
    close:          u32,
    last_wait_all:  Option<bool>,
}

/// Shared handle onto a synthetic manager's call counters and faults.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<RecorderState>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, fault: Fault) {
        self.0.borrow_mut().faults.insert(fault);
    }

    pub fn clear(&self, fault: Fault) {
        self.0.borrow_mut().faults.remove(&fault);
    }

    fn fails(&self, fault: Fault) -> bool {
        self.0.borrow().faults.contains(&fault)
    }

    fn check(&self, fault: Fault) -> Result<()> {
        if self.fails(fault) {
            Err(CameraError::Injected(fault))
        } else {
            Ok(())
        }
    }

    pub fn acquire_frame_calls(&self) -> u32 {
        self.0.borrow().acquire_frame
    }

    pub fn release_frame_calls(&self) -> u32 {
        self.0.borrow().release_frame
    }

    pub fn acquire_access_calls(&self) -> u32 {
        self.0.borrow().acquire_access
    }

    pub fn release_access_calls(&self) -> u32 {
        self.0.borrow().release_access
    }

    pub fn close_calls(&self) -> u32 {
        self.0.borrow().close
    }

    pub fn last_wait_all(&self) -> Option<bool> {
        self.0.borrow().last_wait_all
    }
}

/// How frames are filled.
#[derive(Debug, Clone)]
enum Fill {
    /// BGRX gradient that scrolls one step per frame.
    Gradient,
    /// Raw bytes repeated over the whole buffer, padding included.
    Repeat(Vec<u8>),
}

struct SyntheticImage {
    width:    u32,
    height:   u32,
    pitch:    u32,
    pixels:   Vec<u8>,
    held:     bool,
    recorder: Recorder,
}

impl ColorImage for SyntheticImage {
    fn info(&self) -> ImageInfo {
        ImageInfo { width: self.width, height: self.height, format: PixelFormat::Rgb32 }
    }

    fn acquire_access(&mut self, access: ImageAccess, format: PixelFormat) -> Result<ImageData> {
        self.recorder.0.borrow_mut().acquire_access += 1;
        self.recorder.check(Fault::AcquireAccess)?;
        if format != PixelFormat::Rgb32 {
            return Err(CameraError::UnsupportedFormat {
                requested: format,
                available: PixelFormat::Rgb32,
            });
        }
        if self.held {
            return Err(CameraError::AccessAlreadyHeld);
        }
        self.held = true;
        Ok(ImageData::new(access, format, self.pitch))
    }

    fn read_plane(&self, _data: &ImageData, plane: usize, len: usize) -> Result<Vec<u8>> {
        let bytes: &[u8] = if plane == 0 { &self.pixels } else { &[] };
        copy_plane(bytes, 0, len)
    }

    fn release_access(&mut self, _data: &ImageData) {
        self.recorder.0.borrow_mut().release_access += 1;
        self.held = false;
    }
}

struct SyntheticDevice {
    mirror:   MirrorMode,
    width:    u32,
    height:   u32,
    recorder: Recorder,
}

impl Device for SyntheticDevice {
    fn set_mirror_mode(&mut self, mode: MirrorMode) -> Result<()> {
        self.recorder.check(Fault::Mirror)?;
        self.mirror = mode;
        Ok(())
    }

    fn create_projection(&self) -> Result<Projection> {
        self.recorder.check(Fault::Projection)?;
        Ok(Projection { width: self.width, height: self.height, mirror: self.mirror })
    }
}

/// In-memory stand-in for a colour camera.
pub struct SyntheticSenseManager {
    recorder:    Recorder,
    fill:        Fill,
    row_padding: u32,
    with_color:  bool,
    config:      Option<StreamConfig>,
    device:      Option<SyntheticDevice>,
    image:       Option<SyntheticImage>,
    acquired:    bool,
    closed:      bool,
    frame_index: u64,
}

impl SyntheticSenseManager {
    /// Create a session reporting into `recorder`. Fails when
    /// [`Fault::Create`] is injected.
    pub fn create(recorder: &Recorder) -> Result<Self> {
        recorder.check(Fault::Create)?;
        Ok(Self {
            recorder:    recorder.clone(),
            fill:        Fill::Gradient,
            row_padding: 0,
            with_color:  true,
            config:      None,
            device:      None,
            image:       None,
            acquired:    false,
            closed:      false,
            frame_index: 0,
        })
    }

    /// Extra bytes at the end of every row.
    pub fn with_row_padding(mut self, bytes: u32) -> Self {
        self.row_padding = bytes;
        self
    }

    /// Fill every frame with `pattern` repeated byte for byte.
    pub fn with_fill(mut self, pattern: Vec<u8>) -> Self {
        if !pattern.is_empty() {
            self.fill = Fill::Repeat(pattern);
        }
        self
    }

    /// Deliver samples without a colour sub-frame.
    pub fn without_color(mut self) -> Self {
        self.with_color = false;
        self
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    fn render(&self, config: &StreamConfig) -> SyntheticImage {
        let pitch = config.width * PixelFormat::Rgb32.bytes_per_pixel() + self.row_padding;
        let len = (pitch * config.height) as usize;
        let pixels = match &self.fill {
            Fill::Repeat(pattern) => pattern.iter().copied().cycle().take(len).collect(),
            Fill::Gradient => {
                let mirror = self.device.as_ref().map_or(MirrorMode::Disabled, |d| d.mirror);
                let mut pixels = vec![0u8; len];
                let step = self.frame_index as u32;
                for y in 0..config.height {
                    let row = (y * pitch) as usize;
                    for x in 0..config.width {
                        let sx = match mirror {
                            MirrorMode::Horizontal => config.width - 1 - x,
                            MirrorMode::Disabled   => x,
                        };
                        let base = row + (x * 4) as usize;
                        pixels[base]     = sx.wrapping_add(step) as u8;    // B
                        pixels[base + 1] = y.wrapping_add(step) as u8;     // G
                        pixels[base + 2] = step.wrapping_mul(2) as u8;     // R
                        pixels[base + 3] = 0xff;                           // X
                    }
                }
                pixels
            }
        };
        SyntheticImage {
            width: config.width,
            height: config.height,
            pitch,
            pixels,
            held: false,
            recorder: self.recorder.clone(),
        }
    }
}

impl SenseManager for SyntheticSenseManager {
    fn enable_stream(&mut self, config: StreamConfig) -> Result<()> {
        self.recorder.check(Fault::EnableStream)?;
        if config.kind != StreamKind::Color {
            return Err(CameraError::UnsupportedStream(config.kind));
        }
        self.config = Some(config);
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        self.recorder.check(Fault::Init)?;
        let config = self.config.ok_or(CameraError::NoStreamEnabled)?;
        self.device = Some(SyntheticDevice {
            mirror:   MirrorMode::Disabled,
            width:    config.width,
            height:   config.height,
            recorder: self.recorder.clone(),
        });
        debug!("synthetic pipeline up: {}x{}@{}", config.width, config.height, config.fps);
        Ok(())
    }

    fn device(&mut self) -> Result<&mut dyn Device> {
        self.recorder.check(Fault::Device)?;
        match self.device.as_mut() {
            Some(device) => Ok(device),
            None => Err(CameraError::NotInitialized),
        }
    }

    fn acquire_frame(&mut self, wait_all: bool) -> Result<()> {
        {
            let mut state = self.recorder.0.borrow_mut();
            state.acquire_frame += 1;
            state.last_wait_all = Some(wait_all);
        }
        if self.closed {
            return Err(CameraError::Closed);
        }
        self.recorder.check(Fault::AcquireFrame)?;
        if self.acquired {
            return Err(CameraError::FrameAlreadyAcquired);
        }
        let config = match (&self.device, self.config) {
            (Some(_), Some(config)) => config,
            _ => return Err(CameraError::NotInitialized),
        };
        self.image = self.with_color.then(|| self.render(&config));
        self.acquired = true;
        self.frame_index += 1;
        Ok(())
    }

    fn sample(&mut self) -> Option<Sample<'_>> {
        if !self.acquired {
            return None;
        }
        Some(Sample {
            color: self.image.as_mut().map(|image| image as &mut dyn ColorImage),
        })
    }

    fn release_frame(&mut self) {
        self.recorder.0.borrow_mut().release_frame += 1;
        self.acquired = false;
        self.image = None;
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.recorder.0.borrow_mut().close += 1;
        self.closed = true;
        self.acquired = false;
        self.image = None;
        self.device = None;
    }
}
