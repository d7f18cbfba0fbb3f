//! GStreamer backend: `v4l2src` → `videoflip` → BGRx caps → `appsink`.
//!
//! The manager keeps the most recent sample between `acquire_frame` and
//! `release_frame`; access maps the sample's buffer read-only and
//! `release_access` unmaps it.

use gst::prelude::*;
use log::{debug, warn};

use std::time::{Duration, Instant};

use crate::types::copy_plane;
use crate::{
    CameraError, ColorImage, Device, ImageAccess, ImageData, ImageInfo, MirrorMode, PixelFormat,
    Projection, Result, Sample, SenseManager, StreamConfig, StreamKind,
};

const FLIP_NAME: &str = "mirror";
const SINK_NAME: &str = "sink";

/// How long `init` waits for the first buffer to reach the sink.
const START_TIMEOUT: Duration = Duration::from_secs(5);

struct GstDevice {
    flip:   gst::Element,
    mirror: MirrorMode,
    width:  u32,
    height: u32,
}

impl Device for GstDevice {
    fn set_mirror_mode(&mut self, mode: MirrorMode) -> Result<()> {
        let method = match mode {
            MirrorMode::Disabled   => "none",
            MirrorMode::Horizontal => "horizontal-flip",
        };
        self.flip.set_property_from_str("method", method);
        self.mirror = mode;
        Ok(())
    }

    fn create_projection(&self) -> Result<Projection> {
        Ok(Projection { width: self.width, height: self.height, mirror: self.mirror })
    }
}

struct GstColorImage {
    sample: gst::Sample,
    info:   ImageInfo,
    pitch:  u32,
    offset: usize,
    mapped: Option<gst::MappedBuffer<gst::buffer::Readable>>,
}

impl GstColorImage {
    fn from_sample(sample: gst::Sample) -> Result<Self> {
        let caps = sample.caps().ok_or(CameraError::MissingCaps)?;
        let video = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| CameraError::BadCaps(e.to_string()))?;
        if video.format() != gst_video::VideoFormat::Bgrx {
            return Err(CameraError::BadCaps(format!("format {:?}", video.format())));
        }

        // Prefer the buffer's own layout; upstream may pad rows or start
        // the plane past the first byte.
        let buffer = sample.buffer().ok_or(CameraError::MissingBuffer)?;
        let (stride, offset) = match buffer.meta::<gst_video::VideoMeta>() {
            Some(meta) => (meta.stride()[0], meta.offset()[0]),
            None => (video.stride()[0], video.offset()[0]),
        };

        Ok(Self {
            info: ImageInfo {
                width:  video.width(),
                height: video.height(),
                format: PixelFormat::Rgb32,
            },
            pitch: stride.max(0) as u32,
            offset,
            sample,
            mapped: None,
        })
    }
}

impl ColorImage for GstColorImage {
    fn info(&self) -> ImageInfo {
        self.info
    }

    fn acquire_access(&mut self, access: ImageAccess, format: PixelFormat) -> Result<ImageData> {
        if format != self.info.format {
            return Err(CameraError::UnsupportedFormat { requested: format, available: self.info.format });
        }
        if self.mapped.is_some() {
            return Err(CameraError::AccessAlreadyHeld);
        }
        let buffer = self.sample.buffer_owned().ok_or(CameraError::MissingBuffer)?;
        let mapped = buffer
            .into_mapped_buffer_readable()
            .map_err(|_| CameraError::BufferMap)?;
        self.mapped = Some(mapped);
        Ok(ImageData::new(access, format, self.pitch))
    }

    fn read_plane(&self, _data: &ImageData, plane: usize, len: usize) -> Result<Vec<u8>> {
        let mapped = self.mapped.as_ref().ok_or(CameraError::BufferMap)?;
        if plane != 0 {
            return copy_plane(&[], 0, len);
        }
        copy_plane(mapped.as_slice(), self.offset, len)
    }

    fn release_access(&mut self, _data: &ImageData) {
        // unmap
        self.mapped = None;
    }
}

/// Colour capture from a V4L2 device through GStreamer.
pub struct GstSenseManager {
    device_path: String,
    source:      String,
    config:      Option<StreamConfig>,
    pipeline:    Option<gst::Pipeline>,
    appsink:     Option<gst_app::AppSink>,
    device:      Option<GstDevice>,
    current:     Option<GstColorImage>,
    acquired:    bool,
}

impl GstSenseManager {
    /// Initialise GStreamer and create an idle manager for `device_path`.
    pub fn create(device_path: impl Into<String>) -> Result<Self> {
        gst::init().map_err(CameraError::GstInit)?;
        let device_path = device_path.into();
        Ok(Self {
            source:      format!("v4l2src device={device_path}"),
            device_path,
            config:      None,
            pipeline:    None,
            appsink:     None,
            device:      None,
            current:     None,
            acquired:    false,
        })
    }

    fn pipeline_description(&self, config: &StreamConfig) -> String {
        format!(
            "{src} ! videoconvert ! videoflip name={flip} method=none \
            ! video/x-raw,format=BGRx,width={w},height={h},framerate={f}/1 \
            ! appsink name={sink} max-buffers=1 drop=true sync=false",
            src = self.source,
            flip = FLIP_NAME,
            sink = SINK_NAME,
            w = config.width,
            h = config.height,
            f = config.fps,
        )
    }
}

/// Block until the pipeline reaches Playing or posts an error.
fn wait_for_preroll(pipeline: &gst::Pipeline) -> Result<()> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| CameraError::StreamError("pipeline has no bus".into()))?;
    let deadline = Instant::now() + START_TIMEOUT;

    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let timeout = gst::ClockTime::from_mseconds(left.as_millis() as u64);
        let msg = bus
            .timed_pop_filtered(
                timeout,
                &[gst::MessageType::Error, gst::MessageType::AsyncDone, gst::MessageType::StateChanged],
            )
            .ok_or(CameraError::StartTimeout(START_TIMEOUT))?;

        match msg.view() {
            gst::MessageView::Error(err) => {
                debug!("pipeline error details: {:?}", err.debug());
                return Err(CameraError::StreamError(err.error().to_string()));
            }
            gst::MessageView::AsyncDone(_) => return Ok(()),
            gst::MessageView::StateChanged(change)
                if msg.src() == Some(pipeline.upcast_ref::<gst::Object>())
                    && change.current() == gst::State::Playing =>
            {
                return Ok(())
            }
            _ => {}
        }
    }
}

impl SenseManager for GstSenseManager {
    fn enable_stream(&mut self, config: StreamConfig) -> Result<()> {
        if config.kind != StreamKind::Color {
            return Err(CameraError::UnsupportedStream(config.kind));
        }
        self.config = Some(config);
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        let config = self.config.ok_or(CameraError::NoStreamEnabled)?;
        let description = self.pipeline_description(&config);
        debug!("launching pipeline: {description}");

        let pipeline = gst::parse::launch(&description)
            .map_err(CameraError::ParsePipeline)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CameraError::NotPipeline)?;

        let appsink = pipeline
            .by_name(SINK_NAME)
            .ok_or(CameraError::ElementNotFound(SINK_NAME))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CameraError::ElementNotFound(SINK_NAME))?;

        let flip = pipeline
            .by_name(FLIP_NAME)
            .ok_or(CameraError::ElementNotFound(FLIP_NAME))?;

        if let Err(source) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(CameraError::StateChange { state: gst::State::Playing, source });
        }
        // A live source reports Playing before it has negotiated, so a bad
        // device or unsupported caps only shows up on the bus.
        if let Err(e) = wait_for_preroll(&pipeline) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(e);
        }

        self.device = Some(GstDevice {
            flip,
            mirror: MirrorMode::Disabled,
            width:  config.width,
            height: config.height,
        });
        self.appsink = Some(appsink);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn device(&mut self) -> Result<&mut dyn Device> {
        match self.device.as_mut() {
            Some(device) => Ok(device),
            None => Err(CameraError::NotInitialized),
        }
    }

    fn acquire_frame(&mut self, wait_all: bool) -> Result<()> {
        if self.acquired {
            return Err(CameraError::FrameAlreadyAcquired);
        }
        let appsink = self.appsink.as_ref().ok_or(CameraError::NotInitialized)?;

        let sample = if wait_all {
            appsink
                .pull_sample()
                .map_err(|e| CameraError::PullSample(e.to_string()))?
        } else {
            appsink
                .try_pull_sample(gst::ClockTime::ZERO)
                .ok_or_else(|| CameraError::PullSample("no sample ready".into()))?
        };

        // A sample we cannot interpret still counts as an acquired frame with
        // no colour sub-frame, so the caller's release stays balanced.
        self.current = match GstColorImage::from_sample(sample) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("dropping undecodable sample: {e}");
                None
            }
        };
        self.acquired = true;
        Ok(())
    }

    fn sample(&mut self) -> Option<Sample<'_>> {
        if !self.acquired {
            return None;
        }
        Some(Sample {
            color: self.current.as_mut().map(|image| image as &mut dyn ColorImage),
        })
    }

    fn release_frame(&mut self) {
        self.current = None;
        self.acquired = false;
    }

    fn close(&mut self) {
        self.release_frame();
        self.device = None;
        self.appsink = None;
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                warn!("pipeline did not stop cleanly: {e}");
            }
            debug!("pipeline for {} stopped", self.device_path);
        }
    }
}

impl Drop for GstSenseManager {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// videotestsrc stands in for the camera; capture_one (cargo test -- --ignored)
// needs a real V4L2 device
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessGuard, FrameGuard, DEFAULT_DEVICE};
    use serial_test::serial;

    #[test]
    fn color_stream_must_be_enabled_first() {
        let mut m = GstSenseManager::create(DEFAULT_DEVICE).expect("gst init");
        assert!(matches!(m.init(), Err(CameraError::NoStreamEnabled)));
        assert!(matches!(m.acquire_frame(true), Err(CameraError::NotInitialized)));
    }

    fn test_source(source: &str) -> GstSenseManager {
        let mut m = GstSenseManager::create(DEFAULT_DEVICE).expect("gst init");
        m.source = source.to_owned();
        m.enable_stream(StreamConfig::color(320, 240, 30)).expect("enable");
        m
    }

    #[test]
    #[serial]
    fn init_fails_when_caps_cannot_negotiate() {
        // Fixed source caps with no scaler in the chain cannot reach 320x240.
        let mut m = test_source("videotestsrc is-live=true ! video/x-raw,width=160,height=120");
        assert!(matches!(m.init(), Err(CameraError::StreamError(_))));
        assert!(m.pipeline.is_none());
        assert!(matches!(m.device(), Err(CameraError::NotInitialized)));
    }

    #[test]
    #[serial]
    fn init_waits_for_a_playing_source() {
        let mut m = test_source("videotestsrc is-live=true");
        m.init().expect("init");
        m.device().expect("device").set_mirror_mode(MirrorMode::Horizontal).expect("mirror");

        let mut frame = FrameGuard::acquire(&mut m, true).expect("frame");
        let sample = frame.sample().expect("sample");
        let color = sample.color.expect("color");
        let access = AccessGuard::acquire(color, ImageAccess::Read, PixelFormat::Rgb32).expect("access");
        let len = (access.pitch() * access.info().height) as usize;
        assert_eq!(access.read_plane(0, len).expect("pixels").len(), len);
    }

    #[test]
    #[ignore]
    #[serial]
    fn capture_one() {
        let mut m = GstSenseManager::create(DEFAULT_DEVICE).expect("create");
        m.enable_stream(StreamConfig::color(640, 480, 30)).expect("enable");
        m.init().expect("init");
        m.device().expect("device").set_mirror_mode(MirrorMode::Horizontal).expect("mirror");

        let mut frame = FrameGuard::acquire(&mut m, true).expect("frame");
        let sample = frame.sample().expect("sample");
        let color = sample.color.expect("color");
        let access = AccessGuard::acquire(color, ImageAccess::Read, PixelFormat::Rgb32).expect("access");
        let info = access.info();
        println!("{}x{} stride {} bytes", info.width, info.height, access.pitch());
        assert_eq!(info.width, 640);
        assert!(access.pitch() >= 640 * 4);
    }
}
