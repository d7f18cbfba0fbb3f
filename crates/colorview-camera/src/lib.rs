// colorview-camera/src/lib.rs
// ============================================================
// Camera session layer for colorview
// Models a vendor-style capture SDK (manager → device → sample
// → image) as traits, with every manual acquire/release pair
// wrapped in a scoped guard.
// ------------------------------------------------------------
// Public API:
//   * SenseManager / Device / ColorImage – the backend seam
//   * FrameGuard / AccessGuard – release on every exit path
//   * GstSenseManager – v4l2 capture via GStreamer (feature "gst")
//   * SyntheticSenseManager – test pattern + fault injection
// ------------------------------------------------------------
// Build notes
//   * The GStreamer backend needs the gstreamer-1.0 dev packages.
//   * `--no-default-features` builds without them.
// ============================================================

//! colorview – camera session layer
//!
//! A backend hands out one composite [`Sample`] per acquired frame. The
//! colour sub-frame inside it is a [`ColorImage`] whose pixels can only be
//! read between [`ColorImage::acquire_access`] and
//! [`ColorImage::release_access`]. Callers should go through
//! [`FrameGuard`] and [`AccessGuard`] instead of pairing those calls by
//! hand.

use thiserror::Error;

mod guard;
mod sdk;
pub mod synthetic;
mod types;

#[cfg(feature = "gst")]
pub mod v4l2;

pub use guard::{AccessGuard, FrameGuard};
pub use sdk::{ColorImage, Device, Sample, SenseManager};
pub use synthetic::{Fault, Recorder, SyntheticSenseManager};
pub use types::{
    ImageAccess, ImageData, ImageInfo, MirrorMode, PixelFormat, Projection, StreamConfig,
    StreamKind,
};

#[cfg(feature = "gst")]
pub use v4l2::GstSenseManager;

/// Video device the GStreamer backend opens unless told otherwise.
pub const DEFAULT_DEVICE: &str = "/dev/video0";

#[derive(Error, Debug)]
pub enum CameraError {
    #[cfg(feature = "gst")]
    #[error("GStreamer init failed: {0}")]
    GstInit(#[source] ::gst::glib::Error),
    #[cfg(feature = "gst")]
    #[error("Failed to parse pipeline: {0}")]
    ParsePipeline(#[source] ::gst::glib::Error),
    #[cfg(feature = "gst")]
    #[error("Failed to set pipeline to {state:?}: {source}")]
    StateChange {
        state: ::gst::State,
        #[source]
        source: ::gst::StateChangeError,
    },
    #[cfg(feature = "gst")]
    #[error("Stream failed to start: {0}")]
    StreamError(String),
    #[cfg(feature = "gst")]
    #[error("Pipeline did not preroll within {0:?}")]
    StartTimeout(std::time::Duration),
    #[error("Pipeline is not a gst::Pipeline")]
    NotPipeline,
    #[error("Element `{0}` not found in pipeline")]
    ElementNotFound(&'static str),
    #[error("Failed to pull sample: {0}")]
    PullSample(String),
    #[error("Sample has no buffer")]
    MissingBuffer,
    #[error("Sample has no caps")]
    MissingCaps,
    #[error("Caps are not raw video: {0}")]
    BadCaps(String),
    #[error("Buffer map failed")]
    BufferMap,
    #[error("Stream {0:?} is not supported by this backend")]
    UnsupportedStream(StreamKind),
    #[error("Pixel format {requested:?} not available (stream delivers {available:?})")]
    UnsupportedFormat {
        requested: PixelFormat,
        available: PixelFormat,
    },
    #[error("No stream enabled before init")]
    NoStreamEnabled,
    #[error("Pipeline not initialised")]
    NotInitialized,
    #[error("Session already closed")]
    Closed,
    #[error("A frame is already acquired")]
    FrameAlreadyAcquired,
    #[error("Image access already held")]
    AccessAlreadyHeld,
    #[error("Read of {len} bytes at {offset} exceeds plane of {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },
    #[error("Device reported failure at {0:?}")]
    Injected(Fault),
}

pub type Result<T> = std::result::Result<T, CameraError>;
