//! Device session: created once when the window loads, torn down once when
//! it unloads.

use std::fmt;

use colorview_camera::{CameraError, MirrorMode, Projection, SenseManager, StreamConfig};
use log::debug;
use thiserror::Error;

pub const COLOR_WIDTH:  u32 = 640;
pub const COLOR_HEIGHT: u32 = 480;
pub const COLOR_FPS:    u32 = 30;

/// The one stream this application ever enables.
pub const COLOR_STREAM: StreamConfig = StreamConfig::color(COLOR_WIDTH, COLOR_HEIGHT, COLOR_FPS);

/// Setup step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Create,
    EnableStream,
    PipelineInit,
    /// Device lookup, mirror mode or projection.
    Device,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStage::Create       => "session creation",
            InitStage::EnableStream => "enabling the color stream",
            InitStage::PipelineInit => "pipeline initialisation",
            InitStage::Device       => "device setup",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct SessionError {
    pub stage: InitStage,
    #[source]
    pub source: CameraError,
}

fn at<T>(stage: InitStage, result: colorview_camera::Result<T>) -> Result<T, SessionError> {
    result.map_err(|source| SessionError { stage, source })
}

/// Owns the manager and the projection helper built from its device.
pub struct Session<S: SenseManager> {
    manager:    Option<S>,
    projection: Option<Projection>,
}

impl<S: SenseManager> Session<S> {
    /// Create the manager with `create`, enable the colour stream, start the
    /// pipeline, mirror the device horizontally and build its projection.
    ///
    /// Any failure tears down whatever was already created.
    pub fn initialize<F>(create: F) -> Result<Self, SessionError>
    where
        F: FnOnce() -> colorview_camera::Result<S>,
    {
        let mut manager = at(InitStage::Create, create())?;
        match Self::setup(&mut manager) {
            Ok(projection) => {
                debug!(
                    "session up: {}x{}@{} mirror={:?}",
                    COLOR_WIDTH, COLOR_HEIGHT, COLOR_FPS, projection.mirror
                );
                Ok(Self { manager: Some(manager), projection: Some(projection) })
            }
            Err(e) => {
                manager.close();
                Err(e)
            }
        }
    }

    fn setup(manager: &mut S) -> Result<Projection, SessionError> {
        at(InitStage::EnableStream, manager.enable_stream(COLOR_STREAM))?;
        at(InitStage::PipelineInit, manager.init())?;

        let device = at(InitStage::Device, manager.device())?;
        at(InitStage::Device, device.set_mirror_mode(MirrorMode::Horizontal))?;
        at(InitStage::Device, device.create_projection())
    }

    pub fn is_active(&self) -> bool {
        self.manager.is_some()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    pub fn manager_mut(&mut self) -> Option<&mut S> {
        self.manager.as_mut()
    }

    /// Release the manager and projection. Repeat calls do nothing.
    pub fn teardown(&mut self) {
        if let Some(mut manager) = self.manager.take() {
            manager.close();
            debug!("session closed");
        }
        self.projection = None;
    }
}

impl<S: SenseManager> Drop for Session<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colorview_camera::{Fault, Recorder, SyntheticSenseManager};

    fn init(recorder: &Recorder) -> Result<Session<SyntheticSenseManager>, SessionError> {
        Session::initialize(|| SyntheticSenseManager::create(recorder))
    }

    #[test]
    fn initialize_mirrors_and_builds_projection() {
        let recorder = Recorder::new();
        let session = init(&recorder).unwrap();
        assert!(session.is_active());
        let projection = session.projection().unwrap();
        assert_eq!(projection.mirror, MirrorMode::Horizontal);
        assert_eq!((projection.width, projection.height), (COLOR_WIDTH, COLOR_HEIGHT));
    }

    #[test]
    fn each_setup_fault_reports_its_stage() {
        let cases = [
            (Fault::Create, InitStage::Create),
            (Fault::EnableStream, InitStage::EnableStream),
            (Fault::Init, InitStage::PipelineInit),
            (Fault::Device, InitStage::Device),
            (Fault::Mirror, InitStage::Device),
            (Fault::Projection, InitStage::Device),
        ];
        for (fault, stage) in cases {
            let recorder = Recorder::new();
            recorder.inject(fault);
            let err = init(&recorder).err().unwrap();
            assert_eq!(err.stage, stage, "fault {fault:?}");
            assert!(matches!(err.source, CameraError::Injected(f) if f == fault));
        }
    }

    #[test]
    fn failed_init_closes_created_manager() {
        let recorder = Recorder::new();
        recorder.inject(Fault::Init);
        assert!(init(&recorder).is_err());
        assert_eq!(recorder.close_calls(), 1);
    }

    #[test]
    fn failed_device_setup_closes_manager() {
        for fault in [Fault::Device, Fault::Mirror, Fault::Projection] {
            let recorder = Recorder::new();
            recorder.inject(fault);
            assert!(init(&recorder).is_err(), "fault {fault:?}");
            assert_eq!(recorder.close_calls(), 1, "fault {fault:?}");
        }
    }

    #[test]
    fn teardown_twice_closes_once() {
        let recorder = Recorder::new();
        let mut session = init(&recorder).unwrap();
        session.teardown();
        session.teardown();
        drop(session);
        assert_eq!(recorder.close_calls(), 1);
    }

    #[test]
    fn error_message_names_stage() {
        let recorder = Recorder::new();
        recorder.inject(Fault::EnableStream);
        let err = init(&recorder).err().unwrap();
        assert!(err.to_string().starts_with("enabling the color stream failed"));
    }
}
