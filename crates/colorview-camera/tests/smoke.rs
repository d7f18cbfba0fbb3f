use colorview_camera::{
    AccessGuard, Fault, FrameGuard, ImageAccess, PixelFormat, Recorder, SenseManager, StreamConfig,
    SyntheticSenseManager,
};

#[test]
fn synthetic_smoke() -> anyhow::Result<()> {
    let recorder = Recorder::new();
    let mut cam = SyntheticSenseManager::create(&recorder)?.with_row_padding(16);
    cam.enable_stream(StreamConfig::color(640, 480, 30))?;
    cam.init()?;

    for _ in 0..3 {
        let mut frame = FrameGuard::acquire(&mut cam, true)?;
        let sample = frame.sample().expect("sample while acquired");
        let color = sample.color.expect("color sub-frame");
        let access = AccessGuard::acquire(color, ImageAccess::Read, PixelFormat::Rgb32)?;
        let info = access.info();
        assert_eq!((info.width, info.height), (640, 480));
        assert_eq!(access.pitch(), 640 * 4 + 16);
        let bytes = access.read_plane(0, (access.pitch() * info.height) as usize)?;
        assert_eq!(bytes.len(), (640 * 4 + 16) * 480);
    }

    assert_eq!(recorder.acquire_frame_calls(), 3);
    assert_eq!(recorder.release_frame_calls(), 3);
    assert_eq!(recorder.acquire_access_calls(), 3);
    assert_eq!(recorder.release_access_calls(), 3);
    Ok(())
}

#[test]
fn failed_acquire_never_releases() {
    let recorder = Recorder::new();
    let mut cam = SyntheticSenseManager::create(&recorder).unwrap();
    cam.enable_stream(StreamConfig::color(640, 480, 30)).unwrap();
    cam.init().unwrap();
    recorder.inject(Fault::AcquireFrame);

    assert!(FrameGuard::acquire(&mut cam, true).is_err());
    assert_eq!(recorder.acquire_frame_calls(), 1);
    assert_eq!(recorder.release_frame_calls(), 0);
    assert!(cam.sample().is_none());
}

#[test]
fn failed_access_never_releases() {
    let recorder = Recorder::new();
    let mut cam = SyntheticSenseManager::create(&recorder).unwrap();
    cam.enable_stream(StreamConfig::color(64, 48, 30)).unwrap();
    cam.init().unwrap();
    recorder.inject(Fault::AcquireAccess);

    {
        let mut frame = FrameGuard::acquire(&mut cam, true).unwrap();
        let sample = frame.sample().unwrap();
        assert!(AccessGuard::acquire(sample.color.unwrap(), ImageAccess::Read, PixelFormat::Rgb32).is_err());
    }
    assert_eq!(recorder.release_access_calls(), 0);
    assert_eq!(recorder.release_frame_calls(), 1);
}
