//! One render tick: acquire → read → convert → release.

use colorview_camera::{FrameGuard, SenseManager};
use log::{debug, info, trace, warn};

use crate::convert::{BufferConverter, ConvertError};
use crate::surface::DisplaySurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No frame this tick; nothing acquired, nothing released.
    Skipped,
    /// Frame acquired but its sample held no colour sub-frame.
    NoColor,
    /// Surface received a new bitmap.
    Rendered,
    /// Conversion failed; the frame was released and the surface kept its
    /// previous bitmap.
    ConvertFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub rendered: u64,
    pub skipped:  u64,
    pub no_color: u64,
    pub failed:   u64,
}

/// Runs ticks one at a time. `tick` takes `&mut self` and every acquired
/// frame lives in a guard scoped to the call, so a tick can neither overlap
/// another nor leave a frame held once it returns.
#[derive(Debug)]
pub struct FrameCycle {
    converter: BufferConverter,
    wait_all:  bool,
    stats:     CycleStats,
    failures:  u64,
}

impl Default for FrameCycle {
    fn default() -> Self {
        Self {
            converter: BufferConverter::new(),
            wait_all:  true,
            stats:     CycleStats::default(),
            failures:  0,
        }
    }
}

impl FrameCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Conversion failures since the last rendered frame.
    pub fn consecutive_failures(&self) -> u64 {
        self.failures
    }

    /// Run one tick against `manager`, rendering into `surface`.
    pub fn tick<S, D>(&mut self, manager: &mut S, surface: &mut D) -> TickOutcome
    where
        S: SenseManager + ?Sized,
        D: DisplaySurface + ?Sized,
    {
        let mut frame = match FrameGuard::acquire(manager, self.wait_all) {
            Ok(frame) => frame,
            Err(e) => {
                trace!("no frame this tick: {e}");
                self.stats.skipped += 1;
                return TickOutcome::Skipped;
            }
        };

        let outcome = match frame.sample().and_then(|sample| sample.color) {
            Some(color) => match self.converter.update(color, surface) {
                Ok(()) => TickOutcome::Rendered,
                Err(e) => {
                    self.conversion_failed(&e);
                    TickOutcome::ConvertFailed
                }
            },
            None => TickOutcome::NoColor,
        };
        drop(frame);

        match outcome {
            TickOutcome::Rendered => {
                if self.failures > 0 {
                    info!("rendering again after {} failed frames", self.failures);
                    self.failures = 0;
                }
                self.stats.rendered += 1;
            }
            TickOutcome::NoColor       => self.stats.no_color += 1,
            TickOutcome::ConvertFailed => self.stats.failed += 1,
            TickOutcome::Skipped       => {}
        }
        outcome
    }

    // At 30 fps a stuck stream would otherwise warn every frame.
    fn conversion_failed(&mut self, e: &ConvertError) {
        self.failures += 1;
        if self.failures == 1 {
            warn!("skipping frame: {e}");
        } else {
            debug!("skipping frame ({} in a row): {e}", self.failures);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::ImageSurface;
    use colorview_camera::{Fault, Recorder, SenseManager, SyntheticSenseManager};

    fn running(recorder: &Recorder) -> SyntheticSenseManager {
        let mut m = SyntheticSenseManager::create(recorder).unwrap();
        m.enable_stream(colorview_camera::StreamConfig::color(8, 4, 30)).unwrap();
        m.init().unwrap();
        m
    }

    #[test]
    fn repeated_failures_are_counted_until_a_frame_renders() {
        let recorder = Recorder::new();
        let mut m = running(&recorder);
        let mut surface = ImageSurface::new();
        let mut cycle = FrameCycle::new();

        recorder.inject(Fault::AcquireAccess);
        for n in 1..=3 {
            assert_eq!(cycle.tick(&mut m, &mut surface), TickOutcome::ConvertFailed);
            assert_eq!(cycle.consecutive_failures(), n);
        }

        recorder.clear(Fault::AcquireAccess);
        assert_eq!(cycle.tick(&mut m, &mut surface), TickOutcome::Rendered);
        assert_eq!(cycle.consecutive_failures(), 0);
        assert_eq!(cycle.stats().failed, 3);
        assert_eq!(recorder.release_frame_calls(), 4);
    }

    #[test]
    fn skipped_ticks_leave_failure_streak_alone() {
        let recorder = Recorder::new();
        let mut m = running(&recorder);
        let mut surface = ImageSurface::new();
        let mut cycle = FrameCycle::new();

        recorder.inject(Fault::AcquireAccess);
        cycle.tick(&mut m, &mut surface);
        recorder.inject(Fault::AcquireFrame);
        assert_eq!(cycle.tick(&mut m, &mut surface), TickOutcome::Skipped);
        assert_eq!(cycle.consecutive_failures(), 1);
    }
}
