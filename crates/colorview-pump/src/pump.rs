//! Window lifecycle glue.
//!
//! The host calls [`FramePump::loaded`] once, [`FramePump::rendering`] on
//! every render tick, and [`FramePump::unloaded`] once. Ticks only reach
//! the session while the pump is subscribed.

use colorview_camera::SenseManager;
use log::debug;

use crate::cycle::{CycleStats, FrameCycle, TickOutcome};
use crate::session::{Session, SessionError};
use crate::surface::{DisplaySurface, ImageSurface};

pub struct FramePump<S: SenseManager, D: DisplaySurface = ImageSurface> {
    session:    Option<Session<S>>,
    cycle:      FrameCycle,
    surface:    D,
    subscribed: bool,
}

impl<S: SenseManager, D: DisplaySurface> FramePump<S, D> {
    pub fn new(surface: D) -> Self {
        Self { session: None, cycle: FrameCycle::new(), surface, subscribed: false }
    }

    /// Initialise the session and subscribe to render ticks. On error the
    /// pump stays unsubscribed and no tick will ever run.
    pub fn loaded<F>(&mut self, create: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> colorview_camera::Result<S>,
    {
        self.unloaded();
        self.session = Some(Session::initialize(create)?);
        self.subscribed = true;
        debug!("subscribed to render ticks");
        Ok(())
    }

    /// Render-tick handler. `None` when not subscribed.
    pub fn rendering(&mut self) -> Option<TickOutcome> {
        if !self.subscribed {
            return None;
        }
        let manager = self.session.as_mut()?.manager_mut()?;
        Some(self.cycle.tick(manager, &mut self.surface))
    }

    /// Unsubscribe, then tear the session down. Safe to call repeatedly.
    pub fn unloaded(&mut self) {
        if self.subscribed {
            self.subscribed = false;
            debug!("unsubscribed from render ticks");
        }
        if let Some(mut session) = self.session.take() {
            session.teardown();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn session(&self) -> Option<&Session<S>> {
        self.session.as_ref()
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn stats(&self) -> CycleStats {
        self.cycle.stats()
    }
}

impl<S: SenseManager, D: DisplaySurface> Drop for FramePump<S, D> {
    fn drop(&mut self) {
        self.unloaded();
    }
}
