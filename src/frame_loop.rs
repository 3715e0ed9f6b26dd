use std::time::Duration;

use crate::{
    error::LoopcardResult,
    params::ParameterSet,
    render,
    surface::Surface,
    text::Typeface,
};

/// The live-preview loop: owns the card surface and repaints it on every
/// tick from the current parameter snapshot.
///
/// The loop establishes its own time zero at the first tick. Cancelling is
/// final: after [`FrameLoop::cancel`] no tick will ever paint again, which
/// is the teardown guarantee the capture side relies on.
pub struct FrameLoop {
    surface: Surface,
    params: ParameterSet,
    face: Option<Typeface>,
    started_at: Option<Duration>,
    cancelled: bool,
    ticks: u64,
}

impl FrameLoop {
    pub fn new(params: ParameterSet, face: Option<Typeface>) -> Self {
        Self {
            surface: Surface::card(),
            params,
            face,
            started_at: None,
            cancelled: false,
            ticks: 0,
        }
    }

    /// Replace the parameter snapshot. Takes effect on the next tick; a
    /// capture in flight keeps recording whatever the loop paints, so live
    /// edits show up in the exported clip.
    pub fn set_params(&mut self, params: ParameterSet) {
        self.params = params;
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Paint one frame for the given instant. Returns `false` (and paints
    /// nothing) once cancelled.
    pub fn tick(&mut self, now: Duration) -> LoopcardResult<bool> {
        if self.cancelled {
            return Ok(false);
        }
        let started = *self.started_at.get_or_insert(now);
        let t = now.saturating_sub(started).as_secs_f64();
        render::render_frame(&mut self.surface, &self.params, self.face.as_ref(), t)?;
        self.ticks += 1;
        Ok(true)
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
