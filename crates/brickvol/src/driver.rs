//! Frame driver for streamed rendering.
//!
//! A streamed frame moves `Idle -> Accumulating -> Done -> Idle`. [`FrameDriver::begin`]
//! starts it, each `draw_*` call is one budget-limited pass, and
//! [`FrameDriver::finish`] returns the session and the bricks' drawn flags to idle.

use brickvol_core::{Clock, RenderOptions, StreamingSession};
use brickvol_render::{FrameParams, MultiVolumeRenderer, RenderBackend, VolumeRenderer};

use crate::Result;

/// What the caller should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The frame is incomplete; draw another pass.
    Continue,
    /// Every brick has been drawn, or the frame was not streamed.
    Done,
}

/// Owns the streaming session and the clock its budget is measured with.
#[derive(Debug)]
pub struct FrameDriver<C: Clock> {
    session: StreamingSession,
    clock: C,
    passes: u32,
}

impl<C: Clock> FrameDriver<C> {
    pub fn new(options: &RenderOptions, clock: C) -> Self {
        Self {
            session: StreamingSession::from_options(options),
            clock,
            passes: 0,
        }
    }

    pub fn session(&self) -> &StreamingSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut StreamingSession {
        &mut self.session
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Passes drawn since the last [`begin`](Self::begin).
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Marks the user as interacting; streamed volumes then draw only their quota.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.session.interactive = interactive;
    }

    /// Starts a frame over the bricks the given renderers will retire.
    ///
    /// Call [`set_interactive`](Self::set_interactive) first: an interactive streamed
    /// frame only covers each volume's quota.
    pub fn begin(&mut self, renderers: &[&VolumeRenderer]) {
        let total = renderers
            .iter()
            .map(|vr| vr.frame_brick_count(&self.session))
            .sum();
        self.start(total);
    }

    /// Starts a frame over the bricks the merged renderer will retire.
    pub fn begin_multi(&mut self, mvr: &MultiVolumeRenderer) {
        let total = mvr.frame_brick_count(&self.session);
        self.start(total);
    }

    fn start(&mut self, total: usize) {
        self.passes = 0;
        self.session.begin(total, self.clock.now_ms());
        // Nothing to retire: the frame is complete before its first pass.
        self.session.update_done();
    }

    fn start_pass(&mut self) {
        if self.session.is_streaming() {
            self.session.begin_pass(self.clock.now_ms());
        }
        self.passes += 1;
    }

    fn outcome(&self) -> PassOutcome {
        if self.session.is_streaming() {
            PassOutcome::Continue
        } else {
            PassOutcome::Done
        }
    }

    /// Draws one pass of a single volume.
    pub fn draw_single<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        vr: &mut VolumeRenderer,
        frame: &FrameParams,
    ) -> Result<PassOutcome> {
        self.start_pass();
        vr.draw(backend, &mut self.session, &self.clock, frame)?;
        let outcome = self.outcome();
        log::debug!(
            "pass {}: {}/{} bricks, {outcome:?}",
            self.passes,
            self.session.cur_brick_num,
            self.session.total_brick_num
        );
        Ok(outcome)
    }

    /// Draws one pass of several interleaved volumes.
    pub fn draw_multi<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        mvr: &mut MultiVolumeRenderer,
        frame: &FrameParams,
    ) -> Result<PassOutcome> {
        self.start_pass();
        mvr.draw(backend, &mut self.session, &self.clock, frame)?;
        let outcome = self.outcome();
        log::debug!(
            "pass {}: {}/{} bricks, time index offset {}, {outcome:?}",
            self.passes,
            self.session.cur_brick_num,
            self.session.total_brick_num,
            self.session.cur_tid_offset_multi
        );
        Ok(outcome)
    }

    /// Returns the session and the renderers' bricks to idle.
    pub fn finish(&mut self, renderers: &mut [&mut VolumeRenderer]) {
        for vr in renderers.iter_mut() {
            if let Some(tex) = vr.texture_mut() {
                tex.reset_bricks();
            }
        }
        self.session.reset();
    }

    /// Returns the session and every member's bricks to idle.
    pub fn finish_multi(&mut self, mvr: &MultiVolumeRenderer) {
        for v in mvr.volumes() {
            match v.try_borrow_mut() {
                Ok(mut vr) => {
                    if let Some(tex) = vr.texture_mut() {
                        tex.reset_bricks();
                    }
                }
                Err(_) => log::warn!("volume is borrowed elsewhere, its drawn flags stay set"),
            }
        }
        self.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickvol_core::{StepClock, SystemClock, UVec3, VolumeTexture};
    use brickvol_render::RecordingBackend;

    #[test]
    fn test_unstreamed_frame_is_done_after_one_pass() {
        let options = RenderOptions::default();
        let mut driver = FrameDriver::new(&options, SystemClock::new());
        let mut vr = VolumeRenderer::new(VolumeTexture::from_grid(UVec3::splat(8), UVec3::splat(8)));
        vr.params.set_sampling_rate(0.1);
        let mut rb = RecordingBackend::default();
        driver.begin(&[&vr]);
        let outcome = driver
            .draw_single(&mut rb, &mut vr, &FrameParams::default())
            .unwrap();
        assert_eq!(outcome, PassOutcome::Done);
        assert_eq!(driver.passes(), 1);
    }

    #[test]
    fn test_finish_clears_drawn_flags() {
        let options = RenderOptions {
            mem_swap: true,
            up_time_ms: 1000,
            ..Default::default()
        };
        let mut driver = FrameDriver::new(&options, StepClock::new(1));
        let mut vr = VolumeRenderer::new(VolumeTexture::from_grid(UVec3::splat(8), UVec3::splat(4)));
        let mut rb = RecordingBackend::default();
        driver.begin(&[&vr]);
        assert_eq!(driver.session().total_brick_num, 8);
        while driver
            .draw_single(&mut rb, &mut vr, &FrameParams::default())
            .unwrap()
            == PassOutcome::Continue
        {
            assert!(driver.passes() < 50);
        }
        assert!(driver.session().done_update_loop);
        driver.finish(&mut [&mut vr]);
        assert!(!driver.session().start_update_loop);
        let tex = vr.texture().unwrap();
        assert!(tex
            .bricks()
            .iter()
            .all(|b| !b.drawn(brickvol_core::RenderPurpose::Normal)));
    }
}
