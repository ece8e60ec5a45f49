//! Streaming ("memory-swap") session state.
//!
//! A large frame may be drawn across several passes, each limited by a wall-clock
//! budget. The session carries the counters and flags that let a later pass resume
//! where the previous one stopped. The frame driver owns it and passes it by
//! reference into every draw call.

use std::cell::Cell;
use std::time::Instant;

use crate::brick::RENDER_PURPOSE_COUNT;
use crate::{RenderOptions, RenderPurpose, UpdateOrder};

/// Source of wall-clock milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// A clock that advances by a fixed step on every read, for deterministic budgets.
#[derive(Debug, Default)]
pub struct StepClock {
    now: Cell<u64>,
    step: u64,
}

impl StepClock {
    pub fn new(step: u64) -> Self {
        Self {
            now: Cell::new(0),
            step,
        }
    }

    /// Moves the clock without counting a read.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        let t = self.now.get() + self.step;
        self.now.set(t);
        t
    }
}

/// Scheduling state shared by every renderer taking part in a streamed frame.
#[derive(Debug, Clone)]
pub struct StreamingSession {
    pub mem_swap: bool,
    pub interactive: bool,
    pub start_update_loop: bool,
    pub done_update_loop: bool,

    /// Start of the current pass, in clock milliseconds.
    pub st_time: u64,
    /// Budget per pass, in milliseconds.
    pub up_time: u64,

    pub cur_brick_num: usize,
    pub total_brick_num: usize,
    pub cur_chan_brick_num: usize,
    pub finished_bricks: usize,

    pub done_current_chan: bool,
    pub clear_chan_buffer: bool,
    pub save_final_buffer: bool,
    pub done_loop: [bool; RENDER_PURPOSE_COUNT],

    /// Resume offset of the multi-volume sweep, relative to its start index.
    pub cur_tid_offset_multi: i32,

    pub update_order: UpdateOrder,
    pub blend_num_bits: u32,
}

impl Default for StreamingSession {
    fn default() -> Self {
        Self {
            mem_swap: false,
            interactive: false,
            start_update_loop: false,
            done_update_loop: true,
            st_time: 0,
            up_time: 100,
            cur_brick_num: 0,
            total_brick_num: 0,
            cur_chan_brick_num: 0,
            finished_bricks: 0,
            done_current_chan: true,
            clear_chan_buffer: false,
            save_final_buffer: false,
            done_loop: [false; RENDER_PURPOSE_COUNT],
            cur_tid_offset_multi: 0,
            update_order: UpdateOrder::BackToFront,
            blend_num_bits: 32,
        }
    }
}

impl StreamingSession {
    /// Creates an idle session configured from options.
    pub fn from_options(options: &RenderOptions) -> Self {
        Self {
            mem_swap: options.mem_swap,
            up_time: options.up_time_ms,
            update_order: options.update_order,
            blend_num_bits: options.blend_num_bits,
            ..Self::default()
        }
    }

    /// Returns true while a streamed frame is in progress.
    ///
    /// Drawn flags are only honored (and set) while this holds.
    pub fn is_streaming(&self) -> bool {
        self.mem_swap && self.start_update_loop && !self.done_update_loop
    }

    /// Starts a new streamed frame over `total_bricks` bricks.
    pub fn begin(&mut self, total_bricks: usize, now_ms: u64) {
        self.start_update_loop = true;
        self.done_update_loop = false;
        self.total_brick_num = total_bricks;
        self.cur_brick_num = 0;
        self.cur_chan_brick_num = 0;
        self.finished_bricks = 0;
        self.done_current_chan = false;
        self.clear_chan_buffer = false;
        self.save_final_buffer = false;
        self.done_loop = [false; RENDER_PURPOSE_COUNT];
        self.cur_tid_offset_multi = 0;
        self.st_time = now_ms;
        log::debug!("streaming frame started over {total_bricks} bricks");
    }

    /// Restarts the budget clock for the next pass of the same frame.
    pub fn begin_pass(&mut self, now_ms: u64) {
        self.st_time = now_ms;
        self.clear_chan_buffer = false;
        self.save_final_buffer = false;
    }

    /// Returns true when the current pass has used up its budget.
    pub fn budget_exceeded(&self, clock: &dyn Clock) -> bool {
        self.mem_swap && clock.now_ms().saturating_sub(self.st_time) > self.up_time
    }

    /// Back to idle. Callers must also clear brick drawn flags.
    pub fn reset(&mut self) {
        let mem_swap = self.mem_swap;
        let interactive = self.interactive;
        let up_time = self.up_time;
        let update_order = self.update_order;
        let blend_num_bits = self.blend_num_bits;
        *self = Self {
            mem_swap,
            interactive,
            up_time,
            update_order,
            blend_num_bits,
            ..Self::default()
        };
    }

    pub fn done_loop(&self, purpose: RenderPurpose) -> bool {
        self.done_loop[purpose.index()]
    }

    /// Records that one more brick of the frame has been retired.
    pub fn count_brick(&mut self) {
        self.cur_brick_num += 1;
    }

    /// Sets `done_update_loop` when every brick of the frame has been retired.
    pub fn update_done(&mut self) {
        if self.mem_swap && self.start_update_loop && self.cur_brick_num >= self.total_brick_num
        {
            self.done_update_loop = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_session_is_not_streaming() {
        let s = StreamingSession::default();
        assert!(!s.is_streaming());
    }

    #[test]
    fn test_begin_and_finish() {
        let mut s = StreamingSession {
            mem_swap: true,
            ..Default::default()
        };
        s.begin(2, 0);
        assert!(s.is_streaming());
        s.count_brick();
        s.update_done();
        assert!(!s.done_update_loop);
        s.count_brick();
        s.update_done();
        assert!(s.done_update_loop);
        assert!(!s.is_streaming());
    }

    #[test]
    fn test_budget_with_step_clock() {
        let clock = StepClock::new(10);
        let mut s = StreamingSession {
            mem_swap: true,
            up_time: 25,
            ..Default::default()
        };
        s.begin(5, 0);
        assert!(!s.budget_exceeded(&clock)); // 10
        assert!(!s.budget_exceeded(&clock)); // 20
        assert!(s.budget_exceeded(&clock)); // 30
    }

    #[test]
    fn test_reset_keeps_configuration() {
        let mut s = StreamingSession::from_options(&RenderOptions {
            mem_swap: true,
            up_time_ms: 40,
            ..Default::default()
        });
        s.begin(3, 5);
        s.count_brick();
        s.reset();
        assert!(s.mem_swap);
        assert_eq!(s.up_time, 40);
        assert_eq!(s.cur_brick_num, 0);
        assert!(!s.start_update_loop);
    }
}
