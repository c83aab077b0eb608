//! Simulation clock and one-shot delayed dispatch
//!
//! Deadlines are simulation milliseconds derived from the frame counter, so
//! a replay with the same inputs fires every dispatch on the same frame.

use serde::{Deserialize, Serialize};

/// Monotonic frame clock, advanced once per world step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    frame: u64,
    frame_ms: f32,
}

impl SimClock {
    pub fn new(frame_ms: f32) -> Self {
        Self { frame: 0, frame_ms }
    }

    #[inline]
    pub fn advance(&mut self) {
        self.frame += 1;
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current simulation time in milliseconds
    #[inline]
    pub fn now_ms(&self) -> f64 {
        self.frame as f64 * self.frame_ms as f64
    }
}

/// Per-target dispatch bookkeeping: schedule once, fire once
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    scheduled: bool,
    dispatched: bool,
    fire_at_ms: f64,
}

impl Dispatch {
    /// Arm the dispatch for `now + delay`. Later calls are ignored.
    /// Returns true only on the call that actually scheduled it.
    pub fn schedule(&mut self, now_ms: f64, delay_ms: f32) -> bool {
        if self.scheduled {
            return false;
        }
        self.scheduled = true;
        self.fire_at_ms = now_ms + delay_ms as f64;
        true
    }

    #[inline]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    #[inline]
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Deadline, if scheduled
    pub fn fire_at_ms(&self) -> Option<f64> {
        self.scheduled.then_some(self.fire_at_ms)
    }

    /// Scheduled, not yet fired, deadline reached
    #[inline]
    pub fn is_due(&self, now_ms: f64) -> bool {
        self.scheduled && !self.dispatched && now_ms >= self.fire_at_ms
    }

    /// Fire if due. Returns true exactly once per target.
    pub fn try_fire(&mut self, now_ms: f64) -> bool {
        if self.is_due(now_ms) {
            self.dispatched = true;
            true
        } else {
            false
        }
    }
}

/// Anything a responder can be dispatched for
pub trait Dispatchable {
    fn id(&self) -> u32;
    fn dispatch(&self) -> &Dispatch;
    fn dispatch_mut(&mut self) -> &mut Dispatch;
}

/// Fire every due dispatch in `targets`, returning the ids that fired
pub fn fire_due<T: Dispatchable>(targets: &mut [T], now_ms: f64) -> Vec<u32> {
    targets
        .iter_mut()
        .filter_map(|t| t.dispatch_mut().try_fire(now_ms).then(|| t.id()))
        .collect()
}
