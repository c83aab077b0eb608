//! Pileup - a street-incident sandbox
//!
//! Core modules:
//! - `sim`: Deterministic simulation (actors, collisions, chain crashes, responders)
//! - `tuning`: Data-driven balance and world configuration
//!
//! Rendering, input capture and the blood-splat layer live outside this crate;
//! they talk to the simulation through [`sim::World`]'s intake methods, actor
//! poses and the drained [`sim::SimEvent`] queue.

pub mod sim;
pub mod tuning;

pub use sim::{Mode, SimEvent, World, WorldStats, step};
pub use tuning::{Tuning, TuningError};

use glam::Vec2;

/// Simulation constants that are structural rather than tunable
pub mod consts {
    /// Nominal frame rate the per-frame physics is tuned for
    pub const FRAMES_PER_SECOND: f32 = 60.0;
    /// Milliseconds per simulation frame at the nominal rate
    pub const FRAME_MS: f32 = 1000.0 / FRAMES_PER_SECOND;

    /// Hard cap on the number of pedestrians stacked at one spot
    pub const PILE_CAP: u32 = 5;
    /// Crash sequence has three phases (0, 1, 2); debris spawns entering the last
    pub const CRASH_PHASES: usize = 3;
    pub const DEBRIS_PHASE: u8 = 2;

    /// Default world size (canvas units)
    pub const DEFAULT_WORLD_WIDTH: f32 = 960.0;
    pub const DEFAULT_WORLD_HEIGHT: f32 = 540.0;
}

/// Sign of a float as -1.0 / +1.0 (zero counts as positive)
#[inline]
pub fn sign_of(x: f32) -> f32 {
    if x < 0.0 { -1.0 } else { 1.0 }
}

/// Scale `v` so its length lies in `[min, max]`; zero vectors take `fallback` direction
#[inline]
pub fn clamp_speed(v: Vec2, min: f32, max: f32, fallback: Vec2) -> Vec2 {
    let len = v.length();
    if len > max {
        v * (max / len)
    } else if len < min {
        let dir = if len > 1e-4 { v / len } else { fallback.normalize_or_zero() };
        dir * min
    } else {
        v
    }
}
