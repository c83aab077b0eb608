//! Data-driven simulation balance
//!
//! Every threshold the simulation uses lives here so it can be tweaked from a
//! JSON file without recompiling. All sections default individually, so a
//! partial file such as `{"chain": {"max_depth": 5}}` is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Failure to load or validate a tuning file
#[derive(Error, Debug)]
pub enum TuningError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid tuning: {0}")]
    Invalid(String),
}

/// World extents and clock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldTuning {
    pub width: f32,
    pub height: f32,
    /// Actors are kept this far inside the top/bottom edges
    pub y_margin: f32,
    /// Simulation time advanced per step
    pub frame_ms: f32,
}

impl Default for WorldTuning {
    fn default() -> Self {
        Self {
            width: DEFAULT_WORLD_WIDTH,
            height: DEFAULT_WORLD_HEIGHT,
            y_margin: 12.0,
            frame_ms: FRAME_MS,
        }
    }
}

impl WorldTuning {
    /// Clamp a y coordinate into the playable band
    #[inline]
    pub fn clamp_y(&self, y: f32) -> f32 {
        y.clamp(self.y_margin, self.height - self.y_margin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PedestrianTuning {
    pub hit_radius: f32,
    /// New spawns this close to a standing pedestrian join its pile instead
    pub stack_radius: f32,
    pub max_pile: u32,
    pub stack_cooldown_frames: u32,
    pub evade_cooldown_frames: u32,
    pub evade_frames: u32,
    /// Initial lateral hop speed (units/frame)
    pub evade_speed: f32,
    pub evade_damping: f32,
    /// Half-width of the warning band ahead of a vehicle
    pub warn_lateral: f32,
    /// Warning window length = base + speed * lead frames
    pub warn_lead_base: f32,
    pub warn_lead_frames: f32,
    pub bump_frames: u32,
    /// Burst jitter radius per brush unit
    pub burst_spread: f32,
    pub responder_delay_ms: f32,
}

impl Default for PedestrianTuning {
    fn default() -> Self {
        Self {
            hit_radius: 6.0,
            stack_radius: 10.0,
            max_pile: PILE_CAP,
            stack_cooldown_frames: 10,
            evade_cooldown_frames: 45,
            evade_frames: 10,
            evade_speed: 3.2,
            evade_damping: 0.78,
            warn_lateral: 16.0,
            warn_lead_base: 6.0,
            warn_lead_frames: 4.0,
            bump_frames: 8,
            burst_spread: 10.0,
            responder_delay_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleTuning {
    pub half_width: f32,
    pub half_height: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Speed needed to squish a single pedestrian
    pub squish_base: f32,
    /// Extra speed needed per additional pedestrian in the pile
    pub squish_per_pile: f32,
    /// Speed lost when a pedestrian dies under the vehicle
    pub squish_speed_loss: f32,
    /// Speed lost on a non-lethal hit
    pub hit_speed_loss: f32,
    pub crash_damping: f32,
    pub wobble_start: f32,
    pub wobble_decay: f32,
    /// Frames spent in each crash phase
    pub phase_frames: [u32; CRASH_PHASES],
    pub offscreen_margin: f32,
    pub tow_delay_ms: f32,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            half_width: 22.0,
            half_height: 9.0,
            min_speed: 2.0,
            max_speed: 16.0,
            squish_base: 9.4,
            squish_per_pile: 2.2,
            squish_speed_loss: 1.6,
            hit_speed_loss: 0.6,
            crash_damping: 0.86,
            wobble_start: 2.4,
            wobble_decay: 0.8,
            phase_frames: [6, 8, 18],
            offscreen_margin: 60.0,
            tow_delay_ms: 700.0,
        }
    }
}

impl VehicleTuning {
    /// Speed a vehicle needs to squish a pile of `pile` pedestrians
    #[inline]
    pub fn required_speed(&self, pile: u32) -> f32 {
        self.squish_base + self.squish_per_pile * pile.saturating_sub(1) as f32
    }

    /// Clamp a requested spawn speed into the vehicle speed band
    #[inline]
    pub fn clamp_speed(&self, speed: f32) -> f32 {
        speed.abs().clamp(self.min_speed, self.max_speed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WreckageTuning {
    /// Local ground line sits this far below the spawn point
    pub ground_offset: f32,
    pub gravity: f32,
    pub air_drag: f32,
    /// Horizontal speed kept on landing
    pub land_damping: f32,
    pub friction: f32,
    pub min_speed: f32,
    pub lifetime_frames: u32,
    pub spawn_vx_min: f32,
    pub spawn_vx_max: f32,
    pub spawn_vy_min: f32,
    pub spawn_vy_max: f32,
    pub responder_delay_ms: f32,
}

impl Default for WreckageTuning {
    fn default() -> Self {
        Self {
            ground_offset: 14.0,
            gravity: 0.45,
            air_drag: 0.99,
            land_damping: 0.6,
            friction: 0.88,
            min_speed: 0.05,
            lifetime_frames: 60 * 60,
            spawn_vx_min: 1.5,
            spawn_vx_max: 4.5,
            spawn_vy_min: -5.5,
            spawn_vy_max: -3.0,
            responder_delay_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainTuning {
    pub initial_radius: f32,
    /// Child radius = parent radius * shrink
    pub shrink: f32,
    pub max_depth: u32,
    pub generation_delay_frames: u32,
}

impl Default for ChainTuning {
    fn default() -> Self {
        Self {
            initial_radius: 110.0,
            shrink: 0.7,
            max_depth: 3,
            generation_delay_frames: 8,
        }
    }
}

/// Hard-brake gesture heuristic (speeds in units per millisecond)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakeTuning {
    /// Pointer history kept for analysis
    pub history_ms: f32,
    pub fast_speed: f32,
    /// Consecutive fast segments required before the stop
    pub fast_samples: usize,
    pub stop_speed: f32,
    /// The stop must follow the last fast segment within this window
    pub stop_window_ms: f32,
    pub cooldown_ms: f32,
}

impl Default for BrakeTuning {
    fn default() -> Self {
        Self {
            history_ms: 400.0,
            fast_speed: 1.2,
            fast_samples: 3,
            stop_speed: 0.15,
            stop_window_ms: 120.0,
            cooldown_ms: 600.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbulanceTuning {
    pub base_speed: f32,
    pub max_speed: f32,
    /// Speed never drops below this fraction of base speed while driving
    pub speed_floor: f32,
    pub max_vy: f32,
    /// Velocity blend toward the steering target per frame
    pub steer_blend: f32,
    pub separation_radius: f32,
    pub separation_strength: f32,
    pub separation_max: f32,
    /// Separation fades out inside this distance of the target
    pub separation_falloff: f32,
    pub lane_pull: f32,
    pub lane_range: f32,
    pub capture_distance: f32,
    pub pickup_frames: u32,
    pub stuck_frames: u32,
    pub min_progress: f32,
    pub stuck_kick: f32,
    pub spawn_margin: f32,
    pub despawn_margin: f32,
    pub spawn_retries: u32,
    pub spawn_clearance: f32,
}

impl Default for AmbulanceTuning {
    fn default() -> Self {
        Self {
            base_speed: 3.6,
            max_speed: 4.2,
            speed_floor: 0.35,
            max_vy: 2.4,
            steer_blend: 0.18,
            separation_radius: 36.0,
            separation_strength: 18.0,
            separation_max: 2.5,
            separation_falloff: 60.0,
            lane_pull: 0.04,
            lane_range: 24.0,
            capture_distance: 10.0,
            pickup_frames: 40,
            stuck_frames: 45,
            min_progress: 0.25,
            stuck_kick: 2.5,
            spawn_margin: 40.0,
            despawn_margin: 80.0,
            spawn_retries: 6,
            spawn_clearance: 28.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TowTuning {
    pub max_speed: f32,
    pub steer_blend: f32,
    pub capture_distance: f32,
    pub hook_frames: u32,
    /// Towed wreck trails the truck by this much
    pub hitch_offset: f32,
    pub spawn_margin: f32,
    pub despawn_margin: f32,
}

impl Default for TowTuning {
    fn default() -> Self {
        Self {
            max_speed: 3.4,
            steer_blend: 0.15,
            capture_distance: 14.0,
            hook_frames: 30,
            hitch_offset: 40.0,
            spawn_margin: 60.0,
            despawn_margin: 120.0,
        }
    }
}

/// Complete simulation tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub world: WorldTuning,
    pub pedestrian: PedestrianTuning,
    pub vehicle: VehicleTuning,
    pub wreckage: WreckageTuning,
    pub chain: ChainTuning,
    pub brake: BrakeTuning,
    pub ambulance: AmbulanceTuning,
    pub tow: TowTuning,
}

impl Tuning {
    /// Parse and validate a JSON tuning document
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load a tuning file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    /// Reject values that would make the simulation diverge or stall
    pub fn validate(&self) -> Result<(), TuningError> {
        let w = &self.world;
        if w.width <= 0.0 || w.height <= 2.0 * w.y_margin || w.frame_ms <= 0.0 {
            return Err(invalid("world size and frame time must be positive"));
        }
        if self.pedestrian.max_pile == 0 {
            return Err(invalid("pedestrian.max_pile must be at least 1"));
        }
        let v = &self.vehicle;
        if v.min_speed > v.max_speed || v.min_speed <= 0.0 {
            return Err(invalid("vehicle speed band must satisfy 0 < min <= max"));
        }
        if v.squish_per_pile <= 0.0 {
            return Err(invalid("vehicle.squish_per_pile must be positive"));
        }
        if v.phase_frames.contains(&0) {
            return Err(invalid("crash phase durations must be non-zero"));
        }
        let unit = |x: f32| x > 0.0 && x < 1.0;
        if !unit(v.crash_damping) || !unit(v.wobble_decay) {
            return Err(invalid("vehicle damping factors must lie in (0, 1)"));
        }
        let wr = &self.wreckage;
        if !unit(wr.friction) || !unit(wr.land_damping) || !(0.0..=1.0).contains(&wr.air_drag) {
            return Err(invalid("wreckage friction and damping must lie in (0, 1)"));
        }
        if wr.min_speed <= 0.0 || wr.gravity <= 0.0 {
            return Err(invalid("wreckage gravity and min_speed must be positive"));
        }
        if wr.spawn_vx_min > wr.spawn_vx_max || wr.spawn_vy_min > wr.spawn_vy_max {
            return Err(invalid("wreckage spawn ranges are inverted"));
        }
        if !unit(self.chain.shrink) {
            return Err(invalid("chain.shrink must lie in (0, 1)"));
        }
        let a = &self.ambulance;
        if a.max_speed < a.base_speed * a.speed_floor || a.capture_distance <= 0.0 {
            return Err(invalid("ambulance speed band or capture distance is inconsistent"));
        }
        if self.tow.capture_distance <= 0.0 || self.tow.max_speed <= 0.0 {
            return Err(invalid("tow truck speed and capture distance must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> TuningError {
    TuningError::Invalid(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tuning_is_valid() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let tuning = Tuning::from_json(r#"{"chain": {"max_depth": 5}}"#).unwrap();
        assert_eq!(tuning.chain.max_depth, 5);
        assert!((tuning.chain.shrink - 0.7).abs() < 1e-6);
        assert!((tuning.vehicle.squish_base - 9.4).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_shrink_rejected() {
        let err = Tuning::from_json(r#"{"chain": {"shrink": 1.2}}"#).unwrap_err();
        assert!(matches!(err, TuningError::Invalid(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = Tuning::from_json("{ not json").unwrap_err();
        assert!(matches!(err, TuningError::Parse(_)));
    }

    #[test]
    fn test_required_speed_steps_per_pile() {
        let v = VehicleTuning::default();
        assert!((v.required_speed(1) - 9.4).abs() < 1e-6);
        assert!((v.required_speed(3) - (9.4 + 2.0 * 2.2)).abs() < 1e-5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Tuning::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, TuningError::Io(_)));
    }
}
