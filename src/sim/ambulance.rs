//! Ambulances: drive to a body or a resting wreck, load it, drive off
//!
//! Steering while en route is a blend of three forces:
//! - seek toward the target at full speed, vertical speed clamped
//! - separation from other ambulances, faded out close to the target so
//!   crews converging on neighbouring targets can still reach them
//! - a weak pull toward a preferred lane, which is reshuffled when the
//!   ambulance stops making progress

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::fsm::{Fsm, FsmState};
use super::pedestrian::Pedestrian;
use super::pose::{ActorKind, Pose, Posed, facing};
use super::responder::{AmbulanceTarget, nearest_edge_dir, past_despawn, spawn_point};
use super::wreckage::WreckagePiece;
use crate::tuning::{AmbulanceTuning, Tuning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmbulanceState {
    ToTarget,
    Pickup,
    Leave,
}

impl FsmState for AmbulanceState {
    fn can_transition_to(self, next: Self) -> bool {
        use AmbulanceState::*;
        matches!((self, next), (ToTarget, Pickup) | (ToTarget, Leave) | (Pickup, Leave))
    }

    fn is_terminal(self) -> bool {
        self == AmbulanceState::Leave
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Heading along x: -1 or +1
    pub dir: f32,
    fsm: Fsm<AmbulanceState>,
    target: Option<AmbulanceTarget>,
    /// Distance to target at the end of the previous frame
    prev_dist: f32,
    /// Consecutive frames without enough progress
    stagnant: u32,
    /// Preferred track relative to the target's y
    pub lane_offset: f32,
    pickup_timer: u32,
    /// Past the despawn line; dropped at compaction
    pub departed: bool,
    #[serde(default)]
    pub frozen: Option<Pose>,
}

impl Ambulance {
    /// Enter from the edge opposite the target, clear of `occupied` slots
    pub fn spawn(
        id: u32,
        target: AmbulanceTarget,
        target_pos: Vec2,
        occupied: &[Vec2],
        tuning: &Tuning,
    ) -> Self {
        let a = &tuning.ambulance;
        let (pos, dir) = spawn_point(
            target_pos,
            &tuning.world,
            a.spawn_margin,
            a.spawn_clearance,
            a.spawn_retries,
            occupied,
        );
        Self {
            id,
            pos,
            vel: Vec2::new(dir * a.base_speed, 0.0),
            dir,
            fsm: Fsm::new(AmbulanceState::ToTarget),
            target: Some(target),
            prev_dist: pos.distance(target_pos),
            stagnant: 0,
            lane_offset: 0.0,
            pickup_timer: 0,
            departed: false,
            frozen: None,
        }
    }

    #[inline]
    pub fn state(&self) -> AmbulanceState {
        self.fsm.state()
    }

    #[inline]
    pub fn target(&self) -> Option<AmbulanceTarget> {
        self.target
    }

    /// Still on the road (not leaving)
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.departed && !self.fsm.is(AmbulanceState::Leave)
    }

    /// Drop the target and head for the closer side edge
    fn begin_leave(&mut self, tuning: &Tuning) {
        self.target = None;
        self.dir = nearest_edge_dir(self.pos.x, &tuning.world);
        if self.fsm.transition_to(AmbulanceState::Leave) {
            log::debug!("Ambulance {} leaving, heading {}", self.id, self.dir);
        }
    }

    /// Advance one frame.
    /// `others` is a snapshot of every ambulance's (id, position) taken
    /// before any of them moved this frame.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        others: &[(u32, Vec2)],
        pedestrians: &mut [Pedestrian],
        wreckage: &mut [WreckagePiece],
        rng: &mut R,
        tuning: &Tuning,
    ) {
        if self.departed {
            return;
        }
        self.fsm.tick();
        let a = &tuning.ambulance;

        match self.fsm.state() {
            AmbulanceState::ToTarget => {
                let target_pos = match self.target {
                    Some(t) => t.resolve_valid(pedestrians, wreckage).map(|t| t.pos()),
                    None => None,
                };
                let Some(target_pos) = target_pos else {
                    log::debug!("Ambulance {} lost its target", self.id);
                    self.begin_leave(tuning);
                    self.drive_out(tuning);
                    return;
                };

                if self.pos.distance(target_pos) <= a.capture_distance {
                    self.vel = Vec2::ZERO;
                    self.pickup_timer = a.pickup_frames;
                    self.fsm.transition_to(AmbulanceState::Pickup);
                    return;
                }

                self.seek(target_pos, others, a);
                self.pos += self.vel;
                self.pos.y = tuning.world.clamp_y(self.pos.y);
                if self.vel.x.abs() > 0.1 {
                    self.dir = crate::sign_of(self.vel.x);
                }
                self.track_progress(target_pos, rng, a);
            }
            AmbulanceState::Pickup => {
                self.pickup_timer = self.pickup_timer.saturating_sub(1);
                if self.pickup_timer > 0 {
                    return;
                }
                let loaded = match self.target {
                    Some(t) => t.resolve_valid(pedestrians, wreckage),
                    None => None,
                };
                if let Some(mut target) = loaded {
                    target.mark_removed();
                    log::debug!("Ambulance {} loaded its target", self.id);
                }
                self.begin_leave(tuning);
            }
            AmbulanceState::Leave => self.drive_out(tuning),
        }
    }

    /// Blend velocity toward seek + separation + lane pull, then clamp to the speed band
    fn seek(&mut self, target_pos: Vec2, others: &[(u32, Vec2)], a: &AmbulanceTuning) {
        let to = target_pos - self.pos;
        let dist = to.length();
        let mut desired = to.normalize_or_zero() * a.max_speed;
        desired.y = desired.y.clamp(-a.max_vy, a.max_vy);

        // Both forces fade out on final approach
        let approach = (dist / a.separation_falloff).min(1.0);
        let separation = self.separation(others, a) * approach;
        let lane_y = target_pos.y + self.lane_offset;
        let lane = Vec2::new(0.0, (lane_y - self.pos.y) * a.lane_pull * approach);

        let steer = desired + separation + lane;
        self.vel = self.vel.lerp(steer, a.steer_blend);
        self.vel = crate::clamp_speed(
            self.vel,
            a.base_speed * a.speed_floor,
            a.max_speed,
            Vec2::new(self.dir, 0.0),
        );
    }

    /// Inverse-distance repulsion from nearby ambulances, capped
    fn separation(&self, others: &[(u32, Vec2)], a: &AmbulanceTuning) -> Vec2 {
        let mut push = Vec2::ZERO;
        for &(id, pos) in others {
            if id == self.id {
                continue;
            }
            let away = self.pos - pos;
            let d = away.length();
            if d >= a.separation_radius {
                continue;
            }
            // Stacked exactly: split by id so the pair never cancels out
            let dir = if d > 1e-3 {
                away / d
            } else if self.id < id {
                Vec2::NEG_Y
            } else {
                Vec2::Y
            };
            push += dir * (a.separation_strength / d.max(1.0));
        }
        push.clamp_length_max(a.separation_max)
    }

    /// Count frames without progress; when stuck, pick a new lane and kick
    fn track_progress<R: Rng + ?Sized>(&mut self, target_pos: Vec2, rng: &mut R, a: &AmbulanceTuning) {
        let dist = self.pos.distance(target_pos);
        if self.prev_dist - dist < a.min_progress {
            self.stagnant += 1;
        } else {
            self.stagnant = 0;
        }
        self.prev_dist = dist;

        if self.stagnant >= a.stuck_frames {
            self.lane_offset = rng.random_range(-a.lane_range..=a.lane_range);
            let side = crate::sign_of(self.lane_offset);
            self.vel += Vec2::new(0.0, side * a.stuck_kick);
            self.stagnant = 0;
            log::debug!("Ambulance {} stuck, new lane offset {:.1}", self.id, self.lane_offset);
        }
    }

    /// Outward steering until past the despawn line
    fn drive_out(&mut self, tuning: &Tuning) {
        let a = &tuning.ambulance;
        let desired = Vec2::new(self.dir * a.max_speed, 0.0);
        self.vel = crate::clamp_speed(
            self.vel.lerp(desired, a.steer_blend),
            a.base_speed * a.speed_floor,
            a.max_speed,
            Vec2::new(self.dir, 0.0),
        );
        self.pos += self.vel;
        self.pos.y = tuning.world.clamp_y(self.pos.y);
        if past_despawn(self.pos.x, &tuning.world, a.despawn_margin) {
            self.departed = true;
        }
    }
}

impl Posed for Ambulance {
    fn pose(&self) -> Pose {
        Pose {
            phase: self.pickup_timer.min(u8::MAX as u32) as u8,
            facing: facing(self.dir),
            ..Pose::new(ActorKind::Ambulance, self.state() as u8)
        }
    }
    fn frozen_mut(&mut self) -> &mut Option<Pose> {
        &mut self.frozen
    }
    fn frozen(&self) -> Option<Pose> {
        self.frozen
    }
}
