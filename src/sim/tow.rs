//! Tow trucks: drive to a wreck, hook it, drag it off screen

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::fsm::{Fsm, FsmState};
use super::pose::{ActorKind, Pose, Posed, facing};
use super::responder::{nearest_edge_dir, past_despawn, spawn_point};
use super::vehicle::Vehicle;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TowState {
    ToTarget,
    Hook,
    Leave,
}

impl FsmState for TowState {
    fn can_transition_to(self, next: Self) -> bool {
        use TowState::*;
        matches!((self, next), (ToTarget, Hook) | (ToTarget, Leave) | (Hook, Leave))
    }

    fn is_terminal(self) -> bool {
        self == TowState::Leave
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TowTruck {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub dir: f32,
    fsm: Fsm<TowState>,
    /// Wrecked vehicle id; kept while leaving if it was hooked
    target: Option<u32>,
    hook_timer: u32,
    pub departed: bool,
    #[serde(default)]
    pub frozen: Option<Pose>,
}

fn find(vehicles: &mut [Vehicle], id: Option<u32>) -> Option<&mut Vehicle> {
    let i = vehicles.binary_search_by_key(&id?, |v| v.id).ok()?;
    Some(&mut vehicles[i])
}

impl TowTruck {
    pub fn spawn(id: u32, vehicle: u32, target_pos: Vec2, tuning: &Tuning) -> Self {
        let t = &tuning.tow;
        let (pos, dir) = spawn_point(target_pos, &tuning.world, t.spawn_margin, 0.0, 0, &[]);
        Self {
            id,
            pos,
            vel: Vec2::new(dir * t.max_speed, 0.0),
            dir,
            fsm: Fsm::new(TowState::ToTarget),
            target: Some(vehicle),
            hook_timer: 0,
            departed: false,
            frozen: None,
        }
    }

    #[inline]
    pub fn state(&self) -> TowState {
        self.fsm.state()
    }

    #[inline]
    pub fn target(&self) -> Option<u32> {
        self.target
    }

    fn begin_leave(&mut self, tuning: &Tuning) {
        self.dir = nearest_edge_dir(self.pos.x, &tuning.world);
        self.fsm.transition_to(TowState::Leave);
    }

    /// Advance one frame, dragging the hooked wreck along while leaving
    pub fn step(&mut self, vehicles: &mut [Vehicle], tuning: &Tuning) {
        if self.departed {
            return;
        }
        self.fsm.tick();
        let t = &tuning.tow;

        match self.fsm.state() {
            TowState::ToTarget => {
                let target = find(vehicles, self.target)
                    .filter(|v| v.is_valid_tow_target(tuning))
                    .map(|v| v.pos);
                let Some(target_pos) = target else {
                    log::debug!("Tow truck {} lost its wreck", self.id);
                    self.target = None;
                    self.begin_leave(tuning);
                    return;
                };

                let to = target_pos - self.pos;
                if to.length() <= t.capture_distance {
                    self.vel = Vec2::ZERO;
                    self.hook_timer = t.hook_frames;
                    self.fsm.transition_to(TowState::Hook);
                    return;
                }
                let desired = to.normalize_or_zero() * t.max_speed;
                self.vel = self.vel.lerp(desired, t.steer_blend).clamp_length_max(t.max_speed);
                self.pos += self.vel;
                self.pos.y = tuning.world.clamp_y(self.pos.y);
                if self.vel.x.abs() > 0.1 {
                    self.dir = crate::sign_of(self.vel.x);
                }
            }
            TowState::Hook => {
                let Some(vehicle) = find(vehicles, self.target).filter(|v| !v.removed) else {
                    self.target = None;
                    self.begin_leave(tuning);
                    return;
                };
                self.hook_timer = self.hook_timer.saturating_sub(1);
                if self.hook_timer == 0 {
                    vehicle.towed = true;
                    log::debug!("Tow truck {} hooked vehicle {}", self.id, vehicle.id);
                    self.begin_leave(tuning);
                }
            }
            TowState::Leave => {
                let desired = Vec2::new(self.dir * t.max_speed, 0.0);
                self.vel = self.vel.lerp(desired, t.steer_blend).clamp_length_max(t.max_speed);
                self.pos += self.vel;
                let hitch = self.pos - Vec2::new(self.dir * t.hitch_offset, 0.0);
                let gone = past_despawn(self.pos.x, &tuning.world, t.despawn_margin);

                if let Some(vehicle) = find(vehicles, self.target) {
                    vehicle.pos = hitch;
                    if gone {
                        vehicle.removed = true;
                    }
                }
                if gone {
                    self.departed = true;
                }
            }
        }
    }
}

impl Posed for TowTruck {
    fn pose(&self) -> Pose {
        Pose {
            phase: self.hook_timer.min(u8::MAX as u32) as u8,
            facing: facing(self.dir),
            ..Pose::new(ActorKind::TowTruck, self.state() as u8)
        }
    }
    fn frozen_mut(&mut self) -> &mut Option<Pose> {
        &mut self.frozen
    }
    fn frozen(&self) -> Option<Pose> {
        self.frozen
    }
}
