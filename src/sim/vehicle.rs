//! Vehicles: drive, crash through three phases, end up as a wreck to be towed

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::fsm::{Fsm, FsmState};
use super::geometry::{Aabb, outside_world};
use super::pose::{ActorKind, Pose, Posed, facing};
use super::schedule::{Dispatch, Dispatchable};
use crate::consts::{CRASH_PHASES, DEBRIS_PHASE};
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleState {
    Driving,
    Crashing,
    /// Terminal until a tow truck hauls it away
    Wrecked,
}

impl FsmState for VehicleState {
    fn can_transition_to(self, next: Self) -> bool {
        use VehicleState::*;
        matches!((self, next), (Driving, Crashing) | (Crashing, Wrecked))
    }

    fn is_terminal(self) -> bool {
        self == VehicleState::Wrecked
    }
}

/// Which way the vehicle slid when it lost control. Picked once per crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlipSign {
    Left,
    Right,
}

impl SlipSign {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            SlipSign::Left
        } else {
            SlipSign::Right
        }
    }

    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            SlipSign::Left => -1.0,
            SlipSign::Right => 1.0,
        }
    }
}

/// Request to spawn the single debris piece of a crash
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebrisSpawn {
    pub vehicle: u32,
    pub pos: Vec2,
    pub dir: f32,
    pub slip: SlipSign,
}

/// What happened to a vehicle during one step
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleStep {
    pub debris: Option<DebrisSpawn>,
    pub wrecked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: u32,
    pub pos: Vec2,
    /// Travel direction along x: -1 or +1
    pub dir: f32,
    /// Scalar speed (units/frame)
    pub speed: f32,
    fsm: Fsm<VehicleState>,
    /// Crash phase, 0..CRASH_PHASES, only ever moves forward
    pub crash_phase: u8,
    /// Frames spent in the current crash phase
    pub phase_frames: u32,
    slip: Option<SlipSign>,
    /// Lateral drift applied while crashing, decays each frame
    pub wobble: f32,
    debris_spawned: bool,
    /// Tow truck dispatch, armed on wreck
    pub dispatch: Dispatch,
    /// Hooked to a tow truck and being dragged off
    pub towed: bool,
    pub removed: bool,
    #[serde(default)]
    pub frozen: Option<Pose>,
}

impl Vehicle {
    pub fn new(id: u32, pos: Vec2, dir: f32, speed: f32) -> Self {
        Self {
            id,
            pos,
            dir: crate::sign_of(dir),
            speed: speed.abs(),
            fsm: Fsm::new(VehicleState::Driving),
            crash_phase: 0,
            phase_frames: 0,
            slip: None,
            wobble: 0.0,
            debris_spawned: false,
            dispatch: Dispatch::default(),
            towed: false,
            removed: false,
            frozen: None,
        }
    }

    #[inline]
    pub fn state(&self) -> VehicleState {
        self.fsm.state()
    }

    #[inline]
    pub fn is_driving(&self) -> bool {
        self.fsm.is(VehicleState::Driving)
    }

    #[inline]
    pub fn is_wrecked(&self) -> bool {
        self.fsm.is(VehicleState::Wrecked)
    }

    /// Locked slip sign, once crashing
    #[inline]
    pub fn slip(&self) -> Option<SlipSign> {
        self.slip
    }

    #[inline]
    pub fn debris_spawned(&self) -> bool {
        self.debris_spawned
    }

    pub fn bounds(&self, tuning: &Tuning) -> Aabb {
        Aabb::new(
            self.pos,
            Vec2::new(tuning.vehicle.half_width, tuning.vehicle.half_height),
        )
    }

    /// Lose control. Only a driving vehicle can start a crash; the slip sign
    /// is drawn here and never changes afterwards.
    pub fn crash<R: Rng + ?Sized>(&mut self, rng: &mut R, tuning: &Tuning) -> bool {
        if self.removed || !self.fsm.transition_to(VehicleState::Crashing) {
            return false;
        }
        let slip = *self.slip.get_or_insert_with(|| SlipSign::random(rng));
        self.crash_phase = 0;
        self.phase_frames = 0;
        self.wobble = tuning.vehicle.wobble_start;
        log::debug!(
            "Vehicle {} crashing at ({:.0}, {:.0}) speed {:.1} slip {:?}",
            self.id,
            self.pos.x,
            self.pos.y,
            self.speed,
            slip
        );
        true
    }

    /// Speed loss from running into something. Driving vehicles keep the
    /// minimum speed so they never stall in traffic.
    pub fn slow_down(&mut self, amount: f32, tuning: &Tuning) {
        let floor = if self.is_driving() {
            tuning.vehicle.min_speed.min(self.speed)
        } else {
            0.0
        };
        self.speed = (self.speed - amount).max(floor);
    }

    /// Advance one frame
    pub fn step(&mut self, now_ms: f64, tuning: &Tuning) -> VehicleStep {
        let mut out = VehicleStep::default();
        self.fsm.tick();

        match self.fsm.state() {
            VehicleState::Driving => {
                self.pos.x += self.dir * self.speed;
                let w = &tuning.world;
                if outside_world(self.pos, w.width, w.height, tuning.vehicle.offscreen_margin) {
                    self.removed = true;
                }
            }
            VehicleState::Crashing => {
                let v = &tuning.vehicle;
                let slip = self.slip.map_or(0.0, SlipSign::sign);
                self.speed *= v.crash_damping;
                self.wobble *= v.wobble_decay;
                self.pos.x += self.dir * self.speed;
                self.pos.y = tuning.world.clamp_y(self.pos.y + slip * self.wobble);

                self.phase_frames += 1;
                let phase = self.crash_phase as usize;
                if self.phase_frames >= v.phase_frames[phase] {
                    if phase + 1 < CRASH_PHASES {
                        self.crash_phase += 1;
                        self.phase_frames = 0;
                        if self.crash_phase == DEBRIS_PHASE && !self.debris_spawned {
                            self.debris_spawned = true;
                            out.debris = self.slip.map(|slip| DebrisSpawn {
                                vehicle: self.id,
                                pos: self.pos,
                                dir: self.dir,
                                slip,
                            });
                        }
                    } else {
                        self.fsm.transition_to(VehicleState::Wrecked);
                        self.speed = 0.0;
                        self.wobble = 0.0;
                        self.dispatch.schedule(now_ms, v.tow_delay_ms);
                        out.wrecked = true;
                        log::debug!("Vehicle {} wrecked", self.id);
                    }
                }
            }
            VehicleState::Wrecked => {}
        }

        out
    }

    /// Tow trucks only hook wrecks that are still on screen and unclaimed
    pub fn is_valid_tow_target(&self, tuning: &Tuning) -> bool {
        let w = &tuning.world;
        self.is_wrecked() && !self.removed && !self.towed && !outside_world(self.pos, w.width, w.height, 0.0)
    }
}

impl Dispatchable for Vehicle {
    fn id(&self) -> u32 {
        self.id
    }
    fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
    fn dispatch_mut(&mut self) -> &mut Dispatch {
        &mut self.dispatch
    }
}

impl Posed for Vehicle {
    fn pose(&self) -> Pose {
        Pose {
            phase: self.crash_phase,
            variant: self.slip.map_or(0, |s| s.sign() as i8),
            facing: facing(self.dir),
            ..Pose::new(ActorKind::Vehicle, self.state() as u8)
        }
    }
    fn frozen_mut(&mut self) -> &mut Option<Pose> {
        &mut self.frozen
    }
    fn frozen(&self) -> Option<Pose> {
        self.frozen
    }
}
