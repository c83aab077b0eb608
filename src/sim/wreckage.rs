//! Debris thrown off a crashing vehicle
//!
//! A piece flies, lands on its own local ground line (a little below where
//! it was thrown from, not the bottom of the world), slides to a stop and
//! then waits for an ambulance crew to clear it. A hard lifetime removes it
//! regardless.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::fsm::{Fsm, FsmState};
use super::pose::{ActorKind, Pose, Posed, facing};
use super::schedule::{Dispatch, Dispatchable};
use super::vehicle::{DebrisSpawn, SlipSign};
use crate::tuning::WreckageTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WreckageState {
    Airborne,
    Sliding,
    Resting,
}

impl FsmState for WreckageState {
    fn can_transition_to(self, next: Self) -> bool {
        use WreckageState::*;
        matches!((self, next), (Airborne, Sliding) | (Sliding, Resting))
    }

    fn is_terminal(self) -> bool {
        self == WreckageState::Resting
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WreckagePiece {
    pub id: u32,
    /// Vehicle that shed this piece
    pub source: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Local ground line (spawn y + offset)
    pub ground_y: f32,
    pub dir: f32,
    pub slip: SlipSign,
    fsm: Fsm<WreckageState>,
    /// Frames left before forced removal
    pub life: u32,
    /// Ambulance dispatch, armed on rest
    pub dispatch: Dispatch,
    pub dead: bool,
    #[serde(default)]
    pub frozen: Option<Pose>,
}

impl WreckagePiece {
    /// Throw a piece off a crashing vehicle, forward and upward
    pub fn spawn<R: Rng + ?Sized>(
        id: u32,
        from: &DebrisSpawn,
        rng: &mut R,
        tuning: &WreckageTuning,
    ) -> Self {
        let vx = rng.random_range(tuning.spawn_vx_min..=tuning.spawn_vx_max);
        let vy = rng.random_range(tuning.spawn_vy_min..=tuning.spawn_vy_max);
        Self::with_velocity(id, from, Vec2::new(from.dir * vx, vy), tuning)
    }

    pub fn with_velocity(id: u32, from: &DebrisSpawn, vel: Vec2, tuning: &WreckageTuning) -> Self {
        Self {
            id,
            source: from.vehicle,
            pos: from.pos,
            vel,
            ground_y: from.pos.y + tuning.ground_offset,
            dir: from.dir,
            slip: from.slip,
            fsm: Fsm::new(WreckageState::Airborne),
            life: tuning.lifetime_frames,
            dispatch: Dispatch::default(),
            dead: false,
            frozen: None,
        }
    }

    #[inline]
    pub fn state(&self) -> WreckageState {
        self.fsm.state()
    }

    #[inline]
    pub fn is_resting(&self) -> bool {
        self.fsm.is(WreckageState::Resting)
    }

    /// Advance one frame. Returns true on the frame the piece comes to rest.
    pub fn step(&mut self, now_ms: f64, tuning: &WreckageTuning) -> bool {
        if self.dead {
            return false;
        }
        self.life = self.life.saturating_sub(1);
        if self.life == 0 {
            self.dead = true;
            return false;
        }
        self.fsm.tick();

        match self.fsm.state() {
            WreckageState::Airborne => {
                self.vel.y += tuning.gravity;
                self.vel *= tuning.air_drag;
                self.pos += self.vel;
                if self.pos.y >= self.ground_y && self.vel.y >= 0.0 {
                    self.pos.y = self.ground_y;
                    self.vel.y = 0.0;
                    self.vel.x *= tuning.land_damping;
                    self.fsm.transition_to(WreckageState::Sliding);
                }
                false
            }
            WreckageState::Sliding => {
                self.vel.x *= tuning.friction;
                self.pos.x += self.vel.x;
                if self.vel.x.abs() < tuning.min_speed {
                    self.vel = Vec2::ZERO;
                    self.fsm.transition_to(WreckageState::Resting);
                    self.dispatch.schedule(now_ms, tuning.responder_delay_ms);
                    log::debug!("Wreckage {} resting at ({:.0}, {:.0})", self.id, self.pos.x, self.pos.y);
                    true
                } else {
                    false
                }
            }
            WreckageState::Resting => false,
        }
    }

    #[inline]
    pub fn is_valid_responder_target(&self) -> bool {
        self.is_resting() && !self.dead
    }

    pub fn mark_removed(&mut self) {
        self.dead = true;
    }
}

impl Dispatchable for WreckagePiece {
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

impl Posed for WreckagePiece {
    fn pose(&self) -> Pose {
        Pose {
            variant: self.slip.sign() as i8,
            facing: facing(self.dir),
            ..Pose::new(ActorKind::Wreckage, self.state() as u8)
        }
    }
    fn frozen_mut(&mut self) -> &mut Option<Pose> {
        &mut self.frozen
    }
    fn frozen(&self) -> Option<Pose> {
        self.frozen
    }
}
