//! Pedestrians: stand, dodge, pile up, get squished

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::fsm::{Fsm, FsmState};
use super::pose::{ActorKind, Pose, Posed};
use super::schedule::{Dispatch, Dispatchable};
use crate::tuning::{PedestrianTuning, WorldTuning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PedestrianState {
    Idle,
    /// Mid-hop sideways out of a vehicle's path
    Evading,
    /// Terminal until an ambulance collects the body
    Squished,
}

impl FsmState for PedestrianState {
    fn can_transition_to(self, next: Self) -> bool {
        use PedestrianState::*;
        matches!(
            (self, next),
            (Idle, Evading) | (Idle, Squished) | (Evading, Idle) | (Evading, Squished)
        )
    }

    fn is_terminal(self) -> bool {
        self == PedestrianState::Squished
    }
}

/// A pedestrian, or a pile of them stacked on one spot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pedestrian {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Pedestrians stacked here (1..=max_pile)
    pub pile: u32,
    fsm: Fsm<PedestrianState>,
    /// Frames before another pre-emptive dodge is allowed
    pub evade_cooldown: u32,
    /// Frames before the pile may grow again
    pub stack_cooldown: u32,
    /// Remaining frames of the cosmetic pile bump
    pub bump_frames: u32,
    /// Ambulance dispatch, armed on squish
    pub dispatch: Dispatch,
    /// Collected by an ambulance (or erased); dropped at compaction
    pub removed: bool,
    #[serde(default)]
    pub frozen: Option<Pose>,
}

impl Pedestrian {
    pub fn new(id: u32, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            pile: 1,
            fsm: Fsm::new(PedestrianState::Idle),
            evade_cooldown: 0,
            stack_cooldown: 0,
            bump_frames: 0,
            dispatch: Dispatch::default(),
            removed: false,
            frozen: None,
        }
    }

    #[inline]
    pub fn state(&self) -> PedestrianState {
        self.fsm.state()
    }

    #[inline]
    pub fn is_squished(&self) -> bool {
        self.fsm.is(PedestrianState::Squished)
    }

    /// Alive and still in the world
    #[inline]
    pub fn is_standing(&self) -> bool {
        !self.removed && !self.is_squished()
    }

    /// Add one more pedestrian to this pile, respecting the cap and cooldown
    pub fn try_stack(&mut self, tuning: &PedestrianTuning) -> bool {
        if !self.is_standing() || self.stack_cooldown > 0 || self.pile >= tuning.max_pile {
            return false;
        }
        self.pile += 1;
        self.stack_cooldown = tuning.stack_cooldown_frames;
        true
    }

    /// Hop sideways; `away` is the lateral sign to move in.
    /// Re-triggering while already mid-hop redirects it without restarting
    /// its frame count.
    pub fn evade(&mut self, away: f32, tuning: &PedestrianTuning) -> bool {
        if !self.is_standing() {
            return false;
        }
        let started = self.fsm.transition_to(PedestrianState::Evading);
        self.vel = Vec2::new(0.0, away.signum() * tuning.evade_speed);
        self.evade_cooldown = tuning.evade_cooldown_frames;
        started
    }

    /// Kill the pile. Returns the pile size that was crushed, or None if
    /// already squished.
    pub fn squish(&mut self, now_ms: f64, tuning: &PedestrianTuning) -> Option<u32> {
        if self.removed || !self.fsm.transition_to(PedestrianState::Squished) {
            return None;
        }
        let crushed = self.pile;
        self.pile = 1;
        self.vel = Vec2::ZERO;
        self.bump_frames = 0;
        self.dispatch.schedule(now_ms, tuning.responder_delay_ms);
        log::debug!("Pedestrian {} squished (pile {})", self.id, crushed);
        Some(crushed)
    }

    /// Cosmetic flinch when a pile stops a vehicle
    pub fn bump(&mut self, tuning: &PedestrianTuning) {
        if self.is_standing() {
            self.bump_frames = tuning.bump_frames;
        }
    }

    /// Advance one frame
    pub fn step(&mut self, world: &WorldTuning, tuning: &PedestrianTuning) {
        self.fsm.tick();
        self.evade_cooldown = self.evade_cooldown.saturating_sub(1);
        self.stack_cooldown = self.stack_cooldown.saturating_sub(1);
        self.bump_frames = self.bump_frames.saturating_sub(1);

        if self.fsm.is(PedestrianState::Evading) {
            self.pos += self.vel;
            self.pos.y = world.clamp_y(self.pos.y);
            self.vel *= tuning.evade_damping;
            if self.fsm.frames() >= tuning.evade_frames {
                self.vel = Vec2::ZERO;
                self.fsm.transition_to(PedestrianState::Idle);
            }
        }
    }

    /// Ambulances only collect bodies that are still lying in the street
    #[inline]
    pub fn is_valid_responder_target(&self) -> bool {
        self.is_squished() && !self.removed
    }

    pub fn mark_removed(&mut self) {
        self.removed = true;
    }
}

impl Dispatchable for Pedestrian {
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

impl Posed for Pedestrian {
    fn pose(&self) -> Pose {
        Pose {
            phase: self.fsm.frames().min(u8::MAX as u32) as u8,
            pile: self.pile,
            bump: self.bump_frames > 0,
            ..Pose::new(ActorKind::Pedestrian, self.state() as u8)
        }
    }
    fn frozen_mut(&mut self) -> &mut Option<Pose> {
        &mut self.frozen
    }
    fn frozen(&self) -> Option<Pose> {
        self.frozen
    }
}
