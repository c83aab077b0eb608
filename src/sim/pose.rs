//! What the renderer needs to pick a sprite frame
//!
//! The simulation never chooses frames itself. It hands out a [`Pose`] per
//! actor, and while paused each actor keeps the pose it had when the pause
//! began so the picture holds still.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorKind {
    Pedestrian,
    Vehicle,
    Wreckage,
    Ambulance,
    TowTruck,
}

/// Renderer-facing snapshot of an actor's visual state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub kind: ActorKind,
    /// Discriminant of the actor's state enum
    pub state: u8,
    /// Sub-phase within the state (crash phase, evade frame, ...)
    pub phase: u8,
    /// Locked crash variant: -1 / +1, 0 when none
    pub variant: i8,
    /// Horizontal facing: -1 / +1
    pub facing: i8,
    pub pile: u32,
    /// Short cosmetic reaction (pile bump)
    pub bump: bool,
}

impl Pose {
    pub fn new(kind: ActorKind, state: u8) -> Self {
        Self {
            kind,
            state,
            phase: 0,
            variant: 0,
            facing: 1,
            pile: 1,
            bump: false,
        }
    }
}

/// Actors that can be frozen in place while the world is paused
pub trait Posed {
    /// Pose computed from live state
    fn pose(&self) -> Pose;
    fn frozen_mut(&mut self) -> &mut Option<Pose>;
    fn frozen(&self) -> Option<Pose>;

    /// Pose to draw: the frozen snapshot if paused, otherwise live
    fn display_pose(&self) -> Pose {
        self.frozen().unwrap_or_else(|| self.pose())
    }

    fn freeze(&mut self) {
        let pose = self.pose();
        *self.frozen_mut() = Some(pose);
    }

    fn thaw(&mut self) {
        *self.frozen_mut() = None;
    }
}

/// Facing as the renderer's -1 / +1
#[inline]
pub(crate) fn facing(dir: f32) -> i8 {
    if dir < 0.0 { -1 } else { 1 }
}
