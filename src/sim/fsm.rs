//! Shared finite-state-machine core for every actor
//!
//! Each actor defines a small `Copy` enum of states and the transitions it
//! allows; [`Fsm`] tracks the current state and how many frames it has been
//! held. Illegal transitions are refused rather than applied, which is what
//! keeps terminal states (squished, wrecked, resting) terminal.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// A state enum with a transition guard
pub trait FsmState: Copy + Eq + Debug {
    /// Whether `self -> next` is a legal edge
    fn can_transition_to(self, next: Self) -> bool;

    /// States with no outgoing edges
    fn is_terminal(self) -> bool {
        false
    }
}

/// Current state plus frames spent in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fsm<S> {
    state: S,
    frames: u32,
}

impl<S: FsmState> Fsm<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            frames: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> S {
        self.state
    }

    #[inline]
    pub fn is(&self, state: S) -> bool {
        self.state == state
    }

    /// Frames elapsed since the last transition
    #[inline]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Count one frame in the current state
    #[inline]
    pub fn tick(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    /// Move to `next` if the guard allows it. Returns true if the state changed.
    pub fn transition_to(&mut self, next: S) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.can_transition_to(next) {
            log::trace!("Rejected transition {:?} -> {:?}", self.state, next);
            return false;
        }
        self.state = next;
        self.frames = 0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Closed,
        Open,
        Broken,
    }

    impl FsmState for Door {
        fn can_transition_to(self, next: Self) -> bool {
            !self.is_terminal() && next != self
        }

        fn is_terminal(self) -> bool {
            self == Door::Broken
        }
    }

    #[test]
    fn test_transition_resets_frames() {
        let mut fsm = Fsm::new(Door::Closed);
        fsm.tick();
        fsm.tick();
        assert_eq!(fsm.frames(), 2);

        assert!(fsm.transition_to(Door::Open));
        assert_eq!(fsm.state(), Door::Open);
        assert_eq!(fsm.frames(), 0);
    }

    #[test]
    fn test_self_transition_is_noop() {
        let mut fsm = Fsm::new(Door::Open);
        fsm.tick();
        assert!(!fsm.transition_to(Door::Open));
        assert_eq!(fsm.frames(), 1);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut fsm = Fsm::new(Door::Closed);
        assert!(fsm.transition_to(Door::Broken));
        assert!(!fsm.transition_to(Door::Closed));
        assert!(fsm.is(Door::Broken));
    }
}
