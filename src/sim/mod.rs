//! Deterministic simulation module
//!
//! All street logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod ambulance;
pub mod chain;
pub mod fsm;
pub mod geometry;
pub mod interaction;
pub mod pedestrian;
pub mod pose;
pub mod responder;
pub mod schedule;
pub mod state;
pub mod tick;
pub mod tow;
pub mod vehicle;
pub mod wreckage;

pub use ambulance::{Ambulance, AmbulanceState};
pub use chain::{BrakeDetector, ChainCrashEvent, ChainQueue};
pub use fsm::{Fsm, FsmState};
pub use pedestrian::{Pedestrian, PedestrianState};
pub use pose::{ActorKind, Pose, Posed};
pub use responder::{AmbulanceTarget, ResponderKind};
pub use schedule::{Dispatch, SimClock};
pub use state::{
    Counters, GestureAxis, Mode, PedestrianSpawn, SimEvent, SpawnRequest, World, WorldStats,
    MAX_PENDING_EVENTS,
};
pub use tick::step;
pub use tow::{TowState, TowTruck};
pub use vehicle::{SlipSign, Vehicle, VehicleState};
pub use wreckage::{WreckagePiece, WreckageState};
