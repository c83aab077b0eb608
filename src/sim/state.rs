//! World state and the intake surface used by the input layer
//!
//! The world owns every actor collection, the seeded RNG and the clock.
//! Collections are kept sorted by id (ids are handed out monotonically and
//! only ever appended), which is what lets responders look their targets up
//! by binary search and keeps iteration order stable for replays.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ambulance::{Ambulance, AmbulanceState};
use super::chain::{BrakeDetector, ChainQueue};
use super::geometry::{aabb_circle_overlap, circles_overlap};
use super::pedestrian::{Pedestrian, PedestrianState};
use super::pose::Posed;
use super::responder::{AmbulanceTarget, ResponderKind};
use super::schedule::SimClock;
use super::tow::{TowState, TowTruck};
use super::vehicle::{Vehicle, VehicleState};
use super::wreckage::WreckagePiece;
use crate::tuning::Tuning;

/// Undrained events beyond this are dropped, oldest first
pub const MAX_PENDING_EVENTS: usize = 1024;

/// Global simulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Animate,
    /// No stepping; every actor holds its frozen pose
    Paused,
}

/// Fire-and-forget notifications for the host (effects, sound, UI)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A pedestrian pile was squished: splat at `pos`, sprayed along `dir`
    Impact { pos: Vec2, dir: Vec2, severity: f32 },
    VehicleCrashed { id: u32, pos: Vec2 },
    VehicleWrecked { id: u32, pos: Vec2 },
    Dispatched {
        kind: ResponderKind,
        responder: u32,
        target: u32,
    },
    ResponderDeparted { kind: ResponderKind, id: u32 },
    ChainGeneration { generation: u32, crashed: u32 },
}

/// Outcome of a single pedestrian spawn request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedestrianSpawn {
    /// New pedestrian with this id
    Spawned(u32),
    /// Joined the existing pile with this id
    Stacked(u32),
    /// Landed on a pile that is full or still cooling down
    Suppressed,
}

/// Axis a gesture was classified along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureAxis {
    Horizontal,
    Vertical,
}

/// A classified spawn gesture from the input layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub pos: Vec2,
    pub axis: GestureAxis,
    /// Sign of the horizontal component (vehicle heading)
    pub dir: f32,
    /// Gesture speed (units per frame)
    pub speed: f32,
    /// Brush size; pedestrians per vertical gesture
    pub brush: u32,
}

/// Running totals since the world was created or last cleared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub squished: u32,
    pub evaded: u32,
    pub crashes: u32,
    pub chain_crashes: u32,
    pub ambulances_dispatched: u32,
    pub tows_dispatched: u32,
}

/// Snapshot of the world for logging and the headless driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldStats {
    pub frame: u64,
    pub time_ms: f64,
    pub mode: Mode,
    pub pedestrians_idle: usize,
    pub pedestrians_evading: usize,
    pub pedestrians_squished: usize,
    /// Pedestrians counted through their piles
    pub pedestrians_total: u32,
    pub vehicles_driving: usize,
    pub vehicles_crashing: usize,
    pub vehicles_wrecked: usize,
    pub wreckage_pieces: usize,
    pub chain_pending: usize,
    pub ambulances_active: usize,
    pub tow_trucks_active: usize,
    pub totals: Counters,
}

/// The whole simulation
#[derive(Debug, Clone)]
pub struct World {
    pub tuning: Tuning,
    pub clock: SimClock,
    mode: Mode,
    seed: u64,
    pub(crate) rng: Pcg32,
    /// All collections sorted by id for determinism
    pub pedestrians: Vec<Pedestrian>,
    pub vehicles: Vec<Vehicle>,
    pub wreckage: Vec<WreckagePiece>,
    pub ambulances: Vec<Ambulance>,
    pub tow_trucks: Vec<TowTruck>,
    pub chain: ChainQueue,
    pub(crate) brake: BrakeDetector,
    pub(crate) events: Vec<SimEvent>,
    pub counters: Counters,
    next_id: u32,
}

impl World {
    /// Create an empty world with default tuning
    pub fn new(seed: u64) -> Self {
        Self::with_tuning(seed, Tuning::default())
    }

    pub fn with_tuning(seed: u64, tuning: Tuning) -> Self {
        log::info!(
            "World created: seed {} size {}x{}",
            seed,
            tuning.world.width,
            tuning.world.height
        );
        Self {
            clock: SimClock::new(tuning.world.frame_ms),
            tuning,
            mode: Mode::Animate,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            pedestrians: Vec::new(),
            vehicles: Vec::new(),
            wreckage: Vec::new(),
            ambulances: Vec::new(),
            tow_trucks: Vec::new(),
            chain: ChainQueue::default(),
            brake: BrakeDetector::default(),
            events: Vec::new(),
            counters: Counters::default(),
            next_id: 1,
        }
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.mode == Mode::Paused
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a vehicle. Speed is clamped into the vehicle speed band.
    pub fn spawn_vehicle(&mut self, pos: Vec2, dir: f32, speed: f32) -> u32 {
        let id = self.next_entity_id();
        let pos = Vec2::new(pos.x, self.tuning.world.clamp_y(pos.y));
        let speed = self.tuning.vehicle.clamp_speed(speed);
        let mut vehicle = Vehicle::new(id, pos, dir, speed);
        if self.is_paused() {
            vehicle.freeze();
        }
        self.vehicles.push(vehicle);
        log::trace!("Vehicle {} spawned at ({:.0}, {:.0}) speed {:.1}", id, pos.x, pos.y, speed);
        id
    }

    /// Add a pedestrian, or grow the nearest pile within the stack radius
    pub fn spawn_pedestrian(&mut self, pos: Vec2, allow_stack: bool) -> PedestrianSpawn {
        let pos = Vec2::new(pos.x, self.tuning.world.clamp_y(pos.y));

        if allow_stack {
            let stack_radius = self.tuning.pedestrian.stack_radius;
            let nearest = self
                .pedestrians
                .iter_mut()
                .filter(|p| p.is_standing() && p.pos.distance(pos) <= stack_radius)
                .min_by(|a, b| a.pos.distance(pos).total_cmp(&b.pos.distance(pos)));
            if let Some(pile) = nearest {
                return if pile.try_stack(&self.tuning.pedestrian) {
                    PedestrianSpawn::Stacked(pile.id)
                } else {
                    PedestrianSpawn::Suppressed
                };
            }
        }

        let id = self.next_entity_id();
        let mut ped = Pedestrian::new(id, pos);
        if self.is_paused() {
            ped.freeze();
        }
        self.pedestrians.push(ped);
        PedestrianSpawn::Spawned(id)
    }

    /// Drop `brush` pedestrians jittered around `pos`. Returns how many
    /// landed (spawned or stacked).
    pub fn spawn_pedestrian_burst(&mut self, pos: Vec2, brush: u32) -> usize {
        let spread = self.tuning.pedestrian.burst_spread * brush as f32;
        let mut landed = 0;
        for _ in 0..brush {
            let jitter = if spread > 0.0 {
                Vec2::new(
                    self.rng.random_range(-spread..=spread),
                    self.rng.random_range(-spread..=spread),
                )
            } else {
                Vec2::ZERO
            };
            if self.spawn_pedestrian(pos + jitter, true) != PedestrianSpawn::Suppressed {
                landed += 1;
            }
        }
        landed
    }

    /// Route a classified gesture to the matching spawn
    pub fn spawn_from_gesture(&mut self, req: SpawnRequest) -> usize {
        match req.axis {
            GestureAxis::Horizontal => {
                self.spawn_vehicle(req.pos, req.dir, req.speed);
                1
            }
            GestureAxis::Vertical => self.spawn_pedestrian_burst(req.pos, req.brush.max(1)),
        }
    }

    /// Remove pedestrians, vehicles and wreckage touching the eraser.
    /// Responders already en route notice and leave on their own.
    pub fn erase_near(&mut self, pos: Vec2, radius: f32) -> usize {
        let mut erased = 0;
        for p in self.pedestrians.iter_mut().filter(|p| !p.removed) {
            if circles_overlap(p.pos, self.tuning.pedestrian.hit_radius, pos, radius) {
                p.mark_removed();
                erased += 1;
            }
        }
        for v in self.vehicles.iter_mut().filter(|v| !v.removed) {
            if aabb_circle_overlap(&v.bounds(&self.tuning), pos, radius) {
                v.removed = true;
                erased += 1;
            }
        }
        for w in self.wreckage.iter_mut().filter(|w| !w.dead) {
            if w.pos.distance(pos) <= radius {
                w.mark_removed();
                erased += 1;
            }
        }
        if erased > 0 {
            log::debug!("Erased {} actors near ({:.0}, {:.0})", erased, pos.x, pos.y);
        }
        erased
    }

    /// Crash every driving vehicle around `pos`, rippling outward
    pub fn trigger_chain_crash(&mut self, pos: Vec2) {
        if self.is_paused() {
            return;
        }
        self.chain.push_root(pos, &self.tuning.chain);
    }

    /// Feed a pointer sample from an ongoing drag; a hard brake triggers a
    /// chain crash at the pointer. Returns true if it did.
    pub fn drag_sample(&mut self, pos: Vec2, t_ms: f64) -> bool {
        if self.is_paused() || !self.brake.sample(pos, t_ms, &self.tuning.brake) {
            return false;
        }
        self.trigger_chain_crash(pos);
        true
    }

    /// Pointer released
    pub fn end_drag(&mut self) {
        self.brake.reset();
    }

    /// Empty every collection
    pub fn clear_all(&mut self) {
        self.pedestrians.clear();
        self.vehicles.clear();
        self.wreckage.clear();
        self.ambulances.clear();
        self.tow_trucks.clear();
        self.chain.clear();
        self.brake.reset();
        self.events.clear();
        self.counters = Counters::default();
        log::info!("World cleared");
    }

    /// Switch between animating and paused.
    /// Pausing drops pending chain events and all wreckage, then freezes
    /// every remaining actor's pose. Resuming just thaws.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        match mode {
            Mode::Paused => {
                self.chain.clear();
                self.wreckage.clear();
                self.brake.reset();
                self.for_each_posed(|a| a.freeze());
            }
            Mode::Animate => self.for_each_posed(|a| a.thaw()),
        }
        log::info!("Mode: {:?}", mode);
    }

    fn for_each_posed(&mut self, mut f: impl FnMut(&mut dyn Posed)) {
        self.pedestrians.iter_mut().for_each(|a| f(a));
        self.vehicles.iter_mut().for_each(|a| f(a));
        self.wreckage.iter_mut().for_each(|a| f(a));
        self.ambulances.iter_mut().for_each(|a| f(a));
        self.tow_trucks.iter_mut().for_each(|a| f(a));
    }

    /// Take every event accumulated since the last drain
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events waiting to be drained
    pub fn pending_events(&self) -> &[SimEvent] {
        &self.events
    }

    pub(crate) fn push_event(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Drop the oldest events if the host is not draining
    pub(crate) fn trim_events(&mut self) {
        if self.events.len() > MAX_PENDING_EVENTS {
            let excess = self.events.len() - MAX_PENDING_EVENTS;
            self.events.drain(..excess);
            log::trace!("Dropped {} undrained events", excess);
        }
    }

    /// Send an ambulance for a squished pedestrian or resting wreck
    pub(crate) fn dispatch_ambulance(&mut self, target: AmbulanceTarget) -> Option<u32> {
        let target_pos = target
            .resolve_valid(&mut self.pedestrians, &mut self.wreckage)?
            .pos();
        let occupied: Vec<Vec2> = self
            .ambulances
            .iter()
            .filter(|a| a.is_active())
            .map(|a| a.pos)
            .collect();
        let id = self.next_entity_id();
        let ambulance = Ambulance::spawn(id, target, target_pos, &occupied, &self.tuning);
        log::debug!("Ambulance {} dispatched for {:?}", id, target);
        self.ambulances.push(ambulance);
        self.counters.ambulances_dispatched += 1;
        self.push_event(SimEvent::Dispatched {
            kind: ResponderKind::Ambulance,
            responder: id,
            target: target.id(),
        });
        Some(id)
    }

    /// Send a tow truck for a wrecked vehicle, or drop a wreck out of reach
    pub(crate) fn dispatch_tow(&mut self, vehicle_id: u32) -> Option<u32> {
        let idx = self.vehicles.binary_search_by_key(&vehicle_id, |v| v.id).ok()?;
        let vehicle = &mut self.vehicles[idx];
        if !vehicle.is_valid_tow_target(&self.tuning) {
            // Off-screen wreck: no truck will come for it
            if vehicle.is_wrecked() && !vehicle.towed {
                log::debug!("Vehicle {} wrecked out of reach, dropped", vehicle_id);
                vehicle.removed = true;
            }
            return None;
        }
        let target_pos = vehicle.pos;
        let id = self.next_entity_id();
        let truck = TowTruck::spawn(id, vehicle_id, target_pos, &self.tuning);
        log::debug!("Tow truck {} dispatched for vehicle {}", id, vehicle_id);
        self.tow_trucks.push(truck);
        self.counters.tows_dispatched += 1;
        self.push_event(SimEvent::Dispatched {
            kind: ResponderKind::TowTruck,
            responder: id,
            target: vehicle_id,
        });
        Some(id)
    }

    /// Drop removed, expired and departed entities
    pub(crate) fn compact(&mut self) {
        self.pedestrians.retain(|p| !p.removed);
        self.vehicles.retain(|v| !v.removed);
        self.wreckage.retain(|w| !w.dead);

        let mut departed = Vec::new();
        self.ambulances.retain(|a| {
            if a.departed {
                departed.push(SimEvent::ResponderDeparted {
                    kind: ResponderKind::Ambulance,
                    id: a.id,
                });
            }
            !a.departed
        });
        self.tow_trucks.retain(|t| {
            if t.departed {
                departed.push(SimEvent::ResponderDeparted {
                    kind: ResponderKind::TowTruck,
                    id: t.id,
                });
            }
            !t.departed
        });
        self.events.extend(departed);
    }

    pub fn stats(&self) -> WorldStats {
        let peds = |s: PedestrianState| self.pedestrians.iter().filter(|p| p.state() == s).count();
        let cars = |s: VehicleState| self.vehicles.iter().filter(|v| v.state() == s).count();
        WorldStats {
            frame: self.clock.frame(),
            time_ms: self.clock.now_ms(),
            mode: self.mode,
            pedestrians_idle: peds(PedestrianState::Idle),
            pedestrians_evading: peds(PedestrianState::Evading),
            pedestrians_squished: peds(PedestrianState::Squished),
            pedestrians_total: self
                .pedestrians
                .iter()
                .filter(|p| p.is_standing())
                .map(|p| p.pile)
                .sum(),
            vehicles_driving: cars(VehicleState::Driving),
            vehicles_crashing: cars(VehicleState::Crashing),
            vehicles_wrecked: cars(VehicleState::Wrecked),
            wreckage_pieces: self.wreckage.len(),
            chain_pending: self.chain.len(),
            ambulances_active: self
                .ambulances
                .iter()
                .filter(|a| a.state() != AmbulanceState::Leave)
                .count(),
            tow_trucks_active: self
                .tow_trucks
                .iter()
                .filter(|t| t.state() != TowState::Leave)
                .count(),
            totals: self.counters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut world = World::new(1);
        let a = world.spawn_vehicle(Vec2::new(10.0, 100.0), 1.0, 5.0);
        let b = world.spawn_vehicle(Vec2::new(10.0, 150.0), -1.0, 5.0);
        assert!(b > a);
        assert!(world.vehicles.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_vehicle_spawn_clamps_speed_and_lane() {
        let mut world = World::new(1);
        world.spawn_vehicle(Vec2::new(10.0, -50.0), -1.0, 99.0);
        let v = &world.vehicles[0];
        assert_eq!(v.speed, world.tuning.vehicle.max_speed);
        assert_eq!(v.pos.y, world.tuning.world.y_margin);
        assert_eq!(v.dir, -1.0);
    }

    #[test]
    fn test_pedestrian_stacking_and_suppression() {
        let mut world = World::new(1);
        let pos = Vec2::new(200.0, 200.0);
        let PedestrianSpawn::Spawned(id) = world.spawn_pedestrian(pos, true) else {
            panic!("first spawn should create a pedestrian");
        };
        assert_eq!(world.spawn_pedestrian(pos + Vec2::new(3.0, 0.0), true), PedestrianSpawn::Stacked(id));
        // Same drag, still cooling down
        assert_eq!(world.spawn_pedestrian(pos, true), PedestrianSpawn::Suppressed);
        assert_eq!(world.pedestrians.len(), 1);
        assert_eq!(world.pedestrians[0].pile, 2);

        // Stacking disabled always spawns
        assert!(matches!(world.spawn_pedestrian(pos, false), PedestrianSpawn::Spawned(_)));
        assert_eq!(world.pedestrians.len(), 2);
    }

    #[test]
    fn test_burst_is_deterministic_per_seed() {
        let mut a = World::new(77);
        let mut b = World::new(77);
        a.spawn_pedestrian_burst(Vec2::new(300.0, 300.0), 4);
        b.spawn_pedestrian_burst(Vec2::new(300.0, 300.0), 4);
        let pa: Vec<Vec2> = a.pedestrians.iter().map(|p| p.pos).collect();
        let pb: Vec<Vec2> = b.pedestrians.iter().map(|p| p.pos).collect();
        assert_eq!(pa, pb);
        assert!(!pa.is_empty());
    }

    #[test]
    fn test_gesture_routing() {
        let mut world = World::new(3);
        world.spawn_from_gesture(SpawnRequest {
            pos: Vec2::new(100.0, 100.0),
            axis: GestureAxis::Horizontal,
            dir: -1.0,
            speed: 0.5,
            brush: 1,
        });
        assert_eq!(world.vehicles.len(), 1);
        assert_eq!(world.vehicles[0].speed, world.tuning.vehicle.min_speed);

        let landed = world.spawn_from_gesture(SpawnRequest {
            pos: Vec2::new(400.0, 300.0),
            axis: GestureAxis::Vertical,
            dir: 1.0,
            speed: 3.0,
            brush: 0,
        });
        assert_eq!(landed, 1);
        assert_eq!(world.pedestrians.len(), 1);
    }

    #[test]
    fn test_erase_near_marks_everything_in_reach() {
        let mut world = World::new(1);
        world.spawn_pedestrian(Vec2::new(100.0, 100.0), false);
        world.spawn_pedestrian(Vec2::new(400.0, 100.0), false);
        world.spawn_vehicle(Vec2::new(120.0, 110.0), 1.0, 5.0);

        assert_eq!(world.erase_near(Vec2::new(105.0, 100.0), 10.0), 2);
        world.compact();
        assert_eq!(world.pedestrians.len(), 1);
        assert!(world.vehicles.is_empty());
    }

    #[test]
    fn test_pause_freezes_and_drops_transients() {
        let mut world = World::new(1);
        world.spawn_vehicle(Vec2::new(300.0, 200.0), 1.0, 5.0);
        world.trigger_chain_crash(Vec2::new(50.0, 50.0));
        assert_eq!(world.chain.len(), 1);

        world.set_mode(Mode::Paused);
        assert!(world.chain.is_empty());
        assert!(world.vehicles[0].frozen.is_some());

        // Spawned while paused: frozen from the start
        world.spawn_pedestrian(Vec2::new(10.0, 10.0), false);
        assert!(world.pedestrians[0].frozen.is_some());
        // Chain gestures are ignored while paused
        world.trigger_chain_crash(Vec2::new(50.0, 50.0));
        assert!(world.chain.is_empty());

        world.set_mode(Mode::Animate);
        assert!(world.vehicles[0].frozen.is_none());
        assert!(world.pedestrians[0].frozen.is_none());
    }

    #[test]
    fn test_clear_all_empties_world() {
        let mut world = World::new(1);
        world.spawn_vehicle(Vec2::new(300.0, 200.0), 1.0, 5.0);
        world.spawn_pedestrian_burst(Vec2::new(100.0, 100.0), 3);
        world.trigger_chain_crash(Vec2::new(300.0, 200.0));
        world.clear_all();
        assert_eq!(world.stats().pedestrians_idle, 0);
        assert_eq!(world.stats().vehicles_driving, 0);
        assert!(world.chain.is_empty());
    }

    #[test]
    fn test_event_backlog_is_capped() {
        let mut world = World::new(1);
        for generation in 0..(MAX_PENDING_EVENTS as u32 + 10) {
            world.push_event(SimEvent::ChainGeneration { generation, crashed: 1 });
        }
        world.trim_events();
        let events = world.drain_events();
        assert_eq!(events.len(), MAX_PENDING_EVENTS);
        assert_eq!(events[0], SimEvent::ChainGeneration { generation: 10, crashed: 1 });
        assert!(world.pending_events().is_empty());
    }

    #[test]
    fn test_stats_serialize() {
        let mut world = World::new(1);
        world.spawn_pedestrian(Vec2::new(100.0, 100.0), false);
        world.spawn_pedestrian(Vec2::new(100.0, 100.0), true);
        let stats = world.stats();
        assert_eq!(stats.pedestrians_total, 2);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"pedestrians_idle\":1"));
    }

    #[test]
    fn test_leaving_responders_are_not_active() {
        let mut world = World::new(1);
        let id = world.next_entity_id();
        let truck = TowTruck::spawn(id, 99, Vec2::new(300.0, 200.0), &world.tuning);
        world.tow_trucks.push(truck);
        assert_eq!(world.stats().tow_trucks_active, 1);

        // No such wreck: the truck turns back on its first step
        let tuning = world.tuning.clone();
        world.tow_trucks[0].step(&mut world.vehicles, &tuning);
        assert_eq!(world.tow_trucks[0].state(), TowState::Leave);
        assert_eq!(world.stats().tow_trucks_active, 0);
        assert_eq!(world.stats().ambulances_active, 0);
    }
}
