//! Chain-reaction crashes
//!
//! A direct crash drops a root event. When an event fires it crashes every
//! driving vehicle inside its radius, and each of those seeds a child event
//! one generation deeper, with a smaller radius, a few frames later. Depth
//! and radius both shrink every generation, so a cascade always dies out.
//!
//! [`BrakeDetector`] watches the user's drag for a "slam the brakes"
//! motion and turns it into a root event at the pointer.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::SimEvent;
use super::vehicle::Vehicle;
use crate::tuning::{BrakeTuning, ChainTuning, Tuning};

/// A pending crash ripple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainCrashEvent {
    pub origin: Vec2,
    pub radius: f32,
    /// Generations still allowed below this one
    pub depth: u32,
    /// Frames until this event fires
    pub delay: u32,
    /// 0 for the root
    pub generation: u32,
}

impl ChainCrashEvent {
    pub fn root(origin: Vec2, tuning: &ChainTuning) -> Self {
        Self {
            origin,
            radius: tuning.initial_radius,
            depth: tuning.max_depth,
            delay: 0,
            generation: 0,
        }
    }

    /// Next-generation event centered on a vehicle this one crashed
    pub fn child(&self, origin: Vec2, tuning: &ChainTuning) -> Self {
        Self {
            origin,
            radius: self.radius * tuning.shrink,
            depth: self.depth.saturating_sub(1),
            delay: tuning.generation_delay_frames,
            generation: self.generation + 1,
        }
    }
}

/// Pending chain events, owned by the world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainQueue {
    events: Vec<ChainCrashEvent>,
}

impl ChainQueue {
    pub fn push_root(&mut self, origin: Vec2, tuning: &ChainTuning) {
        self.events.push(ChainCrashEvent::root(origin, tuning));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainCrashEvent> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Fire every event whose delay has run out. Returns the number of
    /// vehicles crashed this frame.
    pub fn propagate<R: Rng + ?Sized>(
        &mut self,
        vehicles: &mut [Vehicle],
        rng: &mut R,
        tuning: &Tuning,
        events: &mut Vec<SimEvent>,
    ) -> u32 {
        if self.events.is_empty() {
            return 0;
        }

        let pending = std::mem::take(&mut self.events);
        let mut children = Vec::new();
        let mut crashed = 0;

        for mut ev in pending {
            if ev.delay > 0 {
                ev.delay -= 1;
                if ev.delay > 0 {
                    self.events.push(ev);
                    continue;
                }
            }
            if ev.depth == 0 {
                continue;
            }

            let mut generation_crashed = 0;
            for vehicle in vehicles.iter_mut() {
                if !vehicle.is_driving() || vehicle.removed {
                    continue;
                }
                if vehicle.pos.distance(ev.origin) > ev.radius {
                    continue;
                }
                if vehicle.crash(rng, tuning) {
                    generation_crashed += 1;
                    events.push(SimEvent::VehicleCrashed {
                        id: vehicle.id,
                        pos: vehicle.pos,
                    });
                    let child = ev.child(vehicle.pos, &tuning.chain);
                    if child.depth > 0 {
                        children.push(child);
                    }
                }
            }

            if generation_crashed > 0 {
                log::debug!(
                    "Chain generation {} crashed {} vehicles (radius {:.0})",
                    ev.generation,
                    generation_crashed,
                    ev.radius
                );
                events.push(SimEvent::ChainGeneration {
                    generation: ev.generation,
                    crashed: generation_crashed,
                });
            }
            crashed += generation_crashed;
        }

        self.events.extend(children);
        crashed
    }
}

/// Spots a fast drag that stops dead
#[derive(Debug, Clone, Default)]
pub struct BrakeDetector {
    /// (time ms, pointer position), oldest first
    samples: VecDeque<(f64, Vec2)>,
    last_trigger_ms: Option<f64>,
}

impl BrakeDetector {
    /// Feed a pointer sample. Returns true when a hard brake is recognized.
    pub fn sample(&mut self, pos: Vec2, t_ms: f64, tuning: &BrakeTuning) -> bool {
        // Samples at or after this instant are superseded by it
        while self.samples.back().is_some_and(|&(t, _)| t >= t_ms) {
            self.samples.pop_back();
        }
        self.samples.push_back((t_ms, pos));
        while self.samples.len() > 2
            && self
                .samples
                .front()
                .is_some_and(|&(t, _)| t < t_ms - tuning.history_ms as f64)
        {
            self.samples.pop_front();
        }

        if let Some(last) = self.last_trigger_ms {
            if t_ms - last < tuning.cooldown_ms as f64 {
                return false;
            }
        }

        if !self.is_hard_brake(t_ms, tuning) {
            return false;
        }
        self.last_trigger_ms = Some(t_ms);
        self.samples.clear();
        log::debug!("Hard brake at ({:.0}, {:.0})", pos.x, pos.y);
        true
    }

    /// Pointer lifted: forget the drag, keep the cooldown
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    fn is_hard_brake(&self, now_ms: f64, tuning: &BrakeTuning) -> bool {
        // Segment speeds, newest first, each tagged with its end time
        let segments: Vec<(f64, f32)> = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .rev()
            .map(|(&(t0, p0), &(t1, p1))| (t1, p0.distance(p1) / (t1 - t0) as f32))
            .collect();

        let Some(&(_, current)) = segments.first() else {
            return false;
        };
        if current > tuning.stop_speed {
            return false;
        }

        // Skip the deceleration tail, then count the run of fast segments
        let mut fast_run = 0;
        let mut last_fast_end = None;
        for &(end, speed) in segments.iter().skip(1) {
            if speed >= tuning.fast_speed {
                fast_run += 1;
                last_fast_end.get_or_insert(end);
            } else if fast_run > 0 {
                break;
            }
        }

        fast_run >= tuning.fast_samples
            && last_fast_end.is_some_and(|end| now_ms - end <= tuning.stop_window_ms as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::vehicle::VehicleState;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    /// Driving vehicles spaced `gap` apart along one lane
    fn lane(count: u32, gap: f32) -> Vec<Vehicle> {
        (0..count)
            .map(|i| Vehicle::new(i + 1, Vec2::new(100.0 + i as f32 * gap, 200.0), 1.0, 6.0))
            .collect()
    }

    #[test]
    fn test_root_crashes_everything_in_radius() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut vehicles = lane(3, 50.0);
        vehicles.push(Vehicle::new(9, Vec2::new(900.0, 200.0), 1.0, 6.0));
        let mut queue = ChainQueue::default();
        let mut events = Vec::new();

        queue.push_root(Vec2::new(150.0, 200.0), &tuning.chain);
        let crashed = queue.propagate(&mut vehicles, &mut rng, &tuning, &mut events);

        assert_eq!(crashed, 3);
        assert_eq!(vehicles[3].state(), VehicleState::Driving);
        // One child per crashed vehicle, waiting out the generation delay
        assert_eq!(queue.len(), 3);
        assert!(queue.iter().all(|ev| ev.delay == tuning.chain.generation_delay_frames));
    }

    #[test]
    fn test_children_wait_before_firing() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(1);
        // Both cars inside the root radius; their children find nothing left to crash
        let mut vehicles = lane(2, 100.0);
        let mut queue = ChainQueue::default();
        let mut events = Vec::new();

        queue.push_root(Vec2::new(100.0, 200.0), &tuning.chain);
        let root_radius = tuning.chain.initial_radius;
        assert!(vehicles[1].pos.distance(Vec2::new(100.0, 200.0)) <= root_radius);

        assert_eq!(queue.propagate(&mut vehicles, &mut rng, &tuning, &mut events), 2);
        for _ in 0..tuning.chain.generation_delay_frames {
            assert_eq!(queue.propagate(&mut vehicles, &mut rng, &tuning, &mut events), 0);
        }
        assert!(queue.is_empty(), "children found nothing left to crash");
    }

    #[test]
    fn test_cascade_ripples_down_a_lane_and_stops() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(5);
        // 70 apart: each generation reaches exactly one more car until the radius runs out
        let mut vehicles = lane(10, 70.0);
        let mut queue = ChainQueue::default();
        let mut events = Vec::new();
        queue.push_root(Vec2::new(100.0, 200.0), &tuning.chain);

        let mut frames = 0;
        while !queue.is_empty() {
            queue.propagate(&mut vehicles, &mut rng, &tuning, &mut events);
            frames += 1;
            assert!(frames < 1000, "cascade must terminate");
        }

        let crashed = vehicles.iter().filter(|v| !v.is_driving()).count();
        assert!(crashed >= 2);
        assert!(crashed < 10, "bounded depth must leave the far end of the lane alone");
    }

    #[test]
    fn test_depth_zero_event_is_discarded() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(5);
        let mut vehicles = lane(1, 0.0);
        let mut queue = ChainQueue::default();
        let mut events = Vec::new();
        queue.events.push(ChainCrashEvent {
            depth: 0,
            ..ChainCrashEvent::root(Vec2::new(100.0, 200.0), &tuning.chain)
        });

        assert_eq!(queue.propagate(&mut vehicles, &mut rng, &tuning, &mut events), 0);
        assert!(queue.is_empty());
        assert!(vehicles[0].is_driving());
    }

    /// Samples every 16ms moving at `speed` units/ms along x
    fn drag(det: &mut BrakeDetector, tuning: &BrakeTuning, start: f64, n: u32, speed: f32, x0: f32) -> (f64, f32, bool) {
        let mut t = start;
        let mut x = x0;
        let mut fired = false;
        for _ in 0..n {
            t += 16.0;
            x += speed * 16.0;
            fired |= det.sample(Vec2::new(x, 100.0), t, tuning);
        }
        (t, x, fired)
    }

    #[test]
    fn test_fast_drag_then_stop_is_hard_brake() {
        let tuning = BrakeTuning::default();
        let mut det = BrakeDetector::default();
        let (t, x, fired) = drag(&mut det, &tuning, 0.0, 6, 2.0, 0.0);
        assert!(!fired);
        assert!(det.sample(Vec2::new(x + 0.5, 100.0), t + 16.0, &tuning));
    }

    #[test]
    fn test_slow_drag_then_stop_is_not_brake() {
        let tuning = BrakeTuning::default();
        let mut det = BrakeDetector::default();
        let (t, x, _) = drag(&mut det, &tuning, 0.0, 6, 0.5, 0.0);
        assert!(!det.sample(Vec2::new(x, 100.0), t + 16.0, &tuning));
    }

    #[test]
    fn test_late_sample_rewinds_history() {
        let tuning = BrakeTuning::default();
        let mut det = BrakeDetector::default();
        let (_, x, fired) = drag(&mut det, &tuning, 0.0, 6, 2.0, 0.0);
        assert!(!fired);

        // Arrives stamped before the last two samples, still moving fast
        assert!(!det.sample(Vec2::new(x + 100.0, 100.0), 60.0, &tuning));
        assert_eq!(det.samples.back().map(|&(t, _)| t), Some(60.0));
        assert!(det.samples.iter().zip(det.samples.iter().skip(1)).all(|(a, b)| a.0 < b.0));
    }

    #[test]
    fn test_brake_cooldown_blocks_retrigger() {
        let tuning = BrakeTuning::default();
        let mut det = BrakeDetector::default();
        let (t, x, _) = drag(&mut det, &tuning, 0.0, 6, 2.0, 0.0);
        assert!(det.sample(Vec2::new(x, 100.0), t + 16.0, &tuning));

        let (t2, x2, fired) = drag(&mut det, &tuning, t + 16.0, 6, 2.0, x);
        assert!(!fired);
        assert!(!det.sample(Vec2::new(x2, 100.0), t2 + 16.0, &tuning));
    }

    proptest! {
        #[test]
        fn prop_generations_shrink(depth in 1u32..8, radius in 10.0f32..300.0) {
            let tuning = ChainTuning { max_depth: depth, initial_radius: radius, ..Default::default() };
            let mut ev = ChainCrashEvent::root(Vec2::ZERO, &tuning);
            while ev.depth > 0 {
                let child = ev.child(Vec2::ONE, &tuning);
                prop_assert!(child.depth < ev.depth);
                prop_assert!(child.radius < ev.radius);
                prop_assert_eq!(child.generation, ev.generation + 1);
                ev = child;
            }
            prop_assert_eq!(ev.generation, depth);
        }
    }
}
