//! Vehicle vs pedestrian resolution, run once per frame
//!
//! For each live vehicle and standing pedestrian, in id order:
//! 1. a lone idle pedestrian who sees the vehicle coming hops aside;
//! 2. otherwise, on contact, the vehicle's speed is compared against the
//!    pile's squish threshold. Fast enough squishes. Too slow, a lone
//!    pedestrian gets shoved aside while a pile stops the vehicle dead.

use glam::Vec2;
use rand::Rng;

use super::chain::ChainQueue;
use super::geometry::aabb_circle_overlap;
use super::pedestrian::{Pedestrian, PedestrianState};
use super::state::SimEvent;
use super::vehicle::Vehicle;
use crate::tuning::Tuning;

/// Counts from one resolver pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    pub squished: u32,
    pub evaded: u32,
    pub crashes: u32,
}

/// Is the pedestrian standing inside the vehicle's forward warning window?
/// The window starts at the front bumper and grows with speed.
pub fn in_warning_window(vehicle: &Vehicle, ped: &Pedestrian, tuning: &Tuning) -> bool {
    let p = &tuning.pedestrian;
    let ahead = (ped.pos.x - vehicle.pos.x) * vehicle.dir - tuning.vehicle.half_width;
    let lead = p.warn_lead_base + vehicle.speed * p.warn_lead_frames + p.hit_radius;
    ahead > 0.0 && ahead <= lead && (ped.pos.y - vehicle.pos.y).abs() < p.warn_lateral
}

/// Lateral direction away from the vehicle; dead-center is a coin flip
fn evade_side<R: Rng + ?Sized>(vehicle: &Vehicle, ped: &Pedestrian, rng: &mut R) -> f32 {
    let dy = ped.pos.y - vehicle.pos.y;
    if dy.abs() < 0.5 {
        if rng.random_bool(0.5) { -1.0 } else { 1.0 }
    } else {
        dy.signum()
    }
}

/// Severity handed to the splat layer: bigger piles and faster hits splash more
fn impact_severity(pile: u32, speed: f32, tuning: &Tuning) -> f32 {
    pile as f32 * speed / tuning.vehicle.squish_base
}

pub fn resolve<R: Rng + ?Sized>(
    vehicles: &mut [Vehicle],
    pedestrians: &mut [Pedestrian],
    chain: &mut ChainQueue,
    rng: &mut R,
    now_ms: f64,
    tuning: &Tuning,
    events: &mut Vec<SimEvent>,
) -> Resolution {
    let mut res = Resolution::default();
    let hit_radius = tuning.pedestrian.hit_radius;

    for vehicle in vehicles.iter_mut() {
        if vehicle.removed || vehicle.is_wrecked() {
            continue;
        }

        for ped in pedestrians.iter_mut() {
            if !ped.is_standing() {
                continue;
            }

            // Pre-emptive dodge
            if vehicle.is_driving()
                && ped.pile == 1
                && ped.state() == PedestrianState::Idle
                && ped.evade_cooldown == 0
                && in_warning_window(vehicle, ped, tuning)
            {
                let away = evade_side(vehicle, ped, rng);
                if ped.evade(away, &tuning.pedestrian) {
                    res.evaded += 1;
                }
                continue;
            }

            let bounds = vehicle.bounds(tuning);
            if !aabb_circle_overlap(&bounds, ped.pos, hit_radius) {
                continue;
            }

            let required = tuning.vehicle.required_speed(ped.pile);
            if vehicle.speed >= required {
                if let Some(pile) = ped.squish(now_ms, &tuning.pedestrian) {
                    events.push(SimEvent::Impact {
                        pos: ped.pos,
                        dir: Vec2::new(vehicle.dir, 0.0),
                        severity: impact_severity(pile, vehicle.speed, tuning),
                    });
                    vehicle.slow_down(tuning.vehicle.squish_speed_loss, tuning);
                    res.squished += 1;
                }
            } else if ped.pile == 1 {
                let away = evade_side(vehicle, ped, rng);
                if ped.evade(away, &tuning.pedestrian) {
                    vehicle.slow_down(tuning.vehicle.hit_speed_loss, tuning);
                    res.evaded += 1;
                }
            } else {
                ped.bump(&tuning.pedestrian);
                if vehicle.crash(rng, tuning) {
                    log::debug!("Pile of {} stopped vehicle {}", ped.pile, vehicle.id);
                    events.push(SimEvent::VehicleCrashed {
                        id: vehicle.id,
                        pos: vehicle.pos,
                    });
                    chain.push_root(vehicle.pos, &tuning.chain);
                    res.crashes += 1;
                }
            }
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::vehicle::VehicleState;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    struct Rig {
        tuning: Tuning,
        rng: Pcg32,
        chain: ChainQueue,
        events: Vec<SimEvent>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                tuning: Tuning::default(),
                rng: Pcg32::seed_from_u64(42),
                chain: ChainQueue::default(),
                events: Vec::new(),
            }
        }

        fn run(&mut self, vehicles: &mut [Vehicle], peds: &mut [Pedestrian]) -> Resolution {
            resolve(
                vehicles,
                peds,
                &mut self.chain,
                &mut self.rng,
                1000.0,
                &self.tuning,
                &mut self.events,
            )
        }
    }

    /// Pedestrian of the given pile sitting right on the vehicle's nose
    fn struck(pile: u32, speed: f32) -> (Vehicle, Pedestrian) {
        let vehicle = Vehicle::new(1, Vec2::new(100.0, 200.0), 1.0, speed);
        let mut ped = Pedestrian::new(2, Vec2::new(110.0, 200.0));
        ped.pile = pile;
        (vehicle, ped)
    }

    #[test]
    fn test_threshold_speed_squishes_single() {
        let mut rig = Rig::new();
        let base = rig.tuning.vehicle.squish_base;
        let (v, p) = struck(1, base);
        let mut vs = [v];
        let mut ps = [p];

        let res = rig.run(&mut vs, &mut ps);
        assert_eq!(res.squished, 1);
        assert_eq!(ps[0].state(), PedestrianState::Squished);
        assert_eq!(ps[0].dispatch.fire_at_ms(), Some(1500.0));
        assert!(vs[0].speed < base);
        assert!(matches!(rig.events[0], SimEvent::Impact { .. }));
    }

    #[test]
    fn test_below_threshold_single_evades() {
        let mut rig = Rig::new();
        let base = rig.tuning.vehicle.squish_base;
        let (v, p) = struck(1, base - 1.0);
        let mut vs = [v];
        let mut ps = [p];

        let res = rig.run(&mut vs, &mut ps);
        assert_eq!(res, Resolution { squished: 0, evaded: 1, crashes: 0 });
        assert_eq!(ps[0].state(), PedestrianState::Evading);
        assert_eq!(vs[0].state(), VehicleState::Driving);
    }

    #[test]
    fn test_below_threshold_pile_crashes_vehicle() {
        let mut rig = Rig::new();
        let required = rig.tuning.vehicle.required_speed(3);
        let (v, p) = struck(3, required - 1.0);
        let mut vs = [v];
        let mut ps = [p];

        let res = rig.run(&mut vs, &mut ps);
        assert_eq!(res.crashes, 1);
        assert_eq!(vs[0].state(), VehicleState::Crashing);
        assert!(ps[0].is_standing());
        assert_eq!(ps[0].pile, 3);
        assert!(ps[0].bump_frames > 0);
        assert_eq!(rig.chain.len(), 1);
    }

    #[test]
    fn test_pile_squished_at_its_own_threshold() {
        let mut rig = Rig::new();
        let required = rig.tuning.vehicle.required_speed(4);
        let (v, p) = struck(4, required);
        let mut vs = [v];
        let mut ps = [p];

        rig.run(&mut vs, &mut ps);
        assert_eq!(ps[0].state(), PedestrianState::Squished);
        assert_eq!(ps[0].pile, 1);
        match rig.events[0] {
            SimEvent::Impact { severity, .. } => assert!(severity > 4.0),
            ref other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_warning_window_triggers_pre_emptive_dodge() {
        let mut rig = Rig::new();
        let mut vs = [Vehicle::new(1, Vec2::new(100.0, 200.0), 1.0, 5.0)];
        // Just ahead of the front bumper, slightly below the centerline
        let mut ps = [Pedestrian::new(2, Vec2::new(100.0 + 22.0 + 10.0, 204.0))];

        assert!(in_warning_window(&vs[0], &ps[0], &rig.tuning));
        let res = rig.run(&mut vs, &mut ps);
        assert_eq!(res.evaded, 1);
        assert!(ps[0].vel.y > 0.0, "should hop away from the vehicle's side");
    }

    #[test]
    fn test_warning_window_ignores_pedestrian_behind() {
        let tuning = Tuning::default();
        let v = Vehicle::new(1, Vec2::new(100.0, 200.0), 1.0, 5.0);
        let p = Pedestrian::new(2, Vec2::new(60.0, 200.0));
        assert!(!in_warning_window(&v, &p, &tuning));
    }

    #[test]
    fn test_first_vehicle_claims_contested_pedestrian() {
        let mut rig = Rig::new();
        let base = rig.tuning.vehicle.squish_base;
        let mut vs = [
            Vehicle::new(1, Vec2::new(100.0, 200.0), 1.0, base + 2.0),
            Vehicle::new(3, Vec2::new(120.0, 200.0), -1.0, base + 2.0),
        ];
        let mut ps = [Pedestrian::new(2, Vec2::new(110.0, 200.0))];

        let res = rig.run(&mut vs, &mut ps);
        assert_eq!(res.squished, 1);
        assert!(vs[0].speed < base + 2.0);
        assert_eq!(vs[1].speed, base + 2.0);
        assert_eq!(rig.events.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_required_speed_strictly_increasing(pile in 1u32..50) {
            let tuning = Tuning::default();
            prop_assert!(tuning.vehicle.required_speed(pile + 1) > tuning.vehicle.required_speed(pile));
        }

        #[test]
        fn prop_below_threshold_never_squishes(pile in 1u32..=5, deficit in 1.0f32..5.0) {
            let mut rig = Rig::new();
            let speed = (rig.tuning.vehicle.required_speed(pile) - deficit).max(0.1);
            let (v, p) = struck(pile, speed);
            let mut vs = [v];
            let mut ps = [p];
            rig.run(&mut vs, &mut ps);

            prop_assert!(ps[0].is_standing());
            if pile == 1 {
                prop_assert_eq!(ps[0].state(), PedestrianState::Evading);
                prop_assert_eq!(vs[0].state(), VehicleState::Driving);
            } else {
                prop_assert_eq!(vs[0].state(), VehicleState::Crashing);
            }
        }
    }
}
