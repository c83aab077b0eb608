//! Fixed timestep world step
//!
//! Phase order matters and is fixed:
//! 1. fire due responder dispatches
//! 2. advance vehicles, then pedestrians
//! 3. resolve vehicle/pedestrian contacts
//! 4. propagate chain crashes
//! 5. advance wreckage
//! 6. advance ambulances
//! 7. advance tow trucks
//! 8. compact collections
//!
//! Nothing is removed from a collection until phase 8; earlier phases only
//! flag entities.

use glam::Vec2;

use super::interaction;
use super::responder::AmbulanceTarget;
use super::schedule::fire_due;
use super::state::{SimEvent, World};
use super::vehicle::DebrisSpawn;
use super::wreckage::WreckagePiece;

/// Advance the world by one frame. Does nothing while paused.
pub fn step(world: &mut World) {
    if world.is_paused() {
        return;
    }
    world.clock.advance();
    let now = world.clock.now_ms();

    // 1. Dispatch
    for id in fire_due(&mut world.pedestrians, now) {
        world.dispatch_ambulance(AmbulanceTarget::Pedestrian(id));
    }
    for id in fire_due(&mut world.wreckage, now) {
        world.dispatch_ambulance(AmbulanceTarget::Wreckage(id));
    }
    for id in fire_due(&mut world.vehicles, now) {
        world.dispatch_tow(id);
    }

    // 2. Vehicles and pedestrians
    let mut debris: Vec<DebrisSpawn> = Vec::new();
    for vehicle in world.vehicles.iter_mut().filter(|v| !v.removed && !v.towed) {
        let out = vehicle.step(now, &world.tuning);
        debris.extend(out.debris);
        if out.wrecked {
            world.events.push(SimEvent::VehicleWrecked {
                id: vehicle.id,
                pos: vehicle.pos,
            });
        }
    }
    for from in debris {
        let id = world.next_entity_id();
        let piece = WreckagePiece::spawn(id, &from, &mut world.rng, &world.tuning.wreckage);
        world.wreckage.push(piece);
    }
    for ped in world.pedestrians.iter_mut().filter(|p| !p.removed) {
        ped.step(&world.tuning.world, &world.tuning.pedestrian);
    }

    // 3. Contacts
    let res = interaction::resolve(
        &mut world.vehicles,
        &mut world.pedestrians,
        &mut world.chain,
        &mut world.rng,
        now,
        &world.tuning,
        &mut world.events,
    );
    world.counters.squished += res.squished;
    world.counters.evaded += res.evaded;
    world.counters.crashes += res.crashes;

    // 4. Chain reaction
    let chained = world
        .chain
        .propagate(&mut world.vehicles, &mut world.rng, &world.tuning, &mut world.events);
    world.counters.crashes += chained;
    world.counters.chain_crashes += chained;

    // 5. Wreckage
    for piece in world.wreckage.iter_mut() {
        piece.step(now, &world.tuning.wreckage);
    }

    // 6. Ambulances steer against where everyone was at the start of the phase
    let on_road: Vec<(u32, Vec2)> = world
        .ambulances
        .iter()
        .filter(|a| a.is_active())
        .map(|a| (a.id, a.pos))
        .collect();
    for ambulance in world.ambulances.iter_mut() {
        ambulance.step(
            &on_road,
            &mut world.pedestrians,
            &mut world.wreckage,
            &mut world.rng,
            &world.tuning,
        );
    }

    // 7. Tow trucks
    for truck in world.tow_trucks.iter_mut() {
        truck.step(&mut world.vehicles, &world.tuning);
    }

    // 8. Compaction
    world.compact();
    world.trim_events();
}
