//! Pieces shared by ambulances and tow trucks
//!
//! Responders hold their target by id only. Every frame they look it up
//! again and check it is still worth driving to; if it has gone they simply
//! leave.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pedestrian::Pedestrian;
use super::wreckage::WreckagePiece;
use crate::tuning::WorldTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponderKind {
    Ambulance,
    TowTruck,
}

/// What an ambulance has been sent to collect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmbulanceTarget {
    Pedestrian(u32),
    Wreckage(u32),
}

/// Borrowed, resolved ambulance target
pub enum TargetMut<'a> {
    Pedestrian(&'a mut Pedestrian),
    Wreckage(&'a mut WreckagePiece),
}

impl TargetMut<'_> {
    pub fn pos(&self) -> Vec2 {
        match self {
            TargetMut::Pedestrian(p) => p.pos,
            TargetMut::Wreckage(w) => w.pos,
        }
    }

    pub fn is_valid_responder_target(&self) -> bool {
        match self {
            TargetMut::Pedestrian(p) => p.is_valid_responder_target(),
            TargetMut::Wreckage(w) => w.is_valid_responder_target(),
        }
    }

    pub fn mark_removed(&mut self) {
        match self {
            TargetMut::Pedestrian(p) => p.mark_removed(),
            TargetMut::Wreckage(w) => w.mark_removed(),
        }
    }
}

impl AmbulanceTarget {
    /// Look the target up; collections are kept sorted by id
    pub fn resolve<'a>(
        self,
        pedestrians: &'a mut [Pedestrian],
        wreckage: &'a mut [WreckagePiece],
    ) -> Option<TargetMut<'a>> {
        match self {
            AmbulanceTarget::Pedestrian(id) => {
                let i = pedestrians.binary_search_by_key(&id, |p| p.id).ok()?;
                Some(TargetMut::Pedestrian(&mut pedestrians[i]))
            }
            AmbulanceTarget::Wreckage(id) => {
                let i = wreckage.binary_search_by_key(&id, |w| w.id).ok()?;
                Some(TargetMut::Wreckage(&mut wreckage[i]))
            }
        }
    }

    /// Resolve and keep only a target that is still collectable
    pub fn resolve_valid<'a>(
        self,
        pedestrians: &'a mut [Pedestrian],
        wreckage: &'a mut [WreckagePiece],
    ) -> Option<TargetMut<'a>> {
        self.resolve(pedestrians, wreckage)
            .filter(TargetMut::is_valid_responder_target)
    }

    pub fn id(self) -> u32 {
        match self {
            AmbulanceTarget::Pedestrian(id) | AmbulanceTarget::Wreckage(id) => id,
        }
    }
}

/// Entry point just off the horizontal edge opposite the target, nudged
/// vertically away from responders already on the road.
/// Returns the position and the initial heading (-1 / +1).
pub fn spawn_point(
    target: Vec2,
    world: &WorldTuning,
    margin: f32,
    clearance: f32,
    retries: u32,
    occupied: &[Vec2],
) -> (Vec2, f32) {
    let (x, dir) = if target.x < world.width * 0.5 {
        (world.width + margin, -1.0)
    } else {
        (-margin, 1.0)
    };

    let mut y = world.clamp_y(target.y);
    for _ in 0..retries {
        let here = Vec2::new(x, y);
        let nearest = occupied
            .iter()
            .filter(|o| o.distance(here) < clearance)
            .min_by(|a, b| a.distance(here).total_cmp(&b.distance(here)));
        let Some(other) = nearest else {
            break;
        };
        let away = if y >= other.y { 1.0 } else { -1.0 };
        let nudged = world.clamp_y(y + away * clearance);
        // Pinned against an edge: try the other way
        y = if (nudged - y).abs() < 1e-3 {
            world.clamp_y(y - away * clearance)
        } else {
            nudged
        };
    }

    (Vec2::new(x, y), dir)
}

/// Heading toward the closer horizontal edge
#[inline]
pub fn nearest_edge_dir(x: f32, world: &WorldTuning) -> f32 {
    if x < world.width * 0.5 { -1.0 } else { 1.0 }
}

/// Far enough past either side edge to be gone
#[inline]
pub fn past_despawn(x: f32, world: &WorldTuning, margin: f32) -> bool {
    x < -margin || x > world.width + margin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_opposite_side_of_target() {
        let world = WorldTuning::default();
        let (pos, dir) = spawn_point(Vec2::new(100.0, 200.0), &world, 40.0, 28.0, 6, &[]);
        assert_eq!(pos, Vec2::new(world.width + 40.0, 200.0));
        assert_eq!(dir, -1.0);

        let (pos, dir) = spawn_point(Vec2::new(800.0, 200.0), &world, 40.0, 28.0, 6, &[]);
        assert_eq!(pos.x, -40.0);
        assert_eq!(dir, 1.0);
    }

    #[test]
    fn test_spawn_nudged_off_occupied_slot() {
        let world = WorldTuning::default();
        let occupied = [Vec2::new(world.width + 40.0, 195.0)];
        let (pos, _) = spawn_point(Vec2::new(100.0, 200.0), &world, 40.0, 28.0, 6, &occupied);
        assert!(pos.distance(occupied[0]) >= 28.0);
        assert!(pos.y > 200.0, "pushed away from the responder above");
    }

    #[test]
    fn test_spawn_pinned_at_edge_goes_other_way() {
        let world = WorldTuning::default();
        let bottom = world.height - world.y_margin;
        let occupied = [Vec2::new(-40.0, bottom - 5.0)];
        let (pos, _) = spawn_point(Vec2::new(800.0, bottom), &world, 40.0, 28.0, 6, &occupied);
        assert!(pos.y < bottom - 5.0);
        assert!(pos.distance(occupied[0]) >= 28.0);
    }

    #[test]
    fn test_resolve_follows_validity() {
        let mut peds = vec![Pedestrian::new(1, Vec2::ZERO), Pedestrian::new(4, Vec2::ONE)];
        let mut pieces: Vec<WreckagePiece> = Vec::new();
        let target = AmbulanceTarget::Pedestrian(4);

        assert!(target.resolve(&mut peds, &mut pieces).is_some());
        assert!(target.resolve_valid(&mut peds, &mut pieces).is_none());

        peds[1].squish(0.0, &Default::default());
        let mut resolved = target.resolve_valid(&mut peds, &mut pieces).expect("squished body");
        assert_eq!(resolved.pos(), Vec2::ONE);
        resolved.mark_removed();
        assert!(peds[1].removed);
        assert!(AmbulanceTarget::Pedestrian(2).resolve(&mut peds, &mut pieces).is_none());
    }
}
