//! Picking the object a hand grabs: sphere/sphere broad phase, sphere/box
//! narrow phase in the candidate's frame, smallest box wins.

use glam::Mat4;

use crate::bounds::{max_axis_scale, volume_scale, BoundingSphere, BoundingVolume};
use crate::scene::EntityId;

#[derive(Clone, Copy, Debug)]
pub struct GrabCandidate {
    pub entity: EntityId,
    pub volume: BoundingVolume,
    pub world: Mat4,
}

impl GrabCandidate {
    pub fn new(entity: EntityId, volume: BoundingVolume, world: Mat4) -> Self {
        Self { entity, volume, world }
    }

    pub fn world_sphere(&self) -> BoundingSphere {
        self.volume.sphere.transformed(&self.world)
    }

    /// Box volume after the candidate's world scale.
    pub fn world_volume(&self) -> f32 {
        self.volume.aabb.volume() * volume_scale(&self.world)
    }
}

/// Outcome of one resolve pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pick {
    pub target: Option<EntityId>,
    /// Candidates that survived the sphere test and reached the box test.
    pub narrow_tested: usize,
    pub narrow_passed: usize,
}

pub fn broad_phase(hand: &BoundingSphere, candidate: &GrabCandidate) -> bool {
    if candidate.volume.is_empty() {
        return false;
    }
    hand.intersects(&candidate.world_sphere())
}

/// Hand sphere moved into the candidate's frame (radius grown by the
/// inverse's largest axis scale) against the candidate's local box.
///
/// Under non-uniform scale the grown sphere overestimates reach along the
/// stretched axes, so thin or elongated candidates can be picked from
/// slightly out of reach. It never misses a real overlap.
pub fn narrow_phase(hand: &BoundingSphere, candidate: &GrabCandidate) -> bool {
    if candidate.volume.is_empty() || hand.is_empty() {
        return false;
    }
    if candidate.world.determinant().abs() <= f32::EPSILON {
        return false;
    }
    let inverse = candidate.world.inverse();
    let local = BoundingSphere::new(
        inverse.transform_point3(hand.center),
        hand.radius * max_axis_scale(&inverse),
    );
    candidate.volume.aabb.intersects_sphere(&local)
}

/// Single deterministic pass; ties on volume keep the earlier candidate.
pub fn resolve(hand: &BoundingSphere, candidates: &[GrabCandidate]) -> Pick {
    let mut pick = Pick::default();
    let mut best_volume = f32::INFINITY;

    for candidate in candidates {
        if !broad_phase(hand, candidate) {
            continue;
        }
        pick.narrow_tested += 1;
        if !narrow_phase(hand, candidate) {
            continue;
        }
        pick.narrow_passed += 1;

        let volume = candidate.world_volume();
        if pick.target.is_none() || volume < best_volume {
            best_volume = volume;
            pick.target = Some(candidate.entity);
        }
    }
    pick
}
