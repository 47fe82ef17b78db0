//! Bounding boxes, bounding spheres and the per-entity bounds cache.

use glam::{Mat3, Mat4, Vec3};
use slotmap::SecondaryMap;
use tracing::trace;

use crate::scene::{EntityId, Scene};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self::new(center - half.abs(), center + half.abs())
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn volume(&self) -> f32 {
        let s = self.size();
        s.x * s.y * s.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        if self.is_empty() || sphere.is_empty() {
            return false;
        }
        let d = self.closest_point(sphere.center) - sphere.center;
        d.length_squared() <= sphere.radius * sphere.radius
    }

    /// Sphere through the box corners.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        if self.is_empty() {
            return BoundingSphere::EMPTY;
        }
        BoundingSphere::new(self.center(), self.size().length() * 0.5)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Negative radius marks "no geometry".
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        radius: -1.0,
    };

    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }

    /// Center through `m`, radius by the largest axis scale of `m`.
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(m.transform_point3(self.center), self.radius * max_axis_scale(m))
    }

    pub fn intersects(&self, other: &BoundingSphere) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.center.distance(other.center) <= self.radius + other.radius
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::EMPTY
    }
}

pub fn max_axis_scale(m: &Mat4) -> f32 {
    m.x_axis
        .truncate()
        .length()
        .max(m.y_axis.truncate().length())
        .max(m.z_axis.truncate().length())
}

/// Factor by which `m` scales volumes.
pub fn volume_scale(m: &Mat4) -> f32 {
    Mat3::from_mat4(*m).determinant().abs()
}

/// Box and sphere of a renderable subtree, expressed in the root's own frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingVolume {
    pub aabb: Aabb,
    pub sphere: BoundingSphere,
}

impl BoundingVolume {
    pub const EMPTY: Self = Self {
        aabb: Aabb::EMPTY,
        sphere: BoundingSphere::EMPTY,
    };

    pub fn from_aabb(aabb: Aabb) -> Self {
        Self {
            aabb,
            sphere: aabb.bounding_sphere(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.aabb.is_empty()
    }
}

/// Lazily computed bounding volumes keyed by entity.
///
/// Owned by the host and cleared at scene teardown. Entries are never
/// refreshed on their own: replacing an entity's mesh requires
/// [`BoundsCache::invalidate`].
#[derive(Default)]
pub struct BoundsCache {
    volumes: SecondaryMap<EntityId, BoundingVolume>,
}

impl BoundsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EntityId) -> Option<&BoundingVolume> {
        self.volumes.get(id)
    }

    pub fn compute_if_missing(&mut self, scene: &Scene, id: EntityId) -> BoundingVolume {
        if let Some(volume) = self.volumes.get(id) {
            if !volume.is_empty() {
                return *volume;
            }
        }
        let volume = compute_local_volume(scene, id);
        if scene.contains(id) {
            self.volumes.insert(id, volume);
        }
        volume
    }

    pub fn invalidate(&mut self, id: EntityId) {
        self.volumes.remove(id);
    }

    pub fn clear(&mut self) {
        self.volumes.clear();
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

/// Unions every mesh vertex below `root`, in `root`'s frame. The root's own
/// transform (and its parents') is left out.
pub fn compute_local_volume(scene: &Scene, root: EntityId) -> BoundingVolume {
    let mut aabb = Aabb::EMPTY;
    if !scene.contains(root) {
        return BoundingVolume::EMPTY;
    }

    let mut stack = vec![(root, Mat4::IDENTITY)];
    while let Some((id, relative)) = stack.pop() {
        if let Some(mesh) = scene.mesh(id) {
            for v in mesh.vertices() {
                aabb.expand(relative.transform_point3(v));
            }
        }
        for &child in scene.children(id) {
            if let Some(local) = scene.local_matrix(child) {
                stack.push((child, relative * local));
            }
        }
    }

    trace!(?root, min = ?aabb.min, max = ?aabb.max, "computed local bounds");
    BoundingVolume::from_aabb(aabb)
}
