use glam::Vec3;
use std::fs::File;
use std::io::BufReader;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub normal: Vec3,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, normal: Vec3) -> Self {
        Self { v0, v1, v2, normal }
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }
}

/// Renderable geometry attached to a scene entity, in that entity's frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }

    pub fn load_stl(path: &str) -> Result<Self> {
        let mut file = BufReader::new(File::open(path)?);
        let stl = stl_io::read_stl(&mut file)?;

        let triangles = stl
            .faces
            .iter()
            .map(|face| {
                let corner = |i: usize| {
                    let raw = stl.vertices[face.vertices[i]];
                    Vec3::new(raw[0], raw[1], raw[2])
                };
                let normal = Vec3::new(face.normal[0], face.normal[1], face.normal[2]);
                Triangle::new(corner(0), corner(1), corner(2), normal)
            })
            .collect();

        Ok(Self { triangles })
    }

    /// Axis-aligned box centered on the origin, two triangles per face.
    pub fn cuboid(half_extents: Vec3) -> Self {
        let h = half_extents.abs();
        let corner = |x: f32, y: f32, z: f32| Vec3::new(x * h.x, y * h.y, z * h.z);

        // (normal, four corners counter-clockwise seen from outside)
        let faces = [
            (Vec3::X, [corner(1.0, -1.0, -1.0), corner(1.0, 1.0, -1.0), corner(1.0, 1.0, 1.0), corner(1.0, -1.0, 1.0)]),
            (Vec3::NEG_X, [corner(-1.0, -1.0, 1.0), corner(-1.0, 1.0, 1.0), corner(-1.0, 1.0, -1.0), corner(-1.0, -1.0, -1.0)]),
            (Vec3::Y, [corner(-1.0, 1.0, -1.0), corner(-1.0, 1.0, 1.0), corner(1.0, 1.0, 1.0), corner(1.0, 1.0, -1.0)]),
            (Vec3::NEG_Y, [corner(-1.0, -1.0, 1.0), corner(-1.0, -1.0, -1.0), corner(1.0, -1.0, -1.0), corner(1.0, -1.0, 1.0)]),
            (Vec3::Z, [corner(-1.0, -1.0, 1.0), corner(1.0, -1.0, 1.0), corner(1.0, 1.0, 1.0), corner(-1.0, 1.0, 1.0)]),
            (Vec3::NEG_Z, [corner(1.0, -1.0, -1.0), corner(-1.0, -1.0, -1.0), corner(-1.0, 1.0, -1.0), corner(1.0, 1.0, -1.0)]),
        ];

        let mut triangles = Vec::with_capacity(12);
        for (normal, [a, b, c, d]) in faces {
            triangles.push(Triangle::new(a, b, c, normal));
            triangles.push(Triangle::new(a, c, d, normal));
        }
        Self { triangles }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.triangles.iter().flat_map(|t| t.vertices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_spans_half_extents() {
        let mesh = Mesh::cuboid(Vec3::new(0.5, 1.0, 2.0));
        assert_eq!(mesh.triangles.len(), 12);

        let min = mesh.vertices().fold(Vec3::splat(f32::INFINITY), Vec3::min);
        let max = mesh.vertices().fold(Vec3::splat(f32::NEG_INFINITY), Vec3::max);
        assert!((min - Vec3::new(-0.5, -1.0, -2.0)).length() < 1e-6);
        assert!((max - Vec3::new(0.5, 1.0, 2.0)).length() < 1e-6);
    }

    #[test]
    fn test_cuboid_normals_point_outward() {
        let mesh = Mesh::cuboid(Vec3::ONE);
        for t in &mesh.triangles {
            let centroid = (t.v0 + t.v1 + t.v2) / 3.0;
            assert!(centroid.dot(t.normal) > 0.0);
            let winding = (t.v1 - t.v0).cross(t.v2 - t.v0);
            assert!(winding.dot(t.normal) > 0.0);
        }
    }

    #[test]
    fn test_missing_stl_is_an_error() {
        assert!(Mesh::load_stl("does/not/exist.stl").is_err());
    }
}
