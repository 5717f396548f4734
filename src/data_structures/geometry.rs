//! CPU side mesh data and the primitive builders used by the demo scenes.
//!
//! Builders follow the conventions of common web 3D toolkits: cones are centered on
//! the origin with their apex on +Y, rings lie in the XY plane facing +Z and all
//! triangles wind counter-clockwise when seen from the outside.

use std::f32::consts::TAU;

use cgmath::{InnerSpace, Matrix3, Rad, Vector3};

/// The vertex layout shared by every pipeline: position and normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// How the index buffer is meant to be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Lines,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            topology: Topology::Triangles,
        }
    }

    /// Builds unindexed-style geometry from a triangle soup with one flat normal
    /// per face.
    pub fn from_triangles(triangles: &[[Vector3<f32>; 3]]) -> Self {
        let mut vertices = Vec::with_capacity(triangles.len() * 3);
        for [a, b, c] in triangles {
            let normal = (b - a).cross(c - a);
            let normal = if normal.magnitude2() > 0.0 {
                normal.normalize()
            } else {
                Vector3::unit_y()
            };
            for p in [a, b, c] {
                vertices.push(Vertex {
                    position: (*p).into(),
                    normal: normal.into(),
                });
            }
        }
        let indices = (0..vertices.len() as u32).collect();
        Self::new(vertices, indices)
    }

    /// A line segment list, one pair of indices per segment.
    pub fn lines(points: &[[f32; 3]]) -> Self {
        let vertices = points
            .iter()
            .map(|p| Vertex {
                position: *p,
                normal: [0.0, 1.0, 0.0],
            })
            .collect::<Vec<_>>();
        let indices = (0..vertices.len() as u32).collect();
        Self {
            vertices,
            indices,
            topology: Topology::Lines,
        }
    }

    /// A cone around the Y axis with its apex at `height / 2` and a closed base.
    pub fn cone(radius: f32, height: f32, radial_segments: u32) -> Self {
        let segments = radial_segments.max(3);
        let half = height / 2.0;
        let slope = radius / height;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        let ring = |i: u32| {
            let theta = i as f32 / segments as f32 * TAU;
            (theta.sin(), theta.cos())
        };

        // Side: one apex vertex per segment so each gets its own normal.
        for i in 0..segments {
            let (s0, c0) = ring(i);
            let (s1, c1) = ring(i + 1);
            let mid = (i as f32 + 0.5) / segments as f32 * TAU;
            let side_normal =
                |s: f32, c: f32| -> [f32; 3] { Vector3::new(s, slope, c).normalize().into() };
            let base = vertices.len() as u32;
            vertices.push(Vertex {
                position: [radius * s0, -half, radius * c0],
                normal: side_normal(s0, c0),
            });
            vertices.push(Vertex {
                position: [radius * s1, -half, radius * c1],
                normal: side_normal(s1, c1),
            });
            vertices.push(Vertex {
                position: [0.0, half, 0.0],
                normal: side_normal(mid.sin(), mid.cos()),
            });
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }

        // Base cap facing -Y.
        let center = vertices.len() as u32;
        vertices.push(Vertex {
            position: [0.0, -half, 0.0],
            normal: [0.0, -1.0, 0.0],
        });
        for i in 0..=segments {
            let (s, c) = ring(i);
            vertices.push(Vertex {
                position: [radius * s, -half, radius * c],
                normal: [0.0, -1.0, 0.0],
            });
        }
        for i in 0..segments {
            let current = center + 1 + i;
            indices.extend_from_slice(&[center, current + 1, current]);
        }

        Self::new(vertices, indices)
    }

    /// A regular tetrahedron inscribed in a sphere of `radius`.
    pub fn tetrahedron(radius: f32) -> Self {
        let corners = [
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(-1.0, -1.0, 1.0),
            Vector3::new(-1.0, 1.0, -1.0),
            Vector3::new(1.0, -1.0, -1.0),
        ]
        .map(|v: Vector3<f32>| v.normalize() * radius);
        let faces = [[2, 1, 0], [0, 3, 2], [1, 3, 0], [2, 3, 1]];
        let triangles = faces.map(|[a, b, c]| [corners[a], corners[b], corners[c]]);
        Self::from_triangles(&triangles)
    }

    /// A flat annulus in the XY plane facing +Z.
    pub fn ring(
        inner_radius: f32,
        outer_radius: f32,
        theta_segments: u32,
        phi_segments: u32,
    ) -> Self {
        let theta_segments = theta_segments.max(3);
        let phi_segments = phi_segments.max(1);
        let step = (outer_radius - inner_radius) / phi_segments as f32;
        let mut vertices = Vec::new();
        for j in 0..=phi_segments {
            let radius = inner_radius + j as f32 * step;
            for i in 0..=theta_segments {
                let theta = i as f32 / theta_segments as f32 * TAU;
                vertices.push(Vertex {
                    position: [radius * theta.cos(), radius * theta.sin(), 0.0],
                    normal: [0.0, 0.0, 1.0],
                });
            }
        }
        let mut indices = Vec::new();
        for j in 0..phi_segments {
            let level = j * (theta_segments + 1);
            for i in 0..theta_segments {
                let a = level + i;
                let b = a + theta_segments + 1;
                let c = a + theta_segments + 2;
                let d = a + 1;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }
        Self::new(vertices, indices)
    }

    /// Rotates positions and normals around the X axis.
    pub fn rotate_x(mut self, angle: f32) -> Self {
        let rotation = Matrix3::from_angle_x(Rad(angle));
        for vertex in &mut self.vertices {
            vertex.position = (rotation * Vector3::from(vertex.position)).into();
            vertex.normal = (rotation * Vector3::from(vertex.normal)).into();
        }
        self
    }

    /// Unique edges of the triangles as a line list.
    pub fn wireframe_indices(&self) -> Vec<u32> {
        if self.topology == Topology::Lines {
            return self.indices.clone();
        }
        let mut seen = std::collections::HashSet::new();
        let mut edges = Vec::new();
        for triangle in self.indices.chunks_exact(3) {
            for (a, b) in [
                (triangle[0], triangle[1]),
                (triangle[1], triangle[2]),
                (triangle[2], triangle[0]),
            ] {
                if seen.insert((a.min(b), a.max(b))) {
                    edges.extend_from_slice(&[a, b]);
                }
            }
        }
        edges
    }

    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles => self.indices.len() / 3,
            Topology::Lines => 0,
        }
    }

    /// Iterates triangles as position triples.
    pub fn triangles(&self) -> impl Iterator<Item = [Vector3<f32>; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .filter(|_| self.topology == Topology::Triangles)
            .map(|t| [0, 1, 2].map(|k| Vector3::from(self.vertices[t[k] as usize].position)))
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn face_normal(t: &[Vector3<f32>; 3]) -> Vector3<f32> {
        (t[1] - t[0]).cross(t[2] - t[0])
    }

    fn centroid(t: &[Vector3<f32>; 3]) -> Vector3<f32> {
        (t[0] + t[1] + t[2]) / 3.0
    }

    #[test]
    fn tetrahedron_faces_point_outwards() {
        let tetra = Geometry::tetrahedron(0.7);
        assert_eq!(tetra.triangle_count(), 4);
        for triangle in tetra.triangles() {
            assert!(face_normal(&triangle).dot(centroid(&triangle)) > 0.0);
        }
        for vertex in &tetra.vertices {
            let distance = Vector3::from(vertex.position).magnitude();
            assert!((distance - 0.7).abs() < 1e-5);
        }
    }

    #[test]
    fn cone_faces_point_outwards() {
        let cone = Geometry::cone(0.5, 1.5, 32);
        assert_eq!(cone.triangle_count(), 64);
        // The centroid of a convex solid is inside it, so every face looks away from it.
        let inside = Vector3::new(0.0, -0.375, 0.0);
        for triangle in cone.triangles() {
            assert!(face_normal(&triangle).dot(centroid(&triangle) - inside) > 0.0);
        }
    }

    #[test]
    fn ring_faces_plus_z_and_spans_radii() {
        let ring = Geometry::ring(0.2, 0.5, 32, 3);
        assert_eq!(ring.vertices.len(), 4 * 33);
        assert_eq!(ring.triangle_count(), 2 * 32 * 3);
        for triangle in ring.triangles() {
            assert!(face_normal(&triangle).z > 0.0);
        }
        let radii = ring
            .vertices
            .iter()
            .map(|v| Vector3::from(v.position).magnitude());
        let (min, max) = radii.fold((f32::MAX, 0.0f32), |(lo, hi), r| (lo.min(r), hi.max(r)));
        assert!((min - 0.2).abs() < 1e-5 && (max - 0.5).abs() < 1e-5);
    }

    #[test]
    fn reticle_ring_lies_flat_after_rotation() {
        let ring = Geometry::ring(0.15, 0.2, 32, 1).rotate_x(-FRAC_PI_2);
        for vertex in &ring.vertices {
            assert!(vertex.position[1].abs() < 1e-6);
            assert!((vertex.normal[1] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn wireframe_deduplicates_shared_edges() {
        let quad = Geometry::new(
            vec![Vertex::default(); 4],
            vec![0, 1, 2, 0, 2, 3],
        );
        // Four outer edges plus the shared diagonal.
        assert_eq!(quad.wireframe_indices().len(), 5 * 2);
        let lines = Geometry::lines(&[[0.0; 3], [1.0, 0.0, 0.0]]);
        assert_eq!(lines.wireframe_indices(), vec![0, 1]);
        assert_eq!(lines.triangle_count(), 0);
    }
}
