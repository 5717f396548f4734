//! Planar outlines and their extrusion into solid geometry.
//!
//! A [`Shape`] is a single closed outline in the XY plane. [`extrude`] sweeps it
//! along +Z, optionally rounding both ends with a bevel, and caps the ends with an
//! ear-clipped triangulation of the outline.

use std::f32::consts::FRAC_PI_2;

use cgmath::{InnerSpace, Vector2, Vector3};

use super::geometry::Geometry;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    points: Vec<Vector2<f32>>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the outline at `(x, y)`, discarding anything drawn before.
    pub fn move_to(mut self, x: f32, y: f32) -> Self {
        self.points.clear();
        self.points.push(Vector2::new(x, y));
        self
    }

    pub fn line_to(mut self, x: f32, y: f32) -> Self {
        self.points.push(Vector2::new(x, y));
        self
    }

    /// An axis aligned square with one corner at the origin.
    pub fn square(size: f32) -> Self {
        Self::new()
            .move_to(0.0, 0.0)
            .line_to(0.0, size)
            .line_to(size, size)
            .line_to(size, 0.0)
            .line_to(0.0, 0.0)
    }

    /// The outline without a repeated closing point.
    pub fn contour(&self) -> Vec<Vector2<f32>> {
        let mut points = self.points.clone();
        points.dedup();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        points
    }

    /// Signed area, positive for counter-clockwise outlines.
    pub fn area(&self) -> f32 {
        signed_area(&self.contour())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bevel {
    /// How far the bevel reaches beyond the front and back faces.
    pub thickness: f32,
    /// How far the bevel reaches out from the outline.
    pub size: f32,
    pub offset: f32,
    pub segments: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtrudeOptions {
    pub depth: f32,
    pub steps: u32,
    pub bevel: Option<Bevel>,
}

impl Default for ExtrudeOptions {
    fn default() -> Self {
        Self {
            depth: 1.0,
            steps: 1,
            bevel: Some(Bevel {
                thickness: 0.2,
                size: 0.1,
                offset: 0.0,
                segments: 3,
            }),
        }
    }
}

/// Sweeps `shape` from `z = 0` to `z = depth`, plus the bevel on either end.
pub fn extrude(shape: &Shape, options: &ExtrudeOptions) -> Geometry {
    let mut contour = shape.contour();
    if contour.len() < 3 {
        log::warn!("cannot extrude an outline with {} points", contour.len());
        return Geometry::new(Vec::new(), Vec::new());
    }
    if signed_area(&contour) < 0.0 {
        contour.reverse();
    }
    let caps = triangulate(&contour);
    let miters = miter_vectors(&contour);

    let rings: Vec<Vec<Vector3<f32>>> = layers(options)
        .into_iter()
        .map(|(z, outset)| {
            contour
                .iter()
                .zip(&miters)
                .map(|(p, m)| (*p + *m * outset).extend(z))
                .collect()
        })
        .collect();

    let mut triangles = Vec::new();
    if let (Some(front), Some(back)) = (rings.first(), rings.last()) {
        for &[a, b, c] in &caps {
            triangles.push([front[c], front[b], front[a]]);
            triangles.push([back[a], back[b], back[c]]);
        }
    }
    let n = contour.len();
    for pair in rings.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        for i in 0..n {
            let j = (i + 1) % n;
            triangles.push([lower[i], lower[j], upper[j]]);
            triangles.push([lower[i], upper[j], upper[i]]);
        }
    }
    Geometry::from_triangles(&triangles)
}

/// `(z, outset)` for every ring of the sweep, ordered front to back.
fn layers(options: &ExtrudeOptions) -> Vec<(f32, f32)> {
    let steps = options.steps.max(1);
    let mut layers = Vec::new();
    let bevel = options.bevel.filter(|b| b.segments > 0);

    if let Some(bevel) = bevel {
        for b in 0..bevel.segments {
            let t = b as f32 / bevel.segments as f32;
            let z = bevel.thickness * (t * FRAC_PI_2).cos();
            let outset = bevel.size * (t * FRAC_PI_2).sin() + bevel.offset;
            layers.push((-z, outset));
        }
    }
    let body_outset = bevel.map_or(0.0, |b| b.size + b.offset);
    for s in 0..=steps {
        layers.push((options.depth * s as f32 / steps as f32, body_outset));
    }
    if let Some(bevel) = bevel {
        for b in (0..bevel.segments).rev() {
            let t = b as f32 / bevel.segments as f32;
            let z = bevel.thickness * (t * FRAC_PI_2).cos();
            let outset = bevel.size * (t * FRAC_PI_2).sin() + bevel.offset;
            layers.push((options.depth + z, outset));
        }
    }
    layers
}

fn signed_area(contour: &[Vector2<f32>]) -> f32 {
    let n = contour.len();
    (0..n)
        .map(|i| {
            let (p, q) = (contour[i], contour[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f32>()
        / 2.0
}

/// Per vertex direction that moves both adjacent edges outwards by one unit.
fn miter_vectors(contour: &[Vector2<f32>]) -> Vec<Vector2<f32>> {
    let n = contour.len();
    let outward = |from: Vector2<f32>, to: Vector2<f32>| {
        let edge = (to - from).normalize();
        Vector2::new(edge.y, -edge.x)
    };
    (0..n)
        .map(|i| {
            let prev = contour[(i + n - 1) % n];
            let current = contour[i];
            let next = contour[(i + 1) % n];
            let n1 = outward(prev, current);
            let n2 = outward(current, next);
            let denominator = 1.0 + n1.dot(n2);
            if denominator < 1e-6 {
                n1
            } else {
                (n1 + n2) / denominator
            }
        })
        .collect()
}

fn cross(o: Vector2<f32>, a: Vector2<f32>, b: Vector2<f32>) -> f32 {
    (a - o).perp_dot(b - o)
}

fn contains(p: Vector2<f32>, a: Vector2<f32>, b: Vector2<f32>, c: Vector2<f32>) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Ear clipping for a simple counter-clockwise outline. Returns CCW index triples.
pub fn triangulate(contour: &[Vector2<f32>]) -> Vec<[usize; 3]> {
    let mut remaining: Vec<usize> = (0..contour.len()).collect();
    let mut triangles = Vec::new();
    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).find(|&i| {
            let (a, b, c) = (remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]);
            let (pa, pb, pc) = (contour[a], contour[b], contour[c]);
            cross(pa, pb, pc) > 0.0
                && remaining
                    .iter()
                    .filter(|&&k| k != a && k != b && k != c)
                    .all(|&k| !contains(contour[k], pa, pb, pc))
        });
        let Some(i) = ear else {
            log::warn!("outline is not simple, {} vertices left untriangulated", m);
            break;
        };
        triangles.push([remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]]);
        remaining.remove(i);
    }
    if remaining.len() == 3 {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    }
    triangles
}
