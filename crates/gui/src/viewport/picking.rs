use glam::Vec3;
use shared::{EdgeId, ElementKind, ElementRef, FaceId, VertexId};

use crate::provider::{FaceLayout, MeshDataProvider, PrimitiveKind};

/// A ray in world space
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Compute AABB from flat xyz triples. None for an empty buffer.
    pub fn from_positions(flat: &[f32]) -> Option<Self> {
        if flat.len() < 3 {
            return None;
        }
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in flat.chunks_exact(3) {
            let p = Vec3::new(p[0], p[1], p[2]);
            min = min.min(p);
            max = max.max(p);
        }
        Some(Self { min, max })
    }

    /// Grow the box by `margin` on every side
    pub fn inflated(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Length of the diagonal
    pub fn size(&self) -> f32 {
        (self.max - self.min).length()
    }
}

/// Ray-AABB intersection using the slab method.
/// Returns the distance along the ray to the nearest hit, or None.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let inv_dir = Vec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );

    let t1 = (aabb.min.x - ray.origin.x) * inv_dir.x;
    let t2 = (aabb.max.x - ray.origin.x) * inv_dir.x;
    let t3 = (aabb.min.y - ray.origin.y) * inv_dir.y;
    let t4 = (aabb.max.y - ray.origin.y) * inv_dir.y;
    let t5 = (aabb.min.z - ray.origin.z) * inv_dir.z;
    let t6 = (aabb.max.z - ray.origin.z) * inv_dir.z;

    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Möller-Trumbore ray-triangle intersection algorithm.
/// Returns the distance along the ray if hit, or None if no intersection.
pub fn ray_triangle_intersect(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);

    // Outside triangle (u)
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);

    // Outside triangle (v)
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);

    // Intersection is behind ray origin
    if t > EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Closest approach between a ray and a line segment
#[derive(Debug, Clone, Copy)]
pub struct SegmentApproach {
    /// Minimum distance between ray and segment
    pub distance: f32,
    /// Ray parameter at the closest point
    pub ray_t: f32,
    /// Closest point on the segment
    pub point: Vec3,
}

/// Minimum distance between a ray and a line segment.
pub fn ray_segment_closest(ray: &Ray, line_start: Vec3, line_end: Vec3) -> SegmentApproach {
    let u = ray.direction;
    let v = line_end - line_start;
    let w = ray.origin - line_start;

    let a = u.dot(u); // always >= 0
    let b = u.dot(v);
    let c = v.dot(v); // always >= 0
    let d = u.dot(w);
    let e = v.dot(w);

    let denom = a * c - b * b;

    let (sc, tc);

    if denom < 1e-7 || c < 1e-12 {
        // Nearly parallel, or a zero-length segment
        sc = (-d / a.max(1e-12)).max(0.0);
        tc = if c < 1e-12 { 0.0 } else { (e + b * sc) / c };
    } else {
        sc = (b * e - c * d) / denom;
        tc = (a * e - b * d) / denom;
    }

    // Clamp tc to [0,1] (line segment)
    let tc = tc.clamp(0.0, 1.0);
    let point = line_start + v * tc;
    // Re-project onto the ray, positive side only
    let sc = if denom < 1e-7 { sc } else { (point - ray.origin).dot(u) / a };
    let sc = sc.max(0.0);

    let closest_ray = ray.origin + u * sc;

    SegmentApproach {
        distance: (closest_ray - point).length(),
        ray_t: sc,
        point,
    }
}

/// Perpendicular distance from `point` to the ray, with the ray parameter.
/// None when the point is behind the ray origin.
pub fn ray_point_distance(ray: &Ray, point: Vec3) -> Option<(f32, f32)> {
    let t = (point - ray.origin).dot(ray.direction);
    if t <= 0.0 {
        return None;
    }
    Some(((ray.at(t) - point).length(), t))
}

/// Intersect a ray with the plane through `point` with `normal`.
pub fn ray_plane_intersect(ray: &Ray, point: Vec3, normal: Vec3) -> Option<Vec3> {
    let denom = normal.dot(ray.direction);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = normal.dot(point - ray.origin) / denom;
    if t < 0.0 {
        return None;
    }
    Some(ray.at(t))
}

/// Result of one pick query. Frame-scoped; never retained past the interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub element: ElementRef,
    pub world_point: Vec3,
    /// Surface normal of the hit face (faces only)
    pub plane_normal: Option<Vec3>,
    /// Distance along the pick ray
    pub distance: f32,
    /// Accumulated drag displacement (drag only)
    pub screen_offset: Vec3,
}

impl Intersection {
    fn new(element: ElementRef, world_point: Vec3, distance: f32) -> Self {
        Self {
            element,
            world_point,
            plane_normal: None,
            distance,
            screen_offset: Vec3::ZERO,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.element.kind()
    }

    pub fn face(&self) -> Option<FaceId> {
        self.element.as_face()
    }
}

/// What the resolver casts against
#[derive(Clone, Copy)]
pub struct PickScene<'a> {
    pub provider: &'a dyn MeshDataProvider,
    pub layout: &'a FaceLayout,
    /// Cached bounds of all geometry, used for early rejection
    pub bounds: Option<Aabb>,
}

/// Resolves the highest-priority mesh element under a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickResolver {
    /// World-space distance within which a thin edge still counts as hit
    pub edge_tolerance: f32,
    /// World-space distance within which a point-cloud vertex counts as hit
    pub point_tolerance: f32,
}

impl Default for PickResolver {
    fn default() -> Self {
        Self {
            edge_tolerance: 0.05,
            point_tolerance: 0.08,
        }
    }
}

impl PickResolver {
    /// Edge/face pick.
    ///
    /// An edge beats a face only when it bounds that face. When both are hit
    /// and the edge is not one of the face's boundary edges, nothing is
    /// returned, so the highlight clears instead of flickering between them.
    pub fn pick(&self, ray: &Ray, scene: &PickScene<'_>) -> Option<Intersection> {
        if !self.may_hit(ray, scene, self.edge_tolerance) {
            return None;
        }

        let face = self.pick_face(ray, scene);
        let edge = self.pick_edge(ray, scene);

        match (edge, face) {
            (Some(e), Some(f)) => {
                let (ElementRef::Edge(edge_id), ElementRef::Face(face_id)) = (e.element, f.element)
                else {
                    return None;
                };
                let provider = scene.provider;
                let adjacent = match (
                    provider.faces().get(face_id.index()),
                    provider.edges().get(edge_id.index()),
                ) {
                    (Some(face), Some(edge)) => face.is_adjacent_to(edge),
                    _ => false,
                };
                if adjacent {
                    Some(e)
                } else {
                    tracing::trace!(%edge_id, %face_id, "edge hit is not adjacent to face hit");
                    None
                }
            }
            (Some(e), None) => Some(e),
            (None, Some(f)) => Some(f),
            (None, None) => None,
        }
    }

    /// Point-cloud pick, used only while the vertex cloud is shown
    pub fn pick_vertex(&self, ray: &Ray, scene: &PickScene<'_>) -> Option<Intersection> {
        if !self.may_hit(ray, scene, self.point_tolerance) {
            return None;
        }
        let points = scene.provider.buffered_vertices(PrimitiveKind::Vertex);

        let mut best: Option<(usize, f32, Vec3)> = None;
        for (i, p) in points.chunks_exact(3).enumerate() {
            let p = Vec3::new(p[0], p[1], p[2]);
            let Some((miss, t)) = ray_point_distance(ray, p) else {
                continue;
            };
            if miss <= self.point_tolerance && best.is_none_or(|(_, bt, _)| t < bt) {
                best = Some((i, t, p));
            }
        }

        best.map(|(i, t, p)| Intersection::new(ElementRef::Vertex(VertexId::from(i)), p, t))
    }

    /// Nearest triangle hit, reported as its owning face
    pub fn pick_face(&self, ray: &Ray, scene: &PickScene<'_>) -> Option<Intersection> {
        let tris = scene.provider.buffered_vertices(PrimitiveKind::Triangle);

        let mut best: Option<(usize, f32, Vec3)> = None;
        for (tri_idx, t) in tris.chunks_exact(9).enumerate() {
            let v0 = Vec3::new(t[0], t[1], t[2]);
            let v1 = Vec3::new(t[3], t[4], t[5]);
            let v2 = Vec3::new(t[6], t[7], t[8]);

            if let Some(dist) = ray_triangle_intersect(ray, v0, v1, v2) {
                if best.is_none_or(|(_, d, _)| dist < d) {
                    let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
                    best = Some((tri_idx, dist, normal));
                }
            }
        }

        let (tri_idx, dist, normal) = best?;
        let face = scene.layout.face_of_triangle(tri_idx)?;
        let mut hit = Intersection::new(ElementRef::Face(face), ray.at(dist), dist);
        hit.plane_normal = Some(normal);
        Some(hit)
    }

    /// Nearest edge within tolerance: closest to the camera first, then
    /// closest to the ray.
    pub fn pick_edge(&self, ray: &Ray, scene: &PickScene<'_>) -> Option<Intersection> {
        const DEPTH_BAND: f32 = 0.01;
        let segs = scene.provider.buffered_vertices(PrimitiveKind::Edge);

        let mut best: Option<(usize, SegmentApproach)> = None;
        for (idx, s) in segs.chunks_exact(6).enumerate() {
            let a = Vec3::new(s[0], s[1], s[2]);
            let b = Vec3::new(s[3], s[4], s[5]);
            let approach = ray_segment_closest(ray, a, b);
            if approach.distance > self.edge_tolerance || approach.ray_t <= 0.0 {
                continue;
            }

            let dominated = best.is_some_and(|(_, bd)| {
                approach.ray_t > bd.ray_t + DEPTH_BAND
                    || (approach.ray_t > bd.ray_t - DEPTH_BAND && approach.distance >= bd.distance)
            });

            if !dominated {
                best = Some((idx, approach));
            }
        }

        best.map(|(idx, a)| {
            Intersection::new(ElementRef::Edge(EdgeId::from(idx)), a.point, a.ray_t)
        })
    }

    fn may_hit(&self, ray: &Ray, scene: &PickScene<'_>, margin: f32) -> bool {
        match scene.bounds {
            Some(bounds) => ray_aabb(ray, &bounds.inflated(margin)).is_some(),
            None => true,
        }
    }
}
