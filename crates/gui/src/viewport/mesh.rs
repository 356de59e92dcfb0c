use std::collections::HashSet;

use glam::Vec3;

use crate::provider::{MeshEdge, MeshFace};

/// CPU-side indexed polygon mesh: shared vertex positions + face loops
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub faces: Vec<MeshFace>,
    /// Optional per-vertex texture coordinates
    pub uvs: Option<Vec<[f32; 2]>>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Unique undirected boundary edges, in order of first appearance
    pub fn unique_edges(&self) -> Vec<MeshEdge> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for face in &self.faces {
            for (a, b) in face.boundary() {
                let key = if a <= b { (a, b) } else { (b, a) };
                if seen.insert(key) {
                    edges.push(MeshEdge { a, b });
                }
            }
        }
        edges
    }

    /// Centroid of a face's boundary vertices
    pub fn face_centroid(&self, face: usize) -> Option<Vec3> {
        let f = self.faces.get(face)?;
        if f.vertices.is_empty() {
            return None;
        }
        let sum = f
            .vertices
            .iter()
            .filter_map(|v| self.positions.get(v.index()))
            .fold(Vec3::ZERO, |acc, p| acc + Vec3::from(*p));
        Some(sum / f.vertices.len() as f32)
    }

    /// Apply `f` to every vertex position
    pub fn warped(mut self, f: impl Fn(Vec3) -> Vec3) -> Self {
        for p in &mut self.positions {
            *p = f(Vec3::from(*p)).to_array();
        }
        self
    }
}

// ── Primitive generation ─────────────────────────────────────

/// Planar quad grid in the XY plane (z = 0), centred on the origin.
///
/// Vertex `(i, j)` is `j * (nx + 1) + i`; face `(i, j)` is `j * nx + i`.
pub fn grid(nx: u32, ny: u32, cell_size: f32) -> MeshData {
    let half_w = nx as f32 * cell_size * 0.5;
    let half_h = ny as f32 * cell_size * 0.5;

    let mut positions = Vec::with_capacity(((nx + 1) * (ny + 1)) as usize);
    let mut uvs = Vec::with_capacity(positions.capacity());
    for j in 0..=ny {
        for i in 0..=nx {
            positions.push([
                i as f32 * cell_size - half_w,
                j as f32 * cell_size - half_h,
                0.0,
            ]);
            uvs.push([i as f32 / nx.max(1) as f32, j as f32 / ny.max(1) as f32]);
        }
    }

    let row = nx + 1;
    let mut faces = Vec::with_capacity((nx * ny) as usize);
    for j in 0..ny {
        for i in 0..nx {
            let v = j * row + i;
            faces.push(MeshFace::new([v, v + 1, v + 1 + row, v + row]));
        }
    }

    MeshData {
        positions,
        faces,
        uvs: Some(uvs),
    }
}

/// Grid of triangles (each grid cell split along its diagonal)
pub fn triangle_grid(nx: u32, ny: u32, cell_size: f32) -> MeshData {
    let quads = grid(nx, ny, cell_size);
    let mut faces = Vec::with_capacity(quads.faces.len() * 2);
    for quad in &quads.faces {
        let v: Vec<u32> = quad.vertices.iter().map(|v| v.0).collect();
        faces.push(MeshFace::new([v[0], v[1], v[2]]));
        faces.push(MeshFace::new([v[0], v[2], v[3]]));
    }
    MeshData { faces, ..quads }
}

/// Axis-aligned box with shared corners and one quad per side
pub fn cube(w: f32, h: f32, d: f32) -> MeshData {
    let hw = w * 0.5;
    let hh = h * 0.5;
    let hd = d * 0.5;

    let positions = vec![
        [-hw, -hh, hd],
        [hw, -hh, hd],
        [hw, hh, hd],
        [-hw, hh, hd],
        [-hw, -hh, -hd],
        [hw, -hh, -hd],
        [hw, hh, -hd],
        [-hw, hh, -hd],
    ];

    let faces = vec![
        // Front (+Z)
        MeshFace::new([0, 1, 2, 3]),
        // Back (-Z)
        MeshFace::new([5, 4, 7, 6]),
        // Right (+X)
        MeshFace::new([1, 5, 6, 2]),
        // Left (-X)
        MeshFace::new([4, 0, 3, 7]),
        // Top (+Y)
        MeshFace::new([3, 2, 6, 7]),
        // Bottom (-Y)
        MeshFace::new([4, 5, 1, 0]),
    ];

    MeshData {
        positions,
        faces,
        uvs: None,
    }
}
