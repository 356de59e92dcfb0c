//! Mesh data provider contract.
//!
//! The geometry engine owns the mesh; viewports only sample it once per frame
//! through [`MeshDataProvider`]. Buffer layouts:
//! - `Triangle`: flat xyz triples, faces fan-triangulated in face order
//! - `Edge`: flat xyz triples, two per edge in edge order
//! - `Vertex`: flat xyz triples, one per vertex (point cloud)

use std::ops::Range;

use shared::{DebugGroup, ElementKind, ElementRef, FaceId, VertexId};
use thiserror::Error;

use crate::viewport::mesh::MeshData;

/// Which buffered primitive stream to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Vertex,
    Edge,
    Triangle,
}

/// A polygonal face given by its boundary vertex loop (3 or 4 vertices in practice)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshFace {
    pub vertices: Vec<VertexId>,
}

impl MeshFace {
    pub fn new(vertices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            vertices: vertices.into_iter().map(VertexId).collect(),
        }
    }

    /// Number of fan triangles this face contributes to the triangle buffer
    pub fn triangle_count(&self) -> usize {
        self.vertices.len().saturating_sub(2)
    }

    /// Boundary edges as consecutive vertex pairs, closing the loop
    pub fn boundary(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Whether `edge` is one of this face's boundary edges
    pub fn is_adjacent_to(&self, edge: &MeshEdge) -> bool {
        self.boundary().any(|(a, b)| edge.connects(a, b))
    }
}

/// An undirected edge between two vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshEdge {
    pub a: VertexId,
    pub b: VertexId,
}

impl MeshEdge {
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            a: VertexId(a),
            b: VertexId(b),
        }
    }

    pub fn connects(&self, a: VertexId, b: VertexId) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

/// Source of per-frame mesh geometry and colors.
///
/// Implementations must keep all buffers mutually aligned; see
/// [`validate_provider`].
pub trait MeshDataProvider {
    /// Flat float triples for the requested primitive stream
    fn buffered_vertices(&self, kind: PrimitiveKind) -> &[f32];

    /// Flat uv pairs aligned to the triangle stream (may be empty)
    fn buffered_uvs(&self) -> &[f32] {
        &[]
    }

    /// Flat rgb triples aligned to the triangle stream
    fn buffered_vertex_colors(&self) -> &[f32];

    /// Flat rgb triples aligned to the edge stream
    fn buffered_edge_colors(&self) -> &[f32];

    fn vertices(&self) -> &[[f32; 3]];

    fn faces(&self) -> &[MeshFace];

    fn edges(&self) -> &[MeshEdge];

    fn vertices_count(&self) -> usize {
        self.vertices().len()
    }

    fn faces_count(&self) -> usize {
        self.faces().len()
    }

    fn edges_count(&self) -> usize {
        self.edges().len()
    }

    /// Diagnostic groups for display; the core never interprets them
    fn debug_data(&self) -> Vec<DebugGroup> {
        Vec::new()
    }
}

/// Element counts of the provider currently bound to a viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementCounts {
    pub vertices: usize,
    pub faces: usize,
    pub edges: usize,
}

impl ElementCounts {
    pub fn of(provider: &dyn MeshDataProvider) -> Self {
        Self {
            vertices: provider.vertices_count(),
            faces: provider.faces_count(),
            edges: provider.edges_count(),
        }
    }

    /// Whether `element` addresses an existing element
    pub fn contains(&self, element: ElementRef) -> bool {
        let limit = match element.kind() {
            ElementKind::Vertex => self.vertices,
            ElementKind::Face => self.faces,
            ElementKind::Edge => self.edges,
        };
        element.index() < limit
    }
}

/// Provider contract violations. Always fatal for the frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("buffer `{buffer}` has {actual} floats, expected {expected}")]
    ContractViolation {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("required attribute `{0}` is missing")]
    MissingAttribute(&'static str),
    #[error("{element} {index} references vertex {vertex} but only {vertex_count} vertices exist")]
    DanglingVertex {
        element: &'static str,
        index: usize,
        vertex: usize,
        vertex_count: usize,
    },
    #[error("face {0} has fewer than three vertices")]
    DegenerateFace(usize),
}

/// Maps faces to their runs of triangles in the triangle stream.
#[derive(Debug, Clone, Default)]
pub struct FaceLayout {
    first_triangle: Vec<usize>,
    triangle_count: usize,
}

impl FaceLayout {
    pub fn from_faces(faces: &[MeshFace]) -> Self {
        let mut layout = Self::default();
        layout.rebuild(faces);
        layout
    }

    /// Recompute in place, reusing the allocation
    pub fn rebuild(&mut self, faces: &[MeshFace]) {
        self.first_triangle.clear();
        let mut total = 0;
        for face in faces {
            self.first_triangle.push(total);
            total += face.triangle_count();
        }
        self.triangle_count = total;
    }

    pub fn face_count(&self) -> usize {
        self.first_triangle.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Triangle indices covered by `face`
    pub fn triangle_range(&self, face: FaceId) -> Option<Range<usize>> {
        let i = face.index();
        let start = *self.first_triangle.get(i)?;
        let end = self
            .first_triangle
            .get(i + 1)
            .copied()
            .unwrap_or(self.triangle_count);
        Some(start..end)
    }

    /// Buffered-vertex indices (3 per triangle) covered by `face`
    pub fn buffer_range(&self, face: FaceId) -> Option<Range<usize>> {
        self.triangle_range(face).map(|r| r.start * 3..r.end * 3)
    }

    /// Face owning triangle `tri`
    pub fn face_of_triangle(&self, tri: usize) -> Option<FaceId> {
        if tri >= self.triangle_count {
            return None;
        }
        let pos = self.first_triangle.partition_point(|&start| start <= tri);
        pos.checked_sub(1).map(FaceId::from)
    }
}

/// Check every buffer of `provider` against `layout`.
pub fn validate_provider(
    provider: &dyn MeshDataProvider,
    layout: &FaceLayout,
) -> Result<(), ProviderError> {
    let vertex_count = provider.vertices_count();

    for (index, face) in provider.faces().iter().enumerate() {
        if face.vertices.len() < 3 {
            return Err(ProviderError::DegenerateFace(index));
        }
        if let Some(v) = face.vertices.iter().find(|v| v.index() >= vertex_count) {
            return Err(ProviderError::DanglingVertex {
                element: "face",
                index,
                vertex: v.index(),
                vertex_count,
            });
        }
    }
    for (index, edge) in provider.edges().iter().enumerate() {
        for v in [edge.a, edge.b] {
            if v.index() >= vertex_count {
                return Err(ProviderError::DanglingVertex {
                    element: "edge",
                    index,
                    vertex: v.index(),
                    vertex_count,
                });
            }
        }
    }

    let triangles = provider.buffered_vertices(PrimitiveKind::Triangle);
    expect_len("triangle positions", triangles.len(), layout.triangle_count() * 9)?;

    let colors = provider.buffered_vertex_colors();
    if colors.is_empty() && !triangles.is_empty() {
        return Err(ProviderError::MissingAttribute("vertex colors"));
    }
    expect_len("vertex colors", colors.len(), triangles.len())?;

    let uvs = provider.buffered_uvs();
    if !uvs.is_empty() {
        expect_len("uvs", uvs.len(), layout.triangle_count() * 6)?;
    }

    let edges = provider.buffered_vertices(PrimitiveKind::Edge);
    expect_len("edge positions", edges.len(), provider.edges_count() * 6)?;

    let edge_colors = provider.buffered_edge_colors();
    if edge_colors.is_empty() && !edges.is_empty() {
        return Err(ProviderError::MissingAttribute("edge colors"));
    }
    expect_len("edge colors", edge_colors.len(), edges.len())?;

    let points = provider.buffered_vertices(PrimitiveKind::Vertex);
    expect_len("vertex positions", points.len(), vertex_count * 3)?;

    Ok(())
}

fn expect_len(buffer: &'static str, actual: usize, expected: usize) -> Result<(), ProviderError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ProviderError::ContractViolation {
            buffer,
            expected,
            actual,
        })
    }
}

/// In-memory provider built from [`MeshData`]. Buffers are generated once
/// at construction.
#[derive(Debug, Clone)]
pub struct StaticMeshProvider {
    mesh: MeshData,
    edges: Vec<MeshEdge>,
    face_color: [f32; 3],
    edge_color: [f32; 3],
    triangle_positions: Vec<f32>,
    triangle_colors: Vec<f32>,
    triangle_uvs: Vec<f32>,
    edge_positions: Vec<f32>,
    edge_colors: Vec<f32>,
    point_positions: Vec<f32>,
    debug: Vec<DebugGroup>,
}

impl StaticMeshProvider {
    pub fn new(mesh: MeshData, face_color: [f32; 3], edge_color: [f32; 3]) -> Self {
        let edges = mesh.unique_edges();
        let mut provider = Self {
            mesh,
            edges,
            face_color,
            edge_color,
            triangle_positions: Vec::new(),
            triangle_colors: Vec::new(),
            triangle_uvs: Vec::new(),
            edge_positions: Vec::new(),
            edge_colors: Vec::new(),
            point_positions: Vec::new(),
            debug: Vec::new(),
        };
        provider.rebuild_buffers();
        provider
    }

    pub fn with_debug_group(mut self, group: DebugGroup) -> Self {
        self.debug.push(group);
        self
    }

    fn rebuild_buffers(&mut self) {
        let positions = &self.mesh.positions;

        self.triangle_positions.clear();
        self.triangle_colors.clear();
        self.triangle_uvs.clear();
        // Out-of-range vertices are skipped; validation reports them as misaligned.
        for face in &self.mesh.faces {
            let Some(&v0) = face.vertices.first() else {
                continue;
            };
            for k in 1..face.vertices.len().saturating_sub(1) {
                for v in [v0, face.vertices[k], face.vertices[k + 1]] {
                    let Some(p) = positions.get(v.index()) else {
                        continue;
                    };
                    self.triangle_positions.extend_from_slice(p);
                    self.triangle_colors.extend_from_slice(&self.face_color);
                    if let Some(uv) = self.mesh.uvs.as_ref().and_then(|uvs| uvs.get(v.index())) {
                        self.triangle_uvs.extend_from_slice(uv);
                    }
                }
            }
        }

        self.edge_positions.clear();
        self.edge_colors.clear();
        for edge in &self.edges {
            let (Some(a), Some(b)) = (positions.get(edge.a.index()), positions.get(edge.b.index()))
            else {
                continue;
            };
            self.edge_positions.extend_from_slice(a);
            self.edge_positions.extend_from_slice(b);
            self.edge_colors.extend_from_slice(&self.edge_color);
            self.edge_colors.extend_from_slice(&self.edge_color);
        }

        self.point_positions.clear();
        for p in positions {
            self.point_positions.extend_from_slice(p);
        }
    }
}

impl MeshDataProvider for StaticMeshProvider {
    fn buffered_vertices(&self, kind: PrimitiveKind) -> &[f32] {
        match kind {
            PrimitiveKind::Vertex => &self.point_positions,
            PrimitiveKind::Edge => &self.edge_positions,
            PrimitiveKind::Triangle => &self.triangle_positions,
        }
    }

    fn buffered_uvs(&self) -> &[f32] {
        &self.triangle_uvs
    }

    fn buffered_vertex_colors(&self) -> &[f32] {
        &self.triangle_colors
    }

    fn buffered_edge_colors(&self) -> &[f32] {
        &self.edge_colors
    }

    fn vertices(&self) -> &[[f32; 3]] {
        &self.mesh.positions
    }

    fn faces(&self) -> &[MeshFace] {
        &self.mesh.faces
    }

    fn edges(&self) -> &[MeshEdge] {
        &self.edges
    }

    fn debug_data(&self) -> Vec<DebugGroup> {
        let mut groups = vec![DebugGroup::new("mesh")
            .with("vertices", self.vertices_count())
            .with("faces", self.faces_count())
            .with("edges", self.edges_count())];
        groups.extend(self.debug.iter().cloned());
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::mesh;

    fn quad_and_triangle() -> MeshData {
        MeshData {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
                [2.0, 0.0, 0.0],
            ],
            faces: vec![MeshFace::new([0, 1, 2, 3]), MeshFace::new([1, 4, 2])],
            uvs: None,
        }
    }

    /// Provider whose colors are one triple short
    struct ShortColors(StaticMeshProvider);

    impl MeshDataProvider for ShortColors {
        fn buffered_vertices(&self, kind: PrimitiveKind) -> &[f32] {
            self.0.buffered_vertices(kind)
        }
        fn buffered_vertex_colors(&self) -> &[f32] {
            let c = self.0.buffered_vertex_colors();
            &c[..c.len() - 3]
        }
        fn buffered_edge_colors(&self) -> &[f32] {
            self.0.buffered_edge_colors()
        }
        fn vertices(&self) -> &[[f32; 3]] {
            self.0.vertices()
        }
        fn faces(&self) -> &[MeshFace] {
            self.0.faces()
        }
        fn edges(&self) -> &[MeshEdge] {
            self.0.edges()
        }
    }

    #[test]
    fn test_layout_ranges() {
        let m = quad_and_triangle();
        let layout = FaceLayout::from_faces(&m.faces);
        assert_eq!(layout.triangle_count(), 3);
        assert_eq!(layout.triangle_range(FaceId(0)), Some(0..2));
        assert_eq!(layout.triangle_range(FaceId(1)), Some(2..3));
        assert_eq!(layout.buffer_range(FaceId(1)), Some(6..9));
        assert_eq!(layout.triangle_range(FaceId(2)), None);
    }

    #[test]
    fn test_face_of_triangle() {
        let layout = FaceLayout::from_faces(&quad_and_triangle().faces);
        assert_eq!(layout.face_of_triangle(0), Some(FaceId(0)));
        assert_eq!(layout.face_of_triangle(1), Some(FaceId(0)));
        assert_eq!(layout.face_of_triangle(2), Some(FaceId(1)));
        assert_eq!(layout.face_of_triangle(3), None);
    }

    #[test]
    fn test_face_adjacency() {
        let quad = MeshFace::new([0, 1, 2, 3]);
        assert!(quad.is_adjacent_to(&MeshEdge::new(3, 0)));
        assert!(quad.is_adjacent_to(&MeshEdge::new(2, 1)));
        assert!(!quad.is_adjacent_to(&MeshEdge::new(0, 2)));
    }

    #[test]
    fn test_static_provider_buffers_are_aligned() {
        let p = StaticMeshProvider::new(quad_and_triangle(), [0.5; 3], [0.1; 3]);
        let layout = FaceLayout::from_faces(p.faces());
        assert!(validate_provider(&p, &layout).is_ok());
        assert_eq!(p.buffered_vertices(PrimitiveKind::Triangle).len(), 27);
        // quad boundary (4) + triangle adds 1-4 and 4-2
        assert_eq!(p.edges_count(), 6);
        assert_eq!(p.buffered_vertices(PrimitiveKind::Vertex).len(), 15);
    }

    #[test]
    fn test_mismatched_colors_are_rejected() {
        let p = ShortColors(StaticMeshProvider::new(quad_and_triangle(), [0.5; 3], [0.1; 3]));
        let layout = FaceLayout::from_faces(p.faces());
        let err = validate_provider(&p, &layout).unwrap_err();
        assert_eq!(
            err,
            ProviderError::ContractViolation {
                buffer: "vertex colors",
                expected: 27,
                actual: 24,
            }
        );
    }

    #[test]
    fn test_dangling_face_vertex_is_rejected() {
        let mut m = quad_and_triangle();
        m.faces.push(MeshFace::new([0, 1, 9]));
        let p = StaticMeshProvider {
            mesh: m.clone(),
            edges: Vec::new(),
            face_color: [0.0; 3],
            edge_color: [0.0; 3],
            triangle_positions: Vec::new(),
            triangle_colors: Vec::new(),
            triangle_uvs: Vec::new(),
            edge_positions: Vec::new(),
            edge_colors: Vec::new(),
            point_positions: Vec::new(),
            debug: Vec::new(),
        };
        let layout = FaceLayout::from_faces(&m.faces);
        assert!(matches!(
            validate_provider(&p, &layout),
            Err(ProviderError::DanglingVertex { element: "face", index: 2, vertex: 9, .. })
        ));
    }

    #[test]
    fn test_element_counts_bound_ids() {
        let p = StaticMeshProvider::new(quad_and_triangle(), [0.5; 3], [0.1; 3]);
        let counts = ElementCounts::of(&p);
        assert_eq!(counts, ElementCounts { vertices: 5, faces: 2, edges: 6 });
        assert!(counts.contains(ElementRef::Face(FaceId(1))));
        assert!(!counts.contains(ElementRef::Face(FaceId(2))));
        assert!(counts.contains(ElementRef::Vertex(VertexId(4))));
    }

    #[test]
    fn test_debug_data_lists_counts() {
        let p = StaticMeshProvider::new(quad_and_triangle(), [0.5; 3], [0.1; 3])
            .with_debug_group(DebugGroup::new("engine").with("step", 3));
        let groups = p.debug_data();
        assert_eq!(groups[0].name, "mesh");
        assert_eq!(groups[1].entries[0], ("step".to_string(), "3".to_string()));
    }
}
