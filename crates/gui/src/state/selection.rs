use std::collections::HashMap;
use std::hash::Hash;

use glam::Vec3;
use shared::{EdgeId, ElementKind, ElementRef, FaceId, VertexId};

use crate::provider::{ElementCounts, FaceLayout};

use super::settings::ColorSettings;

/// Per-element selection record. Membership is the only payload that matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRecord {
    /// Registry revision at the time of selection
    pub since: u64,
}

/// Set of selected ids of one element kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSet<K: Eq + Hash> {
    items: HashMap<K, SelectionRecord>,
}

impl<K: Eq + Hash> Default for SelectionSet<K> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Ord> SelectionSet<K> {
    pub fn contains(&self, id: K) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<K> {
        let mut ids: Vec<K> = self.items.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Ids in no particular order, without allocating
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.items.keys().copied()
    }

    fn insert(&mut self, id: K, since: u64) -> bool {
        if self.items.contains_key(&id) {
            return false;
        }
        self.items.insert(id, SelectionRecord { since });
        true
    }

    fn remove(&mut self, id: K) -> bool {
        self.items.remove(&id).is_some()
    }

    fn clear(&mut self) -> bool {
        let had = !self.items.is_empty();
        self.items.clear();
        had
    }
}

/// Highlight colors as linear floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub select: [f32; 3],
    pub highlight: [f32; 3],
    pub drag: [f32; 3],
    pub vertex_point: [f32; 3],
}

impl From<&ColorSettings> for Palette {
    fn from(colors: &ColorSettings) -> Self {
        let f = |c: [u8; 3]| c.map(|v| v as f32 / 255.0);
        Self {
            select: f(colors.select),
            highlight: f(colors.highlight),
            drag: f(colors.drag),
            vertex_point: f(colors.vertex_point),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from(&ColorSettings::default())
    }
}

/// Sparse per-element color overrides for one frame.
/// Kept across frames and cleared in place, so the maps keep their capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorOverlay {
    pub faces: HashMap<FaceId, [f32; 3]>,
    pub edges: HashMap<EdgeId, [f32; 3]>,
    pub vertices: HashMap<VertexId, [f32; 3]>,
}

impl ColorOverlay {
    pub fn clear(&mut self) {
        self.faces.clear();
        self.edges.clear();
        self.vertices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.edges.is_empty() && self.vertices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.faces.len() + self.edges.len() + self.vertices.len()
    }

    /// Color override for `element`, if any
    pub fn color_of(&self, element: ElementRef) -> Option<[f32; 3]> {
        match element {
            ElementRef::Vertex(id) => self.vertices.get(&id).copied(),
            ElementRef::Face(id) => self.faces.get(&id).copied(),
            ElementRef::Edge(id) => self.edges.get(&id).copied(),
        }
    }

    fn set(&mut self, element: ElementRef, color: [f32; 3]) {
        match element {
            ElementRef::Vertex(id) => {
                self.vertices.insert(id, color);
            }
            ElementRef::Face(id) => {
                self.faces.insert(id, color);
            }
            ElementRef::Edge(id) => {
                self.edges.insert(id, color);
            }
        }
    }

    /// Write the overrides into color buffers that already hold base colors.
    ///
    /// `triangles` is aligned to the triangle stream (3 floats per buffered
    /// vertex), `edges` to the edge stream, `points` to the vertex stream.
    pub fn paint(
        &self,
        layout: &FaceLayout,
        triangles: &mut [f32],
        edges: &mut [f32],
        points: &mut [f32],
    ) {
        for (face, color) in &self.faces {
            let Some(range) = layout.buffer_range(*face) else {
                continue;
            };
            for v in range {
                write_rgb(triangles, v, color);
            }
        }
        for (edge, color) in &self.edges {
            let first = edge.index() * 2;
            write_rgb(edges, first, color);
            write_rgb(edges, first + 1, color);
        }
        for (vertex, color) in &self.vertices {
            write_rgb(points, vertex.index(), color);
        }
    }
}

fn write_rgb(buf: &mut [f32], slot: usize, color: &[f32; 3]) {
    if let Some(dst) = buf.get_mut(slot * 3..slot * 3 + 3) {
        dst.copy_from_slice(color);
    }
}

/// Per-viewport selection, highlight and drag state.
///
/// Mutated only by the owning viewport's input handlers and by remote sync
/// messages. Every call that changes state bumps `revision`; no-op calls
/// leave it untouched.
#[derive(Debug, Clone, Default)]
pub struct SelectionRegistry {
    vertices: SelectionSet<VertexId>,
    faces: SelectionSet<FaceId>,
    edges: SelectionSet<EdgeId>,
    highlighted: Option<ElementRef>,
    dragged: Option<FaceId>,
    /// Sum of drag offsets applied to `dragged` since the drag began
    drag_offset: Vec3,
    revision: u64,
}

impl SelectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self, changed: bool) -> bool {
        if changed {
            self.revision += 1;
        }
        changed
    }

    // ── Selection ────────────────────────────────────────────

    /// Add `element` to its selection set. Returns false if already selected.
    pub fn select(&mut self, element: ElementRef) -> bool {
        let since = self.revision + 1;
        let changed = match element {
            ElementRef::Vertex(id) => self.vertices.insert(id, since),
            ElementRef::Face(id) => self.faces.insert(id, since),
            ElementRef::Edge(id) => self.edges.insert(id, since),
        };
        self.bump(changed)
    }

    /// Remove `element` from its selection set. Returns false if not selected.
    pub fn unselect(&mut self, element: ElementRef) -> bool {
        let changed = match element {
            ElementRef::Vertex(id) => self.vertices.remove(id),
            ElementRef::Face(id) => self.faces.remove(id),
            ElementRef::Edge(id) => self.edges.remove(id),
        };
        self.bump(changed)
    }

    /// Flip membership of `element`; returns whether it is now selected
    pub fn toggle(&mut self, element: ElementRef) -> bool {
        if self.is_selected(element) {
            self.unselect(element);
            false
        } else {
            self.select(element);
            true
        }
    }

    pub fn is_selected(&self, element: ElementRef) -> bool {
        match element {
            ElementRef::Vertex(id) => self.vertices.contains(id),
            ElementRef::Face(id) => self.faces.contains(id),
            ElementRef::Edge(id) => self.edges.contains(id),
        }
    }

    pub fn selected_vertices(&self) -> &SelectionSet<VertexId> {
        &self.vertices
    }

    pub fn selected_faces(&self) -> &SelectionSet<FaceId> {
        &self.faces
    }

    pub fn selected_edges(&self) -> &SelectionSet<EdgeId> {
        &self.edges
    }

    pub fn selection_count(&self) -> usize {
        self.vertices.len() + self.faces.len() + self.edges.len()
    }

    // ── Highlight ────────────────────────────────────────────

    /// Highlight `element`, replacing any previous highlight.
    ///
    /// Face highlights are refused while a face is being dragged.
    pub fn set_highlighted(&mut self, element: ElementRef) -> bool {
        if element.kind() == ElementKind::Face && self.dragged.is_some() {
            return false;
        }
        let changed = self.highlighted != Some(element);
        self.highlighted = Some(element);
        self.bump(changed)
    }

    pub fn clear_highlighted(&mut self) -> bool {
        let changed = self.highlighted.take().is_some();
        self.bump(changed)
    }

    /// Clear the highlight only if it is of `kind`
    pub fn clear_highlighted_kind(&mut self, kind: ElementKind) -> bool {
        match self.highlighted {
            Some(h) if h.kind() == kind => self.clear_highlighted(),
            _ => false,
        }
    }

    pub fn highlighted(&self) -> Option<ElementRef> {
        self.highlighted
    }

    // ── Drag ─────────────────────────────────────────────────

    /// Mark `face` as dragged and reset the offset accumulator.
    /// A face highlight is dropped for the duration of the drag.
    pub fn set_dragged(&mut self, face: FaceId) -> bool {
        let mut changed = self.dragged != Some(face) || self.drag_offset != Vec3::ZERO;
        if matches!(self.highlighted, Some(ElementRef::Face(_))) {
            self.highlighted = None;
            changed = true;
        }
        self.dragged = Some(face);
        self.drag_offset = Vec3::ZERO;
        self.bump(changed)
    }

    /// Release the dragged face, returning it
    pub fn clear_dragged(&mut self) -> Option<FaceId> {
        let face = self.dragged.take();
        self.drag_offset = Vec3::ZERO;
        self.bump(face.is_some());
        face
    }

    pub fn dragged(&self) -> Option<FaceId> {
        self.dragged
    }

    /// Add a relative offset to the current drag. Ignored unless `face` is
    /// the dragged face.
    pub fn accumulate_drag(&mut self, face: FaceId, offset: Vec3) -> bool {
        if self.dragged != Some(face) || offset == Vec3::ZERO {
            return false;
        }
        self.drag_offset += offset;
        self.bump(true)
    }

    pub fn drag_offset(&self) -> Vec3 {
        self.drag_offset
    }

    /// Drop every selection, highlight and drag (provider swap)
    pub fn clear_all(&mut self) -> bool {
        let mut changed = self.vertices.clear();
        changed |= self.faces.clear();
        changed |= self.edges.clear();
        changed |= self.highlighted.take().is_some();
        changed |= self.dragged.take().is_some();
        self.drag_offset = Vec3::ZERO;
        self.bump(changed)
    }

    // ── Colors ───────────────────────────────────────────────

    /// Refill `overlay` for this frame: selected, then highlighted, then
    /// dragged, later layers winning. Ids outside `counts` are skipped.
    pub fn fill_overlay(&self, counts: ElementCounts, palette: &Palette, overlay: &mut ColorOverlay) {
        overlay.clear();
        let mut put = |element: ElementRef, color: [f32; 3]| {
            if counts.contains(element) {
                overlay.set(element, color);
            }
        };

        for id in self.faces.iter() {
            put(ElementRef::Face(id), palette.select);
        }
        for id in self.edges.iter() {
            put(ElementRef::Edge(id), palette.select);
        }
        for id in self.vertices.iter() {
            put(ElementRef::Vertex(id), palette.select);
        }
        if let Some(h) = self.highlighted {
            put(h, palette.highlight);
        }
        if let Some(face) = self.dragged {
            put(ElementRef::Face(face), palette.drag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> ElementCounts {
        ElementCounts {
            vertices: 16,
            faces: 9,
            edges: 24,
        }
    }

    fn palette() -> Palette {
        Palette {
            select: [1.0, 0.0, 0.0],
            highlight: [0.0, 1.0, 0.0],
            drag: [0.0, 0.0, 1.0],
            vertex_point: [1.0, 1.0, 1.0],
        }
    }

    fn overlay_of(reg: &SelectionRegistry) -> ColorOverlay {
        let mut overlay = ColorOverlay::default();
        reg.fill_overlay(counts(), &palette(), &mut overlay);
        overlay
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut once = SelectionRegistry::new();
        once.select(ElementRef::Face(FaceId(2)));

        let mut twice = SelectionRegistry::new();
        assert!(twice.select(ElementRef::Face(FaceId(2))));
        assert!(!twice.select(ElementRef::Face(FaceId(2))));

        assert_eq!(once.selected_faces(), twice.selected_faces());
        assert_eq!(twice.revision(), 1);
    }

    #[test]
    fn test_unselect_is_idempotent() {
        let mut reg = SelectionRegistry::new();
        reg.select(ElementRef::Vertex(VertexId(1)));
        assert!(reg.unselect(ElementRef::Vertex(VertexId(1))));
        assert!(!reg.unselect(ElementRef::Vertex(VertexId(1))));
        assert!(reg.selected_vertices().is_empty());
        assert_eq!(reg.revision(), 2);
    }

    #[test]
    fn test_select_unselect_restores_set() {
        let mut reg = SelectionRegistry::new();
        reg.select(ElementRef::Face(FaceId(0)));
        reg.select(ElementRef::Edge(EdgeId(4)));
        let faces = reg.selected_faces().clone();
        let edges = reg.selected_edges().clone();

        reg.select(ElementRef::Face(FaceId(5)));
        reg.unselect(ElementRef::Face(FaceId(5)));

        assert_eq!(reg.selected_faces(), &faces);
        assert_eq!(reg.selected_edges(), &edges);
    }

    #[test]
    fn test_toggle() {
        let mut reg = SelectionRegistry::new();
        assert!(reg.toggle(ElementRef::Edge(EdgeId(3))));
        assert!(reg.is_selected(ElementRef::Edge(EdgeId(3))));
        assert!(!reg.toggle(ElementRef::Edge(EdgeId(3))));
        assert_eq!(reg.selection_count(), 0);
    }

    #[test]
    fn test_single_highlight_slot() {
        let mut reg = SelectionRegistry::new();
        reg.set_highlighted(ElementRef::Face(FaceId(1)));
        reg.set_highlighted(ElementRef::Face(FaceId(2)));
        reg.set_highlighted(ElementRef::Edge(EdgeId(7)));
        assert_eq!(reg.highlighted(), Some(ElementRef::Edge(EdgeId(7))));

        let before = reg.revision();
        assert!(!reg.set_highlighted(ElementRef::Edge(EdgeId(7))));
        assert_eq!(reg.revision(), before);

        assert!(!reg.clear_highlighted_kind(ElementKind::Face));
        assert!(reg.clear_highlighted_kind(ElementKind::Edge));
        assert_eq!(reg.highlighted(), None);
    }

    #[test]
    fn test_drag_suppresses_face_highlight() {
        let mut reg = SelectionRegistry::new();
        reg.set_highlighted(ElementRef::Face(FaceId(3)));
        reg.set_dragged(FaceId(3));
        assert_eq!(reg.highlighted(), None);
        assert!(!reg.set_highlighted(ElementRef::Face(FaceId(4))));
        // Vertices are a different class
        assert!(reg.set_highlighted(ElementRef::Vertex(VertexId(0))));

        assert_eq!(reg.clear_dragged(), Some(FaceId(3)));
        assert!(reg.set_highlighted(ElementRef::Face(FaceId(4))));
    }

    #[test]
    fn test_drag_offset_accumulates_for_dragged_face_only() {
        let mut reg = SelectionRegistry::new();
        reg.set_dragged(FaceId(1));
        assert!(reg.accumulate_drag(FaceId(1), Vec3::X));
        assert!(reg.accumulate_drag(FaceId(1), Vec3::Y));
        assert!(!reg.accumulate_drag(FaceId(2), Vec3::Z));
        assert_eq!(reg.drag_offset(), Vec3::new(1.0, 1.0, 0.0));
        reg.clear_dragged();
        assert_eq!(reg.drag_offset(), Vec3::ZERO);
    }

    #[test]
    fn test_color_precedence() {
        let mut reg = SelectionRegistry::new();
        let face = ElementRef::Face(FaceId(4));
        reg.select(face);
        reg.set_highlighted(face);
        let overlay = overlay_of(&reg);
        assert_eq!(overlay.color_of(face), Some(palette().highlight));

        reg.set_dragged(FaceId(4));
        let overlay = overlay_of(&reg);
        assert_eq!(overlay.color_of(face), Some(palette().drag));
    }

    #[test]
    fn test_overlay_skips_out_of_range_ids() {
        let mut reg = SelectionRegistry::new();
        reg.select(ElementRef::Face(FaceId(2)));
        reg.select(ElementRef::Face(FaceId(50)));
        let overlay = overlay_of(&reg);
        assert_eq!(overlay.faces.len(), 1);
    }

    #[test]
    fn test_fill_overlay_reuses_maps() {
        let mut reg = SelectionRegistry::new();
        for f in 0..8 {
            reg.select(ElementRef::Face(FaceId(f)));
        }
        let mut overlay = ColorOverlay::default();
        reg.fill_overlay(counts(), &palette(), &mut overlay);
        assert_eq!(overlay.faces.len(), 8);
        let capacity = overlay.faces.capacity();

        reg.clear_all();
        reg.select(ElementRef::Face(FaceId(1)));
        reg.fill_overlay(counts(), &palette(), &mut overlay);
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.color_of(ElementRef::Face(FaceId(1))), Some(palette().select));
        assert_eq!(overlay.faces.capacity(), capacity);
    }

    #[test]
    fn test_clear_all_leaves_empty_overlay() {
        let mut reg = SelectionRegistry::new();
        reg.select(ElementRef::Face(FaceId(2)));
        reg.select(ElementRef::Face(FaceId(5)));
        reg.set_highlighted(ElementRef::Edge(EdgeId(1)));
        assert!(reg.clear_all());
        assert!(overlay_of(&reg).is_empty());
        assert!(!reg.clear_all());
    }

    #[test]
    fn test_paint_writes_face_triangles() {
        use crate::provider::MeshFace;
        let layout = FaceLayout::from_faces(&[
            MeshFace::new([0, 1, 2, 3]),
            MeshFace::new([1, 4, 2]),
        ]);
        let mut tris = vec![0.5; 9 * 3];
        let mut edges = vec![0.1; 6 * 2];
        let mut points = vec![0.9; 3 * 5];

        let mut overlay = ColorOverlay::default();
        overlay.faces.insert(FaceId(1), [1.0, 0.0, 0.0]);
        overlay.edges.insert(EdgeId(1), [0.0, 1.0, 0.0]);
        overlay.vertices.insert(VertexId(4), [0.0, 0.0, 1.0]);
        overlay.paint(&layout, &mut tris, &mut edges, &mut points);

        // Face 0 covers buffered vertices 0..6, untouched
        assert!(tris[..18].iter().all(|&c| c == 0.5));
        assert_eq!(&tris[18..21], &[1.0, 0.0, 0.0]);
        assert_eq!(&edges[6..9], &[0.0, 1.0, 0.0]);
        assert_eq!(&edges[..3], &[0.1, 0.1, 0.1]);
        assert_eq!(&points[12..15], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_palette_from_settings() {
        let colors = ColorSettings {
            select: [255, 0, 0],
            ..ColorSettings::default()
        };
        let p = Palette::from(&colors);
        assert_eq!(p.select, [1.0, 0.0, 0.0]);
    }
}
