//! Per-frame driver: resample provider buffers, recolor, render.
//!
//! The hover re-pick that opens every frame lives in the viewport
//! controller, which then hands over to [`FrameUpdater::run`].

use std::cell::Cell;
use std::rc::Rc;

use crate::provider::{validate_provider, FaceLayout, MeshDataProvider, PrimitiveKind, ProviderError};
use crate::state::selection::{ColorOverlay, Palette};
use crate::state::settings::TextureSettings;
use crate::viewport::picking::Aabb;

/// Coalescing resize flag. Observers may request any number of resizes
/// between frames; only the latest is applied, once, at the next frame.
#[derive(Debug, Clone, Default)]
pub struct ResizeHandle(Rc<Cell<Option<(u32, u32)>>>);

impl ResizeHandle {
    pub fn request(&self, width: u32, height: u32) {
        self.0.set(Some((width, height)));
    }

    pub fn is_pending(&self) -> bool {
        self.0.get().is_some()
    }

    fn take(&self) -> Option<(u32, u32)> {
        self.0.take()
    }
}

/// Buffers the backend must re-upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtySet {
    pub positions: bool,
    pub uvs: bool,
    pub colors: bool,
}

impl DirtySet {
    pub fn all() -> Self {
        Self {
            positions: true,
            uvs: true,
            colors: true,
        }
    }
}

/// Everything the backend draws for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameBuffers<'a> {
    pub triangle_positions: &'a [f32],
    pub triangle_colors: &'a [f32],
    pub uvs: &'a [f32],
    pub edge_positions: &'a [f32],
    pub edge_colors: &'a [f32],
    pub point_positions: &'a [f32],
    pub point_colors: &'a [f32],
    /// Draw the vertex point cloud
    pub show_points: bool,
    pub background: [f32; 3],
}

/// Renderer adapter consumed by the frame step
pub trait RenderBackend {
    fn resize(&mut self, width: u32, height: u32);

    fn render(&mut self, buffers: &FrameBuffers<'_>, dirty: &DirtySet);

    /// Ask the host for another frame (animation-frame request)
    fn schedule_next_frame(&mut self);
}

/// Per-frame inputs that are not owned by the updater
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub overlay: &'a ColorOverlay,
    pub palette: &'a Palette,
    pub texture: &'a TextureSettings,
    pub background: [f32; 3],
    pub show_points: bool,
}

/// Outcome of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub frame: u64,
    /// Resize applied before sampling, if one was pending
    pub resized: Option<(u32, u32)>,
    pub triangles: usize,
    pub overlay_entries: usize,
    pub dirty: DirtySet,
    /// The hover pick changed the highlighted element
    pub hover_changed: bool,
}

/// Owns the face layout, bounds and scratch color buffers of one viewport
#[derive(Debug, Default)]
pub struct FrameUpdater {
    layout: FaceLayout,
    bounds: Option<Aabb>,
    triangle_colors: Vec<f32>,
    edge_colors: Vec<f32>,
    point_colors: Vec<f32>,
    resize: ResizeHandle,
    frames: u64,
}

impl FrameUpdater {
    pub fn new(provider: &dyn MeshDataProvider) -> Self {
        let mut updater = Self::default();
        updater.rebind(provider);
        updater
    }

    /// Recompute layout and bounds for a (possibly new) provider
    pub fn rebind(&mut self, provider: &dyn MeshDataProvider) {
        self.layout.rebuild(provider.faces());
        self.bounds = Aabb::from_positions(provider.buffered_vertices(PrimitiveKind::Triangle));
        self.triangle_colors.clear();
        self.edge_colors.clear();
        self.point_colors.clear();
    }

    pub fn layout(&self) -> &FaceLayout {
        &self.layout
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn resize_handle(&self) -> ResizeHandle {
        self.resize.clone()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Steps after the hover pick: resize, sample, recolor, mark dirty,
    /// render, schedule. A contract violation aborts before anything is
    /// written or rendered.
    pub fn run(
        &mut self,
        provider: &dyn MeshDataProvider,
        view: FrameView<'_>,
        backend: &mut dyn RenderBackend,
    ) -> Result<FrameReport, ProviderError> {
        let mut report = FrameReport::default();

        if let Some((w, h)) = self.resize.take() {
            backend.resize(w, h);
            report.resized = Some((w, h));
        }

        // Sample
        self.layout.rebuild(provider.faces());
        if let Err(e) = validate_provider(provider, &self.layout) {
            tracing::error!("provider contract violation: {e}");
            return Err(e);
        }
        let triangles = provider.buffered_vertices(PrimitiveKind::Triangle);
        self.bounds = Aabb::from_positions(triangles);

        // Recolor from base
        self.triangle_colors.clear();
        self.triangle_colors.extend_from_slice(provider.buffered_vertex_colors());
        if view.texture.checker {
            apply_checker(&mut self.triangle_colors, provider.buffered_uvs(), view.texture.scale);
        }
        self.edge_colors.clear();
        self.edge_colors.extend_from_slice(provider.buffered_edge_colors());
        self.point_colors.clear();
        for _ in 0..provider.vertices_count() {
            self.point_colors.extend_from_slice(&view.palette.vertex_point);
        }
        view.overlay.paint(
            &self.layout,
            &mut self.triangle_colors,
            &mut self.edge_colors,
            &mut self.point_colors,
        );

        let dirty = DirtySet::all();
        let buffers = FrameBuffers {
            triangle_positions: triangles,
            triangle_colors: &self.triangle_colors,
            uvs: provider.buffered_uvs(),
            edge_positions: provider.buffered_vertices(PrimitiveKind::Edge),
            edge_colors: &self.edge_colors,
            point_positions: provider.buffered_vertices(PrimitiveKind::Vertex),
            point_colors: &self.point_colors,
            show_points: view.show_points,
            background: view.background,
        };
        backend.render(&buffers, &dirty);
        backend.schedule_next_frame();

        self.frames += 1;
        report.frame = self.frames;
        report.triangles = self.layout.triangle_count();
        report.overlay_entries = view.overlay.len();
        report.dirty = dirty;
        Ok(report)
    }
}

/// Darken alternate checker squares in uv space
fn apply_checker(colors: &mut [f32], uvs: &[f32], scale: f32) {
    for (rgb, uv) in colors.chunks_exact_mut(3).zip(uvs.chunks_exact(2)) {
        let parity = (uv[0] * scale).floor() as i64 + (uv[1] * scale).floor() as i64;
        if parity.rem_euclid(2) == 1 {
            for c in rgb {
                *c *= 0.8;
            }
        }
    }
}

/// Backend that keeps copies of what it was asked to draw
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    pub frames_rendered: usize,
    pub frames_scheduled: usize,
    pub resizes: Vec<(u32, u32)>,
    pub last_dirty: DirtySet,
    pub triangle_colors: Vec<f32>,
    pub edge_colors: Vec<f32>,
    pub point_colors: Vec<f32>,
    pub show_points: bool,
}

impl RecordingBackend {
    /// Recorded color of buffered triangle vertex `index`
    pub fn triangle_color(&self, index: usize) -> Option<[f32; 3]> {
        let c = self.triangle_colors.get(index * 3..index * 3 + 3)?;
        Some([c[0], c[1], c[2]])
    }
}

impl RenderBackend for RecordingBackend {
    fn resize(&mut self, width: u32, height: u32) {
        self.resizes.push((width, height));
    }

    fn render(&mut self, buffers: &FrameBuffers<'_>, dirty: &DirtySet) {
        self.frames_rendered += 1;
        self.last_dirty = *dirty;
        self.triangle_colors.clear();
        self.triangle_colors.extend_from_slice(buffers.triangle_colors);
        self.edge_colors.clear();
        self.edge_colors.extend_from_slice(buffers.edge_colors);
        self.point_colors.clear();
        self.point_colors.extend_from_slice(buffers.point_colors);
        self.show_points = buffers.show_points;
    }

    fn schedule_next_frame(&mut self) {
        self.frames_scheduled += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MeshEdge, MeshFace, StaticMeshProvider};
    use crate::viewport::mesh;
    use shared::FaceId;

    fn view<'a>(
        overlay: &'a ColorOverlay,
        palette: &'a Palette,
        texture: &'a TextureSettings,
    ) -> FrameView<'a> {
        FrameView {
            overlay,
            palette,
            texture,
            background: [0.0; 3],
            show_points: false,
        }
    }

    /// Provider with one color triple missing
    struct Broken(StaticMeshProvider);

    impl MeshDataProvider for Broken {
        fn buffered_vertices(&self, kind: PrimitiveKind) -> &[f32] {
            self.0.buffered_vertices(kind)
        }
        fn buffered_vertex_colors(&self) -> &[f32] {
            let c = self.0.buffered_vertex_colors();
            &c[3..]
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
    fn test_frame_paints_overlay_over_base() {
        let p = StaticMeshProvider::new(mesh::grid(2, 1, 1.0), [0.5; 3], [0.1; 3]);
        let mut updater = FrameUpdater::new(&p);
        let mut backend = RecordingBackend::default();
        let mut overlay = ColorOverlay::default();
        overlay.faces.insert(FaceId(1), [1.0, 0.0, 0.0]);
        let palette = Palette::default();
        let texture = TextureSettings::default();

        let report = updater
            .run(&p, view(&overlay, &palette, &texture), &mut backend)
            .unwrap();
        assert_eq!(report.frame, 1);
        assert_eq!(report.dirty, DirtySet::all());
        assert_eq!(backend.frames_rendered, 1);
        assert_eq!(backend.frames_scheduled, 1);
        // Face 0 -> buffered vertices 0..6, face 1 -> 6..12
        assert_eq!(backend.triangle_color(0), Some([0.5; 3]));
        assert_eq!(backend.triangle_color(6), Some([1.0, 0.0, 0.0]));
        assert_eq!(backend.triangle_color(11), Some([1.0, 0.0, 0.0]));
        // Provider's own colors are untouched
        assert!(p.buffered_vertex_colors().iter().all(|&c| c == 0.5));
    }

    #[test]
    fn test_overlay_is_recomputed_not_patched() {
        let p = StaticMeshProvider::new(mesh::grid(2, 1, 1.0), [0.5; 3], [0.1; 3]);
        let mut updater = FrameUpdater::new(&p);
        let mut backend = RecordingBackend::default();
        let palette = Palette::default();
        let texture = TextureSettings::default();

        let mut overlay = ColorOverlay::default();
        overlay.faces.insert(FaceId(0), [1.0, 0.0, 0.0]);
        updater.run(&p, view(&overlay, &palette, &texture), &mut backend).unwrap();
        updater
            .run(&p, view(&ColorOverlay::default(), &palette, &texture), &mut backend)
            .unwrap();
        assert!(backend.triangle_colors.iter().all(|&c| c == 0.5));
    }

    #[test]
    fn test_resize_is_coalesced_and_consumed_once() {
        let p = StaticMeshProvider::new(mesh::grid(1, 1, 1.0), [0.5; 3], [0.1; 3]);
        let mut updater = FrameUpdater::new(&p);
        let handle = updater.resize_handle();
        handle.request(100, 100);
        handle.request(640, 480);
        assert!(handle.is_pending());

        let mut backend = RecordingBackend::default();
        let palette = Palette::default();
        let texture = TextureSettings::default();
        let overlay = ColorOverlay::default();
        let r1 = updater.run(&p, view(&overlay, &palette, &texture), &mut backend).unwrap();
        let r2 = updater.run(&p, view(&overlay, &palette, &texture), &mut backend).unwrap();
        assert_eq!(r1.resized, Some((640, 480)));
        assert_eq!(r2.resized, None);
        assert_eq!(backend.resizes, vec![(640, 480)]);
    }

    #[test]
    fn test_contract_violation_aborts_frame() {
        let p = Broken(StaticMeshProvider::new(mesh::grid(1, 1, 1.0), [0.5; 3], [0.1; 3]));
        let mut updater = FrameUpdater::new(&p);
        let mut backend = RecordingBackend::default();
        let palette = Palette::default();
        let texture = TextureSettings::default();
        let overlay = ColorOverlay::default();

        let err = updater
            .run(&p, view(&overlay, &palette, &texture), &mut backend)
            .unwrap_err();
        assert!(matches!(err, ProviderError::ContractViolation { buffer: "vertex colors", .. }));
        assert_eq!(backend.frames_rendered, 0);
        assert_eq!(backend.frames_scheduled, 0);
        assert_eq!(updater.frame_count(), 0);
    }

    #[test]
    fn test_point_colors_use_palette() {
        let p = StaticMeshProvider::new(mesh::grid(1, 1, 1.0), [0.5; 3], [0.1; 3]);
        let mut updater = FrameUpdater::new(&p);
        let mut backend = RecordingBackend::default();
        let palette = Palette {
            vertex_point: [0.25; 3],
            ..Palette::default()
        };
        let texture = TextureSettings::default();
        let overlay = ColorOverlay::default();
        updater.run(&p, view(&overlay, &palette, &texture), &mut backend).unwrap();
        assert_eq!(backend.point_colors.len(), 12);
        assert!(backend.point_colors.iter().all(|&c| c == 0.25));
    }

    #[test]
    fn test_checker_darkens_alternate_squares() {
        let mut colors = vec![1.0; 6];
        apply_checker(&mut colors, &[0.05, 0.05, 0.15, 0.05], 10.0);
        assert_eq!(&colors[..3], &[1.0; 3]);
        assert!((colors[3] - 0.8).abs() < 1e-6);
    }
}
