//! egui painter backend: projects the frame buffers through the camera and
//! paints them as 2D shapes, back to front.

use std::ops::Range;

use egui::{Color32, Painter, Pos2, Rect, Shape, Stroke};
use glam::{Vec2, Vec3};

use twinview_gui_lib::frame::{DirtySet, FrameBuffers, RenderBackend};
use twinview_gui_lib::state::settings::GridSettings;

use super::camera::ArcBallCamera;

fn color(rgb: &[f32]) -> Color32 {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgb(c(rgb[0]), c(rgb[1]), c(rgb[2]))
}

pub struct PainterBackend<'a> {
    pub painter: &'a Painter,
    pub rect: Rect,
    pub camera: &'a ArcBallCamera,
    pub grid: &'a GridSettings,
    /// Buffered-vertex range of the dragged face and its accumulated offset
    pub drag: Option<(Range<usize>, Vec3)>,
}

impl PainterBackend<'_> {
    fn canvas(&self) -> Vec2 {
        Vec2::new(self.rect.width(), self.rect.height())
    }

    fn project(&self, p: Vec3) -> Option<(Pos2, f32)> {
        let (s, depth) = self.camera.project(p, self.canvas())?;
        Some((self.rect.min + egui::vec2(s.x, s.y), depth))
    }

    /// Buffered position `i` with the drag offset applied
    fn position(&self, positions: &[f32], i: usize) -> Option<Vec3> {
        let p = positions.get(i * 3..i * 3 + 3)?;
        let mut v = Vec3::new(p[0], p[1], p[2]);
        if let Some((range, offset)) = &self.drag {
            if range.contains(&i) {
                v += *offset;
            }
        }
        Some(v)
    }

    fn draw_grid(&self) {
        if !self.grid.visible || self.grid.range <= 0 {
            return;
        }
        let alpha = (self.grid.opacity.clamp(0.0, 1.0) * 90.0) as u8;
        let stroke = Stroke::new(1.0, Color32::from_white_alpha(alpha));
        let extent = self.grid.range as f32 * self.grid.size;
        for k in -self.grid.range..=self.grid.range {
            let t = k as f32 * self.grid.size;
            for (a, b) in [
                (Vec3::new(t, -extent, 0.0), Vec3::new(t, extent, 0.0)),
                (Vec3::new(-extent, t, 0.0), Vec3::new(extent, t, 0.0)),
            ] {
                if let (Some((pa, _)), Some((pb, _))) = (self.project(a), self.project(b)) {
                    self.painter.line_segment([pa, pb], stroke);
                }
            }
        }
    }

    fn draw_triangles(&self, buffers: &FrameBuffers<'_>) {
        let count = buffers.triangle_positions.len() / 9;
        let mut sorted = Vec::with_capacity(count);
        for tri in 0..count {
            let mut corners = [(Pos2::ZERO, 0.0); 3];
            let mut visible = true;
            for (k, corner) in corners.iter_mut().enumerate() {
                match self
                    .position(buffers.triangle_positions, tri * 3 + k)
                    .and_then(|p| self.project(p))
                {
                    Some(c) => *corner = c,
                    None => visible = false,
                }
            }
            if visible {
                let depth = (corners[0].1 + corners[1].1 + corners[2].1) / 3.0;
                sorted.push((tri, corners, depth));
            }
        }
        // Painter's algorithm: far first
        sorted.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut mesh = egui::Mesh::default();
        for (tri, corners, _) in sorted {
            let base = mesh.vertices.len() as u32;
            for (k, (pos, _)) in corners.iter().enumerate() {
                let i = (tri * 3 + k) * 3;
                let rgb = buffers.triangle_colors.get(i..i + 3).unwrap_or(&[0.5; 3]);
                mesh.colored_vertex(*pos, color(rgb));
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }
        self.painter.add(Shape::mesh(mesh));
    }

    fn draw_edges(&self, buffers: &FrameBuffers<'_>) {
        let count = buffers.edge_positions.len() / 6;
        for e in 0..count {
            let ends = (
                self.position(buffers.edge_positions, e * 2)
                    .and_then(|p| self.project(p)),
                self.position(buffers.edge_positions, e * 2 + 1)
                    .and_then(|p| self.project(p)),
            );
            if let (Some((a, _)), Some((b, _))) = ends {
                let i = e * 6;
                let rgb = buffers.edge_colors.get(i..i + 3).unwrap_or(&[0.1; 3]);
                self.painter.line_segment([a, b], Stroke::new(1.2, color(rgb)));
            }
        }
    }

    fn draw_points(&self, buffers: &FrameBuffers<'_>) {
        for (i, p) in buffers.point_positions.chunks_exact(3).enumerate() {
            let Some((pos, _)) = self.project(Vec3::new(p[0], p[1], p[2])) else {
                continue;
            };
            let rgb = buffers.point_colors.get(i * 3..i * 3 + 3).unwrap_or(&[1.0; 3]);
            self.painter.circle_filled(pos, 3.0, color(rgb));
        }
    }
}

impl RenderBackend for PainterBackend<'_> {
    fn resize(&mut self, width: u32, height: u32) {
        tracing::debug!(width, height, "canvas resized");
    }

    fn render(&mut self, buffers: &FrameBuffers<'_>, _dirty: &DirtySet) {
        self.painter.rect_filled(self.rect, 0.0, color(&buffers.background));
        self.draw_grid();
        self.draw_triangles(buffers);
        self.draw_edges(buffers);
        if buffers.show_points {
            self.draw_points(buffers);
        }
    }

    fn schedule_next_frame(&mut self) {
        self.painter.ctx().request_repaint();
    }
}
