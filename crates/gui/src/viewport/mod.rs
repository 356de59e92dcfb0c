//! Viewport panel: routes egui input into a [`ViewportController`] and
//! paints its frames.

mod painter;

pub use twinview_gui_lib::viewport::{camera, controller};

use egui::{Align2, Color32, FontId, PointerButton, Sense, Ui};
use glam::Vec2;

use controller::ViewportController;
use painter::PainterBackend;

pub struct ViewportPanel {
    controller: ViewportController,
    /// Pointer was inside the canvas last frame
    pointer_inside: bool,
    /// Primary button went down on this canvas and is still held
    primary_down: bool,
}

impl ViewportPanel {
    pub fn new(controller: ViewportController) -> Self {
        Self {
            controller,
            pointer_inside: false,
            primary_down: false,
        }
    }

    pub fn controller(&self) -> &ViewportController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ViewportController {
        &mut self.controller
    }

    pub fn show(&mut self, ui: &mut Ui) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.controller.set_canvas_size(rect.width(), rect.height());

        // ── Pointer ─────────────────────────────
        // The canvas bounds decide, even while a press on it is held:
        // leaving must end a face drag.
        let pointer = ui
            .input(|i| i.pointer.latest_pos())
            .filter(|pos| rect.contains(*pos));
        match pointer {
            Some(pos) => {
                let local = pos - rect.min;
                self.controller.pointer_move(Vec2::new(local.x, local.y));
                self.pointer_inside = true;
            }
            None if self.pointer_inside => {
                self.controller.pointer_leave();
                self.pointer_inside = false;
                self.primary_down = false;
            }
            None => {}
        }

        // ── Buttons ─────────────────────────────
        let (pressed, released) =
            ui.input(|i| (i.pointer.primary_pressed(), i.pointer.primary_released()));
        if pressed && response.hovered() {
            self.primary_down = true;
            self.controller.left_down();
        }
        if released && self.primary_down {
            self.primary_down = false;
            self.controller.left_up();
        }
        if response.secondary_clicked() {
            self.controller.right_click();
        }

        // ── Camera ──────────────────────────────
        if response.dragged_by(PointerButton::Primary) && !self.controller.state().is_dragging() {
            let d = response.drag_delta();
            self.controller.camera_drag(Vec2::new(d.x, d.y));
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll.abs() > 0.1 {
                self.controller.zoom(scroll * 0.01);
            }
        }

        if !ui.is_rect_visible(rect) {
            return;
        }
        self.paint(ui, rect);
    }

    fn paint(&mut self, ui: &Ui, rect: egui::Rect) {
        let painter = ui.painter_at(rect);
        let (dragged, offset) = {
            let registry = self.controller.registry();
            (registry.dragged(), registry.drag_offset())
        };
        let drag = dragged
            .and_then(|face| self.controller.face_layout().buffer_range(face))
            .map(|range| (range, offset));
        let camera = self.controller.camera().clone();
        let grid = self.controller.settings().grid.clone();
        let mut backend = PainterBackend {
            painter: &painter,
            rect,
            camera: &camera,
            grid: &grid,
            drag,
        };

        if let Err(e) = self.controller.frame(&mut backend) {
            painter.rect_filled(rect, 0.0, Color32::from_rgb(40, 20, 20));
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                format!("Mesh data error: {e}"),
                FontId::proportional(14.0),
                Color32::LIGHT_RED,
            );
            return;
        }

        painter.text(
            rect.min + egui::vec2(8.0, 6.0),
            Align2::LEFT_TOP,
            format!("{} · {}", self.controller.name(), self.controller.state().label()),
            FontId::monospace(12.0),
            Color32::from_gray(200),
        );
    }
}
