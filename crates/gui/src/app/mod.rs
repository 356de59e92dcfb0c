//! Main application module

mod keyboard;

use eframe::egui;

use twinview_gui_lib::fixtures;
use twinview_gui_lib::sync::SyncBus;
use twinview_gui_lib::viewport::controller::ViewportController;

use crate::state::settings::ViewportSettings;
use crate::state::AppSettings;
use crate::viewport::ViewportPanel;
use keyboard::ModeKeys;

const DEFAULT_RESOLUTION: u32 = 6;

/// Two linked viewports: a flat parameter domain and its warped image
pub struct TwinViewApp {
    settings: AppSettings,
    bus: SyncBus,
    domain: ViewportPanel,
    image: ViewportPanel,
    keys: ModeKeys,
    /// Grid resolution of the fixture meshes
    resolution: u32,
    /// Face id entered for the forced highlight
    force_face: u32,
}

impl TwinViewApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let bus = SyncBus::new();
        let domain = ViewportController::new(
            "domain",
            fixtures::boxed(fixtures::domain_provider(DEFAULT_RESOLUTION)),
            settings.domain.clone(),
            bus.clone(),
        );
        let image = ViewportController::new(
            "image",
            fixtures::boxed(fixtures::image_provider(DEFAULT_RESOLUTION)),
            settings.image.clone(),
            bus.clone(),
        );

        Self {
            settings,
            bus,
            domain: ViewportPanel::new(domain),
            image: ViewportPanel::new(image),
            keys: ModeKeys::default(),
            resolution: DEFAULT_RESOLUTION,
            force_face: 0,
        }
    }

    fn rebuild_meshes(&mut self) {
        let n = self.resolution;
        self.domain
            .controller_mut()
            .set_provider(fixtures::boxed(fixtures::domain_provider(n)));
        self.image
            .controller_mut()
            .set_provider(fixtures::boxed(fixtures::image_provider(n)));
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        let mut changed = false;
        changed |= viewport_settings_ui(ui, "Domain", &mut self.settings.domain);
        changed |= viewport_settings_ui(ui, "Image", &mut self.settings.image);
        if changed {
            self.domain
                .controller_mut()
                .set_settings(self.settings.domain.clone());
            self.image
                .controller_mut()
                .set_settings(self.settings.image.clone());
            self.settings.save();
        }

        ui.separator();
        ui.heading("Mesh");
        ui.horizontal(|ui| {
            ui.label("Resolution");
            ui.add(egui::DragValue::new(&mut self.resolution).speed(1).range(1..=40));
        });
        ui.horizontal(|ui| {
            if ui.button("Rebuild meshes").clicked() {
                self.rebuild_meshes();
            }
            if ui.button("Reset cameras").clicked() {
                self.domain.controller_mut().reset_camera();
                self.image.controller_mut().reset_camera();
            }
        });

        ui.separator();
        ui.heading("Cross-link");
        let faces = self.domain.controller().element_counts().faces as u32;
        ui.horizontal(|ui| {
            ui.label("Face");
            ui.add(
                egui::DragValue::new(&mut self.force_face)
                    .speed(1)
                    .range(0..=faces.saturating_sub(1)),
            );
        });
        ui.horizontal(|ui| {
            if ui.button("Highlight in image").clicked() {
                self.domain
                    .controller()
                    .force_highlight_face(Some(shared::FaceId(self.force_face)));
            }
            if ui.button("Clear").clicked() {
                self.domain.controller().force_highlight_face(None);
            }
        });

        ui.separator();
        debug_ui(ui, self.domain.controller());
        debug_ui(ui, self.image.controller());
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for panel in [&self.domain, &self.image] {
                let vp = panel.controller();
                let registry = vp.registry();
                ui.weak(format!(
                    "{}: {} | {} selected",
                    vp.name(),
                    vp.state().label(),
                    registry.selection_count()
                ));
                ui.separator();
            }
            ui.weak(format!("subscribers: {}", self.bus.subscriber_count()));
            ui.separator();
            ui.weak("V vertices · Shift elements · R rotate");
        });
    }
}

/// Flag and tolerance controls for one viewport. Returns true on change.
fn viewport_settings_ui(ui: &mut egui::Ui, title: &str, settings: &mut ViewportSettings) -> bool {
    let before = settings.clone();
    egui::CollapsingHeader::new(title)
        .id_salt(title)
        .default_open(true)
        .show(ui, |ui| {
            ui.checkbox(&mut settings.enable_vertex_selection, "Vertex selection");
            ui.checkbox(&mut settings.enable_mesh_rotation, "Mesh rotation");
            ui.checkbox(&mut settings.enable_face_dragging, "Face dragging");
            ui.checkbox(&mut settings.sync_face_selection, "Sync faces");
            ui.checkbox(&mut settings.sync_vertex_selection, "Sync vertices");
            ui.checkbox(&mut settings.texture.checker, "Checker texture");
            ui.checkbox(&mut settings.grid.visible, "Grid");

            ui.horizontal(|ui| {
                ui.label("Edge tolerance");
                ui.add(
                    egui::DragValue::new(&mut settings.pick.edge_tolerance)
                        .speed(0.005)
                        .range(0.0..=1.0),
                );
            });
            ui.horizontal(|ui| {
                ui.label("Point tolerance");
                ui.add(
                    egui::DragValue::new(&mut settings.pick.point_tolerance)
                        .speed(0.005)
                        .range(0.0..=1.0),
                );
            });
        });
    *settings != before
}

fn debug_ui(ui: &mut egui::Ui, vp: &ViewportController) {
    egui::CollapsingHeader::new(format!("Debug: {}", vp.name()))
        .id_salt(("debug", vp.name()))
        .show(ui, |ui| {
            for group in vp.debug_data() {
                ui.strong(&group.name);
                egui::Grid::new(("debug_grid", vp.name(), group.name.as_str()))
                    .num_columns(2)
                    .spacing([8.0, 2.0])
                    .show(ui, |ui| {
                        for (key, value) in &group.entries {
                            ui.label(key);
                            ui.monospace(value);
                            ui.end_row();
                        }
                    });
                ui.add_space(4.0);
            }
        });
}

impl eframe::App for TwinViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Mode keys are window-wide: both viewports see them
        for (key, pressed) in self.keys.poll(ctx) {
            for panel in [&mut self.domain, &mut self.image] {
                if pressed {
                    panel.controller_mut().key_down(key);
                } else {
                    panel.controller_mut().key_up(key);
                }
            }
        }

        // ── Status bar ───────────────────────────────────────
        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(22.0)
            .show(ctx, |ui| {
                self.status_bar(ui);
            });

        // ── Left panel: settings and diagnostics ─────────────
        egui::SidePanel::left("settings")
            .default_width(240.0)
            .width_range(180.0..=400.0)
            .resizable(true)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.side_panel(ui);
                });
            });

        // ── Viewports ────────────────────────────────────────
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                ui.columns(2, |cols| {
                    self.domain.show(&mut cols[0]);
                    self.image.show(&mut cols[1]);
                });
            });
    }
}
