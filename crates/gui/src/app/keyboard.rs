//! Keyboard handling: mode keys for the interaction state machine

use eframe::egui;

use twinview_gui_lib::interaction::ModeKey;

/// Tracks held mode keys so that only edges are reported
#[derive(Debug, Default)]
pub struct ModeKeys {
    shift: bool,
}

impl ModeKeys {
    /// Mode key transitions of this frame as `(key, pressed)`.
    /// V selects vertices, Shift selects elements, R rotates.
    pub fn poll(&mut self, ctx: &egui::Context) -> Vec<(ModeKey, bool)> {
        // Don't handle shortcuts when a text field is focused
        if ctx.memory(|m| m.focused().is_some()) {
            return Vec::new();
        }

        ctx.input(|i| {
            let mut out = Vec::new();
            for event in &i.events {
                if let egui::Event::Key {
                    key,
                    pressed,
                    repeat: false,
                    ..
                } = event
                {
                    match key {
                        egui::Key::V => out.push((ModeKey::VertexSelection, *pressed)),
                        egui::Key::R => out.push((ModeKey::Rotation, *pressed)),
                        _ => {}
                    }
                }
            }
            // Shift produces no key events, only a modifier change
            if i.modifiers.shift != self.shift {
                self.shift = i.modifiers.shift;
                out.push((ModeKey::ElementSelection, self.shift));
            }
            out
        })
    }
}
