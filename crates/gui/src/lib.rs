// Library crate: the renderer-agnostic selection/sync core, exposed for
// integration tests and the JSON input-script interface.
// The egui host (app, panels, painter backend) remains in the binary crate.

pub mod command;
pub mod fixtures;
pub mod frame;
pub mod harness;
pub mod interaction;
pub mod provider;
pub mod state;
pub mod sync;

/// Camera, picking and the per-viewport controller.
/// The egui panel that hosts a controller stays in the binary crate.
pub mod viewport {
    pub mod camera;
    pub mod controller;
    pub mod mesh;
    pub mod picking;
}
