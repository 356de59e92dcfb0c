pub mod selection;
pub mod settings;

pub use selection::{ColorOverlay, Palette, SelectionRegistry, SelectionSet};
pub use settings::{AppSettings, ColorSettings, ViewportSettings};
