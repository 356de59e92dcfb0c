//! Viewport settings

use serde::{Deserialize, Serialize};

/// Colors used for the background and selection states (RGB)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub background: [u8; 3],
    pub select: [u8; 3],
    pub highlight: [u8; 3],
    pub drag: [u8; 3],
    /// Color of the vertex point cloud
    pub vertex_point: [u8; 3],
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            background: [30, 30, 35],
            select: [0, 220, 255],
            highlight: [255, 200, 60],
            drag: [255, 90, 40],
            vertex_point: [230, 230, 230],
        }
    }
}

/// Grid display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Show grid
    pub visible: bool,
    /// Grid cell size in world units
    pub size: f32,
    /// Number of grid lines in each direction from origin
    pub range: i32,
    /// Grid line opacity (0.0 - 1.0)
    pub opacity: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            visible: true,
            size: 1.0,
            range: 5,
            opacity: 0.6,
        }
    }
}

/// Texture parameters read by the frame step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    /// Modulate face colors with a checker texture over the uv stream
    pub checker: bool,
    /// Checker squares per uv unit
    pub scale: f32,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            checker: false,
            scale: 8.0,
        }
    }
}

/// Pick tolerances in world units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickSettings {
    pub edge_tolerance: f32,
    pub point_tolerance: f32,
}

impl Default for PickSettings {
    fn default() -> Self {
        Self {
            edge_tolerance: 0.05,
            point_tolerance: 0.08,
        }
    }
}

/// Per-viewport behaviour flags and appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub enable_vertex_selection: bool,
    pub enable_mesh_rotation: bool,
    pub enable_face_dragging: bool,
    /// Publish and apply face highlight / selection / drag messages
    pub sync_face_selection: bool,
    /// Publish and apply vertex selection messages
    pub sync_vertex_selection: bool,
    pub colors: ColorSettings,
    pub pick: PickSettings,
    pub grid: GridSettings,
    pub texture: TextureSettings,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            enable_vertex_selection: true,
            enable_mesh_rotation: true,
            enable_face_dragging: true,
            sync_face_selection: true,
            sync_vertex_selection: true,
            colors: ColorSettings::default(),
            pick: PickSettings::default(),
            grid: GridSettings::default(),
            texture: TextureSettings::default(),
        }
    }
}

/// All application settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Settings of the "domain" viewport
    pub domain: ViewportSettings,
    /// Settings of the "image" viewport
    pub image: ViewportSettings,
}

impl AppSettings {
    /// Load settings from file, or return default if not found
    pub fn load() -> Self {
        if let Some(dirs) = directories::ProjectDirs::from("com", "twinview", "twinview") {
            let config_path = dirs.config_dir().join("settings.json");
            if let Ok(json) = std::fs::read_to_string(&config_path) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        tracing::info!(path = %config_path.display(), "settings loaded");
                        return settings;
                    }
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), "bad settings file: {e}");
                    }
                }
            }
        }
        Self::default()
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(dirs) = directories::ProjectDirs::from("com", "twinview", "twinview") {
            let config_dir = dirs.config_dir();
            if std::fs::create_dir_all(config_dir).is_ok() {
                let config_path = config_dir.join("settings.json");
                if let Ok(json) = serde_json::to_string_pretty(self) {
                    match std::fs::write(&config_path, json) {
                        Ok(()) => tracing::info!(path = %config_path.display(), "settings saved"),
                        Err(e) => tracing::warn!("failed to save settings: {e}"),
                    }
                }
            }
        }
    }

    /// Settings for a viewport by name
    pub fn viewport(&self, name: &str) -> Option<&ViewportSettings> {
        match name {
            "domain" => Some(&self.domain),
            "image" => Some(&self.image),
            _ => None,
        }
    }
}
