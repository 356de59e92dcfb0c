//! JSON input-script protocol.
//!
//! Scripted gestures replayed against a [`SessionHarness`], one command per
//! input event.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use shared::FaceId;

use crate::harness::SessionHarness;
use crate::interaction::ModeKey;
use crate::viewport::controller::ViewportController;

/// One scripted input event.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum InputCommand {
    /// Move the pointer to canvas pixel (x, y)
    PointerMove { viewport: String, x: f32, y: f32 },
    /// Move the pointer over a face (inside its first triangle)
    PointerOverFace { viewport: String, face: u32 },
    PointerLeave { viewport: String },
    KeyDown { viewport: String, key: ModeKey },
    KeyUp { viewport: String, key: ModeKey },
    LeftDown { viewport: String },
    LeftUp { viewport: String },
    RightClick { viewport: String },
    /// Publish a forced highlight (or clear it when `face` is absent)
    ForceHighlight {
        viewport: String,
        #[serde(default)]
        face: Option<u32>,
    },
    /// Run a frame on one viewport, or on all of them
    Frame {
        #[serde(default)]
        viewport: Option<String>,
    },
    /// Report viewport state
    Inspect {
        #[serde(default)]
        viewport: Option<String>,
    },
    /// List messages published on the bus so far
    Messages,
}

/// Response from executing a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    fn ok_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }
}

/// Run `f` on the named viewport, or fail with "unknown viewport"
fn on_viewport(
    harness: &mut SessionHarness,
    name: &str,
    f: impl FnOnce(&mut ViewportController),
) -> CommandResponse {
    match harness.viewport_mut(name) {
        Some(vp) => {
            f(vp);
            CommandResponse::ok()
        }
        None => CommandResponse::err(format!("unknown viewport `{name}`")),
    }
}

fn to_value<T: Serialize>(value: &T) -> CommandResponse {
    match serde_json::to_value(value) {
        Ok(v) => CommandResponse::ok_with_data(v),
        Err(e) => CommandResponse::err(format!("serialization failed: {e}")),
    }
}

/// Execute a single command on the harness.
pub fn execute_command(harness: &mut SessionHarness, cmd: InputCommand) -> CommandResponse {
    match cmd {
        InputCommand::PointerMove { viewport, x, y } => {
            on_viewport(harness, &viewport, |vp| vp.pointer_move(Vec2::new(x, y)))
        }

        InputCommand::PointerOverFace { viewport, face } => {
            if harness.viewport(&viewport).is_none() {
                return CommandResponse::err(format!("unknown viewport `{viewport}`"));
            }
            if harness.hover_face(&viewport, FaceId(face)) {
                CommandResponse::ok()
            } else {
                CommandResponse::err(format!("face {face} is not visible in `{viewport}`"))
            }
        }

        InputCommand::PointerLeave { viewport } => {
            on_viewport(harness, &viewport, |vp| vp.pointer_leave())
        }

        InputCommand::KeyDown { viewport, key } => {
            on_viewport(harness, &viewport, |vp| vp.key_down(key))
        }

        InputCommand::KeyUp { viewport, key } => on_viewport(harness, &viewport, |vp| vp.key_up(key)),

        InputCommand::LeftDown { viewport } => on_viewport(harness, &viewport, |vp| vp.left_down()),

        InputCommand::LeftUp { viewport } => on_viewport(harness, &viewport, |vp| vp.left_up()),

        InputCommand::RightClick { viewport } => {
            on_viewport(harness, &viewport, |vp| vp.right_click())
        }

        InputCommand::ForceHighlight { viewport, face } => {
            on_viewport(harness, &viewport, |vp| vp.force_highlight_face(face.map(FaceId)))
        }

        InputCommand::Frame { viewport: Some(name) } => match harness.frame(&name) {
            Some(Ok(report)) => CommandResponse::ok_with_data(serde_json::json!({
                "frame": report.frame,
                "hover_changed": report.hover_changed,
                "overlay_entries": report.overlay_entries,
            })),
            Some(Err(e)) => CommandResponse::err(e.to_string()),
            None => CommandResponse::err(format!("unknown viewport `{name}`")),
        },

        InputCommand::Frame { viewport: None } => {
            let errors: Vec<String> = harness
                .frame_all()
                .into_iter()
                .filter_map(|r| r.err().map(|e| e.to_string()))
                .collect();
            if errors.is_empty() {
                CommandResponse::ok()
            } else {
                CommandResponse::err(errors.join("; "))
            }
        }

        InputCommand::Inspect { viewport: Some(name) } => match harness.viewport(&name) {
            Some(vp) => to_value(&vp.snapshot()),
            None => CommandResponse::err(format!("unknown viewport `{name}`")),
        },

        InputCommand::Inspect { viewport: None } => {
            let snapshots: Vec<_> = harness
                .names()
                .iter()
                .filter_map(|n| harness.viewport(n).map(|vp| vp.snapshot()))
                .collect();
            to_value(&serde_json::json!({
                "viewport_count": snapshots.len(),
                "viewports": snapshots,
            }))
        }

        InputCommand::Messages => to_value(&harness.messages()),
    }
}

/// Parse and execute a single JSON command string.
pub fn execute_json(harness: &mut SessionHarness, json: &str) -> Result<CommandResponse, String> {
    let cmd: InputCommand =
        serde_json::from_str(json).map_err(|e| format!("Invalid command JSON: {e}"))?;
    Ok(execute_command(harness, cmd))
}

/// Parse and execute multiple JSON commands (array).
pub fn execute_json_batch(
    harness: &mut SessionHarness,
    json: &str,
) -> Result<Vec<CommandResponse>, String> {
    let cmds: Vec<InputCommand> =
        serde_json::from_str(json).map_err(|e| format!("Invalid commands JSON: {e}"))?;
    Ok(cmds
        .into_iter()
        .map(|cmd| execute_command(harness, cmd))
        .collect())
}
