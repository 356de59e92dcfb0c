//! Interaction state machine.
//!
//! `transition` is pure: it maps `(state, event, guards)` to the next state
//! and the list of actions to run. The viewport controller executes the
//! actions; nothing here touches the registry, the camera or the bus.

use serde::{Deserialize, Serialize};

/// Modifier keys that drive the selection / rotation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKey {
    VertexSelection,
    ElementSelection,
    Rotation,
}

/// Current interaction mode of one viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    VertexSelection,
    ElementSelection,
    FaceDragging,
    MeshRotation,
}

impl InteractionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, InteractionState::FaceDragging)
    }

    pub fn label(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::VertexSelection => "vertex selection",
            InteractionState::ElementSelection => "element selection",
            InteractionState::FaceDragging => "face dragging",
            InteractionState::MeshRotation => "mesh rotation",
        }
    }
}

/// Raw input events fed to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "key", rename_all = "snake_case")]
pub enum InteractionEvent {
    KeyDown(ModeKey),
    KeyUp(ModeKey),
    LeftMouseDown,
    LeftMouseUp,
    RightClick,
    MouseLeave,
}

/// Facts the guards are evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Guards {
    pub vertex_selection_enabled: bool,
    pub face_dragging_enabled: bool,
    pub mesh_rotation_enabled: bool,
    /// A face is under the pointer right now
    pub face_intersected: bool,
}

/// Side effects requested by a transition, executed in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShowVertexCloud,
    HideVertexCloud,
    /// Capture the intersected face and zero the drag offset
    BeginFaceDrag,
    /// Select the face being dragged
    SelectDraggedFace,
    /// Release the dragged face and announce the end of the drag
    EndFaceDrag,
    EnablePanning,
    DisablePanning,
    EnableFreeRotation,
    DisableFreeRotation,
    /// Toggle selection of the face or edge under the pointer
    ToggleElementSelection,
    /// Toggle selection of the vertex under the pointer
    ToggleVertexSelection,
}

/// Compute the next state and the actions to execute.
///
/// Events with no transition in the current state leave it unchanged and
/// produce no actions.
pub fn transition(
    state: InteractionState,
    event: InteractionEvent,
    guards: &Guards,
) -> (InteractionState, Vec<Action>) {
    use Action::*;
    use InteractionEvent::*;
    use InteractionState as S;

    match (state, event) {
        (S::Idle, KeyDown(ModeKey::VertexSelection)) if guards.vertex_selection_enabled => {
            (S::VertexSelection, vec![ShowVertexCloud])
        }
        (S::Idle, KeyDown(ModeKey::ElementSelection)) => (S::ElementSelection, Vec::new()),
        (S::Idle, KeyDown(ModeKey::Rotation)) if guards.mesh_rotation_enabled => {
            (S::MeshRotation, vec![EnableFreeRotation])
        }
        (S::Idle, LeftMouseDown) if guards.face_intersected && guards.face_dragging_enabled => {
            (S::FaceDragging, vec![BeginFaceDrag, DisablePanning])
        }

        (S::VertexSelection, KeyUp(ModeKey::VertexSelection)) => (S::Idle, vec![HideVertexCloud]),
        (S::VertexSelection, LeftMouseDown) => (S::VertexSelection, vec![ToggleVertexSelection]),

        (S::ElementSelection, KeyUp(ModeKey::ElementSelection)) => (S::Idle, Vec::new()),
        (S::ElementSelection, LeftMouseDown) => {
            (S::ElementSelection, vec![ToggleElementSelection])
        }

        (S::FaceDragging, LeftMouseUp | MouseLeave) => (S::Idle, vec![EndFaceDrag, EnablePanning]),
        (S::FaceDragging, RightClick) => {
            (S::Idle, vec![SelectDraggedFace, EndFaceDrag, EnablePanning])
        }

        (S::MeshRotation, KeyUp(ModeKey::Rotation)) => (S::Idle, vec![DisableFreeRotation]),

        (state, event) => {
            tracing::trace!(state = state.label(), ?event, "no transition");
            (state, Vec::new())
        }
    }
}

/// Exit actions that return `state` to `Idle` unconditionally (teardown,
/// provider swap).
pub fn reset(state: InteractionState) -> Vec<Action> {
    match state {
        InteractionState::Idle | InteractionState::ElementSelection => Vec::new(),
        InteractionState::VertexSelection => vec![Action::HideVertexCloud],
        InteractionState::FaceDragging => vec![Action::EndFaceDrag, Action::EnablePanning],
        InteractionState::MeshRotation => vec![Action::DisableFreeRotation],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InteractionEvent::*;

    fn all_enabled() -> Guards {
        Guards {
            vertex_selection_enabled: true,
            face_dragging_enabled: true,
            mesh_rotation_enabled: true,
            face_intersected: true,
        }
    }

    #[test]
    fn test_vertex_mode_round_trip() {
        let g = all_enabled();
        let (s, a) = transition(InteractionState::Idle, KeyDown(ModeKey::VertexSelection), &g);
        assert_eq!(s, InteractionState::VertexSelection);
        assert_eq!(a, vec![Action::ShowVertexCloud]);

        let (s, a) = transition(s, KeyUp(ModeKey::VertexSelection), &g);
        assert_eq!(s, InteractionState::Idle);
        assert_eq!(a, vec![Action::HideVertexCloud]);
    }

    #[test]
    fn test_vertex_mode_guarded() {
        let g = Guards {
            vertex_selection_enabled: false,
            ..all_enabled()
        };
        let (s, a) = transition(InteractionState::Idle, KeyDown(ModeKey::VertexSelection), &g);
        assert_eq!(s, InteractionState::Idle);
        assert!(a.is_empty());
    }

    #[test]
    fn test_element_selection_has_no_guard() {
        let (s, _) = transition(
            InteractionState::Idle,
            KeyDown(ModeKey::ElementSelection),
            &Guards::default(),
        );
        assert_eq!(s, InteractionState::ElementSelection);
        let (s, a) = transition(s, LeftMouseDown, &Guards::default());
        assert_eq!(s, InteractionState::ElementSelection);
        assert_eq!(a, vec![Action::ToggleElementSelection]);
    }

    #[test]
    fn test_drag_requires_face_and_flag() {
        let no_face = Guards {
            face_intersected: false,
            ..all_enabled()
        };
        assert_eq!(
            transition(InteractionState::Idle, LeftMouseDown, &no_face).0,
            InteractionState::Idle
        );
        let disabled = Guards {
            face_dragging_enabled: false,
            ..all_enabled()
        };
        assert_eq!(
            transition(InteractionState::Idle, LeftMouseDown, &disabled).0,
            InteractionState::Idle
        );
        let (s, a) = transition(InteractionState::Idle, LeftMouseDown, &all_enabled());
        assert_eq!(s, InteractionState::FaceDragging);
        assert_eq!(a, vec![Action::BeginFaceDrag, Action::DisablePanning]);
    }

    #[test]
    fn test_drag_exits() {
        let g = all_enabled();
        for event in [LeftMouseUp, MouseLeave] {
            let (s, a) = transition(InteractionState::FaceDragging, event, &g);
            assert_eq!(s, InteractionState::Idle);
            assert_eq!(a, vec![Action::EndFaceDrag, Action::EnablePanning]);
        }
        let (s, a) = transition(InteractionState::FaceDragging, RightClick, &g);
        assert_eq!(s, InteractionState::Idle);
        assert_eq!(
            a,
            vec![Action::SelectDraggedFace, Action::EndFaceDrag, Action::EnablePanning]
        );
    }

    #[test]
    fn test_rotation_mode() {
        let g = all_enabled();
        let (s, a) = transition(InteractionState::Idle, KeyDown(ModeKey::Rotation), &g);
        assert_eq!(s, InteractionState::MeshRotation);
        assert_eq!(a, vec![Action::EnableFreeRotation]);
        let (s, a) = transition(s, KeyUp(ModeKey::Rotation), &g);
        assert_eq!(s, InteractionState::Idle);
        assert_eq!(a, vec![Action::DisableFreeRotation]);

        let off = Guards {
            mesh_rotation_enabled: false,
            ..g
        };
        assert_eq!(
            transition(InteractionState::Idle, KeyDown(ModeKey::Rotation), &off).0,
            InteractionState::Idle
        );
    }

    #[test]
    fn test_no_stacking_of_modes() {
        let g = all_enabled();
        let (s, a) = transition(
            InteractionState::ElementSelection,
            KeyDown(ModeKey::VertexSelection),
            &g,
        );
        assert_eq!(s, InteractionState::ElementSelection);
        assert!(a.is_empty());

        // Key-up of a different key does not leave the mode
        let (s, _) = transition(
            InteractionState::VertexSelection,
            KeyUp(ModeKey::ElementSelection),
            &g,
        );
        assert_eq!(s, InteractionState::VertexSelection);

        // No drag while a modifier mode is active
        let (s, _) = transition(InteractionState::MeshRotation, LeftMouseDown, &g);
        assert_eq!(s, InteractionState::MeshRotation);
    }

    #[test]
    fn test_unknown_events_are_noops() {
        let g = all_enabled();
        for state in [
            InteractionState::Idle,
            InteractionState::VertexSelection,
            InteractionState::ElementSelection,
            InteractionState::MeshRotation,
        ] {
            for event in [LeftMouseUp, RightClick, MouseLeave] {
                let (s, a) = transition(state, event, &g);
                assert_eq!(s, state);
                assert!(a.is_empty());
            }
        }
    }

    #[test]
    fn test_reset_matches_exit_actions() {
        assert!(reset(InteractionState::Idle).is_empty());
        assert_eq!(
            reset(InteractionState::FaceDragging),
            vec![Action::EndFaceDrag, Action::EnablePanning]
        );
        assert_eq!(reset(InteractionState::VertexSelection), vec![Action::HideVertexCloud]);
    }

    #[test]
    fn test_event_serde() {
        let json = serde_json::to_string(&KeyDown(ModeKey::Rotation)).unwrap();
        assert_eq!(json, r#"{"event":"key_down","key":"rotation"}"#);
        let ev: InteractionEvent = serde_json::from_str(r#"{"event":"mouse_leave"}"#).unwrap();
        assert_eq!(ev, MouseLeave);
    }
}
