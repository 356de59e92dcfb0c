//! Integration tests for cross-viewport synchronization.
//!
//! Drives two linked viewports ("domain" and "image") through the headless
//! session harness and checks what each registry ends up holding.

use shared::{ElementRef, FaceId, SyncPayload, Topic, VertexId};
use twinview_gui_lib::fixtures;
use twinview_gui_lib::harness::SessionHarness;
use twinview_gui_lib::interaction::{InteractionState, ModeKey};
use twinview_gui_lib::state::settings::ViewportSettings;

/// Element-selection click on `face` of viewport `name`
fn shift_click_face(h: &mut SessionHarness, name: &str, face: u32) {
    assert!(h.hover_face(name, FaceId(face)));
    let vp = h.viewport_mut(name).unwrap();
    vp.key_down(ModeKey::ElementSelection);
    vp.left_down();
    vp.left_up();
    vp.key_up(ModeKey::ElementSelection);
}

#[test]
fn test_hover_syncs_highlight_to_other_viewport() {
    let mut h = SessionHarness::domain_and_image(4);
    assert!(h.hover_face("domain", FaceId(7)));
    let report = h.frame("domain").unwrap().unwrap();
    assert!(report.hover_changed);

    let domain = h.viewport("domain").unwrap();
    let image = h.viewport("image").unwrap();
    assert_eq!(domain.registry().highlighted(), Some(ElementRef::Face(FaceId(7))));
    assert_eq!(image.registry().highlighted(), Some(ElementRef::Face(FaceId(7))));
    // One local change; the echo of its own message is not applied again
    assert_eq!(domain.registry().revision(), 1);
    assert_eq!(image.registry().revision(), 1);

    let msgs = h.messages_on(Topic::FaceHighlighted);
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].is_from(domain.id()));
}

#[test]
fn test_hover_unchanged_does_not_republish() {
    let mut h = SessionHarness::domain_and_image(4);
    h.hover_face("domain", FaceId(2));
    h.frame("domain").unwrap().unwrap();
    let report = h.frame("domain").unwrap().unwrap();
    assert!(!report.hover_changed);
    assert_eq!(h.messages_on(Topic::FaceHighlighted).len(), 1);
    assert_eq!(h.viewport("domain").unwrap().registry().revision(), 1);
}

#[test]
fn test_pointer_leave_unhighlights_everywhere() {
    let mut h = SessionHarness::domain_and_image(4);
    h.hover_face("domain", FaceId(5));
    h.frame("domain").unwrap().unwrap();
    h.viewport_mut("domain").unwrap().pointer_leave();

    assert_eq!(h.viewport("domain").unwrap().registry().highlighted(), None);
    assert_eq!(h.viewport("image").unwrap().registry().highlighted(), None);
    assert_eq!(h.messages_on(Topic::FaceUnhighlighted).len(), 1);
}

#[test]
fn test_element_selection_toggle_syncs() {
    let mut h = SessionHarness::domain_and_image(4);
    shift_click_face(&mut h, "domain", 3);
    assert!(h.viewport("domain").unwrap().registry().is_selected(ElementRef::Face(FaceId(3))));
    assert!(h.viewport("image").unwrap().registry().is_selected(ElementRef::Face(FaceId(3))));

    shift_click_face(&mut h, "domain", 3);
    assert_eq!(h.viewport("domain").unwrap().registry().selection_count(), 0);
    assert_eq!(h.viewport("image").unwrap().registry().selection_count(), 0);
    assert_eq!(h.messages_on(Topic::FaceSelected).len(), 1);
    assert_eq!(h.messages_on(Topic::FaceUnselected).len(), 1);
}

#[test]
fn test_vertex_selection_toggle_syncs() {
    let mut h = SessionHarness::domain_and_image(3);
    let pos = h.screen_point_of_vertex("image", VertexId(6)).unwrap();
    {
        let vp = h.viewport_mut("image").unwrap();
        vp.key_down(ModeKey::VertexSelection);
        assert_eq!(vp.state(), InteractionState::VertexSelection);
        assert!(vp.vertex_cloud_visible());
        vp.pointer_move(pos);
        vp.left_down();
        vp.left_up();
    }
    let selected = h.messages_on(Topic::VertexSelected);
    assert_eq!(selected.len(), 1);
    assert_eq!(
        selected[0].payload,
        SyncPayload::VertexSelected {
            vertex_id: VertexId(6)
        }
    );
    assert!(h.viewport("domain").unwrap().registry().is_selected(ElementRef::Vertex(VertexId(6))));

    let vp = h.viewport_mut("image").unwrap();
    vp.key_up(ModeKey::VertexSelection);
    assert!(!vp.vertex_cloud_visible());
    // Selection outlives the mode
    assert!(vp.registry().is_selected(ElementRef::Vertex(VertexId(6))));
}

#[test]
fn test_receiver_with_face_sync_off_ignores_faces() {
    let mut h = SessionHarness::new();
    h.add_viewport(
        "domain",
        fixtures::boxed(fixtures::domain_provider(4)),
        ViewportSettings::default(),
    );
    let mut off = ViewportSettings::default();
    off.sync_face_selection = false;
    h.add_viewport("image", fixtures::boxed(fixtures::image_provider(4)), off);

    shift_click_face(&mut h, "domain", 6);
    h.frame("domain").unwrap().unwrap();
    assert_eq!(h.messages_on(Topic::FaceSelected).len(), 1);
    let image = h.viewport("image").unwrap();
    assert_eq!(image.registry().selection_count(), 0);
    assert_eq!(image.registry().highlighted(), None);
}

#[test]
fn test_sender_with_face_sync_off_publishes_nothing() {
    let mut h = SessionHarness::new();
    let mut off = ViewportSettings::default();
    off.sync_face_selection = false;
    h.add_viewport("domain", fixtures::boxed(fixtures::domain_provider(4)), off);
    h.add_viewport(
        "image",
        fixtures::boxed(fixtures::image_provider(4)),
        ViewportSettings::default(),
    );

    shift_click_face(&mut h, "domain", 6);
    h.frame("domain").unwrap().unwrap();
    // Local state still changes
    assert!(h.viewport("domain").unwrap().registry().is_selected(ElementRef::Face(FaceId(6))));
    assert!(h.messages().is_empty());
    assert_eq!(h.viewport("image").unwrap().registry().selection_count(), 0);
}

#[test]
fn test_forced_highlight_crosses_disabled_sync() {
    let mut h = SessionHarness::new();
    h.add_viewport(
        "domain",
        fixtures::boxed(fixtures::domain_provider(4)),
        ViewportSettings::default(),
    );
    let mut off = ViewportSettings::default();
    off.sync_face_selection = false;
    h.add_viewport("image", fixtures::boxed(fixtures::image_provider(4)), off);

    h.viewport("domain").unwrap().force_highlight_face(Some(FaceId(9)));
    assert_eq!(
        h.viewport("image").unwrap().registry().highlighted(),
        Some(ElementRef::Face(FaceId(9)))
    );
    assert_eq!(h.viewport("domain").unwrap().registry().highlighted(), None);

    h.viewport("domain").unwrap().force_highlight_face(None);
    assert_eq!(h.viewport("image").unwrap().registry().highlighted(), None);
}

#[test]
fn test_provider_swap_clears_selection_and_overlay() {
    let mut h = SessionHarness::domain_and_image(4);
    shift_click_face(&mut h, "domain", 2);
    shift_click_face(&mut h, "domain", 5);
    assert_eq!(h.viewport("domain").unwrap().registry().selected_faces().ids(), vec![FaceId(2), FaceId(5)]);

    let report = h.frame("domain").unwrap().unwrap();
    assert!(report.overlay_entries >= 2);

    {
        let vp = h.viewport_mut("domain").unwrap();
        vp.set_provider(fixtures::boxed(fixtures::domain_provider(4)));
        vp.pointer_leave();
        assert_eq!(vp.registry().selection_count(), 0);
        assert_eq!(vp.registry().highlighted(), None);
        assert_eq!(vp.state(), InteractionState::Idle);
    }
    // The mirrored selection is released too
    assert_eq!(h.messages_on(Topic::FaceUnselected).len(), 2);
    assert_eq!(h.viewport("image").unwrap().registry().selection_count(), 0);

    let report = h.frame("domain").unwrap().unwrap();
    assert_eq!(report.overlay_entries, 0);
    let backend = h.backend("domain").unwrap();
    assert!(backend
        .triangle_colors
        .chunks_exact(3)
        .all(|c| c == fixtures::FACE_COLOR));
}

#[test]
fn test_provider_swap_releases_mirrored_vertices() {
    let mut h = SessionHarness::domain_and_image(3);
    let pos = h.screen_point_of_vertex("domain", VertexId(5)).unwrap();
    {
        let vp = h.viewport_mut("domain").unwrap();
        vp.key_down(ModeKey::VertexSelection);
        vp.pointer_move(pos);
        vp.left_down();
        vp.left_up();
    }
    assert!(h.viewport("image").unwrap().registry().is_selected(ElementRef::Vertex(VertexId(5))));

    h.viewport_mut("domain")
        .unwrap()
        .set_provider(fixtures::boxed(fixtures::domain_provider(3)));
    assert_eq!(h.viewport("domain").unwrap().state(), InteractionState::Idle);
    assert_eq!(h.messages_on(Topic::VertexUnselected).len(), 1);
    assert_eq!(h.viewport("image").unwrap().registry().selection_count(), 0);
}

#[test]
fn test_removed_viewport_stops_receiving() {
    let mut h = SessionHarness::domain_and_image(4);
    assert!(h.remove_viewport("image"));
    assert_eq!(h.bus().subscriber_count(), 2);

    shift_click_face(&mut h, "domain", 1);
    assert_eq!(h.messages_on(Topic::FaceSelected).len(), 1);
}
