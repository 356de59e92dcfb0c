//! One viewport instance: input handling, action execution, remote sync and
//! the per-frame hover pick.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use glam::{Vec2, Vec3};
use serde::Serialize;
use shared::{
    DebugGroup, ElementKind, ElementRef, FaceId, SyncMessage, SyncPayload, Topic, ViewportId,
};

use crate::frame::{FrameReport, FrameUpdater, FrameView, RenderBackend, ResizeHandle};
use crate::interaction::{self, Action, Guards, InteractionEvent, InteractionState, ModeKey};
use crate::provider::{ElementCounts, FaceLayout, MeshDataProvider, ProviderError};
use crate::state::selection::{ColorOverlay, Palette, SelectionRegistry};
use crate::state::settings::ViewportSettings;
use crate::sync::{Subscription, SyncBus, SyncHandler};

use super::camera::{ArcBallCamera, CameraControls};
use super::picking::{ray_plane_intersect, Intersection, PickResolver, PickScene};

/// Which sync topic classes this viewport applies on receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncFlags {
    face: bool,
    vertex: bool,
}

impl SyncFlags {
    fn of(settings: &ViewportSettings) -> Self {
        Self {
            face: settings.sync_face_selection,
            vertex: settings.sync_vertex_selection,
        }
    }

    fn allows(&self, topic: Topic) -> bool {
        if topic.is_face_sync() {
            self.face
        } else if topic.is_vertex_sync() {
            self.vertex
        } else {
            // Forced cross-link highlight
            true
        }
    }
}

/// In-progress face drag
#[derive(Debug, Clone, Copy)]
struct DragSession {
    face: FaceId,
    plane_point: Vec3,
    plane_normal: Vec3,
    /// Plane intersection of the previous pointer sample
    last_point: Vec3,
    /// Intersection captured at drag start; `screen_offset` accumulates
    hit: Intersection,
}

/// Serializable view of a viewport's state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewportSnapshot {
    pub id: ViewportId,
    pub name: String,
    pub state: &'static str,
    pub highlighted: Option<ElementRef>,
    pub dragged: Option<FaceId>,
    pub selected_faces: Vec<u32>,
    pub selected_edges: Vec<u32>,
    pub selected_vertices: Vec<u32>,
    pub revision: u64,
    pub drag_offset: [f32; 3],
    pub pan_enabled: bool,
    pub free_rotation: bool,
    pub vertex_cloud_visible: bool,
}

pub struct ViewportController {
    id: ViewportId,
    name: String,
    settings: ViewportSettings,
    palette: Palette,
    bus: SyncBus,
    registry: Rc<RefCell<SelectionRegistry>>,
    counts: Rc<Cell<ElementCounts>>,
    flags: Rc<Cell<SyncFlags>>,
    provider: Box<dyn MeshDataProvider>,
    camera: ArcBallCamera,
    home_camera: ArcBallCamera,
    controls: CameraControls,
    state: InteractionState,
    resolver: PickResolver,
    /// Pointer position in canvas pixels; None when outside the canvas
    pointer: Option<Vec2>,
    canvas: Vec2,
    /// Latest pick result
    intersection: Option<Intersection>,
    /// Element this viewport's own pointer is over
    hovered: Option<ElementRef>,
    drag: Option<DragSession>,
    vertex_cloud_visible: bool,
    frame: FrameUpdater,
    /// Reused every frame
    overlay: ColorOverlay,
    last_error: Option<ProviderError>,
    // Declared last so it is dropped after the drag-end in `Drop`
    _subscription: Subscription,
}

impl ViewportController {
    pub fn new(
        name: impl Into<String>,
        provider: Box<dyn MeshDataProvider>,
        settings: ViewportSettings,
        bus: SyncBus,
    ) -> Self {
        let id = ViewportId::new();
        let name = name.into();
        let registry = Rc::new(RefCell::new(SelectionRegistry::new()));
        let counts = Rc::new(Cell::new(ElementCounts::of(provider.as_ref())));
        let flags = Rc::new(Cell::new(SyncFlags::of(&settings)));

        let handler: SyncHandler = {
            let registry = Rc::clone(&registry);
            let counts = Rc::clone(&counts);
            let flags = Rc::clone(&flags);
            let name = name.clone();
            Rc::new(move |msg: &SyncMessage| {
                apply_remote(id, &name, &registry, counts.get(), flags.get(), msg);
            })
        };
        let subscription = bus.subscribe(&Topic::ALL, handler);

        let camera = ArcBallCamera::facing_xy(4.0);
        let frame = FrameUpdater::new(provider.as_ref());
        tracing::info!(%id, %name, "viewport created");

        Self {
            id,
            name,
            palette: Palette::from(&settings.colors),
            resolver: PickResolver {
                edge_tolerance: settings.pick.edge_tolerance,
                point_tolerance: settings.pick.point_tolerance,
            },
            settings,
            bus,
            registry,
            counts,
            flags,
            provider,
            home_camera: camera.clone(),
            camera,
            controls: CameraControls::default(),
            state: InteractionState::Idle,
            pointer: None,
            canvas: Vec2::new(800.0, 600.0),
            intersection: None,
            hovered: None,
            drag: None,
            vertex_cloud_visible: false,
            frame,
            overlay: ColorOverlay::default(),
            last_error: None,
            _subscription: subscription,
        }
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn id(&self) -> ViewportId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn registry(&self) -> Ref<'_, SelectionRegistry> {
        self.registry.borrow()
    }

    pub fn controls(&self) -> CameraControls {
        self.controls
    }

    pub fn camera(&self) -> &ArcBallCamera {
        &self.camera
    }

    pub fn canvas_size(&self) -> Vec2 {
        self.canvas
    }

    pub fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }

    pub fn intersection(&self) -> Option<Intersection> {
        self.intersection
    }

    /// Drag-start intersection with the running offset total
    pub fn drag_intersection(&self) -> Option<Intersection> {
        self.drag.map(|d| d.hit)
    }

    pub fn vertex_cloud_visible(&self) -> bool {
        self.vertex_cloud_visible
    }

    pub fn settings(&self) -> &ViewportSettings {
        &self.settings
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn provider(&self) -> &dyn MeshDataProvider {
        self.provider.as_ref()
    }

    pub fn element_counts(&self) -> ElementCounts {
        self.counts.get()
    }

    /// Face-to-triangle layout sampled at the last frame
    pub fn face_layout(&self) -> &FaceLayout {
        self.frame.layout()
    }

    pub fn resize_handle(&self) -> ResizeHandle {
        self.frame.resize_handle()
    }

    /// Error of the most recent frame, if it was aborted
    pub fn last_error(&self) -> Option<&ProviderError> {
        self.last_error.as_ref()
    }

    pub fn set_settings(&mut self, settings: ViewportSettings) {
        self.flags.set(SyncFlags::of(&settings));
        self.palette = Palette::from(&settings.colors);
        self.resolver.edge_tolerance = settings.pick.edge_tolerance;
        self.resolver.point_tolerance = settings.pick.point_tolerance;
        self.settings = settings;
    }

    /// Canvas size in pixels; the renderer is resized at the next frame
    pub fn set_canvas_size(&mut self, width: f32, height: f32) {
        let size = Vec2::new(width, height);
        if size != self.canvas {
            self.canvas = size;
            self.frame
                .resize_handle()
                .request(width.max(0.0) as u32, height.max(0.0) as u32);
        }
    }

    // ── Camera ───────────────────────────────────────────────

    pub fn set_camera(&mut self, camera: ArcBallCamera) {
        self.home_camera = camera.clone();
        self.camera = camera;
    }

    /// Pointer drag on the canvas; pans or rotates per the current controls
    pub fn camera_drag(&mut self, delta: Vec2) -> bool {
        self.controls.drag(&mut self.camera, delta)
    }

    pub fn zoom(&mut self, delta: f32) {
        self.camera.zoom(delta);
    }

    pub fn reset_camera(&mut self) {
        self.camera = self.home_camera.clone();
    }

    // ── Input ────────────────────────────────────────────────

    /// Pointer moved to `pos` (canvas pixels). While dragging, publishes the
    /// plane displacement since the previous sample.
    pub fn pointer_move(&mut self, pos: Vec2) {
        self.pointer = Some(pos);

        let Some(mut drag) = self.drag else {
            return;
        };
        let Some(ray) = self.screen_ray(pos) else {
            return;
        };
        let Some(point) = ray_plane_intersect(&ray, drag.plane_point, drag.plane_normal) else {
            return;
        };
        let offset = point - drag.last_point;
        drag.last_point = point;
        drag.hit.screen_offset += offset;
        self.drag = Some(drag);

        if offset == Vec3::ZERO {
            return;
        }
        self.registry.borrow_mut().accumulate_drag(drag.face, offset);
        self.publish(SyncPayload::FaceDragging {
            face: drag.face,
            offset: offset.to_array(),
        });
    }

    /// Pointer left the canvas: ends any drag and clears the local hover
    pub fn pointer_leave(&mut self) {
        self.dispatch(InteractionEvent::MouseLeave);
        self.pointer = None;
        self.intersection = None;
        self.update_hover(None);
    }

    pub fn key_down(&mut self, key: ModeKey) {
        self.dispatch(InteractionEvent::KeyDown(key));
    }

    pub fn key_up(&mut self, key: ModeKey) {
        self.dispatch(InteractionEvent::KeyUp(key));
    }

    pub fn left_down(&mut self) {
        // Guards and toggles need the element under the pointer right now
        self.intersection = self.pointer.and_then(|p| self.pick_at(p));
        self.dispatch(InteractionEvent::LeftMouseDown);
    }

    pub fn left_up(&mut self) {
        self.dispatch(InteractionEvent::LeftMouseUp);
    }

    pub fn right_click(&mut self) {
        self.dispatch(InteractionEvent::RightClick);
    }

    /// Ask every other viewport to highlight `face` (or clear), regardless
    /// of their sync flags. The local registry is not touched.
    pub fn force_highlight_face(&self, face: Option<FaceId>) {
        let payload = match face {
            Some(face) => SyncPayload::HighlightFace { face },
            None => SyncPayload::UnhighlightFace,
        };
        self.publish(payload);
    }

    /// Replace the mesh source. Any interaction is ended and all selection
    /// state is dropped, since element ids do not survive a swap. Peers are
    /// told to unselect what they mirrored from this viewport.
    pub fn set_provider(&mut self, provider: Box<dyn MeshDataProvider>) {
        self.reset_interaction();
        self.update_hover(None);

        let (faces, vertices) = {
            let mut registry = self.registry.borrow_mut();
            let cleared = (
                registry.selected_faces().ids(),
                registry.selected_vertices().ids(),
            );
            registry.clear_all();
            cleared
        };
        for face in faces {
            self.publish(SyncPayload::FaceUnselected { face });
        }
        for vertex_id in vertices {
            self.publish(SyncPayload::VertexUnselected { vertex_id });
        }

        self.provider = provider;
        self.counts.set(ElementCounts::of(self.provider.as_ref()));
        self.frame.rebind(self.provider.as_ref());
        self.intersection = None;
        self.last_error = None;

        let counts = self.counts.get();
        tracing::info!(
            viewport = %self.name,
            vertices = counts.vertices,
            faces = counts.faces,
            edges = counts.edges,
            "provider swapped"
        );
    }

    // ── Frame ────────────────────────────────────────────────

    /// Run one frame: hover re-pick (unless dragging), then sample, recolor,
    /// render and schedule through `backend`.
    pub fn frame(&mut self, backend: &mut dyn RenderBackend) -> Result<FrameReport, ProviderError> {
        let hover_changed = self.refresh_hover();

        self.registry
            .borrow()
            .fill_overlay(self.counts.get(), &self.palette, &mut self.overlay);
        let background = self.settings.colors.background.map(|c| c as f32 / 255.0);
        let view = FrameView {
            overlay: &self.overlay,
            palette: &self.palette,
            texture: &self.settings.texture,
            background,
            show_points: self.vertex_cloud_visible,
        };

        match self.frame.run(self.provider.as_ref(), view, backend) {
            Ok(mut report) => {
                report.hover_changed = hover_changed;
                self.last_error = None;
                Ok(report)
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Provider diagnostics followed by this viewport's own state
    pub fn debug_data(&self) -> Vec<DebugGroup> {
        let mut groups = self.provider.debug_data();
        let registry = self.registry.borrow();
        let highlighted = registry
            .highlighted()
            .map(|e| format!("{:?} {}", e.kind(), e.index()))
            .unwrap_or_else(|| "-".into());
        groups.push(
            DebugGroup::new("viewport")
                .with("state", self.state.label())
                .with("highlighted", highlighted)
                .with("selected faces", registry.selected_faces().len())
                .with("selected edges", registry.selected_edges().len())
                .with("selected vertices", registry.selected_vertices().len())
                .with("revision", registry.revision())
                .with("frames", self.frame.frame_count()),
        );
        groups
    }

    pub fn snapshot(&self) -> ViewportSnapshot {
        let registry = self.registry.borrow();
        ViewportSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: self.state.label(),
            highlighted: registry.highlighted(),
            dragged: registry.dragged(),
            selected_faces: registry.selected_faces().ids().iter().map(|f| f.0).collect(),
            selected_edges: registry.selected_edges().ids().iter().map(|e| e.0).collect(),
            selected_vertices: registry.selected_vertices().ids().iter().map(|v| v.0).collect(),
            revision: registry.revision(),
            drag_offset: registry.drag_offset().to_array(),
            pan_enabled: self.controls.pan_enabled,
            free_rotation: self.controls.free_rotation,
            vertex_cloud_visible: self.vertex_cloud_visible,
        }
    }

    // ── Internals ────────────────────────────────────────────

    fn guards(&self) -> Guards {
        Guards {
            vertex_selection_enabled: self.settings.enable_vertex_selection,
            face_dragging_enabled: self.settings.enable_face_dragging,
            mesh_rotation_enabled: self.settings.enable_mesh_rotation,
            face_intersected: self.intersection.and_then(|i| i.face()).is_some(),
        }
    }

    fn dispatch(&mut self, event: InteractionEvent) {
        let (next, actions) = interaction::transition(self.state, event, &self.guards());
        if next != self.state {
            tracing::debug!(
                viewport = %self.name,
                from = self.state.label(),
                to = next.label(),
                "interaction"
            );
        }
        self.state = next;
        for action in actions {
            self.execute(action);
        }
    }

    /// Force the state machine back to idle, running its exit actions
    fn reset_interaction(&mut self) {
        let actions = interaction::reset(self.state);
        self.state = InteractionState::Idle;
        for action in actions {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::ShowVertexCloud => self.vertex_cloud_visible = true,
            Action::HideVertexCloud => {
                self.vertex_cloud_visible = false;
                if self.hovered.is_some_and(|e| e.kind() == ElementKind::Vertex) {
                    self.update_hover(None);
                }
            }
            Action::EnablePanning => self.controls.pan_enabled = true,
            Action::DisablePanning => self.controls.pan_enabled = false,
            Action::EnableFreeRotation => self.controls.free_rotation = true,
            Action::DisableFreeRotation => self.controls.free_rotation = false,
            Action::BeginFaceDrag => self.begin_drag(),
            Action::SelectDraggedFace => {
                if let Some(drag) = self.drag {
                    let changed = self.registry.borrow_mut().select(ElementRef::Face(drag.face));
                    if changed {
                        self.publish(SyncPayload::FaceSelected { face: drag.face });
                    }
                }
            }
            Action::EndFaceDrag => {
                if let Some(drag) = self.drag.take() {
                    self.registry.borrow_mut().clear_dragged();
                    tracing::debug!(viewport = %self.name, face = %drag.face, "drag end");
                    self.publish(SyncPayload::FaceDraggingEnd { face: drag.face });
                }
            }
            Action::ToggleElementSelection => {
                let Some(hit) = self.intersection else {
                    return;
                };
                if hit.kind() == ElementKind::Vertex {
                    return;
                }
                let selected = self.registry.borrow_mut().toggle(hit.element);
                if let ElementRef::Face(face) = hit.element {
                    self.publish(if selected {
                        SyncPayload::FaceSelected { face }
                    } else {
                        SyncPayload::FaceUnselected { face }
                    });
                }
            }
            Action::ToggleVertexSelection => {
                let Some(ElementRef::Vertex(vertex_id)) = self.intersection.map(|i| i.element)
                else {
                    return;
                };
                let selected = self.registry.borrow_mut().toggle(ElementRef::Vertex(vertex_id));
                self.publish(if selected {
                    SyncPayload::VertexSelected { vertex_id }
                } else {
                    SyncPayload::VertexUnselected { vertex_id }
                });
            }
        }
    }

    fn begin_drag(&mut self) {
        let Some((hit, face)) = self.intersection.and_then(|i| i.face().map(|f| (i, f))) else {
            tracing::warn!(viewport = %self.name, "drag started without a face under the pointer");
            return;
        };
        let normal = hit
            .plane_normal
            .filter(|n| n.length_squared() > 0.0)
            .unwrap_or(Vec3::Z);

        self.drag = Some(DragSession {
            face,
            plane_point: hit.world_point,
            plane_normal: normal,
            last_point: hit.world_point,
            hit: Intersection {
                screen_offset: Vec3::ZERO,
                ..hit
            },
        });
        // set_dragged drops the face highlight
        self.registry.borrow_mut().set_dragged(face);
        if self.hovered.is_some_and(|e| e.kind() == ElementKind::Face) {
            self.hovered = None;
        }
        tracing::debug!(viewport = %self.name, %face, "drag begin");
        self.publish(SyncPayload::FaceDraggingBegin { face });
    }

    /// Frame-start hover pick. Returns whether the hovered element changed.
    fn refresh_hover(&mut self) -> bool {
        if self.state.is_dragging() {
            return false;
        }
        let Some(pointer) = self.pointer else {
            return false;
        };
        self.intersection = self.pick_at(pointer);
        self.update_hover(self.intersection.map(|i| i.element))
    }

    /// Move the local hover to `element`, publishing a face highlight change
    /// when the hovered face identity changes.
    fn update_hover(&mut self, element: Option<ElementRef>) -> bool {
        if element == self.hovered {
            return false;
        }
        let previous = std::mem::replace(&mut self.hovered, element);
        {
            let mut registry = self.registry.borrow_mut();
            match element {
                Some(e) => registry.set_highlighted(e),
                None => registry.clear_highlighted(),
            };
        }

        let previous_face = previous.and_then(|e| e.as_face());
        let current_face = element.and_then(|e| e.as_face());
        if previous_face != current_face {
            self.publish(match current_face {
                Some(face) => SyncPayload::FaceHighlighted { face },
                None => SyncPayload::FaceUnhighlighted,
            });
        }
        true
    }

    fn screen_ray(&self, pos: Vec2) -> Option<super::picking::Ray> {
        if self.canvas.x <= 0.0 || self.canvas.y <= 0.0 {
            return None;
        }
        Some(self.camera.screen_ray(pos, self.canvas))
    }

    fn pick_at(&self, pos: Vec2) -> Option<Intersection> {
        let ray = self.screen_ray(pos)?;
        let scene = PickScene {
            provider: self.provider.as_ref(),
            layout: self.frame.layout(),
            bounds: self.frame.bounds(),
        };
        if self.vertex_cloud_visible {
            self.resolver.pick_vertex(&ray, &scene)
        } else {
            self.resolver.pick(&ray, &scene)
        }
    }

    /// Publish unless this viewport's sync flags exclude the topic
    fn publish(&self, payload: SyncPayload) {
        let topic = payload.topic();
        if !self.flags.get().allows(topic) {
            tracing::trace!(viewport = %self.name, %topic, "sync disabled, not published");
            return;
        }
        self.bus.publish(&SyncMessage::new(self.id, payload));
    }
}

impl Drop for ViewportController {
    fn drop(&mut self) {
        // Receivers must not be left holding a dragged face
        self.reset_interaction();
        tracing::debug!(viewport = %self.name, "viewport dropped");
    }
}

/// Apply a message from another viewport to this viewport's registry
fn apply_remote(
    own: ViewportId,
    name: &str,
    registry: &RefCell<SelectionRegistry>,
    counts: ElementCounts,
    flags: SyncFlags,
    msg: &SyncMessage,
) {
    if msg.is_from(own) {
        return;
    }
    let topic = msg.topic();
    if !flags.allows(topic) {
        tracing::trace!(viewport = %name, %topic, "sync disabled, ignored");
        return;
    }

    let element = match &msg.payload {
        SyncPayload::FaceHighlighted { face }
        | SyncPayload::FaceSelected { face }
        | SyncPayload::FaceUnselected { face }
        | SyncPayload::FaceDraggingBegin { face }
        | SyncPayload::FaceDragging { face, .. }
        | SyncPayload::FaceDraggingEnd { face }
        | SyncPayload::HighlightFace { face } => Some(ElementRef::Face(*face)),
        SyncPayload::VertexSelected { vertex_id } | SyncPayload::VertexUnselected { vertex_id } => {
            Some(ElementRef::Vertex(*vertex_id))
        }
        SyncPayload::FaceUnhighlighted | SyncPayload::UnhighlightFace => None,
    };
    if let Some(e) = element.filter(|e| !counts.contains(*e)) {
        tracing::debug!(viewport = %name, %topic, index = e.index(), "id out of range, ignored");
        return;
    }

    let Ok(mut registry) = registry.try_borrow_mut() else {
        tracing::warn!(viewport = %name, %topic, "registry busy, message dropped");
        return;
    };
    let changed = match &msg.payload {
        SyncPayload::FaceHighlighted { face } | SyncPayload::HighlightFace { face } => {
            registry.set_highlighted(ElementRef::Face(*face))
        }
        SyncPayload::FaceUnhighlighted | SyncPayload::UnhighlightFace => {
            registry.clear_highlighted_kind(ElementKind::Face)
        }
        SyncPayload::FaceSelected { face } => registry.select(ElementRef::Face(*face)),
        SyncPayload::FaceUnselected { face } => registry.unselect(ElementRef::Face(*face)),
        SyncPayload::FaceDraggingBegin { face } => registry.set_dragged(*face),
        SyncPayload::FaceDragging { face, offset } => {
            registry.accumulate_drag(*face, Vec3::from_array(*offset))
        }
        SyncPayload::FaceDraggingEnd { face } => {
            registry.dragged() == Some(*face) && registry.clear_dragged().is_some()
        }
        SyncPayload::VertexSelected { vertex_id } => {
            registry.select(ElementRef::Vertex(*vertex_id))
        }
        SyncPayload::VertexUnselected { vertex_id } => {
            registry.unselect(ElementRef::Vertex(*vertex_id))
        }
    };
    tracing::trace!(viewport = %name, %topic, changed, "remote applied");
}
