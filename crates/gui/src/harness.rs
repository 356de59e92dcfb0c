//! Headless multi-viewport session.
//!
//! One bus, any number of named viewports, a recording backend per
//! viewport and a spy that logs every published message. Used by the
//! integration tests and the JSON input-script protocol.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Vec2, Vec3};
use shared::{FaceId, SyncMessage, Topic, VertexId};

use crate::fixtures;
use crate::frame::{FrameReport, RecordingBackend};
use crate::provider::{FaceLayout, MeshDataProvider, PrimitiveKind, ProviderError};
use crate::state::settings::ViewportSettings;
use crate::sync::{Subscription, SyncBus, SyncHandler};
use crate::viewport::controller::ViewportController;

struct Slot {
    viewport: ViewportController,
    backend: RecordingBackend,
}

/// Headless session: viewports sharing one sync bus
pub struct SessionHarness {
    bus: SyncBus,
    slots: Vec<Slot>,
    log: Rc<RefCell<Vec<SyncMessage>>>,
    _spy: Subscription,
}

impl SessionHarness {
    /// Create a session with no viewports.
    pub fn new() -> Self {
        let bus = SyncBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let spy: SyncHandler = Rc::new(move |m: &SyncMessage| sink.borrow_mut().push(m.clone()));
        let subscription = bus.subscribe(&Topic::ALL, spy);
        Self {
            bus,
            slots: Vec::new(),
            log,
            _spy: subscription,
        }
    }

    /// "domain" and "image" viewports over `n x n` fixture grids
    pub fn domain_and_image(n: u32) -> Self {
        let mut h = Self::new();
        h.add_viewport(
            "domain",
            fixtures::boxed(fixtures::domain_provider(n)),
            ViewportSettings::default(),
        );
        h.add_viewport(
            "image",
            fixtures::boxed(fixtures::image_provider(n)),
            ViewportSettings::default(),
        );
        h
    }

    pub fn bus(&self) -> &SyncBus {
        &self.bus
    }

    // ── Viewports ─────────────────────────────────────────────

    /// Add a viewport; a viewport with the same name is replaced
    pub fn add_viewport(
        &mut self,
        name: &str,
        provider: Box<dyn MeshDataProvider>,
        settings: ViewportSettings,
    ) {
        self.remove_viewport(name);
        let viewport = ViewportController::new(name, provider, settings, self.bus.clone());
        self.slots.push(Slot {
            viewport,
            backend: RecordingBackend::default(),
        });
    }

    /// Tear a viewport down. Returns false if no such viewport.
    pub fn remove_viewport(&mut self, name: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.viewport.name() != name);
        self.slots.len() != before
    }

    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.viewport.name().to_string()).collect()
    }

    pub fn viewport(&self, name: &str) -> Option<&ViewportController> {
        self.slot(name).map(|s| &s.viewport)
    }

    pub fn viewport_mut(&mut self, name: &str) -> Option<&mut ViewportController> {
        self.slots
            .iter_mut()
            .find(|s| s.viewport.name() == name)
            .map(|s| &mut s.viewport)
    }

    pub fn backend(&self, name: &str) -> Option<&RecordingBackend> {
        self.slot(name).map(|s| &s.backend)
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.viewport.name() == name)
    }

    // ── Frames ────────────────────────────────────────────────

    /// Run one frame of `name`
    pub fn frame(&mut self, name: &str) -> Option<Result<FrameReport, ProviderError>> {
        let slot = self.slots.iter_mut().find(|s| s.viewport.name() == name)?;
        Some(slot.viewport.frame(&mut slot.backend))
    }

    /// Run one frame of every viewport, in insertion order
    pub fn frame_all(&mut self) -> Vec<Result<FrameReport, ProviderError>> {
        self.slots
            .iter_mut()
            .map(|s| s.viewport.frame(&mut s.backend))
            .collect()
    }

    // ── Bus log ───────────────────────────────────────────────

    /// Every message published so far
    pub fn messages(&self) -> Vec<SyncMessage> {
        self.log.borrow().clone()
    }

    pub fn messages_on(&self, topic: Topic) -> Vec<SyncMessage> {
        self.log
            .borrow()
            .iter()
            .filter(|m| m.topic() == topic)
            .cloned()
            .collect()
    }

    pub fn clear_messages(&self) {
        self.log.borrow_mut().clear();
    }

    // ── Screen helpers ────────────────────────────────────────

    /// Canvas pixel of `world` in viewport `name`
    pub fn screen_point(&self, name: &str, world: Vec3) -> Option<Vec2> {
        let vp = self.viewport(name)?;
        vp.camera()
            .project(world, vp.canvas_size())
            .map(|(screen, _)| screen)
    }

    /// A pixel strictly inside `face`: the centroid of its first triangle
    pub fn screen_point_of_face(&self, name: &str, face: FaceId) -> Option<Vec2> {
        let provider = self.viewport(name)?.provider();
        let layout = FaceLayout::from_faces(provider.faces());
        let tri = layout.triangle_range(face)?.start;
        let t = provider
            .buffered_vertices(PrimitiveKind::Triangle)
            .get(tri * 9..tri * 9 + 9)?;
        let centroid = (Vec3::new(t[0], t[1], t[2])
            + Vec3::new(t[3], t[4], t[5])
            + Vec3::new(t[6], t[7], t[8]))
            / 3.0;
        self.screen_point(name, centroid)
    }

    pub fn screen_point_of_vertex(&self, name: &str, vertex: VertexId) -> Option<Vec2> {
        let p = *self.viewport(name)?.provider().vertices().get(vertex.index())?;
        self.screen_point(name, Vec3::from(p))
    }

    /// Move the pointer of `name` over `face`. Returns false if unknown.
    pub fn hover_face(&mut self, name: &str, face: FaceId) -> bool {
        let Some(pos) = self.screen_point_of_face(name, face) else {
            return false;
        };
        match self.viewport_mut(name) {
            Some(vp) => {
                vp.pointer_move(pos);
                true
            }
            None => false,
        }
    }
}

impl Default for SessionHarness {
    fn default() -> Self {
        Self::new()
    }
}
