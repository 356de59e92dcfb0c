use glam::{Mat4, Vec2, Vec3, Vec4};

use super::picking::Ray;

/// Arc-ball camera for a mesh viewport
#[derive(Debug, Clone, PartialEq)]
pub struct ArcBallCamera {
    /// Horizontal rotation angle (radians)
    pub yaw: f32,
    /// Vertical rotation angle (radians)
    pub pitch: f32,
    /// Distance from target
    pub distance: f32,
    /// Camera target point
    pub target: Vec3,
    /// Vertical field of view (radians)
    pub fov: f32,
}

impl Default for ArcBallCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl ArcBallCamera {
    pub fn new() -> Self {
        Self {
            yaw: 0.6,
            pitch: 0.4,
            distance: 6.0,
            target: Vec3::ZERO,
            fov: 45.0_f32.to_radians(),
        }
    }

    /// Camera looking straight down -Z at the XY plane (flat 2D meshes)
    pub fn facing_xy(distance: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance,
            ..Self::new()
        }
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx.to_radians();
        self.pitch = (self.pitch + dy.to_radians()).clamp(-1.5, 1.5);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta)).clamp(0.5, 100.0);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        let right = self.right_vector();
        let up = self.up_vector();
        let offset = right * dx + up * dy;
        self.target += offset;
    }

    /// Camera position in world space
    pub fn eye_position(&self) -> Vec3 {
        let cy = self.yaw.cos();
        let sy = self.yaw.sin();
        let cp = self.pitch.cos();
        let sp = self.pitch.sin();

        self.target
            + Vec3::new(
                self.distance * cp * sy,
                self.distance * sp,
                self.distance * cp * cy,
            )
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    /// Projection matrix (camera -> clip)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, aspect, 0.1, 200.0)
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    fn right_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        fwd.cross(Vec3::Y).normalize_or_zero()
    }

    fn up_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        let right = self.right_vector();
        right.cross(fwd).normalize_or_zero()
    }

    /// Project a world point to canvas pixels (origin top-left).
    /// Returns the pixel position and the clip-space depth.
    pub fn project(&self, point: Vec3, canvas: Vec2) -> Option<(Vec2, f32)> {
        let aspect = canvas.x / canvas.y;
        let vp = self.view_projection(aspect);
        let p = vp * point.extend(1.0);
        if p.w <= 0.0 {
            return None;
        }
        let ndc = p.truncate() / p.w;
        let screen = Vec2::new(
            (ndc.x + 1.0) * 0.5 * canvas.x,
            (1.0 - ndc.y) * 0.5 * canvas.y,
        );
        Some((screen, ndc.z))
    }

    /// Cast a ray from a canvas pixel (origin top-left) into the scene
    pub fn screen_ray(&self, screen_pos: Vec2, canvas: Vec2) -> Ray {
        let aspect = canvas.x / canvas.y;

        // Screen → NDC
        let ndc_x = screen_pos.x / (canvas.x * 0.5) - 1.0;
        let ndc_y = 1.0 - screen_pos.y / (canvas.y * 0.5);

        // Inverse view-projection
        let vp_inv = self.view_projection(aspect).inverse();

        // Unproject near and far points
        let near_world = vp_inv * Vec4::new(ndc_x, ndc_y, -1.0, 1.0);
        let far_world = vp_inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);

        let near = near_world.truncate() / near_world.w;
        let far = far_world.truncate() / far_world.w;

        let direction = (far - near).normalize_or_zero();

        Ray {
            origin: self.eye_position(),
            direction,
        }
    }
}

/// Which mouse-drag camera motions are currently allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraControls {
    pub pan_enabled: bool,
    pub free_rotation: bool,
}

impl Default for CameraControls {
    fn default() -> Self {
        Self {
            pan_enabled: true,
            free_rotation: false,
        }
    }
}

impl CameraControls {
    /// Apply a pointer drag (pixels) to `camera` according to the flags.
    /// Returns false when the drag was not consumed.
    pub fn drag(&self, camera: &mut ArcBallCamera, delta: Vec2) -> bool {
        if self.free_rotation {
            camera.rotate(delta.x * 0.5, delta.y * 0.5);
            true
        } else if self.pan_enabled {
            let scale = camera.distance * 0.002;
            camera.pan(-delta.x * scale, delta.y * scale);
            true
        } else {
            false
        }
    }
}
