// SPDX-License-Identifier: CEPL-1.0
use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

/// Radians of rotation per pixel of pointer motion per millisecond.
pub const ORBIT_SPEED: f32 = 0.0005;
/// World units per wheel notch per millisecond.
pub const ZOOM_SPEED: f32 = 0.025;

const FOV_Y_DEG: f32 = 75.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 32.0;

/// Object-orbit camera: the mesh is rotated by `rotation` (Euler radians) and
/// pushed to `position` in front of a fixed perspective projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub rotation: Vec3,
    pub position: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            rotation: Vec3::ZERO,
            position: Vec3::new(0.0, 0.0, -2.0),
        }
    }
}

impl Camera {
    /// Applies a pointer drag. `motion` is current minus previous pointer
    /// position, in pixels; `ms` is the frame delta in milliseconds.
    pub fn orbit(&mut self, motion: Vec2, ms: f32) {
        self.rotation.x -= motion.y * ORBIT_SPEED * ms;
        self.rotation.y -= motion.x * ORBIT_SPEED * ms;
    }

    /// Applies a wheel delta (positive moves the mesh toward the viewer).
    pub fn zoom(&mut self, delta: f32, ms: f32) {
        self.position.z += delta * ZOOM_SPEED * ms;
    }

    pub fn orientation(&self) -> Quat {
        let r = self.rotation;
        Quat::from_euler(EulerRot::ZYX, r.z, r.y, r.x)
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_quat(self.orientation())
    }

    /// Right-handed projection with a [0, 1] depth range.
    pub fn projection(aspect: f32) -> Mat4 {
        Mat4::perspective_rh(FOV_Y_DEG.to_radians(), aspect, Z_NEAR, Z_FAR)
    }

    pub fn mvp(&self, aspect: f32) -> Mat4 {
        Self::projection(aspect) * self.model()
    }

    /// `mvp` for a viewport of `width` x `height` pixels. A degenerate height
    /// falls back to a square aspect.
    pub fn mvp_for_extent(&self, width: u32, height: u32) -> Mat4 {
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        self.mvp(aspect)
    }
}
