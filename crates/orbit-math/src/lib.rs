// SPDX-License-Identifier: CEPL-1.0
mod camera;

pub use camera::{Camera, ORBIT_SPEED, ZOOM_SPEED};
pub use glam::{Mat4, Quat, Vec2, Vec3};
