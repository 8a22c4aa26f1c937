//! Look-at camera producing the particle view-projection matrix.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Perspective camera aimed at a fixed target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// World up direction
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width/height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 20.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_3, // 60 degrees
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Camera with default placement and the given aspect ratio.
    pub fn new(aspect: f32) -> Self {
        Self {
            aspect,
            ..Self::default()
        }
    }

    /// Build the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Build the projection matrix (wgpu depth range `[0, 1]`).
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Build combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (call when the render target changes size).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Orbit around the target on the horizontal plane by `angle` radians.
    pub fn orbit(&mut self, angle: f32) {
        let offset = self.eye - self.target;
        let (sin, cos) = angle.sin_cos();
        let rotated = Vec3::new(
            offset.x * cos + offset.z * sin,
            offset.y,
            -offset.x * sin + offset.z * cos,
        );
        self.eye = self.target + rotated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_projects_to_screen_center() {
        let camera = Camera::new(1.5);
        let clip = camera.view_projection_matrix() * camera.target.extend(1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn orbit_keeps_distance() {
        let mut camera = Camera::default();
        let before = camera.eye.distance(camera.target);
        camera.orbit(1.2);
        let after = camera.eye.distance(camera.target);
        assert!((before - after).abs() < 1e-4);
        assert!(camera.eye.x.abs() > 1.0);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let camera: Camera = serde_json::from_str(r#"{ "fov_y": 1.0 }"#).unwrap();
        assert_eq!(camera.fov_y, 1.0);
        assert_eq!(camera.eye, Camera::default().eye);
    }
}
