use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::camera::Camera;

const POLAR_EPSILON: f32 = 1e-3;

/// Orbits the camera around its target from pointer drags and wheel input.
///
/// Input is buffered and applied by [`OrbitControls::update`], which the
/// frame loop calls once per frame before drawing.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    target: Vec3,
    radius: f32,
    /// Angle around the Y axis, measured from +Z.
    azimuth: f32,
    /// Angle from +Y.
    polar: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    viewport_height: f32,
    dragging: bool,
    last_cursor: Option<Vec2>,
    pending_rotation: Vec2,
    pending_zoom: f32,
}

impl OrbitControls {
    pub fn new(camera: &Camera, viewport_height: u32) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.length().max(f32::EPSILON);
        Self {
            target: camera.target,
            radius,
            azimuth: offset.x.atan2(offset.z),
            polar: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            viewport_height: viewport_height.max(1) as f32,
            dragging: false,
            last_cursor: None,
            pending_rotation: Vec2::ZERO,
            pending_zoom: 0.0,
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
        if !dragging {
            self.last_cursor = None;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Records a cursor position in physical pixels.
    pub fn pointer_moved(&mut self, position: Vec2) {
        if self.dragging {
            if let Some(last) = self.last_cursor {
                self.pending_rotation += position - last;
            }
        }
        self.last_cursor = Some(position);
    }

    /// Records wheel input; positive values zoom in.
    pub fn scroll(&mut self, lines: f32) {
        self.pending_zoom += lines;
    }

    /// Applies buffered input and writes the orbit position into `camera`.
    pub fn update(&mut self, camera: &mut Camera) {
        // a full viewport-height drag turns the camera by one revolution
        let delta = self.pending_rotation * TAU / self.viewport_height * self.rotate_speed;
        self.azimuth -= delta.x;
        self.polar = (self.polar - delta.y).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        self.pending_rotation = Vec2::ZERO;

        let scale = 0.95_f32.powf(self.zoom_speed * self.pending_zoom);
        self.radius = (self.radius * scale).clamp(self.min_distance, self.max_distance);
        self.pending_zoom = 0.0;

        let sin_polar = self.polar.sin();
        let offset = Vec3::new(
            sin_polar * self.azimuth.sin(),
            self.polar.cos(),
            sin_polar * self.azimuth.cos(),
        ) * self.radius;
        camera.target = self.target;
        camera.position = self.target + offset;
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraConfig, Viewport};

    fn camera() -> Camera {
        let config = CameraConfig {
            position: Vec3::splat(10.0),
            ..CameraConfig::default()
        };
        Camera::from_config(&config, Viewport::new(800, 600))
    }

    #[test]
    fn update_without_input_keeps_camera_in_place() {
        let mut camera = camera();
        let mut orbit = OrbitControls::new(&camera, 600);
        orbit.update(&mut camera);
        assert!((camera.position - Vec3::splat(10.0)).length() < 1e-4);
    }

    #[test]
    fn dragging_preserves_distance_to_target() {
        let mut camera = camera();
        let mut orbit = OrbitControls::new(&camera, 600);
        orbit.set_dragging(true);
        orbit.pointer_moved(Vec2::new(100.0, 100.0));
        orbit.pointer_moved(Vec2::new(250.0, 160.0));
        orbit.update(&mut camera);
        assert!((camera.position - Vec3::splat(10.0)).length() > 1.0);
        assert!((camera.position.length() - Vec3::splat(10.0).length()).abs() < 1e-3);
    }

    #[test]
    fn moves_without_button_do_not_rotate() {
        let mut camera = camera();
        let mut orbit = OrbitControls::new(&camera, 600);
        orbit.pointer_moved(Vec2::ZERO);
        orbit.pointer_moved(Vec2::new(300.0, 0.0));
        orbit.update(&mut camera);
        assert!((camera.position - Vec3::splat(10.0)).length() < 1e-4);
    }

    #[test]
    fn polar_angle_never_reaches_the_pole() {
        let mut camera = camera();
        let mut orbit = OrbitControls::new(&camera, 600);
        orbit.set_dragging(true);
        orbit.pointer_moved(Vec2::ZERO);
        orbit.pointer_moved(Vec2::new(0.0, 10_000.0));
        orbit.update(&mut camera);
        let offset = camera.position - camera.target;
        assert!(offset.x.abs() + offset.z.abs() > 0.0);
    }

    #[test]
    fn scroll_zooms_within_limits() {
        let mut camera = camera();
        let mut orbit = OrbitControls::new(&camera, 600);
        orbit.min_distance = 5.0;
        orbit.scroll(100.0);
        orbit.update(&mut camera);
        assert!((orbit.distance() - 5.0).abs() < 1e-5);
        assert!((camera.position.length() - 5.0).abs() < 1e-4);
    }
}
