use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// What the viewport resizer does with the active camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizePolicy {
    /// Build a brand new camera from the configuration, dropping any orbit state.
    Rebuild,
    /// Keep the camera where it is and only recompute the aspect ratio.
    UpdateAspect,
}

/// Camera settings declared by a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub on_resize: ResizePolicy,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::splat(5.0),
            target: Vec3::ZERO,
            on_resize: ResizePolicy::Rebuild,
        }
    }
}

/// Output surface dimensions in physical pixels, never smaller than 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Perspective camera looking at a target point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Camera {
    pub fn from_config(config: &CameraConfig, viewport: Viewport) -> Self {
        Self {
            fov: config.fov,
            aspect: viewport.aspect(),
            near: config.near,
            far: config.far,
            position: config.position,
            target: config.target,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Projection with a 0..1 depth range, as wgpu expects.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}
