//! Tutorial 3D scenes: a scene assembler, a per-frame loop driver, a viewport
//! resizer and a live debug parameter panel.
//!
//! Scene logic is independent of the window and the GPU. Everything draws
//! through the [`RenderTarget`] trait, so scenes run the same way in a wgpu
//! window and in headless tools or tests.

pub mod animation;
pub mod app;
pub mod assets;
pub mod builtin;
pub mod camera;
pub mod clock;
pub mod data_model;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod obj;
pub mod orbit;
pub mod panel;
pub mod render;
pub mod scene;

pub use animation::Animation;
pub use app::{DrawItem, Frame, FrameReport, LightKind, LightParams, LightRig, RenderTarget, SceneContext};
pub use assets::{AssetEvent, AssetLoader, AssetStatus};
pub use builtin::{builtin_names, builtin_scene};
pub use camera::{Camera, CameraConfig, ResizePolicy, Viewport};
pub use clock::{Clock, FpsCounter};
pub use data_model::SceneState;
pub use error::{AssetError, PanelError, SceneError};
pub use mesh::{MeshData, MeshLibrary, Vertex};
pub use obj::parse_obj;
pub use orbit::OrbitControls;
pub use panel::{AxisRange, BoundField, ControlSpec, ControlValue, DebugPanel, MonitorSpec};
pub use render::{show_panel, HeadlessTarget, OverlayFrame, Renderer};
pub use scene::{ObjectKind, SceneDescription, SceneObject, Shape};
