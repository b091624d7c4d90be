//! Scene context: assembles a scene once, then drives frames and resizes.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use log::{error, info, warn};

use crate::animation::Animation;
use crate::assets::{AssetEvent, AssetLoader, AssetStatus};
use crate::camera::{Camera, CameraConfig, ResizePolicy, Viewport};
use crate::clock::{Clock, FpsCounter};
use crate::data_model::SceneState;
use crate::error::{PanelError, SceneError};
use crate::mesh::MeshLibrary;
use crate::orbit::OrbitControls;
use crate::panel::{ControlValue, DebugPanel};
use crate::scene::{ObjectKind, SceneDescription, SceneObject};

/// Mesh key of the unit cube used to draw axes helpers.
pub const UNIT_BOX: &str = "box:1:1:1";

const AXIS_THICKNESS: f32 = 0.005;
/// World-space width of spot light helper edges.
const HELPER_LINE_WIDTH: f32 = 0.05;
const HELPER_SEGMENTS: usize = 8;
/// Helper cones are drawn no wider than this half-angle, in degrees.
const HELPER_MAX_ANGLE: f32 = 85.0;

/// Surface a scene is drawn to.
pub trait RenderTarget {
    /// Called after every viewport change with the clamped size.
    fn resize(&mut self, viewport: Viewport);

    /// Draws one complete frame.
    fn draw(&mut self, frame: &Frame<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// A light resolved to world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    pub kind: LightKind,
    pub position: Vec3,
    /// Unit vector the light shines along; unused for point lights.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Cosine of the spot cone half-angle.
    pub cos_outer: f32,
    /// Cosine of the angle where the penumbra falloff starts.
    pub cos_inner: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightRig {
    /// Sum of every ambient light's color scaled by its intensity.
    pub ambient: Vec3,
    pub lights: Vec<LightParams>,
}

impl LightRig {
    pub fn find(&self, kind: LightKind) -> impl Iterator<Item = &LightParams> {
        self.lights.iter().filter(move |light| light.kind == kind)
    }
}

/// One mesh instance to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub mesh: String,
    pub model: Mat4,
    pub color: Vec3,
    /// Unlit items ignore the light rig and are drawn in their flat color.
    pub lit: bool,
}

/// Everything a render target needs for one frame.
#[derive(Debug)]
pub struct Frame<'a> {
    pub camera: Camera,
    pub clear_color: Vec3,
    pub lights: LightRig,
    pub draws: Vec<DrawItem>,
    pub meshes: &'a MeshLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub elapsed: Duration,
    pub fps: u32,
    /// Whether this frame closed an fps window.
    pub fps_updated: bool,
    pub draw_count: usize,
}

/// Live scene: object state, camera, panel and timing.
pub struct SceneContext {
    name: String,
    clear_color: Vec3,
    camera_config: CameraConfig,
    animations: Vec<Animation>,
    state: SceneState,
    panel: DebugPanel,
    camera: Camera,
    orbit: OrbitControls,
    viewport: Viewport,
    clock: Clock,
    fps: FpsCounter,
    meshes: MeshLibrary,
    loader: AssetLoader,
    pending_assets: HashSet<String>,
}

impl SceneContext {
    /// Builds every object of `description`, registers primitive meshes and
    /// starts loading models in the background.
    pub fn assemble(
        description: SceneDescription,
        viewport: Viewport,
        loader: AssetLoader,
    ) -> Result<Self, SceneError> {
        let SceneDescription {
            name,
            clear_color,
            camera: camera_config,
            objects,
            controls,
            monitors,
            animations,
        } = description;

        let state = SceneState::from_objects(objects)?;
        for helper in state
            .objects()
            .iter()
            .filter(|object| object.kind == ObjectKind::SpotLightHelper)
        {
            let target = helper.target.as_deref().unwrap_or_default();
            if state.get(target).map(|light| light.kind) != Some(ObjectKind::SpotLight) {
                return Err(SceneError::InvalidValue {
                    tag: "target".into(),
                    value: target.to_string(),
                    reason: format!("helper {} must target a spot light", helper.name),
                });
            }
        }
        for animation in &animations {
            if state.get(animation.target()).is_none() {
                return Err(SceneError::UnknownReference {
                    object: format!("animation of {}", animation.target()),
                    missing: animation.target().to_string(),
                });
            }
        }
        let panel = DebugPanel::new(controls, monitors, &state).map_err(|err| match err {
            PanelError::MissingObject { label, object } => SceneError::UnknownReference {
                object: format!("control {label}"),
                missing: object,
            },
            other => SceneError::InvalidValue {
                tag: "control".into(),
                value: String::new(),
                reason: other.to_string(),
            },
        })?;

        let mut meshes = MeshLibrary::new();
        let mut pending_assets = HashSet::new();
        for object in state.objects() {
            match object.kind {
                ObjectKind::Mesh => {
                    if let Some(shape) = &object.shape {
                        let key = shape.mesh_key();
                        if !meshes.contains(&key) {
                            meshes.insert(key, shape.build());
                        }
                    }
                }
                ObjectKind::Axes | ObjectKind::SpotLightHelper if !meshes.contains(UNIT_BOX) => {
                    meshes.insert(UNIT_BOX, crate::geometry::box_mesh(1.0, 1.0, 1.0));
                }
                ObjectKind::Model => {
                    if let Some(path) = &object.model {
                        if pending_assets.insert(path.clone()) {
                            loader.load(path.clone(), path);
                        }
                    }
                }
                _ => {}
            }
        }

        let camera = Camera::from_config(&camera_config, viewport);
        let orbit = OrbitControls::new(&camera, viewport.height());
        info!(
            "assembled scene {name}: {} objects, {} meshes, {} pending assets",
            state.len(),
            meshes.len(),
            pending_assets.len()
        );

        Ok(Self {
            name,
            clear_color,
            camera_config,
            animations,
            state,
            panel,
            camera,
            orbit,
            viewport,
            clock: Clock::new(),
            fps: FpsCounter::default(),
            meshes,
            loader,
            pending_assets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn panel(&self) -> &DebugPanel {
        &self.panel
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn fps(&self) -> &FpsCounter {
        &self.fps
    }

    pub fn meshes(&self) -> &MeshLibrary {
        &self.meshes
    }

    pub fn orbit_mut(&mut self) -> &mut OrbitControls {
        &mut self.orbit
    }

    /// Number of model loads that have not finished yet.
    pub fn pending_assets(&self) -> usize {
        self.pending_assets.len()
    }

    /// Applies a panel edit; the new value is visible from the next frame on.
    pub fn apply_edit(
        &mut self,
        label: &str,
        value: ControlValue,
    ) -> Result<ControlValue, PanelError> {
        self.panel.edit(label, value, &mut self.state)
    }

    /// Recomputes the camera for a new output size and forwards the clamped
    /// size to `target`.
    pub fn resize(&mut self, width: u32, height: u32, target: &mut dyn RenderTarget) {
        let viewport = Viewport::new(width, height);
        match self.camera_config.on_resize {
            ResizePolicy::Rebuild => {
                self.camera = Camera::from_config(&self.camera_config, viewport);
                self.orbit = OrbitControls::new(&self.camera, viewport.height());
            }
            ResizePolicy::UpdateAspect => {
                self.camera.aspect = viewport.aspect();
                self.orbit.set_viewport_height(viewport.height());
            }
        }
        self.viewport = viewport;
        target.resize(viewport);
        info!(
            "resized camera: {}x{} pixels",
            viewport.width(),
            viewport.height()
        );
    }

    /// Advances the scene by `dt` and issues exactly one draw.
    pub fn frame(&mut self, dt: Duration, target: &mut dyn RenderTarget) -> Result<FrameReport> {
        for event in self.loader.poll() {
            self.handle_asset_event(event);
        }

        let elapsed = self.clock.advance(dt);
        self.orbit.update(&mut self.camera);
        for animation in &self.animations {
            animation.apply(&mut self.state, elapsed);
        }

        let frame = Frame {
            camera: self.camera,
            clear_color: self.clear_color,
            lights: self.light_rig(),
            draws: self.draw_items(),
            meshes: &self.meshes,
        };
        let draw_count = frame.draws.len();
        target
            .draw(&frame)
            .with_context(|| format!("failed to draw frame {}", self.clock.frame_index()))?;

        let fps_updated = self.fps.record(dt);
        self.panel.sample(dt, &self.fps);
        self.panel.refresh(&self.state);

        Ok(FrameReport {
            frame_index: self.clock.frame_index(),
            elapsed,
            fps: self.fps.fps(),
            fps_updated,
            draw_count,
        })
    }

    /// Blocks until every pending model load finished or `timeout` passed
    /// without news from the loader. Returns the number still pending.
    pub fn settle_assets(&mut self, timeout: Duration) -> usize {
        while !self.pending_assets.is_empty() {
            let Some(event) = self.loader.wait(timeout) else {
                warn!("gave up waiting for {} asset(s)", self.pending_assets.len());
                break;
            };
            self.handle_asset_event(event);
        }
        self.pending_assets.len()
    }

    fn handle_asset_event(&mut self, event: AssetEvent) {
        let AssetEvent { name, status } = event;
        match status {
            AssetStatus::Progress(fraction) => info!("{:.0}% loaded", fraction * 100.0),
            AssetStatus::Loaded(mesh) => {
                info!("loaded {name} ({} triangles)", mesh.triangle_count());
                self.meshes.insert(name.as_str(), mesh);
                self.pending_assets.remove(&name);
            }
            AssetStatus::Failed(err) => {
                error!("{err}");
                self.pending_assets.remove(&name);
            }
        }
    }

    /// Resolves every light object to world space.
    pub fn light_rig(&self) -> LightRig {
        let mut rig = LightRig::default();
        for object in self.state.objects() {
            let kind = match object.kind {
                ObjectKind::AmbientLight => {
                    rig.ambient += object.color * object.intensity;
                    continue;
                }
                ObjectKind::DirectionalLight => LightKind::Directional,
                ObjectKind::PointLight => LightKind::Point,
                ObjectKind::SpotLight => LightKind::Spot,
                _ => continue,
            };
            let position = self
                .state
                .world_position(&object.name)
                .unwrap_or(object.position);
            rig.lights.push(LightParams {
                kind,
                position,
                direction: self.light_direction(object, position),
                color: object.color,
                intensity: object.intensity,
                cos_outer: object.angle.to_radians().cos(),
                cos_inner: (object.angle * (1.0 - object.penumbra)).to_radians().cos(),
            });
        }
        rig
    }

    fn light_direction(&self, light: &SceneObject, position: Vec3) -> Vec3 {
        let target = light
            .target
            .as_deref()
            .and_then(|name| self.state.world_position(name))
            .unwrap_or(Vec3::ZERO);
        let direction = (target - position).normalize_or_zero();
        if direction == Vec3::ZERO {
            Vec3::NEG_Y
        } else {
            direction
        }
    }

    /// Edges of the cone lit by the helper's spot light: one line from the
    /// light to each rim point plus the rim itself. The cone is as long as the
    /// helper's size.
    fn spot_helper_items(&self, helper: &SceneObject) -> Vec<DrawItem> {
        let Some(light) = helper.target.as_deref().and_then(|name| self.state.get(name)) else {
            return Vec::new();
        };
        let apex = self
            .state
            .world_position(&light.name)
            .unwrap_or(light.position);
        let direction = self.light_direction(light, apex);
        let length = helper.scale.x;
        let radius = length * light.angle.min(HELPER_MAX_ANGLE).to_radians().tan();
        let (u, v) = direction.any_orthonormal_pair();

        let rim: Vec<Vec3> = (0..HELPER_SEGMENTS)
            .map(|i| {
                let theta = i as f32 / HELPER_SEGMENTS as f32 * std::f32::consts::TAU;
                apex + direction * length + (u * theta.cos() + v * theta.sin()) * radius
            })
            .collect();
        let spokes = rim.iter().map(|&point| (apex, point));
        let edges = rim
            .iter()
            .zip(rim.iter().cycle().skip(1))
            .map(|(&a, &b)| (a, b));
        spokes
            .chain(edges)
            .filter_map(|(a, b)| line_item(a, b, helper.color))
            .collect()
    }

    /// Draw list for the current state; models still loading are skipped.
    pub fn draw_items(&self) -> Vec<DrawItem> {
        let mut draws = Vec::new();
        for object in self.state.objects() {
            let Some(world) = self.state.world_matrix(&object.name) else {
                continue;
            };
            match object.kind {
                ObjectKind::Mesh | ObjectKind::Model => {
                    let Some(mesh) = object.mesh_key() else {
                        continue;
                    };
                    if self.meshes.contains(&mesh) {
                        draws.push(DrawItem {
                            mesh,
                            model: world,
                            color: object.color,
                            lit: true,
                        });
                    }
                }
                ObjectKind::Axes => draws.extend(axes_items(world)),
                ObjectKind::SpotLightHelper => draws.extend(self.spot_helper_items(object)),
                _ => {}
            }
        }
        draws
    }
}

/// Red, green and blue bars along +X, +Y and +Z, one unit long before the
/// helper's own scale is applied.
fn axes_items(world: Mat4) -> impl Iterator<Item = DrawItem> {
    [(Vec3::X, Vec3::X), (Vec3::Y, Vec3::Y), (Vec3::Z, Vec3::Z)]
        .into_iter()
        .map(move |(axis, color)| {
            let extent = axis + (Vec3::ONE - axis) * AXIS_THICKNESS;
            let bar = Mat4::from_translation(axis * 0.5) * Mat4::from_scale(extent);
            DrawItem {
                mesh: UNIT_BOX.to_string(),
                model: world * bar,
                color,
                lit: false,
            }
        })
}

/// Thin unlit bar from `a` to `b`, or nothing for a degenerate segment.
fn line_item(a: Vec3, b: Vec3, color: Vec3) -> Option<DrawItem> {
    let span = b - a;
    let length = span.length();
    if length <= f32::EPSILON {
        return None;
    }
    let rotation = Quat::from_rotation_arc(Vec3::Y, span / length);
    let scale = Vec3::new(HELPER_LINE_WIDTH, length, HELPER_LINE_WIDTH);
    Some(DrawItem {
        mesh: UNIT_BOX.to_string(),
        model: Mat4::from_scale_rotation_translation(scale, rotation, (a + b) * 0.5),
        color,
        lit: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
    <scene name="test">
        <renderer><clear-color>0xffffff</clear-color></renderer>
        <camera>
            <near>0.01</near>
            <position>10 10 10</position>
        </camera>
        <object><name>Axes</name><type>axes</type><size>10</size></object>
        <object><name>Group</name><type>group</type></object>
        <object>
            <name>Cube</name><type>mesh</type><parent>Group</parent>
            <shape>box 5 5 5</shape><position>-5 3 5</position>
        </object>
        <object>
            <name>Sphere</name><type>mesh</type><parent>Group</parent>
            <shape>sphere 5 10 10</shape><position>10 5 -5</position>
        </object>
        <object><name>Ambient</name><type>ambient-light</type><intensity>0.5</intensity></object>
        <object>
            <name>PointLight</name><type>point-light</type>
            <intensity>0</intensity><position>16 16 16</position>
        </object>
        <object>
            <name>SpotLight</name><type>spot-light</type><target>Cube</target>
            <position>16 16 16</position><angle>60</angle><penumbra>1</penumbra>
        </object>
        <control>
            <label>PointLight Intensity</label><target>PointLight</target>
            <field>intensity</field><range>0 2</range>
        </control>
        <control>
            <label>Group</label><target>Group</target>
            <field>position</field><range>-16 16 1</range>
        </control>
        <monitor><label>fps</label></monitor>
    </scene>
    "#;

    #[derive(Default)]
    struct Recorder {
        viewports: Vec<Viewport>,
        frames: Vec<(Camera, LightRig, Vec<DrawItem>)>,
    }

    impl RenderTarget for Recorder {
        fn resize(&mut self, viewport: Viewport) {
            self.viewports.push(viewport);
        }

        fn draw(&mut self, frame: &Frame<'_>) -> Result<()> {
            self.frames
                .push((frame.camera, frame.lights.clone(), frame.draws.clone()));
            Ok(())
        }
    }

    fn context_with(xml: &str) -> SceneContext {
        let description = SceneDescription::from_xml(xml).unwrap();
        SceneContext::assemble(description, Viewport::new(800, 600), AssetLoader::new("."))
            .unwrap()
    }

    fn context() -> SceneContext {
        context_with(SCENE)
    }

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn assembled_camera_looks_at_origin_with_viewport_aspect() {
        let ctx = context();
        let camera = ctx.camera();
        assert_eq!(camera.position, Vec3::splat(10.0));
        assert_eq!(camera.target, Vec3::ZERO);
        assert!((camera.aspect - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(ctx.meshes().len(), 3);
    }

    #[test]
    fn every_frame_issues_exactly_one_draw() {
        let mut ctx = context();
        let mut target = Recorder::default();
        for expected in 1..=5 {
            let report = ctx.frame(TICK, &mut target).unwrap();
            assert_eq!(report.frame_index, expected);
            assert_eq!(target.frames.len() as u64, expected);
        }
    }

    #[test]
    fn draw_list_contains_meshes_and_axes() {
        let mut ctx = context();
        let mut target = Recorder::default();
        let report = ctx.frame(TICK, &mut target).unwrap();
        // three axis bars, cube and sphere
        assert_eq!(report.draw_count, 5);
        let draws = &target.frames[0].2;
        assert_eq!(draws.iter().filter(|d| !d.lit).count(), 3);
        assert!(draws.iter().any(|d| d.mesh == "sphere:5:10:10"));
    }

    #[test]
    fn axis_bars_span_the_helper_size() {
        let ctx = context();
        let draws = ctx.draw_items();
        let x_bar = draws.iter().find(|d| d.color == Vec3::X).unwrap();
        let tip = x_bar.model.transform_point3(Vec3::new(0.5, 0.0, 0.0));
        assert!((tip - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn panel_edit_is_visible_in_next_frame() {
        let mut ctx = context();
        let mut target = Recorder::default();
        ctx.frame(TICK, &mut target).unwrap();
        ctx.apply_edit("PointLight Intensity", ControlValue::Scalar(1.5))
            .unwrap();
        ctx.frame(TICK, &mut target).unwrap();

        let before = target.frames[0].1.find(LightKind::Point).next().unwrap();
        let after = target.frames[1].1.find(LightKind::Point).next().unwrap();
        assert_eq!(before.intensity, 0.0);
        assert_eq!(after.intensity, 1.5);
    }

    #[test]
    fn moving_the_group_moves_its_children() {
        let mut ctx = context();
        ctx.apply_edit("Group", ControlValue::Vec3(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        let cube = ctx.state().world_position("Cube").unwrap();
        let sphere = ctx.state().world_position("Sphere").unwrap();
        assert!((cube - Vec3::new(-4.0, 3.0, 5.0)).length() < 1e-5);
        assert!((sphere - Vec3::new(11.0, 5.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn spot_light_points_at_its_target() {
        let ctx = context();
        let rig = ctx.light_rig();
        assert!((rig.ambient - Vec3::splat(0.5)).length() < 1e-6);
        let spot = rig.find(LightKind::Spot).next().unwrap();
        let expected = (Vec3::new(-5.0, 3.0, 5.0) - Vec3::splat(16.0)).normalize();
        assert!((spot.direction - expected).length() < 1e-5);
        assert!((spot.cos_outer - 0.5).abs() < 1e-5);
        // full penumbra starts the falloff on the cone axis
        assert!((spot.cos_inner - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fps_is_published_once_per_second() {
        let mut ctx = context();
        let mut target = Recorder::default();
        let reports: Vec<_> = (0..20)
            .map(|_| ctx.frame(TICK, &mut target).unwrap())
            .collect();
        assert!(!reports[8].fps_updated && reports[9].fps_updated);
        assert_eq!(reports[19].fps, 10);
        assert_eq!(ctx.panel().monitors()[0].latest(), Some(10.0));
    }

    #[test]
    fn resize_updates_aspect_and_notifies_target() {
        let mut ctx = context();
        let mut target = Recorder::default();
        ctx.resize(1920, 1080, &mut target);
        assert!((ctx.camera().aspect - 1920.0 / 1080.0).abs() < 1e-6);
        assert_eq!(target.viewports, vec![Viewport::new(1920, 1080)]);
    }

    #[test]
    fn resize_is_idempotent() {
        let mut ctx = context();
        let mut target = Recorder::default();
        ctx.resize(1024, 768, &mut target);
        let first = *ctx.camera();
        ctx.resize(1024, 768, &mut target);
        assert_eq!(*ctx.camera(), first);
    }

    #[test]
    fn zero_sized_resize_clamps_to_one_pixel() {
        let mut ctx = context();
        let mut target = Recorder::default();
        ctx.resize(0, 0, &mut target);
        assert_eq!(ctx.viewport(), Viewport::new(1, 1));
        assert_eq!(ctx.camera().aspect, 1.0);
        assert!(ctx.camera().aspect.is_finite());
    }

    #[test]
    fn rebuild_policy_discards_orbit_state() {
        let mut ctx = context();
        let mut target = Recorder::default();
        orbit_a_bit(&mut ctx, &mut target);
        assert_ne!(ctx.camera().position, Vec3::splat(10.0));

        ctx.resize(800, 600, &mut target);
        assert_eq!(ctx.camera().position, Vec3::splat(10.0));
    }

    #[test]
    fn update_aspect_policy_keeps_camera_position() {
        let xml = SCENE.replace(
            "<near>0.01</near>",
            "<near>0.01</near><on-resize>update-aspect</on-resize>",
        );
        let mut ctx = context_with(&xml);
        let mut target = Recorder::default();
        orbit_a_bit(&mut ctx, &mut target);
        let moved = ctx.camera().position;

        ctx.resize(1000, 500, &mut target);
        assert_eq!(ctx.camera().position, moved);
        assert_eq!(ctx.camera().aspect, 2.0);
    }

    fn orbit_a_bit(ctx: &mut SceneContext, target: &mut Recorder) {
        let orbit = ctx.orbit_mut();
        orbit.set_dragging(true);
        orbit.pointer_moved(glam::Vec2::ZERO);
        orbit.pointer_moved(glam::Vec2::new(120.0, 0.0));
        ctx.frame(TICK, target).unwrap();
    }

    #[test]
    fn control_bound_to_missing_object_fails_assembly() {
        let xml = SCENE.replace("<target>PointLight</target>", "<target>Nope</target>");
        let description = SceneDescription::from_xml(&xml).unwrap();
        let result =
            SceneContext::assemble(description, Viewport::new(800, 600), AssetLoader::new("."));
        assert!(matches!(
            result,
            Err(SceneError::UnknownReference { missing, .. }) if missing == "Nope"
        ));
    }

    #[test]
    fn models_are_drawn_once_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tri.obj"), "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let xml = r#"
        <scene>
            <object><name>Model</name><type>model</type><model>tri.obj</model></object>
            <animation><target>Model</target><kind>bob</kind><base>0.5</base><amplitude>0.5</amplitude></animation>
        </scene>"#;
        let description = SceneDescription::from_xml(xml).unwrap();
        let mut ctx =
            SceneContext::assemble(description, Viewport::new(800, 600), AssetLoader::new(dir.path()))
                .unwrap();
        assert_eq!(ctx.pending_assets(), 1);
        assert_eq!(ctx.settle_assets(Duration::from_secs(5)), 0);

        let mut target = Recorder::default();
        let report = ctx.frame(TICK, &mut target).unwrap();
        assert_eq!(report.draw_count, 1);
        let y = ctx.state().get("Model").unwrap().position.y;
        assert!((y - (0.5 + 0.5 * 0.1_f32.sin())).abs() < 1e-6);
    }

    const HELPER_SCENE: &str = r#"
    <scene>
        <object><name>Floor</name><type>group</type></object>
        <object>
            <name>Spot</name><type>spot-light</type><target>Floor</target>
            <position>0 10 0</position><angle>45</angle>
        </object>
        <object>
            <name>SpotHelper</name><type>spot-light-helper</type>
            <target>Spot</target><size>10</size><color>0xffff00</color>
        </object>
    </scene>"#;

    #[test]
    fn spot_helper_outlines_the_light_cone() {
        let ctx = context_with(HELPER_SCENE);
        assert!(ctx.meshes().contains(UNIT_BOX));
        let draws = ctx.draw_items();
        assert_eq!(draws.len(), 2 * HELPER_SEGMENTS);
        assert!(draws.iter().all(|d| !d.lit && d.mesh == UNIT_BOX));
        assert!(draws.iter().all(|d| d.color == Vec3::new(1.0, 1.0, 0.0)));

        let apex = Vec3::new(0.0, 10.0, 0.0);
        for spoke in &draws[..HELPER_SEGMENTS] {
            let start = spoke.model.transform_point3(Vec3::new(0.0, -0.5, 0.0));
            let end = spoke.model.transform_point3(Vec3::new(0.0, 0.5, 0.0));
            assert!((start - apex).length() < 1e-4);
            // 45 degree cone, 10 units long: rim lies on the floor, 10 from the axis
            assert!(end.y.abs() < 1e-4);
            assert!((glam::Vec2::new(end.x, end.z).length() - 10.0).abs() < 1e-3);
        }
    }

    #[test]
    fn spot_helper_must_target_a_spot_light() {
        let xml = HELPER_SCENE.replace("spot-light</type>", "point-light</type>");
        let description = SceneDescription::from_xml(&xml).unwrap();
        let result =
            SceneContext::assemble(description, Viewport::new(800, 600), AssetLoader::new("."));
        assert!(matches!(
            result,
            Err(SceneError::InvalidValue { tag, .. }) if tag == "target"
        ));
    }

    #[test]
    fn failed_model_load_leaves_the_rest_of_the_scene_running() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"
        <scene>
            <object><name>Floor</name><type>mesh</type><shape>plane 40 40</shape></object>
            <object><name>Model</name><type>model</type><model>missing.obj</model></object>
        </scene>"#;
        let description = SceneDescription::from_xml(xml).unwrap();
        let mut ctx =
            SceneContext::assemble(description, Viewport::new(800, 600), AssetLoader::new(dir.path()))
                .unwrap();
        assert_eq!(ctx.settle_assets(Duration::from_secs(5)), 0);
        assert_eq!(ctx.pending_assets(), 0);
        assert!(!ctx.meshes().contains("missing.obj"));

        let mut target = Recorder::default();
        let report = ctx.frame(TICK, &mut target).unwrap();
        assert_eq!(report.draw_count, 1);
        let (_, _, draws) = &target.frames[0];
        assert_eq!(draws.len(), 1);
        assert!(draws[0].mesh.starts_with("plane:"));
    }
}
