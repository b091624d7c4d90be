//! Debug parameter panel: named controls bound to scene object fields.
//!
//! The panel itself is UI-agnostic. Widgets (egui in the windowed runner,
//! `--set` arguments in headless runs) report new values through
//! [`DebugPanel::edit`], which clamps them into the declared ranges and writes
//! them straight into [`SceneState`].

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::clock::FpsCounter;
use crate::data_model::SceneState;
use crate::error::PanelError;
use crate::scene::SceneObject;

/// Object field a control writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundField {
    Position,
    /// The `x` and `z` components of the position; `y` is left untouched.
    PositionXz,
    Intensity,
    Angle,
    Penumbra,
    Color,
}

impl BoundField {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "position" => Self::Position,
            "position.xz" => Self::PositionXz,
            "intensity" => Self::Intensity,
            "angle" => Self::Angle,
            "penumbra" => Self::Penumbra,
            "color" => Self::Color,
            _ => return None,
        })
    }

    /// Number of components edited by the control.
    pub fn arity(self) -> usize {
        match self {
            Self::Position | Self::Color => 3,
            Self::PositionXz => 2,
            Self::Intensity | Self::Angle | Self::Penumbra => 1,
        }
    }

    pub fn read(self, object: &SceneObject) -> ControlValue {
        match self {
            Self::Position => ControlValue::Vec3(object.position),
            Self::PositionXz => ControlValue::Vec2(Vec2::new(object.position.x, object.position.z)),
            Self::Intensity => ControlValue::Scalar(object.intensity),
            Self::Angle => ControlValue::Scalar(object.angle),
            Self::Penumbra => ControlValue::Scalar(object.penumbra),
            Self::Color => ControlValue::Vec3(object.color),
        }
    }

    fn write(self, object: &mut SceneObject, value: ControlValue) {
        match (self, value) {
            (Self::Position, ControlValue::Vec3(v)) => object.position = v,
            (Self::PositionXz, ControlValue::Vec2(v)) => {
                object.position.x = v.x;
                object.position.z = v.y;
            }
            (Self::Intensity, ControlValue::Scalar(v)) => object.intensity = v,
            (Self::Angle, ControlValue::Scalar(v)) => object.angle = v,
            (Self::Penumbra, ControlValue::Scalar(v)) => object.penumbra = v,
            (Self::Color, ControlValue::Vec3(v)) => object.color = v,
            // arity is checked before writing
            _ => {}
        }
    }
}

/// Value carried by a control, one to three components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlValue {
    Scalar(f32),
    Vec2(Vec2),
    Vec3(Vec3),
}

impl ControlValue {
    pub fn from_components(components: &[f32]) -> Option<Self> {
        match *components {
            [x] => Some(Self::Scalar(x)),
            [x, y] => Some(Self::Vec2(Vec2::new(x, y))),
            [x, y, z] => Some(Self::Vec3(Vec3::new(x, y, z))),
            _ => None,
        }
    }

    pub fn components(self) -> Vec<f32> {
        match self {
            Self::Scalar(x) => vec![x],
            Self::Vec2(v) => v.to_array().to_vec(),
            Self::Vec3(v) => v.to_array().to_vec(),
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vec2(_) => 2,
            Self::Vec3(_) => 3,
        }
    }

    /// Parses a comma separated list such as `1.5` or `4,8,-2`.
    pub fn parse(text: &str) -> Option<Self> {
        let components = text
            .split(',')
            .map(|part| part.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        Self::from_components(&components)
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(x) => write!(f, "{x:.2}"),
            Self::Vec2(v) => write!(f, "({:.2}, {:.2})", v.x, v.y),
            Self::Vec3(v) => write!(f, "({:.2}, {:.2}, {:.2})", v.x, v.y, v.z),
        }
    }
}

/// Allowed interval of one control component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
    /// Increment used by interactive widgets; edits are not snapped to it.
    pub step: Option<f32>,
}

impl AxisRange {
    pub fn new(min: f32, max: f32, step: Option<f32>) -> Self {
        Self { min, max, step }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Declared control: which object field it binds and in which ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    pub label: String,
    pub target: String,
    pub field: BoundField,
    /// One range per component of `field`.
    pub ranges: Vec<AxisRange>,
}

/// Statistic shown by a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorSource {
    Fps,
}

impl MonitorSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fps" => Some(Self::Fps),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSpec {
    pub label: String,
    pub source: MonitorSource,
    /// Number of samples kept for the graph.
    pub history: usize,
    /// Minimum time between two samples.
    pub interval: Duration,
}

/// Live control with the value currently shown by its widget.
#[derive(Debug, Clone)]
pub struct Control {
    spec: ControlSpec,
    value: ControlValue,
}

impl Control {
    pub fn label(&self) -> &str {
        &self.spec.label
    }

    pub fn spec(&self) -> &ControlSpec {
        &self.spec
    }

    pub fn value(&self) -> ControlValue {
        self.value
    }
}

/// Read-only graph of a scene statistic.
#[derive(Debug, Clone)]
pub struct Monitor {
    spec: MonitorSpec,
    samples: VecDeque<f32>,
    since_sample: Duration,
}

impl Monitor {
    pub fn label(&self) -> &str {
        &self.spec.label
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }

    fn sample(&mut self, dt: Duration, fps: &FpsCounter) {
        self.since_sample += dt;
        if self.since_sample < self.spec.interval && !self.samples.is_empty() {
            return;
        }
        self.since_sample = Duration::ZERO;
        let value = match self.spec.source {
            MonitorSource::Fps => fps.fps() as f32,
        };
        if self.samples.len() == self.spec.history {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }
}

/// Set of controls and monitors for one scene.
#[derive(Debug, Clone, Default)]
pub struct DebugPanel {
    controls: Vec<Control>,
    monitors: Vec<Monitor>,
}

impl DebugPanel {
    /// Binds controls to `scene`, reading their initial values from it.
    pub fn new(
        controls: Vec<ControlSpec>,
        monitors: Vec<MonitorSpec>,
        scene: &SceneState,
    ) -> Result<Self, PanelError> {
        let controls = controls
            .into_iter()
            .map(|spec| {
                let object = scene
                    .get(&spec.target)
                    .ok_or_else(|| PanelError::MissingObject {
                        label: spec.label.clone(),
                        object: spec.target.clone(),
                    })?;
                let value = spec.field.read(object);
                Ok(Control { spec, value })
            })
            .collect::<Result<Vec<_>, PanelError>>()?;
        let monitors = monitors
            .into_iter()
            .map(|spec| Monitor {
                samples: VecDeque::with_capacity(spec.history),
                since_sample: Duration::ZERO,
                spec,
            })
            .collect();
        Ok(Self { controls, monitors })
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn control(&self, label: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.spec.label == label)
    }

    /// Writes a new value for the control labelled `label` into the scene.
    ///
    /// Each component is clamped into its range. Returns the value actually
    /// applied.
    pub fn edit(
        &mut self,
        label: &str,
        value: ControlValue,
        scene: &mut SceneState,
    ) -> Result<ControlValue, PanelError> {
        let control = self
            .controls
            .iter_mut()
            .find(|c| c.spec.label == label)
            .ok_or_else(|| PanelError::UnknownControl(label.to_string()))?;

        let expected = control.spec.field.arity();
        if value.arity() != expected {
            return Err(PanelError::Arity {
                label: label.to_string(),
                expected,
                got: value.arity(),
            });
        }
        if value.components().iter().any(|c| !c.is_finite()) {
            return Err(PanelError::NonFinite {
                label: label.to_string(),
                value: value.to_string(),
            });
        }

        let clamped: Vec<f32> = value
            .components()
            .into_iter()
            .zip(&control.spec.ranges)
            .map(|(component, range)| range.clamp(component))
            .collect();
        let applied = ControlValue::from_components(&clamped).unwrap_or(value);

        let field = control.spec.field;
        scene
            .update(&control.spec.target, |object| field.write(object, applied))
            .ok_or_else(|| PanelError::MissingObject {
                label: label.to_string(),
                object: control.spec.target.clone(),
            })?;
        control.value = applied;
        Ok(applied)
    }

    /// Re-reads every bound field so widgets reflect the current scene.
    pub fn refresh(&mut self, scene: &SceneState) {
        for control in &mut self.controls {
            if let Some(object) = scene.get(&control.spec.target) {
                control.value = control.spec.field.read(object);
            }
        }
    }

    /// Feeds frame statistics to the monitors.
    pub fn sample(&mut self, dt: Duration, fps: &FpsCounter) {
        for monitor in &mut self.monitors {
            monitor.sample(dt, fps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ObjectKind;

    fn scene() -> SceneState {
        let mut light = SceneObject::new("PointLight", ObjectKind::PointLight);
        light.intensity = 0.0;
        light.position = Vec3::splat(16.0);
        let mut sphere = SceneObject::new("Sphere", ObjectKind::Group);
        sphere.position = Vec3::new(10.0, 5.0, -5.0);
        SceneState::from_objects(vec![light, sphere]).unwrap()
    }

    fn panel(scene: &SceneState) -> DebugPanel {
        let controls = vec![
            ControlSpec {
                label: "PointLight Intensity".into(),
                target: "PointLight".into(),
                field: BoundField::Intensity,
                ranges: vec![AxisRange::new(0.0, 2.0, None)],
            },
            ControlSpec {
                label: "Sphere XZ Plane".into(),
                target: "Sphere".into(),
                field: BoundField::PositionXz,
                ranges: vec![AxisRange::new(-16.0, 16.0, Some(0.01)); 2],
            },
        ];
        let monitors = vec![MonitorSpec {
            label: "fps".into(),
            source: MonitorSource::Fps,
            history: 2,
            interval: Duration::from_secs(1),
        }];
        DebugPanel::new(controls, monitors, scene).unwrap()
    }

    #[test]
    fn initial_values_are_read_from_scene() {
        let scene = scene();
        let panel = panel(&scene);
        let control = panel.control("Sphere XZ Plane").unwrap();
        assert_eq!(control.value(), ControlValue::Vec2(Vec2::new(10.0, -5.0)));
    }

    #[test]
    fn intensity_edit_lands_in_scene_state() {
        let mut scene = scene();
        let mut panel = panel(&scene);
        let applied = panel
            .edit("PointLight Intensity", ControlValue::Scalar(1.5), &mut scene)
            .unwrap();
        assert_eq!(applied, ControlValue::Scalar(1.5));
        assert_eq!(scene.get("PointLight").unwrap().intensity, 1.5);
    }

    #[test]
    fn edits_are_clamped_to_range() {
        let mut scene = scene();
        let mut panel = panel(&scene);
        panel
            .edit("PointLight Intensity", ControlValue::Scalar(7.0), &mut scene)
            .unwrap();
        assert_eq!(scene.get("PointLight").unwrap().intensity, 2.0);
    }

    #[test]
    fn xz_edit_keeps_height() {
        let mut scene = scene();
        let mut panel = panel(&scene);
        panel
            .edit("Sphere XZ Plane", ControlValue::Vec2(Vec2::new(1.0, -20.0)), &mut scene)
            .unwrap();
        assert_eq!(scene.get("Sphere").unwrap().position, Vec3::new(1.0, 5.0, -16.0));
    }

    #[test]
    fn last_write_wins() {
        let mut scene = scene();
        let mut panel = panel(&scene);
        for value in [0.5, 1.0, 0.25] {
            panel
                .edit("PointLight Intensity", ControlValue::Scalar(value), &mut scene)
                .unwrap();
        }
        assert_eq!(scene.get("PointLight").unwrap().intensity, 0.25);
    }

    #[test]
    fn unknown_label_and_wrong_arity_are_errors() {
        let mut scene = scene();
        let mut panel = panel(&scene);
        assert_eq!(
            panel.edit("Nope", ControlValue::Scalar(1.0), &mut scene),
            Err(PanelError::UnknownControl("Nope".into()))
        );
        assert!(matches!(
            panel.edit("Sphere XZ Plane", ControlValue::Scalar(1.0), &mut scene),
            Err(PanelError::Arity { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn non_finite_edits_leave_scene_untouched() {
        let mut scene = scene();
        let mut panel = panel(&scene);
        let nan = ControlValue::parse("nan").unwrap();
        assert!(matches!(
            panel.edit("PointLight Intensity", nan, &mut scene),
            Err(PanelError::NonFinite { .. })
        ));
        assert!(matches!(
            panel.edit(
                "Sphere XZ Plane",
                ControlValue::Vec2(Vec2::new(f32::INFINITY, 0.0)),
                &mut scene
            ),
            Err(PanelError::NonFinite { .. })
        ));
        assert_eq!(scene.get("PointLight").unwrap().intensity, 0.0);
        assert_eq!(scene.get("Sphere").unwrap().position, Vec3::new(10.0, 5.0, -5.0));
        assert_eq!(
            panel.control("PointLight Intensity").unwrap().value(),
            ControlValue::Scalar(0.0)
        );
    }

    #[test]
    fn refresh_picks_up_external_changes() {
        let mut scene = scene();
        let mut panel = panel(&scene);
        scene.update("PointLight", |light| light.intensity = 0.75);
        panel.refresh(&scene);
        assert_eq!(
            panel.control("PointLight Intensity").unwrap().value(),
            ControlValue::Scalar(0.75)
        );
    }

    #[test]
    fn control_values_parse_from_text() {
        assert_eq!(ControlValue::parse("1.5"), Some(ControlValue::Scalar(1.5)));
        assert_eq!(
            ControlValue::parse("4, 8,-2"),
            Some(ControlValue::Vec3(Vec3::new(4.0, 8.0, -2.0)))
        );
        assert_eq!(ControlValue::parse("1,2,3,4"), None);
        assert_eq!(ControlValue::parse("abc"), None);
    }

    #[test]
    fn monitor_keeps_bounded_history() {
        let scene = scene();
        let mut panel = panel(&scene);
        let fps = FpsCounter::default();
        for _ in 0..5 {
            panel.sample(Duration::from_secs(1), &fps);
        }
        assert_eq!(panel.monitors()[0].samples().count(), 2);
        assert_eq!(panel.monitors()[0].latest(), Some(0.0));
    }
}
