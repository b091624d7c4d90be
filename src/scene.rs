use std::time::Duration;

use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::animation::Animation;
use crate::camera::{CameraConfig, ResizePolicy};
use crate::error::SceneError;
use crate::geometry;
use crate::mesh::MeshData;
use crate::panel::{AxisRange, BoundField, ControlSpec, MonitorSource, MonitorSpec};

/// Static description of a tutorial scene, parsed from XML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub name: String,
    pub clear_color: Vec3,
    pub camera: CameraConfig,
    pub objects: Vec<SceneObject>,
    pub controls: Vec<ControlSpec>,
    pub monitors: Vec<MonitorSpec>,
    pub animations: Vec<Animation>,
}

impl SceneDescription {
    /// Parses a scene description.
    ///
    /// Structural checks (unique names, resolvable references) happen later,
    /// when the objects are loaded into a [`crate::SceneState`].
    pub fn from_xml(xml: &str) -> Result<Self, SceneError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();

        let name = root.attribute("name").unwrap_or("scene").to_string();
        let clear_color = match child(&root, "renderer") {
            Some(renderer) => parse_color(optional_text(&renderer, "clear-color"), Vec3::ZERO)?,
            None => Vec3::ZERO,
        };
        let camera = match child(&root, "camera") {
            Some(node) => parse_camera(&node)?,
            None => CameraConfig::default(),
        };

        let mut objects = Vec::new();
        let mut controls = Vec::new();
        let mut monitors = Vec::new();
        let mut animations = Vec::new();
        for node in root.children().filter(|node| node.is_element()) {
            match node.tag_name().name() {
                "object" => objects.push(parse_object(&node)?),
                "control" => controls.push(parse_control(&node)?),
                "monitor" => monitors.push(parse_monitor(&node)?),
                "animation" => animations.push(parse_animation(&node)?),
                _ => {}
            }
        }

        Ok(Self {
            name,
            clear_color,
            camera,
            objects,
            controls,
            monitors,
            animations,
        })
    }

    pub fn light_count(&self) -> usize {
        self.objects.iter().filter(|o| o.kind.is_light()).count()
    }
}

/// Role of an object in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Mesh,
    Group,
    Model,
    Axes,
    /// Wireframe cone showing the reach of the spot light named by `target`.
    SpotLightHelper,
    AmbientLight,
    DirectionalLight,
    PointLight,
    SpotLight,
}

impl ObjectKind {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "mesh" => Self::Mesh,
            "group" => Self::Group,
            "model" => Self::Model,
            "axes" => Self::Axes,
            "spot-light-helper" => Self::SpotLightHelper,
            "ambient-light" => Self::AmbientLight,
            "directional-light" => Self::DirectionalLight,
            "point-light" => Self::PointLight,
            "spot-light" => Self::SpotLight,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Group => "group",
            Self::Model => "model",
            Self::Axes => "axes",
            Self::SpotLightHelper => "spot-light-helper",
            Self::AmbientLight => "ambient-light",
            Self::DirectionalLight => "directional-light",
            Self::PointLight => "point-light",
            Self::SpotLight => "spot-light",
        }
    }

    pub fn is_light(self) -> bool {
        matches!(
            self,
            Self::AmbientLight | Self::DirectionalLight | Self::PointLight | Self::SpotLight
        )
    }
}

/// Primitive geometry attached to a mesh object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Box { width: f32, height: f32, depth: f32 },
    Sphere { radius: f32, width_segments: u32, height_segments: u32 },
    Plane { width: f32, height: f32 },
}

impl Shape {
    /// Key under which the generated mesh is stored in the mesh library.
    pub fn mesh_key(&self) -> String {
        match self {
            Self::Box { width, height, depth } => format!("box:{width}:{height}:{depth}"),
            Self::Sphere {
                radius,
                width_segments,
                height_segments,
            } => format!("sphere:{radius}:{width_segments}:{height_segments}"),
            Self::Plane { width, height } => format!("plane:{width}:{height}"),
        }
    }

    pub fn build(&self) -> MeshData {
        match *self {
            Self::Box { width, height, depth } => geometry::box_mesh(width, height, depth),
            Self::Sphere {
                radius,
                width_segments,
                height_segments,
            } => geometry::sphere_mesh(radius, width_segments, height_segments),
            Self::Plane { width, height } => geometry::plane_mesh(width, height),
        }
    }

    fn parse(value: &str) -> Result<Self, SceneError> {
        let invalid = |reason: &str| SceneError::InvalidValue {
            tag: "shape".into(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let mut parts = value.split_whitespace();
        let kind = parts.next().ok_or_else(|| invalid("empty shape"))?;
        let numbers = parts
            .map(str::parse::<f32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| invalid(&err.to_string()))?;
        match (kind, numbers.as_slice()) {
            ("box", &[width, height, depth]) => Ok(Self::Box { width, height, depth }),
            ("sphere", &[radius]) => Ok(Self::Sphere {
                radius,
                width_segments: 32,
                height_segments: 16,
            }),
            ("sphere", &[radius, width_segments, height_segments]) => Ok(Self::Sphere {
                radius,
                width_segments: width_segments as u32,
                height_segments: height_segments as u32,
            }),
            ("plane", &[width, height]) => Ok(Self::Plane { width, height }),
            _ => Err(invalid("expected `box w h d`, `sphere r [ws hs]` or `plane w h`")),
        }
    }
}

/// Scene object as described by the scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    /// Path of a model file for [`ObjectKind::Model`] objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub color: Vec3,
    pub position: Vec3,
    /// Euler rotation in degrees, applied X then Y then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub intensity: f32,
    /// Spot light cone half-angle in degrees.
    pub angle: f32,
    pub penumbra: f32,
    /// Object a directional or spot light points at; the origin when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            shape: None,
            model: None,
            color: Vec3::ONE,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            intensity: 1.0,
            angle: 60.0,
            penumbra: 0.0,
            target: None,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    /// Key of the mesh drawn for this object, if it draws one.
    pub fn mesh_key(&self) -> Option<String> {
        match self.kind {
            ObjectKind::Mesh => self.shape.as_ref().map(Shape::mesh_key),
            ObjectKind::Model => self.model.clone(),
            _ => None,
        }
    }
}

fn parse_object(node: &Node<'_, '_>) -> Result<SceneObject, SceneError> {
    let name = required_text(node, "name")?;
    let kind_text = required_text(node, "type")?;
    let kind = ObjectKind::parse(&kind_text).ok_or(SceneError::UnknownKind(kind_text))?;

    let mut object = SceneObject::new(name, kind);
    object.parent = optional_text(node, "parent");
    object.shape = optional_text(node, "shape")
        .map(|shape| Shape::parse(&shape))
        .transpose()?;
    object.model = optional_text(node, "model");
    object.target = optional_text(node, "target");
    object.color = parse_color(optional_text(node, "color"), object.color)?;
    object.position = parse_vec3("position", optional_text(node, "position"), object.position)?;
    object.rotation = parse_vec3("rotation", optional_text(node, "rotation"), object.rotation)?;
    object.scale = parse_vec3("scale", optional_text(node, "scale"), object.scale)?;
    if let Some(size) = optional_text(node, "size") {
        object.scale = Vec3::splat(parse_f32("size", Some(size), 1.0)?);
    }
    object.intensity = parse_f32("intensity", optional_text(node, "intensity"), object.intensity)?;
    object.angle = parse_f32("angle", optional_text(node, "angle"), object.angle)?;
    object.penumbra = parse_f32("penumbra", optional_text(node, "penumbra"), object.penumbra)?;
    object.cast_shadow = parse_bool("cast-shadow", optional_text(node, "cast-shadow"))?;
    object.receive_shadow = parse_bool("receive-shadow", optional_text(node, "receive-shadow"))?;

    if kind == ObjectKind::Mesh && object.shape.is_none() {
        return Err(SceneError::MissingTag("shape".into()));
    }
    if kind == ObjectKind::Model && object.model.is_none() {
        return Err(SceneError::MissingTag("model".into()));
    }
    if kind == ObjectKind::SpotLightHelper && object.target.is_none() {
        return Err(SceneError::MissingTag("target".into()));
    }
    Ok(object)
}

fn parse_camera(node: &Node<'_, '_>) -> Result<CameraConfig, SceneError> {
    let defaults = CameraConfig::default();
    let on_resize = match optional_text(node, "on-resize").as_deref() {
        None => defaults.on_resize,
        Some("rebuild") => ResizePolicy::Rebuild,
        Some("update-aspect") => ResizePolicy::UpdateAspect,
        Some(other) => {
            return Err(SceneError::InvalidValue {
                tag: "on-resize".into(),
                value: other.to_string(),
                reason: "expected `rebuild` or `update-aspect`".into(),
            })
        }
    };
    Ok(CameraConfig {
        fov: parse_f32("fov", optional_text(node, "fov"), defaults.fov)?,
        near: parse_f32("near", optional_text(node, "near"), defaults.near)?,
        far: parse_f32("far", optional_text(node, "far"), defaults.far)?,
        position: parse_vec3("position", optional_text(node, "position"), defaults.position)?,
        target: parse_vec3("target", optional_text(node, "target"), defaults.target)?,
        on_resize,
    })
}

fn parse_control(node: &Node<'_, '_>) -> Result<ControlSpec, SceneError> {
    let label = required_text(node, "label")?;
    let target = required_text(node, "target")?;
    let field_text = required_text(node, "field")?;
    let field = BoundField::parse(&field_text).ok_or_else(|| SceneError::InvalidValue {
        tag: "field".into(),
        value: field_text.clone(),
        reason: "unknown bindable field".into(),
    })?;

    let mut ranges = node
        .children()
        .filter(|child| child.has_tag_name("range"))
        .filter_map(|child| child.text())
        .map(parse_range)
        .collect::<Result<Vec<_>, _>>()?;
    match ranges.len() {
        0 => return Err(SceneError::MissingTag("range".into())),
        1 => {
            let shared = ranges[0];
            ranges.resize(field.arity(), shared);
        }
        n if n == field.arity() => {}
        n => {
            return Err(SceneError::InvalidValue {
                tag: "range".into(),
                value: n.to_string(),
                reason: format!("field {field_text} needs 1 or {} ranges", field.arity()),
            })
        }
    }

    Ok(ControlSpec {
        label,
        target,
        field,
        ranges,
    })
}

fn parse_range(text: &str) -> Result<AxisRange, SceneError> {
    let invalid = |reason: String| SceneError::InvalidValue {
        tag: "range".into(),
        value: text.trim().to_string(),
        reason,
    };
    let numbers = text
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| invalid(err.to_string()))?;
    if numbers.iter().any(|n| !n.is_finite()) {
        return Err(invalid("bounds and step must be finite".into()));
    }
    let range = match numbers.as_slice() {
        &[min, max] => AxisRange::new(min, max, None),
        &[min, max, step] => AxisRange::new(min, max, Some(step)),
        _ => return Err(invalid("expected `min max [step]`".into())),
    };
    if range.min > range.max {
        return Err(invalid("min is greater than max".into()));
    }
    Ok(range)
}

fn parse_monitor(node: &Node<'_, '_>) -> Result<MonitorSpec, SceneError> {
    let label = required_text(node, "label")?;
    let source_text = optional_text(node, "source").unwrap_or_else(|| "fps".into());
    let source = MonitorSource::parse(&source_text).ok_or_else(|| SceneError::InvalidValue {
        tag: "source".into(),
        value: source_text,
        reason: "unknown monitor source".into(),
    })?;
    let history = parse_f32("history", optional_text(node, "history"), 64.0)?.max(1.0) as usize;
    let interval_ms = parse_f32("interval", optional_text(node, "interval"), 1000.0)?.max(0.0);
    Ok(MonitorSpec {
        label,
        source,
        history,
        interval: Duration::from_millis(interval_ms as u64),
    })
}

fn parse_animation(node: &Node<'_, '_>) -> Result<Animation, SceneError> {
    let target = required_text(node, "target")?;
    let kind = required_text(node, "kind")?;
    match kind.as_str() {
        "bob" => Ok(Animation::Bob {
            target,
            base: parse_f32("base", optional_text(node, "base"), 0.0)?,
            amplitude: parse_f32("amplitude", optional_text(node, "amplitude"), 1.0)?,
            rate: parse_f32("rate", optional_text(node, "rate"), 1.0)?,
        }),
        "spin" => Ok(Animation::Spin {
            target,
            per_frame: parse_vec3("per-frame", optional_text(node, "per-frame"), Vec3::ZERO)?,
        }),
        other => Err(SceneError::InvalidValue {
            tag: "kind".into(),
            value: other.to_string(),
            reason: "expected `bob` or `spin`".into(),
        }),
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String, SceneError> {
    optional_text(node, tag).ok_or_else(|| SceneError::MissingTag(tag.to_string()))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn parse_vec3(tag: &str, value: Option<String>, default: Vec3) -> Result<Vec3, SceneError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let invalid = |reason: String| SceneError::InvalidValue {
        tag: tag.to_string(),
        value: value.clone(),
        reason,
    };
    let numbers = value
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| invalid(err.to_string()))?;
    match numbers.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(invalid("expected three components".into())),
    }
}

/// Accepts `0xRRGGBB`, `#RRGGBB` or three 0-255 components.
fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3, SceneError> {
    let Some(value) = value else {
        return Ok(default);
    };
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix('#')) {
        let rgb = u32::from_str_radix(hex, 16).map_err(|err| SceneError::InvalidValue {
            tag: "color".into(),
            value: value.clone(),
            reason: err.to_string(),
        })?;
        let channel = |shift: u32| ((rgb >> shift) & 0xff) as f32 / 255.0;
        return Ok(Vec3::new(channel(16), channel(8), channel(0)));
    }
    Ok(parse_vec3("color", Some(value), default)? / 255.0)
}

fn parse_f32(tag: &str, value: Option<String>, default: f32) -> Result<f32, SceneError> {
    match value {
        Some(value) => value.parse::<f32>().map_err(|err| SceneError::InvalidValue {
            tag: tag.to_string(),
            value,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(tag: &str, value: Option<String>) -> Result<bool, SceneError> {
    match value.as_deref() {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(SceneError::InvalidValue {
            tag: tag.to_string(),
            value: other.to_string(),
            reason: "expected `true` or `false`".into(),
        }),
    }
}
