//! Scenes shipped with the binary.

/// Name and XML source of every built-in scene, in tutorial order.
pub const BUILTIN_SCENES: &[(&str, &str)] = &[
    ("boilerplate", include_str!("../scenes/boilerplate.xml")),
    ("basics", include_str!("../scenes/basics.xml")),
    (
        "animation-hierarchy",
        include_str!("../scenes/animation-hierarchy.xml"),
    ),
];

/// Looks up the XML source of a built-in scene.
pub fn builtin_scene(name: &str) -> Option<&'static str> {
    BUILTIN_SCENES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, xml)| *xml)
}

pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_SCENES.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SceneContext;
    use crate::assets::AssetLoader;
    use crate::camera::{ResizePolicy, Viewport};
    use crate::scene::{ObjectKind, SceneDescription};

    fn description(name: &str) -> SceneDescription {
        SceneDescription::from_xml(builtin_scene(name).unwrap()).unwrap()
    }

    #[test]
    fn every_builtin_scene_assembles() {
        for name in builtin_names() {
            let description = description(name);
            assert_eq!(description.name, name);
            SceneContext::assemble(description, Viewport::new(800, 600), AssetLoader::new("."))
                .unwrap_or_else(|err| panic!("{name}: {err}"));
        }
    }

    #[test]
    fn basics_exposes_light_controls() {
        let scene = description("basics");
        let labels: Vec<_> = scene.controls.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "Sphere XZ Plane",
                "PointLight",
                "PointLight Intensity",
                "SpotLight",
                "SpotLight Intensity"
            ]
        );
        assert_eq!(scene.light_count(), 3);
        assert!(scene
            .objects
            .iter()
            .any(|o| o.kind == ObjectKind::SpotLightHelper && o.target.as_deref() == Some("SpotLight")));
        assert_eq!(scene.camera.on_resize, ResizePolicy::Rebuild);
    }

    #[test]
    fn hierarchy_groups_cube_and_sphere() {
        let scene = description("animation-hierarchy");
        let children: Vec<_> = scene
            .objects
            .iter()
            .filter(|o| o.parent.as_deref() == Some("Cube + Sphere"))
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(children, ["Cube", "Sphere"]);
        assert_eq!(scene.camera.on_resize, ResizePolicy::UpdateAspect);
    }

    #[test]
    fn boilerplate_loads_a_model() {
        let scene = description("boilerplate");
        let eye = scene.objects.iter().find(|o| o.kind == ObjectKind::Model);
        assert_eq!(eye.and_then(|o| o.model.as_deref()), Some("assets/eye.obj"));
        assert_eq!(scene.animations.len(), 2);
    }

    #[test]
    fn unknown_name_is_not_builtin() {
        assert!(builtin_scene("teapot").is_none());
    }
}
