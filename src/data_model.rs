use std::collections::{HashMap, HashSet};

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::error::SceneError;
use crate::scene::SceneObject;

/// Mutable state of every object in the scene, keyed by unique name.
///
/// Insertion order is preserved so draws and summaries are deterministic.
#[derive(Debug, Clone, Default)]
pub struct SceneState {
    objects: Vec<SceneObject>,
    index: HashMap<String, usize>,
}

impl SceneState {
    /// Builds the state, rejecting duplicate names, dangling parent or light
    /// target references and parent cycles.
    pub fn from_objects(objects: Vec<SceneObject>) -> Result<Self, SceneError> {
        let mut index = HashMap::with_capacity(objects.len());
        for (position, object) in objects.iter().enumerate() {
            if index.insert(object.name.clone(), position).is_some() {
                return Err(SceneError::DuplicateName(object.name.clone()));
            }
        }

        let state = Self { objects, index };
        for object in &state.objects {
            for reference in [&object.parent, &object.target].into_iter().flatten() {
                if !state.index.contains_key(reference) {
                    return Err(SceneError::UnknownReference {
                        object: object.name.clone(),
                        missing: reference.clone(),
                    });
                }
            }
            state.check_acyclic(&object.name)?;
        }
        Ok(state)
    }

    fn check_acyclic(&self, name: &str) -> Result<(), SceneError> {
        let mut seen = HashSet::new();
        let mut current = Some(name);
        while let Some(next) = current {
            if !seen.insert(next) {
                return Err(SceneError::Cycle(name.to_string()));
            }
            current = self.get(next).and_then(|object| object.parent.as_deref());
        }
        Ok(())
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.index.get(name).map(|&i| &self.objects[i])
    }

    /// Applies a mutation to the requested object.
    pub fn update<F, R>(&mut self, name: &str, updater: F) -> Option<R>
    where
        F: FnOnce(&mut SceneObject) -> R,
    {
        let i = *self.index.get(name)?;
        Some(updater(&mut self.objects[i]))
    }

    /// Transform of an object relative to the world, composing every parent.
    pub fn world_matrix(&self, name: &str) -> Option<Mat4> {
        let mut object = self.get(name)?;
        let mut matrix = local_matrix(object);
        while let Some(parent) = object.parent.as_deref() {
            object = self.get(parent)?;
            matrix = local_matrix(object) * matrix;
        }
        Some(matrix)
    }

    pub fn world_position(&self, name: &str) -> Option<Vec3> {
        self.world_matrix(name)
            .map(|matrix| matrix.transform_point3(Vec3::ZERO))
    }
}

/// Scale, then rotate (X, Y, Z intrinsic, degrees), then translate.
pub fn local_matrix(object: &SceneObject) -> Mat4 {
    let rotation = Quat::from_euler(
        EulerRot::XYZ,
        object.rotation.x.to_radians(),
        object.rotation.y.to_radians(),
        object.rotation.z.to_radians(),
    );
    Mat4::from_scale_rotation_translation(object.scale, rotation, object.position)
}
