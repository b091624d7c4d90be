use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::data_model::SceneState;

/// Time-driven change applied to one object every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Animation {
    /// Vertical oscillation: `y = base + amplitude * sin(rate * elapsed_seconds)`.
    Bob {
        target: String,
        base: f32,
        amplitude: f32,
        rate: f32,
    },
    /// Constant rotation in degrees added once per frame.
    Spin { target: String, per_frame: Vec3 },
}

impl Animation {
    pub fn target(&self) -> &str {
        match self {
            Self::Bob { target, .. } | Self::Spin { target, .. } => target,
        }
    }

    /// Applies the animation for a frame at `elapsed` since the scene started.
    ///
    /// Returns `false` when the target object does not exist.
    pub fn apply(&self, scene: &mut SceneState, elapsed: Duration) -> bool {
        match self {
            Self::Bob {
                target,
                base,
                amplitude,
                rate,
            } => {
                let y = base + amplitude * (rate * elapsed.as_secs_f32()).sin();
                scene.update(target, |object| object.position.y = y).is_some()
            }
            Self::Spin { target, per_frame } => scene
                .update(target, |object| object.rotation += *per_frame)
                .is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ObjectKind, SceneObject};

    fn scene_with(name: &str) -> SceneState {
        SceneState::from_objects(vec![SceneObject::new(name, ObjectKind::Model)]).unwrap()
    }

    #[test]
    fn bob_follows_sine_of_elapsed_time() {
        let mut scene = scene_with("Eye");
        let bob = Animation::Bob {
            target: "Eye".into(),
            base: 0.5,
            amplitude: 0.5,
            rate: 2.0,
        };
        assert!(bob.apply(&mut scene, Duration::ZERO));
        assert_eq!(scene.get("Eye").unwrap().position.y, 0.5);

        let quarter = Duration::from_secs_f32(std::f32::consts::FRAC_PI_4);
        bob.apply(&mut scene, quarter);
        assert!((scene.get("Eye").unwrap().position.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn spin_accumulates_per_frame() {
        let mut scene = scene_with("Eye");
        let spin = Animation::Spin {
            target: "Eye".into(),
            per_frame: Vec3::new(0.5, 0.0, 0.0),
        };
        for _ in 0..4 {
            spin.apply(&mut scene, Duration::ZERO);
        }
        assert_eq!(scene.get("Eye").unwrap().rotation, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn missing_target_is_reported() {
        let mut scene = scene_with("Eye");
        let spin = Animation::Spin {
            target: "Ghost".into(),
            per_frame: Vec3::X,
        };
        assert!(!spin.apply(&mut scene, Duration::ZERO));
    }
}
