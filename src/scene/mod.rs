// Scene state - the ordered set of drawable objects
//
// Objects are move-only and can only be created through `SceneState::spawn`,
// which hands out ids from a counter that never goes backwards. Models are
// shared through `Rc`, so the geometry lives until its last object is dropped.

pub mod model;
pub mod transform;

use glam::{Vec2, Vec3};
use std::f32::consts::PI;
use std::rc::Rc;

pub use model::Model;
pub use transform::{wrap_angle, Transform2d};

/// Stable object identity
pub type ObjectId = u32;

/// A drawable object: shared geometry, a flat color and a 2D transform
pub struct GameObject {
    id: ObjectId,
    pub model: Rc<dyn Model>,
    pub color: Vec3,
    pub transform: Transform2d,
}

impl GameObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("vertex_count", &self.model.vertex_count())
            .field("color", &self.color)
            .field("transform", &self.transform)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct SceneState {
    objects: Vec<GameObject>,
    next_id: ObjectId,
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object at the end of the draw order and return it for setup
    pub fn spawn(&mut self, model: Rc<dyn Model>) -> &mut GameObject {
        let id = self.next_id;
        self.next_id += 1;

        self.objects.push(GameObject {
            id,
            model,
            color: Vec3::ZERO,
            transform: Transform2d::default(),
        });
        let index = self.objects.len() - 1;
        &mut self.objects[index]
    }

    /// Remove an object, preserving the order of the rest.
    ///
    /// The caller owns the returned object; dropping it may release the model.
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        Some(self.objects.remove(index))
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Built-in animation: object `i` (1-based) turns by `step * i` per frame.
    pub fn advance_rotations(&mut self, step: f32) {
        for (i, object) in self.objects.iter_mut().enumerate() {
            object.transform.rotate_wrapped(step * (i + 1) as f32);
        }
    }
}

/// Pastel palette, authored in sRGB
const PALETTE: [[f32; 3]; 5] = [
    [1.0, 0.7, 0.73],
    [1.0, 0.87, 0.73],
    [1.0, 1.0, 0.73],
    [0.73, 1.0, 0.8],
    [0.73, 0.88, 1.0],
];

/// Spawn `count` copies of `model` as a growing, twisting fan.
pub fn spawn_triangle_fan(scene: &mut SceneState, model: Rc<dyn Model>, count: usize) {
    let colors: Vec<Vec3> = PALETTE
        .iter()
        .map(|&c| Vec3::from(c).powf(2.2))
        .collect();

    for i in 0..count {
        let object = scene.spawn(model.clone());
        object.transform.scale = Vec2::splat(0.5 + i as f32 * 0.025);
        object.transform.rotation = wrap_angle(i as f32 * PI * 0.025);
        object.color = colors[i % colors.len()];
    }

    log::info!("Spawned {} objects", count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::stub::StubModel;
    use approx::assert_relative_eq;
    use std::f32::consts::TAU;

    fn model() -> Rc<dyn Model> {
        Rc::new(StubModel::new(1, 3))
    }

    #[test]
    fn ids_are_never_reused() {
        let mut scene = SceneState::new();
        let a = scene.spawn(model()).id();
        let b = scene.spawn(model()).id();
        scene.remove(b);
        let c = scene.spawn(model()).id();

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(scene.iter().map(GameObject::id).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn model_is_released_with_its_last_object() {
        let shared = model();
        let mut scene = SceneState::new();
        let first = scene.spawn(shared.clone()).id();
        let second = scene.spawn(shared.clone()).id();
        assert_eq!(Rc::strong_count(&shared), 3);

        drop(scene.remove(first));
        assert_eq!(Rc::strong_count(&shared), 2);
        drop(scene.remove(second));
        assert_eq!(Rc::strong_count(&shared), 1);
    }

    #[test]
    fn rotation_step_scales_with_position() {
        let mut scene = SceneState::new();
        for _ in 0..3 {
            scene.spawn(model());
        }

        scene.advance_rotations(0.1);

        let rotations: Vec<f32> = scene.iter().map(|o| o.transform.rotation).collect();
        assert_relative_eq!(rotations[0], 0.1, epsilon = 1e-6);
        assert_relative_eq!(rotations[1], 0.2, epsilon = 1e-6);
        assert_relative_eq!(rotations[2], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn rotations_stay_wrapped_over_many_frames() {
        let mut scene = SceneState::new();
        for _ in 0..40 {
            scene.spawn(model());
        }

        for _ in 0..20_000 {
            scene.advance_rotations(0.05);
        }

        assert!(scene
            .iter()
            .all(|o| o.transform.rotation >= 0.0 && o.transform.rotation < TAU));
    }

    #[test]
    fn triangle_fan_cycles_palette_and_grows() {
        let mut scene = SceneState::new();
        spawn_triangle_fan(&mut scene, model(), 12);

        assert_eq!(scene.len(), 12);
        let objects: Vec<&GameObject> = scene.iter().collect();
        assert_eq!(objects[0].color, objects[5].color);
        assert_eq!(objects[1].color, objects[11].color);
        assert_relative_eq!(objects[0].transform.scale.x, 0.5);
        assert_relative_eq!(objects[4].transform.scale.y, 0.6, epsilon = 1e-6);
        assert_relative_eq!(objects[0].color.x, 1.0);
        assert_relative_eq!(objects[0].color.y, 0.7f32.powf(2.2), epsilon = 1e-6);
    }
}
