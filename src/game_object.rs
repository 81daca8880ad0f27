use crate::model::Model;

use std::rc::Rc;

use glam::{EulerRot, Mat3, Mat4, Vec3};

pub type ObjectId = u32;

/// Hands out scene-unique object ids. Owned by the
/// application alongside the object list, so ids stay unique
/// per scene rather than per process.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: ObjectId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> ObjectId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Position, scale and orientation of an object in the world.
/// The rotation is a set of YXZ Tait-Bryan angles in radians:
/// first a yaw around Y, then a pitch around X, then a roll
/// around Z.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Transform {
    /// The model-to-world matrix, composing scale, then
    /// rotation, then translation.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_euler(
                EulerRot::YXZ,
                self.rotation.y,
                self.rotation.x,
                self.rotation.z,
            )
            * Mat4::from_scale(self.scale)
    }

    /// The matrix transforming normals to world space: the
    /// rotation combined with the inverse scale (the inverse
    /// transpose of the model matrix's linear part), so that
    /// normals stay perpendicular under non-uniform scaling.
    /// Padded to a 4x4 to satisfy shader alignment rules.
    pub fn normal_matrix(&self) -> Mat4 {
        let rotation = Mat3::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        );

        Mat4::from_mat3(rotation * Mat3::from_diagonal(self.scale.recip()))
    }
}

/// Anything that lives in the scene: a transform, a flat
/// color, and optionally a mesh to render. Models are shared
/// between objects through reference counting.
pub struct GameObject {
    id: ObjectId,
    pub model: Option<Rc<Model>>,
    pub color: Vec3,
    pub transform: Transform,
}

impl GameObject {
    pub fn new(ids: &mut IdAllocator) -> Self {
        Self {
            id: ids.allocate(),
            model: None,
            color: Vec3::ZERO,
            transform: Transform::default(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn ids_are_sequential_per_allocator() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), 0);
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);

        // A fresh allocator starts over; uniqueness is scoped
        // to the scene that owns it.
        let mut other = IdAllocator::new();
        assert_eq!(other.allocate(), 0);
    }

    #[test]
    fn default_transform_is_identity() {
        let transform = Transform::default();
        assert_eq!(transform.model_matrix(), Mat4::IDENTITY);
        assert_eq!(transform.normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn model_matrix_scales_before_translating() {
        let transform = Transform {
            translation: vec3(1.0, 0.0, 0.0),
            scale: vec3(2.0, 2.0, 2.0),
            rotation: Vec3::ZERO,
        };

        close(
            transform.model_matrix().transform_point3(Vec3::X),
            vec3(3.0, 0.0, 0.0),
        );
    }

    #[test]
    fn normal_matrix_ignores_translation_and_undoes_scale() {
        let transform = Transform {
            translation: vec3(5.0, -3.0, 1.0),
            scale: vec3(2.0, 4.0, 1.0),
            rotation: Vec3::ZERO,
        };

        // A normal along Y on a surface stretched 4x along Y
        // must shrink, not stretch, to stay perpendicular.
        close(
            transform.normal_matrix().transform_vector3(Vec3::Y),
            vec3(0.0, 0.25, 0.0),
        );
    }

    #[test]
    fn rotation_applies_yaw_around_y() {
        let transform = Transform {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: vec3(0.0, std::f32::consts::FRAC_PI_2, 0.0),
        };

        // Yawing a quarter turn takes +Z to +X.
        close(
            transform.model_matrix().transform_vector3(Vec3::Z),
            vec3(1.0, 0.0, 0.0),
        );
    }
}
