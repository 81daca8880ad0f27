use glam::{EulerRot, Mat3, Mat4, Vec3};

// The world follows Vulkan's screen conventions: the Y axis
// points down, and depth runs from 0 (near) to 1 (far). glam's
// left-handed projection helpers produce exactly these
// matrices, as long as "up" is handed to them flipped.
const UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// A camera as a pair of matrices: the view transform (world
/// to camera space) and the projection (camera space to clip
/// space). Both default to identity, and each setter fully
/// replaces its matrix, so the camera can be reconfigured
/// every frame (to follow the window's aspect ratio, for
/// example) at no cost.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// An orthographic projection mapping the axis-aligned box
    /// to clip space without perspective. Note the argument
    /// order: top comes before bottom, and maps to -1, since
    /// the vertical axis points down.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Mat4::orthographic_lh(left, right, top, bottom, near, far);
    }

    /// A perspective projection from a vertical field of view
    /// (in radians) and a width-to-height aspect ratio, with
    /// depth mapped to 0 at the near plane and 1 at the far
    /// plane.
    pub fn set_perspective_projection(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Mat4::perspective_lh(fovy, aspect, near, far);
    }

    /// Points the camera from a position along a direction.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3) {
        self.view = Mat4::look_to_lh(position, direction, -UP);
    }

    /// Points the camera from a position towards a target
    /// point.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3) {
        self.set_view_direction(position, target - position);
    }

    /// Builds the view from a position and a set of YXZ
    /// Tait-Bryan angles, the rotation convention used by the
    /// object transforms; the view matrix is the inverse of
    /// the camera's own model matrix, so the rotation is
    /// transposed and the translation negated.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let inverse = Mat3::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z)
            .transpose();

        let mut view = Mat4::from_mat3(inverse);
        view.w_axis = (inverse * -position).extend(1.0);
        self.view = view;
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
    fn perspective_depth_spans_zero_to_one() {
        let mut camera = Camera::default();
        camera.set_perspective_projection(1.0, 16.0 / 9.0, 0.1, 10.0);

        let near = camera.projection().project_point3(vec3(0.0, 0.0, 0.1));
        let far = camera.projection().project_point3(vec3(0.0, 0.0, 10.0));

        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn orthographic_maps_the_box_corners() {
        let mut camera = Camera::default();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 4.0);

        // Top of the box (the third argument) lands at -1, the
        // top of the screen with the Y axis pointing down.
        let top_left = camera.projection().project_point3(vec3(-2.0, -1.0, 0.0));
        close(top_left, vec3(-1.0, -1.0, 0.0));

        let bottom_right = camera.projection().project_point3(vec3(2.0, 1.0, 4.0));
        close(bottom_right, vec3(1.0, 1.0, 1.0));
    }

    #[test]
    fn view_target_moves_the_target_in_front() {
        let mut camera = Camera::default();
        camera.set_view_target(vec3(0.0, 0.0, -2.0), Vec3::ZERO);

        // The camera sits two units behind the origin looking
        // at it, so the origin ends up two units down the view
        // space depth axis.
        close(camera.view().transform_point3(Vec3::ZERO), vec3(0.0, 0.0, 2.0));
        close(camera.view().transform_point3(vec3(0.0, 0.0, -2.0)), Vec3::ZERO);
    }

    #[test]
    fn view_yxz_with_no_rotation_is_a_translation() {
        let mut camera = Camera::default();
        camera.set_view_yxz(vec3(1.0, 2.0, 3.0), Vec3::ZERO);

        close(camera.view().transform_point3(vec3(1.0, 2.0, 3.0)), Vec3::ZERO);
    }

    #[test]
    fn view_yxz_matches_view_direction() {
        // A yaw of pi/2 around the Y axis turns the camera
        // from +Z towards +X.
        let position = vec3(0.5, -1.0, 2.0);

        let mut yxz = Camera::default();
        yxz.set_view_yxz(position, vec3(0.0, std::f32::consts::FRAC_PI_2, 0.0));

        let mut direction = Camera::default();
        direction.set_view_direction(position, vec3(1.0, 0.0, 0.0));

        let probe = vec3(0.3, 0.7, -1.2);
        close(
            yxz.view().transform_point3(probe),
            direction.view().transform_point3(probe),
        );
    }
}
