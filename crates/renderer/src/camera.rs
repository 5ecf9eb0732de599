//! Camera, view frustum and the per-frame camera context handed to the terrain.

use bytemuck::{Pod, Zeroable};
use engine_core::Transform;
use glam::{Mat4, Quat, Vec3, Vec4};

/// Free-look camera over a Z-up world.
///
/// Position changes are tracked by the consumer through displacement; anything
/// that changes the frustum without moving the eye (rotation, projection)
/// bumps `revision` so visibility caches can notice it.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera transform (position and rotation).
    pub transform: Transform,
    /// Field of view in degrees.
    fov_degrees: f32,
    /// Near clipping plane.
    near: f32,
    /// Far clipping plane.
    far: f32,
    /// Aspect ratio (width / height).
    aspect: f32,
    /// Current pitch (up/down rotation) in radians.
    pitch: f32,
    /// Current yaw (rotation around +Z) in radians.
    yaw: f32,
    revision: u64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov_degrees: 60.0,
            near: 10.0,
            far: 4000.0,
            aspect: 16.0 / 9.0,
            pitch: 0.0,
            yaw: 0.0,
            revision: 0,
        }
    }
}

impl Camera {
    /// Create a new camera at the given position.
    pub fn new(position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
            ..Default::default()
        }
    }

    /// Update aspect ratio (call on target resize).
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
        self.revision += 1;
    }

    /// Set the far clipping plane.
    pub fn set_far(&mut self, far: f32) {
        self.far = far.max(self.near + 1.0);
        self.revision += 1;
    }

    /// Set the vertical field of view in degrees.
    pub fn set_fov_degrees(&mut self, fov: f32) {
        self.fov_degrees = fov.clamp(1.0, 179.0);
        self.revision += 1;
    }

    /// Move the eye. Does not bump the revision.
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    /// Set yaw and pitch directly (in radians) and rebuild rotation.
    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.001;
        self.pitch = pitch.clamp(-max_pitch, max_pitch);
        self.transform.rotation = Quat::from_rotation_z(self.yaw) * Quat::from_rotation_x(self.pitch);
        self.revision += 1;
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.transform.position, self.transform.forward(), self.transform.up())
    }

    /// Get the projection matrix (0..1 depth range).
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get camera position.
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Get camera forward direction.
    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Snapshot the camera into the immutable per-frame context.
    pub fn view_context(&self) -> CameraView {
        CameraView::new(
            self.position(),
            self.view_matrix(),
            self.projection_matrix(),
            self.far,
            self.revision,
        )
    }
}

/// Immutable camera state for one frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub far: f32,
    pub frustum: Frustum,
    /// Orientation/projection revision of the source camera.
    pub revision: u64,
}

impl CameraView {
    pub fn new(position: Vec3, view: Mat4, projection: Mat4, far: f32, revision: u64) -> Self {
        let view_projection = projection * view;
        Self {
            position,
            view,
            projection,
            view_projection,
            far,
            frustum: Frustum::from_view_projection(&view_projection),
            revision,
        }
    }
}

/// Six clip planes, each `(n, d)` with `n·p + d >= 0` on the inside.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from a view-projection matrix with a 0..1 depth range.
    pub fn from_view_projection(m: &Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        let planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near
            r3 - r2, // far
        ]
        .map(normalize_plane);
        Self { planes }
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.truncate().dot(p) + plane.w >= 0.0)
    }

    /// False only when the box lies entirely outside one of the planes.
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        for plane in &self.planes {
            let positive = Vec3::new(
                if plane.x >= 0.0 { max.x } else { min.x },
                if plane.y >= 0.0 { max.y } else { min.y },
                if plane.z >= 0.0 { max.z } else { min.z },
            );
            if plane.truncate().dot(positive) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.truncate().length();
    if len > f32::EPSILON {
        plane / len
    } else {
        plane
    }
}

/// Camera uniform data for GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub position: [f32; 4], // w unused, padding
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            position: [0.0; 4],
        }
    }

    pub fn update(&mut self, view: &CameraView) {
        self.view_proj = view.view_projection.to_cols_array_2d();
        let pos = view.position;
        self.position = [pos.x, pos.y, pos.z, 1.0];
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_north() -> Camera {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 100.0));
        camera.set_yaw_pitch(0.0, 0.0);
        camera
    }

    #[test]
    fn point_ahead_is_inside_frustum() {
        let view = looking_north().view_context();
        assert!(view.frustum.contains_point(Vec3::new(0.0, 500.0, 100.0)));
        assert!(!view.frustum.contains_point(Vec3::new(0.0, -500.0, 100.0)));
    }

    #[test]
    fn box_behind_camera_is_culled() {
        let view = looking_north().view_context();
        assert!(!view.frustum.intersects_aabb(
            Vec3::new(-50.0, -900.0, 0.0),
            Vec3::new(50.0, -800.0, 200.0)
        ));
    }

    #[test]
    fn box_straddling_a_plane_is_kept() {
        let view = looking_north().view_context();
        // Spans from behind the eye to well in front of it.
        assert!(view.frustum.intersects_aabb(
            Vec3::new(-50.0, -100.0, 0.0),
            Vec3::new(50.0, 300.0, 200.0)
        ));
    }

    #[test]
    fn box_past_far_plane_is_culled() {
        let view = looking_north().view_context();
        let far = view.far;
        assert!(!view.frustum.intersects_aabb(
            Vec3::new(-50.0, far + 100.0, 0.0),
            Vec3::new(50.0, far + 200.0, 200.0)
        ));
    }

    #[test]
    fn rotation_bumps_revision_but_movement_does_not() {
        let mut camera = looking_north();
        let before = camera.revision();
        camera.set_position(Vec3::new(10.0, 10.0, 100.0));
        assert_eq!(camera.revision(), before);
        camera.set_yaw_pitch(0.5, -0.3);
        assert_eq!(camera.revision(), before + 1);
    }

    #[test]
    fn downward_camera_sees_ground_below() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 1000.0));
        camera.set_yaw_pitch(0.0, -std::f32::consts::FRAC_PI_2);
        let view = camera.view_context();
        assert!(view.frustum.contains_point(Vec3::new(0.0, 0.0, 0.0)));
        assert!(!view.frustum.contains_point(Vec3::new(0.0, 0.0, 2000.0)));
    }
}
