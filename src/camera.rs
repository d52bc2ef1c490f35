//! The viewer's camera.
//!
//! The world is Z-up. Yaw turns about Z, pitch tilts about the camera's X
//! axis and is limited to [`PITCH_LIMIT`] either way. Projections are built
//! the OpenGL way with cgmath and converted to wgpu's 0..1 depth range by
//! [`OPENGL_TO_WGPU_MATRIX`].

use cgmath::{Deg, Matrix4, Vector3, Zero};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub const PITCH_LIMIT: Deg<f32> = Deg(45.0);

/// Turns the Z-up world into the Y-up eye space projections expect.
pub fn axis_correction() -> Matrix4<f32> {
    Matrix4::from_angle_x(Deg(-90.0))
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vector3<f32>,
    pub pitch: Deg<f32>,
    pub yaw: Deg<f32>,
    pub velocity: Vector3<f32>,
    pub vertical_fov: Deg<f32>,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new<V: Into<Vector3<f32>>, F: Into<Deg<f32>>>(position: V, vertical_fov: F) -> Self {
        Self {
            position: position.into(),
            pitch: Deg(0.0),
            yaw: Deg(0.0),
            velocity: Vector3::zero(),
            vertical_fov: vertical_fov.into(),
            near: 0.1,
            far: 100.0,
        }
    }

    /// Adds to pitch and yaw, keeping pitch within [`PITCH_LIMIT`].
    pub fn look(&mut self, pitch: Deg<f32>, yaw: Deg<f32>) {
        self.pitch = Deg((self.pitch + pitch).0.clamp(-PITCH_LIMIT.0, PITCH_LIMIT.0));
        self.yaw += yaw;
    }

    /// The view transform without the translation.
    pub fn rotation_transform(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(self.pitch) * Matrix4::from_angle_z(self.yaw)
    }

    pub fn view_transform(&self) -> Matrix4<f32> {
        self.rotation_transform() * Matrix4::from_translation(-self.position)
    }

    pub fn projection_transform(&self, aspect: f32) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.vertical_fov, aspect, self.near, self.far)
    }

    /// Projection composed with [`axis_correction`], as fed to the shaders.
    pub fn world_projection(&self, aspect: f32) -> Matrix4<f32> {
        self.projection_transform(aspect) * axis_correction()
    }
}
