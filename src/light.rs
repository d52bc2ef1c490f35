//! The scene's point light.
//!
//! The light owns the shadow invalidation flag. Every position write marks
//! the shadow map dirty, including writes that do not change the value; only
//! a completed shadow pass clears it.

use cgmath::Vector3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    position: Vector3<f32>,
    pub intensity: f32,
    needs_shadow_render: bool,
}

impl Light {
    /// A new light always needs its first shadow pass.
    pub fn new<V: Into<Vector3<f32>>>(position: V, intensity: f32) -> Self {
        Self {
            position: position.into(),
            intensity,
            needs_shadow_render: true,
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position<V: Into<Vector3<f32>>>(&mut self, position: V) {
        self.position = position.into();
        self.needs_shadow_render = true;
    }

    pub fn translate(&mut self, delta: Vector3<f32>) {
        self.set_position(self.position + delta);
    }

    pub fn needs_shadow_render(&self) -> bool {
        self.needs_shadow_render
    }

    /// Forces a shadow pass on the next frame without moving the light.
    pub fn invalidate_shadow(&mut self) {
        self.needs_shadow_render = true;
    }

    pub(crate) fn mark_shadow_rendered(&mut self) {
        self.needs_shadow_render = false;
    }
}
