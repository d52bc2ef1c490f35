//! Tunables of the renderer and the input controller.
//!
//! The defaults reproduce the reference look and feel; hosts override
//! individual fields before handing the config to [`crate::scene::Scene`] or
//! [`crate::input::InputController`].

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub clear_color: [f32; 4],
    /// Edge length of each shadow cube face in texels.
    pub shadow_map_size: u32,
    pub shadow_near: f32,
    /// Roughly the scene extent; geometry further from the light casts no shadow.
    pub shadow_far: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.1, 1.0],
            shadow_map_size: 1024,
            shadow_near: 0.1,
            shadow_far: 30.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InputConfig {
    /// Degrees per pixel of mouse movement.
    pub rotate_speed: f32,
    /// Units per second.
    pub light_speed: f32,
    /// Units per second squared.
    pub acceleration: f32,
    /// Deceleration factor applied on axes without input.
    pub drag: f32,
    pub max_velocity: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 0.05,
            light_speed: 3.0,
            acceleration: 15.0,
            drag: 15.0,
            max_velocity: 7.0,
        }
    }
}
