//! Keyboard and mouse driven movement of the camera and the light.
//!
//! Input sampling is the host's job; it hands the controller the set of held
//! [`Key`]s and the accumulated mouse delta once per frame.

use std::collections::HashSet;

use cgmath::{Deg, InnerSpace, Matrix3, Vector2, Vector3, Zero};

use crate::{camera::Camera, config::InputConfig, light::Light};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    I,
    J,
    K,
    L,
    U,
    O,
}

/// Light movement keys and their world-space directions.
const LIGHT_KEYS: [(Key, [f32; 3]); 6] = [
    (Key::I, [0.0, 1.0, 0.0]),
    (Key::J, [-1.0, 0.0, 0.0]),
    (Key::K, [0.0, -1.0, 0.0]),
    (Key::L, [1.0, 0.0, 0.0]),
    (Key::U, [0.0, 0.0, -1.0]),
    (Key::O, [0.0, 0.0, 1.0]),
];

/// Camera movement keys and their camera-space directions.
const CAMERA_KEYS: [(Key, [f32; 3]); 6] = [
    (Key::W, [0.0, 1.0, 0.0]),
    (Key::A, [-1.0, 0.0, 0.0]),
    (Key::S, [0.0, -1.0, 0.0]),
    (Key::D, [1.0, 0.0, 0.0]),
    (Key::Q, [0.0, 0.0, -1.0]),
    (Key::E, [0.0, 0.0, 1.0]),
];

fn held_direction(keys: &HashSet<Key>, map: &[(Key, [f32; 3])]) -> Option<Vector3<f32>> {
    map.iter()
        .filter(|(key, _)| keys.contains(key))
        .map(|(_, direction)| Vector3::from(*direction))
        .reduce(|sum, direction| sum + direction)
}

#[derive(Copy, Clone, Debug, Default)]
pub struct InputController {
    pub config: InputConfig,
}

impl InputController {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Advances camera and light by `dt` seconds.
    ///
    /// The light is marked dirty on every frame a light key is held, even if
    /// opposing keys cancel out.
    pub fn update(
        &self,
        camera: &mut Camera,
        light: &mut Light,
        keys: &HashSet<Key>,
        mouse_delta: Vector2<f32>,
        dt: f32,
    ) {
        let config = &self.config;
        camera.look(
            Deg(config.rotate_speed * mouse_delta.y),
            Deg(config.rotate_speed * mouse_delta.x),
        );

        if let Some(direction) = held_direction(keys, &LIGHT_KEYS) {
            light.translate(direction * config.light_speed * dt);
        }

        let mut accel = held_direction(keys, &CAMERA_KEYS).unwrap_or_else(Vector3::zero)
            * config.acceleration;
        // drag works in camera space so it only brakes the axes without input
        let drag = Matrix3::from_angle_z(camera.yaw) * (-camera.velocity * config.drag);
        if accel.x == 0.0 {
            accel.x = drag.x;
        }
        if accel.y == 0.0 {
            accel.y = drag.y;
        }
        if accel.z == 0.0 {
            accel.z = drag.z;
        }

        camera.velocity += Matrix3::from_angle_z(-camera.yaw) * (accel * dt);
        if camera.velocity.magnitude() > config.max_velocity {
            camera.velocity = camera.velocity.normalize_to(config.max_velocity);
        }
        camera.position += camera.velocity * dt;
    }
}
