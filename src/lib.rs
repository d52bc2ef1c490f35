//! shadow-ngin
//!
//! A small real-time renderer for glTF scenes lit by a single point light with
//! omnidirectional shadows. Every frame is three passes: a depth cube map
//! around the light (re-rendered only when the light moved), a lit main pass
//! into an offscreen target and a full-screen composite onto the visible
//! framebuffer.
//!
//! High-level modules
//! - `context`: the GL-shaped [`context::RenderContext`] every pass is written against
//! - `backend`: the wgpu implementation of that context
//! - `shader`: named program cache with WGSL reflection
//! - `data_structures`: the in-memory asset model and the scene graph walker
//! - `resources`: glTF loading, image decoding and GPU upload
//! - `camera`, `light`, `input`: what moves between frames
//! - `pipelines`: shadow, main, post-process and skybox passes
//! - `scene`: owns all of the above and renders a frame
//! - `flow`: windowed host running a [`scene::Scene`]
//!

pub mod backend;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod input;
pub mod light;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod shader;

// Re-exports commonly used types for convenience in downstream code.
pub use backend::WgpuContext;
pub use camera::Camera;
pub use config::{InputConfig, SceneConfig};
pub use light::Light;
pub use render::SceneObject;
pub use resources::load_scene_asset;
pub use scene::Scene;
pub use cgmath;
