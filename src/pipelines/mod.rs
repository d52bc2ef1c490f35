//! The passes a frame is made of, in order: shadow cube map, main camera pass
//! into an offscreen target, full-screen composite to the visible target.

pub mod offscreen;
pub mod postproc;
pub mod shadow;
pub mod skybox;
