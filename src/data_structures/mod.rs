//! Engine data structures.
//!
//! - `asset` holds the plain tables a glTF document is resolved into
//! - `scene_graph` walks those tables and issues the draws

pub mod asset;
pub mod scene_graph;
