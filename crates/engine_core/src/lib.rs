//! Core engine types shared by the terrain workspace.
//!
//! This crate provides the foundational types used across all engine systems:
//! - Transform and spatial orientation (Z-up world)
//! - Frame time management

pub mod time;
pub mod transform;

pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
