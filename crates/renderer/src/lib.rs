//! Terrain-facing rendering layer: camera context, vertex batching and the
//! `wgpu` pass that consumes the batches.

pub mod batch;
pub mod camera;
pub mod error;
pub mod metrics;
pub mod pass;
pub mod renderer;
pub mod texture;
pub mod vertex;

pub use batch::*;
pub use camera::*;
pub use error::*;
pub use metrics::*;
pub use pass::*;
pub use renderer::*;
pub use texture::*;
pub use vertex::*;
