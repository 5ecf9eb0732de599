//! Tile-based terrain engine: data store, block cache, visibility/LOD,
//! batching of tiles and grass, wind and dynamic lighting.

pub mod blocks;
pub mod data;
pub mod engine;
pub mod error;
pub mod grass;
pub mod lights;
pub mod settings;
pub mod tiles;
pub mod visibility;
pub mod wind;

pub use blocks::*;
pub use data::*;
pub use engine::*;
pub use error::*;
pub use grass::*;
pub use lights::*;
pub use settings::*;
pub use tiles::*;
pub use visibility::*;
pub use wind::*;
