//! Terrain setup errors.
//!
//! Only initialization can fail; the per-frame pipeline degrades instead.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TerrainError {
    #[error("block size {block} does not evenly divide terrain size {terrain}")]
    InvalidBlockSize { terrain: usize, block: usize },
    #[error("{layer} map has {actual} entries, expected {expected}")]
    MapSizeMismatch {
        layer: &'static str,
        expected: usize,
        actual: usize,
    },
}
