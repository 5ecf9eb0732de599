//! Static block decomposition of the tile grid with precomputed bounds.

use glam::Vec3;

use crate::data::{tile_index, TerrainData, TERRAIN_SIZE};
use crate::error::TerrainError;

/// A `block_size × block_size` tile patch.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainBlock {
    /// Tile coordinates of the block's first tile.
    pub origin: (i32, i32),
    pub min: Vec3,
    pub max: Vec3,
    pub min_height: f32,
    pub max_height: f32,
    pub center: Vec3,
    /// Transient, written by the visibility pass.
    pub lod: u32,
    pub visible: bool,
}

/// Fixed grid of blocks, created once per block size.
#[derive(Debug, Clone)]
pub struct BlockGrid {
    block_size: usize,
    blocks_per_side: usize,
    blocks: Vec<TerrainBlock>,
}

impl BlockGrid {
    /// Fails fast when the terrain side is not a multiple of `block_size`.
    pub fn new(block_size: usize, tile_scale: f32) -> Result<Self, TerrainError> {
        if block_size == 0 || TERRAIN_SIZE % block_size != 0 {
            return Err(TerrainError::InvalidBlockSize {
                terrain: TERRAIN_SIZE,
                block: block_size,
            });
        }
        let blocks_per_side = TERRAIN_SIZE / block_size;
        let span = block_size as f32 * tile_scale;
        let mut blocks = Vec::with_capacity(blocks_per_side * blocks_per_side);
        for by in 0..blocks_per_side {
            for bx in 0..blocks_per_side {
                let min = Vec3::new(bx as f32 * span, by as f32 * span, 0.0);
                let max = min + Vec3::new(span, span, 0.0);
                blocks.push(TerrainBlock {
                    origin: ((bx * block_size) as i32, (by * block_size) as i32),
                    min,
                    max,
                    min_height: 0.0,
                    max_height: 0.0,
                    center: (min + max) * 0.5,
                    lod: 0,
                    visible: false,
                });
            }
        }
        Ok(Self {
            block_size,
            blocks_per_side,
            blocks,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn blocks_per_side(&self) -> usize {
        self.blocks_per_side
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    fn slot(&self, bx: i32, by: i32) -> Option<usize> {
        let side = self.blocks_per_side as i32;
        if bx < 0 || by < 0 || bx >= side || by >= side {
            return None;
        }
        Some(by as usize * self.blocks_per_side + bx as usize)
    }

    pub fn get(&self, bx: i32, by: i32) -> Option<&TerrainBlock> {
        self.slot(bx, by).map(|i| &self.blocks[i])
    }

    pub fn get_mut(&mut self, bx: i32, by: i32) -> Option<&mut TerrainBlock> {
        self.slot(bx, by).map(move |i| &mut self.blocks[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TerrainBlock> {
        self.blocks.iter()
    }

    /// Rebuild every block's bounding box from the height field. Corner
    /// heights along the block's far edges come from the neighboring tiles
    /// (wrapping), matching the vertices the tile renderer emits.
    pub fn precompute_block_heights(&mut self, data: &TerrainData) {
        let bs = self.block_size as i32;
        let span = bs as f32 * data.geometry().tile_scale;
        for block in &mut self.blocks {
            let (ox, oy) = block.origin;
            let mut lo = f32::MAX;
            let mut hi = f32::MIN;
            for y in oy..=oy + bs {
                for x in ox..=ox + bs {
                    let h = data.render_height(tile_index(x, y));
                    lo = lo.min(h);
                    hi = hi.max(h);
                }
            }
            let base = Vec3::new(ox as f32 / bs as f32 * span, oy as f32 / bs as f32 * span, lo);
            block.min_height = lo;
            block.max_height = hi;
            block.min = base;
            block.max = Vec3::new(base.x + span, base.y + span, hi);
            block.center = (block.min + block.max) * 0.5;
        }
        log::debug!("Precomputed bounds for {} terrain blocks", self.blocks.len());
    }

    /// Clear the transient visibility state of every block.
    pub fn reset_visibility(&mut self) {
        for block in &mut self.blocks {
            block.visible = false;
            block.lod = 0;
        }
    }
}
