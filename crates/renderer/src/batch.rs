//! Per-texture vertex batching.
//!
//! Tiles are accumulated into fixed-capacity vertex arrays keyed by texture id
//! (one opaque and one alpha array per id) and handed to a [`BatchSink`] when a
//! batch fills or at frame end. Grass shares a single array because every tuft
//! samples the same sprite atlas.

use std::collections::HashSet;

use crate::metrics::FrameMetrics;
use crate::vertex::{TerrainVertex, QUAD_VERTICES};

/// Texture slot index. At most 256 distinct ids exist.
pub type TextureId = u8;

/// Number of addressable texture slots.
pub const TEXTURE_SLOTS: usize = 256;

/// Default per-texture capacity, in vertices.
pub const DEFAULT_TILE_BATCH_VERTICES: usize = QUAD_VERTICES * 512;

/// Default grass batch capacity, in vertices.
pub const DEFAULT_GRASS_BATCH_VERTICES: usize = QUAD_VERTICES * 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    Alpha,
}

/// Receiver of finished batches (the GPU, or a recorder in tests).
pub trait BatchSink {
    /// Draw `vertices` as a triangle list with `texture`. Returns `false` when
    /// the texture cannot be resolved and nothing was drawn.
    fn submit(&mut self, texture: TextureId, blend: BlendMode, vertices: &[TerrainVertex]) -> bool;

    /// Restore opaque blend state after the alpha pass.
    fn reset_blend(&mut self) {}
}

/// Fixed-capacity vertex array owned by one texture id.
///
/// Storage is allocated at most once, either at construction
/// ([`VertexBatch::preallocated`]) or on first push, and never grows past
/// `capacity`; flushing keeps it for the next frame.
///
/// Tile batches take the lazy route: there are two per texture slot and a
/// map only touches a handful of ids, so sizing all of them up front would
/// hold hundreds of megabytes that are never written.
#[derive(Debug, Clone)]
pub struct VertexBatch {
    texture: TextureId,
    vertices: Vec<TerrainVertex>,
    capacity: usize,
}

impl VertexBatch {
    /// `capacity` is rounded down to whole quads (at least one).
    pub fn new(texture: TextureId, capacity: usize) -> Self {
        let capacity = (capacity / QUAD_VERTICES).max(1) * QUAD_VERTICES;
        Self {
            texture,
            vertices: Vec::new(),
            capacity,
        }
    }

    /// Like [`VertexBatch::new`] with the storage reserved immediately.
    pub fn preallocated(texture: TextureId, capacity: usize) -> Self {
        let mut batch = Self::new(texture, capacity);
        batch.vertices.reserve_exact(batch.capacity);
        batch
    }

    /// Vertices the batch can hold without allocating.
    pub fn reserved(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_room(&self, count: usize) -> bool {
        self.vertices.len() + count <= self.capacity
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    /// Append without flushing. Returns `false` (and appends nothing) on overflow.
    pub fn push(&mut self, vertices: &[TerrainVertex]) -> bool {
        if !self.has_room(vertices.len()) {
            return false;
        }
        if self.vertices.capacity() == 0 {
            self.vertices.reserve_exact(self.capacity);
        }
        self.vertices.extend_from_slice(vertices);
        true
    }

    /// Hand the contents to `sink` and reset. Returns whether anything was drawn.
    pub fn flush(
        &mut self,
        blend: BlendMode,
        sink: &mut dyn BatchSink,
        metrics: &mut FrameMetrics,
    ) -> bool {
        if self.vertices.is_empty() {
            return false;
        }
        let drawn = sink.submit(self.texture, blend, &self.vertices);
        if drawn {
            metrics.record_draw(self.vertices.len());
        }
        self.vertices.clear();
        drawn
    }
}

/// Opaque and alpha batch sets indexed by texture id.
#[derive(Debug, Clone)]
pub struct TileBatches {
    opaque: Vec<VertexBatch>,
    alpha: Vec<VertexBatch>,
}

impl TileBatches {
    pub fn new(capacity: usize) -> Self {
        let make = || {
            (0..TEXTURE_SLOTS)
                .map(|id| VertexBatch::new(id as TextureId, capacity))
                .collect::<Vec<_>>()
        };
        Self {
            opaque: make(),
            alpha: make(),
        }
    }

    fn set_mut(&mut self, blend: BlendMode) -> &mut [VertexBatch] {
        match blend {
            BlendMode::Opaque => &mut self.opaque,
            BlendMode::Alpha => &mut self.alpha,
        }
    }

    pub fn batch(&self, texture: TextureId, blend: BlendMode) -> &VertexBatch {
        match blend {
            BlendMode::Opaque => &self.opaque[texture as usize],
            BlendMode::Alpha => &self.alpha[texture as usize],
        }
    }

    /// Append one tile quad. If it would overflow the texture's batch, that
    /// batch is flushed first. Returns `true` when a flush happened.
    pub fn add_tile(
        &mut self,
        texture: TextureId,
        blend: BlendMode,
        quad: &[TerrainVertex; QUAD_VERTICES],
        sink: &mut dyn BatchSink,
        metrics: &mut FrameMetrics,
    ) -> bool {
        let batch = &mut self.set_mut(blend)[texture as usize];
        let mut flushed = false;
        if !batch.has_room(QUAD_VERTICES) {
            batch.flush(blend, sink, metrics);
            flushed = true;
        }
        batch.push(quad);
        flushed
    }

    /// Flush one texture's batch now. Returns whether anything was drawn.
    pub fn flush_texture(
        &mut self,
        texture: TextureId,
        blend: BlendMode,
        sink: &mut dyn BatchSink,
        metrics: &mut FrameMetrics,
    ) -> bool {
        self.set_mut(blend)[texture as usize].flush(blend, sink, metrics)
    }

    /// Flush every non-empty batch: all opaque ids first, then all alpha ids,
    /// then restore opaque blend state.
    pub fn flush_all(&mut self, sink: &mut dyn BatchSink, metrics: &mut FrameMetrics) {
        for batch in self.opaque.iter_mut() {
            batch.flush(BlendMode::Opaque, sink, metrics);
        }
        for batch in self.alpha.iter_mut() {
            batch.flush(BlendMode::Alpha, sink, metrics);
        }
        sink.reset_blend();
    }

    pub fn pending_vertices(&self) -> usize {
        self.opaque.iter().chain(self.alpha.iter()).map(VertexBatch::len).sum()
    }
}

/// Single shared batch for grass tufts, sized once at construction.
#[derive(Debug, Clone)]
pub struct GrassBatch {
    batch: VertexBatch,
}

impl GrassBatch {
    pub fn new(texture: TextureId, capacity: usize) -> Self {
        Self {
            batch: VertexBatch::preallocated(texture, capacity),
        }
    }

    pub fn texture(&self) -> TextureId {
        self.batch.texture()
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Append one tuft, flushing first when full. Returns `true` on flush.
    pub fn add_tuft(
        &mut self,
        quad: &[TerrainVertex; QUAD_VERTICES],
        sink: &mut dyn BatchSink,
        metrics: &mut FrameMetrics,
    ) -> bool {
        let mut flushed = false;
        if !self.batch.has_room(QUAD_VERTICES) {
            self.flush(sink, metrics);
            flushed = true;
        }
        self.batch.push(quad);
        metrics.grass_tufts += 1;
        flushed
    }

    pub fn flush(&mut self, sink: &mut dyn BatchSink, metrics: &mut FrameMetrics) {
        if self.batch.is_empty() {
            return;
        }
        metrics.grass_flushes += 1;
        self.batch.flush(BlendMode::Alpha, sink, metrics);
        sink.reset_blend();
    }
}

/// One recorded submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub texture: TextureId,
    pub blend: BlendMode,
    pub vertex_count: usize,
}

/// In-memory sink that records submissions instead of drawing.
#[derive(Debug, Default)]
pub struct DrawRecorder {
    pub calls: Vec<DrawCall>,
    pub blend_resets: u32,
    missing: HashSet<TextureId>,
}

impl DrawRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `ids` as unresolved textures: their submissions are rejected.
    pub fn with_missing_textures(ids: impl IntoIterator<Item = TextureId>) -> Self {
        Self {
            missing: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.blend_resets = 0;
    }

    pub fn total_vertices(&self) -> usize {
        self.calls.iter().map(|c| c.vertex_count).sum()
    }
}

impl BatchSink for DrawRecorder {
    fn submit(&mut self, texture: TextureId, blend: BlendMode, vertices: &[TerrainVertex]) -> bool {
        if self.missing.contains(&texture) {
            return false;
        }
        self.calls.push(DrawCall {
            texture,
            blend,
            vertex_count: vertices.len(),
        });
        true
    }

    fn reset_blend(&mut self) {
        self.blend_resets += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn quad() -> [TerrainVertex; QUAD_VERTICES] {
        [TerrainVertex::new(Vec3::ZERO, [1.0; 4], Vec2::ZERO); QUAD_VERTICES]
    }

    #[test]
    fn overflow_triggers_exactly_one_flush_before_append() {
        let mut batches = TileBatches::new(QUAD_VERTICES * 2);
        let mut sink = DrawRecorder::new();
        let mut metrics = FrameMetrics::default();

        assert!(!batches.add_tile(3, BlendMode::Opaque, &quad(), &mut sink, &mut metrics));
        assert!(!batches.add_tile(3, BlendMode::Opaque, &quad(), &mut sink, &mut metrics));
        assert!(sink.calls.is_empty());

        assert!(batches.add_tile(3, BlendMode::Opaque, &quad(), &mut sink, &mut metrics));
        assert_eq!(sink.calls.len(), 1);
        assert_eq!(sink.calls[0].vertex_count, QUAD_VERTICES * 2);
        assert_eq!(batches.batch(3, BlendMode::Opaque).len(), QUAD_VERTICES);
    }

    #[test]
    fn batch_never_exceeds_capacity() {
        let mut batches = TileBatches::new(QUAD_VERTICES * 3);
        let mut sink = DrawRecorder::new();
        let mut metrics = FrameMetrics::default();
        for _ in 0..100 {
            batches.add_tile(9, BlendMode::Alpha, &quad(), &mut sink, &mut metrics);
            let batch = batches.batch(9, BlendMode::Alpha);
            assert!(batch.len() <= batch.capacity());
        }
        assert_eq!(sink.total_vertices() + batches.pending_vertices(), 100 * QUAD_VERTICES);
    }

    #[test]
    fn flush_all_draws_opaque_before_alpha_and_resets_blend() {
        let mut batches = TileBatches::new(DEFAULT_TILE_BATCH_VERTICES);
        let mut sink = DrawRecorder::new();
        let mut metrics = FrameMetrics::default();
        batches.add_tile(7, BlendMode::Alpha, &quad(), &mut sink, &mut metrics);
        batches.add_tile(200, BlendMode::Opaque, &quad(), &mut sink, &mut metrics);
        batches.add_tile(1, BlendMode::Opaque, &quad(), &mut sink, &mut metrics);

        batches.flush_all(&mut sink, &mut metrics);

        let order: Vec<(TextureId, BlendMode)> =
            sink.calls.iter().map(|c| (c.texture, c.blend)).collect();
        assert_eq!(
            order,
            vec![(1, BlendMode::Opaque), (200, BlendMode::Opaque), (7, BlendMode::Alpha)]
        );
        assert_eq!(sink.blend_resets, 1);
        assert_eq!(batches.pending_vertices(), 0);
        assert_eq!(metrics.draw_calls, 3);
        assert_eq!(metrics.triangles, 6);
    }

    #[test]
    fn unresolved_texture_is_skipped_and_not_counted() {
        let mut batches = TileBatches::new(DEFAULT_TILE_BATCH_VERTICES);
        let mut sink = DrawRecorder::with_missing_textures([4]);
        let mut metrics = FrameMetrics::default();
        batches.add_tile(4, BlendMode::Opaque, &quad(), &mut sink, &mut metrics);
        batches.flush_all(&mut sink, &mut metrics);
        assert!(sink.calls.is_empty());
        assert_eq!(metrics.draw_calls, 0);
        assert_eq!(batches.pending_vertices(), 0);
    }

    #[test]
    fn storage_is_allocated_once_and_kept_across_flushes() {
        let mut sink = DrawRecorder::new();
        let mut metrics = FrameMetrics::default();

        let mut grass = GrassBatch::new(40, QUAD_VERTICES * 4);
        assert_eq!(grass.batch.reserved(), QUAD_VERTICES * 4);
        grass.add_tuft(&quad(), &mut sink, &mut metrics);
        grass.flush(&mut sink, &mut metrics);
        assert_eq!(grass.batch.reserved(), QUAD_VERTICES * 4);

        let mut batches = TileBatches::new(QUAD_VERTICES * 2);
        assert_eq!(batches.batch(5, BlendMode::Opaque).reserved(), 0);
        for _ in 0..5 {
            batches.add_tile(5, BlendMode::Opaque, &quad(), &mut sink, &mut metrics);
        }
        batches.flush_all(&mut sink, &mut metrics);
        assert_eq!(batches.batch(5, BlendMode::Opaque).reserved(), QUAD_VERTICES * 2);
        assert_eq!(batches.batch(6, BlendMode::Opaque).reserved(), 0);
    }

    #[test]
    fn single_texture_flush_leaves_others_pending() {
        let mut batches = TileBatches::new(DEFAULT_TILE_BATCH_VERTICES);
        let mut sink = DrawRecorder::new();
        let mut metrics = FrameMetrics::default();
        batches.add_tile(2, BlendMode::Opaque, &quad(), &mut sink, &mut metrics);
        batches.add_tile(8, BlendMode::Opaque, &quad(), &mut sink, &mut metrics);

        assert!(batches.flush_texture(2, BlendMode::Opaque, &mut sink, &mut metrics));
        assert!(!batches.flush_texture(2, BlendMode::Opaque, &mut sink, &mut metrics));
        assert_eq!(sink.calls.len(), 1);
        assert_eq!(batches.pending_vertices(), QUAD_VERTICES);
    }

    #[test]
    fn grass_batch_flushes_when_full() {
        let mut grass = GrassBatch::new(40, QUAD_VERTICES);
        let mut sink = DrawRecorder::new();
        let mut metrics = FrameMetrics::default();
        assert!(!grass.add_tuft(&quad(), &mut sink, &mut metrics));
        assert!(grass.add_tuft(&quad(), &mut sink, &mut metrics));
        grass.flush(&mut sink, &mut metrics);
        assert_eq!(metrics.grass_flushes, 2);
        assert_eq!(metrics.grass_tufts, 2);
        assert!(sink.calls.iter().all(|c| c.texture == 40 && c.blend == BlendMode::Alpha));
        assert!(grass.is_empty());
    }
}
