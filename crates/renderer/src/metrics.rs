//! Per-frame diagnostics counters.

/// Counters reset at the start of every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameMetrics {
    /// Batches accepted by the sink (tile and grass).
    pub draw_calls: u32,
    pub triangles: u32,
    pub blocks_drawn: u32,
    pub tiles_drawn: u32,
    pub grass_flushes: u32,
    pub grass_tufts: u32,
    /// 1 when the visible-block queue was rebuilt this frame.
    pub visibility_recomputes: u32,
    pub active_lights: u32,
}

impl FrameMetrics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record one accepted submission of `vertex_count` vertices.
    pub fn record_draw(&mut self, vertex_count: usize) {
        self.draw_calls += 1;
        self.triangles += (vertex_count / 3) as u32;
    }
}
