//! Per-frame block culling and LOD assignment.

use std::collections::VecDeque;

use glam::Vec2;
use renderer::CameraView;

use crate::blocks::BlockGrid;
use crate::settings::LodSettings;

/// Full detail plus one coarse level.
pub const MAX_LOD_LEVELS: u32 = 2;

/// LOD level for a camera distance.
///
/// The integer level `floor(d / m)` is blended toward the next level by the
/// fractional remainder and rounded, which collapses to `round(d / m)`;
/// the result is clamped to `[0, levels - 1]`.
pub fn lod_level(distance: f32, multiplier: f32, levels: u32) -> u32 {
    if !(distance > 0.0) || !(multiplier > 0.0) || levels == 0 {
        return 0;
    }
    let scaled = distance / multiplier;
    let level = scaled.floor();
    let blended = level + (scaled - level);
    (blended.round() as u32).min(levels - 1)
}

/// Tile step used when rendering a block at `lod`.
pub fn lod_step(lod: u32, block_size: usize) -> usize {
    4usize.saturating_pow(lod).min(block_size).max(1)
}

/// Chooses which blocks to draw this frame and at what LOD.
///
/// The visible queue is only rebuilt when the camera has moved far enough,
/// its orientation or projection changed, or [`VisibilitySelector::invalidate`]
/// was called; between recomputes the previous queue is reused.
#[derive(Debug, Clone, Default)]
pub struct VisibilitySelector {
    last_position: Option<Vec2>,
    last_revision: u64,
    dirty: bool,
    visible: VecDeque<(i32, i32)>,
}

impl VisibilitySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a recompute on the next update.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn needs_recompute(&self, view: &CameraView, move_threshold: f32) -> bool {
        let Some(last) = self.last_position else {
            return true;
        };
        if self.dirty || view.revision != self.last_revision {
            return true;
        }
        let moved = view.position.truncate() - last;
        moved.length_squared() > move_threshold * move_threshold
    }

    /// Rebuild the visible queue if needed. Returns whether it was rebuilt.
    pub fn update(
        &mut self,
        view: &CameraView,
        grid: &mut BlockGrid,
        settings: &LodSettings,
        tile_scale: f32,
    ) -> bool {
        if !self.needs_recompute(view, settings.move_threshold) {
            return false;
        }

        for &(bx, by) in &self.visible {
            if let Some(block) = grid.get_mut(bx, by) {
                block.visible = false;
            }
        }
        self.visible.clear();

        let eye = view.position.truncate();
        let radius = view.far * settings.view_far_multiplier;
        let radius_sq = radius * radius;
        let span = grid.block_size() as f32 * tile_scale;
        let side = grid.blocks_per_side() as i32;

        let reach = ((radius / span).ceil() as i32).saturating_add(settings.block_margin);
        let cx = (eye.x / span).floor() as i32;
        let cy = (eye.y / span).floor() as i32;
        let x0 = cx.saturating_sub(reach).clamp(0, side - 1);
        let x1 = cx.saturating_add(reach).clamp(0, side - 1);
        let y0 = cy.saturating_sub(reach).clamp(0, side - 1);
        let y1 = cy.saturating_add(reach).clamp(0, side - 1);

        for by in y0..=y1 {
            for bx in x0..=x1 {
                let Some(block) = grid.get_mut(bx, by) else {
                    continue;
                };
                let dist_sq = (block.center.truncate() - eye).length_squared();
                if dist_sq > radius_sq {
                    block.visible = false;
                    continue;
                }
                block.lod = lod_level(dist_sq.sqrt(), settings.distance_multiplier, settings.levels);
                block.visible = view.frustum.intersects_aabb(block.min, block.max);
                if block.visible {
                    self.visible.push_back((bx, by));
                }
            }
        }

        log::debug!(
            "Visibility recomputed: {} blocks in view around ({:.0}, {:.0})",
            self.visible.len(),
            eye.x,
            eye.y
        );

        self.last_position = Some(eye);
        self.last_revision = view.revision;
        self.dirty = false;
        true
    }

    /// Block coordinates queued for drawing, nearest-first is not guaranteed.
    pub fn visible_blocks(&self) -> &VecDeque<(i32, i32)> {
        &self.visible
    }

    /// Drop all state; the next update recomputes from scratch.
    pub fn reset(&mut self) {
        self.last_position = None;
        self.dirty = false;
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use renderer::Camera;

    fn looking_down(at: Vec3) -> Camera {
        let mut camera = Camera::new(at);
        camera.set_yaw_pitch(0.0, -std::f32::consts::FRAC_PI_2);
        camera
    }

    #[test]
    fn lod_is_monotonic_in_distance() {
        let mut prev = 0;
        for step in 0..2000 {
            let level = lod_level(step as f32 * 7.5, 3000.0, MAX_LOD_LEVELS);
            assert!(level >= prev);
            assert!(level < MAX_LOD_LEVELS);
            prev = level;
        }
    }

    #[test]
    fn lod_thresholds() {
        assert_eq!(lod_level(0.0, 3000.0, 2), 0);
        assert_eq!(lod_level(1400.0, 3000.0, 2), 0);
        assert_eq!(lod_level(1600.0, 3000.0, 2), 1);
        assert_eq!(lod_level(50_000.0, 3000.0, 2), 1);
        assert_eq!(lod_level(f32::NAN, 3000.0, 2), 0);
        assert_eq!(lod_step(0, 4), 1);
        assert_eq!(lod_step(1, 4), 4);
    }

    #[test]
    fn recompute_only_past_move_threshold() {
        let mut grid = BlockGrid::new(4, 100.0).unwrap();
        let settings = LodSettings::default();
        let mut selector = VisibilitySelector::new();
        let mut camera = looking_down(Vec3::new(5000.0, 5000.0, 1500.0));

        assert!(selector.update(&camera.view_context(), &mut grid, &settings, 100.0));
        assert!(!selector.visible_blocks().is_empty());

        camera.set_position(Vec3::new(5020.0, 5010.0, 1500.0));
        assert!(!selector.update(&camera.view_context(), &mut grid, &settings, 100.0));

        camera.set_position(Vec3::new(5040.0, 5000.0, 1500.0));
        assert!(selector.update(&camera.view_context(), &mut grid, &settings, 100.0));
    }

    #[test]
    fn rotation_and_invalidate_force_recompute() {
        let mut grid = BlockGrid::new(4, 100.0).unwrap();
        let settings = LodSettings::default();
        let mut selector = VisibilitySelector::new();
        let mut camera = looking_down(Vec3::new(5000.0, 5000.0, 1500.0));
        selector.update(&camera.view_context(), &mut grid, &settings, 100.0);

        camera.set_yaw_pitch(1.0, -0.5);
        assert!(selector.update(&camera.view_context(), &mut grid, &settings, 100.0));

        selector.invalidate();
        assert!(selector.update(&camera.view_context(), &mut grid, &settings, 100.0));
        assert!(!selector.update(&camera.view_context(), &mut grid, &settings, 100.0));
    }

    #[test]
    fn queue_matches_visible_flags() {
        let mut grid = BlockGrid::new(4, 100.0).unwrap();
        let settings = LodSettings::default();
        let mut selector = VisibilitySelector::new();
        let mut camera = looking_down(Vec3::new(3000.0, 3000.0, 1000.0));
        selector.update(&camera.view_context(), &mut grid, &settings, 100.0);

        camera.set_position(Vec3::new(20_000.0, 20_000.0, 1000.0));
        selector.update(&camera.view_context(), &mut grid, &settings, 100.0);

        let flagged = grid.iter().filter(|b| b.visible).count();
        assert_eq!(flagged, selector.visible_blocks().len());
        for &(bx, by) in selector.visible_blocks() {
            assert!(grid.get(bx, by).unwrap().visible);
        }
        // The block under the old position fell out of view.
        assert!(!grid.get(7, 7).unwrap().visible);
    }

    #[test]
    fn far_away_camera_selects_nothing() {
        let mut grid = BlockGrid::new(4, 100.0).unwrap();
        let settings = LodSettings {
            block_margin: i32::MAX,
            ..LodSettings::default()
        };
        let mut selector = VisibilitySelector::new();
        let camera = looking_down(Vec3::new(1.0e12, -1.0e12, 1500.0));
        assert!(selector.update(&camera.view_context(), &mut grid, &settings, 100.0));
        assert!(selector.visible_blocks().is_empty());
    }
}

