//! Table-driven sine and the per-tile wind field around the camera.

use std::f32::consts::TAU;
use std::time::Duration;

use rayon::prelude::*;

use crate::data::{tile_index, TERRAIN_SIZE, TERRAIN_TILE_COUNT};
use crate::settings::WindSettings;

/// Entries in the sine table, one per half degree.
pub const SIN_TABLE_SIZE: usize = 720;

/// Sine approximation by linear interpolation over a fixed table.
///
/// The table is built once and only read afterwards, so a single instance is
/// shared by reference across the wind worker threads.
#[derive(Debug, Clone)]
pub struct FastSin {
    table: Vec<f32>,
}

impl Default for FastSin {
    fn default() -> Self {
        Self::new()
    }
}

impl FastSin {
    pub fn new() -> Self {
        let table = (0..SIN_TABLE_SIZE)
            .map(|i| (i as f32 / SIN_TABLE_SIZE as f32 * TAU).sin())
            .collect();
        Self { table }
    }

    /// `sin(x)` for any finite `x`; non-finite input yields 0.
    #[inline]
    pub fn sin(&self, x: f32) -> f32 {
        if !x.is_finite() {
            return 0.0;
        }
        let pos = x.rem_euclid(TAU) / TAU * SIN_TABLE_SIZE as f32;
        let i = (pos as usize).min(SIN_TABLE_SIZE - 1);
        let frac = pos - i as f32;
        let a = self.table[i];
        let b = self.table[(i + 1) % SIN_TABLE_SIZE];
        a + (b - a) * frac
    }

    #[inline]
    pub fn cos(&self, x: f32) -> f32 {
        self.sin(x + TAU * 0.25)
    }
}

/// Per-tile wind scalar, refreshed only in a window around the camera.
#[derive(Debug, Clone)]
pub struct WindCache {
    values: Vec<f32>,
    phase: f32,
    last_update: Option<Duration>,
    updates: u64,
}

impl Default for WindCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WindCache {
    pub fn new() -> Self {
        Self {
            values: vec![0.0; TERRAIN_TILE_COUNT],
            phase: 0.0,
            last_update: None,
            updates: 0,
        }
    }

    /// Phase used by the most recent region update.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Number of region updates performed so far.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Wind value at a tile (wrapping).
    #[inline]
    pub fn value(&self, x: i32, y: i32) -> f32 {
        self.values[tile_index(x, y)]
    }

    /// Forget all state; the next update always runs.
    pub fn reset(&mut self) {
        self.values.fill(0.0);
        self.phase = 0.0;
        self.last_update = None;
    }

    /// Recompute the window of `settings.radius_tiles` around `center` when
    /// the interval has elapsed and the phase has moved past the epsilon.
    /// The first call always updates. Returns whether anything was written.
    pub fn update(
        &mut self,
        center: (i32, i32),
        elapsed: Duration,
        settings: &WindSettings,
        sin: &FastSin,
    ) -> bool {
        let phase = elapsed.as_secs_f32() * settings.speed;
        if let Some(last) = self.last_update {
            if elapsed.saturating_sub(last) < Duration::from_millis(settings.interval_ms) {
                return false;
            }
            if (phase - self.phase).abs() <= settings.phase_epsilon {
                return false;
            }
        }

        let max = TERRAIN_SIZE as i32 - 1;
        let x0 = center.0.saturating_sub(settings.radius_tiles).clamp(0, max) as usize;
        let x1 = center.0.saturating_add(settings.radius_tiles).clamp(0, max) as usize;
        let y0 = center.1.saturating_sub(settings.radius_tiles).clamp(0, max) as usize;
        let y1 = center.1.saturating_add(settings.radius_tiles).clamp(0, max) as usize;

        let amplitude = settings.amplitude;
        let freq = settings.spatial_frequency;
        self.values[y0 * TERRAIN_SIZE..(y1 + 1) * TERRAIN_SIZE]
            .par_chunks_mut(TERRAIN_SIZE)
            .enumerate()
            .for_each(|(dy, row)| {
                let y = (y0 + dy) as f32;
                for (x, value) in row.iter_mut().enumerate().take(x1 + 1).skip(x0) {
                    let gust = sin.sin(phase + (x as f32 * 0.7 + y * 0.3) * freq);
                    let ripple = sin.sin(phase * 1.7 + y * freq * 0.5);
                    *value = amplitude * (gust * 0.75 + ripple * 0.25);
                }
            });

        self.phase = phase;
        self.last_update = Some(elapsed);
        self.updates += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_sin_tracks_sin() {
        let fast = FastSin::new();
        let mut x = -20.0;
        while x < 20.0 {
            assert!((fast.sin(x) - x.sin()).abs() < 1e-3, "x = {x}");
            assert!((fast.cos(x) - x.cos()).abs() < 1e-3, "x = {x}");
            x += 0.137;
        }
    }

    #[test]
    fn fast_sin_of_non_finite_is_zero() {
        let fast = FastSin::new();
        assert_eq!(fast.sin(f32::NAN), 0.0);
        assert_eq!(fast.sin(f32::INFINITY), 0.0);
    }

    #[test]
    fn update_is_throttled_by_interval() {
        let sin = FastSin::new();
        let settings = WindSettings::default();
        let mut wind = WindCache::new();

        assert!(wind.update((128, 128), Duration::from_millis(5), &settings, &sin));
        assert!(!wind.update((128, 128), Duration::from_millis(20), &settings, &sin));
        assert!(wind.update((128, 128), Duration::from_millis(40), &settings, &sin));
        assert_eq!(wind.update_count(), 2);
    }

    #[test]
    fn update_skipped_when_phase_is_still() {
        let sin = FastSin::new();
        let settings = WindSettings {
            speed: 0.0,
            ..WindSettings::default()
        };
        let mut wind = WindCache::new();
        assert!(wind.update((10, 10), Duration::ZERO, &settings, &sin));
        assert!(!wind.update((10, 10), Duration::from_secs(3), &settings, &sin));
    }

    #[test]
    fn only_window_around_camera_is_written() {
        let sin = FastSin::new();
        let settings = WindSettings {
            radius_tiles: 4,
            ..WindSettings::default()
        };
        let mut wind = WindCache::new();
        wind.update((100, 100), Duration::from_millis(700), &settings, &sin);

        let inside = (96..=104)
            .flat_map(|y| (96..=104).map(move |x| (x, y)))
            .any(|(x, y)| wind.value(x, y) != 0.0);
        assert!(inside);
        assert_eq!(wind.value(90, 100), 0.0);
        assert_eq!(wind.value(100, 105), 0.0);
        for y in 96..=104 {
            for x in 96..=104 {
                assert!(wind.value(x, y).abs() <= settings.amplitude + 1e-5);
            }
        }
    }

    #[test]
    fn window_clamps_at_grid_edge() {
        let sin = FastSin::new();
        let mut wind = WindCache::new();
        assert!(wind.update((0, 255), Duration::from_millis(300), &WindSettings::default(), &sin));
        // Nothing wraps to the far side.
        assert_eq!(wind.value(200, 255), 0.0);
    }

    #[test]
    fn extreme_centers_clamp_without_overflow() {
        let sin = FastSin::new();
        let settings = WindSettings::default();
        let mut wind = WindCache::new();
        assert!(wind.update((i32::MAX, i32::MIN), Duration::ZERO, &settings, &sin));
        assert!(wind.update((i32::MIN, i32::MAX), Duration::from_secs(1), &settings, &sin));
        assert_eq!(wind.value(128, 128), 0.0);
    }
}
