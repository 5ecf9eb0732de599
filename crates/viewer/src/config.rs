//! Viewer configuration. Loaded from viewer.ron at startup.

use serde::{Deserialize, Serialize};
use terrain::TerrainSettings;

/// Settings for one headless flight over a synthesized map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Offscreen target size in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Frames to render before exiting.
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Seed for the map noise and light placement.
    #[serde(default)]
    pub seed: u64,
    /// Eye height above the ground.
    #[serde(default = "default_camera_height")]
    pub camera_height: f32,
    /// World units per second along +X.
    #[serde(default = "default_fly_speed")]
    pub fly_speed: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    /// Directory holding the tile images; solid colors are used for anything missing.
    #[serde(default)]
    pub texture_dir: Option<String>,
    #[serde(default = "default_light_count")]
    pub light_count: usize,
    /// Log a metrics line every this many frames.
    #[serde(default = "default_log_every")]
    pub log_every: u32,
    #[serde(default)]
    pub terrain: TerrainSettings,
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_frames() -> u32 {
    600
}
fn default_camera_height() -> f32 {
    900.0
}
fn default_fly_speed() -> f32 {
    400.0
}
fn default_far() -> f32 {
    4000.0
}
fn default_light_count() -> usize {
    48
}
fn default_log_every() -> u32 {
    60
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frames: default_frames(),
            seed: 0,
            camera_height: default_camera_height(),
            fly_speed: default_fly_speed(),
            far: default_far(),
            texture_dir: None,
            light_count: default_light_count(),
            log_every: default_log_every(),
            terrain: TerrainSettings::default(),
        }
    }
}

impl ViewerConfig {
    /// Load config from `viewer.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(data) => match ron::from_str(&data) {
                Ok(c) => return c,
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            },
            Err(e) => log::warn!("No config at {:?} ({}), using defaults", path, e),
        }
        Self::default()
    }
}

fn config_path() -> std::path::PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join("viewer.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_terrain_settings_override_defaults() {
        let config: ViewerConfig =
            ron::from_str("(frames: 10, terrain: (block_size: 8, lod: (move_threshold: 64.0)))")
                .unwrap();
        assert_eq!(config.frames, 10);
        assert_eq!(config.width, 1280);
        assert_eq!(config.terrain.block_size, 8);
        assert_eq!(config.terrain.lod.move_threshold, 64.0);
        assert_eq!(config.terrain.tile_scale, 100.0);
    }
}
