//! Immutable engine configuration.
//!
//! Handed to [`crate::TerrainEngine`] at construction and replaced wholesale
//! through `reload_settings`; nothing reads global toggles.

use renderer::{
    TextureId, DEFAULT_GRASS_BATCH_VERTICES, DEFAULT_TILE_BATCH_VERTICES, GRASS_SPRITE_TEXTURE,
    WATER_TEXTURE,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSettings {
    /// World units per tile.
    #[serde(default = "default_tile_scale")]
    pub tile_scale: f32,
    /// Tiles per block side.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Height returned for tiles flagged special-height, and the bonus added
    /// to their rendered corners.
    #[serde(default = "default_special_height")]
    pub special_height: f32,
    /// Ambient term added to every light sample, 0..255 per channel.
    #[serde(default)]
    pub ambient: [f32; 3],
    #[serde(default)]
    pub lod: LodSettings,
    #[serde(default)]
    pub grass: GrassSettings,
    #[serde(default)]
    pub water: WaterSettings,
    #[serde(default)]
    pub wind: WindSettings,
    #[serde(default)]
    pub lights: LightSettings,
    #[serde(default)]
    pub batching: BatchSettings,
}

fn default_tile_scale() -> f32 {
    100.0
}
fn default_block_size() -> usize {
    4
}
fn default_special_height() -> f32 {
    1200.0
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            tile_scale: default_tile_scale(),
            block_size: default_block_size(),
            special_height: default_special_height(),
            ambient: [0.0; 3],
            lod: LodSettings::default(),
            grass: GrassSettings::default(),
            water: WaterSettings::default(),
            wind: WindSettings::default(),
            lights: LightSettings::default(),
            batching: BatchSettings::default(),
        }
    }
}

/// Visibility and level-of-detail selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    /// World distance per LOD step.
    pub distance_multiplier: f32,
    /// Number of LOD levels; level 0 is full detail.
    pub levels: u32,
    /// Render radius = camera far plane × this.
    pub view_far_multiplier: f32,
    /// Extra blocks walked around the render rectangle.
    pub block_margin: i32,
    /// Planar camera displacement that triggers a visibility recompute.
    pub move_threshold: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            distance_multiplier: 3000.0,
            levels: crate::visibility::MAX_LOD_LEVELS,
            view_far_multiplier: 1.7,
            block_margin: 4,
            move_threshold: 32.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassSettings {
    pub enabled: bool,
    /// The current world suppresses grass regardless of tiles.
    pub excluded_world: bool,
    /// Sprite atlas texture.
    pub texture: TextureId,
    /// Tile texture ids that grow grass.
    pub bearing_textures: Vec<TextureId>,
    /// Distance bands: within `near` 6 tufts, `mid` 2, `far` 1, beyond 0.
    pub near: f32,
    pub mid: f32,
    pub far: f32,
    pub width: f32,
    pub height: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Maximum random yaw either way, in degrees.
    pub jitter_degrees: f32,
    /// How far the tuft top leans per unit of wind.
    pub wind_lean: f32,
}

impl Default for GrassSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            excluded_world: false,
            texture: GRASS_SPRITE_TEXTURE,
            bearing_textures: vec![0, 1],
            near: 800.0,
            mid: 1500.0,
            far: 2200.0,
            width: 80.0,
            height: 100.0,
            min_scale: 0.8,
            max_scale: 1.3,
            jitter_degrees: 25.0,
            wind_lean: 0.3,
        }
    }
}

/// Animated water UVs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterSettings {
    pub texture: TextureId,
    /// Flow direction in UV space.
    pub flow: [f32; 2],
    /// UV units per second along `flow`.
    pub speed: f32,
    /// Distortion amplitude in UV units.
    pub amplitude: f32,
    /// Distortion waves per UV unit.
    pub frequency: f32,
}

impl Default for WaterSettings {
    fn default() -> Self {
        Self {
            texture: WATER_TEXTURE,
            flow: [1.0, 0.5],
            speed: 0.1,
            amplitude: 0.05,
            frequency: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindSettings {
    /// Minimum time between region updates.
    pub interval_ms: u64,
    /// Minimum phase change for an update to be worth doing.
    pub phase_epsilon: f32,
    /// Phase advance, radians per second.
    pub speed: f32,
    /// Peak wind value, radians.
    pub amplitude: f32,
    /// Half-width of the updated window, in tiles.
    pub radius_tiles: i32,
    /// Phase offset per tile.
    pub spatial_frequency: f32,
}

impl Default for WindSettings {
    fn default() -> Self {
        Self {
            interval_ms: 32,
            phase_epsilon: 0.01,
            speed: 1.5,
            amplitude: 0.2,
            radius_tiles: 32,
            spatial_frequency: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    /// Lights farther than this from the camera are ignored.
    pub max_distance: f32,
    /// Lights at or below this intensity are ignored.
    pub min_intensity: f32,
    /// Upper bound on active lights per frame; the nearest are kept.
    pub max_active: usize,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            max_distance: 2400.0,
            min_intensity: 0.001,
            max_active: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Vertex capacity of each per-texture tile batch.
    pub tile_vertices: usize,
    /// Vertex capacity of the shared grass batch.
    pub grass_vertices: usize,
    /// When false, alpha overlays are drawn immediately instead of batched.
    pub batch_alpha: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            tile_vertices: DEFAULT_TILE_BATCH_VERTICES,
            grass_vertices: DEFAULT_GRASS_BATCH_VERTICES,
            batch_alpha: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_keeps_defaults() {
        let settings: TerrainSettings =
            ron::from_str("(tile_scale: 50.0, grass: (enabled: false))").unwrap();
        assert_eq!(settings.tile_scale, 50.0);
        assert!(!settings.grass.enabled);
        assert_eq!(settings.grass.near, GrassSettings::default().near);
        assert_eq!(settings.block_size, 4);
        assert_eq!(settings.lod, LodSettings::default());
    }
}
