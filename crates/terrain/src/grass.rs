//! Procedural grass tufts placed per tile from a deterministic hash.

use glam::{Vec2, Vec3};
use renderer::{quad_triangles, BatchSink, FrameMetrics, GrassBatch, TerrainVertex, TextureId};
use renderer::{QUAD_VERTICES, TEXTURE_SLOTS};

use crate::data::{tile_index, TerrainData, NO_LAYER};
use crate::settings::GrassSettings;
use crate::tiles::{build_vertex_light, TileContext};

/// Upper bound on tufts in one tile.
pub const MAX_TUFTS_PER_TILE: u32 = 6;

/// Sprite variants laid out side by side in the atlas.
pub const GRASS_VARIANTS: u32 = 4;

const SALTS_PER_TUFT: u32 = 8;

/// Deterministic value in `[0, 1]` for a tile and salt.
pub fn grass_random(x: i32, y: i32, salt: u32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ salt.wrapping_mul(0xcb1a_b31f);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    (h & 0x00ff_ffff) as f32 / 0x00ff_ffff as f32
}

/// Tufts for a tile whose center is `distance_sq` (squared, planar) from
/// the camera.
pub fn grass_count(distance_sq: f32, settings: &GrassSettings) -> u32 {
    if distance_sq < settings.near * settings.near {
        MAX_TUFTS_PER_TILE
    } else if distance_sq < settings.mid * settings.mid {
        2
    } else if distance_sq < settings.far * settings.far {
        1
    } else {
        0
    }
}

/// Texture that visually dominates a tile.
pub fn dominant_texture(data: &TerrainData, index: usize) -> TextureId {
    let overlay = data.layer2(index);
    if overlay != NO_LAYER && data.alpha(index) >= 128 {
        overlay
    } else {
        data.layer1(index)
    }
}

/// Decides which tiles grow grass and emits their tufts.
#[derive(Debug, Clone)]
pub struct GrassInstancer {
    settings: GrassSettings,
    bearing: Vec<bool>,
}

impl GrassInstancer {
    pub fn new(settings: &GrassSettings) -> Self {
        let mut bearing = vec![false; TEXTURE_SLOTS];
        for &id in &settings.bearing_textures {
            bearing[id as usize] = true;
        }
        Self {
            settings: settings.clone(),
            bearing,
        }
    }

    pub fn active(&self) -> bool {
        self.settings.enabled && !self.settings.excluded_world
    }

    pub fn is_bearing(&self, texture: TextureId) -> bool {
        self.bearing[texture as usize]
    }

    pub fn is_eligible(&self, data: &TerrainData, index: usize) -> bool {
        self.active() && self.is_bearing(dominant_texture(data, index))
    }

    /// One tuft quad rooted at `base`, facing `yaw`, leaning with `wind`.
    fn tuft(
        &self,
        base: Vec3,
        color: [f32; 4],
        x: i32,
        y: i32,
        salt: u32,
        wind: f32,
    ) -> [TerrainVertex; QUAD_VERTICES] {
        let s = &self.settings;
        let scale = s.min_scale + (s.max_scale - s.min_scale) * grass_random(x, y, salt + 2);
        let jitter = (grass_random(x, y, salt + 3) * 2.0 - 1.0) * s.jitter_degrees.to_radians();
        let yaw = jitter + wind;
        let variant = ((grass_random(x, y, salt + 4) * GRASS_VARIANTS as f32) as u32)
            .min(GRASS_VARIANTS - 1);

        let width = 1.0 / GRASS_VARIANTS as f32;
        let u0 = variant as f32 * width;
        let u1 = u0 + width;

        let along = Vec3::new(yaw.cos(), yaw.sin(), 0.0) * (s.width * scale * 0.5);
        let height = s.height * scale;
        let lean = Vec3::new(-yaw.sin(), yaw.cos(), 0.0) * (wind * s.wind_lean * height);
        let top = base + Vec3::Z * height + lean;

        quad_triangles([
            TerrainVertex::new(base - along, color, Vec2::new(u0, 1.0)),
            TerrainVertex::new(base + along, color, Vec2::new(u1, 1.0)),
            TerrainVertex::new(top + along, color, Vec2::new(u1, 0.0)),
            TerrainVertex::new(top - along, color, Vec2::new(u0, 0.0)),
        ])
    }

    /// Emit the tufts of tile `(x, y)` into `batch`. Returns how many were
    /// placed.
    #[allow(clippy::too_many_arguments)]
    pub fn emit_tile(
        &self,
        ctx: &TileContext<'_>,
        x: i32,
        y: i32,
        camera: Vec3,
        wind: f32,
        batch: &mut GrassBatch,
        sink: &mut dyn BatchSink,
        metrics: &mut FrameMetrics,
    ) -> u32 {
        let data = ctx.data;
        let index = tile_index(x, y);
        if !self.is_eligible(data, index) {
            return 0;
        }
        let scale = data.geometry().tile_scale;
        let center = Vec2::new((x as f32 + 0.5) * scale, (y as f32 + 0.5) * scale);
        let count = grass_count((center - camera.truncate()).length_squared(), &self.settings);
        if count == 0 {
            return 0;
        }

        let ground = center.extend(data.height(index));
        let color = build_vertex_light(data, index, ground, ctx.ambient, ctx.lights);
        let origin = Vec2::new(x as f32, y as f32) * scale;
        for i in 0..count {
            let salt = i * SALTS_PER_TUFT;
            let offset = Vec2::new(grass_random(x, y, salt), grass_random(x, y, salt + 1)) * scale;
            let foot = origin + offset;
            let base = foot.extend(data.height_at(foot.x, foot.y));
            let quad = self.tuft(base, color, x, y, salt, wind);
            batch.add_tuft(&quad, sink, metrics);
        }
        count
    }
}
