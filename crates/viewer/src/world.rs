//! Synthetic map layers and light placement standing in for decoded world files.

use glam::Vec3;
use noise::{NoiseFn, Perlin, Simplex};
use rand::{Rng, SeedableRng};
use renderer::{TextureId, WATER_TEXTURE};
use terrain::{
    DynamicLight, TerrainEngine, TerrainMaps, TileFlags, NO_LAYER, TERRAIN_SIZE,
    TERRAIN_TILE_COUNT,
};

const GRASS: TextureId = 0;
const GRASS_DARK: TextureId = 1;
const GROUND: TextureId = 2;
const ROCK: TextureId = 7;

/// Raw height below which tiles become water.
const WATER_LINE: u8 = 40;
/// Raw height above which tiles are rock and impassable.
const CLIFF_LINE: u8 = 200;

fn noise_seed(seed: u64, offset: u64) -> u32 {
    ((seed.wrapping_add(offset))
        .wrapping_mul(0x9e3779b97f4a7c15_u64)
        .wrapping_add(offset.wrapping_mul(0x6c078965_u64))
        >> 32) as u32
}

/// Perlin/Simplex fBm in 0..1.
fn fractal(perlin: &Perlin, simplex: &Simplex, x: f64, y: f64, octaves: u32) -> f64 {
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 0.012;
    let mut max_value = 0.0;
    for _ in 0..octaves {
        let p = perlin.get([x * frequency, y * frequency]);
        let s = simplex.get([x * frequency + 1000.0, y * frequency + 1000.0]);
        value += (p * 0.7 + s * 0.3) * amplitude;
        max_value += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    ((value / max_value + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Build every layer of a 256×256 map from `seed`.
pub fn generate_maps(seed: u64) -> TerrainMaps {
    let perlin = Perlin::new(noise_seed(seed, 0));
    let simplex = Simplex::new(noise_seed(seed, 1));
    let detail = Perlin::new(noise_seed(seed, 2));

    let mut maps = TerrainMaps {
        heights: vec![0; TERRAIN_TILE_COUNT],
        lights: None,
        flags: Some(vec![0; TERRAIN_TILE_COUNT]),
        layer1: vec![GRASS; TERRAIN_TILE_COUNT],
        layer2: vec![NO_LAYER; TERRAIN_TILE_COUNT],
        alpha: vec![0; TERRAIN_TILE_COUNT],
    };

    for y in 0..TERRAIN_SIZE {
        for x in 0..TERRAIN_SIZE {
            let i = y * TERRAIN_SIZE + x;
            let (fx, fy) = (x as f64, y as f64);
            let h = (fractal(&perlin, &simplex, fx, fy, 5) * 255.0) as u8;
            maps.heights[i] = h;

            let mut flags = TileFlags::NONE;
            if h < WATER_LINE {
                maps.layer1[i] = WATER_TEXTURE;
                flags.insert(TileFlags::WATER | TileFlags::NO_MOVE);
            } else if h > CLIFF_LINE {
                maps.layer1[i] = ROCK;
                flags.insert(TileFlags::NO_MOVE);
            } else {
                let patch = (detail.get([fx * 0.08, fy * 0.08]) + 1.0) * 0.5;
                maps.layer1[i] = if patch > 0.55 { GRASS_DARK } else { GRASS };
                // Worn ground fades in over the grass.
                let wear = ((patch - 0.35) * 4.0).clamp(0.0, 1.0);
                if wear > 0.0 && patch < 0.5 {
                    maps.layer2[i] = GROUND;
                    maps.alpha[i] = (wear * 255.0) as u8;
                }
            }
            if let Some(f) = maps.flags.as_mut() {
                f[i] = flags.0;
            }
        }
    }
    maps
}

/// Scatter `count` torch-like lights over walkable ground.
pub fn scatter_lights(seed: u64, count: usize, engine: &TerrainEngine) -> Vec<DynamicLight> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed.wrapping_add(777));
    let extent = TERRAIN_SIZE as f32 * engine.settings().tile_scale;
    let mut lights = Vec::with_capacity(count);
    let mut attempts = 0;
    while lights.len() < count && attempts < count * 20 {
        attempts += 1;
        let x = rng.gen_range(0.0..extent);
        let y = rng.gen_range(0.0..extent);
        if !engine.is_walkable(x, y) {
            continue;
        }
        let color = Vec3::new(1.0, rng.gen_range(0.45..0.8), rng.gen_range(0.1..0.35));
        lights.push(DynamicLight::new(
            Vec3::new(x, y, engine.height_at(x, y) + 80.0),
            color,
            rng.gen_range(300.0..700.0),
            rng.gen_range(0.4..0.9),
        ));
    }
    lights
}
