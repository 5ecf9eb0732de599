//! Per-tile geometry: corner positions, lighting, layer classification and UVs.

use glam::{Vec2, Vec3};
use renderer::{quad_triangles, TerrainVertex, TextureId, QUAD_VERTICES};

use crate::blocks::TerrainBlock;
use crate::data::{tile_index, TerrainData, TileFlags, NO_LAYER};
use crate::lights::DynamicLights;
use crate::settings::WaterSettings;
use crate::wind::FastSin;

/// Texture repeats every four tiles.
pub const TILE_UV_SCALE: f32 = 0.25;

/// Corner offsets in tile steps, counter-clockwise seen from above.
const CORNERS: [(i32, i32); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

/// Shared read-only inputs for building tiles during one frame.
pub struct TileContext<'a> {
    pub data: &'a TerrainData,
    pub lights: &'a DynamicLights,
    pub sin: &'a FastSin,
    /// Ambient term, 0..255 per channel.
    pub ambient: Vec3,
    pub water: &'a WaterSettings,
    /// Accumulated seconds driving the water flow.
    pub water_time: f32,
}

/// True when every tile of the `size × size` patch at `(x, y)` shares
/// layer1, layer2, alpha and ground presence with the first, and the far
/// row and column (read only for corner alphas) share its alpha.
pub fn is_patch_uniform(data: &TerrainData, x: i32, y: i32, size: usize) -> bool {
    let first = tile_index(x, y);
    let key = |i: usize| {
        (
            data.layer1(i),
            data.layer2(i),
            data.alpha(i),
            data.flags(i).contains(TileFlags::NO_GROUND),
        )
    };
    let expected = key(first);
    let alpha = data.alpha(first);
    let size = size as i32;
    (y..=y + size).all(|ty| {
        (x..=x + size).all(|tx| {
            let i = tile_index(tx, ty);
            if tx == x + size || ty == y + size {
                data.alpha(i) == alpha
            } else {
                key(i) == expected
            }
        })
    })
}

/// The block's LOD, forced back to full detail when coarsening would change
/// what is drawn.
pub fn effective_lod(data: &TerrainData, block: &TerrainBlock, block_size: usize) -> u32 {
    if block.lod == 0 {
        return 0;
    }
    let (x, y) = block.origin;
    if is_patch_uniform(data, x, y, block_size) {
        block.lod
    } else {
        0
    }
}

/// Stored light + ambient + dynamic contribution, clamped to 0..255 and
/// normalized. Alpha is 1.
pub fn build_vertex_light(
    data: &TerrainData,
    index: usize,
    position: Vec3,
    ambient: Vec3,
    lights: &DynamicLights,
) -> [f32; 4] {
    let base = Vec3::from_array(data.light(index).map(f32::from));
    let dynamic = lights.contribution_at(position) * 255.0;
    let rgb = (base + ambient + dynamic).clamp(Vec3::ZERO, Vec3::splat(255.0)) / 255.0;
    [rgb.x, rgb.y, rgb.z, 1.0]
}

/// UV for a corner at tile coordinates `tile`, with the flow and sinusoidal
/// distortion applied when `texture` is the water texture.
pub fn tile_uv(texture: TextureId, tile: Vec2, ctx: &TileContext<'_>) -> Vec2 {
    let uv = tile * TILE_UV_SCALE;
    if texture != ctx.water.texture {
        return uv;
    }
    water_uv(uv, ctx.water_time, ctx.water, ctx.sin)
}

pub fn water_uv(uv: Vec2, time: f32, water: &WaterSettings, sin: &FastSin) -> Vec2 {
    let flow = Vec2::from_array(water.flow) * water.speed * time;
    let wave = std::f32::consts::TAU * water.frequency;
    let distortion =
        Vec2::new(sin.sin(uv.y * wave + time), sin.cos(uv.x * wave + time)) * water.amplitude;
    uv + flow + distortion
}

/// Which layers a tile draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLayers {
    /// Every corner alpha saturated: layer2 alone, opaque.
    Overlay(TextureId),
    /// No overlay weight anywhere: layer1 alone.
    Base(TextureId),
    /// layer1 opaque plus layer2 blended with per-corner alpha.
    Blended { base: TextureId, overlay: TextureId },
}

/// Classify from the tile's layers and its four corner alphas (0..255).
pub fn classify_layers(layer1: TextureId, layer2: TextureId, alphas: [u8; 4]) -> TileLayers {
    if layer2 == NO_LAYER || alphas.iter().all(|&a| a == 0) {
        return TileLayers::Base(layer1);
    }
    if alphas.iter().all(|&a| a == u8::MAX) {
        return TileLayers::Overlay(layer2);
    }
    TileLayers::Blended {
        base: layer1,
        overlay: layer2,
    }
}

/// Positions, colors and alphas of one tile (or one coarse LOD cell).
#[derive(Debug, Clone, Copy)]
pub struct TileGeometry {
    pub tile: (i32, i32),
    pub step: i32,
    pub positions: [Vec3; 4],
    pub colors: [[f32; 4]; 4],
    pub alphas: [u8; 4],
    pub layers: TileLayers,
}

impl TileGeometry {
    /// Build the cell at tile `(x, y)` spanning `step` tiles. `None` when the
    /// tile has no ground.
    pub fn build(ctx: &TileContext<'_>, x: i32, y: i32, step: i32) -> Option<Self> {
        let data = ctx.data;
        let primary = tile_index(x, y);
        if data.flags(primary).contains(TileFlags::NO_GROUND) {
            return None;
        }
        let scale = data.geometry().tile_scale;

        let mut positions = [Vec3::ZERO; 4];
        let mut colors = [[1.0; 4]; 4];
        let mut alphas = [0u8; 4];
        for (i, &(dx, dy)) in CORNERS.iter().enumerate() {
            let cx = x + dx * step;
            let cy = y + dy * step;
            let index = tile_index(cx, cy);
            let position =
                Vec3::new(cx as f32 * scale, cy as f32 * scale, data.render_height(index));
            positions[i] = position;
            colors[i] = build_vertex_light(data, index, position, ctx.ambient, ctx.lights);
            alphas[i] = data.alpha(index);
        }

        let layers = classify_layers(data.layer1(primary), data.layer2(primary), alphas);
        Some(Self {
            tile: (x, y),
            step,
            positions,
            colors,
            alphas,
            layers,
        })
    }

    fn vertices(
        &self,
        texture: TextureId,
        ctx: &TileContext<'_>,
        alpha: impl Fn(usize) -> f32,
    ) -> [TerrainVertex; QUAD_VERTICES] {
        let (x, y) = self.tile;
        let corners = std::array::from_fn(|i| {
            let (dx, dy) = CORNERS[i];
            let tile = Vec2::new((x + dx * self.step) as f32, (y + dy * self.step) as f32);
            TerrainVertex::new(self.positions[i], self.colors[i], tile_uv(texture, tile, ctx))
                .with_alpha(alpha(i))
        });
        quad_triangles(corners)
    }

    /// Fully opaque quad with `texture`.
    pub fn opaque_quad(
        &self,
        texture: TextureId,
        ctx: &TileContext<'_>,
    ) -> [TerrainVertex; QUAD_VERTICES] {
        self.vertices(texture, ctx, |_| 1.0)
    }

    /// Overlay quad whose per-vertex alpha comes from the corner weights.
    pub fn overlay_quad(
        &self,
        texture: TextureId,
        ctx: &TileContext<'_>,
    ) -> [TerrainVertex; QUAD_VERTICES] {
        self.vertices(texture, ctx, |i| self.alphas[i] as f32 / 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Geometry, TerrainMaps, TERRAIN_TILE_COUNT};
    use crate::lights::{AlwaysVisible, DynamicLight};
    use crate::settings::LightSettings;

    const GEOMETRY: Geometry = Geometry {
        tile_scale: 100.0,
        special_height: 1200.0,
    };

    fn context<'a>(
        data: &'a TerrainData,
        lights: &'a DynamicLights,
        sin: &'a FastSin,
        water: &'a WaterSettings,
    ) -> TileContext<'a> {
        TileContext {
            data,
            lights,
            sin,
            ambient: Vec3::ZERO,
            water,
            water_time: 0.0,
        }
    }

    #[test]
    fn classification_follows_corner_alphas() {
        assert_eq!(classify_layers(1, 2, [255; 4]), TileLayers::Overlay(2));
        assert_eq!(classify_layers(1, 2, [0; 4]), TileLayers::Base(1));
        assert_eq!(
            classify_layers(1, 2, [255, 0, 128, 255]),
            TileLayers::Blended { base: 1, overlay: 2 }
        );
        assert_eq!(classify_layers(1, NO_LAYER, [255; 4]), TileLayers::Base(1));
    }

    #[test]
    fn patch_uniformity_checks_every_tile() {
        let mut maps = TerrainMaps::flat(0, 3);
        let data = TerrainData::from_maps(maps.clone(), GEOMETRY).unwrap();
        assert!(is_patch_uniform(&data, 8, 8, 4));

        maps.alpha[tile_index(11, 11)] = 1;
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        assert!(!is_patch_uniform(&data, 8, 8, 4));
        assert!(is_patch_uniform(&data, 4, 4, 4));
    }

    #[test]
    fn non_uniform_coarse_block_falls_back_to_full_detail() {
        let mut maps = TerrainMaps::flat(0, 3);
        maps.layer1[tile_index(1, 2)] = 7;
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        let mut block = TerrainBlock {
            origin: (0, 0),
            min: Vec3::ZERO,
            max: Vec3::ONE,
            min_height: 0.0,
            max_height: 0.0,
            center: Vec3::ZERO,
            lod: 1,
            visible: true,
        };
        assert_eq!(effective_lod(&data, &block, 4), 0);
        block.origin = (4, 0);
        assert_eq!(effective_lod(&data, &block, 4), 1);
    }

    #[test]
    fn alpha_edge_in_next_block_keeps_full_detail() {
        let mut maps = TerrainMaps::flat(0, 3);
        maps.layer2 = vec![5; TERRAIN_TILE_COUNT];
        // Block (4, 0) is fully overlaid; block (0, 0) has no overlay.
        for y in 0..4 {
            for x in 4..8 {
                maps.alpha[tile_index(x, y)] = 255;
            }
        }
        // A different base texture next door does not matter to corners.
        maps.layer1[tile_index(0, 4)] = 9;
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        assert!(!is_patch_uniform(&data, 0, 0, 4));
        assert!(is_patch_uniform(&data, 8, 0, 4));
        assert!(is_patch_uniform(&data, 0, 8, 4));

        let mut maps = TerrainMaps::flat(0, 3);
        maps.layer1[tile_index(0, 4)] = 9;
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        assert!(is_patch_uniform(&data, 0, 0, 4));
    }

    #[test]
    fn vertex_light_adds_ambient_and_dynamic_then_clamps() {
        let mut maps = TerrainMaps::flat(0, 0);
        maps.lights = Some(vec![[100, 100, 250]; TERRAIN_TILE_COUNT]);
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        let mut lights = DynamicLights::new();
        lights.add(DynamicLight::new(Vec3::ZERO, Vec3::new(0.2, 0.0, 0.2), 1000.0, 1.0));
        lights.refresh_active(Vec3::ZERO, &LightSettings::default(), &AlwaysVisible);

        let color = build_vertex_light(&data, 0, Vec3::ZERO, Vec3::splat(10.0), &lights);
        assert!((color[0] - (100.0 + 10.0 + 51.0) / 255.0).abs() < 1e-4);
        assert!((color[1] - 110.0 / 255.0).abs() < 1e-4);
        assert_eq!(color[2], 1.0);
        assert_eq!(color[3], 1.0);
    }

    #[test]
    fn no_ground_tiles_are_skipped() {
        let mut maps = TerrainMaps::flat(0, 0);
        let mut flags = vec![0u16; TERRAIN_TILE_COUNT];
        flags[tile_index(2, 2)] = TileFlags::NO_GROUND.0;
        maps.flags = Some(flags);
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        let (lights, sin, water) = (DynamicLights::new(), FastSin::new(), WaterSettings::default());
        let ctx = context(&data, &lights, &sin, &water);
        assert!(TileGeometry::build(&ctx, 2, 2, 1).is_none());
        assert!(TileGeometry::build(&ctx, 3, 2, 1).is_some());
    }

    #[test]
    fn geometry_uses_world_corners_and_tiled_uvs() {
        let mut maps = TerrainMaps::flat(0, 0);
        maps.heights[tile_index(256, 3)] = 20;
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        let (lights, sin, water) = (DynamicLights::new(), FastSin::new(), WaterSettings::default());
        let ctx = context(&data, &lights, &sin, &water);

        let tile = TileGeometry::build(&ctx, 255, 2, 1).unwrap();
        // Far corners sit past the edge in world space but sample wrapped heights.
        assert_eq!(tile.positions[2], Vec3::new(25_600.0, 300.0, 30.0));

        let quad = tile.opaque_quad(0, &ctx);
        assert_eq!(quad[0].tex_coords, [255.0 * 0.25, 2.0 * 0.25]);
        assert_eq!(quad[2].tex_coords, [256.0 * 0.25, 3.0 * 0.25]);
        assert!(quad.iter().all(|v| v.color[3] == 1.0));
    }

    #[test]
    fn overlay_alpha_comes_from_corner_weights() {
        let mut maps = TerrainMaps::flat(0, 0);
        maps.layer2 = vec![4; TERRAIN_TILE_COUNT];
        maps.alpha[tile_index(6, 5)] = 255;
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        let (lights, sin, water) = (DynamicLights::new(), FastSin::new(), WaterSettings::default());
        let ctx = context(&data, &lights, &sin, &water);

        let tile = TileGeometry::build(&ctx, 5, 5, 1).unwrap();
        assert_eq!(tile.layers, TileLayers::Blended { base: 0, overlay: 4 });
        let quad = tile.overlay_quad(4, &ctx);
        // Corner order a, b, c, a, c, d; corner b is (6, 5).
        assert_eq!(quad[1].color[3], 1.0);
        assert_eq!(quad[0].color[3], 0.0);
    }

    #[test]
    fn water_uvs_flow_over_time() {
        let data = TerrainData::from_maps(TerrainMaps::flat(0, 5), GEOMETRY).unwrap();
        let (lights, sin, water) = (DynamicLights::new(), FastSin::new(), WaterSettings::default());
        let mut ctx = context(&data, &lights, &sin, &water);
        let tile = Vec2::new(4.0, 8.0);

        let still = tile_uv(water.texture, tile, &ctx);
        ctx.water_time = 2.0;
        let moved = tile_uv(water.texture, tile, &ctx);
        assert_ne!(still, moved);
        assert_eq!(tile_uv(0, tile, &ctx), tile * TILE_UV_SCALE);
    }
}
