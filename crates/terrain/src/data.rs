//! Terrain data store: flat per-tile arrays addressed by `y * SIZE + x`.
//!
//! Neighbor lookups wrap with [`TERRAIN_SIZE_MASK`]; only world-space queries
//! reject negative coordinates.

use glam::{Vec2, Vec3};
use renderer::TextureId;

use crate::error::TerrainError;

/// Tiles per side.
pub const TERRAIN_SIZE: usize = 256;
pub const TERRAIN_SIZE_MASK: i32 = TERRAIN_SIZE as i32 - 1;
pub const TERRAIN_TILE_COUNT: usize = TERRAIN_SIZE * TERRAIN_SIZE;
/// Raw height byte → world height.
pub const HEIGHT_SCALE: f32 = 1.5;
/// Layer id meaning "no texture".
pub const NO_LAYER: TextureId = 255;
/// Light color of tiles without a light map.
pub const DEFAULT_LIGHT: [u8; 3] = [255, 255, 255];

/// Wrapped tile index.
#[inline]
pub fn tile_index(x: i32, y: i32) -> usize {
    ((y & TERRAIN_SIZE_MASK) as usize) * TERRAIN_SIZE + (x & TERRAIN_SIZE_MASK) as usize
}

/// Per-tile attribute bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileFlags(pub u16);

impl TileFlags {
    pub const NONE: Self = Self(0);
    pub const SAFE_ZONE: Self = Self(0x0001);
    pub const CHARACTER: Self = Self(0x0002);
    pub const NO_MOVE: Self = Self(0x0004);
    pub const NO_GROUND: Self = Self(0x0008);
    pub const WATER: Self = Self(0x0010);
    pub const ACTION: Self = Self(0x0020);
    pub const SPECIAL_HEIGHT: Self = Self(0x0040);
    pub const CAMERA_UP: Self = Self(0x0080);
    pub const NO_ATTACK: Self = Self(0x0100);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for TileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Already-decoded map layers as handed over by the asset loaders.
#[derive(Debug, Clone)]
pub struct TerrainMaps {
    /// Raw height bytes, scaled by [`HEIGHT_SCALE`] on load.
    pub heights: Vec<u8>,
    /// Per-tile light; white when absent.
    pub lights: Option<Vec<[u8; 3]>>,
    /// Attribute bitmask per tile; all clear when absent.
    pub flags: Option<Vec<u16>>,
    pub layer1: Vec<TextureId>,
    pub layer2: Vec<TextureId>,
    pub alpha: Vec<u8>,
}

impl TerrainMaps {
    /// A level map with one base texture and no overlay.
    pub fn flat(height: u8, layer: TextureId) -> Self {
        Self {
            heights: vec![height; TERRAIN_TILE_COUNT],
            lights: None,
            flags: None,
            layer1: vec![layer; TERRAIN_TILE_COUNT],
            layer2: vec![NO_LAYER; TERRAIN_TILE_COUNT],
            alpha: vec![0; TERRAIN_TILE_COUNT],
        }
    }
}

/// World-space interpretation of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub tile_scale: f32,
    pub special_height: f32,
}

/// Owned per-tile arrays.
#[derive(Debug, Clone)]
pub struct TerrainData {
    heights: Vec<f32>,
    lights: Vec<[u8; 3]>,
    normals: Vec<Vec3>,
    flags: Vec<TileFlags>,
    layer1: Vec<TextureId>,
    layer2: Vec<TextureId>,
    alpha: Vec<u8>,
    geometry: Geometry,
}

fn check_len(layer: &'static str, actual: usize) -> Result<(), TerrainError> {
    if actual != TERRAIN_TILE_COUNT {
        return Err(TerrainError::MapSizeMismatch {
            layer,
            expected: TERRAIN_TILE_COUNT,
            actual,
        });
    }
    Ok(())
}

impl TerrainData {
    /// Validate and take ownership of decoded layers, computing normals.
    pub fn from_maps(maps: TerrainMaps, geometry: Geometry) -> Result<Self, TerrainError> {
        check_len("height", maps.heights.len())?;
        check_len("layer1", maps.layer1.len())?;
        check_len("layer2", maps.layer2.len())?;
        check_len("alpha", maps.alpha.len())?;
        if let Some(lights) = &maps.lights {
            check_len("light", lights.len())?;
        }
        if let Some(flags) = &maps.flags {
            check_len("attribute", flags.len())?;
        }

        let heights = maps.heights.iter().map(|&h| h as f32 * HEIGHT_SCALE).collect();
        let lights = maps.lights.unwrap_or_else(|| vec![DEFAULT_LIGHT; TERRAIN_TILE_COUNT]);
        let flags = match maps.flags {
            Some(raw) => raw.into_iter().map(TileFlags).collect(),
            None => vec![TileFlags::NONE; TERRAIN_TILE_COUNT],
        };

        let mut data = Self {
            heights,
            lights,
            normals: vec![Vec3::Z; TERRAIN_TILE_COUNT],
            flags,
            layer1: maps.layer1,
            layer2: maps.layer2,
            alpha: maps.alpha,
            geometry,
        };
        data.recalculate_normals();
        log::info!(
            "Terrain data loaded ({}x{}, tile scale {})",
            TERRAIN_SIZE,
            TERRAIN_SIZE,
            geometry.tile_scale
        );
        Ok(data)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        if geometry.tile_scale != self.geometry.tile_scale {
            self.geometry = geometry;
            self.recalculate_normals();
        } else {
            self.geometry = geometry;
        }
    }

    #[inline]
    pub fn height(&self, index: usize) -> f32 {
        self.heights[index]
    }

    #[inline]
    pub fn light(&self, index: usize) -> [u8; 3] {
        self.lights[index]
    }

    #[inline]
    pub fn normal(&self, index: usize) -> Vec3 {
        self.normals[index]
    }

    #[inline]
    pub fn flags(&self, index: usize) -> TileFlags {
        self.flags[index]
    }

    #[inline]
    pub fn layer1(&self, index: usize) -> TextureId {
        self.layer1[index]
    }

    #[inline]
    pub fn layer2(&self, index: usize) -> TextureId {
        self.layer2[index]
    }

    #[inline]
    pub fn alpha(&self, index: usize) -> u8 {
        self.alpha[index]
    }

    /// Stored height plus the special-height bonus for flagged tiles.
    pub fn render_height(&self, index: usize) -> f32 {
        let h = self.heights[index];
        if self.flags[index].contains(TileFlags::SPECIAL_HEIGHT) {
            h + self.geometry.special_height
        } else {
            h
        }
    }

    /// World point → tile coordinates and fractional offsets, or `None` for
    /// negative or non-finite input.
    fn locate(&self, world_x: f32, world_y: f32) -> Option<(i32, i32, Vec2)> {
        if !(world_x >= 0.0 && world_y >= 0.0) || !world_x.is_finite() || !world_y.is_finite() {
            return None;
        }
        let xf = world_x / self.geometry.tile_scale;
        let yf = world_y / self.geometry.tile_scale;
        let (fx, fy) = (xf.floor(), yf.floor());
        // Reduce onto the grid before narrowing so huge coordinates still wrap.
        let xi = (fx as i64 & TERRAIN_SIZE_MASK as i64) as i32;
        let yi = (fy as i64 & TERRAIN_SIZE_MASK as i64) as i32;
        Some((xi, yi, Vec2::new(xf - fx, yf - fy)))
    }

    /// Bilinear ground height at a world point.
    pub fn height_at(&self, world_x: f32, world_y: f32) -> f32 {
        let Some((xi, yi, t)) = self.locate(world_x, world_y) else {
            return 0.0;
        };
        let i1 = tile_index(xi, yi);
        if self.flags[i1].contains(TileFlags::SPECIAL_HEIGHT) {
            return self.geometry.special_height;
        }
        let h1 = self.heights[i1];
        let h2 = self.heights[tile_index(xi + 1, yi)];
        let h3 = self.heights[tile_index(xi + 1, yi + 1)];
        let h4 = self.heights[tile_index(xi, yi + 1)];
        bilerp(h1, h2, h3, h4, t)
    }

    /// Bilinear stored light at a world point, 0..255 per channel.
    pub fn light_rgb_at(&self, world_x: f32, world_y: f32) -> Vec3 {
        let Some((xi, yi, t)) = self.locate(world_x, world_y) else {
            return Vec3::from_array(DEFAULT_LIGHT.map(f32::from));
        };
        let sample = |x: i32, y: i32| Vec3::from_array(self.lights[tile_index(x, y)].map(f32::from));
        let l1 = sample(xi, yi);
        let l2 = sample(xi + 1, yi);
        let l3 = sample(xi + 1, yi + 1);
        let l4 = sample(xi, yi + 1);
        let top = l1 + (l2 - l1) * t.x;
        let bottom = l4 + (l3 - l4) * t.x;
        top + (bottom - top) * t.y
    }

    /// Attribute flags of the tile under a world point.
    pub fn flag_at(&self, world_x: f32, world_y: f32) -> TileFlags {
        match self.locate(world_x, world_y) {
            Some((xi, yi, _)) => self.flags[tile_index(xi, yi)],
            None => TileFlags::NONE,
        }
    }

    pub fn is_walkable(&self, world_x: f32, world_y: f32) -> bool {
        !self
            .flag_at(world_x, world_y)
            .intersects(TileFlags::NO_MOVE | TileFlags::NO_GROUND)
    }

    /// Recompute per-tile normals from the height field by central differences.
    pub fn recalculate_normals(&mut self) {
        let span = 2.0 * self.geometry.tile_scale;
        for y in 0..TERRAIN_SIZE as i32 {
            for x in 0..TERRAIN_SIZE as i32 {
                let dx = self.heights[tile_index(x - 1, y)] - self.heights[tile_index(x + 1, y)];
                let dy = self.heights[tile_index(x, y - 1)] - self.heights[tile_index(x, y + 1)];
                self.normals[tile_index(x, y)] = Vec3::new(dx, dy, span).normalize();
            }
        }
    }

    /// Bake `N·L` shading into the light map. `to_light` points from the
    /// ground toward the light; `ambient` is the floor luminosity.
    pub fn apply_directional_light(&mut self, to_light: Vec3, ambient: f32) {
        let to_light = to_light.normalize_or_zero();
        for (light, normal) in self.lights.iter_mut().zip(&self.normals) {
            let lum = (normal.dot(to_light) + ambient).clamp(0.0, 1.0);
            *light = light.map(|c| (c as f32 * lum).round() as u8);
        }
    }
}

#[inline]
fn bilerp(h1: f32, h2: f32, h3: f32, h4: f32, t: Vec2) -> f32 {
    let top = h1 + (h2 - h1) * t.x;
    let bottom = h4 + (h3 - h4) * t.x;
    top + (bottom - top) * t.y
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: Geometry = Geometry {
        tile_scale: 100.0,
        special_height: 1200.0,
    };

    fn ramp() -> TerrainData {
        let mut maps = TerrainMaps::flat(0, 0);
        for y in 0..TERRAIN_SIZE {
            for x in 0..TERRAIN_SIZE {
                maps.heights[y * TERRAIN_SIZE + x] = ((x * 7 + y * 3) % 256) as u8;
            }
        }
        TerrainData::from_maps(maps, GEOMETRY).unwrap()
    }

    #[test]
    fn height_at_grid_points_is_exact() {
        let data = ramp();
        for &(x, y) in &[(0, 0), (5, 9), (120, 33), (255, 255)] {
            let expected = data.height(tile_index(x, y));
            let got = data.height_at(x as f32 * 100.0, y as f32 * 100.0);
            assert_eq!(got, expected, "tile ({x}, {y})");
        }
    }

    #[test]
    fn height_wraps_at_terrain_edge() {
        let data = ramp();
        for y in [0.0, 250.0, 12_345.0] {
            assert_eq!(data.height_at(TERRAIN_SIZE as f32 * 100.0, y), data.height_at(0.0, y));
        }
    }

    #[test]
    fn height_interpolates_between_tiles() {
        let data = ramp();
        let a = data.height(tile_index(10, 10));
        let b = data.height(tile_index(11, 10));
        let mid = data.height_at(1050.0, 1000.0);
        assert!((mid - (a + b) * 0.5).abs() < 1e-3);
    }

    #[test]
    fn negative_or_nan_input_returns_zero() {
        let data = ramp();
        assert_eq!(data.height_at(-1.0, 50.0), 0.0);
        assert_eq!(data.height_at(50.0, -0.5), 0.0);
        assert_eq!(data.height_at(f32::NAN, 50.0), 0.0);
        assert_eq!(data.flag_at(-10.0, 0.0), TileFlags::NONE);
    }

    #[test]
    fn special_height_short_circuits() {
        let mut maps = TerrainMaps::flat(10, 0);
        let mut flags = vec![0u16; TERRAIN_TILE_COUNT];
        flags[tile_index(3, 4)] = TileFlags::SPECIAL_HEIGHT.0;
        maps.flags = Some(flags);
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        assert_eq!(data.height_at(350.0, 450.0), 1200.0);
        assert_eq!(data.height_at(250.0, 450.0), 15.0);
        assert_eq!(data.render_height(tile_index(3, 4)), 15.0 + 1200.0);
    }

    #[test]
    fn wrong_layer_length_is_rejected() {
        let mut maps = TerrainMaps::flat(0, 0);
        maps.alpha.truncate(100);
        let err = TerrainData::from_maps(maps, GEOMETRY).unwrap_err();
        assert_eq!(
            err,
            TerrainError::MapSizeMismatch {
                layer: "alpha",
                expected: TERRAIN_TILE_COUNT,
                actual: 100
            }
        );
    }

    #[test]
    fn missing_light_map_defaults_to_white() {
        let data = TerrainData::from_maps(TerrainMaps::flat(0, 0), GEOMETRY).unwrap();
        assert_eq!(data.light(tile_index(17, 200)), DEFAULT_LIGHT);
        assert_eq!(data.light_rgb_at(1234.0, 987.0), Vec3::splat(255.0));
    }

    #[test]
    fn huge_coordinates_wrap_instead_of_overflowing() {
        let data = ramp();
        let max = 255.0 * HEIGHT_SCALE;
        for x in [1.0e12, 3.0e30, f32::MAX] {
            let h = data.height_at(x, 50.0);
            assert!((0.0..=max).contains(&h), "x = {x}: {h}");
            let l = data.light_rgb_at(x, x);
            assert_eq!(l, Vec3::splat(255.0));
            data.flag_at(50.0, x);
        }
        // 2^20 tiles is a whole number of wraps.
        let far = (1u32 << 20) as f32 * 100.0;
        assert_eq!(data.height_at(far, 50.0), data.height_at(0.0, 50.0));
    }

    #[test]
    fn light_interpolates_between_tiles() {
        let mut maps = TerrainMaps::flat(0, 0);
        let mut lights = vec![DEFAULT_LIGHT; TERRAIN_TILE_COUNT];
        lights[tile_index(10, 10)] = [0, 0, 0];
        lights[tile_index(11, 10)] = [200, 100, 50];
        maps.lights = Some(lights);
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();

        assert_eq!(data.light_rgb_at(1000.0, 1000.0), Vec3::ZERO);
        assert_eq!(data.light_rgb_at(1050.0, 1000.0), Vec3::new(100.0, 50.0, 25.0));
        assert_eq!(data.light_rgb_at(1100.0, 1000.0), Vec3::new(200.0, 100.0, 50.0));
    }

    #[test]
    fn flat_ground_normals_point_up() {
        let data = TerrainData::from_maps(TerrainMaps::flat(40, 0), GEOMETRY).unwrap();
        assert!((data.normal(tile_index(8, 8)) - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn directional_light_darkens_with_grazing_angle() {
        let mut data = TerrainData::from_maps(TerrainMaps::flat(0, 0), GEOMETRY).unwrap();
        data.apply_directional_light(Vec3::new(1.0, 0.0, 1.0), 0.0);
        let c = data.light(0)[0];
        assert!(c > 170 && c < 190, "got {c}");
    }

    #[test]
    fn walkability_respects_flags() {
        let mut maps = TerrainMaps::flat(0, 0);
        let mut flags = vec![0u16; TERRAIN_TILE_COUNT];
        flags[tile_index(1, 1)] = TileFlags::NO_MOVE.0;
        maps.flags = Some(flags);
        let data = TerrainData::from_maps(maps, GEOMETRY).unwrap();
        assert!(!data.is_walkable(150.0, 150.0));
        assert!(data.is_walkable(50.0, 50.0));
    }
}
