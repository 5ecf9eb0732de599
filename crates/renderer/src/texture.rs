//! Texture-id table and GPU textures.

use std::path::{Path, PathBuf};

use wgpu::util::DeviceExt;

use crate::batch::{TextureId, TEXTURE_SLOTS};
use crate::error::RenderError;

/// Slot of the animated water tile.
pub const WATER_TEXTURE: TextureId = 5;
/// First numbered extension slot (`ExtTile01`).
pub const EXT_TILE_FIRST: TextureId = 14;
/// Number of numbered extension slots.
pub const EXT_TILE_COUNT: usize = 16;
/// Slot of the grass sprite atlas.
pub const GRASS_SPRITE_TEXTURE: TextureId = 30;

const NAMED_TILES: [&str; 14] = [
    "TileGrass01",
    "TileGrass02",
    "TileGround01",
    "TileGround02",
    "TileGround03",
    "TileWater01",
    "TileWood01",
    "TileRock01",
    "TileRock02",
    "TileRock03",
    "TileRock04",
    "TileRock05",
    "TileRock06",
    "TileRock07",
];

const GRASS_SPRITES: [&str; 3] = ["grass/TileGrass01", "grass/TileGrass02", "grass/TileGrass03"];

/// Maps texture ids to image file stems.
#[derive(Debug, Clone)]
pub struct TextureTable {
    entries: Vec<Option<String>>,
}

impl Default for TextureTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TextureTable {
    pub fn empty() -> Self {
        Self {
            entries: vec![None; TEXTURE_SLOTS],
        }
    }

    /// Named ground tiles, 16 `ExtTileNN` slots and the grass sprites.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for (id, name) in NAMED_TILES.iter().enumerate() {
            table.set(id as TextureId, *name);
        }
        for n in 0..EXT_TILE_COUNT {
            table.set(EXT_TILE_FIRST + n as TextureId, format!("ExtTile{:02}", n + 1));
        }
        for (n, name) in GRASS_SPRITES.iter().enumerate() {
            table.set(GRASS_SPRITE_TEXTURE + n as TextureId, *name);
        }
        table
    }

    pub fn set(&mut self, id: TextureId, stem: impl Into<String>) {
        self.entries[id as usize] = Some(stem.into());
    }

    pub fn file_stem(&self, id: TextureId) -> Option<&str> {
        self.entries[id as usize].as_deref()
    }

    /// Resolve an id to `dir/<stem>.<extension>`.
    pub fn resolve(&self, id: TextureId, dir: &Path, extension: &str) -> Option<PathBuf> {
        self.file_stem(id)
            .map(|stem| dir.join(format!("{stem}.{extension}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &str)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(id, e)| e.as_deref().map(|s| (id as TextureId, s)))
    }
}

/// GPU texture with view and sampler.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Upload tightly packed RGBA8 pixels with repeat addressing.
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &[u8],
        width: u32,
        height: u32,
        label: &str,
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Decode an image file and upload it.
    pub fn load(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Result<Self, RenderError> {
        let image = image::open(path).map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let label = path.to_string_lossy();
        Ok(Self::from_rgba(device, queue, &rgba, width, height, &label))
    }

    /// 1x1 texture of a single color, used as a stand-in when no image is available.
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4], label: &str) -> Self {
        Self::from_rgba(device, queue, &rgba, 1, 1, label)
    }

    pub fn depth(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Depth Sampler"),
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_has_named_extension_and_grass_slots() {
        let table = TextureTable::standard();
        assert_eq!(table.file_stem(0), Some("TileGrass01"));
        assert_eq!(table.file_stem(WATER_TEXTURE), Some("TileWater01"));
        assert_eq!(table.file_stem(EXT_TILE_FIRST), Some("ExtTile01"));
        assert_eq!(table.file_stem(EXT_TILE_FIRST + 15), Some("ExtTile16"));
        assert_eq!(table.file_stem(GRASS_SPRITE_TEXTURE), Some("grass/TileGrass01"));
        assert_eq!(table.file_stem(200), None);
        assert_eq!(table.iter().count(), 14 + 16 + 3);
    }

    #[test]
    fn resolve_joins_directory_and_extension() {
        let table = TextureTable::standard();
        let path = table.resolve(2, Path::new("data/World1"), "png");
        assert_eq!(path, Some(PathBuf::from("data/World1/TileGround01.png")));
        assert_eq!(table.resolve(255, Path::new("data"), "png"), None);
    }
}
