//! Terrain engine: owns the data, caches and batches, and runs the
//! per-frame update and draw passes.

use engine_core::Time;
use glam::Vec3;
use renderer::{
    BatchSink, BlendMode, CameraView, FrameMetrics, GrassBatch, TerrainVertex, TextureId,
    TileBatches, QUAD_VERTICES,
};

use crate::blocks::BlockGrid;
use crate::data::{Geometry, TerrainData, TerrainMaps, TileFlags};
use crate::error::TerrainError;
use crate::grass::GrassInstancer;
use crate::lights::{DynamicLight, DynamicLights, LightId, LightVisibility};
use crate::settings::TerrainSettings;
use crate::tiles::{effective_lod, TileContext, TileGeometry, TileLayers};
use crate::visibility::{lod_step, VisibilitySelector};
use crate::wind::{FastSin, WindCache};

fn geometry_of(settings: &TerrainSettings) -> Geometry {
    Geometry {
        tile_scale: settings.tile_scale,
        special_height: settings.special_height,
    }
}

/// Submit one alpha quad right away instead of batching it.
fn draw_immediate(
    texture: TextureId,
    quad: &[TerrainVertex; QUAD_VERTICES],
    sink: &mut dyn BatchSink,
    metrics: &mut FrameMetrics,
) -> bool {
    let drawn = sink.submit(texture, BlendMode::Alpha, quad);
    if drawn {
        metrics.record_draw(quad.len());
    }
    sink.reset_blend();
    drawn
}

pub struct TerrainEngine {
    settings: TerrainSettings,
    data: Option<TerrainData>,
    blocks: BlockGrid,
    visibility: VisibilitySelector,
    sin: FastSin,
    wind: WindCache,
    lights: DynamicLights,
    grass: GrassInstancer,
    tile_batches: TileBatches,
    grass_batch: GrassBatch,
    metrics: FrameMetrics,
    water_time: f32,
}

impl TerrainEngine {
    /// Fails when `settings.block_size` does not divide the terrain.
    pub fn new(settings: TerrainSettings) -> Result<Self, TerrainError> {
        let blocks = BlockGrid::new(settings.block_size, settings.tile_scale)?;
        Ok(Self {
            blocks,
            visibility: VisibilitySelector::new(),
            sin: FastSin::new(),
            wind: WindCache::new(),
            lights: DynamicLights::new(),
            grass: GrassInstancer::new(&settings.grass),
            tile_batches: TileBatches::new(settings.batching.tile_vertices),
            grass_batch: GrassBatch::new(settings.grass.texture, settings.batching.grass_vertices),
            metrics: FrameMetrics::default(),
            water_time: 0.0,
            data: None,
            settings,
        })
    }

    /// Take ownership of decoded map layers.
    pub fn load(&mut self, maps: TerrainMaps) -> Result<(), TerrainError> {
        let data = TerrainData::from_maps(maps, geometry_of(&self.settings))?;
        self.load_data(data);
        Ok(())
    }

    /// Install already-built data, re-targeting it to the current settings.
    pub fn load_data(&mut self, mut data: TerrainData) {
        data.set_geometry(geometry_of(&self.settings));
        self.blocks.precompute_block_heights(&data);
        self.blocks.reset_visibility();
        self.data = Some(data);
        self.visibility.reset();
        self.wind.reset();
    }

    pub fn unload(&mut self) {
        self.data = None;
        self.blocks.reset_visibility();
        self.visibility.reset();
        self.wind.reset();
        log::info!("Terrain unloaded");
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&TerrainData> {
        self.data.as_ref()
    }

    /// Bake directional shading into the loaded light map.
    pub fn apply_directional_light(&mut self, to_light: Vec3, ambient: f32) {
        if let Some(data) = self.data.as_mut() {
            data.apply_directional_light(to_light, ambient);
        }
    }

    /// Replace the settings. A block size that does not divide the terrain is
    /// rejected and the previous settings stay in effect.
    pub fn reload_settings(&mut self, settings: TerrainSettings) -> Result<(), TerrainError> {
        if settings.block_size != self.settings.block_size
            || settings.tile_scale != self.settings.tile_scale
        {
            self.blocks = BlockGrid::new(settings.block_size, settings.tile_scale)?;
        }
        if settings.batching.tile_vertices != self.settings.batching.tile_vertices {
            self.tile_batches = TileBatches::new(settings.batching.tile_vertices);
        }
        if settings.batching.grass_vertices != self.settings.batching.grass_vertices
            || settings.grass.texture != self.settings.grass.texture
        {
            self.grass_batch =
                GrassBatch::new(settings.grass.texture, settings.batching.grass_vertices);
        }
        self.grass = GrassInstancer::new(&settings.grass);

        if let Some(data) = self.data.as_mut() {
            data.set_geometry(geometry_of(&settings));
            self.blocks.precompute_block_heights(data);
        }
        self.blocks.reset_visibility();
        self.visibility.reset();
        self.wind.reset();
        self.settings = settings;
        log::info!(
            "Terrain settings reloaded (block size {}, grass {})",
            self.settings.block_size,
            if self.grass.active() { "on" } else { "off" }
        );
        Ok(())
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    pub fn blocks(&self) -> &BlockGrid {
        &self.blocks
    }

    pub fn visible_blocks(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.visibility.visible_blocks().iter().copied()
    }

    pub fn wind(&self) -> &WindCache {
        &self.wind
    }

    /// Force a visibility recompute on the next update.
    pub fn invalidate_visibility(&mut self) {
        self.visibility.invalidate();
    }

    /// Per-frame bookkeeping: resets metrics, filters lights, recomputes
    /// visibility when the camera moved and refreshes the wind window.
    pub fn update(&mut self, view: &CameraView, time: &Time, visibility: &dyn LightVisibility) {
        self.metrics.reset();
        self.water_time += time.delta_seconds();

        self.metrics.active_lights =
            self.lights.refresh_active(view.position, &self.settings.lights, visibility) as u32;

        if self.data.is_none() {
            return;
        }

        let tile_scale = self.settings.tile_scale;
        if self
            .visibility
            .update(view, &mut self.blocks, &self.settings.lod, tile_scale)
        {
            self.metrics.visibility_recomputes += 1;
        }

        let center = (
            (view.position.x / tile_scale).floor() as i32,
            (view.position.y / tile_scale).floor() as i32,
        );
        self.wind
            .update(center, time.elapsed(), &self.settings.wind, &self.sin);
    }

    /// Walk the visible blocks, batch their tiles and grass, and flush
    /// everything to `sink`.
    pub fn draw(&mut self, view: &CameraView, sink: &mut dyn BatchSink) {
        let Self {
            settings,
            data,
            blocks,
            visibility,
            sin,
            wind,
            lights,
            grass,
            tile_batches,
            grass_batch,
            metrics,
            water_time,
        } = self;
        let Some(data) = data.as_ref() else {
            return;
        };

        let ctx = TileContext {
            data,
            lights,
            sin,
            ambient: Vec3::from_array(settings.ambient),
            water: &settings.water,
            water_time: *water_time,
        };
        let block_size = blocks.block_size();
        let grow_grass = grass.active();

        for &(bx, by) in visibility.visible_blocks() {
            let Some(block) = blocks.get(bx, by) else {
                continue;
            };
            metrics.blocks_drawn += 1;
            let step = lod_step(effective_lod(data, block, block_size), block_size);
            let (ox, oy) = block.origin;

            for ty in (oy..oy + block_size as i32).step_by(step) {
                for tx in (ox..ox + block_size as i32).step_by(step) {
                    let Some(tile) = TileGeometry::build(&ctx, tx, ty, step as i32) else {
                        continue;
                    };
                    metrics.tiles_drawn += 1;

                    match tile.layers {
                        TileLayers::Overlay(texture) | TileLayers::Base(texture) => {
                            let quad = tile.opaque_quad(texture, &ctx);
                            tile_batches.add_tile(texture, BlendMode::Opaque, &quad, sink, metrics);
                        }
                        TileLayers::Blended { base, overlay } => {
                            let quad = tile.opaque_quad(base, &ctx);
                            tile_batches.add_tile(base, BlendMode::Opaque, &quad, sink, metrics);
                            let quad = tile.overlay_quad(overlay, &ctx);
                            if settings.batching.batch_alpha {
                                tile_batches.add_tile(
                                    overlay,
                                    BlendMode::Alpha,
                                    &quad,
                                    sink,
                                    metrics,
                                );
                            } else {
                                // The overlay blends over whatever is already
                                // drawn, so its base has to reach the sink first.
                                tile_batches.flush_texture(base, BlendMode::Opaque, sink, metrics);
                                draw_immediate(overlay, &quad, sink, metrics);
                            }
                        }
                    }

                    if grow_grass && step == 1 {
                        grass.emit_tile(
                            &ctx,
                            tx,
                            ty,
                            view.position,
                            wind.value(tx, ty),
                            grass_batch,
                            sink,
                            metrics,
                        );
                    }
                }
            }
        }

        tile_batches.flush_all(sink, metrics);
        grass_batch.flush(sink, metrics);
    }

    /// Draw the overlay layer of a single tile immediately, bypassing the
    /// batches. Returns whether anything was drawn.
    pub fn draw_overlay_tile(&mut self, x: i32, y: i32, sink: &mut dyn BatchSink) -> bool {
        let Some(data) = self.data.as_ref() else {
            return false;
        };
        let ctx = TileContext {
            data,
            lights: &self.lights,
            sin: &self.sin,
            ambient: Vec3::from_array(self.settings.ambient),
            water: &self.settings.water,
            water_time: self.water_time,
        };
        let Some(tile) = TileGeometry::build(&ctx, x, y, 1) else {
            return false;
        };
        let overlay = match tile.layers {
            TileLayers::Overlay(texture) | TileLayers::Blended { overlay: texture, .. } => texture,
            TileLayers::Base(_) => return false,
        };
        let quad = tile.overlay_quad(overlay, &ctx);
        draw_immediate(overlay, &quad, sink, &mut self.metrics)
    }

    /// Ground height at a world point; 0 before any data is loaded.
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        self.data.as_ref().map_or(0.0, |d| d.height_at(x, y))
    }

    /// Normalized light at a world point: bilinear light map + ambient +
    /// dynamic lights. White before any data is loaded.
    pub fn light_at(&self, x: f32, y: f32) -> Vec3 {
        let Some(data) = self.data.as_ref() else {
            return Vec3::ONE;
        };
        let point = Vec3::new(x, y, data.height_at(x, y));
        let rgb = data.light_rgb_at(x, y)
            + Vec3::from_array(self.settings.ambient)
            + self.lights.contribution_at(point) * 255.0;
        rgb.clamp(Vec3::ZERO, Vec3::splat(255.0)) / 255.0
    }

    pub fn flag_at(&self, x: f32, y: f32) -> TileFlags {
        self.data
            .as_ref()
            .map_or(TileFlags::NONE, |d| d.flag_at(x, y))
    }

    pub fn is_walkable(&self, x: f32, y: f32) -> bool {
        self.data.as_ref().is_some_and(|d| d.is_walkable(x, y))
    }

    pub fn add_dynamic_light(&mut self, light: DynamicLight) -> LightId {
        self.lights.add(light)
    }

    pub fn remove_dynamic_light(&mut self, id: LightId) -> Option<DynamicLight> {
        self.lights.remove(id)
    }

    pub fn dynamic_light_mut(&mut self, id: LightId) -> Option<&mut DynamicLight> {
        self.lights.get_mut(id)
    }

    /// Contribution of the currently active lights at a world point, 0..1.
    pub fn dynamic_light_at(&self, point: Vec3) -> Vec3 {
        self.lights.contribution_at(point)
    }
}
