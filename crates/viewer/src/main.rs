//! Terrain viewer: flies a camera over a synthesized map and renders it
//! headless, logging per-frame terrain metrics.

mod config;
mod world;

use std::f32::consts::FRAC_PI_2;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use engine_core::Time;
use glam::Vec3;
use renderer::{
    Camera, CameraView, DrawRecorder, Renderer, TerrainPass, Texture, TextureTable,
    DEFAULT_FRAME_VERTICES,
};
use terrain::{LightId, TerrainEngine, TERRAIN_SIZE};

use config::ViewerConfig;

const FRAME_STEP: Duration = Duration::from_millis(16);

/// Stand-in colors for tile images that could not be loaded.
fn fallback_color(id: u8) -> [u8; 4] {
    match id {
        0 | 1 => [72, 118, 48, 255],
        2..=4 => [120, 96, 64, 255],
        5 => [40, 80, 140, 255],
        6 => [110, 80, 50, 255],
        7..=13 => [128, 124, 118, 255],
        30..=32 => [90, 150, 60, 200],
        _ => [160, 160, 160, 255],
    }
}

fn prepare_pass(renderer: &Renderer, config: &ViewerConfig) -> TerrainPass {
    let mut pass = TerrainPass::new(&renderer.device, renderer.format(), DEFAULT_FRAME_VERTICES);
    let table = TextureTable::standard();
    if let Some(dir) = config.texture_dir.as_deref() {
        let loaded = pass.load_textures(&renderer.device, &renderer.queue, &table, Path::new(dir));
        log::info!("Loaded {} tile textures from {}", loaded, dir);
    }
    let ids: Vec<u8> = table.iter().map(|(id, _)| id).collect();
    for id in ids {
        if !pass.has_texture(id) {
            let color = fallback_color(id);
            let texture = Texture::solid(&renderer.device, &renderer.queue, color, "Fallback Tile");
            pass.register_texture(&renderer.device, id, texture);
        }
    }
    pass
}

struct Flight {
    camera: Camera,
    time: Time,
    torches: Vec<LightId>,
}

impl Flight {
    fn new(config: &ViewerConfig, engine: &TerrainEngine, torches: Vec<LightId>) -> Self {
        let extent = TERRAIN_SIZE as f32 * engine.settings().tile_scale;
        let start = Vec3::new(extent * 0.1, extent * 0.5, 0.0);
        let mut camera = Camera::new(start);
        camera.set_aspect(config.width, config.height);
        camera.set_far(config.far);
        // Look ahead along +X and down toward the ground.
        camera.set_yaw_pitch(-FRAC_PI_2, -0.6);
        Self {
            camera,
            time: Time::new(),
            torches,
        }
    }

    /// Advance one fixed step and return the new camera context.
    fn step(&mut self, config: &ViewerConfig, engine: &mut TerrainEngine) -> CameraView {
        self.time.advance(FRAME_STEP);
        let extent = TERRAIN_SIZE as f32 * engine.settings().tile_scale;
        let mut position = self.camera.position();
        position.x += config.fly_speed * self.time.delta_seconds();
        position.x = position.x.rem_euclid(extent);
        position.z = engine.height_at(position.x, position.y) + config.camera_height;
        self.camera.set_position(position);

        // Flicker the torches.
        let t = self.time.elapsed_seconds();
        for (i, id) in self.torches.iter().enumerate() {
            if let Some(light) = engine.dynamic_light_mut(*id) {
                light.intensity = 0.55 + 0.25 * (t * 7.0 + i as f32 * 1.3).sin();
            }
        }

        let view = self.camera.view_context();
        engine.update(&view, &self.time, &view.frustum);
        view
    }
}

fn log_metrics(frame: u32, engine: &TerrainEngine) {
    let m = engine.metrics();
    log::info!(
        "frame {}: {} draw calls, {} triangles, {} blocks, {} tiles, {} tufts in {} grass batches, {} lights, {} recomputes",
        frame,
        m.draw_calls,
        m.triangles,
        m.blocks_drawn,
        m.tiles_drawn,
        m.grass_tufts,
        m.grass_flushes,
        m.active_lights,
        m.visibility_recomputes
    );
}

fn run_gpu(
    renderer: &Renderer,
    config: &ViewerConfig,
    engine: &mut TerrainEngine,
    flight: &mut Flight,
) {
    let mut pass = prepare_pass(renderer, config);
    let clear = wgpu::Color {
        r: 0.45,
        g: 0.6,
        b: 0.8,
        a: 1.0,
    };
    for frame in 0..config.frames {
        let view = flight.step(config, engine);
        pass.update_camera(&renderer.queue, &view);
        engine.draw(&view, &mut pass);

        let mut encoder = renderer.begin_frame();
        pass.encode(
            &renderer.queue,
            &mut encoder,
            renderer.color_view(),
            renderer.depth_texture_view(),
            clear,
        );
        renderer.end_frame(encoder);

        if frame % config.log_every.max(1) == 0 {
            log_metrics(frame, engine);
        }
    }
}

fn run_recording(config: &ViewerConfig, engine: &mut TerrainEngine, flight: &mut Flight) {
    let mut sink = DrawRecorder::new();
    for frame in 0..config.frames {
        sink.clear();
        let view = flight.step(config, engine);
        engine.draw(&view, &mut sink);
        log::debug!("frame {}: {} vertices recorded", frame, sink.total_vertices());
        if frame % config.log_every.max(1) == 0 {
            log_metrics(frame, engine);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewerConfig::load();
    log::info!("Starting terrain viewer (seed {}, {} frames)", config.seed, config.frames);

    let mut engine = TerrainEngine::new(config.terrain.clone())?;
    engine.load(world::generate_maps(config.seed))?;
    engine.apply_directional_light(Vec3::new(0.5, -0.4, 0.75), 0.3);

    let torches = world::scatter_lights(config.seed, config.light_count, &engine)
        .into_iter()
        .map(|light| engine.add_dynamic_light(light))
        .collect();
    let mut flight = Flight::new(&config, &engine, torches);

    match Renderer::new_headless_blocking(config.width, config.height) {
        Ok(renderer) => run_gpu(&renderer, &config, &mut engine, &mut flight),
        Err(e) => {
            log::warn!("GPU unavailable ({}); recording draw calls instead", e);
            run_recording(&config, &mut engine, &mut flight);
        }
    }

    log::info!("Flight finished after {} frames", flight.time.frame_count());
    Ok(())
}
