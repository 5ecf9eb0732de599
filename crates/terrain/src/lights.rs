//! Point lights registered by world objects, filtered each frame and
//! accumulated additively into terrain shading.

use std::cmp::Ordering;

use glam::Vec3;
use renderer::Frustum;

use crate::settings::LightSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicLight {
    pub position: Vec3,
    /// Linear RGB, 0..1.
    pub color: Vec3,
    pub radius: f32,
    pub intensity: f32,
}

impl DynamicLight {
    pub fn new(position: Vec3, color: Vec3, radius: f32, intensity: f32) -> Self {
        Self {
            position,
            color,
            radius,
            intensity,
        }
    }

    /// `color × intensity × (1 − d/r)` inside the radius, zero outside.
    #[inline]
    pub fn contribution_at(&self, point: Vec3) -> Vec3 {
        if !(self.radius > 0.0) {
            return Vec3::ZERO;
        }
        let distance = self.position.distance(point);
        if distance >= self.radius {
            return Vec3::ZERO;
        }
        self.color * self.intensity * (1.0 - distance / self.radius)
    }
}

/// Handle returned by [`DynamicLights::add`]. Stale handles resolve to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId {
    index: u32,
    generation: u32,
}

/// World-supplied test deciding whether a light can affect what is on screen.
pub trait LightVisibility {
    fn is_light_visible(&self, light: &DynamicLight) -> bool;
}

/// Accepts every light.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysVisible;

impl LightVisibility for AlwaysVisible {
    fn is_light_visible(&self, _light: &DynamicLight) -> bool {
        true
    }
}

/// A light is visible when its sphere of influence touches the frustum.
impl LightVisibility for Frustum {
    fn is_light_visible(&self, light: &DynamicLight) -> bool {
        let extent = Vec3::splat(light.radius.max(0.0));
        self.intersects_aabb(light.position - extent, light.position + extent)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    light: Option<DynamicLight>,
}

/// Registry of dynamic lights plus the per-frame active subset.
#[derive(Debug, Clone, Default)]
pub struct DynamicLights {
    slots: Vec<Slot>,
    free: Vec<u32>,
    active: Vec<DynamicLight>,
}

impl DynamicLights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, light: DynamicLight) -> LightId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.light = Some(light);
            return LightId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            light: Some(light),
        });
        LightId {
            index,
            generation: 0,
        }
    }

    /// Remove a light. Unknown or stale ids are ignored.
    pub fn remove(&mut self, id: LightId) -> Option<DynamicLight> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let light = slot.light.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(light)
    }

    pub fn get(&self, id: LightId) -> Option<&DynamicLight> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.light.as_ref()
    }

    pub fn get_mut(&mut self, id: LightId) -> Option<&mut DynamicLight> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.light.as_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.light.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.active.clear();
    }

    /// Rebuild the active subset: bright enough, within range of the camera
    /// and passing `visibility`. When more than `max_active` qualify, the
    /// nearest are kept.
    pub fn refresh_active(
        &mut self,
        camera: Vec3,
        settings: &LightSettings,
        visibility: &dyn LightVisibility,
    ) -> usize {
        let max_distance_sq = settings.max_distance * settings.max_distance;
        let mut candidates: Vec<(f32, DynamicLight)> = self
            .slots
            .iter()
            .filter_map(|slot| slot.light)
            .filter(|light| light.intensity > settings.min_intensity)
            .filter_map(|light| {
                let d2 = light.position.distance_squared(camera);
                (d2 <= max_distance_sq).then_some((d2, light))
            })
            .filter(|(_, light)| visibility.is_light_visible(light))
            .collect();

        if candidates.len() > settings.max_active {
            candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            candidates.truncate(settings.max_active);
        }

        self.active.clear();
        self.active.extend(candidates.into_iter().map(|(_, light)| light));
        self.active.len()
    }

    pub fn active(&self) -> &[DynamicLight] {
        &self.active
    }

    /// Summed contribution of the active lights at `point`, clamped to 0..1.
    pub fn contribution_at(&self, point: Vec3) -> Vec3 {
        self.active
            .iter()
            .fold(Vec3::ZERO, |sum, light| sum + light.contribution_at(point))
            .clamp(Vec3::ZERO, Vec3::ONE)
    }
}
