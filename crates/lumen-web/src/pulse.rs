// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Demo drawable: concentric rings that breathe and counter-rotate.
//!
//! Reads its settings from the `scene` block of the options, e.g.
//! `{ "scene": { "rings": 7, "color": [1, 0.6, 0.2, 1] } }`.

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use lumen_lifecycle::{Drawable, FrameContext, SceneContext};
use lumen_scene_port::{ObjectId, SceneError, SceneGraph};
use serde::Deserialize;
use web_sys::WebGl2RenderingContext as Gl;

use crate::backend::WebGlTarget;

/// Line segments per ring.
pub const RING_SEGMENTS: usize = 64;

/// Upper bound on `rings`.
pub const MAX_RINGS: u32 = 32;

/// Tunables read from the `scene` options block.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PulseSettings {
    /// Number of rings, clamped to `1..=MAX_RINGS`.
    pub rings: u32,
    /// Radius of the outermost ring at rest.
    pub radius: f32,
    /// Stroke colour (RGBA).
    pub color: [f32; 4],
    /// Breathing frequency in hertz.
    pub pulse_hz: f32,
    /// Breathing amplitude as a fraction of each ring's radius.
    pub amplitude: f32,
    /// Spin in radians per second; odd rings spin the other way.
    pub spin_speed: f32,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            rings: 5,
            radius: 2.0,
            color: [0.35, 0.75, 1.0, 1.0],
            pulse_hz: 0.5,
            amplitude: 0.12,
            spin_speed: 0.2,
        }
    }
}

impl PulseSettings {
    /// Settings from a `scene` options value; `null` yields the defaults.
    pub fn from_scene(value: &serde_json::Value) -> Result<Self, SceneError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let mut settings: Self = serde_json::from_value(value.clone())
            .map_err(|err| SceneError::Configuration(format!("pulse scene options: {err}")))?;
        settings.rings = settings.rings.clamp(1, MAX_RINGS);
        Ok(settings)
    }

    /// Radius of ring `index` after `elapsed_s` seconds.
    pub fn ring_scale(&self, index: u32, elapsed_s: f32) -> f32 {
        let rings = self.rings.max(1) as f32;
        let rest = self.radius * (index + 1) as f32 / rings;
        let phase = index as f32 / rings * TAU;
        rest * self.amplitude.mul_add((elapsed_s * self.pulse_hz * TAU - phase).sin(), 1.0)
    }
}

/// Unit circle in the XY plane as packed `x, y, z` triples.
pub fn ring_vertices(segments: usize) -> Vec<f32> {
    (0..segments)
        .flat_map(|i| {
            let angle = i as f32 / segments as f32 * TAU;
            [angle.cos(), angle.sin(), 0.0]
        })
        .collect()
}

/// Rings sharing one geometry and one material.
#[derive(Debug, Default)]
pub struct PulseDrawable {
    settings: PulseSettings,
    rings: Vec<ObjectId>,
}

impl PulseDrawable {
    /// Settings from the last setup.
    pub fn settings(&self) -> &PulseSettings {
        &self.settings
    }

    fn pose(&self, scene: &mut SceneGraph<WebGlTarget>, elapsed_s: f32) {
        for (index, id) in self.rings.iter().enumerate() {
            let Some(object) = scene.object_mut(*id) else {
                continue;
            };
            let index = index as u32;
            let direction = if index.is_multiple_of(2) { 1.0 } else { -1.0 };
            object.transform = Mat4::from_scale_rotation_translation(
                Vec3::splat(self.settings.ring_scale(index, elapsed_s)),
                Quat::from_rotation_z(direction * self.settings.spin_speed * elapsed_s),
                Vec3::ZERO,
            );
        }
    }
}

impl Drawable<WebGlTarget> for PulseDrawable {
    fn setup_scene(&mut self, ctx: &mut SceneContext<'_, WebGlTarget>) -> Result<(), SceneError> {
        self.settings = PulseSettings::from_scene(&ctx.options.scene)?;
        self.rings.clear();

        let geometry = ctx
            .target
            .create_geometry(&ring_vertices(RING_SEGMENTS), Gl::LINE_LOOP)?;
        let geometry = ctx.scene.add_geometry(geometry);
        let material = ctx.target.create_material(self.settings.color)?;
        let material = ctx.scene.add_material(material);
        for index in 0..self.settings.rings {
            let ring = ctx
                .scene
                .add_object(format!("ring-{index}"), geometry, material)?;
            self.rings.push(ring);
        }
        self.pose(ctx.scene, 0.0);
        Ok(())
    }

    fn update(&mut self, ctx: &mut FrameContext<'_, WebGlTarget>) -> Result<(), SceneError> {
        let elapsed_s = (ctx.timing.elapsed_ms / 1000.0) as f32;
        self.pose(ctx.scene, elapsed_s);
        ctx.render()
    }
}
