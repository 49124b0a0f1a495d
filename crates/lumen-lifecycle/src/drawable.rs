// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-scene behaviour a controller drives.

use lumen_app_core::SceneOptions;
use lumen_scene_port::{ContainerId, Dimensions, RenderTarget, SceneError, SceneGraph};

use crate::camera::CameraHelper;

/// Timing of one animation frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTiming {
    /// Host timestamp of this frame in milliseconds.
    pub timestamp_ms: f64,
    /// Milliseconds since the previous frame of this epoch; zero on the first.
    pub delta_ms: f64,
    /// Milliseconds since the first frame of this epoch.
    pub elapsed_ms: f64,
    /// Frames rendered in this epoch before this one.
    pub frame_index: u64,
}

/// Frame clock reset at every allocation epoch.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FrameClock {
    first_ms: Option<f64>,
    last_ms: Option<f64>,
    frames: u64,
}

impl FrameClock {
    pub(crate) fn tick(&mut self, timestamp_ms: f64) -> FrameTiming {
        let first = *self.first_ms.get_or_insert(timestamp_ms);
        let delta_ms = self
            .last_ms
            .map_or(0.0, |last| (timestamp_ms - last).max(0.0));
        self.last_ms = Some(timestamp_ms);
        let timing = FrameTiming {
            timestamp_ms,
            delta_ms,
            elapsed_ms: (timestamp_ms - first).max(0.0),
            frame_index: self.frames,
        };
        self.frames += 1;
        timing
    }
}

/// Everything a drawable may touch while building or resizing its scene.
pub struct SceneContext<'a, T: RenderTarget> {
    /// Container being rendered into.
    pub container: &'a ContainerId,
    /// Render target of the current epoch.
    pub target: &'a mut T,
    /// Scene graph owned by the current epoch.
    pub scene: &'a mut SceneGraph<T>,
    /// Camera of the current epoch.
    pub camera: &'a mut CameraHelper,
    /// Container size and pixel ratio.
    pub dimensions: Dimensions,
    /// Options with the active breakpoint applied.
    pub options: &'a SceneOptions,
}

/// Per-frame context handed to [`Drawable::update`].
pub struct FrameContext<'a, T: RenderTarget> {
    /// Container being rendered into.
    pub container: &'a ContainerId,
    /// Render target of the current epoch.
    pub target: &'a mut T,
    /// Scene graph owned by the current epoch.
    pub scene: &'a mut SceneGraph<T>,
    /// Camera, already advanced for this frame.
    pub camera: &'a mut CameraHelper,
    /// Container size and pixel ratio.
    pub dimensions: Dimensions,
    /// Options with the active breakpoint applied.
    pub options: &'a SceneOptions,
    /// Frame timing.
    pub timing: FrameTiming,
}

impl<T: RenderTarget> FrameContext<'_, T> {
    /// Draw the scene through the camera.
    pub fn render(&mut self) -> Result<(), SceneError> {
        let view_projection = self.camera.view_projection();
        self.target.render(self.scene, view_projection)
    }
}

/// Scene-specific behaviour.
///
/// `setup_scene` runs once per allocation epoch, after the camera and
/// target exist and the surface is attached. `update` runs once per
/// animation frame and is expected to call [`FrameContext::render`].
pub trait Drawable<T: RenderTarget> {
    /// Populate `ctx.scene` with geometry, materials and objects.
    fn setup_scene(&mut self, ctx: &mut SceneContext<'_, T>) -> Result<(), SceneError>;

    /// Advance animation state and draw.
    fn update(&mut self, ctx: &mut FrameContext<'_, T>) -> Result<(), SceneError>;

    /// React to an in-place resize. Target and camera are already resized.
    fn on_resize(&mut self, _ctx: &mut SceneContext<'_, T>) -> Result<(), SceneError> {
        Ok(())
    }
}
