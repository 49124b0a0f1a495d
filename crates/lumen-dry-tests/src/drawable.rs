// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Drawable that builds a small scene and counts lifecycle calls.

use glam::Mat4;
use lumen_lifecycle::{Drawable, FrameContext, FrameTiming, SceneContext};
use lumen_scene_port::{Dimensions, SceneError};

use crate::backend::MockTarget;

/// Objects built when the `scene` options carry no `"objects"` count.
pub const DEFAULT_OBJECT_COUNT: u32 = 3;

/// [`Drawable`] over [`MockTarget`] that records every call.
///
/// `setup_scene` creates one shared material, one geometry per object and
/// `"objects"` root objects (read from the `scene` options block). Every
/// object after the first also gets a child sharing its geometry, so the
/// graph exercises shared resources and nesting.
#[derive(Debug, Default)]
pub struct CountingDrawable {
    /// `setup_scene` calls.
    pub setups: u32,
    /// `update` calls.
    pub updates: u32,
    /// `on_resize` calls.
    pub resizes: u32,
    /// Dimensions seen by the latest `setup_scene` or `on_resize`.
    pub last_dimensions: Option<Dimensions>,
    /// Timing of the latest frame.
    pub last_timing: Option<FrameTiming>,
    /// Objects in the scene after the latest `setup_scene`.
    pub objects_built: usize,
    /// Make `setup_scene` fail after partially building.
    pub fail_setup: bool,
    /// Make `update` fail.
    pub fail_update: bool,
}

impl CountingDrawable {
    /// Fresh drawable.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drawable<MockTarget> for CountingDrawable {
    fn setup_scene(&mut self, ctx: &mut SceneContext<'_, MockTarget>) -> Result<(), SceneError> {
        self.setups += 1;
        self.last_dimensions = Some(ctx.dimensions);
        let count = ctx
            .options
            .scene
            .get("objects")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_OBJECT_COUNT, |n| n.min(64) as u32);

        let material = ctx.scene.add_material(ctx.target.create_material([1.0, 0.5, 0.2, 1.0]));
        for i in 0..count {
            let geometry = ctx.scene.add_geometry(ctx.target.create_geometry(3 * (i + 1)));
            let root = ctx.scene.add_object(format!("shape-{i}"), geometry, material)?;
            if let Some(object) = ctx.scene.object_mut(root) {
                object.transform = Mat4::from_translation(glam::Vec3::new(i as f32, 0.0, 0.0));
            }
            if i > 0 {
                ctx.scene
                    .add_child(root, format!("shape-{i}-child"), geometry, material)?;
            }
            if self.fail_setup {
                return Err(SceneError::Backend("setup aborted".into()));
            }
        }
        self.objects_built = ctx.scene.object_count();
        Ok(())
    }

    fn update(&mut self, ctx: &mut FrameContext<'_, MockTarget>) -> Result<(), SceneError> {
        self.updates += 1;
        self.last_timing = Some(ctx.timing);
        if self.fail_update {
            return Err(SceneError::Backend("update failed".into()));
        }
        ctx.render()
    }

    fn on_resize(&mut self, ctx: &mut SceneContext<'_, MockTarget>) -> Result<(), SceneError> {
        self.resizes += 1;
        self.last_dimensions = Some(ctx.dimensions);
        Ok(())
    }
}
