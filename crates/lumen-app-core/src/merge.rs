// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed recursive merge of option patches.
//!
//! Fields are enumerated explicitly per struct. Arrays are atomic: an
//! override replaces the whole array, never individual elements.

use serde_json::Value;

use crate::options::{
    CameraOptions, CameraPatch, RendererOptions, RendererPatch, SceneOptions, SceneOptionsPatch,
    TimingOptions, TimingPatch, VisibilityOptions, VisibilityPatch,
};

/// A value that can absorb a partial override.
pub trait Merge {
    /// The partial form of `Self`.
    type Patch;

    /// Apply `patch` in place; fields absent from the patch are kept.
    fn merge(&mut self, patch: &Self::Patch);

    /// By-value convenience around [`Merge::merge`].
    fn merged(mut self, patch: &Self::Patch) -> Self
    where
        Self: Sized,
    {
        self.merge(patch);
        self
    }
}

fn set<T: Clone>(slot: &mut T, value: Option<&T>) {
    if let Some(v) = value {
        slot.clone_from(v);
    }
}

impl Merge for CameraOptions {
    type Patch = CameraPatch;

    fn merge(&mut self, patch: &CameraPatch) {
        set(&mut self.projection, patch.projection.as_ref());
        set(&mut self.fov_y_degrees, patch.fov_y_degrees.as_ref());
        set(&mut self.frustum_size, patch.frustum_size.as_ref());
        set(&mut self.near, patch.near.as_ref());
        set(&mut self.far, patch.far.as_ref());
        set(&mut self.position, patch.position.as_ref());
        set(&mut self.look_at, patch.look_at.as_ref());
        set(&mut self.up, patch.up.as_ref());
        set(&mut self.auto_rotate_speed, patch.auto_rotate_speed.as_ref());
    }
}

impl Merge for RendererOptions {
    type Patch = RendererPatch;

    fn merge(&mut self, patch: &RendererPatch) {
        set(&mut self.antialias, patch.antialias.as_ref());
        set(&mut self.alpha, patch.alpha.as_ref());
        set(&mut self.power_preference, patch.power_preference.as_ref());
        set(&mut self.max_pixel_ratio, patch.max_pixel_ratio.as_ref());
        set(&mut self.clear_color, patch.clear_color.as_ref());
    }
}

impl Merge for VisibilityOptions {
    type Patch = VisibilityPatch;

    fn merge(&mut self, patch: &VisibilityPatch) {
        set(&mut self.threshold, patch.threshold.as_ref());
        set(&mut self.root_margin, patch.root_margin.as_ref());
    }
}

impl Merge for TimingOptions {
    type Patch = TimingPatch;

    fn merge(&mut self, patch: &TimingPatch) {
        set(&mut self.debounce_ms, patch.debounce_ms.as_ref());
        set(&mut self.settle_ms, patch.settle_ms.as_ref());
    }
}

impl Merge for SceneOptions {
    type Patch = SceneOptionsPatch;

    fn merge(&mut self, patch: &SceneOptionsPatch) {
        if let Some(camera) = &patch.camera {
            self.camera.merge(camera);
        }
        if let Some(renderer) = &patch.renderer {
            self.renderer.merge(renderer);
        }
        if let Some(visibility) = &patch.visibility {
            self.visibility.merge(visibility);
        }
        if let Some(timing) = &patch.timing {
            self.timing.merge(timing);
        }
        set(&mut self.z_index, patch.z_index.as_ref());
        if let Some(scene) = &patch.scene {
            merge_json(&mut self.scene, scene);
        }
    }
}

/// Recursively merge `patch` into `base`.
///
/// Objects merge key by key; arrays and scalars replace the base value
/// outright. A `null` patch value leaves the base untouched.
pub fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_json(base_value, patch_value),
                    None if patch_value.is_null() => {}
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => base.clone_from(patch),
    }
}
