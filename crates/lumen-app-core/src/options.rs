// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Declarative scene options and their partial-override ("patch") forms.
//!
//! Every full options struct has a matching patch struct whose fields are all
//! optional. Patches are what responsive breakpoints carry; they are applied
//! with [`Merge`](crate::merge::Merge). Array-valued fields (positions,
//! colors) are atomic: a patch replaces the whole array or leaves it alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Camera projection type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    /// Perspective projection (objects farther away appear smaller).
    #[default]
    Perspective,
    /// Orthographic projection (no perspective distortion).
    Orthographic,
}

/// GPU power preference hint passed to context creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    /// Let the browser decide.
    #[serde(rename = "default")]
    NoPreference,
    /// Prefer the integrated GPU.
    LowPower,
    /// Prefer the discrete GPU.
    #[default]
    HighPerformance,
}

impl PowerPreference {
    /// The string the WebGL context attribute expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoPreference => "default",
            Self::LowPower => "low-power",
            Self::HighPerformance => "high-performance",
        }
    }
}

/// Camera parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CameraOptions {
    /// Projection type.
    #[serde(rename = "type")]
    pub projection: ProjectionKind,
    /// Vertical field of view in degrees (perspective only).
    #[serde(rename = "fov")]
    pub fov_y_degrees: f32,
    /// Visible world-space height (orthographic only).
    pub frustum_size: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Camera position in world space.
    pub position: [f32; 3],
    /// Look-at target in world space.
    pub look_at: [f32; 3],
    /// Up vector.
    pub up: [f32; 3],
    /// Continuous rotation around the look-at target, radians per frame.
    pub auto_rotate_speed: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            projection: ProjectionKind::Perspective,
            fov_y_degrees: 75.0,
            frustum_size: 10.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 5.0],
            look_at: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            auto_rotate_speed: 0.0,
        }
    }
}

/// Partial camera override.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct CameraPatch {
    #[serde(rename = "type")]
    pub projection: Option<ProjectionKind>,
    #[serde(rename = "fov")]
    pub fov_y_degrees: Option<f32>,
    pub frustum_size: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
    pub position: Option<[f32; 3]>,
    pub look_at: Option<[f32; 3]>,
    pub up: Option<[f32; 3]>,
    pub auto_rotate_speed: Option<f32>,
}

/// Render-target creation parameters.
///
/// The defaults are the values every target is created with unless a scene
/// overrides them: antialiasing on, alpha channel on, high-performance GPU.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RendererOptions {
    /// Multisample antialiasing.
    pub antialias: bool,
    /// Transparent backbuffer so the page shows through.
    pub alpha: bool,
    /// GPU power preference.
    pub power_preference: PowerPreference,
    /// Upper bound applied to the device pixel ratio.
    pub max_pixel_ratio: f32,
    /// RGBA clear color, components in `[0, 1]`.
    pub clear_color: [f32; 4],
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            alpha: true,
            power_preference: PowerPreference::HighPerformance,
            max_pixel_ratio: 2.0,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Partial renderer override.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct RendererPatch {
    pub antialias: Option<bool>,
    pub alpha: Option<bool>,
    pub power_preference: Option<PowerPreference>,
    pub max_pixel_ratio: Option<f32>,
    pub clear_color: Option<[f32; 4]>,
}

/// Viewport-intersection observer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct VisibilityOptions {
    /// Fraction of the container that must be visible to count as intersecting.
    pub threshold: f32,
    /// CSS margin grown around the viewport before testing intersection.
    pub root_margin: String,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: "50px".to_owned(),
        }
    }
}

/// Partial visibility override.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct VisibilityPatch {
    pub threshold: Option<f32>,
    pub root_margin: Option<String>,
}

/// Resize debounce timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TimingOptions {
    /// Quiet period after the last resize event before acting on it.
    pub debounce_ms: u32,
    /// Delay after acting on a resize before animation resumes.
    pub settle_ms: u32,
}

impl Default for TimingOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            settle_ms: 200,
        }
    }
}

/// Partial timing override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct TimingPatch {
    pub debounce_ms: Option<u32>,
    pub settle_ms: Option<u32>,
}

/// Complete option set for one decorative scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SceneOptions {
    /// Tag used in log output.
    pub container_name: Option<String>,
    /// Camera parameters.
    pub camera: CameraOptions,
    /// Render-target parameters.
    pub renderer: RendererOptions,
    /// Intersection observer settings.
    pub visibility: VisibilityOptions,
    /// Resize debounce timing.
    pub timing: TimingOptions,
    /// Stacking order of the overlay surface inside its container.
    pub z_index: i32,
    /// Breakpoint (min viewport width, px) to partial override.
    pub responsive: BTreeMap<u32, SceneOptionsPatch>,
    /// Drawable-specific parameters, merged recursively.
    pub scene: serde_json::Value,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            container_name: None,
            camera: CameraOptions::default(),
            renderer: RendererOptions::default(),
            visibility: VisibilityOptions::default(),
            timing: TimingOptions::default(),
            z_index: 0,
            responsive: BTreeMap::new(),
            scene: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

impl SceneOptions {
    /// Name used to tag log output; falls back to `"scene"`.
    pub fn display_name(&self) -> &str {
        self.container_name.as_deref().unwrap_or("scene")
    }
}

/// Partial override of [`SceneOptions`], as carried by a responsive breakpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct SceneOptionsPatch {
    pub camera: Option<CameraPatch>,
    pub renderer: Option<RendererPatch>,
    pub visibility: Option<VisibilityPatch>,
    pub timing: Option<TimingPatch>,
    pub z_index: Option<i32>,
    pub scene: Option<serde_json::Value>,
}
