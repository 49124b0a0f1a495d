// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Camera helper: projection and view from declarative options.

use glam::{Mat4, Quat, Vec3};
use lumen_app_core::{CameraOptions, ProjectionKind};
use lumen_scene_port::{Dimensions, SceneError};

#[derive(Clone, Copy, Debug)]
struct CameraState {
    position: Vec3,
    aspect: f32,
    projection: Mat4,
    view: Mat4,
}

/// Holds camera parameters and the matrices derived from them.
///
/// Matrices use the OpenGL clip-space convention (`z` in `[-1, 1]`).
#[derive(Clone, Debug)]
pub struct CameraHelper {
    options: CameraOptions,
    state: Option<CameraState>,
}

impl CameraHelper {
    /// Uninitialized helper for `options`.
    pub fn new(options: CameraOptions) -> Self {
        Self {
            options,
            state: None,
        }
    }

    /// Build projection and view for a surface of `dimensions`.
    ///
    /// No-op when already initialized.
    pub fn initialize(&mut self, dimensions: Dimensions) -> Result<(), SceneError> {
        if self.state.is_some() {
            return Ok(());
        }
        let aspect = dimensions.aspect().ok_or_else(|| {
            SceneError::Configuration(format!(
                "container is {}x{}; cannot compute an aspect ratio",
                dimensions.width, dimensions.height
            ))
        })?;
        let position = Vec3::from(self.options.position);
        self.state = Some(CameraState {
            position,
            aspect,
            projection: self.projection_for(aspect),
            view: self.view_for(position),
        });
        Ok(())
    }

    /// Advance auto-rotation by one frame.
    pub fn apply_frame_update(&mut self) {
        let speed = self.options.auto_rotate_speed;
        if speed == 0.0 {
            return;
        }
        let Some(mut state) = self.state else {
            return;
        };
        let target = Vec3::from(self.options.look_at);
        state.position = target + Quat::from_rotation_y(speed) * (state.position - target);
        state.view = self.view_for(state.position);
        self.state = Some(state);
    }

    /// Recompute aspect-dependent projection. Silently ignored when not
    /// initialized or when `dimensions` is empty.
    pub fn handle_resize(&mut self, dimensions: Dimensions) {
        let Some(aspect) = dimensions.aspect() else {
            return;
        };
        let projection = self.projection_for(aspect);
        if let Some(state) = self.state.as_mut() {
            state.aspect = aspect;
            state.projection = projection;
        }
    }

    /// Drop the derived camera.
    pub fn cleanup(&mut self) {
        self.state = None;
    }

    /// Whether [`CameraHelper::initialize`] succeeded and no cleanup followed.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Configured options.
    pub fn options(&self) -> &CameraOptions {
        &self.options
    }

    /// Current aspect ratio.
    pub fn aspect(&self) -> Option<f32> {
        self.state.map(|s| s.aspect)
    }

    /// Current eye position.
    pub fn position(&self) -> Option<Vec3> {
        self.state.map(|s| s.position)
    }

    /// Projection matrix.
    pub fn projection(&self) -> Option<Mat4> {
        self.state.map(|s| s.projection)
    }

    /// View matrix.
    pub fn view(&self) -> Option<Mat4> {
        self.state.map(|s| s.view)
    }

    /// Projection × view; identity when not initialized.
    pub fn view_projection(&self) -> Mat4 {
        self.state.map_or(Mat4::IDENTITY, |s| s.projection * s.view)
    }

    fn projection_for(&self, aspect: f32) -> Mat4 {
        let o = &self.options;
        match o.projection {
            ProjectionKind::Perspective => {
                Mat4::perspective_rh_gl(o.fov_y_degrees.to_radians(), aspect, o.near, o.far)
            }
            ProjectionKind::Orthographic => {
                let half_h = o.frustum_size * 0.5;
                let half_w = half_h * aspect;
                Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, o.near, o.far)
            }
        }
    }

    fn view_for(&self, position: Vec3) -> Mat4 {
        Mat4::look_at_rh(
            position,
            Vec3::from(self.options.look_at),
            Vec3::from(self.options.up),
        )
    }
}
