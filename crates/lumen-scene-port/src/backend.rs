// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Render backend and render-target port traits.

use glam::Mat4;
use lumen_app_core::RendererOptions;

use crate::{ContainerId, Dimensions, SceneError, SceneGraph};

/// Factory for render targets.
///
/// Implementations wrap the underlying graphics library (WebGL in the
/// browser, a recording mock in tests).
pub trait RenderBackend {
    /// Target type produced by this backend.
    type Target: RenderTarget;

    /// Create the target for `container`.
    ///
    /// Failure to obtain a GPU context surfaces as [`SceneError::Allocation`].
    fn create_target(
        &mut self,
        container: &ContainerId,
        options: &RendererOptions,
    ) -> Result<Self::Target, SceneError>;
}

/// One GPU-backed drawing surface and the output element that shows it.
pub trait RenderTarget {
    /// Backend geometry resource (vertex buffers, index buffers).
    type Geometry;
    /// Backend material resource (shader program, uniforms).
    type Material;

    /// Resize the backing store.
    fn set_size(&mut self, dimensions: Dimensions);

    /// Current size.
    fn size(&self) -> Dimensions;

    /// Append the output surface to its container as a full-size,
    /// non-interactive overlay at `z_index`. Attaching twice is a no-op.
    fn attach_surface(&mut self, z_index: i32) -> Result<(), SceneError>;

    /// Remove the output surface from its container. No-op when detached.
    fn detach_surface(&mut self) -> Result<(), SceneError>;

    /// Whether the output surface is currently a child of its container.
    fn is_surface_attached(&self) -> bool;

    /// Draw every visible object in `scene` once.
    fn render(&mut self, scene: &SceneGraph<Self>, view_projection: Mat4) -> Result<(), SceneError>
    where
        Self: Sized;

    /// Release a geometry's GPU buffers.
    fn dispose_geometry(&mut self, geometry: Self::Geometry) -> Result<(), SceneError>;

    /// Release a material's GPU programs.
    fn dispose_material(&mut self, material: Self::Material) -> Result<(), SceneError>;

    /// Flag the context as lost; subsequent GPU deletes become no-ops.
    fn mark_context_lost(&mut self);

    /// Whether [`RenderTarget::mark_context_lost`] was called.
    fn is_context_lost(&self) -> bool;

    /// Release the context and surface. Must be safe to call more than once.
    fn dispose(&mut self) -> Result<(), SceneError>;
}
