// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lumen scene lifecycle.
//!
//! A [`SceneLifecycleController`] owns one decorative scene rendered into a
//! page region. It allocates GPU resources only while the region is in the
//! viewport and releases all of them when it leaves, is destroyed, or the
//! GPU context is lost.
//!
//! - [`CameraHelper`] derives projection and view matrices from options.
//! - [`RenderTargetRegistry`] hands out at most one target per container.
//! - [`Drawable`] is the scene-specific part: build the scene, animate it.
//!
//! All types are single-threaded. Time comes from the [`Host`] port: the
//! controller requests frames and timers and the host calls back in with
//! [`HostEvent`]s.
//!
//! [`Host`]: lumen_scene_port::Host
//! [`HostEvent`]: lumen_scene_port::HostEvent

pub mod camera;
pub mod controller;
pub mod drawable;
pub mod registry;

pub use camera::CameraHelper;
pub use controller::{LifecycleState, SceneLifecycleController};
pub use drawable::{Drawable, FrameContext, FrameTiming, SceneContext};
pub use registry::{RenderTargetRegistry, TargetHandle};
