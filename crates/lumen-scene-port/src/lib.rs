// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port contracts for Lumen scene lifecycles.
//!
//! This crate defines the seams between the lifecycle controller and the
//! environment it runs in. It contains no lifecycle logic; that lives in
//! lumen-lifecycle.
//!
//! # Design Principles
//!
//! - **Hosts own time**: Frames and timers are requested through [`Host`] and
//!   delivered back as [`HostEvent`]s. The core never sleeps or polls.
//! - **Explicit registrations**: Every observer or listener registration
//!   returns a handle that must be handed back exactly once.
//! - **Targets own GPU state**: Geometry and material deletion goes through
//!   the [`RenderTarget`] that created them.

use thiserror::Error;

pub use lumen_app_core::{ConfigError, PowerPreference, ProjectionKind, RendererOptions};

/// Error type for scene lifecycle operations.
#[derive(Debug, Error)]
pub enum SceneError {
    /// Missing/invalid container or a zero-size container at initialization.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Options failed to parse or validate.
    #[error("invalid options: {0}")]
    Options(#[from] ConfigError),
    /// Render-target or camera construction failed (e.g. no GPU context).
    #[error("allocation error: {0}")]
    Allocation(String),
    /// The GPU context is gone; work must wait for restoration.
    #[error("rendering context lost")]
    ContextLost,
    /// The controller was destroyed and accepts no further work.
    #[error("controller destroyed")]
    Destroyed,
    /// A backend-specific error occurred.
    #[error("backend error: {0}")]
    Backend(String),
}

mod backend;
mod container;
mod graph;
mod host;

pub use backend::{RenderBackend, RenderTarget};
pub use container::{ContainerId, Dimensions};
pub use graph::{
    DisposalReport, DrawItem, GeometryId, MaterialId, ObjectId, SceneGraph, SceneObject,
};
pub use host::{FrameHandle, Host, HostEvent, ListenerHandle, ListenerKind, TimerHandle};
