// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared option services for Lumen scenes (schema, merge, breakpoints).
//! Keeps lifecycle and browser adapters free of ad hoc option handling.

pub mod config;
pub mod merge;
pub mod options;
pub mod responsive;

pub use config::ConfigError;
pub use merge::{merge_json, Merge};
pub use options::{
    CameraOptions, CameraPatch, PowerPreference, ProjectionKind, RendererOptions, RendererPatch,
    SceneOptions, SceneOptionsPatch, TimingOptions, TimingPatch, VisibilityOptions,
    VisibilityPatch,
};
pub use responsive::{active_breakpoint, ResolvedOptions};
