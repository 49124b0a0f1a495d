// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Lumen crates.
#![forbid(unsafe_code)]
//!
//! Everything here runs headless: no DOM, no GPU, no wall clock.
//!
//! # Modules
//!
//! - [`host`] - Host fake with a virtual clock and manually fired callbacks
//! - [`backend`] - Recording render backend and target
//! - [`drawable`] - Drawable that builds a small scene and counts calls
//! - [`harness`] - Controller wiring and event pumping

pub mod backend;
pub mod drawable;
pub mod harness;
pub mod host;

pub use backend::{MockBackend, MockGeometry, MockMaterial, MockTarget};
pub use drawable::{CountingDrawable, DEFAULT_OBJECT_COUNT};
pub use harness::{
    hero, options, responsive_options, MockController, MockRegistry, Rig, HERO,
};
pub use host::{ManualHost, FRAME_INTERVAL_MS};
