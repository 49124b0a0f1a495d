// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container identity and layout size.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERATED: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of the DOM region a scene renders into.
///
/// Render targets are keyed by this id, so two controllers built over the
/// same container share one target.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wrap an existing identifier (typically the element's `id` attribute).
    ///
    /// Returns `None` for an empty or whitespace-only string.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Generate a fresh unique identifier for a container that has none.
    pub fn generate() -> Self {
        let n = NEXT_GENERATED.fetch_add(1, Ordering::Relaxed);
        Self(format!("lumen-scene-{n}"))
    }

    /// Use `id` when present and non-empty, otherwise generate one.
    pub fn from_existing_or_generate(id: Option<&str>) -> Self {
        id.and_then(Self::new).unwrap_or_else(Self::generate)
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layout size of a container in CSS pixels plus the effective pixel ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dimensions {
    /// Width in CSS pixels.
    pub width: u32,
    /// Height in CSS pixels.
    pub height: u32,
    /// Device pixel ratio applied to the backing store.
    pub pixel_ratio: f32,
}

impl Dimensions {
    /// Dimensions at a pixel ratio of 1.
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1.0,
        }
    }

    /// Copy with the given pixel ratio, capped at `max`.
    pub fn with_pixel_ratio(self, ratio: f32, max: f32) -> Self {
        Self {
            pixel_ratio: ratio.clamp(f32::MIN_POSITIVE, max.max(f32::MIN_POSITIVE)),
            ..self
        }
    }

    /// True when either side is zero; no aspect ratio can be computed.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height; `None` when empty.
    pub fn aspect(&self) -> Option<f32> {
        if self.is_empty() {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }

    /// Backing-store size in device pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.pixel_ratio).round() as u32,
            (self.height as f32 * self.pixel_ratio).round() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_replaced_by_generated_ones() {
        let generated = ContainerId::from_existing_or_generate(Some("   "));
        assert!(generated.as_str().starts_with("lumen-scene-"));
        let kept = ContainerId::from_existing_or_generate(Some("hero"));
        assert_eq!(kept.as_str(), "hero");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ContainerId::generate(), ContainerId::generate());
    }

    #[test]
    fn zero_sized_dimensions_have_no_aspect() {
        assert_eq!(Dimensions::new(0, 300).aspect(), None);
        assert_eq!(Dimensions::new(400, 200).aspect(), Some(2.0));
    }

    #[test]
    fn pixel_ratio_is_capped() {
        let dims = Dimensions::new(400, 300).with_pixel_ratio(3.0, 2.0);
        assert_eq!(dims.physical_size(), (800, 600));
    }
}
