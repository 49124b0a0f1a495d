// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mobile-first responsive breakpoint resolution.

use std::collections::BTreeMap;

use crate::merge::Merge;
use crate::options::{SceneOptions, SceneOptionsPatch};

/// Options in effect for one viewport width.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedOptions {
    /// Base options with every applicable breakpoint merged in.
    /// `responsive` is emptied; it has already been applied.
    pub options: SceneOptions,
    /// Largest breakpoint `<=` the viewport width, if any applied.
    pub breakpoint: Option<u32>,
}

/// Largest breakpoint threshold that is `<= width`.
pub fn active_breakpoint(
    responsive: &BTreeMap<u32, SceneOptionsPatch>,
    width: u32,
) -> Option<u32> {
    responsive.range(..=width).next_back().map(|(bp, _)| *bp)
}

impl SceneOptions {
    /// Apply breakpoints in ascending order for `viewport_width`; larger
    /// breakpoints override smaller ones.
    pub fn resolve_for_width(&self, viewport_width: u32) -> ResolvedOptions {
        let mut options = self.clone();
        options.responsive = BTreeMap::new();
        for patch in self.responsive.range(..=viewport_width).map(|(_, p)| p) {
            options.merge(patch);
        }
        ResolvedOptions {
            options,
            breakpoint: active_breakpoint(&self.responsive, viewport_width),
        }
    }
}
