// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host port: the page environment a controller lives in.

use lumen_app_core::VisibilityOptions;

use crate::{ContainerId, Dimensions, SceneError};

/// Identifier of a pending animation-frame request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(pub u64);

/// Identifier of a pending one-shot timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub u64);

/// What a [`ListenerHandle`] was registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerKind {
    /// Viewport-intersection observer on a container.
    Visibility,
    /// Window resize listener.
    Resize,
    /// Context lost/restored listener pair on a container's surface.
    Context,
}

/// Registration returned by the host; hand it back to
/// [`Host::remove_listener`] exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerHandle {
    /// Host-assigned id.
    pub id: u64,
    /// Registration kind.
    pub kind: ListenerKind,
}

/// Signals a host delivers back to the controller that registered for them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostEvent {
    /// The container entered (`true`) or left (`false`) the viewport.
    Visibility(bool),
    /// The window was resized.
    Resize,
    /// The rendering context was lost.
    ContextLost,
    /// The rendering context was restored.
    ContextRestored,
    /// A requested animation frame fired.
    Frame {
        /// Handle returned by [`Host::request_frame`].
        handle: FrameHandle,
        /// High-resolution timestamp in milliseconds.
        timestamp_ms: f64,
    },
    /// A one-shot timer fired.
    Timer(TimerHandle),
}

/// Host port trait.
///
/// A host registers observers and schedules callbacks; when they fire it
/// feeds the matching [`HostEvent`] back to the controller. Implementations
/// are single-threaded and callbacks are never delivered re-entrantly from
/// inside one of these methods.
pub trait Host {
    /// Current viewport width in CSS pixels (drives responsive breakpoints).
    fn viewport_width(&self) -> u32;

    /// Current device pixel ratio.
    fn device_pixel_ratio(&self) -> f32;

    /// Layout size of `container`; zero-sized when not laid out.
    fn container_dimensions(&self, container: &ContainerId) -> Result<Dimensions, SceneError>;

    /// Start observing viewport intersection of `container`.
    fn observe_visibility(
        &mut self,
        container: &ContainerId,
        options: &VisibilityOptions,
    ) -> Result<ListenerHandle, SceneError>;

    /// Start listening for window resizes.
    fn listen_resize(&mut self) -> Result<ListenerHandle, SceneError>;

    /// Start listening for context loss/restoration on `container`'s surface.
    fn listen_context(&mut self, container: &ContainerId) -> Result<ListenerHandle, SceneError>;

    /// Release a registration. Unknown handles are ignored.
    fn remove_listener(&mut self, handle: ListenerHandle);

    /// Request one animation frame.
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancel a frame request. Already-fired handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Arm a one-shot timer.
    fn set_timer(&mut self, delay_ms: u32) -> TimerHandle;

    /// Disarm a timer. Already-fired handles are ignored.
    fn clear_timer(&mut self, handle: TimerHandle);
}
