// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Visibility-gated scene lifecycle state machine.
//!
//! ```text
//!                 init()            visible
//! Uninitialized ─────────► Initialized ─────────► Visible ◄──┐
//!                              ▲  ▲    ◄─────────   │        │ settle
//!                              │  │     hidden      │ resize │
//!                     restored │  └──────────────── Resizing ┘
//!                              │      hidden / error
//!                         ContextLost ◄── lost (Visible | Resizing)
//!
//!  any ── destroy() ──► Destroyed
//! ```
//!
//! GPU resources (target, camera, scene graph) exist only between entering
//! `Visible` and leaving `Visible`/`Resizing`. One such span is an
//! allocation epoch; every epoch starts from scratch.

use core::fmt;
use std::rc::Rc;

use lumen_app_core::{active_breakpoint, SceneOptions};
use lumen_scene_port::{
    ContainerId, Dimensions, FrameHandle, Host, HostEvent, ListenerHandle, RenderBackend,
    RenderTarget, SceneError, SceneGraph, TimerHandle,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::camera::CameraHelper;
use crate::drawable::{Drawable, FrameClock, FrameContext, SceneContext};
use crate::registry::{RenderTargetRegistry, TargetHandle};

/// Controller lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed; nothing registered.
    Uninitialized,
    /// Listeners registered; no GPU resources.
    Initialized,
    /// Resources allocated and the animation loop running.
    Visible,
    /// Animation paused while a resize settles.
    Resizing,
    /// GPU context gone; waiting for restoration.
    ContextLost,
    /// Terminal.
    Destroyed,
}

impl LifecycleState {
    /// Lower-case name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Visible => "visible",
            Self::Resizing => "resizing",
            Self::ContextLost => "context-lost",
            Self::Destroyed => "destroyed",
        }
    }

    /// Whether the output surface is attached in this state.
    pub const fn has_surface(self) -> bool {
        matches!(self, Self::Visible | Self::Resizing)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources of one allocation epoch.
struct Epoch<T: RenderTarget> {
    number: u64,
    target: TargetHandle<T>,
    scene: SceneGraph<T>,
    camera: CameraHelper,
    options: SceneOptions,
    breakpoint: Option<u32>,
    dimensions: Dimensions,
    clock: FrameClock,
}

/// Drives one decorative scene through its lifecycle.
///
/// The controller never blocks and never schedules work on its own: hosts
/// deliver [`HostEvent`]s through [`SceneLifecycleController::handle_event`]
/// (or the individual `handle_*` methods) and the controller reacts by
/// requesting frames and timers back from the host.
pub struct SceneLifecycleController<B, D, H>
where
    B: RenderBackend,
{
    container: ContainerId,
    options: SceneOptions,
    drawable: D,
    host: H,
    registry: Rc<RenderTargetRegistry<B>>,
    state: LifecycleState,
    intersecting: bool,
    epoch: Option<Epoch<B::Target>>,
    epochs_started: u64,
    frame: Option<FrameHandle>,
    debounce: Option<TimerHandle>,
    settle: Option<TimerHandle>,
    listeners: Vec<ListenerHandle>,
}

impl<B, D, H> SceneLifecycleController<B, D, H>
where
    B: RenderBackend,
    D: Drawable<B::Target>,
    H: Host,
{
    /// Build an `Uninitialized` controller. Nothing is allocated or
    /// registered until [`SceneLifecycleController::init`].
    pub fn new(
        container: ContainerId,
        options: SceneOptions,
        drawable: D,
        host: H,
        registry: Rc<RenderTargetRegistry<B>>,
    ) -> Self {
        Self {
            container,
            options,
            drawable,
            host,
            registry,
            state: LifecycleState::Uninitialized,
            intersecting: false,
            epoch: None,
            epochs_started: 0,
            frame: None,
            debounce: None,
            settle: None,
            listeners: Vec::new(),
        }
    }

    /// Register the visibility observer, resize listener and context
    /// listeners.
    ///
    /// A second call is a no-op; a call after [`destroy`](Self::destroy)
    /// fails with [`SceneError::Destroyed`].
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    pub fn init(&mut self) -> Result<(), SceneError> {
        match self.state {
            LifecycleState::Destroyed => return Err(SceneError::Destroyed),
            LifecycleState::Uninitialized => {}
            _ => return Ok(()),
        }
        self.options.validate()?;
        if let Err(err) = self.register_listeners() {
            self.release_listeners();
            return Err(err);
        }
        self.transition(LifecycleState::Initialized);
        Ok(())
    }

    /// Route a host event to its handler.
    pub fn handle_event(&mut self, event: HostEvent) -> Result<(), SceneError> {
        match event {
            HostEvent::Visibility(intersecting) => self.handle_visibility(intersecting),
            HostEvent::Resize => {
                self.handle_resize();
                Ok(())
            }
            HostEvent::ContextLost => {
                self.handle_context_lost();
                Ok(())
            }
            HostEvent::ContextRestored => self.handle_context_restored(),
            HostEvent::Frame {
                handle,
                timestamp_ms,
            } => self.handle_frame(handle, timestamp_ms),
            HostEvent::Timer(handle) => self.handle_timer(handle),
        }
    }

    /// Container entered or left the viewport.
    ///
    /// Entering allocates an epoch and starts the animation loop; leaving
    /// stops it and disposes everything. If allocation fails the controller
    /// stays `Initialized` and the error is returned.
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    pub fn handle_visibility(&mut self, intersecting: bool) -> Result<(), SceneError> {
        if matches!(
            self.state,
            LifecycleState::Uninitialized | LifecycleState::Destroyed
        ) {
            trace!(state = %self.state, "visibility change ignored");
            return Ok(());
        }
        self.intersecting = intersecting;
        match (intersecting, self.state) {
            (true, LifecycleState::Initialized) => {
                self.init_scene()?;
                self.transition(LifecycleState::Visible);
                self.start_loop();
            }
            (false, LifecycleState::Visible | LifecycleState::Resizing) => {
                self.cancel_timers();
                self.teardown();
                self.transition(LifecycleState::Initialized);
            }
            _ => {}
        }
        Ok(())
    }

    /// Window resized: pause animation and (re)start the debounce timer.
    pub fn handle_resize(&mut self) {
        match self.state {
            LifecycleState::Visible => {
                self.stop_loop();
                self.transition(LifecycleState::Resizing);
            }
            LifecycleState::Resizing => {}
            _ => {
                trace!(state = %self.state, "resize ignored");
                return;
            }
        }
        self.cancel_timers();
        let delay = self.effective_options().timing.debounce_ms;
        self.debounce = Some(self.host.set_timer(delay));
    }

    /// A timer armed by this controller fired. Unknown handles are ignored.
    pub fn handle_timer(&mut self, handle: TimerHandle) -> Result<(), SceneError> {
        if self.debounce == Some(handle) {
            self.debounce = None;
            return self.apply_resize();
        }
        if self.settle == Some(handle) {
            self.settle = None;
            self.finish_resize();
            return Ok(());
        }
        trace!(?handle, "stale timer ignored");
        Ok(())
    }

    /// An animation frame fired.
    ///
    /// Stale handles and frames arriving outside `Visible` are ignored. A
    /// failing [`Drawable::update`] stops the loop and returns the error.
    pub fn handle_frame(
        &mut self,
        handle: FrameHandle,
        timestamp_ms: f64,
    ) -> Result<(), SceneError> {
        if self.frame != Some(handle) {
            trace!(?handle, "stale frame ignored");
            return Ok(());
        }
        self.frame = None;
        if self.state != LifecycleState::Visible || !self.intersecting {
            return Ok(());
        }
        let outcome = {
            let Some(epoch) = self.epoch.as_mut() else {
                return Ok(());
            };
            let mut target = epoch.target.borrow_mut();
            if target.is_context_lost() {
                None
            } else {
                let timing = epoch.clock.tick(timestamp_ms);
                epoch.camera.apply_frame_update();
                let mut ctx = FrameContext {
                    container: &self.container,
                    target: &mut *target,
                    scene: &mut epoch.scene,
                    camera: &mut epoch.camera,
                    dimensions: epoch.dimensions,
                    options: &epoch.options,
                    timing,
                };
                Some(self.drawable.update(&mut ctx))
            }
        };
        match outcome {
            None => {
                debug!("render target lost before notification");
                self.handle_context_lost();
                Ok(())
            }
            Some(Ok(())) => {
                self.start_loop();
                Ok(())
            }
            Some(Err(err)) => {
                warn!(container = %self.container, error = %err, "frame update failed; animation stopped");
                Err(err)
            }
        }
    }

    /// GPU context lost: stop, invalidate every registered target and drop
    /// the epoch without issuing GPU deletes.
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    pub fn handle_context_lost(&mut self) {
        if !self.state.has_surface() {
            trace!(state = %self.state, "context loss ignored");
            return;
        }
        self.stop_loop();
        self.cancel_timers();
        let invalidated = self.registry.invalidate_all();
        self.teardown();
        self.transition(LifecycleState::ContextLost);
        warn!(invalidated, "rendering context lost");
    }

    /// GPU context restored: rebuild from scratch and resume if still in
    /// view.
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    pub fn handle_context_restored(&mut self) -> Result<(), SceneError> {
        if self.state != LifecycleState::ContextLost {
            trace!(state = %self.state, "context restore ignored");
            return Ok(());
        }
        self.transition(LifecycleState::Initialized);
        if self.intersecting {
            self.init_scene()?;
            self.transition(LifecycleState::Visible);
            self.start_loop();
        }
        Ok(())
    }

    /// Stop everything, release every resource and registration.
    /// Idempotent.
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        self.stop_loop();
        self.cancel_timers();
        self.teardown();
        self.release_listeners();
        self.intersecting = false;
        self.transition(LifecycleState::Destroyed);
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Container this controller renders into.
    pub fn container(&self) -> &ContainerId {
        &self.container
    }

    /// Base options as supplied at construction.
    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// Options of the live epoch, or the base options when none is live.
    pub fn effective_options(&self) -> &SceneOptions {
        self.epoch.as_ref().map_or(&self.options, |e| &e.options)
    }

    /// Last reported intersection.
    pub fn is_intersecting(&self) -> bool {
        self.intersecting
    }

    /// Outstanding animation-frame request.
    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.frame
    }

    /// Whether a debounce or settle timer is armed.
    pub fn has_pending_resize(&self) -> bool {
        self.debounce.is_some() || self.settle.is_some()
    }

    /// Number of allocation epochs started so far.
    pub fn epochs_started(&self) -> u64 {
        self.epochs_started
    }

    /// Number of the live epoch.
    pub fn epoch_number(&self) -> Option<u64> {
        self.epoch.as_ref().map(|e| e.number)
    }

    /// Breakpoint applied to the live epoch.
    pub fn active_breakpoint(&self) -> Option<u32> {
        self.epoch.as_ref().and_then(|e| e.breakpoint)
    }

    /// Container size used by the live epoch.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.epoch.as_ref().map(|e| e.dimensions)
    }

    /// Render target of the live epoch.
    pub fn render_target(&self) -> Option<TargetHandle<B::Target>> {
        self.epoch.as_ref().map(|e| Rc::clone(&e.target))
    }

    /// Scene graph of the live epoch.
    pub fn scene(&self) -> Option<&SceneGraph<B::Target>> {
        self.epoch.as_ref().map(|e| &e.scene)
    }

    /// Camera of the live epoch.
    pub fn camera(&self) -> Option<&CameraHelper> {
        self.epoch.as_ref().map(|e| &e.camera)
    }

    /// Listener registrations currently held.
    pub fn listener_handles(&self) -> &[ListenerHandle] {
        &self.listeners
    }

    /// The drawable.
    pub fn drawable(&self) -> &D {
        &self.drawable
    }

    /// The drawable, mutably.
    pub fn drawable_mut(&mut self) -> &mut D {
        &mut self.drawable
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Shared registry.
    pub fn registry(&self) -> &Rc<RenderTargetRegistry<B>> {
        &self.registry
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state != next {
            debug!(container = %self.container, from = %self.state, to = %next, "lifecycle transition");
            self.state = next;
        }
    }

    fn register_listeners(&mut self) -> Result<(), SceneError> {
        let visibility = self
            .host
            .observe_visibility(&self.container, &self.options.visibility)?;
        self.listeners.push(visibility);
        let resize = self.host.listen_resize()?;
        self.listeners.push(resize);
        let context = self.host.listen_context(&self.container)?;
        self.listeners.push(context);
        Ok(())
    }

    fn release_listeners(&mut self) {
        for handle in self.listeners.drain(..) {
            self.host.remove_listener(handle);
        }
    }

    fn start_loop(&mut self) {
        if self.frame.is_some()
            || self.state != LifecycleState::Visible
            || !self.intersecting
            || self.epoch.is_none()
        {
            return;
        }
        self.frame = Some(self.host.request_frame());
    }

    fn stop_loop(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.host.cancel_frame(handle);
        }
    }

    fn cancel_timers(&mut self) {
        for handle in [self.debounce.take(), self.settle.take()].into_iter().flatten() {
            self.host.clear_timer(handle);
        }
    }

    /// Allocate a fresh epoch: resolve options, camera, target, surface,
    /// scene graph, then let the drawable populate it.
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    fn init_scene(&mut self) -> Result<(), SceneError> {
        self.teardown();
        let resolved = self.options.resolve_for_width(self.host.viewport_width());
        resolved.options.validate()?;
        let dimensions = self
            .host
            .container_dimensions(&self.container)?
            .with_pixel_ratio(
                self.host.device_pixel_ratio(),
                resolved.options.renderer.max_pixel_ratio,
            );
        if dimensions.is_empty() {
            return Err(SceneError::Configuration(format!(
                "container {} has no size ({}x{})",
                self.container, dimensions.width, dimensions.height
            )));
        }
        let mut camera = CameraHelper::new(resolved.options.camera.clone());
        camera.initialize(dimensions)?;
        let target = self
            .registry
            .acquire(&self.container, &resolved.options.renderer)?;

        self.epochs_started += 1;
        self.epoch = Some(Epoch {
            number: self.epochs_started,
            target,
            scene: SceneGraph::new(),
            camera,
            options: resolved.options,
            breakpoint: resolved.breakpoint,
            dimensions,
            clock: FrameClock::default(),
        });
        if let Err(err) = self.populate_epoch() {
            warn!(error = %err, "scene setup failed");
            self.teardown();
            return Err(err);
        }
        info!(
            epoch = self.epochs_started,
            width = dimensions.width,
            height = dimensions.height,
            breakpoint = ?resolved.breakpoint,
            "allocation epoch started"
        );
        Ok(())
    }

    fn populate_epoch(&mut self) -> Result<(), SceneError> {
        let Some(epoch) = self.epoch.as_mut() else {
            return Ok(());
        };
        let mut target = epoch.target.borrow_mut();
        target.set_size(epoch.dimensions);
        target.attach_surface(epoch.options.z_index)?;
        let mut ctx = SceneContext {
            container: &self.container,
            target: &mut *target,
            scene: &mut epoch.scene,
            camera: &mut epoch.camera,
            dimensions: epoch.dimensions,
            options: &epoch.options,
        };
        self.drawable.setup_scene(&mut ctx)
    }

    /// Dispose the live epoch. Every step is guarded; failures are logged.
    fn teardown(&mut self) {
        self.stop_loop();
        let Some(mut epoch) = self.epoch.take() else {
            return;
        };
        let owned = self
            .registry
            .get(&self.container)
            .is_some_and(|registered| Rc::ptr_eq(&registered, &epoch.target));
        let shared = owned && self.registry.holders(&self.container) > 1;
        {
            let mut target = epoch.target.borrow_mut();
            if target.is_context_lost() {
                let dropped = epoch.scene.abandon();
                debug!(dropped, "scene abandoned without GPU deletes");
            } else {
                let report = epoch.scene.dispose(&mut target);
                debug!(
                    objects = report.objects,
                    geometries = report.geometries,
                    materials = report.materials,
                    failures = report.failures.len(),
                    "scene disposed"
                );
            }
            if shared {
                debug!(container = %self.container, "surface kept for other holders");
            } else if let Err(err) = target.detach_surface() {
                warn!(container = %self.container, error = %err, "surface detach failed");
            }
        }
        epoch.camera.cleanup();
        let number = epoch.number;
        drop(epoch);
        if owned {
            self.registry.release(&self.container);
        }
        info!(container = %self.container, epoch = number, "allocation epoch ended");
    }

    /// Debounce elapsed: rebuild on a breakpoint change, otherwise resize in
    /// place; then arm the settle timer.
    #[instrument(level = "debug", skip(self), fields(container = %self.container))]
    fn apply_resize(&mut self) -> Result<(), SceneError> {
        if self.state != LifecycleState::Resizing {
            return Ok(());
        }
        let breakpoint = active_breakpoint(&self.options.responsive, self.host.viewport_width());
        let outcome = match self.epoch.as_ref().map(|e| e.breakpoint) {
            Some(current) if current == breakpoint => self.resize_in_place(),
            previous => {
                info!(from = ?previous.flatten(), to = ?breakpoint, "breakpoint changed; rebuilding");
                self.init_scene()
            }
        };
        if let Err(err) = outcome {
            self.teardown();
            self.transition(LifecycleState::Initialized);
            return Err(err);
        }
        let delay = self.effective_options().timing.settle_ms;
        self.settle = Some(self.host.set_timer(delay));
        Ok(())
    }

    fn resize_in_place(&mut self) -> Result<(), SceneError> {
        let Some(epoch) = self.epoch.as_mut() else {
            return Ok(());
        };
        let dimensions = self
            .host
            .container_dimensions(&self.container)?
            .with_pixel_ratio(
                self.host.device_pixel_ratio(),
                epoch.options.renderer.max_pixel_ratio,
            );
        if dimensions.is_empty() {
            debug!("container collapsed; keeping previous size");
            return Ok(());
        }
        epoch.dimensions = dimensions;
        let mut target = epoch.target.borrow_mut();
        target.set_size(dimensions);
        epoch.camera.handle_resize(dimensions);
        let mut ctx = SceneContext {
            container: &self.container,
            target: &mut *target,
            scene: &mut epoch.scene,
            camera: &mut epoch.camera,
            dimensions,
            options: &epoch.options,
        };
        self.drawable.on_resize(&mut ctx)
    }

    fn finish_resize(&mut self) {
        if self.state != LifecycleState::Resizing {
            return;
        }
        if self.intersecting && self.epoch.is_some() {
            self.transition(LifecycleState::Visible);
            self.start_loop();
        } else {
            self.teardown();
            self.transition(LifecycleState::Initialized);
        }
    }
}

impl<B, D, H> fmt::Debug for SceneLifecycleController<B, D, H>
where
    B: RenderBackend,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneLifecycleController")
            .field("container", &self.container)
            .field("state", &self.state)
            .field("intersecting", &self.intersecting)
            .field("epoch", &self.epoch.as_ref().map(|e| e.number))
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}
