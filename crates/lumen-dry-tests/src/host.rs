// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host fake with a virtual clock and manually fired callbacks.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use lumen_app_core::VisibilityOptions;
use lumen_scene_port::{
    ContainerId, Dimensions, FrameHandle, Host, HostEvent, ListenerHandle, ListenerKind,
    SceneError, TimerHandle,
};

/// Milliseconds between simulated animation frames.
pub const FRAME_INTERVAL_MS: f64 = 16.0;

/// In-memory [`Host`] for tests.
///
/// Nothing fires on its own. Tests pop frames with
/// [`ManualHost::next_frame_event`] and move the clock with
/// [`ManualHost::next_timer_event`]. Clones share state, so a test can keep
/// a handle while the controller owns another.
///
/// # Example
///
/// ```
/// use lumen_dry_tests::ManualHost;
/// use lumen_scene_port::{Host, HostEvent};
///
/// let host = ManualHost::new();
/// let mut owned = host.clone();
/// let timer = owned.set_timer(300);
/// assert_eq!(host.next_timer_event(1000), Some(HostEvent::Timer(timer)));
/// assert_eq!(host.now_ms(), 300.0);
/// ```
#[derive(Clone, Debug)]
pub struct ManualHost {
    inner: Rc<RefCell<ManualHostInner>>,
}

#[derive(Debug)]
struct ManualHostInner {
    now_ms: f64,
    viewport_width: u32,
    device_pixel_ratio: f32,
    default_size: (u32, u32),
    container_sizes: BTreeMap<ContainerId, (u32, u32)>,
    next_id: u64,
    listeners: BTreeMap<u64, ListenerHandle>,
    observed: BTreeMap<u64, (ContainerId, VisibilityOptions)>,
    listeners_registered: usize,
    listeners_removed: usize,
    unknown_removals: usize,
    frames: BTreeSet<FrameHandle>,
    frames_requested: usize,
    frames_cancelled: usize,
    timers: BTreeMap<TimerHandle, (f64, u32)>,
    timers_set: usize,
    timers_cleared: usize,
    fail_registration: Option<ListenerKind>,
    fail_dimensions: bool,
}

impl Default for ManualHostInner {
    fn default() -> Self {
        Self {
            now_ms: 0.0,
            viewport_width: 1024,
            device_pixel_ratio: 1.0,
            default_size: (400, 300),
            container_sizes: BTreeMap::new(),
            next_id: 1,
            listeners: BTreeMap::new(),
            observed: BTreeMap::new(),
            listeners_registered: 0,
            listeners_removed: 0,
            unknown_removals: 0,
            frames: BTreeSet::new(),
            frames_requested: 0,
            frames_cancelled: 0,
            timers: BTreeMap::new(),
            timers_set: 0,
            timers_cleared: 0,
            fail_registration: None,
            fail_dimensions: false,
        }
    }
}

impl ManualHostInner {
    fn bump(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn register(&mut self, kind: ListenerKind) -> Result<ListenerHandle, SceneError> {
        if self.fail_registration == Some(kind) {
            return Err(SceneError::Backend(format!("{kind:?} registration refused")));
        }
        let handle = ListenerHandle {
            id: self.bump(),
            kind,
        };
        self.listeners.insert(handle.id, handle);
        self.listeners_registered += 1;
        Ok(handle)
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualHost {
    /// Host with a 1024 px viewport, pixel ratio 1 and 400×300 containers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ManualHostInner::default())),
        }
    }

    /// Builder form of [`ManualHost::set_viewport_width`].
    pub fn with_viewport_width(self, width: u32) -> Self {
        self.set_viewport_width(width);
        self
    }

    /// Change the reported viewport width.
    pub fn set_viewport_width(&self, width: u32) {
        self.inner.borrow_mut().viewport_width = width;
    }

    /// Change the reported device pixel ratio.
    pub fn set_device_pixel_ratio(&self, ratio: f32) {
        self.inner.borrow_mut().device_pixel_ratio = ratio;
    }

    /// Size reported for containers without an explicit size.
    pub fn set_default_container_size(&self, width: u32, height: u32) {
        self.inner.borrow_mut().default_size = (width, height);
    }

    /// Size reported for `container`.
    pub fn set_container_size(&self, container: &ContainerId, width: u32, height: u32) {
        self.inner
            .borrow_mut()
            .container_sizes
            .insert(container.clone(), (width, height));
    }

    /// Make registrations of `kind` fail (`None` to stop failing).
    pub fn set_fail_registration(&self, kind: Option<ListenerKind>) {
        self.inner.borrow_mut().fail_registration = kind;
    }

    /// Make container measurement fail.
    pub fn set_fail_dimensions(&self, fail: bool) {
        self.inner.borrow_mut().fail_dimensions = fail;
    }

    /// Virtual clock in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.inner.borrow().now_ms
    }

    /// Registrations not yet removed.
    pub fn active_listeners(&self) -> Vec<ListenerHandle> {
        self.inner.borrow().listeners.values().copied().collect()
    }

    /// Visibility options passed to each live observer.
    pub fn observed_visibility(&self) -> Vec<(ContainerId, VisibilityOptions)> {
        self.inner.borrow().observed.values().cloned().collect()
    }

    /// Total registrations made.
    pub fn listeners_registered(&self) -> usize {
        self.inner.borrow().listeners_registered
    }

    /// Total registrations removed.
    pub fn listeners_removed(&self) -> usize {
        self.inner.borrow().listeners_removed
    }

    /// Removals of handles that were not registered (double removal).
    pub fn unknown_removals(&self) -> usize {
        self.inner.borrow().unknown_removals
    }

    /// Outstanding frame requests.
    pub fn pending_frames(&self) -> Vec<FrameHandle> {
        self.inner.borrow().frames.iter().copied().collect()
    }

    /// Total frame requests.
    pub fn frames_requested(&self) -> usize {
        self.inner.borrow().frames_requested
    }

    /// Total frame cancellations of outstanding requests.
    pub fn frames_cancelled(&self) -> usize {
        self.inner.borrow().frames_cancelled
    }

    /// Armed timers with their delays, in handle order.
    pub fn pending_timers(&self) -> Vec<(TimerHandle, u32)> {
        self.inner
            .borrow()
            .timers
            .iter()
            .map(|(handle, (_, delay))| (*handle, *delay))
            .collect()
    }

    /// Total timers armed.
    pub fn timers_set(&self) -> usize {
        self.inner.borrow().timers_set
    }

    /// Total armed timers cleared before firing.
    pub fn timers_cleared(&self) -> usize {
        self.inner.borrow().timers_cleared
    }

    /// Pop the oldest frame request, advancing the clock by one frame.
    pub fn next_frame_event(&self) -> Option<HostEvent> {
        let mut inner = self.inner.borrow_mut();
        let handle = inner.frames.pop_first()?;
        inner.now_ms += FRAME_INTERVAL_MS;
        Some(HostEvent::Frame {
            handle,
            timestamp_ms: inner.now_ms,
        })
    }

    /// Pop the earliest timer due within `budget_ms` of now and move the
    /// clock to its deadline. `None` when nothing is due.
    pub fn next_timer_event(&self, budget_ms: u32) -> Option<HostEvent> {
        let mut inner = self.inner.borrow_mut();
        let horizon = inner.now_ms + f64::from(budget_ms);
        let (handle, deadline) = inner
            .timers
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= horizon)
            .min_by(|a, b| a.1 .0.total_cmp(&b.1 .0).then(a.0.cmp(b.0)))
            .map(|(handle, (deadline, _))| (*handle, *deadline))?;
        inner.timers.remove(&handle);
        inner.now_ms = inner.now_ms.max(deadline);
        Some(HostEvent::Timer(handle))
    }

    /// Move the clock forward without firing anything.
    pub fn advance_clock(&self, ms: u32) {
        self.inner.borrow_mut().now_ms += f64::from(ms);
    }
}

impl Host for ManualHost {
    fn viewport_width(&self) -> u32 {
        self.inner.borrow().viewport_width
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.inner.borrow().device_pixel_ratio
    }

    fn container_dimensions(&self, container: &ContainerId) -> Result<Dimensions, SceneError> {
        let inner = self.inner.borrow();
        if inner.fail_dimensions {
            return Err(SceneError::Configuration(format!(
                "container {container} not found"
            )));
        }
        let (width, height) = inner
            .container_sizes
            .get(container)
            .copied()
            .unwrap_or(inner.default_size);
        Ok(Dimensions::new(width, height))
    }

    fn observe_visibility(
        &mut self,
        container: &ContainerId,
        options: &VisibilityOptions,
    ) -> Result<ListenerHandle, SceneError> {
        let mut inner = self.inner.borrow_mut();
        let handle = inner.register(ListenerKind::Visibility)?;
        inner
            .observed
            .insert(handle.id, (container.clone(), options.clone()));
        Ok(handle)
    }

    fn listen_resize(&mut self) -> Result<ListenerHandle, SceneError> {
        self.inner.borrow_mut().register(ListenerKind::Resize)
    }

    fn listen_context(&mut self, _container: &ContainerId) -> Result<ListenerHandle, SceneError> {
        self.inner.borrow_mut().register(ListenerKind::Context)
    }

    fn remove_listener(&mut self, handle: ListenerHandle) {
        let mut inner = self.inner.borrow_mut();
        if inner.listeners.remove(&handle.id).is_some() {
            inner.observed.remove(&handle.id);
            inner.listeners_removed += 1;
        } else {
            inner.unknown_removals += 1;
        }
    }

    fn request_frame(&mut self) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = FrameHandle(inner.bump());
        inner.frames.insert(handle);
        inner.frames_requested += 1;
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut inner = self.inner.borrow_mut();
        if inner.frames.remove(&handle) {
            inner.frames_cancelled += 1;
        }
    }

    fn set_timer(&mut self, delay_ms: u32) -> TimerHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = TimerHandle(inner.bump());
        let deadline = inner.now_ms + f64::from(delay_ms);
        inner.timers.insert(handle, (deadline, delay_ms));
        inner.timers_set += 1;
        handle
    }

    fn clear_timer(&mut self, handle: TimerHandle) {
        let mut inner = self.inner.borrow_mut();
        if inner.timers.remove(&handle).is_some() {
            inner.timers_cleared += 1;
        }
    }
}
