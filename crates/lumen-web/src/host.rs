// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Browser host: DOM observers, animation frames and timers.
//!
//! Every browser callback is a wasm-bindgen [`Closure`] owned by the
//! [`WebHost`]. When one fires it forwards a [`HostEvent`] through the
//! [`EventRouter`]; the router holds no strong reference to the controller,
//! so dropping the scene drops the whole graph.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use lumen_app_core::VisibilityOptions;
use lumen_scene_port::{
    ContainerId, Dimensions, FrameHandle, Host, HostEvent, ListenerHandle, ListenerKind,
    SceneError, TimerHandle,
};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, Event, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, Window,
};

use crate::js_error;

type Sink = Rc<dyn Fn(HostEvent)>;

/// Late-bound destination for host events.
///
/// The host is built before the controller that consumes its events, so the
/// sink is connected afterwards.
#[derive(Clone, Default)]
pub struct EventRouter {
    sink: Rc<RefCell<Option<Sink>>>,
}

impl EventRouter {
    /// Router with nothing connected; events are dropped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route subsequent events to `sink`.
    pub fn connect(&self, sink: impl Fn(HostEvent) + 'static) {
        *self.sink.borrow_mut() = Some(Rc::new(sink));
    }

    /// Drop the sink.
    pub fn disconnect(&self) {
        self.sink.borrow_mut().take();
    }

    /// Whether a sink is connected.
    pub fn is_connected(&self) -> bool {
        self.sink.borrow().is_some()
    }

    /// Forward `event` to the sink, if any.
    pub fn deliver(&self, event: HostEvent) {
        // Release the borrow before calling out; the sink may reconnect.
        let sink = self.sink.borrow().clone();
        match sink {
            Some(sink) => sink(event),
            None => debug!(?event, "host event dropped: no sink"),
        }
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("connected", &self.is_connected())
            .finish()
    }
}

enum Registration {
    Visibility {
        observer: IntersectionObserver,
        _callback: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
    },
    Resize {
        callback: Closure<dyn FnMut(Event)>,
    },
    Context {
        element: Element,
        lost: Closure<dyn FnMut(Event)>,
        restored: Closure<dyn FnMut(Event)>,
    },
}

/// Ids of one-shot callbacks that already ran.
///
/// A callback cannot drop its own closure while executing, so it records
/// itself here on the way out and the next scheduling call reaps it.
type Spent = Rc<RefCell<Vec<u64>>>;

/// [`Host`] over the real `window` and `document`.
pub struct WebHost {
    window: Window,
    document: Document,
    router: EventRouter,
    next_id: u64,
    listeners: BTreeMap<u64, Registration>,
    frames: BTreeMap<u64, (i32, Closure<dyn FnMut(f64)>)>,
    timers: BTreeMap<u64, (i32, Closure<dyn FnMut()>)>,
    spent_frames: Spent,
    spent_timers: Spent,
}

impl WebHost {
    /// Host bound to the current window, delivering through `router`.
    pub fn new(router: EventRouter) -> Result<Self, SceneError> {
        let window =
            web_sys::window().ok_or_else(|| SceneError::Configuration("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| SceneError::Configuration("no document".into()))?;
        Ok(Self {
            window,
            document,
            router,
            next_id: 1,
            listeners: BTreeMap::new(),
            frames: BTreeMap::new(),
            timers: BTreeMap::new(),
            spent_frames: Spent::default(),
            spent_timers: Spent::default(),
        })
    }

    /// Router this host delivers through.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Outstanding frame and timer callbacks.
    pub fn pending_callbacks(&self) -> usize {
        self.frames.len() + self.timers.len()
    }

    fn bump(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn element(&self, container: &ContainerId) -> Result<Element, SceneError> {
        self.document
            .get_element_by_id(container.as_str())
            .ok_or_else(|| SceneError::Configuration(format!("container #{container} not found")))
    }

    fn reap(&mut self) {
        for id in self.spent_frames.borrow_mut().drain(..) {
            self.frames.remove(&id);
        }
        for id in self.spent_timers.borrow_mut().drain(..) {
            self.timers.remove(&id);
        }
    }

    fn unregister(&self, registration: Registration) {
        let result = match registration {
            Registration::Visibility { observer, .. } => {
                observer.disconnect();
                Ok(())
            }
            Registration::Resize { callback } => self
                .window
                .remove_event_listener_with_callback("resize", callback.as_ref().unchecked_ref()),
            Registration::Context {
                element,
                lost,
                restored,
            } => element
                .remove_event_listener_with_callback_and_bool(
                    "webglcontextlost",
                    lost.as_ref().unchecked_ref(),
                    true,
                )
                .and_then(|()| {
                    element.remove_event_listener_with_callback_and_bool(
                        "webglcontextrestored",
                        restored.as_ref().unchecked_ref(),
                        true,
                    )
                }),
        };
        if let Err(err) = result {
            warn!(error = ?err, "listener removal failed");
        }
    }
}

impl fmt::Debug for WebHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebHost")
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .field("frames", &self.frames.len())
            .field("timers", &self.timers.len())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// Last entry's intersection state; batches report oldest first.
fn latest_intersection(entries: &js_sys::Array) -> Option<bool> {
    (0..entries.length())
        .rev()
        .find_map(|i| entries.get(i).dyn_into::<IntersectionObserverEntry>().ok())
        .map(|entry| entry.is_intersecting())
}

impl Host for WebHost {
    fn viewport_width(&self) -> u32 {
        self.window
            .inner_width()
            .ok()
            .and_then(|width| width.as_f64())
            .map_or(0, |width| width.max(0.0).round() as u32)
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.window.device_pixel_ratio() as f32
    }

    fn container_dimensions(&self, container: &ContainerId) -> Result<Dimensions, SceneError> {
        let element = self.element(container)?;
        let width = u32::try_from(element.client_width()).unwrap_or(0);
        let height = u32::try_from(element.client_height()).unwrap_or(0);
        Ok(Dimensions::new(width, height))
    }

    fn observe_visibility(
        &mut self,
        container: &ContainerId,
        options: &VisibilityOptions,
    ) -> Result<ListenerHandle, SceneError> {
        let element = self.element(container)?;
        let router = self.router.clone();
        let callback = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                if let Some(visible) = latest_intersection(&entries) {
                    router.deliver(HostEvent::Visibility(visible));
                }
            },
        );

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(f64::from(options.threshold)));
        init.set_root_margin(&options.root_margin);
        let observer =
            IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)
                .map_err(|err| js_error("IntersectionObserver", &err))?;
        observer.observe(&element);

        let id = self.bump();
        self.listeners.insert(
            id,
            Registration::Visibility {
                observer,
                _callback: callback,
            },
        );
        debug!(container = %container, id, "visibility observer attached");
        Ok(ListenerHandle {
            id,
            kind: ListenerKind::Visibility,
        })
    }

    fn listen_resize(&mut self) -> Result<ListenerHandle, SceneError> {
        let router = self.router.clone();
        let callback = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            router.deliver(HostEvent::Resize);
        });
        self.window
            .add_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
            .map_err(|err| js_error("resize listener", &err))?;

        let id = self.bump();
        self.listeners.insert(id, Registration::Resize { callback });
        Ok(ListenerHandle {
            id,
            kind: ListenerKind::Resize,
        })
    }

    fn listen_context(&mut self, container: &ContainerId) -> Result<ListenerHandle, SceneError> {
        let element = self.element(container)?;

        // Context events do not bubble; capture them on the way down to the
        // canvas instead.
        let router = self.router.clone();
        let lost = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            // Without this the browser never offers a restore.
            event.prevent_default();
            router.deliver(HostEvent::ContextLost);
        });
        let router = self.router.clone();
        let restored = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            router.deliver(HostEvent::ContextRestored);
        });

        element
            .add_event_listener_with_callback_and_bool(
                "webglcontextlost",
                lost.as_ref().unchecked_ref(),
                true,
            )
            .map_err(|err| js_error("webglcontextlost listener", &err))?;
        if let Err(err) = element.add_event_listener_with_callback_and_bool(
            "webglcontextrestored",
            restored.as_ref().unchecked_ref(),
            true,
        ) {
            let _ = element.remove_event_listener_with_callback_and_bool(
                "webglcontextlost",
                lost.as_ref().unchecked_ref(),
                true,
            );
            return Err(js_error("webglcontextrestored listener", &err));
        }

        let id = self.bump();
        self.listeners.insert(
            id,
            Registration::Context {
                element,
                lost,
                restored,
            },
        );
        Ok(ListenerHandle {
            id,
            kind: ListenerKind::Context,
        })
    }

    fn remove_listener(&mut self, handle: ListenerHandle) {
        match self.listeners.remove(&handle.id) {
            Some(registration) => self.unregister(registration),
            None => debug!(?handle, "unknown listener handle"),
        }
    }

    fn request_frame(&mut self) -> FrameHandle {
        self.reap();
        let id = self.bump();
        let router = self.router.clone();
        let spent = Rc::clone(&self.spent_frames);
        let callback = Closure::<dyn FnMut(f64)>::new(move |timestamp_ms: f64| {
            router.deliver(HostEvent::Frame {
                handle: FrameHandle(id),
                timestamp_ms,
            });
            spent.borrow_mut().push(id);
        });
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(raf) => {
                self.frames.insert(id, (raf, callback));
            }
            Err(err) => warn!(error = ?err, "requestAnimationFrame failed; frame will not fire"),
        }
        FrameHandle(id)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.reap();
        if let Some((raf, _callback)) = self.frames.remove(&handle.0) {
            if let Err(err) = self.window.cancel_animation_frame(raf) {
                warn!(error = ?err, "cancelAnimationFrame failed");
            }
        }
    }

    fn set_timer(&mut self, delay_ms: u32) -> TimerHandle {
        self.reap();
        let id = self.bump();
        let router = self.router.clone();
        let spent = Rc::clone(&self.spent_timers);
        let callback = Closure::<dyn FnMut()>::new(move || {
            router.deliver(HostEvent::Timer(TimerHandle(id)));
            spent.borrow_mut().push(id);
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                delay,
            ) {
            Ok(timeout) => {
                self.timers.insert(id, (timeout, callback));
            }
            Err(err) => warn!(error = ?err, "setTimeout failed; timer will not fire"),
        }
        TimerHandle(id)
    }

    fn clear_timer(&mut self, handle: TimerHandle) {
        self.reap();
        if let Some((timeout, _callback)) = self.timers.remove(&handle.0) {
            self.window.clear_timeout_with_handle(timeout);
        }
    }
}

impl Drop for WebHost {
    // A browser callback into a dropped closure throws; unhook everything.
    fn drop(&mut self) {
        for registration in std::mem::take(&mut self.listeners).into_values() {
            self.unregister(registration);
        }
        for (raf, _callback) in std::mem::take(&mut self.frames).into_values() {
            let _ = self.window.cancel_animation_frame(raf);
        }
        for (timeout, _callback) in std::mem::take(&mut self.timers).into_values() {
            self.window.clear_timeout_with_handle(timeout);
        }
    }
}
