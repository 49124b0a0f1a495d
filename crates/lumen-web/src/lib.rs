// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Lumen browser host: WASM bindings that mount decorative WebGL2 scenes.
//!
//! This crate supplies the browser side of the scene lifecycle: a
//! [`WebHost`] over the DOM, a [`WebGlBackend`] that lays a canvas over each
//! container, and a console sink for `tracing`. [`PulseScene`] wires them to
//! the [`PulseDrawable`] demo behind a JavaScript-friendly API.
//!
//! # Usage (from JavaScript)
//!
//! ```js
//! import init, { installLogging, SceneRegistry, PulseScene } from 'lumen-web';
//!
//! await init();
//! installLogging('info');
//!
//! // One registry per page; scenes on different containers share it.
//! const registry = new SceneRegistry();
//! const hero = PulseScene.mount(registry, 'hero', {
//!   zIndex: -1,
//!   responsive: { 768: { camera: { fov: 60 } } },
//!   scene: { rings: 7 },
//! });
//!
//! // Later, e.g. on route change:
//! hero.destroy();
//! ```
//!
//! Rendering starts when the container scrolls into view and stops, with all
//! GPU resources released, when it leaves.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use lumen_app_core::SceneOptions;
use lumen_lifecycle::{RenderTargetRegistry, SceneLifecycleController};
use lumen_scene_port::{ContainerId, HostEvent, SceneError};
use tracing::warn;
use wasm_bindgen::prelude::*;

pub mod backend;
pub mod host;
pub mod logging;
pub mod pulse;

pub use backend::{overlay_style, WebGlBackend, WebGlGeometry, WebGlMaterial, WebGlTarget};
pub use host::{EventRouter, WebHost};
pub use logging::{init_logging, parse_level, ConsoleMakeWriter, ConsoleWriter};
pub use pulse::{PulseDrawable, PulseSettings};

/// Controller driving a [`PulseDrawable`] in the browser.
pub type PulseController = SceneLifecycleController<WebGlBackend, PulseDrawable, WebHost>;

pub(crate) fn js_error(context: &str, err: &JsValue) -> SceneError {
    SceneError::Backend(format!("{context}: {err:?}"))
}

fn to_js(err: &SceneError) -> JsError {
    JsError::new(&err.to_string())
}

/// Options from a JS value; `undefined` and `null` mean defaults.
pub fn parse_options(value: JsValue) -> Result<SceneOptions, SceneError> {
    if value.is_undefined() || value.is_null() {
        return Ok(SceneOptions::default());
    }
    let json: serde_json::Value = serde_wasm_bindgen::from_value(value)
        .map_err(|err| SceneError::Configuration(format!("options are not plain data: {err}")))?;
    SceneOptions::from_json_value(json).map_err(SceneError::from)
}

/// Install the console `tracing` subscriber (and the panic hook when the
/// `console-panic` feature is on).
#[wasm_bindgen(js_name = installLogging)]
pub fn install_logging(level: &str) {
    #[cfg(feature = "console-panic")]
    console_error_panic_hook::set_once();
    init_logging(parse_level(level));
}

/// Page-wide render-target registry, one entry per container.
#[wasm_bindgen]
pub struct SceneRegistry {
    inner: Rc<RenderTargetRegistry<WebGlBackend>>,
}

#[wasm_bindgen]
impl SceneRegistry {
    /// Registry over the current document.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<SceneRegistry, JsError> {
        let backend = WebGlBackend::new().map_err(|err| to_js(&err))?;
        Ok(Self {
            inner: RenderTargetRegistry::shared(backend),
        })
    }

    /// Containers currently holding a render target.
    #[wasm_bindgen(getter)]
    pub fn size(&self) -> usize {
        self.inner.len()
    }
}

impl SceneRegistry {
    /// Shared registry handle.
    pub fn shared(&self) -> Rc<RenderTargetRegistry<WebGlBackend>> {
        Rc::clone(&self.inner)
    }
}

/// A mounted pulse scene.
///
/// Freeing the JS object destroys the scene.
#[wasm_bindgen]
pub struct PulseScene {
    controller: Rc<RefCell<PulseController>>,
    router: EventRouter,
}

#[wasm_bindgen]
impl PulseScene {
    /// Mount on the element with id `container_id`.
    ///
    /// Only observers are registered here; the canvas appears once the
    /// container intersects the viewport.
    pub fn mount(
        registry: &SceneRegistry,
        container_id: &str,
        options: JsValue,
    ) -> Result<PulseScene, JsError> {
        let options = parse_options(options).map_err(|err| to_js(&err))?;
        Self::mount_with(registry.shared(), container_id, options).map_err(|err| to_js(&err))
    }

    /// Lifecycle state name, e.g. `"visible"`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.controller
            .try_borrow()
            .map_or_else(|_| "busy".to_owned(), |c| c.state().as_str().to_owned())
    }

    /// Id of the container this scene renders into.
    #[wasm_bindgen(getter, js_name = containerId)]
    pub fn container_id(&self) -> String {
        self.controller
            .try_borrow()
            .map_or_else(|_| String::new(), |c| c.container().as_str().to_owned())
    }

    /// Stop rendering and release every resource. Idempotent.
    pub fn destroy(&self) {
        self.router.disconnect();
        match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.destroy(),
            Err(_) => warn!("destroy called while the scene was handling an event"),
        }
    }
}

impl PulseScene {
    /// Mount with already-parsed options and an explicit registry.
    pub fn mount_with(
        registry: Rc<RenderTargetRegistry<WebGlBackend>>,
        container_id: &str,
        options: SceneOptions,
    ) -> Result<Self, SceneError> {
        let container = ContainerId::new(container_id)
            .ok_or_else(|| SceneError::Configuration("container id is empty".into()))?;
        let router = EventRouter::new();
        let host = WebHost::new(router.clone())?;
        let controller = Rc::new(RefCell::new(SceneLifecycleController::new(
            container,
            options,
            PulseDrawable::default(),
            host,
            registry,
        )));

        let weak = Rc::downgrade(&controller);
        router.connect(move |event| dispatch(&weak, event));
        controller.borrow_mut().init()?;
        Ok(Self { controller, router })
    }

    /// Shared controller handle.
    pub fn controller(&self) -> Rc<RefCell<PulseController>> {
        Rc::clone(&self.controller)
    }
}

impl Drop for PulseScene {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn dispatch(controller: &Weak<RefCell<PulseController>>, event: HostEvent) {
    let Some(shared) = controller.upgrade() else {
        return;
    };
    let Ok(mut controller) = shared.try_borrow_mut() else {
        warn!(?event, "re-entrant host event dropped");
        return;
    };
    if let Err(err) = controller.handle_event(event) {
        warn!(error = %err, ?event, "scene event failed; waiting for the next visibility change");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn usage_options_parse_and_resolve() {
        let options = SceneOptions::from_json_str(
            r#"{
                "zIndex": -1,
                "responsive": { "768": { "camera": { "fov": 60 } } },
                "scene": { "rings": 7 }
            }"#,
        )
        .unwrap();
        assert_eq!(options.z_index, -1);

        let wide = options.resolve_for_width(800);
        assert_eq!(wide.breakpoint, Some(768));
        assert_relative_eq!(wide.options.camera.fov_y_degrees, 60.0);
        let narrow = options.resolve_for_width(400);
        assert_relative_eq!(
            narrow.options.camera.fov_y_degrees,
            SceneOptions::default().camera.fov_y_degrees
        );

        let settings = PulseSettings::from_scene(&options.scene).unwrap();
        assert_eq!(settings.rings, 7);
    }
}
