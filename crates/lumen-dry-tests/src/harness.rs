// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wiring and driving helpers for controller tests.

use std::cell::RefCell;
use std::rc::Rc;

use lumen_app_core::SceneOptions;
use lumen_lifecycle::{Drawable, RenderTargetRegistry, SceneLifecycleController};
use lumen_scene_port::{ContainerId, SceneError};

use crate::backend::{MockBackend, MockTarget};
use crate::drawable::CountingDrawable;
use crate::host::ManualHost;

/// Controller wired to the doubles.
pub type MockController<D = CountingDrawable> =
    SceneLifecycleController<MockBackend, D, ManualHost>;

/// Shared registry over [`MockBackend`].
pub type MockRegistry = Rc<RenderTargetRegistry<MockBackend>>;

/// Container id used by [`Rig::new`].
pub const HERO: &str = "hero";

/// A controller plus handles onto its host, backend and registry.
pub struct Rig<D: Drawable<MockTarget> = CountingDrawable> {
    /// Controller under test.
    pub controller: MockController<D>,
    /// Handle sharing state with the controller's host.
    pub host: ManualHost,
    /// Handle sharing counters with the registry's backend.
    pub backend: MockBackend,
    /// Registry the controller acquires from.
    pub registry: MockRegistry,
}

impl Rig {
    /// Counting drawable on container [`HERO`] with a fresh host and
    /// registry.
    pub fn new(options: SceneOptions) -> Self {
        Self::with_drawable(options, CountingDrawable::new())
    }
}

impl<D: Drawable<MockTarget>> Rig<D> {
    /// Like [`Rig::new`] with a custom drawable.
    pub fn with_drawable(options: SceneOptions, drawable: D) -> Self {
        let backend = MockBackend::new();
        let registry = RenderTargetRegistry::shared(backend.clone());
        Self::attach(hero(), options, drawable, ManualHost::new(), backend, registry)
    }

    /// Wire a controller for `container` onto an existing registry.
    pub fn attach(
        container: ContainerId,
        options: SceneOptions,
        drawable: D,
        host: ManualHost,
        backend: MockBackend,
        registry: MockRegistry,
    ) -> Self {
        let controller = SceneLifecycleController::new(
            container,
            options,
            drawable,
            host.clone(),
            Rc::clone(&registry),
        );
        Self {
            controller,
            host,
            backend,
            registry,
        }
    }

    /// `init` then report the container as visible.
    pub fn show(&mut self) -> Result<(), SceneError> {
        self.controller.init()?;
        self.controller.handle_visibility(true)
    }

    /// Report the container as out of view.
    pub fn hide(&mut self) -> Result<(), SceneError> {
        self.controller.handle_visibility(false)
    }

    /// Fire up to `n` pending frames. Returns how many fired.
    pub fn run_frames(&mut self, n: usize) -> Result<usize, SceneError> {
        let mut fired = 0;
        while fired < n {
            let Some(event) = self.host.next_frame_event() else {
                break;
            };
            self.controller.handle_event(event)?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Advance the clock by `ms`, firing every timer that comes due in
    /// deadline order. Returns how many fired.
    pub fn advance(&mut self, ms: u32) -> Result<usize, SceneError> {
        let end = self.host.now_ms() + f64::from(ms);
        let mut fired = 0;
        loop {
            let budget = (end - self.host.now_ms()).max(0.0) as u32;
            let Some(event) = self.host.next_timer_event(budget) else {
                break;
            };
            self.controller.handle_event(event)?;
            fired += 1;
        }
        let rest = (end - self.host.now_ms()).max(0.0) as u32;
        self.host.advance_clock(rest);
        Ok(fired)
    }

    /// Render target of the live epoch.
    pub fn target(&self) -> Option<Rc<RefCell<MockTarget>>> {
        self.controller.render_target()
    }

    /// The controller's drawable.
    pub fn drawable(&self) -> &D {
        self.controller.drawable()
    }
}

/// The [`HERO`] container id.
pub fn hero() -> ContainerId {
    ContainerId::from_existing_or_generate(Some(HERO))
}

/// Options parsed from JSON.
///
/// # Panics
///
/// Panics when `json` is not a valid option document; fixtures are static.
#[allow(clippy::panic)]
pub fn options(json: &str) -> SceneOptions {
    match SceneOptions::from_json_str(json) {
        Ok(options) => options,
        Err(err) => panic!("bad fixture options: {err}"),
    }
}

/// Options with breakpoints at 768 px (fov 60) and 1200 px (fov 45).
pub fn responsive_options() -> SceneOptions {
    options(
        r#"{
            "camera": { "fov": 75 },
            "responsive": {
                "768": { "camera": { "fov": 60 } },
                "1200": { "camera": { "fov": 45 } }
            }
        }"#,
    )
}
