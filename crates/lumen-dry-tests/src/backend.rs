// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording render backend for headless lifecycle tests.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use glam::Mat4;
use lumen_app_core::RendererOptions;
use lumen_scene_port::{
    ContainerId, Dimensions, RenderBackend, RenderTarget, SceneError, SceneGraph,
};

/// Geometry handle produced by [`MockTarget::create_geometry`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockGeometry {
    /// Allocation id, unique per target.
    pub id: u32,
    /// Vertex count, for assertions.
    pub vertices: u32,
}

/// Material handle produced by [`MockTarget::create_material`].
#[derive(Debug, PartialEq)]
pub struct MockMaterial {
    /// Allocation id, unique per target.
    pub id: u32,
    /// RGBA colour.
    pub color: [f32; 4],
}

#[derive(Debug, Default)]
struct BackendLog {
    created: usize,
    disposed: usize,
    fail_create: Option<String>,
}

/// [`RenderBackend`] that builds [`MockTarget`]s.
///
/// Clones share counters, so tests can keep a handle after moving the
/// backend into a registry.
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    log: Rc<RefCell<BackendLog>>,
}

impl MockBackend {
    /// Backend that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make target creation fail with `reason` (`None` to recover).
    pub fn set_fail_create(&self, reason: Option<&str>) {
        self.log.borrow_mut().fail_create = reason.map(str::to_owned);
    }

    /// Targets created so far.
    pub fn targets_created(&self) -> usize {
        self.log.borrow().created
    }

    /// Targets disposed so far (first dispose of each target only).
    pub fn targets_disposed(&self) -> usize {
        self.log.borrow().disposed
    }

    /// Created minus disposed.
    pub fn targets_live(&self) -> usize {
        let log = self.log.borrow();
        log.created.saturating_sub(log.disposed)
    }
}

impl RenderBackend for MockBackend {
    type Target = MockTarget;

    fn create_target(
        &mut self,
        container: &ContainerId,
        options: &RendererOptions,
    ) -> Result<MockTarget, SceneError> {
        let mut log = self.log.borrow_mut();
        if let Some(reason) = &log.fail_create {
            return Err(SceneError::Allocation(reason.clone()));
        }
        log.created += 1;
        Ok(MockTarget {
            serial: log.created,
            container: container.clone(),
            options: options.clone(),
            size: Dimensions::new(0, 0),
            z_index: None,
            attach_count: 0,
            detach_count: 0,
            render_count: 0,
            last_draw_count: 0,
            last_view_projection: Mat4::IDENTITY,
            next_resource: 1,
            live_geometries: BTreeSet::new(),
            live_materials: BTreeSet::new(),
            geometries_disposed: 0,
            materials_disposed: 0,
            double_disposals: 0,
            context_lost: false,
            disposed: false,
            fail_attach: false,
            fail_render: false,
            fail_dispose_geometry: false,
            log: Rc::clone(&self.log),
        })
    }
}

/// Render target that records what was asked of it.
#[derive(Debug)]
pub struct MockTarget {
    /// Creation order across the backend, starting at 1.
    pub serial: usize,
    /// Container the target was created for.
    pub container: ContainerId,
    /// Options the target was created with.
    pub options: RendererOptions,
    /// Current size.
    pub size: Dimensions,
    /// `Some(z)` while the surface is attached.
    pub z_index: Option<i32>,
    /// Successful attaches.
    pub attach_count: u32,
    /// Detaches of an attached surface.
    pub detach_count: u32,
    /// Render calls.
    pub render_count: u32,
    /// Draw items seen by the latest render.
    pub last_draw_count: usize,
    /// Matrix passed to the latest render.
    pub last_view_projection: Mat4,
    next_resource: u32,
    live_geometries: BTreeSet<u32>,
    live_materials: BTreeSet<u32>,
    /// Geometries released through [`RenderTarget::dispose_geometry`].
    pub geometries_disposed: u32,
    /// Materials released through [`RenderTarget::dispose_material`].
    pub materials_disposed: u32,
    /// Releases of resources that were not live.
    pub double_disposals: u32,
    /// Set by [`RenderTarget::mark_context_lost`].
    pub context_lost: bool,
    /// Set by [`RenderTarget::dispose`].
    pub disposed: bool,
    /// Make [`RenderTarget::attach_surface`] fail.
    pub fail_attach: bool,
    /// Make [`RenderTarget::render`] fail.
    pub fail_render: bool,
    /// Make [`RenderTarget::dispose_geometry`] fail.
    pub fail_dispose_geometry: bool,
    log: Rc<RefCell<BackendLog>>,
}

impl MockTarget {
    /// Allocate a geometry.
    pub fn create_geometry(&mut self, vertices: u32) -> MockGeometry {
        let id = self.bump();
        self.live_geometries.insert(id);
        MockGeometry { id, vertices }
    }

    /// Allocate a material.
    pub fn create_material(&mut self, color: [f32; 4]) -> MockMaterial {
        let id = self.bump();
        self.live_materials.insert(id);
        MockMaterial { id, color }
    }

    /// Geometries allocated and not yet disposed.
    pub fn live_geometry_count(&self) -> usize {
        self.live_geometries.len()
    }

    /// Materials allocated and not yet disposed.
    pub fn live_material_count(&self) -> usize {
        self.live_materials.len()
    }

    fn bump(&mut self) -> u32 {
        let id = self.next_resource;
        self.next_resource += 1;
        id
    }
}

impl RenderTarget for MockTarget {
    type Geometry = MockGeometry;
    type Material = MockMaterial;

    fn set_size(&mut self, dimensions: Dimensions) {
        self.size = dimensions;
    }

    fn size(&self) -> Dimensions {
        self.size
    }

    fn attach_surface(&mut self, z_index: i32) -> Result<(), SceneError> {
        if self.fail_attach {
            return Err(SceneError::Backend("surface attach refused".into()));
        }
        if self.z_index.is_none() {
            self.z_index = Some(z_index);
            self.attach_count += 1;
        }
        Ok(())
    }

    fn detach_surface(&mut self) -> Result<(), SceneError> {
        if self.z_index.take().is_some() {
            self.detach_count += 1;
        }
        Ok(())
    }

    fn is_surface_attached(&self) -> bool {
        self.z_index.is_some()
    }

    fn render(&mut self, scene: &SceneGraph<Self>, view_projection: Mat4) -> Result<(), SceneError> {
        if self.context_lost {
            return Err(SceneError::ContextLost);
        }
        if self.fail_render {
            return Err(SceneError::Backend("draw failed".into()));
        }
        self.render_count += 1;
        self.last_draw_count = scene.draw_items().count();
        self.last_view_projection = view_projection;
        Ok(())
    }

    fn dispose_geometry(&mut self, geometry: MockGeometry) -> Result<(), SceneError> {
        if self.fail_dispose_geometry {
            return Err(SceneError::Backend(format!(
                "geometry {} delete failed",
                geometry.id
            )));
        }
        if self.live_geometries.remove(&geometry.id) {
            self.geometries_disposed += 1;
        } else {
            self.double_disposals += 1;
        }
        Ok(())
    }

    fn dispose_material(&mut self, material: MockMaterial) -> Result<(), SceneError> {
        if self.live_materials.remove(&material.id) {
            self.materials_disposed += 1;
        } else {
            self.double_disposals += 1;
        }
        Ok(())
    }

    fn mark_context_lost(&mut self) {
        self.context_lost = true;
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn dispose(&mut self) -> Result<(), SceneError> {
        if !self.disposed {
            self.disposed = true;
            self.z_index = None;
            self.log.borrow_mut().disposed += 1;
        }
        Ok(())
    }
}
