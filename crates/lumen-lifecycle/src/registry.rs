// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Render-target registry keyed by container id.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use lumen_app_core::RendererOptions;
use lumen_scene_port::{ContainerId, Dimensions, RenderBackend, RenderTarget, SceneError};
use tracing::{debug, trace, warn};

/// Shared handle to a registered target.
pub type TargetHandle<T> = Rc<RefCell<T>>;

/// Owns at most one render target per container.
///
/// Controllers share a registry through `Rc`; all mutation goes through
/// interior `RefCell`s so the registry itself is never borrowed mutably.
/// Each target counts its holders and is disposed when the last one
/// releases it.
pub struct RenderTargetRegistry<B: RenderBackend> {
    backend: RefCell<B>,
    targets: RefCell<BTreeMap<ContainerId, Entry<B::Target>>>,
}

struct Entry<T> {
    target: TargetHandle<T>,
    holders: usize,
}

impl<B: RenderBackend> RenderTargetRegistry<B> {
    /// Empty registry creating targets through `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend: RefCell::new(backend),
            targets: RefCell::new(BTreeMap::new()),
        }
    }

    /// Convenience for `Rc::new(RenderTargetRegistry::new(backend))`.
    pub fn shared(backend: B) -> Rc<Self> {
        Rc::new(Self::new(backend))
    }

    /// Existing target for `container`, or a newly created one. Either way
    /// the caller becomes a holder and owes one [`release`](Self::release).
    ///
    /// `options` only apply on creation; an existing target keeps the
    /// options it was built with. Backend failures surface as
    /// [`SceneError::Allocation`]; a missing container stays a
    /// configuration error.
    pub fn acquire(
        &self,
        container: &ContainerId,
        options: &RendererOptions,
    ) -> Result<TargetHandle<B::Target>, SceneError> {
        if let Some(entry) = self.targets.borrow_mut().get_mut(container) {
            entry.holders += 1;
            trace!(container = %container, holders = entry.holders, "render target reused");
            return Ok(Rc::clone(&entry.target));
        }
        let target = self
            .backend
            .borrow_mut()
            .create_target(container, options)
            .map_err(|err| match err {
                SceneError::Backend(msg) => SceneError::Allocation(msg),
                other => other,
            })?;
        let handle = Rc::new(RefCell::new(target));
        self.targets.borrow_mut().insert(
            container.clone(),
            Entry {
                target: Rc::clone(&handle),
                holders: 1,
            },
        );
        debug!(container = %container, "render target created");
        Ok(handle)
    }

    /// Target registered for `container`, if any.
    pub fn get(&self, container: &ContainerId) -> Option<TargetHandle<B::Target>> {
        self.targets
            .borrow()
            .get(container)
            .map(|entry| Rc::clone(&entry.target))
    }

    /// Current holder count for `container`; zero when unregistered.
    pub fn holders(&self, container: &ContainerId) -> usize {
        self.targets
            .borrow()
            .get(container)
            .map_or(0, |entry| entry.holders)
    }

    /// Drop one hold on the target for `container`, disposing and
    /// forgetting it when no holders remain.
    ///
    /// Returns `false` when nothing was registered.
    pub fn release(&self, container: &ContainerId) -> bool {
        let handle = {
            let mut targets = self.targets.borrow_mut();
            let Some(entry) = targets.get_mut(container) else {
                return false;
            };
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders > 0 {
                trace!(container = %container, holders = entry.holders, "render target still held");
                return true;
            }
            match targets.remove(container) {
                Some(entry) => entry.target,
                None => return false,
            }
        };
        dispose_target(container, &handle);
        debug!(container = %container, "render target released");
        true
    }

    /// Resize every target, keeping each one's pixel ratio.
    pub fn resize_all(&self, width: u32, height: u32) {
        for (container, entry) in self.targets.borrow().iter() {
            match entry.target.try_borrow_mut() {
                Ok(mut target) => {
                    let pixel_ratio = target.size().pixel_ratio;
                    target.set_size(Dimensions {
                        width,
                        height,
                        pixel_ratio,
                    });
                }
                Err(_) => warn!(container = %container, "target busy; resize skipped"),
            }
        }
    }

    /// Dispose and forget every target whatever its holder count. Returns
    /// how many were released.
    pub fn dispose_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.targets.borrow_mut());
        for (container, entry) in &drained {
            dispose_target(container, &entry.target);
        }
        drained.len()
    }

    /// Forget every target after a context loss, flagging each as lost
    /// without issuing GPU deletes. Returns how many were invalidated.
    pub fn invalidate_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.targets.borrow_mut());
        for (container, entry) in &drained {
            match entry.target.try_borrow_mut() {
                Ok(mut target) => target.mark_context_lost(),
                Err(_) => warn!(container = %container, "target busy; not marked lost"),
            }
        }
        drained.len()
    }

    /// Whether `container` has a registered target.
    pub fn contains(&self, container: &ContainerId) -> bool {
        self.targets.borrow().contains_key(container)
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.targets.borrow().len()
    }

    /// True when no target is registered.
    pub fn is_empty(&self) -> bool {
        self.targets.borrow().is_empty()
    }

    /// Registered container ids in order.
    pub fn container_ids(&self) -> Vec<ContainerId> {
        self.targets.borrow().keys().cloned().collect()
    }

    /// Run `f` against the backend.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.backend.borrow_mut())
    }
}

fn dispose_target<T: RenderTarget>(container: &ContainerId, handle: &RefCell<T>) {
    match handle.try_borrow_mut() {
        Ok(mut target) => {
            if let Err(err) = target.dispose() {
                warn!(container = %container, error = %err, "render target dispose failed");
            }
        }
        Err(_) => warn!(container = %container, "target busy; dispose skipped"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use glam::Mat4;
    use lumen_scene_port::SceneGraph;

    #[derive(Debug, Default)]
    struct StubTarget {
        size: Option<Dimensions>,
        disposed: u32,
        lost: bool,
    }

    impl RenderTarget for StubTarget {
        type Geometry = ();
        type Material = ();

        fn set_size(&mut self, dimensions: Dimensions) {
            self.size = Some(dimensions);
        }
        fn size(&self) -> Dimensions {
            self.size.unwrap_or(Dimensions::new(0, 0))
        }
        fn attach_surface(&mut self, _z_index: i32) -> Result<(), SceneError> {
            Ok(())
        }
        fn detach_surface(&mut self) -> Result<(), SceneError> {
            Ok(())
        }
        fn is_surface_attached(&self) -> bool {
            false
        }
        fn render(&mut self, _scene: &SceneGraph<Self>, _vp: Mat4) -> Result<(), SceneError> {
            Ok(())
        }
        fn dispose_geometry(&mut self, _geometry: ()) -> Result<(), SceneError> {
            Ok(())
        }
        fn dispose_material(&mut self, _material: ()) -> Result<(), SceneError> {
            Ok(())
        }
        fn mark_context_lost(&mut self) {
            self.lost = true;
        }
        fn is_context_lost(&self) -> bool {
            self.lost
        }
        fn dispose(&mut self) -> Result<(), SceneError> {
            self.disposed += 1;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct StubBackend {
        created: u32,
        fail_with: Option<&'static str>,
    }

    impl RenderBackend for StubBackend {
        type Target = StubTarget;

        fn create_target(
            &mut self,
            _container: &ContainerId,
            _options: &RendererOptions,
        ) -> Result<StubTarget, SceneError> {
            if let Some(msg) = self.fail_with {
                return Err(SceneError::Backend(msg.into()));
            }
            self.created += 1;
            Ok(StubTarget::default())
        }
    }

    fn id(s: &str) -> ContainerId {
        ContainerId::new(s).unwrap()
    }

    #[test]
    fn acquire_reuses_until_release() {
        let registry = RenderTargetRegistry::new(StubBackend::default());
        let first = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        let again = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        assert_eq!(registry.holders(&id("a")), 2);

        assert!(registry.release(&id("a")));
        assert!(registry.release(&id("a")));
        assert_eq!(first.borrow().disposed, 1);
        let fresh = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        assert!(!Rc::ptr_eq(&first, &fresh));
        assert_eq!(registry.with_backend(|b| b.created), 2);
    }

    #[test]
    fn release_of_unknown_container_is_a_no_op() {
        let registry = RenderTargetRegistry::new(StubBackend::default());
        assert!(!registry.release(&id("nowhere")));
        let target = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        assert!(registry.release(&id("a")));
        assert!(!registry.release(&id("a")));
        assert_eq!(target.borrow().disposed, 1);
    }

    #[test]
    fn shared_target_survives_until_last_release() {
        let registry = RenderTargetRegistry::new(StubBackend::default());
        let target = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        registry.acquire(&id("a"), &RendererOptions::default()).unwrap();

        assert!(registry.release(&id("a")));
        assert_eq!(target.borrow().disposed, 0);
        assert!(registry.contains(&id("a")));
        assert_eq!(registry.holders(&id("a")), 1);

        assert!(registry.release(&id("a")));
        assert_eq!(target.borrow().disposed, 1);
        assert_eq!(registry.holders(&id("a")), 0);
        assert!(!registry.release(&id("a")));
        assert_eq!(target.borrow().disposed, 1);
        assert_eq!(registry.with_backend(|b| b.created), 1);
    }

    #[test]
    fn backend_failures_become_allocation_errors() {
        let registry = RenderTargetRegistry::new(StubBackend {
            fail_with: Some("no webgl2"),
            ..StubBackend::default()
        });
        let err = registry
            .acquire(&id("a"), &RendererOptions::default())
            .unwrap_err();
        assert!(matches!(err, SceneError::Allocation(msg) if msg.contains("no webgl2")));
        assert!(registry.is_empty());
    }

    #[test]
    fn invalidate_all_marks_lost_without_disposing() {
        let registry = RenderTargetRegistry::new(StubBackend::default());
        let a = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        let b = registry.acquire(&id("b"), &RendererOptions::default()).unwrap();
        assert_eq!(registry.container_ids(), vec![id("a"), id("b")]);

        assert_eq!(registry.invalidate_all(), 2);
        assert!(registry.is_empty());
        for target in [&a, &b] {
            assert!(target.borrow().lost);
            assert_eq!(target.borrow().disposed, 0);
        }
    }

    #[test]
    fn resize_all_keeps_pixel_ratio() {
        let registry = RenderTargetRegistry::new(StubBackend::default());
        let a = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        a.borrow_mut()
            .set_size(Dimensions::new(10, 10).with_pixel_ratio(2.0, 2.0));
        registry.resize_all(640, 480);
        let size = a.borrow().size();
        assert_eq!((size.width, size.height), (640, 480));
        assert!((size.pixel_ratio - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn dispose_all_empties_the_registry() {
        let registry = RenderTargetRegistry::new(StubBackend::default());
        let a = registry.acquire(&id("a"), &RendererOptions::default()).unwrap();
        registry.acquire(&id("b"), &RendererOptions::default()).unwrap();
        assert_eq!(registry.dispose_all(), 2);
        assert_eq!(registry.len(), 0);
        assert!(!registry.contains(&id("a")));
        assert_eq!(a.borrow().disposed, 1);
    }
}
