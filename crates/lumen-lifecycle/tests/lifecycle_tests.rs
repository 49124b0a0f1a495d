// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Visibility-driven allocation, teardown and destroy.

#![allow(missing_docs, clippy::unwrap_used)]

use lumen_app_core::SceneOptions;
use lumen_dry_tests::{hero, options, CountingDrawable, Rig, DEFAULT_OBJECT_COUNT};
use lumen_lifecycle::LifecycleState;
use lumen_scene_port::{HostEvent, ListenerKind, RenderTarget, SceneError};

#[test]
fn construction_allocates_nothing() {
    let rig = Rig::new(SceneOptions::default());
    assert_eq!(rig.controller.state(), LifecycleState::Uninitialized);
    assert_eq!(rig.backend.targets_created(), 0);
    assert!(rig.host.active_listeners().is_empty());
}

#[test]
fn init_registers_listeners_but_defers_allocation() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.controller.init().unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Initialized);

    let kinds: Vec<_> = rig.host.active_listeners().iter().map(|h| h.kind).collect();
    assert_eq!(
        kinds,
        vec![ListenerKind::Visibility, ListenerKind::Resize, ListenerKind::Context]
    );
    assert_eq!(rig.backend.targets_created(), 0);
    assert!(rig.controller.camera().is_none());

    // Second init is a no-op.
    rig.controller.init().unwrap();
    assert_eq!(rig.host.listeners_registered(), 3);
}

#[test]
fn visibility_options_reach_the_observer() {
    let mut rig = Rig::new(options(
        r#"{ "visibility": { "threshold": 0.25, "rootMargin": "0px" } }"#,
    ));
    rig.controller.init().unwrap();
    let observed = rig.host.observed_visibility();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].0, hero());
    assert_eq!(observed[0].1.root_margin, "0px");
}

#[test]
fn failed_registration_rolls_back() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.host.set_fail_registration(Some(ListenerKind::Context));
    assert!(rig.controller.init().is_err());
    assert_eq!(rig.controller.state(), LifecycleState::Uninitialized);
    assert!(rig.host.active_listeners().is_empty());
    assert_eq!(rig.host.listeners_removed(), 2);

    rig.host.set_fail_registration(None);
    rig.controller.init().unwrap();
    assert_eq!(rig.host.active_listeners().len(), 3);
}

#[test]
fn visibility_before_init_is_ignored() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.controller.handle_visibility(true).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Uninitialized);
    assert_eq!(rig.backend.targets_created(), 0);
}

#[test]
fn default_container_scenario() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();

    assert_eq!(rig.controller.state(), LifecycleState::Visible);
    assert!(rig.registry.contains(&hero()));
    assert_eq!(rig.registry.len(), 1);
    assert_eq!(rig.host.pending_frames().len(), 1);

    let target = rig.target().unwrap();
    {
        let t = target.borrow();
        assert_eq!((t.size.width, t.size.height), (400, 300));
        assert!(t.is_surface_attached());
        assert_eq!(t.z_index, Some(0));
    }
    assert_eq!(rig.run_frames(1).unwrap(), 1);
    assert_eq!(target.borrow().render_count, 1);

    rig.hide().unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Initialized);
    assert!(!rig.registry.contains(&hero()));
    assert!(rig.host.pending_frames().is_empty());

    let t = target.borrow();
    assert!(t.disposed);
    assert!(!t.is_surface_attached());
    assert_eq!(t.live_geometry_count(), 0);
    assert_eq!(t.live_material_count(), 0);
    assert_eq!(t.double_disposals, 0);
}

#[test]
fn setup_precedes_first_update() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    assert_eq!(rig.drawable().setups, 1);
    assert_eq!(rig.drawable().updates, 0);

    rig.run_frames(3).unwrap();
    let drawable = rig.drawable();
    assert_eq!(drawable.updates, 3);
    let timing = drawable.last_timing.unwrap();
    assert_eq!(timing.frame_index, 2);
    assert!(timing.delta_ms > 0.0);
}

#[test]
fn enter_exit_enter_rebuilds_the_same_scene() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    let first_count = rig.controller.scene().unwrap().object_count();
    let first_target = rig.target().unwrap();
    assert_eq!(first_count, rig.drawable().objects_built);

    for cycle in 0..4 {
        rig.hide().unwrap();
        assert!(rig.controller.scene().is_none());
        assert!(rig.registry.is_empty());

        rig.controller.handle_visibility(true).unwrap();
        let scene = rig.controller.scene().unwrap();
        assert_eq!(scene.object_count(), first_count, "cycle {cycle}");
        assert_eq!(scene.geometry_count(), DEFAULT_OBJECT_COUNT as usize);
        assert_eq!(scene.material_count(), 1);
    }

    assert_eq!(rig.drawable().setups, 5);
    assert_eq!(rig.controller.epochs_started(), 5);
    assert_eq!(rig.backend.targets_created(), 5);
    assert_eq!(rig.backend.targets_live(), 1);
    assert!(first_target.borrow().disposed);
    assert!(!std::rc::Rc::ptr_eq(&first_target, &rig.target().unwrap()));
}

#[test]
fn scene_options_size_the_drawable() {
    let mut rig = Rig::new(options(r#"{ "scene": { "objects": 6 } }"#));
    rig.show().unwrap();
    // Six roots, five of them with one child.
    assert_eq!(rig.controller.scene().unwrap().object_count(), 11);
    rig.run_frames(1).unwrap();
    assert_eq!(rig.target().unwrap().borrow().last_draw_count, 11);
}

#[test]
fn allocation_failure_leaves_controller_inert() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.backend.set_fail_create(Some("webgl2 unavailable"));
    let err = rig.show().unwrap_err();
    assert!(matches!(err, SceneError::Allocation(_)));
    assert_eq!(rig.controller.state(), LifecycleState::Initialized);
    assert!(rig.registry.is_empty());
    assert!(rig.host.pending_frames().is_empty());
    assert!(rig.controller.camera().is_none());

    // Not retried automatically; the next entry tries again.
    rig.backend.set_fail_create(None);
    rig.controller.handle_visibility(true).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
}

#[test]
fn zero_size_container_is_a_configuration_error() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.host.set_container_size(&hero(), 400, 0);
    let err = rig.show().unwrap_err();
    assert!(matches!(err, SceneError::Configuration(_)));
    assert_eq!(rig.controller.state(), LifecycleState::Initialized);
    assert_eq!(rig.backend.targets_created(), 0);
}

#[test]
fn failing_setup_disposes_the_partial_scene() {
    let drawable = CountingDrawable {
        fail_setup: true,
        ..CountingDrawable::new()
    };
    let mut rig = Rig::with_drawable(SceneOptions::default(), drawable);
    assert!(rig.show().is_err());
    assert_eq!(rig.controller.state(), LifecycleState::Initialized);
    assert!(rig.registry.is_empty());
    assert_eq!(rig.backend.targets_live(), 0);
    assert!(rig.controller.scene().is_none());
}

#[test]
fn failing_attach_releases_the_target() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.controller.init().unwrap();
    // Pre-register a target that refuses to attach.
    let target = rig
        .registry
        .acquire(&hero(), &SceneOptions::default().renderer)
        .unwrap();
    target.borrow_mut().fail_attach = true;

    assert!(rig.controller.handle_visibility(true).is_err());
    assert!(target.borrow().disposed);
    assert!(rig.registry.is_empty());
    assert_eq!(rig.drawable().setups, 0);
}

#[test]
fn update_failure_stops_the_loop() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.controller.drawable_mut().fail_update = true;
    assert!(rig.run_frames(1).is_err());
    assert!(rig.host.pending_frames().is_empty());
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
}

#[test]
fn stale_frame_handles_are_ignored() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    let HostEvent::Frame { handle, .. } = rig.host.next_frame_event().unwrap() else {
        unreachable!("a frame was pending");
    };
    rig.controller.handle_frame(handle, 16.0).unwrap();
    assert_eq!(rig.drawable().updates, 1);

    // Same handle again: already consumed.
    rig.controller.handle_frame(handle, 32.0).unwrap();
    assert_eq!(rig.drawable().updates, 1);
    assert_eq!(rig.host.pending_frames().len(), 1);
}

#[test]
fn frame_fired_after_hide_does_nothing() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    let pending = rig.controller.pending_frame().unwrap();
    rig.hide().unwrap();
    rig.controller.handle_frame(pending, 16.0).unwrap();
    assert_eq!(rig.drawable().updates, 0);
    assert!(rig.host.pending_frames().is_empty());
}

#[test]
fn destroy_releases_everything() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.controller.handle_resize();
    let target = rig.target().unwrap();

    rig.controller.destroy();
    assert_eq!(rig.controller.state(), LifecycleState::Destroyed);
    assert!(rig.host.active_listeners().is_empty());
    assert_eq!(rig.host.unknown_removals(), 0);
    assert!(rig.host.pending_frames().is_empty());
    assert!(rig.host.pending_timers().is_empty());
    assert!(rig.controller.listener_handles().is_empty());
    assert!(target.borrow().disposed);
    assert!(rig.registry.is_empty());
}

#[test]
fn destroyed_controller_rejects_init_and_ignores_events() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.controller.destroy();

    assert!(matches!(rig.controller.init(), Err(SceneError::Destroyed)));
    rig.controller.handle_visibility(true).unwrap();
    rig.controller.handle_resize();
    rig.controller.handle_context_lost();
    rig.controller.handle_context_restored().unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Destroyed);
    assert_eq!(rig.backend.targets_created(), 1);
    assert!(rig.host.pending_timers().is_empty());
}

#[test]
fn destroy_before_init_is_harmless() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.controller.destroy();
    rig.controller.destroy();
    assert_eq!(rig.controller.state(), LifecycleState::Destroyed);
    assert_eq!(rig.host.listeners_removed(), 0);
}

#[test]
fn controllers_on_different_containers_share_a_registry() {
    let mut first = Rig::new(SceneOptions::default());
    let container = lumen_scene_port::ContainerId::generate();
    let mut second = Rig::attach(
        container.clone(),
        SceneOptions::default(),
        CountingDrawable::new(),
        lumen_dry_tests::ManualHost::new(),
        first.backend.clone(),
        first.registry.clone(),
    );
    first.show().unwrap();
    second.show().unwrap();
    assert_eq!(first.registry.container_ids(), {
        let mut ids = vec![hero(), container.clone()];
        ids.sort();
        ids
    });

    first.hide().unwrap();
    assert!(second.registry.contains(&container));
    assert_eq!(first.backend.targets_live(), 1);
}

#[test]
fn controllers_sharing_a_container_keep_the_target_until_both_leave() {
    let mut first = Rig::new(SceneOptions::default());
    let mut second = Rig::attach(
        hero(),
        SceneOptions::default(),
        CountingDrawable::new(),
        lumen_dry_tests::ManualHost::new(),
        first.backend.clone(),
        first.registry.clone(),
    );
    first.show().unwrap();
    second.show().unwrap();
    let shared = first.target().unwrap();
    assert!(std::rc::Rc::ptr_eq(&shared, &second.target().unwrap()));
    assert_eq!(first.backend.targets_created(), 1);
    assert_eq!(first.registry.holders(&hero()), 2);

    first.hide().unwrap();
    assert_eq!(second.controller.state(), LifecycleState::Visible);
    assert!(first.registry.contains(&hero()));
    assert!(!shared.borrow().disposed);
    assert!(shared.borrow().is_surface_attached());

    let rendered = shared.borrow().render_count;
    assert_eq!(second.run_frames(2).unwrap(), 2);
    assert_eq!(shared.borrow().render_count, rendered + 2);

    second.hide().unwrap();
    assert!(shared.borrow().disposed);
    assert!(!shared.borrow().is_surface_attached());
    assert!(first.registry.is_empty());
    assert_eq!(first.backend.targets_live(), 0);
}
