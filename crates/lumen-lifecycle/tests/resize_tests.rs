// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Debounced resize: in-place resize versus breakpoint rebuild.

#![allow(missing_docs, clippy::unwrap_used)]

use std::rc::Rc;

use approx::assert_relative_eq;
use lumen_app_core::SceneOptions;
use lumen_dry_tests::{hero, options, responsive_options, Rig};
use lumen_lifecycle::LifecycleState;
use lumen_scene_port::SceneError;

#[test]
fn fifty_resizes_collapse_into_one_action() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.host.set_container_size(&hero(), 640, 320);

    for _ in 0..50 {
        rig.controller.handle_resize();
    }
    assert_eq!(rig.controller.state(), LifecycleState::Resizing);
    assert_eq!(rig.host.timers_set(), 50);
    assert_eq!(rig.host.pending_timers().len(), 1);

    assert_eq!(rig.advance(300).unwrap(), 1);
    assert_eq!(rig.drawable().resizes, 1);
    assert_eq!(rig.drawable().setups, 1);
    assert_eq!(rig.backend.targets_created(), 1);
}

#[test]
fn animation_pauses_until_settle_elapses() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.run_frames(2).unwrap();

    rig.controller.handle_resize();
    assert!(rig.host.pending_frames().is_empty());
    assert_eq!(rig.host.frames_cancelled(), 1);

    rig.advance(300).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Resizing);
    assert!(rig.host.pending_frames().is_empty());
    assert_eq!(rig.host.pending_timers()[0].1, 200);

    rig.advance(199).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Resizing);
    rig.advance(1).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
    assert_eq!(rig.host.pending_frames().len(), 1);
    assert!(!rig.controller.has_pending_resize());
}

#[test]
fn custom_timing_is_honoured() {
    let mut rig = Rig::new(options(
        r#"{ "timing": { "debounceMs": 50, "settleMs": 10 } }"#,
    ));
    rig.show().unwrap();
    rig.controller.handle_resize();
    assert_eq!(rig.host.pending_timers()[0].1, 50);
    rig.advance(60).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
}

#[test]
fn unchanged_breakpoint_resizes_in_place() {
    let mut rig = Rig::new(responsive_options());
    rig.show().unwrap();
    let before = rig.target().unwrap();
    assert_eq!(rig.controller.active_breakpoint(), Some(768));

    rig.host.set_viewport_width(1100);
    rig.host.set_container_size(&hero(), 800, 400);
    rig.controller.handle_resize();
    rig.advance(500).unwrap();

    let after = rig.target().unwrap();
    assert!(Rc::ptr_eq(&before, &after));
    assert_eq!((after.borrow().size.width, after.borrow().size.height), (800, 400));
    assert_relative_eq!(rig.controller.camera().unwrap().aspect().unwrap(), 2.0);
    assert_eq!(rig.drawable().setups, 1);
    assert_eq!(rig.drawable().resizes, 1);
    assert_eq!(rig.drawable().last_dimensions.unwrap().width, 800);
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
}

#[test]
fn changed_breakpoint_rebuilds() {
    let mut rig = Rig::new(responsive_options());
    rig.show().unwrap();
    let before = rig.target().unwrap();
    assert_relative_eq!(
        rig.controller.camera().unwrap().options().fov_y_degrees,
        60.0
    );

    rig.host.set_viewport_width(1300);
    rig.controller.handle_resize();
    rig.advance(300).unwrap();

    assert!(before.borrow().disposed);
    let after = rig.target().unwrap();
    assert!(!Rc::ptr_eq(&before, &after));
    assert!(after.borrow().z_index.is_some());
    assert_eq!(rig.controller.active_breakpoint(), Some(1200));
    assert_relative_eq!(
        rig.controller.camera().unwrap().options().fov_y_degrees,
        45.0
    );
    assert_eq!(rig.drawable().setups, 2);
    assert_eq!(rig.drawable().resizes, 0);
    assert_eq!(rig.registry.len(), 1);

    rig.advance(200).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
    rig.run_frames(1).unwrap();
    assert_eq!(after.borrow().render_count, 1);
}

#[test]
fn shrinking_below_every_breakpoint_rebuilds_with_base_options() {
    let mut rig = Rig::new(responsive_options());
    rig.show().unwrap();
    rig.host.set_viewport_width(360);
    rig.controller.handle_resize();
    rig.advance(500).unwrap();

    assert_eq!(rig.controller.active_breakpoint(), None);
    assert_relative_eq!(rig.controller.effective_options().camera.fov_y_degrees, 75.0);
    assert_eq!(rig.drawable().setups, 2);
}

#[test]
fn failed_rebuild_leaves_controller_initialized() {
    let mut rig = Rig::new(responsive_options());
    rig.show().unwrap();
    rig.backend.set_fail_create(Some("context limit reached"));
    rig.host.set_viewport_width(1300);
    rig.controller.handle_resize();

    let err = rig.advance(300).unwrap_err();
    assert!(matches!(err, SceneError::Allocation(_)));
    assert_eq!(rig.controller.state(), LifecycleState::Initialized);
    assert!(rig.registry.is_empty());
    assert!(rig.host.pending_frames().is_empty());
    assert!(rig.host.pending_timers().is_empty());
}

#[test]
fn resize_while_hidden_is_ignored() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.controller.init().unwrap();
    rig.controller.handle_resize();
    assert_eq!(rig.controller.state(), LifecycleState::Initialized);
    assert_eq!(rig.host.timers_set(), 0);
}

#[test]
fn leaving_the_viewport_mid_resize_cancels_timers() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.controller.handle_resize();
    rig.hide().unwrap();

    assert_eq!(rig.controller.state(), LifecycleState::Initialized);
    assert!(rig.host.pending_timers().is_empty());
    assert_eq!(rig.advance(1000).unwrap(), 0);
    assert!(rig.host.pending_frames().is_empty());
    assert!(rig.registry.is_empty());
}

#[test]
fn resizing_again_during_settle_restarts_the_debounce() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.controller.handle_resize();
    rig.advance(300).unwrap();
    assert_eq!(rig.drawable().resizes, 1);

    // Settle armed; a new resize clears it and debounces again.
    rig.advance(100).unwrap();
    rig.controller.handle_resize();
    rig.advance(150).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Resizing);
    rig.advance(150).unwrap();
    assert_eq!(rig.drawable().resizes, 2);
    rig.advance(200).unwrap();
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
}

#[test]
fn collapsed_container_keeps_previous_size() {
    let mut rig = Rig::new(SceneOptions::default());
    rig.show().unwrap();
    rig.host.set_container_size(&hero(), 0, 0);
    rig.controller.handle_resize();
    rig.advance(500).unwrap();

    let target = rig.target().unwrap();
    assert_eq!(target.borrow().size.width, 400);
    assert_eq!(rig.drawable().resizes, 0);
    assert_eq!(rig.controller.state(), LifecycleState::Visible);
}

#[test]
fn pixel_ratio_is_capped_by_renderer_options() {
    let mut rig = Rig::new(options(r#"{ "renderer": { "maxPixelRatio": 1.5 } }"#));
    rig.host.set_device_pixel_ratio(3.0);
    rig.show().unwrap();
    let target = rig.target().unwrap();
    assert_relative_eq!(target.borrow().size.pixel_ratio, 1.5);
    assert_eq!(target.borrow().size.physical_size(), (600, 450));
}
