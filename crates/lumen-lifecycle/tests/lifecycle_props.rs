// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property tests over arbitrary host event sequences.

#![allow(missing_docs, clippy::unwrap_used)]

use lumen_dry_tests::{responsive_options, Rig};
use lumen_lifecycle::LifecycleState;
use lumen_scene_port::{HostEvent, RenderTarget};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Visibility(bool),
    Resize(u32),
    Frames(usize),
    Advance(u32),
    ContextLost,
    ContextRestored,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<bool>().prop_map(Op::Visibility),
        2 => prop_oneof![Just(360u32), Just(800), Just(1024), Just(1400)].prop_map(Op::Resize),
        3 => (0usize..4).prop_map(Op::Frames),
        2 => (0u32..600).prop_map(Op::Advance),
        1 => Just(Op::ContextLost),
        1 => Just(Op::ContextRestored),
    ]
}

fn apply(rig: &mut Rig, op: &Op) -> Result<(), TestCaseError> {
    match *op {
        Op::Visibility(v) => prop_assert!(rig.controller.handle_visibility(v).is_ok()),
        Op::Resize(width) => {
            rig.host.set_viewport_width(width);
            rig.controller.handle_event(HostEvent::Resize).unwrap();
        }
        Op::Frames(n) => prop_assert!(rig.run_frames(n).is_ok()),
        Op::Advance(ms) => prop_assert!(rig.advance(ms).is_ok()),
        Op::ContextLost => rig.controller.handle_context_lost(),
        Op::ContextRestored => prop_assert!(rig.controller.handle_context_restored().is_ok()),
    }
    Ok(())
}

fn check_invariants(rig: &Rig) -> Result<(), TestCaseError> {
    let state = rig.controller.state();
    if !rig.controller.is_intersecting() {
        prop_assert!(rig.host.pending_frames().is_empty(), "frame pending while hidden");
    }
    if state != LifecycleState::Visible {
        prop_assert!(rig.controller.pending_frame().is_none());
    }
    prop_assert!(rig.host.pending_frames().len() <= 1);
    prop_assert!(rig.registry.len() <= 1);

    match rig.target() {
        Some(target) => {
            prop_assert!(state.has_surface(), "resources held in {state}");
            prop_assert!(target.borrow().is_surface_attached());
        }
        None => prop_assert!(!state.has_surface(), "{state} without resources"),
    }
    Ok(())
}

proptest! {
    #[test]
    fn no_frame_is_scheduled_while_hidden(ops in prop::collection::vec(op(), 1..60)) {
        let mut rig = Rig::new(responsive_options());
        rig.controller.init().unwrap();
        for op in &ops {
            apply(&mut rig, op)?;
            check_invariants(&rig)?;
        }
    }

    #[test]
    fn teardown_never_leaks(ops in prop::collection::vec(op(), 1..60)) {
        let mut rig = Rig::new(responsive_options());
        rig.controller.init().unwrap();
        for op in &ops {
            apply(&mut rig, op)?;
        }
        rig.controller.handle_visibility(false).unwrap();
        if rig.controller.state() != LifecycleState::ContextLost {
            prop_assert_eq!(rig.controller.state(), LifecycleState::Initialized);
        }
        prop_assert!(rig.registry.is_empty());
        prop_assert!(rig.host.pending_frames().is_empty());
        prop_assert!(rig.controller.scene().is_none());
    }

    #[test]
    fn destroy_is_idempotent(
        ops in prop::collection::vec(op(), 0..30),
        repeats in 1usize..6,
    ) {
        let mut rig = Rig::new(responsive_options());
        rig.controller.init().unwrap();
        for op in &ops {
            apply(&mut rig, op)?;
        }

        rig.controller.destroy();
        let removed = rig.host.listeners_removed();
        let disposed = rig.backend.targets_disposed();
        for _ in 1..repeats {
            rig.controller.destroy();
        }

        prop_assert_eq!(rig.controller.state(), LifecycleState::Destroyed);
        prop_assert_eq!(rig.host.listeners_removed(), removed);
        prop_assert_eq!(rig.backend.targets_disposed(), disposed);
        prop_assert_eq!(rig.host.unknown_removals(), 0);
        prop_assert!(rig.host.active_listeners().is_empty());
        prop_assert!(rig.host.pending_frames().is_empty());
        prop_assert!(rig.host.pending_timers().is_empty());
        prop_assert!(rig.registry.is_empty());
        prop_assert!(rig.controller.pending_frame().is_none());
        prop_assert!(!rig.controller.has_pending_resize());
    }
}
