//! Property-based invariant tests for the interaction engine.
//!
//! ## Invariants
//!
//! 1. Drag band: with a capped overflow, a dragged position never leaves
//!    `[min - cap, max + cap]`.
//! 2. Settle: after any drag and release, a snapping model comes to rest
//!    exactly on a snap point inside its bounds, in either settle mode.
//! 3. No overshoot: a programmatic settle approaches its target from one
//!    side and lands on it.
//! 4. Crossfade: weights are in `[0, 1]` and sum to 1 across all slides.
//! 5. Snap resolution: every snap point resolves to its own index.
//! 6. Smoothing convergence: `frames_to_converge` frames of exponential
//!    smoothing bring the residual within tolerance.
//! 7. Scrub: published progress stays in `[0, 1]` and between its previous
//!    value and the raw value.
//! 8. Axis lock: once decided, a gesture's lock never changes.

use std::time::Duration;

use proptest::prelude::*;
use vitrine_core::geometry::{Rect, Viewport};
use vitrine_core::gesture::{
    GestureConfig, LockState, PointerEvent, PointerGestureTracker, PointerPhase,
};
use vitrine_core::motion::{Bounds, InertialMotionModel, MotionConfig, MotionPhase, SettleMode};
use vitrine_core::progress::{Extent, PinnedProgressAdapter, RangeSpec, ScrubConfig};
use vitrine_core::snap::{SnapPoints, crossfade_weight};
use vitrine_core::theme::frames_to_converge;
use web_time::Instant;

const MAX_STEPS: usize = 10_000;

// ── Strategies ────────────────────────────────────────────────────────────

fn arb_deltas() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-800.0f64..800.0, 1..40)
}

fn arb_layout() -> impl Strategy<Value = (usize, f64)> {
    (1usize..8, 50.0f64..1000.0)
}

fn arb_explicit_points() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..500.0, 1..12).prop_map(|gaps| {
        let mut at = -100.0;
        gaps.into_iter()
            .map(|gap| {
                at += gap;
                at
            })
            .collect()
    })
}

fn run_until_idle(model: &mut InertialMotionModel) -> usize {
    let mut steps = 0;
    while model.step() {
        steps += 1;
        if steps >= MAX_STEPS {
            break;
        }
    }
    steps
}

// ── 1. Drag band ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn capped_drag_stays_in_band(
        (count, spacing) in arb_layout(),
        cap in 0.0f64..300.0,
        deltas in arb_deltas(),
    ) {
        let bounds = Bounds::new(0.0, (count - 1) as f64 * spacing);
        let config = MotionConfig {
            max_overflow: Some(cap),
            ..MotionConfig::carousel()
        };
        let mut model = InertialMotionModel::new(config, bounds);
        model.begin_drag(None);
        for delta in deltas {
            model.drag_by(delta);
            let p = model.position();
            prop_assert!(
                p >= bounds.min - cap - 1e-9 && p <= bounds.max + cap + 1e-9,
                "position {p} outside band around {bounds:?} (cap {cap})"
            );
        }
    }
}

// ── 2. Settle on a snap point ─────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn release_comes_to_rest_on_snap_point(
        (count, spacing) in arb_layout(),
        deltas in arb_deltas(),
        velocity in -200.0f64..200.0,
    ) {
        let points = SnapPoints::uniform(count, spacing);
        let bounds = Bounds::new(0.0, (count - 1) as f64 * spacing);
        let mut model = InertialMotionModel::new(MotionConfig::carousel(), bounds)
            .with_snap_points(points.clone());

        model.begin_drag(None);
        for delta in deltas {
            model.drag_by(delta);
        }
        model.release(velocity);
        let steps = run_until_idle(&mut model);

        prop_assert!(steps < MAX_STEPS, "did not settle");
        prop_assert_eq!(model.phase(), MotionPhase::Idle);
        let rest = model.position();
        prop_assert!(bounds.contains(rest));
        let index = points.nearest_index(rest).unwrap();
        prop_assert_eq!(points.position(index), Some(rest));
    }

    #[test]
    fn zero_velocity_release_rests_on_snap_point_in_any_mode(
        (count, spacing) in arb_layout(),
        deltas in arb_deltas(),
        mode in prop_oneof![Just(SettleMode::Target), Just(SettleMode::Friction)],
    ) {
        let points = SnapPoints::uniform(count, spacing);
        let bounds = Bounds::new(0.0, (count - 1) as f64 * spacing);
        let config = match mode {
            SettleMode::Target => MotionConfig::carousel(),
            SettleMode::Friction => MotionConfig::scroller(),
        };
        let mut model = InertialMotionModel::new(config, bounds).with_snap_points(points.clone());

        model.begin_drag(None);
        for delta in deltas {
            model.drag_by(delta);
        }
        model.release(0.0);
        let steps = run_until_idle(&mut model);

        prop_assert!(steps < MAX_STEPS, "did not settle");
        prop_assert_eq!(model.phase(), MotionPhase::Idle);
        let rest = model.position();
        let on_point = (0..points.len()).any(|i| points.position(i) == Some(rest));
        prop_assert!(on_point, "{mode:?} rested at {rest}, off every snap point");
    }
}

// ── 3. No overshoot ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn settle_never_overshoots(
        start in -500.0f64..500.0,
        target in -500.0f64..500.0,
    ) {
        let mut model = InertialMotionModel::new(
            MotionConfig::carousel(),
            Bounds::new(-500.0, 500.0),
        );
        model.jump_to(start);
        model.settle_to(target);
        let side = (target - start).signum();
        let mut steps = 0;
        while model.step() {
            let residual = target - model.position();
            prop_assert!(residual == 0.0 || residual.signum() == side,
                "crossed target: residual {residual}");
            steps += 1;
            prop_assert!(steps < MAX_STEPS);
        }
        prop_assert_eq!(model.position(), target);
    }
}

// ── 4. Crossfade weights ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn crossfade_weights_partition_unity(
        count in 1usize..12,
        fraction in 0.0f64..=1.0,
    ) {
        let progress = fraction * (count - 1) as f64;
        let mut sum = 0.0;
        for i in 0..count {
            let w = crossfade_weight(progress, i);
            prop_assert!((0.0..=1.0).contains(&w));
            sum += w;
        }
        prop_assert!((sum - 1.0).abs() < 1e-9, "sum={sum} at {progress}");
    }
}

// ── 5. Snap resolution ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn explicit_points_resolve_to_themselves(points in arb_explicit_points()) {
        let snap = SnapPoints::explicit(points.clone());
        for (i, &p) in points.iter().enumerate() {
            prop_assert_eq!(snap.nearest_index(p), Some(i));
            prop_assert!((snap.progress_for_position(p) - i as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn uniform_points_resolve_exactly((count, spacing) in arb_layout()) {
        let snap = SnapPoints::uniform(count, spacing);
        for i in 0..count {
            let p = snap.position(i).unwrap();
            prop_assert_eq!(snap.nearest_index(p), Some(i));
            prop_assert_eq!(snap.progress_for_position(p), i as f64);
        }
    }
}

// ── 6. Smoothing convergence ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn smoothing_converges_within_predicted_frames(
        factor in 0.02f64..0.98,
        distance in 1.0f64..1000.0,
        tolerance in 1e-3f64..1.0,
    ) {
        let frames = frames_to_converge(factor, distance, tolerance);
        let mut current = 0.0;
        for _ in 0..frames {
            let before = distance - current;
            current += (distance - current) * factor;
            prop_assert!(distance - current <= before);
            prop_assert!(current <= distance);
        }
        prop_assert!(distance - current <= tolerance * (1.0 + 1e-6));
    }
}

// ── 7. Scrub ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn scrubbed_progress_moves_toward_raw(
        scrolls in prop::collection::vec(-500.0f64..2500.0, 1..60),
        dt_ms in 1u64..100,
    ) {
        let mut adapter = PinnedProgressAdapter::fixed(
            RangeSpec::pinned(Extent::Absolute(1000.0)),
            ScrubConfig::default(),
            Rect::new(0.0, 500.0, 1000.0, 800.0),
        );
        let mut previous: Option<f64> = None;
        for scroll in scrolls {
            let viewport = Viewport::new(1000.0, 800.0).with_scroll(scroll);
            adapter.update(&viewport, Duration::from_millis(dt_ms));
            let published = adapter.progress();
            let raw = adapter.raw_progress();
            prop_assert!((0.0..=1.0).contains(&published));
            if let Some(prev) = previous {
                let lo = prev.min(raw) - 1e-12;
                let hi = prev.max(raw) + 1e-12;
                prop_assert!(published >= lo && published <= hi);
            }
            previous = Some(published);
        }
    }
}

// ── 8. Axis lock ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn lock_is_decided_once(
        moves in prop::collection::vec((-40.0f64..40.0, -40.0f64..40.0), 1..30),
    ) {
        let mut tracker = PointerGestureTracker::new(GestureConfig::default());
        let t = Instant::now();
        tracker.handle(PointerEvent::mouse(PointerPhase::Down, 0.0, 0.0, t));
        let mut decided: Option<LockState> = None;
        for (i, (x, y)) in moves.into_iter().enumerate() {
            let at = t + Duration::from_millis(16 * (i as u64 + 1));
            tracker.handle(PointerEvent::mouse(PointerPhase::Move, x, y, at));
            let lock = tracker.lock().unwrap();
            match decided {
                Some(d) => prop_assert_eq!(lock, d),
                None if lock != LockState::Undecided => decided = Some(lock),
                None => {}
            }
        }
    }
}
