#![forbid(unsafe_code)]

//! Discrete swipe switcher (the bottle switcher).
//!
//! A horizontal release displacement beyond the swipe threshold moves one
//! slide: swiping left (start − end > 0) goes to the next slide, right to the
//! previous, wrapping at both ends. The slide itself does not follow the
//! finger; the switch animates once the gesture is decided.
//!
//! While a transition is settling the switcher is locked: further swipes and
//! selections are dropped, not queued. Selecting the current slide is a
//! no-op.
//!
//! Each slide carries a [`ThemeIntent`], published as soon as a switch
//! starts so the header can use it as its fallback.

use vitrine_core::config::{EngineConfig, SwitcherConfig};
use vitrine_core::error::FrameResult;
use vitrine_core::geometry::Axis;
use vitrine_core::gesture::{
    CaptureCommand, GestureConfig, GestureOutput, LockState, PointerEvent, PointerGestureTracker,
};
use vitrine_core::motion::{Bounds, InertialMotionModel, MotionConfig};
use vitrine_core::notify::{Listener, Notifier};
use vitrine_core::snap::{CarouselState, IndexChange, SnapIndexResolver, SnapPoints};
use vitrine_core::theme::ThemeIntent;

use crate::{FrameContext, FrameWidget, PointerInbox};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchRequest {
    Next,
    Previous,
    Select(usize),
}

/// Swipe-driven slide switcher.
#[derive(Debug)]
pub struct SlideSwitcher {
    intents: Vec<ThemeIntent>,
    config: SwitcherConfig,
    tracker: PointerGestureTracker,
    motion: InertialMotionModel,
    resolver: SnapIndexResolver,
    inbox: PointerInbox,
    request: Option<SwitchRequest>,
    index: usize,
    animating: bool,
    intent_changed: Notifier<ThemeIntent>,
}

impl SlideSwitcher {
    /// A switcher over slides with the given theme intents. Positions are in
    /// slide units.
    #[must_use]
    pub fn new(
        intents: Vec<ThemeIntent>,
        config: SwitcherConfig,
        gesture: GestureConfig,
        motion: MotionConfig,
    ) -> Self {
        let count = intents.len();
        let points = SnapPoints::uniform(count, 1.0);
        let bounds = Bounds::new(0.0, count.saturating_sub(1) as f64);
        Self {
            intents,
            config,
            tracker: PointerGestureTracker::new(gesture),
            motion: InertialMotionModel::new(motion, bounds).with_snap_points(points.clone()),
            resolver: SnapIndexResolver::new(points),
            inbox: PointerInbox::default(),
            request: None,
            index: 0,
            animating: false,
            intent_changed: Notifier::new(),
        }
    }

    #[must_use]
    pub fn from_config(intents: Vec<ThemeIntent>, config: &EngineConfig) -> Self {
        Self::new(
            intents,
            config.switcher.clone(),
            config.gesture.clone(),
            config.motion.switcher.clone(),
        )
    }

    #[must_use]
    pub fn with_defaults(intents: Vec<ThemeIntent>) -> Self {
        Self::new(
            intents,
            SwitcherConfig::default(),
            GestureConfig::default(),
            MotionConfig::switcher(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// The slide being switched to (or resting on).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Intent of the current slide; `None` for an empty switcher.
    #[must_use]
    pub fn active_intent(&self) -> Option<ThemeIntent> {
        self.intents.get(self.index).copied()
    }

    /// Visual state: continuous progress and the slide under it.
    #[must_use]
    pub fn state(&self) -> CarouselState {
        self.resolver.state()
    }

    #[must_use]
    pub fn crossfade_weight(&self, index: usize) -> f64 {
        self.resolver.crossfade_weight(index)
    }

    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_index_changed(&self, callback: impl FnMut(&IndexChange) + 'static) -> Listener {
        self.resolver.on_index_changed(callback)
    }

    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_intent_changed(&self, callback: impl FnMut(&ThemeIntent) + 'static) -> Listener {
        self.intent_changed.subscribe(callback)
    }

    pub fn next(&mut self) {
        self.request = Some(SwitchRequest::Next);
    }

    pub fn previous(&mut self) {
        self.request = Some(SwitchRequest::Previous);
    }

    pub fn select(&mut self, index: usize) {
        self.request = Some(SwitchRequest::Select(index));
    }

    fn handle_pointer(&mut self, event: PointerEvent) {
        match self.tracker.handle(event) {
            GestureOutput::Began(command) | GestureOutput::Cancelled(command) => {
                self.inbox.emit(command);
            }
            GestureOutput::Ended(release) => {
                self.inbox.emit(release.capture);
                if matches!(release.lock, LockState::PassThrough(_)) {
                    return;
                }
                let diff = -release.displacement.along(Axis::Horizontal);
                if diff > self.config.swipe_threshold {
                    self.request = Some(SwitchRequest::Next);
                } else if diff < -self.config.swipe_threshold {
                    self.request = Some(SwitchRequest::Previous);
                }
            }
            GestureOutput::Moved(_) => {}
            GestureOutput::Ignored(reason) => {
                tracing::trace!(?reason, "switcher pointer ignored");
            }
        }
    }

    fn apply(&mut self, request: SwitchRequest) {
        let count = self.intents.len();
        if count == 0 {
            return;
        }
        if self.animating {
            tracing::trace!(?request, "switch ignored while animating");
            return;
        }
        let last = count - 1;
        let target = match request {
            SwitchRequest::Next if self.index == last => {
                if self.config.wrap { 0 } else { last }
            }
            SwitchRequest::Next => self.index + 1,
            SwitchRequest::Previous if self.index == 0 => {
                if self.config.wrap { last } else { 0 }
            }
            SwitchRequest::Previous => self.index - 1,
            SwitchRequest::Select(index) => index.min(last),
        };
        if target == self.index {
            return;
        }
        tracing::debug!(from = self.index, to = target, "slide switch");
        self.index = target;
        self.animating = true;
        self.motion.settle_to(target as f64);
        let intent = self.intents[target];
        self.intent_changed.emit(&intent);
    }
}

impl FrameWidget for SlideSwitcher {
    fn label(&self) -> &'static str {
        "slide-switcher"
    }

    fn frame(&mut self, _ctx: &FrameContext<'_>) -> FrameResult {
        for event in self.inbox.take_events() {
            self.handle_pointer(event);
        }
        if let Some(request) = self.request.take() {
            self.apply(request);
        }
        self.motion.step();
        self.resolver.update_from_position(self.motion.position());
        if self.animating && self.motion.is_idle() {
            self.animating = false;
            tracing::debug!(index = self.index, "slide switch settled");
        }
        Ok(())
    }

    fn push_pointer(&mut self, event: PointerEvent) {
        self.inbox.push(event);
    }

    fn take_capture_commands(&mut self) -> Vec<CaptureCommand> {
        self.inbox.take_commands()
    }

    fn unmount(&mut self) -> Option<CaptureCommand> {
        self.inbox.clear();
        self.tracker.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vitrine_core::geometry::Viewport;
    use vitrine_core::gesture::PointerPhase;
    use vitrine_core::scheduler::FrameInfo;
    use vitrine_core::theme::ThemeZoneRegistry;
    use web_time::Instant;

    fn run(switcher: &mut SlideSwitcher, frames: usize) {
        let zones = ThemeZoneRegistry::new();
        for i in 0..frames {
            let ctx = FrameContext {
                info: FrameInfo {
                    frame: i as u64 + 1,
                    now: Instant::now(),
                    dt: Duration::from_millis(16),
                },
                viewport: Viewport::new(1000.0, 800.0),
                zones: &zones,
            };
            switcher.frame(&ctx).unwrap();
        }
    }

    fn swipe(switcher: &mut SlideSwitcher, from: f64, to: f64) {
        let t = Instant::now();
        let ms = Duration::from_millis(16);
        switcher.push_pointer(PointerEvent::mouse(PointerPhase::Down, from, 400.0, t));
        switcher.push_pointer(PointerEvent::mouse(PointerPhase::Move, to, 400.0, t + ms));
        switcher.push_pointer(PointerEvent::mouse(PointerPhase::Up, to, 400.0, t + ms * 2));
    }

    fn bottles() -> SlideSwitcher {
        SlideSwitcher::with_defaults(vec![ThemeIntent::Light, ThemeIntent::Dark])
    }

    #[test]
    fn short_swipe_does_nothing() {
        let mut s = bottles();
        swipe(&mut s, 500.0, 460.0);
        run(&mut s, 1);
        assert_eq!(s.index(), 0);
        assert!(!s.is_animating());
    }

    #[test]
    fn swipe_right_wraps_to_last() {
        let mut s = bottles();
        swipe(&mut s, 400.0, 480.0);
        run(&mut s, 1);
        assert_eq!(s.index(), 1);
        assert_eq!(s.active_intent(), Some(ThemeIntent::Dark));
    }

    #[test]
    fn locked_while_animating() {
        let mut s = bottles();
        s.next();
        run(&mut s, 1);
        assert!(s.is_animating());
        s.next();
        run(&mut s, 1);
        assert_eq!(s.index(), 1);

        run(&mut s, 500);
        assert!(!s.is_animating());
        assert_eq!(s.state().continuous_progress, 1.0);
        s.next();
        run(&mut s, 1);
        assert_eq!(s.index(), 0);
    }

    #[test]
    fn select_current_is_noop() {
        let mut s = bottles();
        s.select(0);
        run(&mut s, 1);
        assert!(!s.is_animating());
        s.select(7);
        run(&mut s, 1);
        assert_eq!(s.index(), 1);
    }

    #[test]
    fn no_wrap_clamps() {
        let mut s = SlideSwitcher::new(
            vec![ThemeIntent::Light, ThemeIntent::Dark],
            SwitcherConfig {
                wrap: false,
                ..SwitcherConfig::default()
            },
            GestureConfig::default(),
            MotionConfig::switcher(),
        );
        s.previous();
        run(&mut s, 1);
        assert_eq!(s.index(), 0);
        assert!(!s.is_animating());
    }

    #[test]
    fn intent_published_on_switch_start() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut s = bottles();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let _guard = s.on_intent_changed(move |i| log.borrow_mut().push(*i));
        s.next();
        run(&mut s, 1);
        assert_eq!(*seen.borrow(), vec![ThemeIntent::Dark]);
    }

    #[test]
    fn empty_switcher_is_inert() {
        let mut s = SlideSwitcher::with_defaults(Vec::new());
        s.next();
        run(&mut s, 3);
        assert_eq!(s.active_intent(), None);
        assert!(s.is_empty());
    }
}
