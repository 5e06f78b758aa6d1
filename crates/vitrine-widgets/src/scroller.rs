#![forbid(unsafe_code)]

//! Free-scrolling drag strip with friction and a hard clamp.
//!
//! The strip scrolls `0..=content - viewport`. Content that fits its
//! viewport does not scroll at all.

use vitrine_core::config::EngineConfig;
use vitrine_core::error::FrameResult;
use vitrine_core::geometry::Axis;
use vitrine_core::gesture::{
    CaptureCommand, GestureConfig, GestureOutput, PointerEvent, PointerGestureTracker,
};
use vitrine_core::motion::{Bounds, InertialMotionModel, MotionConfig, MotionPhase, REFERENCE_FRAME};

use crate::{FrameContext, FrameWidget, PointerInbox};

#[derive(Debug)]
pub struct DragScroller {
    axis: Axis,
    tracker: PointerGestureTracker,
    motion: InertialMotionModel,
    inbox: PointerInbox,
    rendered: Option<f64>,
}

impl DragScroller {
    #[must_use]
    pub fn new(
        axis: Axis,
        content: f64,
        viewport: f64,
        gesture: GestureConfig,
        motion: MotionConfig,
    ) -> Self {
        Self {
            axis,
            tracker: PointerGestureTracker::new(gesture),
            motion: InertialMotionModel::new(motion, Bounds::from_extents(content, viewport)),
            inbox: PointerInbox::default(),
            rendered: None,
        }
    }

    #[must_use]
    pub fn from_config(axis: Axis, content: f64, viewport: f64, config: &EngineConfig) -> Self {
        Self::new(
            axis,
            content,
            viewport,
            config.gesture.clone(),
            config.motion.scroller.clone(),
        )
    }

    /// Horizontal strip with the scroller preset.
    #[must_use]
    pub fn horizontal(content: f64, viewport: f64) -> Self {
        Self::new(
            Axis::Horizontal,
            content,
            viewport,
            GestureConfig::default(),
            MotionConfig::scroller(),
        )
    }

    /// Current scroll offset; paint content at `-scroll_offset()`.
    #[must_use]
    pub fn scroll_offset(&self) -> f64 {
        self.motion.position()
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.motion.bounds()
    }

    #[must_use]
    pub fn phase(&self) -> MotionPhase {
        self.motion.phase()
    }

    #[must_use]
    pub fn motion(&self) -> &InertialMotionModel {
        &self.motion
    }

    pub fn set_rendered_position(&mut self, position: f64) {
        self.rendered = Some(position);
    }

    /// Content or viewport size changed.
    pub fn resize(&mut self, content: f64, viewport: f64) {
        let bounds = Bounds::from_extents(content, viewport);
        tracing::debug!(min = bounds.min, max = bounds.max, "scroller resized");
        self.motion.set_bounds(bounds);
    }

    fn handle_pointer(&mut self, event: PointerEvent) {
        let axis = self.axis;
        match self.tracker.handle(event) {
            GestureOutput::Began(command) => {
                self.inbox.emit(command);
                self.motion.begin_drag(self.rendered.take());
            }
            GestureOutput::Moved(delta) => {
                if delta.lock.is_captured() {
                    self.motion.drag_by(-delta.along(axis));
                }
            }
            GestureOutput::Ended(release) => {
                self.inbox.emit(release.capture);
                self.motion
                    .release(-release.velocity.per_frame(axis, REFERENCE_FRAME));
            }
            GestureOutput::Cancelled(command) => {
                self.inbox.emit(command);
                self.motion.release(0.0);
            }
            GestureOutput::Ignored(reason) => {
                tracing::trace!(?reason, "scroller pointer ignored");
            }
        }
    }
}

impl FrameWidget for DragScroller {
    fn label(&self) -> &'static str {
        "drag-scroller"
    }

    fn frame(&mut self, _ctx: &FrameContext<'_>) -> FrameResult {
        for event in self.inbox.take_events() {
            self.handle_pointer(event);
        }
        self.motion.step();
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
        let command = self.tracker.cancel();
        if command.is_some() {
            self.motion.release(0.0);
        }
        command
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

    fn run(scroller: &mut DragScroller, frames: usize) {
        let zones = ThemeZoneRegistry::new();
        let now = Instant::now();
        for i in 0..frames {
            let ctx = FrameContext {
                info: FrameInfo {
                    frame: i as u64 + 1,
                    now,
                    dt: Duration::from_millis(16),
                },
                viewport: Viewport::new(500.0, 800.0),
                zones: &zones,
            };
            scroller.frame(&ctx).unwrap();
        }
    }

    fn fling(scroller: &mut DragScroller, xs: &[f64]) {
        let t = Instant::now();
        let ms = Duration::from_millis(16);
        let mut at = t;
        scroller.push_pointer(PointerEvent::mouse(PointerPhase::Down, xs[0], 10.0, at));
        for &x in &xs[1..] {
            at += ms;
            scroller.push_pointer(PointerEvent::mouse(PointerPhase::Move, x, 10.0, at));
        }
        scroller.push_pointer(PointerEvent::mouse(
            PointerPhase::Up,
            xs[xs.len() - 1],
            10.0,
            at + ms,
        ));
    }

    #[test]
    fn hard_fling_stops_at_max() {
        let mut s = DragScroller::horizontal(2000.0, 500.0);
        fling(&mut s, &[900.0, 700.0, 400.0, 100.0]);
        run(&mut s, 2000);
        assert_eq!(s.phase(), MotionPhase::Idle);
        assert_eq!(s.scroll_offset(), 1500.0);
    }

    #[test]
    fn never_leaves_bounds_while_coasting() {
        let mut s = DragScroller::horizontal(1200.0, 500.0);
        fling(&mut s, &[900.0, 700.0, 400.0, 100.0]);
        run(&mut s, 2000);
        assert_eq!(s.scroll_offset(), 700.0);

        fling(&mut s, &[100.0, 300.0, 600.0]);
        for _ in 0..2000 {
            run(&mut s, 1);
            let offset = s.scroll_offset();
            assert!((0.0..=700.0).contains(&offset), "offset {offset}");
        }
        assert_eq!(s.scroll_offset(), 0.0);
    }

    #[test]
    fn content_that_fits_does_not_scroll() {
        let mut s = DragScroller::horizontal(300.0, 500.0);
        fling(&mut s, &[400.0, 300.0, 100.0]);
        run(&mut s, 200);
        assert_eq!(s.scroll_offset(), 0.0);
    }

    #[test]
    fn shrinking_content_pulls_offset_back() {
        let mut s = DragScroller::horizontal(2000.0, 500.0);
        fling(&mut s, &[900.0, 700.0, 400.0, 100.0]);
        run(&mut s, 2000);
        s.resize(1000.0, 500.0);
        run(&mut s, 2000);
        assert_eq!(s.scroll_offset(), 500.0);
    }
}
