#![forbid(unsafe_code)]

//! Snapping drag carousel.
//!
//! Slides sit at `i * slide_extent` along the carousel axis. Dragging moves
//! the strip with the finger (elastic past either end); release throws it
//! and it settles on the nearest slide. `advance`, `retreat` and `go_to`
//! request a settle on the next frame.
//!
//! Each frame runs the pipeline in order: queued pointer signals through the
//! gesture tracker, then motion integration, then index resolution.

use vitrine_core::config::EngineConfig;
use vitrine_core::error::FrameResult;
use vitrine_core::geometry::Axis;
use vitrine_core::gesture::{
    CaptureCommand, GestureConfig, GestureOutput, PointerEvent, PointerGestureTracker,
};
use vitrine_core::motion::{Bounds, InertialMotionModel, MotionConfig, MotionPhase, REFERENCE_FRAME};
use vitrine_core::notify::Listener;
use vitrine_core::snap::{CarouselState, IndexChange, SnapIndexResolver, SnapPoints};

use crate::{FrameContext, FrameWidget, PointerInbox};

/// Slide geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarouselLayout {
    pub slide_count: usize,
    /// Distance between adjacent slides along the axis.
    pub slide_extent: f64,
    pub axis: Axis,
}

impl CarouselLayout {
    #[must_use]
    pub const fn horizontal(slide_count: usize, slide_extent: f64) -> Self {
        Self {
            slide_count,
            slide_extent,
            axis: Axis::Horizontal,
        }
    }

    fn snap_points(&self) -> SnapPoints {
        SnapPoints::uniform(self.slide_count, self.slide_extent)
    }

    fn bounds(&self) -> Bounds {
        let span = self.slide_count.saturating_sub(1) as f64 * self.slide_extent;
        Bounds::new(0.0, if span.is_finite() { span.max(0.0) } else { 0.0 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Navigation {
    Advance,
    Retreat,
    GoTo(usize),
}

/// A snapping drag carousel.
#[derive(Debug)]
pub struct Carousel {
    layout: CarouselLayout,
    tracker: PointerGestureTracker,
    motion: InertialMotionModel,
    resolver: SnapIndexResolver,
    inbox: PointerInbox,
    navigation: Option<Navigation>,
    rendered: Option<f64>,
}

impl Carousel {
    #[must_use]
    pub fn new(layout: CarouselLayout, gesture: GestureConfig, motion: MotionConfig) -> Self {
        let points = layout.snap_points();
        Self {
            layout,
            tracker: PointerGestureTracker::new(gesture),
            motion: InertialMotionModel::new(motion, layout.bounds())
                .with_snap_points(points.clone()),
            resolver: SnapIndexResolver::new(points),
            inbox: PointerInbox::default(),
            navigation: None,
            rendered: None,
        }
    }

    /// Carousel using the engine's gesture settings and carousel preset.
    #[must_use]
    pub fn from_config(layout: CarouselLayout, config: &EngineConfig) -> Self {
        Self::new(layout, config.gesture.clone(), config.motion.carousel.clone())
    }

    /// Carousel with the default gesture settings and the carousel preset.
    #[must_use]
    pub fn with_defaults(layout: CarouselLayout) -> Self {
        Self::new(layout, GestureConfig::default(), MotionConfig::carousel())
    }

    #[must_use]
    pub fn layout(&self) -> CarouselLayout {
        self.layout
    }

    #[must_use]
    pub fn state(&self) -> CarouselState {
        self.resolver.state()
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.resolver.active_index()
    }

    /// Strip offset along the axis; paint slides at `i * extent - position`.
    #[must_use]
    pub fn position(&self) -> f64 {
        self.motion.position()
    }

    #[must_use]
    pub fn phase(&self) -> MotionPhase {
        self.motion.phase()
    }

    #[must_use]
    pub fn crossfade_weight(&self, index: usize) -> f64 {
        self.resolver.crossfade_weight(index)
    }

    #[must_use]
    pub fn motion(&self) -> &InertialMotionModel {
        &self.motion
    }

    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_index_changed(&self, callback: impl FnMut(&IndexChange) + 'static) -> Listener {
        self.resolver.on_index_changed(callback)
    }

    /// Report the offset actually on screen, read back before a new gesture.
    pub fn set_rendered_position(&mut self, position: f64) {
        self.rendered = Some(position);
    }

    pub fn advance(&mut self) {
        self.navigation = Some(Navigation::Advance);
    }

    pub fn retreat(&mut self) {
        self.navigation = Some(Navigation::Retreat);
    }

    pub fn go_to(&mut self, index: usize) {
        self.navigation = Some(Navigation::GoTo(index));
    }

    /// Apply new slide geometry. An idle carousel stays on its slide.
    pub fn resize(&mut self, layout: CarouselLayout) {
        let index = self.resolver.active_index();
        self.layout = layout;
        let points = layout.snap_points();
        self.motion.set_snap_points(Some(points.clone()));
        self.motion.set_bounds(layout.bounds());
        if self.motion.is_idle() {
            let position = points.position(index.min(layout.slide_count.saturating_sub(1)));
            self.motion.jump_to(position.unwrap_or(0.0));
        }
        self.resolver.set_points(points, self.motion.position());
    }

    fn handle_pointer(&mut self, event: PointerEvent) {
        let axis = self.layout.axis;
        match self.tracker.handle(event) {
            GestureOutput::Began(command) => {
                self.inbox.emit(command);
                self.navigation = None;
                self.motion.begin_drag(self.rendered.take());
            }
            GestureOutput::Moved(delta) => {
                if delta.lock.is_captured() {
                    self.motion.drag_by(-delta.along(axis));
                }
            }
            GestureOutput::Ended(release) => {
                self.inbox.emit(release.capture);
                let velocity = -release.velocity.per_frame(axis, REFERENCE_FRAME);
                self.motion.release(velocity);
            }
            GestureOutput::Cancelled(command) => {
                self.inbox.emit(command);
                self.motion.release(0.0);
            }
            GestureOutput::Ignored(reason) => {
                tracing::trace!(?reason, "carousel pointer ignored");
            }
        }
    }

    fn navigate(&mut self, navigation: Navigation) {
        if self.motion.phase() == MotionPhase::Dragging {
            return;
        }
        let points = self.layout.snap_points();
        let Some(current) = points.nearest_index(self.motion.target()) else {
            return;
        };
        let last = self.layout.slide_count.saturating_sub(1);
        let index = match navigation {
            Navigation::Advance => (current + 1).min(last),
            Navigation::Retreat => current.saturating_sub(1),
            Navigation::GoTo(index) => index.min(last),
        };
        if let Some(position) = points.position(index) {
            tracing::debug!(from = current, to = index, "carousel navigate");
            self.motion.settle_to(position);
        }
    }
}

impl FrameWidget for Carousel {
    fn label(&self) -> &'static str {
        "carousel"
    }

    fn frame(&mut self, _ctx: &FrameContext<'_>) -> FrameResult {
        for event in self.inbox.take_events() {
            self.handle_pointer(event);
        }
        if let Some(navigation) = self.navigation.take() {
            self.navigate(navigation);
        }
        self.motion.step();
        self.resolver.update_from_position(self.motion.position());
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
