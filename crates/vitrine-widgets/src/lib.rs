#![forbid(unsafe_code)]

//! Widgets: the concrete interactive pieces of the site, built on
//! `vitrine-core`.
//!
//! # Role in Vitrine
//! Every widget here owns its own gesture tracker and motion model and is
//! parameterized by an explicit preset; no physics state is shared between
//! instances.
//!
//! # Primary responsibilities
//! - **Carousel**: snapping drag carousel with advance/retreat/go-to.
//! - **SlideSwitcher**: discrete swipe switcher with a transition lock and a
//!   theme intent per slide.
//! - **DragScroller**: free friction strip with a hard clamp.
//! - **HeaderChrome**: theme sensing, menu override, and scroll-linked
//!   shrink/hide values for the fixed header.
//! - **Stage**: mounts widgets onto one `FrameScheduler` in pipeline order
//!   and collects their pointer-capture commands for the host.
//!
//! # Input model
//! Host pointer handlers only enqueue [`PointerEvent`]s. All gesture
//! resolution, integration and hit testing happens in the widget's frame
//! callback, so input handlers never do heavy work inline.

use vitrine_core::error::FrameResult;
use vitrine_core::gesture::{CaptureCommand, PointerEvent};
use vitrine_core::geometry::Viewport;
use vitrine_core::scheduler::FrameInfo;
use vitrine_core::theme::ThemeZoneRegistry;

pub mod carousel;
pub mod header;
pub mod scroller;
pub mod stage;
pub mod switcher;

pub use carousel::{Carousel, CarouselLayout};
pub use header::{FallbackSlot, HeaderChrome, HeaderFrame};
pub use scroller::DragScroller;
pub use stage::{Mounted, Stage, link_theme_fallback};
pub use switcher::SlideSwitcher;

/// Everything a widget may read during its frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub info: FrameInfo,
    pub viewport: Viewport,
    pub zones: &'a ThemeZoneRegistry,
}

/// A component driven once per frame by the [`Stage`].
pub trait FrameWidget {
    /// Name used in scheduler logs.
    fn label(&self) -> &'static str;

    /// Resolve queued input and advance one frame.
    fn frame(&mut self, ctx: &FrameContext<'_>) -> FrameResult;

    /// Queue a pointer signal for the next frame. Widgets without pointer
    /// input ignore it.
    fn push_pointer(&mut self, event: PointerEvent) {
        let _ = event;
    }

    /// Capture commands produced since the last call.
    fn take_capture_commands(&mut self) -> Vec<CaptureCommand> {
        Vec::new()
    }

    /// Tear down: end any in-flight gesture with a synthetic release and
    /// return the `Release` the host must honor.
    fn unmount(&mut self) -> Option<CaptureCommand> {
        None
    }
}

/// Queue and capture-command plumbing shared by the pointer-driven widgets.
#[derive(Debug, Default)]
pub(crate) struct PointerInbox {
    queued: Vec<PointerEvent>,
    commands: Vec<CaptureCommand>,
}

impl PointerInbox {
    pub(crate) fn push(&mut self, event: PointerEvent) {
        self.queued.push(event);
    }

    /// Queued events in arrival order.
    pub(crate) fn take_events(&mut self) -> Vec<PointerEvent> {
        std::mem::take(&mut self.queued)
    }

    pub(crate) fn emit(&mut self, command: CaptureCommand) {
        self.commands.push(command);
    }

    pub(crate) fn take_commands(&mut self) -> Vec<CaptureCommand> {
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn clear(&mut self) {
        self.queued.clear();
    }
}
