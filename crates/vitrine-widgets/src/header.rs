#![forbid(unsafe_code)]

//! Fixed header chrome controller.
//!
//! Combines three per-frame producers into one [`HeaderFrame`]:
//!
//! - the [`ViewportThemeSensor`], probing the zone beneath the logo;
//! - an optional shrink range (the pinned hero) driving
//!   [`ScrubTimeline::header_shrink`];
//! - an optional hide range (the footer entering) driving
//!   [`ScrubTimeline::header_hide`].
//!
//! Without a shrink range the header shows its compact end state; without a
//! hide range it never slides out.
//!
//! The fallback intent for unzoned content arrives through a
//! [`FallbackSlot`], which other widgets can write while the header itself
//! is borrowed. It is read at the start of each frame.

use std::cell::Cell;
use std::rc::Rc;

use vitrine_core::error::FrameResult;
use vitrine_core::notify::{Listener, Notifier};
use vitrine_core::progress::{Edge, PinnedProgressAdapter, RangeMark, RangeSpec};
use vitrine_core::theme::{ThemeConfig, ThemeIntent, ThemeOutput, ViewportThemeSensor};
use vitrine_core::timeline::{
    AMP_OPACITY, GLASS_OPACITY, HEADER_OFFSET, LOGO_SCALE, MENU_ICON_SCALE, ScrubTimeline,
    WORDMARK_OPACITY,
};

use crate::{FrameContext, FrameWidget};

/// Footer range: from its top at 95% of the viewport height to 70%.
#[must_use]
pub const fn footer_hide_range() -> RangeSpec {
    RangeSpec {
        start: RangeMark::ElementAt {
            edge: Edge::Top,
            viewport_fraction: 0.95,
        },
        end: RangeMark::ElementAt {
            edge: Edge::Top,
            viewport_fraction: 0.70,
        },
    }
}

/// Shared write handle for the header's fallback intent.
#[derive(Debug, Clone, Default)]
pub struct FallbackSlot(Rc<Cell<Option<ThemeIntent>>>);

impl FallbackSlot {
    pub fn set(&self, intent: Option<ThemeIntent>) {
        self.0.set(intent);
    }

    #[must_use]
    pub fn get(&self) -> Option<ThemeIntent> {
        self.0.get()
    }
}

/// Everything the host needs to paint the header for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderFrame {
    pub chrome: ThemeOutput,
    /// Vertical translation; negative slides the header up.
    pub offset_y: f64,
    pub logo_scale: f64,
    pub amp_opacity: f64,
    pub wordmark_opacity: f64,
    pub glass_opacity: f64,
    pub menu_icon_scale: f64,
}

/// The header chrome widget.
#[derive(Debug)]
pub struct HeaderChrome {
    sensor: ViewportThemeSensor,
    fallback: FallbackSlot,
    shrink: Option<PinnedProgressAdapter>,
    hide: Option<PinnedProgressAdapter>,
    shrink_timeline: ScrubTimeline,
    hide_timeline: ScrubTimeline,
    current: HeaderFrame,
    changed: Notifier<HeaderFrame>,
}

impl HeaderChrome {
    #[must_use]
    pub fn new(theme: ThemeConfig) -> Self {
        let sensor = ViewportThemeSensor::new(theme);
        let shrink_timeline = ScrubTimeline::header_shrink();
        let hide_timeline = ScrubTimeline::header_hide();
        let current = compose(sensor.output(), &shrink_timeline, 1.0, &hide_timeline, 0.0);
        Self {
            sensor,
            fallback: FallbackSlot::default(),
            shrink: None,
            hide: None,
            shrink_timeline,
            hide_timeline,
            current,
            changed: Notifier::new(),
        }
    }

    /// Drive the logo shrink from a pinned section's progress.
    #[must_use]
    pub fn with_shrink(mut self, adapter: PinnedProgressAdapter) -> Self {
        self.shrink = Some(adapter);
        self.current = self.compose();
        self
    }

    /// Slide the header out as a section (the footer) enters.
    #[must_use]
    pub fn with_hide(mut self, adapter: PinnedProgressAdapter) -> Self {
        self.hide = Some(adapter);
        self
    }

    #[must_use]
    pub fn sensor(&self) -> &ViewportThemeSensor {
        &self.sensor
    }

    /// The last composed frame.
    #[must_use]
    pub fn current(&self) -> HeaderFrame {
        self.current
    }

    /// A handle other widgets can use to feed the fallback intent.
    #[must_use]
    pub fn fallback_slot(&self) -> FallbackSlot {
        self.fallback.clone()
    }

    pub fn set_fallback(&mut self, intent: Option<ThemeIntent>) {
        self.fallback.set(intent);
    }

    /// Open the navigation menu: the chrome switches to the menu palette
    /// immediately and stops sensing until closed. Frame listeners hear about
    /// it now, not on the next frame.
    pub fn open_menu(&mut self) {
        self.sensor.open_menu();
        let chrome = self.sensor.output();
        if chrome != self.current.chrome {
            self.current.chrome = chrome;
            self.changed.emit(&self.current);
        }
    }

    pub fn close_menu(&mut self) {
        self.sensor.close_menu();
    }

    #[must_use]
    pub fn is_menu_open(&self) -> bool {
        self.sensor.is_overridden()
    }

    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_theme_changed(&self, callback: impl FnMut(&ThemeOutput) + 'static) -> Listener {
        self.sensor.on_theme_changed(callback)
    }

    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_frame_changed(&self, callback: impl FnMut(&HeaderFrame) + 'static) -> Listener {
        self.changed.subscribe(callback)
    }

    fn compose(&self) -> HeaderFrame {
        let shrink = self.shrink.as_ref().map_or(1.0, PinnedProgressAdapter::progress);
        let hide = self.hide.as_ref().map_or(0.0, PinnedProgressAdapter::progress);
        compose(
            self.sensor.output(),
            &self.shrink_timeline,
            shrink,
            &self.hide_timeline,
            hide,
        )
    }

    fn sense(&mut self, ctx: &FrameContext<'_>) {
        let fallback = self.fallback.get();
        if fallback != self.sensor.fallback() {
            tracing::debug!(?fallback, "header fallback intent");
            self.sensor.set_fallback(fallback);
        }
        self.sensor.sense(ctx.zones, &ctx.viewport);
    }
}

fn compose(
    chrome: ThemeOutput,
    shrink_timeline: &ScrubTimeline,
    shrink: f64,
    hide_timeline: &ScrubTimeline,
    hide: f64,
) -> HeaderFrame {
    let at = |timeline: &ScrubTimeline, name: &str, p: f64| timeline.value(name, p).unwrap_or(0.0);
    HeaderFrame {
        chrome,
        offset_y: at(hide_timeline, HEADER_OFFSET, hide),
        logo_scale: at(shrink_timeline, LOGO_SCALE, shrink),
        amp_opacity: at(shrink_timeline, AMP_OPACITY, shrink),
        wordmark_opacity: at(shrink_timeline, WORDMARK_OPACITY, shrink),
        glass_opacity: at(shrink_timeline, GLASS_OPACITY, shrink),
        menu_icon_scale: at(shrink_timeline, MENU_ICON_SCALE, shrink),
    }
}

impl FrameWidget for HeaderChrome {
    fn label(&self) -> &'static str {
        "header-chrome"
    }

    fn frame(&mut self, ctx: &FrameContext<'_>) -> FrameResult {
        self.sense(ctx);
        if let Some(adapter) = self.shrink.as_mut() {
            adapter.update(&ctx.viewport, ctx.info.dt);
        }
        if let Some(adapter) = self.hide.as_mut() {
            adapter.update(&ctx.viewport, ctx.info.dt);
        }
        let next = self.compose();
        if next != self.current {
            self.current = next;
            self.changed.emit(&next);
        }
        Ok(())
    }
}
