#![forbid(unsafe_code)]

//! Scroll-linked progress for pinned sections.
//!
//! [`PinnedProgressAdapter`] maps the document scroll offset inside a
//! section's range to progress in `[0, 1]`. The range is declared with
//! [`RangeMark`]s relative to a trigger element and is re-measured whenever
//! the viewport size or layout epoch changes, never cached across reflows.
//!
//! ```text
//!   start = trigger.top - 0.95 * vh      ("top 95%")
//!   end   = trigger.top - 0.70 * vh      ("top 70%")
//!   end   = start + 1.0 * vh             ("+=100%")
//! ```
//!
//! Published progress can optionally lag the raw value with a scrub time
//! constant, `alpha = 1 - exp(-dt / scrub)`, which is independent of frame
//! rate.

use std::fmt;
use std::time::Duration;

use crate::geometry::{Rect, Viewport};
use crate::notify::{Listener, Notifier};

/// Edge of the trigger element a mark refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
}

/// Length of a range relative to its start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    /// Document units.
    Absolute(f64),
    /// Multiple of the viewport height (`1.0` is `+=100%`).
    ViewportFraction(f64),
}

/// One end of a scroll range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeMark {
    /// Scroll offset at which the trigger's `edge` sits at `viewport_fraction`
    /// of the viewport height, measured from the top.
    ElementAt { edge: Edge, viewport_fraction: f64 },
    /// Start mark plus an extent. Only meaningful as an end mark.
    AfterStart(Extent),
}

impl RangeMark {
    /// `top top`: the trigger's top edge reaches the viewport top.
    pub const TOP_TOP: Self = Self::ElementAt {
        edge: Edge::Top,
        viewport_fraction: 0.0,
    };
}

/// Declared start and end of a section range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub start: RangeMark,
    pub end: RangeMark,
}

impl RangeSpec {
    /// Pinned for `extent` starting when the trigger's top reaches the viewport top.
    #[must_use]
    pub const fn pinned(extent: Extent) -> Self {
        Self {
            start: RangeMark::TOP_TOP,
            end: RangeMark::AfterStart(extent),
        }
    }

    /// Resolve to scroll offsets for a measured trigger.
    #[must_use]
    pub fn resolve(&self, trigger: Rect, viewport: &Viewport) -> SectionRange {
        let start = match self.start {
            RangeMark::ElementAt { .. } => mark_offset(self.start, trigger, viewport),
            // A start relative to itself degenerates to the trigger's top.
            RangeMark::AfterStart(extent) => trigger.y + extent_len(extent, viewport),
        };
        let end = match self.end {
            RangeMark::ElementAt { .. } => mark_offset(self.end, trigger, viewport),
            RangeMark::AfterStart(extent) => start + extent_len(extent, viewport),
        };
        SectionRange { start, end }
    }
}

fn mark_offset(mark: RangeMark, trigger: Rect, viewport: &Viewport) -> f64 {
    match mark {
        RangeMark::ElementAt {
            edge,
            viewport_fraction,
        } => {
            let y = match edge {
                Edge::Top => trigger.y,
                Edge::Bottom => trigger.bottom(),
            };
            y - viewport_fraction * viewport.height
        }
        RangeMark::AfterStart(extent) => trigger.y + extent_len(extent, viewport),
    }
}

fn extent_len(extent: Extent, viewport: &Viewport) -> f64 {
    match extent {
        Extent::Absolute(len) => len,
        Extent::ViewportFraction(f) => f * viewport.height,
    }
}

/// A measured range of scroll offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionRange {
    pub start: f64,
    pub end: f64,
}

impl SectionRange {
    /// Progress in `[0, 1]` for a scroll offset.
    ///
    /// An empty or inverted range is a step at `start`.
    #[must_use]
    pub fn progress(&self, scroll: f64) -> f64 {
        let span = self.end - self.start;
        if !(span > 0.0) {
            return if scroll >= self.start { 1.0 } else { 0.0 };
        }
        ((scroll - self.start) / span).clamp(0.0, 1.0)
    }
}

/// Scrub lag settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScrubConfig {
    /// Time constant for published progress to catch up (default: 1s).
    /// Zero publishes raw progress.
    #[cfg_attr(feature = "config", serde(with = "crate::config::duration_ms"))]
    pub lag: Duration,
    /// Residual below which published progress snaps to raw.
    pub epsilon: f64,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            lag: Duration::from_secs(1),
            epsilon: 1e-4,
        }
    }
}

impl ScrubConfig {
    /// No lag.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            lag: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Trigger measurement hook: returns the trigger's document-space bounds,
/// or `None` if it is not laid out.
pub type MeasureFn = Box<dyn Fn(&Viewport) -> Option<Rect>>;

/// Scroll position to section progress.
pub struct PinnedProgressAdapter {
    spec: RangeSpec,
    scrub: ScrubConfig,
    measure: MeasureFn,
    measured_under: Option<Viewport>,
    range: Option<SectionRange>,
    raw: f64,
    published: Option<f64>,
    progress_changed: Notifier<f64>,
}

impl fmt::Debug for PinnedProgressAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedProgressAdapter")
            .field("spec", &self.spec)
            .field("range", &self.range)
            .field("raw", &self.raw)
            .field("published", &self.published)
            .finish_non_exhaustive()
    }
}

impl PinnedProgressAdapter {
    #[must_use]
    pub fn new(
        spec: RangeSpec,
        scrub: ScrubConfig,
        measure: impl Fn(&Viewport) -> Option<Rect> + 'static,
    ) -> Self {
        Self {
            spec,
            scrub,
            measure: Box::new(measure),
            measured_under: None,
            range: None,
            raw: 0.0,
            published: None,
            progress_changed: Notifier::new(),
        }
    }

    /// Adapter for a trigger whose bounds never move.
    #[must_use]
    pub fn fixed(spec: RangeSpec, scrub: ScrubConfig, trigger: Rect) -> Self {
        Self::new(spec, scrub, move |_| Some(trigger))
    }

    /// The last measured range.
    #[must_use]
    pub fn range(&self) -> Option<SectionRange> {
        self.range
    }

    /// Unsmoothed progress from the last update.
    #[must_use]
    pub fn raw_progress(&self) -> f64 {
        self.raw
    }

    /// Published (possibly scrubbed) progress.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.published.unwrap_or(self.raw)
    }

    /// Whether published progress has caught up with raw progress.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.published.is_none_or(|p| p == self.raw)
    }

    /// Force a re-measure on the next update (e.g. a pinned section above
    /// this one changed its spacer).
    pub fn invalidate(&mut self) {
        self.measured_under = None;
    }

    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_progress(&self, callback: impl FnMut(&f64) + 'static) -> Listener {
        self.progress_changed.subscribe(callback)
    }

    /// Run one frame. Returns the published progress when it changed.
    pub fn update(&mut self, viewport: &Viewport, dt: Duration) -> Option<f64> {
        self.remeasure_if_stale(viewport);
        let Some(range) = self.range else {
            // Trigger not laid out yet; keep the last good value.
            return None;
        };
        self.raw = range.progress(viewport.scroll_y);

        let next = match self.published {
            None => self.raw,
            Some(current) => {
                let lag = self.scrub.lag.as_secs_f64();
                let mut next = if lag <= 0.0 {
                    self.raw
                } else {
                    let alpha = 1.0 - (-dt.as_secs_f64() / lag).exp();
                    current + (self.raw - current) * alpha
                };
                if (self.raw - next).abs() < self.scrub.epsilon {
                    next = self.raw;
                }
                next
            }
        };

        if self.published == Some(next) {
            return None;
        }
        self.published = Some(next);
        self.progress_changed.emit(&next);
        Some(next)
    }

    fn remeasure_if_stale(&mut self, viewport: &Viewport) {
        let stale = self
            .measured_under
            .is_none_or(|prev| prev.layout_differs(viewport));
        if !stale {
            return;
        }
        match (self.measure)(viewport) {
            Some(trigger) => {
                let range = self.spec.resolve(trigger, viewport);
                tracing::debug!(start = range.start, end = range.end, "section range measured");
                self.range = Some(range);
                self.measured_under = Some(*viewport);
            }
            None => {
                tracing::trace!("section trigger not measurable; keeping previous range");
            }
        }
    }
}
