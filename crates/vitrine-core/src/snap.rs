#![forbid(unsafe_code)]

//! Snap points and discrete index resolution.
//!
//! [`SnapPoints`] describes where a continuous value may come to rest.
//! [`SnapIndexResolver`] maps a motion position onto index space and tracks
//! which slide is active.
//!
//! # Index space
//!
//! Positions map to a continuous progress in `[0, N-1]` by linear
//! interpolation between neighboring snap points, so the midpoint between
//! two points in position space is exactly `i + 0.5` in progress space. The
//! active index is the nearest integer to that progress; an exact tie goes
//! to the lower index.
//!
//! # Invariants
//!
//! 1. The active index is always in `[0, N-1]` (0 when there are no points).
//! 2. Continuous progress is always in `[0, N-1]`.
//! 3. `crossfade_weight(i) = max(0, 1 - |progress - i|)`, so at most two
//!    adjacent slides are ever partially visible and their weights sum to 1.

use crate::notify::{Listener, Notifier};

/// Rest positions for a motion value, in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapPoints {
    /// `count` points at `0, spacing, 2 * spacing, ...`.
    Uniform { count: usize, spacing: f64 },
    /// Arbitrary ascending positions.
    Explicit(Vec<f64>),
}

impl Default for SnapPoints {
    fn default() -> Self {
        Self::Uniform {
            count: 0,
            spacing: 0.0,
        }
    }
}

impl SnapPoints {
    #[must_use]
    pub fn uniform(count: usize, spacing: f64) -> Self {
        Self::Uniform {
            count,
            spacing: if spacing.is_finite() { spacing.max(0.0) } else { 0.0 },
        }
    }

    /// Explicit points. Non-finite values are dropped and the rest sorted.
    #[must_use]
    pub fn explicit(points: impl IntoIterator<Item = f64>) -> Self {
        let mut points: Vec<f64> = points.into_iter().filter(|p| p.is_finite()).collect();
        points.sort_by(f64::total_cmp);
        Self::Explicit(points)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Uniform { count, .. } => *count,
            Self::Explicit(points) => points.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of snap point `index`.
    #[must_use]
    pub fn position(&self, index: usize) -> Option<f64> {
        match self {
            Self::Uniform { count, spacing } => {
                (index < *count).then(|| index as f64 * spacing)
            }
            Self::Explicit(points) => points.get(index).copied(),
        }
    }

    /// Continuous progress in `[0, N-1]` for a position.
    #[must_use]
    pub fn progress_for_position(&self, position: f64) -> f64 {
        let n = self.len();
        if n < 2 || !position.is_finite() {
            return 0.0;
        }
        let last = (n - 1) as f64;
        match self {
            Self::Uniform { spacing, .. } => {
                if *spacing <= 0.0 {
                    return 0.0;
                }
                let progress = position / spacing;
                // Land exactly on an index when the position is exactly a snap point.
                let nearest = progress.round();
                let progress = if nearest * spacing == position {
                    nearest
                } else {
                    progress
                };
                progress.clamp(0.0, last)
            }
            Self::Explicit(points) => {
                if position <= points[0] {
                    return 0.0;
                }
                for (i, pair) in points.windows(2).enumerate() {
                    let (a, b) = (pair[0], pair[1]);
                    if position <= b {
                        let span = b - a;
                        let frac = if span > 0.0 { (position - a) / span } else { 1.0 };
                        return i as f64 + frac;
                    }
                }
                last
            }
        }
    }

    /// Inverse of [`progress_for_position`](Self::progress_for_position).
    #[must_use]
    pub fn position_for_progress(&self, progress: f64) -> f64 {
        let n = self.len();
        if n == 0 || !progress.is_finite() {
            return 0.0;
        }
        let progress = progress.clamp(0.0, (n - 1) as f64);
        match self {
            Self::Uniform { spacing, .. } => progress * spacing,
            Self::Explicit(points) => {
                let lower = progress.floor() as usize;
                let frac = progress - lower as f64;
                match points.get(lower + 1) {
                    Some(next) => points[lower] + (next - points[lower]) * frac,
                    None => points[lower],
                }
            }
        }
    }

    /// Index of the snap point nearest to `position`; ties go to the lower index.
    #[must_use]
    pub fn nearest_index(&self, position: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        Some(round_half_down(self.progress_for_position(position)))
    }

    /// Position of the snap point nearest to `position`.
    #[must_use]
    pub fn nearest_position(&self, position: f64) -> Option<f64> {
        self.nearest_index(position).and_then(|i| self.position(i))
    }
}

/// Nearest integer to a non-negative value, with `x.5` going down.
fn round_half_down(value: f64) -> usize {
    let floor = value.floor();
    let index = if value - floor > 0.5 { floor + 1.0 } else { floor };
    index.max(0.0) as usize
}

/// Snapshot of a carousel's discrete and continuous position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarouselState {
    pub active_index: usize,
    pub total_slides: usize,
    pub continuous_progress: f64,
}

/// Payload of an index-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexChange {
    pub old: usize,
    pub new: usize,
}

/// Resolves a motion position into an active index and crossfade weights.
#[derive(Debug)]
pub struct SnapIndexResolver {
    points: SnapPoints,
    state: CarouselState,
    index_changed: Notifier<IndexChange>,
}

impl SnapIndexResolver {
    #[must_use]
    pub fn new(points: SnapPoints) -> Self {
        let total_slides = points.len();
        Self {
            points,
            state: CarouselState {
                active_index: 0,
                total_slides,
                continuous_progress: 0.0,
            },
            index_changed: Notifier::new(),
        }
    }

    #[must_use]
    pub fn points(&self) -> &SnapPoints {
        &self.points
    }

    #[must_use]
    pub fn state(&self) -> CarouselState {
        self.state
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.state.active_index
    }

    #[must_use]
    pub fn continuous_progress(&self) -> f64 {
        self.state.continuous_progress
    }

    /// Replace the snap points (layout change) and re-resolve at `position`.
    pub fn set_points(&mut self, points: SnapPoints, position: f64) -> Option<IndexChange> {
        self.state.total_slides = points.len();
        self.points = points;
        self.update_from_position(position)
    }

    /// Subscribe to index changes.
    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_index_changed(&self, callback: impl FnMut(&IndexChange) + 'static) -> Listener {
        self.index_changed.subscribe(callback)
    }

    /// Re-resolve from a motion position.
    pub fn update_from_position(&mut self, position: f64) -> Option<IndexChange> {
        let progress = self.points.progress_for_position(position);
        self.update(progress)
    }

    /// Re-resolve from a continuous progress value in index space.
    ///
    /// Returns the change when the active index moved; subscribers are
    /// notified before this returns.
    pub fn update(&mut self, progress: f64) -> Option<IndexChange> {
        let max = self.state.total_slides.saturating_sub(1) as f64;
        let progress = if progress.is_finite() {
            progress.clamp(0.0, max)
        } else {
            self.state.continuous_progress
        };
        self.state.continuous_progress = progress;

        let index = round_half_down(progress);
        if index == self.state.active_index {
            return None;
        }
        let change = IndexChange {
            old: self.state.active_index,
            new: index,
        };
        self.state.active_index = index;
        tracing::debug!(old = change.old, new = change.new, progress, "active index changed");
        self.index_changed.emit(&change);
        Some(change)
    }

    /// Crossfade weight for slide `index`, in `[0, 1]`.
    #[must_use]
    pub fn crossfade_weight(&self, index: usize) -> f64 {
        crossfade_weight(self.state.continuous_progress, index)
    }
}

/// `max(0, 1 - |progress - index|)`, clamped to `[0, 1]`.
#[inline]
#[must_use]
pub fn crossfade_weight(progress: f64, index: usize) -> f64 {
    (1.0 - (progress - index as f64).abs()).clamp(0.0, 1.0)
}
