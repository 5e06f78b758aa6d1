#![forbid(unsafe_code)]

//! Pointer gesture tracking: normalized samples, axis lock, release velocity.
//!
//! [`PointerGestureTracker`] turns mouse, touch and pen down/move/up signals
//! into one stream of [`GestureSample`]s and decides, once per gesture,
//! whether the gesture belongs to the widget or to the page's native scroll.
//!
//! # State Machine
//!
//! ```text
//!   Idle ──begin──▶ Undecided ──|Δ| > threshold──▶ Captured(axis)
//!                       │                      └─▶ PassThrough(axis)
//!                       └──────────── end / cancel ──────────▶ Idle
//! ```
//!
//! # Invariants
//!
//! 1. At most one pointer is tracked at a time; samples from any other
//!    pointer are ignored until the active gesture ends.
//! 2. The lock decision is made once, when the cumulative displacement from
//!    the start point exceeds `lock_threshold` on either axis, and is never
//!    re-evaluated for the rest of the gesture.
//! 3. A gesture locked to the page's native scroll axis produces zero deltas
//!    and zero release velocity, so native scrolling proceeds untouched.
//! 4. Release velocity uses only the last sample interval with a positive
//!    duration, not an average over the gesture.
//! 5. Every `begin` that is accepted yields exactly one `Acquire` command and
//!    the matching `end`/`cancel` yields exactly one `Release`.
//!
//! # Failure Modes
//!
//! - Duplicate timestamps (coalesced touch events) are skipped when
//!   estimating velocity.
//! - If the pointer rests longer than `max_release_idle` before the release
//!   sample, the release velocity is zero (the user stopped before letting go).

use std::time::Duration;

use web_time::Instant;

use crate::geometry::{Axis, Point};

/// Identity of the pointer that produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerId {
    Mouse,
    Touch(u32),
    Pen(u32),
}

/// One normalized position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    pub pointer_id: PointerId,
    pub x: f64,
    pub y: f64,
    pub t: Instant,
}

impl GestureSample {
    #[must_use]
    pub const fn new(pointer_id: PointerId, x: f64, y: f64, t: Instant) -> Self {
        Self { pointer_id, x, y, t }
    }

    #[must_use]
    pub const fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Lifecycle phase of a raw pointer signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// Pointer left the surface, lost capture, or the host cancelled it.
    Cancel,
}

/// A platform-neutral pointer signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub sample: GestureSample,
}

impl PointerEvent {
    /// A mouse signal.
    #[must_use]
    pub const fn mouse(phase: PointerPhase, x: f64, y: f64, t: Instant) -> Self {
        Self {
            phase,
            sample: GestureSample::new(PointerId::Mouse, x, y, t),
        }
    }

    /// A touch signal for the touch point `id`.
    #[must_use]
    pub const fn touch(id: u32, phase: PointerPhase, x: f64, y: f64, t: Instant) -> Self {
        Self {
            phase,
            sample: GestureSample::new(PointerId::Touch(id), x, y, t),
        }
    }
}

/// Host command for scoped global listeners / pointer capture.
///
/// Hosts attach their window-level move/up listeners on `Acquire` and detach
/// them on `Release`, so listeners exist only while a gesture is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Acquire { pointer_id: PointerId },
    Release { pointer_id: PointerId },
}

/// Axis-lock decision for the active gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Displacement has not yet exceeded the lock threshold.
    Undecided,
    /// The gesture belongs to the widget along this axis.
    Captured(Axis),
    /// The gesture belongs to the page's native scroll along this axis.
    PassThrough(Axis),
}

impl LockState {
    /// Whether the widget should consume this gesture's deltas.
    #[must_use]
    pub const fn is_captured(self) -> bool {
        matches!(self, Self::Captured(_))
    }
}

/// Result of [`PointerGestureTracker::move_to`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureDelta {
    pub dx: f64,
    pub dy: f64,
    pub lock: LockState,
}

impl GestureDelta {
    /// Delta component along `axis`.
    #[must_use]
    pub const fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.dx,
            Axis::Vertical => self.dy,
        }
    }
}

/// Release velocity in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReleaseVelocity {
    pub vx: f64,
    pub vy: f64,
}

impl ReleaseVelocity {
    pub const ZERO: Self = Self { vx: 0.0, vy: 0.0 };

    /// Component along `axis`, in units per second.
    #[must_use]
    pub const fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.vx,
            Axis::Vertical => self.vy,
        }
    }

    /// Component along `axis`, converted to units per `frame`.
    #[must_use]
    pub fn per_frame(&self, axis: Axis, frame: Duration) -> f64 {
        self.along(axis) * frame.as_secs_f64()
    }
}

/// Result of [`PointerGestureTracker::end`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureRelease {
    pub velocity: ReleaseVelocity,
    /// Total displacement from the start sample to the release sample.
    pub displacement: Point,
    pub lock: LockState,
    pub capture: CaptureCommand,
}

/// Why a pointer signal was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureIgnoredReason {
    /// A different pointer already owns the tracker.
    PointerMismatch,
    /// Move/up/cancel with no active gesture.
    NoActiveGesture,
    /// Down while the same pointer is already down.
    AlreadyActive,
}

/// Outcome of dispatching one [`PointerEvent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutput {
    Began(CaptureCommand),
    Moved(GestureDelta),
    Ended(GestureRelease),
    Cancelled(CaptureCommand),
    Ignored(GestureIgnoredReason),
}

/// Tracker tunables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct GestureConfig {
    /// Displacement (units) on either axis before the lock is decided (default: 5).
    pub lock_threshold: f64,
    /// The page's native scroll axis; gestures locked to it pass through
    /// (default: vertical). `None` captures every gesture.
    pub native_scroll_axis: Option<Axis>,
    /// Rest time before release after which velocity is zero (default: 80ms).
    #[cfg_attr(feature = "config", serde(with = "crate::config::duration_ms"))]
    pub max_release_idle: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            lock_threshold: 5.0,
            native_scroll_axis: Some(Axis::Vertical),
            max_release_idle: Duration::from_millis(80),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveGesture {
    start: GestureSample,
    /// Append-only for the life of the gesture.
    samples: Vec<GestureSample>,
    lock: LockState,
}

impl ActiveGesture {
    fn last(&self) -> GestureSample {
        self.samples.last().copied().unwrap_or(self.start)
    }
}

/// Normalizes pointer input for one widget.
#[derive(Debug, Clone, Default)]
pub struct PointerGestureTracker {
    config: GestureConfig,
    active: Option<ActiveGesture>,
}

impl PointerGestureTracker {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Whether a gesture is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The active pointer, if any.
    #[must_use]
    pub fn active_pointer(&self) -> Option<PointerId> {
        self.active.as_ref().map(|g| g.start.pointer_id)
    }

    /// Lock state of the active gesture.
    #[must_use]
    pub fn lock(&self) -> Option<LockState> {
        self.active.as_ref().map(|g| g.lock)
    }

    /// Samples recorded for the active gesture (empty when idle).
    #[must_use]
    pub fn samples(&self) -> &[GestureSample] {
        self.active.as_ref().map_or(&[], |g| g.samples.as_slice())
    }

    /// Dispatch a normalized pointer signal.
    pub fn handle(&mut self, event: PointerEvent) -> GestureOutput {
        match event.phase {
            PointerPhase::Down => match self.begin(event.sample) {
                Ok(cmd) => GestureOutput::Began(cmd),
                Err(reason) => GestureOutput::Ignored(reason),
            },
            PointerPhase::Move => match self.move_to(event.sample) {
                Ok(delta) => GestureOutput::Moved(delta),
                Err(reason) => GestureOutput::Ignored(reason),
            },
            PointerPhase::Up => match self.end(event.sample) {
                Ok(release) => GestureOutput::Ended(release),
                Err(reason) => GestureOutput::Ignored(reason),
            },
            PointerPhase::Cancel => {
                if self.active_pointer() != Some(event.sample.pointer_id) {
                    return GestureOutput::Ignored(self.mismatch_reason());
                }
                match self.cancel() {
                    Some(cmd) => GestureOutput::Cancelled(cmd),
                    None => GestureOutput::Ignored(GestureIgnoredReason::NoActiveGesture),
                }
            }
        }
    }

    /// Start tracking a gesture at `sample`.
    pub fn begin(&mut self, sample: GestureSample) -> Result<CaptureCommand, GestureIgnoredReason> {
        if let Some(active) = &self.active {
            return Err(if active.start.pointer_id == sample.pointer_id {
                GestureIgnoredReason::AlreadyActive
            } else {
                GestureIgnoredReason::PointerMismatch
            });
        }
        tracing::trace!(pointer = ?sample.pointer_id, x = sample.x, y = sample.y, "gesture begin");
        self.active = Some(ActiveGesture {
            start: sample,
            samples: vec![sample],
            lock: LockState::Undecided,
        });
        Ok(CaptureCommand::Acquire {
            pointer_id: sample.pointer_id,
        })
    }

    /// Record a move sample and return the delta the widget should apply.
    ///
    /// Before the lock is decided, and after a pass-through lock, the delta is
    /// zero. On the sample that captures the gesture, the delta is the whole
    /// displacement from the start point so no motion is lost.
    pub fn move_to(&mut self, sample: GestureSample) -> Result<GestureDelta, GestureIgnoredReason> {
        let threshold = self.config.lock_threshold;
        let native = self.config.native_scroll_axis;
        let active = self.active_for(sample.pointer_id)?;
        let previous = active.last();
        active.samples.push(sample);

        let (dx, dy) = match active.lock {
            LockState::Captured(_) => (sample.x - previous.x, sample.y - previous.y),
            LockState::PassThrough(_) => (0.0, 0.0),
            LockState::Undecided => {
                let total_x = sample.x - active.start.x;
                let total_y = sample.y - active.start.y;
                if total_x.abs() > threshold || total_y.abs() > threshold {
                    let axis = if total_x.abs() >= total_y.abs() {
                        Axis::Horizontal
                    } else {
                        Axis::Vertical
                    };
                    active.lock = if native == Some(axis) {
                        LockState::PassThrough(axis)
                    } else {
                        LockState::Captured(axis)
                    };
                    tracing::debug!(lock = ?active.lock, total_x, total_y, "gesture axis locked");
                    if active.lock.is_captured() {
                        (total_x, total_y)
                    } else {
                        (0.0, 0.0)
                    }
                } else {
                    (0.0, 0.0)
                }
            }
        };

        Ok(GestureDelta {
            dx,
            dy,
            lock: active.lock,
        })
    }

    /// Finish the gesture with a final release sample.
    pub fn end(&mut self, sample: GestureSample) -> Result<GestureRelease, GestureIgnoredReason> {
        let max_idle = self.config.max_release_idle;
        let active = self.active_for(sample.pointer_id)?;
        let previous = active.last();
        if sample.x != previous.x || sample.y != previous.y {
            active.samples.push(sample);
        }

        let rested = sample.t.saturating_duration_since(previous.t) > max_idle;
        let velocity = if active.lock.is_captured() && !rested {
            last_interval_velocity(&active.samples)
        } else {
            ReleaseVelocity::ZERO
        };
        let displacement = Point::new(sample.x - active.start.x, sample.y - active.start.y);
        let lock = active.lock;
        let pointer_id = active.start.pointer_id;
        self.active = None;

        tracing::debug!(?lock, vx = velocity.vx, vy = velocity.vy, "gesture released");
        Ok(GestureRelease {
            velocity,
            displacement,
            lock,
            capture: CaptureCommand::Release { pointer_id },
        })
    }

    /// Abort the active gesture without producing velocity (synthetic release).
    ///
    /// Returns the `Release` command the host must honor, or `None` when idle.
    pub fn cancel(&mut self) -> Option<CaptureCommand> {
        let active = self.active.take()?;
        tracing::debug!(pointer = ?active.start.pointer_id, "gesture cancelled");
        Some(CaptureCommand::Release {
            pointer_id: active.start.pointer_id,
        })
    }

    fn active_for(
        &mut self,
        pointer_id: PointerId,
    ) -> Result<&mut ActiveGesture, GestureIgnoredReason> {
        match &mut self.active {
            None => Err(GestureIgnoredReason::NoActiveGesture),
            Some(active) if active.start.pointer_id != pointer_id => {
                Err(GestureIgnoredReason::PointerMismatch)
            }
            Some(active) => Ok(active),
        }
    }

    fn mismatch_reason(&self) -> GestureIgnoredReason {
        if self.active.is_some() {
            GestureIgnoredReason::PointerMismatch
        } else {
            GestureIgnoredReason::NoActiveGesture
        }
    }
}

fn last_interval_velocity(samples: &[GestureSample]) -> ReleaseVelocity {
    for pair in samples.windows(2).rev() {
        let (a, b) = (pair[0], pair[1]);
        let dt = b.t.saturating_duration_since(a.t).as_secs_f64();
        if dt > 0.0 {
            return ReleaseVelocity {
                vx: (b.x - a.x) / dt,
                vy: (b.y - a.y) / dt,
            };
        }
    }
    ReleaseVelocity::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_10: Duration = Duration::from_millis(10);

    fn mouse(x: f64, y: f64, t: Instant) -> GestureSample {
        GestureSample::new(PointerId::Mouse, x, y, t)
    }

    fn tracker() -> PointerGestureTracker {
        PointerGestureTracker::new(GestureConfig::default())
    }

    #[test]
    fn begin_acquires_capture() {
        let mut tr = tracker();
        let cmd = tr.begin(mouse(0.0, 0.0, Instant::now()));
        assert_eq!(
            cmd,
            Ok(CaptureCommand::Acquire {
                pointer_id: PointerId::Mouse
            })
        );
        assert!(tr.is_active());
    }

    #[test]
    fn no_delta_below_threshold() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        let d = tr.move_to(mouse(4.0, 1.0, t + MS_10)).unwrap();
        assert_eq!(d.lock, LockState::Undecided);
        assert_eq!((d.dx, d.dy), (0.0, 0.0));
    }

    #[test]
    fn horizontal_lock_emits_full_displacement_then_increments() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        tr.move_to(mouse(3.0, 0.0, t + MS_10)).unwrap();
        let d = tr.move_to(mouse(8.0, 1.0, t + MS_10 * 2)).unwrap();
        assert_eq!(d.lock, LockState::Captured(Axis::Horizontal));
        assert_eq!(d.dx, 8.0);
        let d = tr.move_to(mouse(12.0, 3.0, t + MS_10 * 3)).unwrap();
        assert_eq!(d.dx, 4.0);
        assert_eq!(d.dy, 2.0);
    }

    #[test]
    fn vertical_lock_passes_through() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        let d = tr.move_to(mouse(1.0, 9.0, t + MS_10)).unwrap();
        assert_eq!(d.lock, LockState::PassThrough(Axis::Vertical));
        assert_eq!((d.dx, d.dy), (0.0, 0.0));
        // Later horizontal motion never re-evaluates the lock.
        let d = tr.move_to(mouse(80.0, 9.0, t + MS_10 * 2)).unwrap();
        assert_eq!(d.lock, LockState::PassThrough(Axis::Vertical));
        assert_eq!(d.dx, 0.0);
        let release = tr.end(mouse(90.0, 9.0, t + MS_10 * 3)).unwrap();
        assert_eq!(release.velocity, ReleaseVelocity::ZERO);
    }

    #[test]
    fn lock_is_never_reevaluated() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        tr.move_to(mouse(10.0, 0.0, t + MS_10)).unwrap();
        let d = tr.move_to(mouse(10.0, 200.0, t + MS_10 * 2)).unwrap();
        assert_eq!(d.lock, LockState::Captured(Axis::Horizontal));
    }

    #[test]
    fn release_velocity_uses_last_interval() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        tr.move_to(mouse(10.0, 0.0, t + MS_10)).unwrap();
        tr.move_to(mouse(12.0, 0.0, t + MS_10 * 2)).unwrap();
        // Final flick: 30 units in 10ms = 3000 units/s.
        let release = tr.end(mouse(42.0, 0.0, t + MS_10 * 3)).unwrap();
        assert!((release.velocity.vx - 3000.0).abs() < 1e-6);
        assert_eq!(release.displacement, Point::new(42.0, 0.0));
        assert_eq!(
            release.capture,
            CaptureCommand::Release {
                pointer_id: PointerId::Mouse
            }
        );
        assert!(!tr.is_active());
        assert!(tr.samples().is_empty());
    }

    #[test]
    fn duplicate_timestamps_are_skipped() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        tr.move_to(mouse(20.0, 0.0, t + MS_10)).unwrap();
        let release = tr.end(mouse(25.0, 0.0, t + MS_10)).unwrap();
        assert!((release.velocity.vx - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn resting_before_release_zeroes_velocity() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        tr.move_to(mouse(30.0, 0.0, t + MS_10)).unwrap();
        let release = tr
            .end(mouse(30.0, 0.0, t + Duration::from_millis(400)))
            .unwrap();
        assert_eq!(release.velocity, ReleaseVelocity::ZERO);
    }

    #[test]
    fn foreign_pointer_is_ignored() {
        let mut tr = tracker();
        let t = Instant::now();
        tr.begin(GestureSample::new(PointerId::Touch(1), 0.0, 0.0, t))
            .unwrap();
        let other = GestureSample::new(PointerId::Touch(2), 50.0, 0.0, t + MS_10);
        assert_eq!(tr.begin(other), Err(GestureIgnoredReason::PointerMismatch));
        assert_eq!(tr.move_to(other), Err(GestureIgnoredReason::PointerMismatch));
        assert_eq!(tr.end(other), Err(GestureIgnoredReason::PointerMismatch));
        assert!(tr.is_active());
    }

    #[test]
    fn cancel_is_synthetic_release() {
        let mut tr = tracker();
        assert_eq!(tr.cancel(), None);
        tr.begin(mouse(0.0, 0.0, Instant::now())).unwrap();
        assert_eq!(
            tr.cancel(),
            Some(CaptureCommand::Release {
                pointer_id: PointerId::Mouse
            })
        );
        assert!(!tr.is_active());
    }

    #[test]
    fn handle_dispatches_phases() {
        let mut tr = tracker();
        let t = Instant::now();
        assert!(matches!(
            tr.handle(PointerEvent::touch(3, PointerPhase::Down, 0.0, 0.0, t)),
            GestureOutput::Began(_)
        ));
        assert!(matches!(
            tr.handle(PointerEvent::touch(3, PointerPhase::Move, 20.0, 0.0, t + MS_10)),
            GestureOutput::Moved(GestureDelta { dx, .. }) if dx == 20.0
        ));
        assert!(matches!(
            tr.handle(PointerEvent::mouse(PointerPhase::Cancel, 0.0, 0.0, t)),
            GestureOutput::Ignored(GestureIgnoredReason::PointerMismatch)
        ));
        assert!(matches!(
            tr.handle(PointerEvent::touch(3, PointerPhase::Up, 20.0, 0.0, t + MS_10 * 2)),
            GestureOutput::Ended(_)
        ));
        assert!(matches!(
            tr.handle(PointerEvent::touch(3, PointerPhase::Move, 0.0, 0.0, t)),
            GestureOutput::Ignored(GestureIgnoredReason::NoActiveGesture)
        ));
    }

    #[test]
    fn no_native_axis_captures_vertical() {
        let mut tr = PointerGestureTracker::new(GestureConfig {
            native_scroll_axis: None,
            ..GestureConfig::default()
        });
        let t = Instant::now();
        tr.begin(mouse(0.0, 0.0, t)).unwrap();
        let d = tr.move_to(mouse(0.0, 12.0, t + MS_10)).unwrap();
        assert_eq!(d.lock, LockState::Captured(Axis::Vertical));
        assert_eq!(d.dy, 12.0);
    }

    #[test]
    fn per_frame_conversion() {
        let v = ReleaseVelocity {
            vx: 600.0,
            vy: 0.0,
        };
        let per = v.per_frame(Axis::Horizontal, Duration::from_millis(50));
        assert!((per - 30.0).abs() < 1e-9);
    }
}
