#![forbid(unsafe_code)]

//! Inertial drag physics for one widget.
//!
//! [`InertialMotionModel`] integrates a scalar position from drag deltas and
//! a release velocity. It is owned by exactly one widget; nothing here is
//! shared.
//!
//! # Phases
//!
//! - **Dragging**: position follows the accumulated drag. Overflow past a
//!   bound is scaled by `resistance` (elastic clamping).
//! - **Settling**: position decays toward a target each frame:
//!   `position += (target - position) * factor`.
//! - **Idle**: nothing moves until the next drag or settle request.
//!
//! # Settle modes
//!
//! [`SettleMode::Target`] picks the rest target at release:
//!
//! 1. Out of bounds: return to the nearest bound (`return_smoothing`).
//! 2. Otherwise project `position + velocity * throw_multiplier`. A projection
//!    past a bound is clamped to it (`bound_smoothing`); else it is used as is
//!    (`smoothing`).
//! 3. With snap points set, the target is then moved to the nearest point.
//!
//! [`SettleMode::Friction`] keeps coasting instead: every frame
//! `target += velocity; velocity *= friction`, with the target hard-clamped
//! to the bounds (velocity zeroed on contact) and the position easing toward
//! it by `smoothing`. Once velocity falls below `velocity_epsilon` the target
//! moves to the nearest snap point, if any.
//!
//! # Units
//!
//! Positions are viewport units. Velocities are units per reference frame
//! (one display refresh); convert tracker velocities with
//! [`ReleaseVelocity::per_frame`](crate::gesture::ReleaseVelocity::per_frame).
//! All per-frame factors apply once per [`step`](InertialMotionModel::step).
//!
//! # Invariants
//!
//! 1. While dragging, `position ∈ [min - r·o, max + r·o]` where `o` is the
//!    raw overflow and `r` the resistance, further capped by `max_overflow`.
//! 2. A model that reaches Idle sits exactly on its target.
//! 3. Degenerate bounds (`min == max`) make drags and throws no-ops.
//! 4. `begin_drag` discards any residual velocity from the previous gesture.

use std::time::Duration;

use crate::snap::SnapPoints;

/// One display refresh at 60 Hz; the unit for per-frame velocities.
pub const REFERENCE_FRAME: Duration = Duration::from_micros(16_667);

/// Logical motion phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionPhase {
    #[default]
    Idle,
    Dragging,
    Settling,
}

/// How the model comes to rest after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum SettleMode {
    #[default]
    Target,
    Friction,
}

/// Allowed range for the motion position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    /// Bounds with `min` and `max` swapped into order if needed.
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// Scroll bounds for content wider than its viewport: `0..=content - viewport`.
    ///
    /// Content that fits (or any non-finite extent) yields `0..=0`.
    #[must_use]
    pub fn from_extents(content: f64, viewport: f64) -> Self {
        let span = content - viewport;
        let max = if span.is_finite() { span.max(0.0) } else { 0.0 };
        Self { min: 0.0, max }
    }

    #[inline]
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.max - self.min <= 0.0
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    #[inline]
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Public snapshot of a model's state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    pub position: f64,
    pub target: f64,
    pub velocity: f64,
    pub min: f64,
    pub max: f64,
    pub resistance: f64,
}

/// Per-instance motion tunables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct MotionConfig {
    pub mode: SettleMode,
    /// Scale applied to incoming drag deltas.
    pub drag_multiplier: f64,
    /// Overflow scale past a bound while dragging, in `[0, 1)`. Zero is a hard stop.
    pub resistance: f64,
    /// Cap on the displayed overflow past a bound.
    pub max_overflow: Option<f64>,
    /// Frames of release velocity projected into the rest target (target mode).
    pub throw_multiplier: f64,
    /// Per-frame decay factor toward an in-bounds target.
    pub smoothing: f64,
    /// Per-frame decay factor when a throw was clamped to a bound.
    pub bound_smoothing: f64,
    /// Per-frame decay factor when returning from overflow.
    pub return_smoothing: f64,
    /// Per-frame velocity retention (friction mode).
    pub friction: f64,
    pub position_epsilon: f64,
    pub velocity_epsilon: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self::carousel()
    }
}

impl MotionConfig {
    /// Snapping drag carousel.
    #[must_use]
    pub fn carousel() -> Self {
        Self {
            mode: SettleMode::Target,
            drag_multiplier: 1.0,
            resistance: 0.4,
            max_overflow: None,
            throw_multiplier: 10.0,
            smoothing: 0.12,
            bound_smoothing: 0.08,
            return_smoothing: 0.2,
            friction: 0.95,
            position_epsilon: 0.1,
            velocity_epsilon: 0.1,
        }
    }

    /// Discrete slide switcher: no throw, slower settle. Positions are in
    /// slide units, so the rest epsilons are much finer.
    #[must_use]
    pub fn switcher() -> Self {
        Self {
            throw_multiplier: 0.0,
            smoothing: 0.08,
            position_epsilon: 1e-3,
            velocity_epsilon: 1e-3,
            ..Self::carousel()
        }
    }

    /// Free-scrolling friction strip with a hard clamp.
    #[must_use]
    pub fn scroller() -> Self {
        Self {
            mode: SettleMode::Friction,
            drag_multiplier: 1.2,
            resistance: 0.0,
            max_overflow: None,
            throw_multiplier: 0.0,
            smoothing: 0.08,
            bound_smoothing: 0.08,
            return_smoothing: 0.08,
            friction: 0.95,
            position_epsilon: 0.1,
            velocity_epsilon: 0.1,
        }
    }

    /// Range violations, prefixed with `name` (e.g. `"motion.carousel"`).
    #[must_use]
    pub fn validate(&self, name: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let unit = |field: &str, v: f64, errors: &mut Vec<String>| {
            if !(v > 0.0 && v <= 1.0) {
                errors.push(format!("{name}.{field} must be in (0, 1], got {v}"));
            }
        };
        unit("smoothing", self.smoothing, &mut errors);
        unit("bound_smoothing", self.bound_smoothing, &mut errors);
        unit("return_smoothing", self.return_smoothing, &mut errors);

        if !(self.friction > 0.0 && self.friction < 1.0) {
            errors.push(format!("{name}.friction must be in (0, 1), got {}", self.friction));
        }
        if !(0.0..1.0).contains(&self.resistance) {
            errors.push(format!(
                "{name}.resistance must be in [0, 1), got {}",
                self.resistance
            ));
        }
        if !(self.drag_multiplier > 0.0) || !self.drag_multiplier.is_finite() {
            errors.push(format!(
                "{name}.drag_multiplier must be > 0, got {}",
                self.drag_multiplier
            ));
        }
        if !(self.throw_multiplier >= 0.0) || !self.throw_multiplier.is_finite() {
            errors.push(format!(
                "{name}.throw_multiplier must be >= 0, got {}",
                self.throw_multiplier
            ));
        }
        if let Some(cap) = self.max_overflow
            && !(cap > 0.0)
        {
            errors.push(format!("{name}.max_overflow must be > 0, got {cap}"));
        }
        if !(self.position_epsilon > 0.0) {
            errors.push(format!("{name}.position_epsilon must be > 0"));
        }
        if !(self.velocity_epsilon > 0.0) {
            errors.push(format!("{name}.velocity_epsilon must be > 0"));
        }
        errors
    }
}

/// Scalar inertial motion for one widget.
#[derive(Debug, Clone)]
pub struct InertialMotionModel {
    config: MotionConfig,
    bounds: Bounds,
    snap: Option<SnapPoints>,
    phase: MotionPhase,
    position: f64,
    target: f64,
    velocity: f64,
    /// Unresisted drag position; the displayed position is derived from it.
    raw: f64,
    factor: f64,
}

impl InertialMotionModel {
    #[must_use]
    pub fn new(config: MotionConfig, bounds: Bounds) -> Self {
        let factor = config.smoothing;
        Self {
            config,
            bounds,
            snap: None,
            phase: MotionPhase::Idle,
            position: bounds.min,
            target: bounds.min,
            velocity: 0.0,
            raw: bounds.min,
            factor,
        }
    }

    /// Attach snap points that every settle converges to.
    #[must_use]
    pub fn with_snap_points(mut self, points: SnapPoints) -> Self {
        self.snap = Some(points);
        self
    }

    #[must_use]
    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[must_use]
    pub fn snap_points(&self) -> Option<&SnapPoints> {
        self.snap.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.phase == MotionPhase::Idle
    }

    #[must_use]
    pub fn state(&self) -> MotionState {
        MotionState {
            position: self.position,
            target: self.target,
            velocity: self.velocity,
            min: self.bounds.min,
            max: self.bounds.max,
            resistance: self.config.resistance,
        }
    }

    /// Replace the snap points (layout change). Does not move the model.
    pub fn set_snap_points(&mut self, points: Option<SnapPoints>) {
        self.snap = points;
    }

    /// Replace the bounds (layout change). An idle model left outside the new
    /// bounds settles back into them.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        if self.phase == MotionPhase::Idle && !bounds.contains(self.position) {
            let target = self.rest_target(bounds.clamp(self.position));
            self.start_settle(target, self.config.return_smoothing);
        }
    }

    /// Start a drag.
    ///
    /// `rendered` is the position actually on screen, read back from the host;
    /// when present the model resynchronizes to it so an interrupted settle
    /// does not jump. Residual velocity is always discarded.
    pub fn begin_drag(&mut self, rendered: Option<f64>) {
        if let Some(rendered) = rendered.filter(|v| v.is_finite()) {
            self.position = rendered;
        }
        self.raw = self.unresist(self.position);
        self.target = self.position;
        self.velocity = 0.0;
        self.set_phase(MotionPhase::Dragging);
    }

    /// Apply a drag delta. Ignored unless dragging.
    pub fn drag_by(&mut self, delta: f64) {
        if self.phase != MotionPhase::Dragging || !delta.is_finite() {
            return;
        }
        if self.bounds.is_degenerate() {
            self.position = self.bounds.min;
            self.target = self.position;
            return;
        }
        self.raw += delta * self.config.drag_multiplier;
        let resisted = self.resist(self.raw);
        match self.config.mode {
            SettleMode::Target => {
                self.position = resisted;
                self.target = resisted;
            }
            // Position keeps easing toward the drag target in `step`.
            SettleMode::Friction => self.target = resisted,
        }
    }

    /// Set the live drag velocity (units per frame). Friction mode coasts
    /// with it after release.
    pub fn set_drag_velocity(&mut self, velocity: f64) {
        if self.phase == MotionPhase::Dragging && velocity.is_finite() {
            self.velocity = velocity * self.config.drag_multiplier;
        }
    }

    /// Release the drag with a velocity in units per frame.
    pub fn release(&mut self, velocity: f64) {
        if self.phase != MotionPhase::Dragging {
            return;
        }
        let velocity = if velocity.is_finite() { velocity } else { 0.0 };
        if self.bounds.is_degenerate() {
            self.velocity = 0.0;
            self.start_settle(self.bounds.min, self.config.return_smoothing);
            return;
        }

        match self.config.mode {
            SettleMode::Target => {
                let (target, factor) = if !self.bounds.contains(self.position) {
                    (self.bounds.clamp(self.position), self.config.return_smoothing)
                } else {
                    let projected = self.position + velocity * self.config.throw_multiplier;
                    if self.bounds.contains(projected) {
                        (projected, self.config.smoothing)
                    } else {
                        (self.bounds.clamp(projected), self.config.bound_smoothing)
                    }
                };
                self.velocity = 0.0;
                let target = self.rest_target(target);
                self.start_settle(target, factor);
            }
            SettleMode::Friction => {
                self.velocity = velocity * self.config.drag_multiplier;
                self.target = self.bounds.clamp(self.target);
                if self.velocity.abs() < self.config.velocity_epsilon {
                    // Nothing to coast with: rest now.
                    self.velocity = 0.0;
                    self.target = self.rest_target(self.target);
                }
                self.factor = self.config.smoothing;
                self.set_phase(MotionPhase::Settling);
            }
        }
        tracing::trace!(
            position = self.position,
            target = self.target,
            velocity = self.velocity,
            "motion released"
        );
    }

    /// Programmatically settle to `target` (clamped to bounds), e.g. an
    /// index change from a button. Ignored while dragging.
    pub fn settle_to(&mut self, target: f64) {
        if self.phase == MotionPhase::Dragging || !target.is_finite() {
            return;
        }
        self.velocity = 0.0;
        self.start_settle(self.bounds.clamp(target), self.config.smoothing);
    }

    /// Place the model at `position` immediately and go idle.
    pub fn jump_to(&mut self, position: f64) {
        if !position.is_finite() {
            return;
        }
        let position = self.bounds.clamp(position);
        self.position = position;
        self.target = position;
        self.raw = position;
        self.velocity = 0.0;
        self.set_phase(MotionPhase::Idle);
    }

    /// Advance one frame. Returns `true` while the model is still moving.
    pub fn step(&mut self) -> bool {
        match self.phase {
            MotionPhase::Idle => false,
            MotionPhase::Dragging => {
                if self.config.mode == SettleMode::Friction {
                    self.position += (self.target - self.position) * self.config.smoothing;
                }
                true
            }
            MotionPhase::Settling => {
                if self.config.mode == SettleMode::Friction {
                    self.coast();
                }
                let before = self.position;
                self.position += (self.target - self.position) * self.factor;
                if self.config.mode == SettleMode::Target {
                    self.velocity = self.position - before;
                }

                let residual = (self.target - self.position).abs();
                if residual < self.config.position_epsilon
                    && self.velocity.abs() < self.config.velocity_epsilon
                {
                    self.position = self.target;
                    self.raw = self.target;
                    self.velocity = 0.0;
                    self.set_phase(MotionPhase::Idle);
                    return false;
                }
                true
            }
        }
    }

    fn coast(&mut self) {
        if self.velocity == 0.0 {
            return;
        }
        self.target += self.velocity;
        self.velocity *= self.config.friction;
        if !self.bounds.contains(self.target) {
            self.target = self.bounds.clamp(self.target);
            self.velocity = 0.0;
        }
        if self.velocity.abs() < self.config.velocity_epsilon {
            self.velocity = 0.0;
            self.target = self.rest_target(self.target);
        }
    }

    fn start_settle(&mut self, target: f64, factor: f64) {
        self.target = target;
        self.factor = factor;
        self.set_phase(MotionPhase::Settling);
    }

    /// Nearest snap point to `value`, or `value` clamped to bounds.
    fn rest_target(&self, value: f64) -> f64 {
        let clamped = self.bounds.clamp(value);
        self.snap
            .as_ref()
            .and_then(|s| s.nearest_position(clamped))
            .map_or(clamped, |p| self.bounds.clamp(p))
    }

    fn resist(&self, raw: f64) -> f64 {
        let r = self.config.resistance;
        let cap = self.config.max_overflow.unwrap_or(f64::INFINITY);
        if raw > self.bounds.max {
            self.bounds.max + ((raw - self.bounds.max) * r).min(cap)
        } else if raw < self.bounds.min {
            self.bounds.min - ((self.bounds.min - raw) * r).min(cap)
        } else {
            raw
        }
    }

    /// Inverse of `resist` for a displayed position (best effort at the cap).
    fn unresist(&self, position: f64) -> f64 {
        let r = self.config.resistance;
        if r <= 0.0 {
            return self.bounds.clamp(position);
        }
        if position > self.bounds.max {
            self.bounds.max + (position - self.bounds.max) / r
        } else if position < self.bounds.min {
            self.bounds.min - (self.bounds.min - position) / r
        } else {
            position
        }
    }

    fn set_phase(&mut self, phase: MotionPhase) {
        if self.phase != phase {
            tracing::trace!(from = ?self.phase, to = ?phase, position = self.position, "motion phase");
            self.phase = phase;
        }
    }
}
