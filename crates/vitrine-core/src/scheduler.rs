#![forbid(unsafe_code)]

//! Host-driven frame scheduler.
//!
//! [`FrameScheduler`] owns the single recurring per-frame callback list. It
//! never runs a loop of its own: the host calls [`tick`](FrameScheduler::tick)
//! once per display refresh (`requestAnimationFrame` on the web, vsync
//! elsewhere) and every subscriber runs exactly once, in subscription order.
//!
//! # Invariants
//!
//! 1. Tokens are never reused: each subscription gets a fresh, monotonically
//!    increasing [`FrameToken`].
//! 2. Within one tick, callbacks run in subscription order, each at most once.
//! 3. A callback subscribed during a tick first runs on the next tick.
//! 4. A callback unsubscribed during a tick does not run for the remainder of
//!    that tick (unless it already ran).
//! 5. A failing callback never prevents later callbacks in the same tick from
//!    running. After `max_consecutive_failures` failures in a row it is
//!    unsubscribed automatically. A success resets its counter.
//!
//! # Failure Modes
//!
//! - Re-entrant `tick()` from inside a callback is refused and logged; the
//!   outer tick completes normally.
//! - Failures are reported through `FrameResult`; panics are not caught
//!   (release builds abort on panic).

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use web_time::Instant;

use crate::error::FrameResult;

/// Identifier of one scheduler subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(u64);

impl FrameToken {
    /// Raw numeric id, for logging.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FrameToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Per-frame timing handed to every callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Monotonic frame counter, starting at 1 for the first tick.
    pub frame: u64,
    /// Host timestamp for this frame.
    pub now: Instant,
    /// Time since the previous tick, clamped to `max_frame_dt`. Zero on the
    /// first tick.
    pub dt: Duration,
}

/// Scheduler tunables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SchedulerConfig {
    /// Consecutive failures before a callback is unsubscribed (default: 3).
    pub max_consecutive_failures: u32,
    /// Upper bound on `FrameInfo::dt`, so a backgrounded tab does not hand
    /// physics a multi-second step (default: 100ms).
    #[cfg_attr(feature = "config", serde(with = "crate::config::duration_ms"))]
    pub max_frame_dt: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            max_frame_dt: Duration::from_millis(100),
        }
    }
}

/// A boxed frame callback.
pub type FrameCallback = Box<dyn FnMut(&FrameInfo) -> FrameResult>;

struct Entry {
    token: FrameToken,
    label: String,
    callback: FrameCallback,
    consecutive_failures: u32,
}

struct SchedulerInner {
    config: SchedulerConfig,
    entries: Vec<Entry>,
    /// Subscribed while a tick was running; appended after it finishes.
    pending: Vec<Entry>,
    /// Unsubscribed while a tick was running.
    cancelled: HashSet<FrameToken>,
    registered: HashSet<FrameToken>,
    next_token: u64,
    frame: u64,
    last_tick: Option<Instant>,
    in_tick: bool,
}

impl SchedulerInner {
    fn remove(&mut self, token: FrameToken) -> bool {
        if !self.registered.remove(&token) {
            return false;
        }
        if self.in_tick {
            self.cancelled.insert(token);
            self.pending.retain(|e| e.token != token);
        } else {
            self.entries.retain(|e| e.token != token);
        }
        true
    }
}

/// Summary of one [`FrameScheduler::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Frame number that was run (0 if the tick was refused).
    pub frame: u64,
    /// Callbacks invoked.
    pub ran: usize,
    /// Callbacks that returned an error.
    pub failed: usize,
    /// Callbacks unsubscribed for exceeding the failure budget.
    pub evicted: Vec<FrameToken>,
}

/// Shared handle to the frame scheduler.
///
/// Cloning creates another handle to the **same** scheduler.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FrameScheduler")
            .field("subscribers", &inner.registered.len())
            .field("frame", &inner.frame)
            .field("in_tick", &inner.in_tick)
            .finish()
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl FrameScheduler {
    /// Create a scheduler with the given configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                config,
                entries: Vec::new(),
                pending: Vec::new(),
                cancelled: HashSet::new(),
                registered: HashSet::new(),
                next_token: 1,
                frame: 0,
                last_tick: None,
                in_tick: false,
            })),
        }
    }

    /// Register a per-frame callback. `label` is used in logs only.
    pub fn subscribe(
        &self,
        label: impl Into<String>,
        callback: impl FnMut(&FrameInfo) -> FrameResult + 'static,
    ) -> FrameToken {
        let mut inner = self.inner.borrow_mut();
        let token = FrameToken(inner.next_token);
        inner.next_token += 1;
        let entry = Entry {
            token,
            label: label.into(),
            callback: Box::new(callback),
            consecutive_failures: 0,
        };
        tracing::debug!(token = token.id(), label = %entry.label, "frame subscription added");
        inner.registered.insert(token);
        if inner.in_tick {
            inner.pending.push(entry);
        } else {
            inner.entries.push(entry);
        }
        token
    }

    /// Register a callback whose lifetime is tied to the returned guard.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_scoped(
        &self,
        label: impl Into<String>,
        callback: impl FnMut(&FrameInfo) -> FrameResult + 'static,
    ) -> FrameSubscription {
        let token = self.subscribe(label, callback);
        FrameSubscription {
            scheduler: Rc::downgrade(&self.inner),
            token,
        }
    }

    /// Remove a subscription. Returns `false` if the token is unknown or was
    /// already removed.
    pub fn unsubscribe(&self, token: FrameToken) -> bool {
        let removed = self.inner.borrow_mut().remove(token);
        if removed {
            tracing::debug!(token = token.id(), "frame subscription removed");
        }
        removed
    }

    /// Whether `token` is currently subscribed.
    #[must_use]
    pub fn is_subscribed(&self, token: FrameToken) -> bool {
        self.inner.borrow().registered.contains(&token)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().registered.len()
    }

    /// Whether there are no live subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of frames run so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.inner.borrow().frame
    }

    /// Run one frame: invoke every subscriber once, in subscription order.
    pub fn tick(&self, now: Instant) -> TickReport {
        let (mut entries, info, max_failures) = {
            let mut inner = self.inner.borrow_mut();
            if inner.in_tick {
                tracing::warn!(frame = inner.frame, "re-entrant frame tick refused");
                return TickReport::default();
            }
            inner.in_tick = true;
            let dt = inner
                .last_tick
                .map(|last| now.saturating_duration_since(last))
                .unwrap_or(Duration::ZERO)
                .min(inner.config.max_frame_dt);
            inner.last_tick = Some(now);
            inner.frame += 1;
            let info = FrameInfo {
                frame: inner.frame,
                now,
                dt,
            };
            (
                std::mem::take(&mut inner.entries),
                info,
                inner.config.max_consecutive_failures.max(1),
            )
        };

        let mut report = TickReport {
            frame: info.frame,
            ..TickReport::default()
        };

        for entry in &mut entries {
            if self.inner.borrow().cancelled.contains(&entry.token) {
                continue;
            }
            report.ran += 1;
            match (entry.callback)(&info) {
                Ok(()) => entry.consecutive_failures = 0,
                Err(err) => {
                    report.failed += 1;
                    entry.consecutive_failures += 1;
                    tracing::warn!(
                        token = entry.token.id(),
                        label = %entry.label,
                        frame = info.frame,
                        consecutive_failures = entry.consecutive_failures,
                        error = %err,
                        "frame callback failed"
                    );
                    if entry.consecutive_failures >= max_failures {
                        tracing::error!(
                            token = entry.token.id(),
                            label = %entry.label,
                            consecutive_failures = entry.consecutive_failures,
                            "frame callback unsubscribed after repeated failures"
                        );
                        report.evicted.push(entry.token);
                    }
                }
            }
        }

        let mut inner = self.inner.borrow_mut();
        for token in &report.evicted {
            inner.registered.remove(token);
        }
        let cancelled = std::mem::take(&mut inner.cancelled);
        entries.retain(|e| !cancelled.contains(&e.token) && !report.evicted.contains(&e.token));
        let pending = std::mem::take(&mut inner.pending);
        entries.extend(pending);
        inner.entries = entries;
        inner.in_tick = false;
        tracing::trace!(
            frame = info.frame,
            ran = report.ran,
            failed = report.failed,
            "frame complete"
        );
        report
    }
}

/// RAII guard for a scheduler subscription; unsubscribes on drop.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct FrameSubscription {
    scheduler: Weak<RefCell<SchedulerInner>>,
    token: FrameToken,
}

impl FrameSubscription {
    /// The underlying token.
    #[must_use]
    pub fn token(&self) -> FrameToken {
        self.token
    }
}

impl std::fmt::Debug for FrameSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSubscription")
            .field("token", &self.token)
            .finish()
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.scheduler.upgrade() {
            // Callbacks run without the scheduler borrowed, so this only
            // fails if dropped from inside another scheduler method.
            if let Ok(mut inner) = inner.try_borrow_mut()
                && inner.remove(self.token)
            {
                tracing::debug!(token = self.token.id(), "frame subscription dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;

    fn t0() -> Instant {
        Instant::now()
    }

    const MS_16: Duration = Duration::from_millis(16);

    #[test]
    fn callbacks_run_in_subscription_order() {
        let sched = FrameScheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let log = log.clone();
            sched.subscribe(name, move |_| {
                log.borrow_mut().push(name);
                Ok(())
            });
        }
        sched.tick(t0());
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn tokens_are_unique() {
        let sched = FrameScheduler::default();
        let a = sched.subscribe("a", |_| Ok(()));
        let b = sched.subscribe("b", |_| Ok(()));
        assert!(sched.unsubscribe(a));
        let c = sched.subscribe("c", |_| Ok(()));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn unsubscribe_stops_callback() {
        let sched = FrameScheduler::default();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let token = sched.subscribe("counter", move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });
        let t = t0();
        sched.tick(t);
        assert!(sched.unsubscribe(token));
        assert!(!sched.unsubscribe(token));
        sched.tick(t + MS_16);
        assert_eq!(*hits.borrow(), 1);
        assert!(sched.is_empty());
    }

    #[test]
    fn failing_callback_is_isolated() {
        let sched = FrameScheduler::default();
        let hits = Rc::new(RefCell::new(0));
        sched.subscribe("broken", |_| Err(FrameError::new("boom")));
        let h = hits.clone();
        sched.subscribe("healthy", move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });
        let report = sched.tick(t0());
        assert_eq!(report.ran, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn three_consecutive_failures_evict() {
        let sched = FrameScheduler::default();
        let token = sched.subscribe("broken", |_| Err(FrameError::new("boom")));
        let t = t0();
        assert!(sched.tick(t).evicted.is_empty());
        assert!(sched.tick(t + MS_16).evicted.is_empty());
        let report = sched.tick(t + MS_16 * 2);
        assert_eq!(report.evicted, vec![token]);
        assert!(!sched.is_subscribed(token));
        assert_eq!(sched.tick(t + MS_16 * 3).ran, 0);
    }

    #[test]
    fn success_resets_failure_count() {
        let sched = FrameScheduler::default();
        let calls = Rc::new(RefCell::new(0u32));
        let c = calls.clone();
        // Fails on calls 1, 2, 4, 5: never three in a row.
        let token = sched.subscribe("flaky", move |_| {
            *c.borrow_mut() += 1;
            if *c.borrow() % 3 == 0 {
                Ok(())
            } else {
                Err(FrameError::new("flaky"))
            }
        });
        let t = t0();
        for i in 0..6u32 {
            sched.tick(t + MS_16 * i);
        }
        assert!(sched.is_subscribed(token));
    }

    #[test]
    fn subscribe_during_tick_runs_next_frame() {
        let sched = FrameScheduler::default();
        let late_hits = Rc::new(RefCell::new(0));
        let handle = sched.clone();
        let lh = late_hits.clone();
        let mut added = false;
        sched.subscribe("spawner", move |_| {
            if !added {
                added = true;
                let lh = lh.clone();
                handle.subscribe("late", move |_| {
                    *lh.borrow_mut() += 1;
                    Ok(())
                });
            }
            Ok(())
        });
        let t = t0();
        sched.tick(t);
        assert_eq!(*late_hits.borrow(), 0);
        sched.tick(t + MS_16);
        assert_eq!(*late_hits.borrow(), 1);
    }

    #[test]
    fn unsubscribe_during_tick_skips_later_callback() {
        let sched = FrameScheduler::default();
        let hits = Rc::new(RefCell::new(0));
        let victim: Rc<RefCell<Option<FrameToken>>> = Rc::new(RefCell::new(None));
        let handle = sched.clone();
        let v = victim.clone();
        sched.subscribe("killer", move |_| {
            if let Some(token) = *v.borrow() {
                handle.unsubscribe(token);
            }
            Ok(())
        });
        let h = hits.clone();
        let token = sched.subscribe("victim", move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });
        *victim.borrow_mut() = Some(token);
        sched.tick(t0());
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn scoped_subscription_unsubscribes_on_drop() {
        let sched = FrameScheduler::default();
        let guard = sched.subscribe_scoped("scoped", |_| Ok(()));
        let token = guard.token();
        assert!(sched.is_subscribed(token));
        drop(guard);
        assert!(!sched.is_subscribed(token));
    }

    #[test]
    fn reentrant_tick_is_refused() {
        let sched = FrameScheduler::default();
        let handle = sched.clone();
        let inner_report = Rc::new(RefCell::new(None));
        let r = inner_report.clone();
        sched.subscribe("reentrant", move |info| {
            *r.borrow_mut() = Some(handle.tick(info.now));
            Ok(())
        });
        let report = sched.tick(t0());
        assert_eq!(report.frame, 1);
        assert_eq!(inner_report.borrow().as_ref().map(|r| r.frame), Some(0));
        assert_eq!(sched.frame_count(), 1);
    }

    #[test]
    fn dt_is_measured_and_clamped() {
        let sched = FrameScheduler::default();
        let dts = Rc::new(RefCell::new(Vec::new()));
        let d = dts.clone();
        sched.subscribe("dt", move |info| {
            d.borrow_mut().push(info.dt);
            Ok(())
        });
        let t = t0();
        sched.tick(t);
        sched.tick(t + MS_16);
        sched.tick(t + MS_16 + Duration::from_secs(5));
        assert_eq!(
            *dts.borrow(),
            vec![Duration::ZERO, MS_16, Duration::from_millis(100)]
        );
    }
}
