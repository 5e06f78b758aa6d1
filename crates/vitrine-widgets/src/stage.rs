#![forbid(unsafe_code)]

//! One scheduler, many widgets.
//!
//! [`Stage`] owns the [`FrameScheduler`], the current [`Viewport`], the theme
//! zone registry and the outgoing capture-command queue. Mounting a widget
//! subscribes it to the scheduler; widgets run in mount order, so mount the
//! producers (switcher, carousels) before their consumers (header).
//!
//! # Invariants
//!
//! 1. Every widget sees the same viewport and registry within one tick.
//! 2. A widget unmounted (or dropped) never runs again, and any pointer
//!    capture it held is released through a synthetic `Release`.
//!
//! # Failure Modes
//!
//! - A frame that finds the registry or its widget already borrowed fails
//!   with a [`FrameError`]; the scheduler's failure budget applies.
//! - Host calls that find a widget busy are dropped with a warning.

use std::cell::{Cell, RefCell, RefMut};
use std::rc::Rc;

use web_time::Instant;

use vitrine_core::config::EngineConfig;
use vitrine_core::error::FrameError;
use vitrine_core::geometry::Viewport;
use vitrine_core::gesture::{CaptureCommand, PointerEvent};
use vitrine_core::notify::Listener;
use vitrine_core::scheduler::{
    FrameInfo, FrameScheduler, FrameSubscription, FrameToken, SchedulerConfig, TickReport,
};
use vitrine_core::theme::ThemeZoneRegistry;

use crate::header::HeaderChrome;
use crate::switcher::SlideSwitcher;
use crate::{FrameContext, FrameWidget};

type CommandSink = Rc<RefCell<Vec<CaptureCommand>>>;

/// Shared frame environment for a set of widgets.
#[derive(Debug)]
pub struct Stage {
    scheduler: FrameScheduler,
    viewport: Rc<Cell<Viewport>>,
    zones: Rc<RefCell<ThemeZoneRegistry>>,
    commands: CommandSink,
}

impl Stage {
    #[must_use]
    pub fn new(config: SchedulerConfig, viewport: Viewport) -> Self {
        Self {
            scheduler: FrameScheduler::new(config),
            viewport: Rc::new(Cell::new(viewport)),
            zones: Rc::new(RefCell::new(ThemeZoneRegistry::new())),
            commands: Rc::new(RefCell::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig, viewport: Viewport) -> Self {
        Self::new(config.scheduler.clone(), viewport)
    }

    #[must_use]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    /// Resize, scroll or reflow. Takes effect on the next tick.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.viewport.set(viewport);
    }

    pub fn scroll_to(&self, scroll_y: f64) {
        self.viewport.set(self.viewport.get().with_scroll(scroll_y));
    }

    /// Edit the theme zones. Do not hold the guard across a tick.
    pub fn zones_mut(&self) -> RefMut<'_, ThemeZoneRegistry> {
        self.zones.borrow_mut()
    }

    /// Subscribe `widget` to the scheduler, after everything mounted so far.
    pub fn mount<W: FrameWidget + 'static>(&self, widget: W) -> Mounted<W> {
        let label = widget.label();
        let widget = Rc::new(RefCell::new(widget));
        let callback = {
            let widget = Rc::clone(&widget);
            let viewport = Rc::clone(&self.viewport);
            let zones = Rc::clone(&self.zones);
            let sink = Rc::clone(&self.commands);
            move |info: &FrameInfo| {
                let zones = zones
                    .try_borrow()
                    .map_err(|_| FrameError::new("theme zone registry is being edited"))?;
                let mut widget = widget
                    .try_borrow_mut()
                    .map_err(|_| FrameError::new(format!("{label} is borrowed")))?;
                let ctx = FrameContext {
                    info: *info,
                    viewport: viewport.get(),
                    zones: &zones,
                };
                let result = widget.frame(&ctx);
                let commands = widget.take_capture_commands();
                if !commands.is_empty() {
                    sink.borrow_mut().extend(commands);
                }
                result
            }
        };
        let subscription = self.scheduler.subscribe_scoped(label, callback);
        tracing::debug!(label, token = subscription.token().id(), "widget mounted");
        Mounted {
            widget,
            subscription: Some(subscription),
            sink: Rc::clone(&self.commands),
            label,
        }
    }

    /// Run one frame for every mounted widget.
    pub fn tick(&self, now: Instant) -> TickReport {
        self.scheduler.tick(now)
    }

    /// Capture commands the host must apply, in the order they were produced.
    pub fn drain_capture_commands(&self) -> Vec<CaptureCommand> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new(SchedulerConfig::default(), Viewport::default())
    }
}

/// Handle to a mounted widget. Dropping it unmounts the widget.
#[derive(Debug)]
pub struct Mounted<W: FrameWidget> {
    widget: Rc<RefCell<W>>,
    subscription: Option<FrameSubscription>,
    sink: CommandSink,
    label: &'static str,
}

impl<W: FrameWidget> Mounted<W> {
    /// Scheduler token of the live subscription.
    #[must_use]
    pub fn token(&self) -> Option<FrameToken> {
        self.subscription.as_ref().map(FrameSubscription::token)
    }

    /// Queue a pointer signal for the next frame.
    pub fn pointer(&self, event: PointerEvent) {
        match self.widget.try_borrow_mut() {
            Ok(mut widget) => widget.push_pointer(event),
            Err(_) => tracing::warn!(label = self.label, "pointer dropped; widget busy"),
        }
    }

    /// Read the widget. `None` if it is busy.
    pub fn with<R>(&self, f: impl FnOnce(&W) -> R) -> Option<R> {
        self.widget.try_borrow().ok().map(|w| f(&w))
    }

    /// Mutate the widget between frames. `None` if it is busy.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut W) -> R) -> Option<R> {
        self.widget.try_borrow_mut().ok().map(|mut w| f(&mut w))
    }

    /// Unsubscribe and tear the widget down, returning the `Release` for a
    /// capture it still held. Commands it produced earlier stay queued on the
    /// stage.
    pub fn unmount(mut self) -> Option<CaptureCommand> {
        self.teardown()
    }

    fn teardown(&mut self) -> Option<CaptureCommand> {
        let subscription = self.subscription.take()?;
        drop(subscription);
        let Ok(mut widget) = self.widget.try_borrow_mut() else {
            tracing::warn!(label = self.label, "widget busy during unmount");
            return None;
        };
        let pending = widget.take_capture_commands();
        if !pending.is_empty() {
            self.sink.borrow_mut().extend(pending);
        }
        let release = widget.unmount();
        tracing::debug!(label = self.label, released = release.is_some(), "widget unmounted");
        release
    }
}

impl<W: FrameWidget> Drop for Mounted<W> {
    fn drop(&mut self) {
        if let Some(release) = self.teardown()
            && let Ok(mut sink) = self.sink.try_borrow_mut()
        {
            sink.push(release);
        }
    }
}

/// Feed the switcher's slide intent to the header as its fallback.
///
/// The header starts from the switcher's current slide. Keep the listener
/// alive for as long as both are mounted.
#[must_use = "dropping the listener unlinks the widgets"]
pub fn link_theme_fallback(
    switcher: &Mounted<SlideSwitcher>,
    header: &Mounted<HeaderChrome>,
) -> Option<Listener> {
    let slot = header.with(HeaderChrome::fallback_slot)?;
    switcher.with(|s| {
        slot.set(s.active_intent());
        s.on_intent_changed(move |intent| slot.set(Some(*intent)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vitrine_core::error::FrameResult;
    use vitrine_core::gesture::PointerPhase;

    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl FrameWidget for Probe {
        fn label(&self) -> &'static str {
            self.name
        }

        fn frame(&mut self, _ctx: &FrameContext<'_>) -> FrameResult {
            self.log.borrow_mut().push(self.name);
            Ok(())
        }
    }

    #[test]
    fn widgets_run_in_mount_order() {
        let stage = Stage::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _a = stage.mount(Probe { name: "a", log: log.clone() });
        let _b = stage.mount(Probe { name: "b", log: log.clone() });
        stage.tick(Instant::now());
        stage.tick(Instant::now());
        assert_eq!(*log.borrow(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn dropped_widget_stops_running() {
        let stage = Stage::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = stage.mount(Probe { name: "a", log: log.clone() });
        stage.tick(Instant::now());
        drop(a);
        let report = stage.tick(Instant::now());
        assert_eq!(report.ran, 0);
        assert!(stage.scheduler().is_empty());
    }

    #[test]
    fn held_registry_fails_the_frame() {
        let stage = Stage::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _a = stage.mount(Probe { name: "a", log: log.clone() });
        let guard = stage.zones_mut();
        let report = stage.tick(Instant::now());
        drop(guard);
        assert_eq!(report.failed, 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn dropping_a_dragged_switcher_releases_capture() {
        let stage = Stage::default();
        let switcher = stage.mount(SlideSwitcher::with_defaults(vec![
            vitrine_core::theme::ThemeIntent::Light,
            vitrine_core::theme::ThemeIntent::Dark,
        ]));
        let t = Instant::now();
        switcher.pointer(PointerEvent::touch(4, PointerPhase::Down, 10.0, 10.0, t));
        stage.tick(t);
        assert_eq!(stage.drain_capture_commands().len(), 1);

        drop(switcher);
        let commands = stage.drain_capture_commands();
        assert!(matches!(commands.as_slice(), [CaptureCommand::Release { .. }]));
    }

    #[test]
    fn explicit_unmount_returns_release() {
        let stage = Stage::default();
        let switcher = stage.mount(SlideSwitcher::with_defaults(vec![
            vitrine_core::theme::ThemeIntent::Light,
        ]));
        let t = Instant::now();
        switcher.pointer(PointerEvent::mouse(PointerPhase::Down, 0.0, 0.0, t));
        stage.tick(t + Duration::from_millis(16));
        let _ = stage.drain_capture_commands();
        assert!(matches!(switcher.unmount(), Some(CaptureCommand::Release { .. })));
        assert!(stage.drain_capture_commands().is_empty());
    }
}
