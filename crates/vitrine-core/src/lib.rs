#![forbid(unsafe_code)]

//! Core: frame scheduling, pointer gestures, inertial motion, snapping, and
//! viewport theme sensing.
//!
//! # Role in Vitrine
//! `vitrine-core` is the host-agnostic engine behind the site's interactive
//! pieces. It never touches a platform event API or paints anything: hosts
//! feed it pointer samples, scroll offsets and region bounds, drive it once
//! per display refresh, and read back published values.
//!
//! # Primary responsibilities
//! - **FrameScheduler**: the one shared per-frame callback list, with failure
//!   isolation and scoped subscriptions.
//! - **PointerGestureTracker**: normalized samples, axis lock, release velocity,
//!   and explicit pointer-capture commands.
//! - **InertialMotionModel**: drag, elastic overflow, throw and settle.
//! - **SnapIndexResolver**: continuous position to active index and crossfade.
//! - **ViewportThemeSensor**: header contrast color from a spatial zone registry.
//! - **PinnedProgressAdapter**: scroll offset to section progress, re-measured
//!   on layout change.
//!
//! # How it fits in the system
//! `vitrine-widgets` composes these into the concrete carousel, switcher,
//! scroller and header controllers and wires them onto one scheduler in
//! pipeline order: gesture, then motion, then snap, then consumers.

pub mod easing;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod motion;
pub mod notify;
pub mod progress;
pub mod scheduler;
pub mod snap;
pub mod theme;
pub mod timeline;

pub mod config;

#[cfg(feature = "log-init")]
pub mod logging;

pub use config::EngineConfig;
pub use error::{ConfigError, FrameError, FrameResult};
pub use geometry::{Axis, Point, Rect, Viewport};
pub use gesture::{CaptureCommand, GestureSample, PointerGestureTracker, PointerId};
pub use motion::{Bounds, InertialMotionModel, MotionConfig, MotionPhase, MotionState};
pub use notify::{Listener, Notifier};
pub use progress::PinnedProgressAdapter;
pub use scheduler::{FrameInfo, FrameScheduler, FrameSubscription, FrameToken};
pub use snap::{CarouselState, SnapIndexResolver, SnapPoints};
pub use theme::{Rgb, ThemeIntent, ThemeZoneRegistry, ViewportThemeSensor};
