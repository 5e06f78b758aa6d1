#![forbid(unsafe_code)]

//! Viewport theme sensing for the fixed header chrome.
//!
//! Two pieces:
//!
//! - [`ThemeZoneRegistry`]: a spatial index of rendered regions, each
//!   optionally tagged with a [`ThemeIntent`], queried by point and z-order.
//!   It stands in for per-frame DOM hit testing.
//! - [`ViewportThemeSensor`]: once per frame, probes the registry under the
//!   header, resolves a target chrome color and glass opacity, and eases the
//!   published pair toward it.
//!
//! # Resolution order
//!
//! 1. Override set (menu open): use it, snap immediately, skip probing.
//! 2. Probe hits a region inside a light/dark zone: use that zone's palette.
//! 3. Probe hits only unzoned regions: use the caller's fallback intent if
//!    one is set, otherwise keep the previous target.
//! 4. Probe hits nothing at all (layout thrash): keep the previous target.
//!
//! # Invariants
//!
//! 1. Outside an override, the published pair moves toward the target by the
//!    fixed factor `smoothing` per frame and never overshoots it.
//! 2. Sensing misses never reset the target to a default.
//! 3. Subscribers are only notified when the published pair changes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::geometry::{Point, Rect, Viewport};
use crate::notify::{Listener, Notifier};

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(try_from = "String", into = "String"))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `#RGB` (leading `#` optional).
    pub fn from_hex(value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidColor {
            value: value.to_owned(),
        };
        let hex = value.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&hex[i..=i]).map(|v| v * 17);
                Ok(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }

    fn channels(self) -> [f64; 3] {
        [f64::from(self.r), f64::from(self.g), f64::from(self.b)]
    }

    fn from_channels(c: [f64; 3]) -> Self {
        let q = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        Self::new(q(c[0]), q(c[1]), q(c[2]))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Rgb {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Light chrome color (warm off-white).
pub const LIGHT_CHROME: Rgb = Rgb::new(0xFF, 0xFB, 0xF7);
/// Dark chrome color.
pub const DARK_CHROME: Rgb = Rgb::new(0x1A, 0x1A, 0x1A);

// ---------------------------------------------------------------------------
// Intents and zones
// ---------------------------------------------------------------------------

/// Contrast intent declared by a theme zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum ThemeIntent {
    #[cfg_attr(feature = "config", serde(alias = "white"))]
    Light,
    #[cfg_attr(feature = "config", serde(alias = "black"))]
    Dark,
    /// Defer to the enclosing zone.
    Inherit,
}

/// Unrecognized theme intent annotation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme intent {0:?}: expected light, dark or inherit")]
pub struct ParseIntentError(pub String);

impl FromStr for ThemeIntent {
    type Err = ParseIntentError;

    /// Accepts `light`/`dark`/`inherit` and the markup aliases `white`/`black`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "white" => Ok(Self::Light),
            "dark" | "black" => Ok(Self::Dark),
            "inherit" => Ok(Self::Inherit),
            _ => Err(ParseIntentError(s.to_owned())),
        }
    }
}

/// Handle to a registered region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u64);

/// A rendered region known to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRegion {
    /// Bounds in document coordinates.
    pub bounds: Rect,
    pub z_index: i32,
    /// Enclosing region, for the zone walk.
    pub parent: Option<RegionId>,
    /// Zone annotation, if the region carries one.
    pub intent: Option<ThemeIntent>,
    /// Part of the header chrome itself; never hit by the probe.
    pub chrome: bool,
}

impl ThemeRegion {
    #[must_use]
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            z_index: 0,
            parent: None,
            intent: None,
            chrome: false,
        }
    }

    #[must_use]
    pub fn zone(mut self, intent: ThemeIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    #[must_use]
    pub fn child_of(mut self, parent: RegionId) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn z(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    #[must_use]
    pub fn chrome(mut self) -> Self {
        self.chrome = true;
        self
    }
}

/// What the probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeHit {
    /// No region under the point.
    Nothing,
    /// A region was hit but no light/dark zone encloses it.
    Unzoned { region: RegionId },
    /// The nearest light/dark zone enclosing the topmost hit.
    Zone {
        region: RegionId,
        zone: RegionId,
        intent: ThemeIntent,
    },
}

/// Spatial registry of theme regions.
#[derive(Debug, Clone, Default)]
pub struct ThemeZoneRegistry {
    regions: BTreeMap<RegionId, ThemeRegion>,
    next_id: u64,
}

impl ThemeZoneRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: ThemeRegion) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        self.regions.insert(id, region);
        id
    }

    /// Remove a region. Children keep their parent link; the walk stops there.
    pub fn remove(&mut self, id: RegionId) -> Option<ThemeRegion> {
        self.regions.remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: RegionId) -> Option<&ThemeRegion> {
        self.regions.get(&id)
    }

    /// Move or resize a region. Returns `false` for unknown ids.
    pub fn set_bounds(&mut self, id: RegionId, bounds: Rect) -> bool {
        match self.regions.get_mut(&id) {
            Some(region) => {
                region.bounds = bounds;
                true
            }
            None => false,
        }
    }

    /// Change a region's zone annotation. Returns `false` for unknown ids.
    pub fn set_intent(&mut self, id: RegionId, intent: Option<ThemeIntent>) -> bool {
        match self.regions.get_mut(&id) {
            Some(region) => {
                region.intent = intent;
                true
            }
            None => false,
        }
    }

    /// Re-parent a region. Returns `false` for unknown ids.
    pub fn set_parent(&mut self, id: RegionId, parent: Option<RegionId>) -> bool {
        match self.regions.get_mut(&id) {
            Some(region) => {
                region.parent = parent;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Topmost non-chrome region containing `point`.
    ///
    /// Higher `z_index` wins; equal z goes to the later-inserted region
    /// (document order paints later siblings on top).
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<RegionId> {
        self.regions
            .iter()
            .filter(|(_, r)| !r.chrome && r.bounds.contains(point))
            .max_by(|(a_id, a), (b_id, b)| a.z_index.cmp(&b.z_index).then(a_id.cmp(b_id)))
            .map(|(id, _)| *id)
    }

    /// Hit test, then walk up to the nearest light/dark zone.
    #[must_use]
    pub fn probe(&self, point: Point) -> ProbeHit {
        let Some(hit) = self.hit_test(point) else {
            return ProbeHit::Nothing;
        };
        let mut current = Some(hit);
        // Bounded walk: a malformed parent cycle cannot spin forever.
        for _ in 0..=self.regions.len() {
            let Some(id) = current else { break };
            let Some(region) = self.regions.get(&id) else {
                break;
            };
            match region.intent {
                Some(intent @ (ThemeIntent::Light | ThemeIntent::Dark)) => {
                    return ProbeHit::Zone {
                        region: hit,
                        zone: id,
                        intent,
                    };
                }
                Some(ThemeIntent::Inherit) | None => current = region.parent,
            }
        }
        ProbeHit::Unzoned { region: hit }
    }
}

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

/// A chrome color with its glass (translucent backdrop) opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct ChromeTarget {
    pub color: Rgb,
    pub glass: f64,
}

impl ChromeTarget {
    #[must_use]
    pub const fn new(color: Rgb, glass: f64) -> Self {
        Self { color, glass }
    }
}

/// Sensor tunables and palette.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ThemeConfig {
    /// Probe distance below the viewport top (default: 60).
    pub probe_y: f64,
    /// Per-frame smoothing factor in `(0, 1]` (default: 0.4).
    pub smoothing: f64,
    /// Over a light zone.
    pub light: ChromeTarget,
    /// Over a dark zone.
    pub dark: ChromeTarget,
    /// Unzoned, caller fallback is light.
    pub fallback_light: ChromeTarget,
    /// Unzoned, caller fallback is dark.
    pub fallback_dark: ChromeTarget,
    /// Forced while the navigation menu is open.
    pub menu_override: ChromeTarget,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            probe_y: 60.0,
            smoothing: 0.4,
            light: ChromeTarget::new(LIGHT_CHROME, 0.0),
            dark: ChromeTarget::new(DARK_CHROME, 0.0),
            fallback_light: ChromeTarget::new(LIGHT_CHROME, 0.0),
            fallback_dark: ChromeTarget::new(DARK_CHROME, 0.4),
            menu_override: ChromeTarget::new(DARK_CHROME, 0.0),
        }
    }
}

impl ThemeConfig {
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            errors.push(format!(
                "theme.smoothing must be in (0, 1], got {}",
                self.smoothing
            ));
        }
        if !self.probe_y.is_finite() {
            errors.push("theme.probe_y must be finite".into());
        }
        for (name, target) in [
            ("light", &self.light),
            ("dark", &self.dark),
            ("fallback_light", &self.fallback_light),
            ("fallback_dark", &self.fallback_dark),
            ("menu_override", &self.menu_override),
        ] {
            if !(0.0..=1.0).contains(&target.glass) {
                errors.push(format!(
                    "theme.{name}.glass must be in [0, 1], got {}",
                    target.glass
                ));
            }
        }
        errors
    }

    fn for_zone(&self, intent: ThemeIntent) -> Option<ChromeTarget> {
        match intent {
            ThemeIntent::Light => Some(self.light),
            ThemeIntent::Dark => Some(self.dark),
            ThemeIntent::Inherit => None,
        }
    }

    fn for_fallback(&self, intent: ThemeIntent) -> Option<ChromeTarget> {
        match intent {
            ThemeIntent::Light => Some(self.fallback_light),
            ThemeIntent::Dark => Some(self.fallback_dark),
            ThemeIntent::Inherit => None,
        }
    }
}

/// Current and target chrome values. `current` channels are kept unrounded
/// so smoothing converges instead of stalling on integer steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromeColorState {
    pub current_color: [f64; 3],
    pub target_color: Rgb,
    pub current_glass: f64,
    pub target_glass: f64,
}

impl ChromeColorState {
    fn settled(target: ChromeTarget) -> Self {
        Self {
            current_color: target.color.channels(),
            target_color: target.color,
            current_glass: target.glass,
            target_glass: target.glass,
        }
    }

    fn output(&self) -> ThemeOutput {
        ThemeOutput {
            color: Rgb::from_channels(self.current_color),
            glass: self.current_glass,
        }
    }

    /// Largest remaining channel distance to the target color.
    #[must_use]
    pub fn color_residual(&self) -> f64 {
        let target = self.target_color.channels();
        (0..3)
            .map(|i| (target[i] - self.current_color[i]).abs())
            .fold(0.0, f64::max)
    }

    fn snap(&mut self) {
        self.current_color = self.target_color.channels();
        self.current_glass = self.target_glass;
    }

    fn ease(&mut self, factor: f64) {
        let target = self.target_color.channels();
        for (current, target) in self.current_color.iter_mut().zip(target) {
            *current += (target - *current) * factor;
            if (target - *current).abs() < SNAP_EPSILON {
                *current = target;
            }
        }
        self.current_glass += (self.target_glass - self.current_glass) * factor;
        if (self.target_glass - self.current_glass).abs() < SNAP_EPSILON / 255.0 {
            self.current_glass = self.target_glass;
        }
    }
}

const SNAP_EPSILON: f64 = 1e-3;

/// The published chrome pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeOutput {
    pub color: Rgb,
    pub glass: f64,
}

/// Where the current target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Initial,
    Zone(ThemeIntent),
    Fallback(ThemeIntent),
    Override,
}

/// Per-frame chrome color sensor.
#[derive(Debug)]
pub struct ViewportThemeSensor {
    config: ThemeConfig,
    fallback: Option<ThemeIntent>,
    override_target: Option<ChromeTarget>,
    state: ChromeColorState,
    source: TargetSource,
    published: ThemeOutput,
    changed: Notifier<ThemeOutput>,
}

impl ViewportThemeSensor {
    /// A sensor resting on the light palette.
    #[must_use]
    pub fn new(config: ThemeConfig) -> Self {
        let state = ChromeColorState::settled(config.light);
        Self {
            config,
            fallback: None,
            override_target: None,
            published: state.output(),
            state,
            source: TargetSource::Initial,
            changed: Notifier::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ThemeConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> ChromeColorState {
        self.state
    }

    #[must_use]
    pub fn source(&self) -> TargetSource {
        self.source
    }

    /// The last published pair.
    #[must_use]
    pub fn output(&self) -> ThemeOutput {
        self.published
    }

    /// Probe location for `viewport`, in document coordinates.
    #[must_use]
    pub fn probe_point(&self, viewport: &Viewport) -> Point {
        viewport.to_document(Point::new(viewport.width / 2.0, self.config.probe_y))
    }

    /// Intent used when the probe lands outside every zone. `Inherit` clears it.
    pub fn set_fallback(&mut self, intent: Option<ThemeIntent>) {
        self.fallback = intent.filter(|i| *i != ThemeIntent::Inherit);
    }

    #[must_use]
    pub fn fallback(&self) -> Option<ThemeIntent> {
        self.fallback
    }

    /// Force a fixed target, applied immediately with no smoothing.
    /// `None` resumes sensing from the forced value.
    pub fn set_override(&mut self, target: Option<ChromeTarget>) {
        self.override_target = target;
        if let Some(target) = target {
            self.retarget(target, TargetSource::Override);
            self.state.snap();
            self.publish();
        }
    }

    /// Force the configured menu-open palette.
    pub fn open_menu(&mut self) {
        self.set_override(Some(self.config.menu_override));
    }

    pub fn close_menu(&mut self) {
        self.set_override(None);
    }

    #[must_use]
    pub fn is_overridden(&self) -> bool {
        self.override_target.is_some()
    }

    /// Subscribe to published changes.
    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn on_theme_changed(&self, callback: impl FnMut(&ThemeOutput) + 'static) -> Listener {
        self.changed.subscribe(callback)
    }

    /// Run one frame: probe, resolve, smooth, publish.
    ///
    /// Returns the new output when it changed this frame.
    pub fn sense(&mut self, registry: &ThemeZoneRegistry, viewport: &Viewport) -> Option<ThemeOutput> {
        if self.override_target.is_none() {
            let hit = registry.probe(self.probe_point(viewport));
            if let Some((target, source)) = self.resolve(hit) {
                self.retarget(target, source);
            }
        }
        self.state.ease(self.config.smoothing);
        self.publish()
    }

    fn resolve(&self, hit: ProbeHit) -> Option<(ChromeTarget, TargetSource)> {
        match hit {
            ProbeHit::Nothing => None,
            ProbeHit::Zone { intent, .. } => self
                .config
                .for_zone(intent)
                .map(|t| (t, TargetSource::Zone(intent))),
            ProbeHit::Unzoned { .. } => {
                let intent = self.fallback?;
                self.config
                    .for_fallback(intent)
                    .map(|t| (t, TargetSource::Fallback(intent)))
            }
        }
    }

    fn retarget(&mut self, target: ChromeTarget, source: TargetSource) {
        if self.state.target_color != target.color
            || self.state.target_glass != target.glass
            || self.source != source
        {
            tracing::debug!(
                color = %target.color,
                glass = target.glass,
                ?source,
                "chrome target changed"
            );
        }
        self.state.target_color = target.color;
        self.state.target_glass = target.glass;
        self.source = source;
    }

    fn publish(&mut self) -> Option<ThemeOutput> {
        let output = self.state.output();
        if output == self.published {
            return None;
        }
        self.published = output;
        tracing::trace!(color = %output.color, glass = output.glass, "chrome published");
        self.changed.emit(&output);
        Some(output)
    }
}

/// Frames needed for exponential smoothing with `factor` to bring an initial
/// distance within `tolerance` of the target.
#[must_use]
pub fn frames_to_converge(factor: f64, distance: f64, tolerance: f64) -> u32 {
    if distance.abs() <= tolerance {
        return 0;
    }
    if factor >= 1.0 {
        return 1;
    }
    if factor <= 0.0 || tolerance <= 0.0 {
        return u32::MAX;
    }
    let frames = (tolerance / distance.abs()).ln() / (1.0 - factor).ln();
    frames.ceil().min(f64::from(u32::MAX)) as u32
}
