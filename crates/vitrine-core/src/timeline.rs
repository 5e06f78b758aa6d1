#![forbid(unsafe_code)]

//! Progress-driven value timelines.
//!
//! A [`ScrubTimeline`] is a set of named tracks laid out on a shared time
//! axis. Scroll progress `p ∈ [0, 1]` maps to time `p * total`, where `total`
//! is the latest track end, and each track reports its eased value at that
//! time. Before a track starts it holds `from`; after it ends it holds `to`.
//!
//! Only values are computed here; applying them to anything visual is the
//! caller's job.

use crate::easing::Easing;

/// One animated value on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub from: f64,
    pub to: f64,
    pub easing: Easing,
}

impl Track {
    #[must_use]
    pub fn new(name: impl Into<String>, from: f64, to: f64) -> Self {
        Self {
            name: name.into(),
            start: 0.0,
            duration: 1.0,
            from,
            to,
            easing: Easing::Linear,
        }
    }

    #[must_use]
    pub fn at(mut self, start: f64) -> Self {
        self.start = start.max(0.0);
        self
    }

    #[must_use]
    pub fn lasting(mut self, duration: f64) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    #[must_use]
    pub fn eased(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Value at timeline time `time`.
    #[must_use]
    pub fn value_at(&self, time: f64) -> f64 {
        if time <= self.start {
            return if self.duration <= 0.0 && time >= self.start {
                self.to
            } else {
                self.from
            };
        }
        if time >= self.end() {
            return self.to;
        }
        let t = (time - self.start) / self.duration;
        self.from + (self.to - self.from) * self.easing.apply(t)
    }
}

/// Named tracks evaluated together from one progress value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrubTimeline {
    tracks: Vec<Track>,
}

impl ScrubTimeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Latest track end.
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(Track::end).fold(0.0, f64::max)
    }

    /// Value of the track `name` at `progress`.
    #[must_use]
    pub fn value(&self, name: &str, progress: f64) -> Option<f64> {
        let time = self.time_for(progress);
        self.tracks
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value_at(time))
    }

    /// Every track's value at `progress`, in insertion order.
    pub fn sample(&self, progress: f64) -> impl Iterator<Item = (&str, f64)> + '_ {
        let time = self.time_for(progress);
        self.tracks
            .iter()
            .map(move |t| (t.name.as_str(), t.value_at(time)))
    }

    fn time_for(&self, progress: f64) -> f64 {
        let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        p * self.total_duration()
    }

    /// Header logo shrink over the pinned hero: the logo scales 3.1 → 0.85
    /// while the wordmark pieces, glass backdrop and menu icon fade in.
    #[must_use]
    pub fn header_shrink() -> Self {
        Self::new()
            .with(
                Track::new(LOGO_SCALE, 3.1, 0.85)
                    .lasting(0.8)
                    .eased(Easing::POWER2_IN_OUT),
            )
            .with(
                Track::new(AMP_OPACITY, 0.0, 1.0)
                    .at(0.1)
                    .lasting(0.3)
                    .eased(Easing::POWER1_OUT),
            )
            .with(
                Track::new(WORDMARK_OPACITY, 0.0, 1.0)
                    .at(0.2)
                    .lasting(0.3)
                    .eased(Easing::POWER1_OUT),
            )
            .with(
                Track::new(GLASS_OPACITY, 0.0, 1.0)
                    .at(0.5)
                    .lasting(0.5)
                    .eased(Easing::POWER1_OUT),
            )
            .with(
                Track::new(MENU_ICON_SCALE, 0.5, 1.0)
                    .at(0.8)
                    .lasting(0.4)
                    .eased(Easing::BackOut { overshoot: 1.7 }),
            )
    }

    /// Header slide-out as the footer enters: translate 0 → -200, linear.
    #[must_use]
    pub fn header_hide() -> Self {
        Self::new().with(Track::new(HEADER_OFFSET, 0.0, -200.0))
    }
}

pub const LOGO_SCALE: &str = "logo_scale";
pub const AMP_OPACITY: &str = "amp_opacity";
pub const WORDMARK_OPACITY: &str = "wordmark_opacity";
pub const GLASS_OPACITY: &str = "glass_opacity";
pub const MENU_ICON_SCALE: &str = "menu_icon_scale";
pub const HEADER_OFFSET: &str = "header_offset";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_holds_outside_its_window() {
        let track = Track::new("x", 10.0, 20.0).at(1.0).lasting(2.0);
        assert_eq!(track.value_at(0.0), 10.0);
        assert_eq!(track.value_at(2.0), 15.0);
        assert_eq!(track.value_at(5.0), 20.0);
    }

    #[test]
    fn zero_duration_track_jumps() {
        let track = Track::new("x", 0.0, 1.0).at(0.5).lasting(0.0);
        assert_eq!(track.value_at(0.4), 0.0);
        assert_eq!(track.value_at(0.5), 1.0);
    }

    #[test]
    fn header_shrink_endpoints() {
        let tl = ScrubTimeline::header_shrink();
        assert!((tl.total_duration() - 1.2).abs() < 1e-12);
        assert_eq!(tl.value(LOGO_SCALE, 0.0), Some(3.1));
        assert_eq!(tl.value(LOGO_SCALE, 1.0), Some(0.85));
        // The logo finishes at t = 0.8 of 1.2.
        let done = tl.value(LOGO_SCALE, 0.8 / 1.2 + 1e-9).unwrap();
        assert!((done - 0.85).abs() < 1e-9);
        assert_eq!(tl.value(MENU_ICON_SCALE, 0.5), Some(0.5));
        assert!((tl.value(MENU_ICON_SCALE, 1.0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(tl.value("missing", 0.5), None);
    }

    #[test]
    fn header_hide_is_linear() {
        let tl = ScrubTimeline::header_hide();
        assert_eq!(tl.value(HEADER_OFFSET, 0.25), Some(-50.0));
        assert_eq!(tl.value(HEADER_OFFSET, 7.0), Some(-200.0));
    }

    #[test]
    fn sample_preserves_order() {
        let tl = ScrubTimeline::header_shrink();
        let names: Vec<&str> = tl.sample(0.3).map(|(n, _)| n).collect();
        assert_eq!(names[0], LOGO_SCALE);
        assert_eq!(names.len(), 5);
    }
}
