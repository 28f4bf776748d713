//! Crossfade between the old page and the new one.
//!
//! ```text
//!            load start                 load end                 p == 1
//! Settled ─────────────▶ FadingOut ─────────────▶ FadingIn ──────────────▶ Settled
//!                           ▲                        │
//!                           └──── load start ────────┘
//! ```
//!
//! Entering `FadingOut` captures a snapshot of the primary surface. While fading out only
//! the snapshot is drawn, increasingly defocused. While fading in the live surfaces are
//! drawn over the snapshot with rising opacity as the snapshot fades away. Once fully
//! faded in the snapshot is released.
//!
//! Only a change of direction restarts the timer.

use crate::render::{ErasedSurface, LayerStyle, SurfaceSize};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FadeDirection {
    #[default]
    Settled,
    FadingOut,
    FadingIn,
}

/// Copy of the primary surface taken at load start.
pub struct Snapshot {
    pub(crate) surface: Box<dyn ErasedSurface>,
    pub(crate) visible: SurfaceSize,
}

impl Snapshot {
    pub(crate) fn new(surface: Box<dyn ErasedSurface>, visible: SurfaceSize) -> Self {
        Self { surface, visible }
    }

    pub fn surface(&self) -> &dyn ErasedSurface {
        self.surface.as_ref()
    }

    pub fn visible(&self) -> SurfaceSize {
        self.visible
    }
}

pub struct TransitionController {
    direction: FadeDirection,
    since: Option<Instant>,
    snapshot: Option<Snapshot>,
    duration: Duration,
}

impl TransitionController {
    pub fn new(duration: Duration) -> Self {
        Self {
            direction: FadeDirection::Settled,
            since: None,
            snapshot: None,
            duration,
        }
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    /// Instant the current direction was entered. `None` while settled.
    pub fn started_at(&self) -> Option<Instant> {
        self.since
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Progress of the current direction in `0.0..=1.0`. A settled transition is complete.
    pub fn progress(&self, now: Instant) -> f32 {
        match self.since {
            None => 1.0,
            Some(since) => {
                let elapsed = now.saturating_duration_since(since).as_secs_f32();
                (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0)
            }
        }
    }

    /// Returns true when a load start changes direction and so needs a fresh snapshot.
    pub fn needs_snapshot(&self) -> bool {
        self.direction != FadeDirection::FadingOut
    }

    /// Enters `FadingOut` with `snapshot`. Returns the snapshot it replaces, if any, which
    /// the caller disposes.
    pub(crate) fn begin_fade_out(&mut self, now: Instant, snapshot: Snapshot) -> Option<Snapshot> {
        log::debug!("transition {:?} -> FadingOut", self.direction);
        self.direction = FadeDirection::FadingOut;
        self.since = Some(now);
        self.snapshot.replace(snapshot)
    }

    /// Enters `FadingIn` when fading out. Returns false when the load end changes nothing.
    pub(crate) fn begin_fade_in(&mut self, now: Instant) -> bool {
        if self.direction != FadeDirection::FadingOut {
            return false;
        }
        log::debug!("transition FadingOut -> FadingIn");
        self.direction = FadeDirection::FadingIn;
        self.since = Some(now);
        true
    }

    /// Settles a finished fade in, handing back the snapshot for disposal.
    pub(crate) fn settle_if_done(&mut self, now: Instant) -> Option<Snapshot> {
        if self.direction != FadeDirection::FadingIn || self.progress(now) < 1.0 {
            return None;
        }
        log::debug!("transition FadingIn -> Settled");
        self.direction = FadeDirection::Settled;
        self.since = None;
        self.snapshot.take()
    }

    /// Drops back to `Settled` unconditionally, handing back the snapshot.
    pub(crate) fn reset(&mut self) -> Option<Snapshot> {
        self.direction = FadeDirection::Settled;
        self.since = None;
        self.snapshot.take()
    }

    /// Style of the snapshot layer. `None` when there is no snapshot.
    pub fn snapshot_style(&self, now: Instant) -> Option<LayerStyle> {
        self.snapshot.as_ref()?;
        let p = self.progress(now);
        match self.direction {
            FadeDirection::Settled => None,
            FadeDirection::FadingOut => Some(LayerStyle::new(1.0, p)),
            FadeDirection::FadingIn => Some(LayerStyle::new((2.0 * (1.0 - p)).min(1.0), 1.0)),
        }
    }

    /// Style of the live primary and widget layers. `None` while fading out, when the live
    /// surfaces are not drawn at all.
    pub fn live_style(&self, now: Instant) -> Option<LayerStyle> {
        match self.direction {
            FadeDirection::Settled => Some(LayerStyle::OPAQUE),
            FadeDirection::FadingOut => None,
            FadeDirection::FadingIn => Some(LayerStyle::new((2.0 * self.progress(now)).min(1.0), 0.0)),
        }
    }
}

impl std::fmt::Debug for TransitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionController")
            .field("direction", &self.direction)
            .field("since", &self.since)
            .field("snapshot", &self.snapshot.as_ref().map(|s| s.surface.id()))
            .field("duration", &self.duration)
            .finish()
    }
}
