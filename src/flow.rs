//! Load orchestration for a viewing session.
//!
//! A session starts when the host asks to show a tire. Background, chassis
//! and tire loads then run independently and report back here. The
//! orchestrator owns all load state and turns results into
//! [`Notification`]s, which the viewer hands to the host through
//! [`ViewerEvents`]. Nothing else mutates this state.
//!
//! # Session lifecycle
//!
//! `Idle → Loading → WheelsResolved → LoadingTires → Ready`
//!
//! 1. [`Orchestrator::begin`] starts a session and bumps the generation.
//! 2. Background and chassis load in parallel (`Loading`).
//! 3. Once the chassis is in, its wheel mounts are known (`WheelsResolved`);
//!    if the tire is still on its way the session waits in `LoadingTires`.
//! 4. `Ready` is entered as soon as background and chassis are settled,
//!    or when the timeout expires, whichever comes first. Tires keep
//!    arriving after that and improve the scene progressively.
//!
//! Loads cannot be aborted once issued. Every result carries the generation
//! it was started under and is dropped if a newer session has begun since.

use instant::{Duration, Instant};

use crate::error::AssetError;

#[derive(Clone, Debug, PartialEq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    /// No model exists for the request. Shown as a placeholder, not an error.
    Missing,
    Failed(AssetError),
}

impl LoadState {
    /// Whether the load has finished one way or another.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Loaded | Self::Missing | Self::Failed(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loading,
    WheelsResolved,
    LoadingTires,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Background,
    Chassis,
    Tires,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    BackgroundLoaded,
    ChassisLoaded,
    TiresLoaded,
    TiresMissing,
    Ready,
    Error(AssetError),
}

/// Lifecycle callbacks for the host UI.
///
/// Every method has an empty default so hosts only implement what they
/// display. Callbacks are invoked from the viewer's update path, never from
/// inside a load.
pub trait ViewerEvents {
    fn on_background_load(&mut self) {}

    fn on_chassis_load(&mut self) {}

    /// The fitted tires are in the scene.
    fn on_tires_load(&mut self) {}

    /// No 3D model exists for the requested tire.
    fn on_tires_missing(&mut self) {}

    /// Interaction may begin.
    fn on_ready(&mut self) {}

    fn on_error(&mut self, _error: &AssetError) {}
}

pub fn dispatch(notifications: Vec<Notification>, events: &mut dyn ViewerEvents) {
    for notification in notifications {
        match notification {
            Notification::BackgroundLoaded => events.on_background_load(),
            Notification::ChassisLoaded => events.on_chassis_load(),
            Notification::TiresLoaded => events.on_tires_load(),
            Notification::TiresMissing => events.on_tires_missing(),
            Notification::Ready => events.on_ready(),
            Notification::Error(error) => events.on_error(&error),
        }
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    generation: u64,
    stage: Stage,
    background: LoadState,
    chassis: LoadState,
    tires: LoadState,
    ready: bool,
    started_at: Option<Instant>,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            generation: 0,
            stage: Stage::Idle,
            background: LoadState::Unloaded,
            chassis: LoadState::Unloaded,
            tires: LoadState::Unloaded,
            ready: false,
            started_at: None,
            timeout,
        }
    }

    /// Starts a new session and returns its generation. Results of earlier
    /// sessions are ignored from now on.
    pub fn begin(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.stage = Stage::Loading;
        self.background = LoadState::Loading;
        self.chassis = LoadState::Loading;
        self.tires = LoadState::Loading;
        self.ready = false;
        self.started_at = Some(now);
        log::debug!("session {} started", self.generation);
        self.generation
    }

    /// Back to `Idle`. Bumps the generation so loads still in flight are
    /// discarded when they land.
    pub fn reset(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::new(self.timeout)
        };
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.stage != Stage::Idle && generation == self.generation
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn state(&self, slot: Slot) -> &LoadState {
        match slot {
            Slot::Background => &self.background,
            Slot::Chassis => &self.chassis,
            Slot::Tires => &self.tires,
        }
    }

    /// Every load of the current session has settled.
    pub fn is_settled(&self) -> bool {
        self.background.is_settled() && self.chassis.is_settled() && self.tires.is_settled()
    }

    /// Time left before the session is forced ready.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        if self.ready {
            return None;
        }
        let started_at = self.started_at?;
        Some(self.timeout.saturating_sub(now.duration_since(started_at)))
    }

    /// Records the outcome of a load.
    pub fn settle(&mut self, generation: u64, slot: Slot, state: LoadState) -> Vec<Notification> {
        if !self.is_current(generation) {
            log::warn!(
                "discarding {slot:?} result of session {generation}, current is {}",
                self.generation
            );
            return Vec::new();
        }

        let mut out = Vec::new();
        match (&state, slot) {
            (LoadState::Loaded, Slot::Background) => out.push(Notification::BackgroundLoaded),
            (LoadState::Loaded, Slot::Chassis) => out.push(Notification::ChassisLoaded),
            (LoadState::Loaded, Slot::Tires) => out.push(Notification::TiresLoaded),
            (LoadState::Missing, Slot::Tires) => out.push(Notification::TiresMissing),
            (LoadState::Failed(error), _) => {
                log::error!("{slot:?} failed to load: {error}");
                out.push(Notification::Error(error.clone()));
            }
            _ => {}
        }
        match slot {
            Slot::Background => self.background = state,
            Slot::Chassis => self.chassis = state,
            Slot::Tires => self.tires = state,
        }

        if slot == Slot::Chassis && self.chassis == LoadState::Loaded && !self.ready {
            self.stage = if self.tires.is_settled() {
                Stage::WheelsResolved
            } else {
                Stage::LoadingTires
            };
        }
        if !self.ready && self.background.is_settled() && self.chassis.is_settled() {
            self.mark_ready(&mut out);
        }
        out
    }

    /// Forces readiness once the timeout has elapsed.
    pub fn tick(&mut self, now: Instant) -> Vec<Notification> {
        match self.remaining(now) {
            Some(left) if left.is_zero() => self.expire(),
            _ => Vec::new(),
        }
    }

    /// Forces readiness regardless of outstanding loads.
    pub fn expire(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        if !self.ready && self.stage != Stage::Idle {
            log::warn!(
                "session {} timed out (background {:?}, chassis {:?}, tires {:?})",
                self.generation,
                self.background,
                self.chassis,
                self.tires
            );
            self.mark_ready(&mut out);
        }
        out
    }

    fn mark_ready(&mut self, out: &mut Vec<Notification>) {
        self.ready = true;
        self.stage = Stage::Ready;
        log::info!("session {} ready", self.generation);
        out.push(Notification::Ready);
    }
}
