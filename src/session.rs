//! Per-agent mantling state machine.
//!
//! `Idle -> Starting -> Active -> {Completing, Interrupted} -> Idle`. The
//! session never touches animation or physics directly; everything goes
//! through the collaborators handed to [`MantlingSession::tick`].

use std::sync::Arc;

use glam::{Quat, Vec3};
use thiserror::Error;

use crate::blend::BlendOption;
use crate::classify::MantlingParameters;
use crate::collision::WorldQuery;
use crate::resolver::SettingsResolver;
use crate::settings::{GeneralMantlingSettings, MantlingTypeSettings, TimeRange, TimelineRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptCause {
    TargetDestroyed,
    TargetMoved,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Completing,
    Interrupted(InterruptCause),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum StartRejection {
    #[error("mantling is disabled")]
    Disabled,
    #[error("a mantling session is already running")]
    SessionActive,
}

/// How an interrupted session let go of the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fallback {
    BlendOut,
    Ragdoll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Interrupted { cause: InterruptCause, fallback: Fallback },
    /// The animation could not be started.
    Failed,
}

/// Root-motion retarget sent to the motion-warping collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct WarpRequest {
    pub window: TimeRange,
    pub target_location: Vec3,
    pub target_rotation: Quat,
    pub location_blend: BlendOption,
    pub rotation_blend: BlendOption,
}

pub trait AnimationPlayer {
    /// Start `timeline` at `start_time` seconds. Returns false if it could not play.
    fn play(&mut self, timeline: &TimelineRef, start_time: f32) -> bool;
    /// Stop, blending out over `blend_out` seconds (0 = immediately).
    fn stop(&mut self, blend_out: f32);
    fn is_playing(&self) -> bool;
    fn position(&self) -> f32;
}

pub trait MotionWarping {
    fn warp(&mut self, request: &WarpRequest);
}

pub trait Ragdoll {
    fn start_ragdolling(&mut self);
}

/// Everything a session drives during one tick.
pub struct Collaborators<'a> {
    pub animation: &'a mut dyn AnimationPlayer,
    pub warping: &'a mut dyn MotionWarping,
    pub ragdoll: &'a mut dyn Ragdoll,
}

/// Settings and parameters bound for the lifetime of one attempt.
struct Attempt {
    params: MantlingParameters,
    settings: Arc<MantlingTypeSettings>,
    blend_out_duration: f32,
    ragdoll_on_destruction: bool,
    move_tolerance: f32,
    start_time: f32,
    /// Primitive location when playback started.
    anchor: Option<Vec3>,
    /// Primitive location the last warp request was built from.
    warped_from: Option<Vec3>,
}

impl Attempt {
    fn warp_request(&self, offset: Vec3) -> WarpRequest {
        WarpRequest {
            window: self.settings.warp_window(self.start_time),
            target_location: self.params.target_location() + offset,
            target_rotation: self.params.target_rotation(),
            location_blend: self.settings.motion_warping_location_blend.clone(),
            rotation_blend: self.settings.motion_warping_rotation_blend.clone(),
        }
    }
}

pub struct MantlingSession {
    state: SessionState,
    attempt: Option<Attempt>,
    cancel_requested: bool,
    blend_out_remaining: f32,
}

impl Default for MantlingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MantlingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            attempt: None,
            cancel_requested: false,
            blend_out_remaining: 0.0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Parameters of the running attempt.
    pub fn parameters(&self) -> Option<&MantlingParameters> {
        self.attempt.as_ref().map(|a| &a.params)
    }

    /// Settings bound by the running attempt; unaffected by resolver reloads.
    pub fn bound_settings(&self) -> Option<&Arc<MantlingTypeSettings>> {
        self.attempt.as_ref().map(|a| &a.settings)
    }

    /// Begin an attempt. Rejected while mantling is disabled or another
    /// attempt is in any non-idle state.
    pub fn try_start(
        &mut self,
        params: MantlingParameters,
        resolver: &SettingsResolver,
        general: &GeneralMantlingSettings,
    ) -> Result<(), StartRejection> {
        if !general.allow_mantling {
            log::trace!("Mantling start rejected: disabled");
            return Err(StartRejection::Disabled);
        }
        if self.state != SessionState::Idle {
            log::trace!("Mantling start rejected: session is {:?}", self.state);
            return Err(StartRejection::SessionActive);
        }

        let general = general.clamped();
        let settings = resolver.resolve(params.mantling_type());
        self.attempt = Some(Attempt {
            params,
            settings,
            blend_out_duration: general.blend_out_duration,
            ragdoll_on_destruction: general.start_ragdolling_on_target_primitive_destruction,
            move_tolerance: general.target_move_tolerance,
            start_time: 0.0,
            anchor: None,
            warped_from: None,
        });
        self.cancel_requested = false;
        self.transition(SessionState::Starting);
        Ok(())
    }

    /// Ask the running attempt to stop. Observed on the next tick.
    pub fn request_cancel(&mut self) {
        if self.state != SessionState::Idle {
            self.cancel_requested = true;
        }
    }

    /// Advance the state machine by one simulation tick.
    pub fn tick<W: WorldQuery + ?Sized>(
        &mut self,
        dt: f32,
        world: &W,
        collaborators: &mut Collaborators<'_>,
    ) -> Option<SessionOutcome> {
        match self.state {
            SessionState::Idle => None,
            SessionState::Starting => self.tick_starting(world, collaborators),
            SessionState::Active => self.tick_active(world, collaborators),
            SessionState::Completing => Some(self.complete()),
            SessionState::Interrupted(cause) => {
                self.blend_out_remaining -= dt.max(0.0);
                if self.blend_out_remaining <= 0.0 {
                    Some(self.finish_interrupted(cause, Fallback::BlendOut))
                } else {
                    None
                }
            }
        }
    }

    fn tick_starting<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        collaborators: &mut Collaborators<'_>,
    ) -> Option<SessionOutcome> {
        let attempt = self.attempt.as_mut()?;
        if !world.is_alive(attempt.params.target_primitive()) {
            return self.interrupt(InterruptCause::TargetDestroyed, collaborators);
        }
        let start_time = attempt.settings.start_time(attempt.params.mantling_height());

        if !collaborators.animation.play(&attempt.settings.montage, start_time) {
            log::warn!(
                "Failed to play mantling timeline '{}' at {:.3}s",
                attempt.settings.montage.asset,
                start_time
            );
            self.attempt = None;
            self.transition(SessionState::Idle);
            return Some(SessionOutcome::Failed);
        }

        attempt.start_time = start_time;
        attempt.anchor = world.primitive_location(attempt.params.target_primitive());
        attempt.warped_from = attempt.anchor;
        collaborators.warping.warp(&attempt.warp_request(Vec3::ZERO));
        log::debug!(
            "Mantling {:?} started at {:.3}s, height {:.1}",
            attempt.params.mantling_type(),
            start_time,
            attempt.params.mantling_height()
        );

        self.transition(SessionState::Active);
        None
    }

    fn tick_active<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        collaborators: &mut Collaborators<'_>,
    ) -> Option<SessionOutcome> {
        let attempt = self.attempt.as_mut()?;
        let target = attempt.params.target_primitive();

        if !world.is_alive(target) {
            return self.interrupt(InterruptCause::TargetDestroyed, collaborators);
        }

        if let (Some(anchor), Some(location)) = (attempt.anchor, world.primitive_location(target)) {
            let offset = location - anchor;
            if offset.length() > attempt.move_tolerance {
                return self.interrupt(InterruptCause::TargetMoved, collaborators);
            }
            if attempt.warped_from != Some(location) {
                attempt.warped_from = Some(location);
                collaborators.warping.warp(&attempt.warp_request(offset));
            }
        }

        if self.cancel_requested {
            return self.interrupt(InterruptCause::Cancelled, collaborators);
        }

        if !collaborators.animation.is_playing() {
            self.transition(SessionState::Completing);
            return Some(self.complete());
        }
        None
    }

    fn interrupt(
        &mut self,
        cause: InterruptCause,
        collaborators: &mut Collaborators<'_>,
    ) -> Option<SessionOutcome> {
        self.transition(SessionState::Interrupted(cause));
        let attempt = self.attempt.as_ref()?;

        if cause == InterruptCause::TargetDestroyed && attempt.ragdoll_on_destruction {
            collaborators.ragdoll.start_ragdolling();
            collaborators.animation.stop(0.0);
            return Some(self.finish_interrupted(cause, Fallback::Ragdoll));
        }

        let blend_out = attempt.blend_out_duration;
        collaborators.animation.stop(blend_out);
        self.blend_out_remaining = blend_out;
        if blend_out <= 0.0 {
            return Some(self.finish_interrupted(cause, Fallback::BlendOut));
        }
        None
    }

    fn finish_interrupted(&mut self, cause: InterruptCause, fallback: Fallback) -> SessionOutcome {
        log::info!("Mantling interrupted ({cause:?}), fallback {fallback:?}");
        self.release();
        SessionOutcome::Interrupted { cause, fallback }
    }

    fn complete(&mut self) -> SessionOutcome {
        if let Some(attempt) = &self.attempt {
            log::info!("Mantling {:?} completed", attempt.params.mantling_type());
        }
        self.release();
        SessionOutcome::Completed
    }

    fn release(&mut self) {
        self.attempt = None;
        self.cancel_requested = false;
        self.blend_out_remaining = 0.0;
        self.transition(SessionState::Idle);
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            log::debug!("Mantling session {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }
}
