//! Ledge detection, mantling classification and per-agent mantling sessions.
//!
//! Pipeline: [`LedgeDetector`] finds a ledge in front of an agent,
//! [`classify`] turns it into [`MantlingParameters`], [`SettingsResolver`]
//! picks the animation settings for its type and [`MantlingSession`] drives
//! the attempt through the host's animation, warping and ragdoll systems.

pub mod blend;
pub mod channel;
pub mod classify;
pub mod collision;
pub mod config;
pub mod debug;
pub mod detection;
pub mod error;
pub mod map;
pub mod resolver;
pub mod session;
pub mod settings;

pub use blend::{BlendOption, FloatCurve};
pub use channel::{CollisionChannel, CollisionProfile, TraceFilter, TraceResponses};
pub use classify::{MantlingParameters, MantlingType, classify};
pub use collision::{PhysicsWorld, PrimitiveHandle, TraceHit, WorldQuery};
pub use debug::{DebugDraw, NoDebugDraw, TraceLog};
pub use detection::{AgentPose, LedgeDetector, LedgeHit, LedgeRejection};
pub use error::{ConfigError, MapError};
pub use resolver::SettingsResolver;
pub use session::{
    AnimationPlayer, Collaborators, Fallback, InterruptCause, MantlingSession, MotionWarping,
    Ragdoll, SessionOutcome, SessionState, StartRejection, WarpRequest,
};
pub use settings::{
    GeneralMantlingSettings, MantlingConfig, MantlingTraceSettings, MantlingTypeSettings,
    SlopeAngle, TimeRange, TimelineRef,
};
