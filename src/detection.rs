//! Ledge detection.
//!
//! A forward fan of rays finds a wall within reach, a downward ray finds the
//! walkable surface on top of it and a final upward ray checks there is room
//! to stand. Detection borrows the world and settings immutably and keeps no
//! state between calls.

use glam::{Quat, Vec3};

use crate::collision::{PrimitiveHandle, TraceHit, WorldQuery};
use crate::config::{CLEARANCE_LIFT, DOWNWARD_PROBE_LIFT, FORWARD_PROBE_SPACING, MIN_TRACE_SPEED};
use crate::debug::{DebugDraw, NoDebugDraw, TraceKind, TraceRecord};
use crate::settings::{GeneralMantlingSettings, MantlingTraceSettings};

/// Where the agent is and which way it faces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentPose {
    /// Bottom of the agent's capsule.
    pub location: Vec3,
    /// Facing direction; only the horizontal part is used.
    pub forward: Vec3,
    pub capsule_radius: f32,
    pub capsule_height: f32,
}

impl AgentPose {
    pub fn new(location: Vec3, forward: Vec3, capsule_radius: f32, capsule_height: f32) -> Self {
        Self {
            location,
            forward,
            capsule_radius,
            capsule_height,
        }
    }
}

/// A mantleable ledge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LedgeHit {
    /// Point on the ledge surface the agent ends up standing on.
    pub target_location: Vec3,
    /// Horizontal direction into the ledge.
    pub target_direction: Vec3,
    pub target_rotation: Quat,
    /// Ledge surface height above the agent's base.
    pub ledge_height: f32,
    pub target_primitive: PrimitiveHandle,
}

/// Why no ledge was found. Diagnostic only; callers of [`LedgeDetector::detect`]
/// just see `None`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LedgeRejection {
    /// Agent has no horizontal facing.
    NoDirection,
    /// Moving too far away from where the agent faces.
    TraceAngle { degrees: f32 },
    NoWall,
    /// Approaching the wall at too shallow an angle.
    ReachAngle { degrees: f32 },
    TargetTooFast { speed: f32 },
    TargetGone,
    NoLedge,
    TooSteep { normal_y: f32 },
    OutOfBand { height: f32 },
    /// No headroom on top of the ledge.
    Blocked,
}

pub struct LedgeDetector<'a, W: WorldQuery + ?Sized> {
    world: &'a W,
    settings: GeneralMantlingSettings,
}

impl<'a, W: WorldQuery + ?Sized> LedgeDetector<'a, W> {
    /// Settings are clamped on the way in, whatever their source.
    pub fn new(world: &'a W, settings: &GeneralMantlingSettings) -> Self {
        Self {
            world,
            settings: settings.clamped(),
        }
    }

    pub fn settings(&self) -> &GeneralMantlingSettings {
        &self.settings
    }

    pub fn detect(&self, pose: &AgentPose, velocity: Vec3, is_airborne: bool) -> Option<LedgeHit> {
        self.detect_with_debug(pose, velocity, is_airborne, &mut NoDebugDraw)
    }

    pub fn detect_with_debug(
        &self,
        pose: &AgentPose,
        velocity: Vec3,
        is_airborne: bool,
        debug: &mut dyn DebugDraw,
    ) -> Option<LedgeHit> {
        match self.probe(pose, velocity, is_airborne, debug) {
            Ok(hit) => Some(hit),
            Err(reason) => {
                log::trace!("No ledge (airborne: {}): {:?}", is_airborne, reason);
                None
            }
        }
    }

    /// Full detection with the reason for a negative result.
    pub fn probe(
        &self,
        pose: &AgentPose,
        velocity: Vec3,
        is_airborne: bool,
        debug: &mut dyn DebugDraw,
    ) -> Result<LedgeHit, LedgeRejection> {
        let trace = self.settings.trace_settings(is_airborne);
        let mut probe = Probe {
            world: self.world,
            settings: &self.settings,
            trace,
            debug,
        };

        let forward = horizontal(pose.forward).ok_or(LedgeRejection::NoDirection)?;
        let trace_dir = horizontal(velocity)
            .filter(|_| horizontal_speed(velocity) > MIN_TRACE_SPEED)
            .unwrap_or(forward);

        let trace_angle = angle_degrees(forward, trace_dir);
        if trace_angle > self.settings.trace_angle_threshold {
            return Err(LedgeRejection::TraceAngle {
                degrees: trace_angle,
            });
        }

        let (band_min, band_max) = trace.height_band();
        let base = pose.location;

        let wall = probe
            .forward(base, trace_dir, pose.capsule_radius + trace.reach_distance)
            .ok_or(LedgeRejection::NoWall)?;
        let target_direction = horizontal(-wall.normal).ok_or(LedgeRejection::NoWall)?;

        let reach_angle = angle_degrees(trace_dir, target_direction);
        if reach_angle > self.settings.max_reach_angle {
            return Err(LedgeRejection::ReachAngle {
                degrees: reach_angle,
            });
        }

        let probe_point = wall.point + target_direction * trace.target_location_offset;
        let top = base.y + band_max + DOWNWARD_PROBE_LIFT;
        let bottom = base.y + band_min;
        let surface = probe
            .downward(Vec3::new(probe_point.x, top, probe_point.z), top - bottom)
            .ok_or(LedgeRejection::NoLedge)?;

        // the surface the agent lands on is the target, not the wall below it
        let speed = self
            .world
            .primitive_velocity(surface.primitive)
            .ok_or(LedgeRejection::TargetGone)?
            .length();
        if speed > self.settings.target_primitive_speed_threshold {
            return Err(LedgeRejection::TargetTooFast { speed });
        }

        if surface.normal.y < self.settings.slope_angle_threshold.cos() {
            return Err(LedgeRejection::TooSteep {
                normal_y: surface.normal.y,
            });
        }

        let ledge_height = surface.point.y - base.y;
        if ledge_height < band_min || ledge_height > band_max {
            return Err(LedgeRejection::OutOfBand {
                height: ledge_height,
            });
        }

        if probe.clearance(surface.point, pose.capsule_height) {
            return Err(LedgeRejection::Blocked);
        }

        Ok(LedgeHit {
            target_location: surface.point,
            target_direction,
            target_rotation: Quat::from_rotation_arc(Vec3::NEG_Z, target_direction),
            ledge_height,
            target_primitive: surface.primitive,
        })
    }
}

/// The rays of one detection pass.
struct Probe<'p, W: WorldQuery + ?Sized> {
    world: &'p W,
    settings: &'p GeneralMantlingSettings,
    trace: &'p MantlingTraceSettings,
    debug: &'p mut dyn DebugDraw,
}

impl<W: WorldQuery + ?Sized> Probe<'_, W> {
    fn cast(&mut self, kind: TraceKind, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<TraceHit> {
        let hit = self
            .world
            .cast_ray(origin, dir, max_dist, &self.settings.trace_filter());
        if self.trace.draw_failed_traces {
            self.debug.trace(TraceRecord {
                kind,
                start: origin,
                end: origin + dir * max_dist,
                hit: hit.map(|h| h.point),
            });
        }
        hit
    }

    /// Fan of horizontal rays across the height band; nearest hit wins.
    fn forward(&mut self, base: Vec3, dir: Vec3, reach: f32) -> Option<TraceHit> {
        let (band_min, band_max) = self.trace.height_band();
        let steps = ((band_max - band_min) / FORWARD_PROBE_SPACING).ceil().max(0.0) as u32;

        let mut nearest: Option<TraceHit> = None;
        for i in 0..=steps {
            let height = (band_min + i as f32 * FORWARD_PROBE_SPACING).min(band_max);
            let origin = base + Vec3::new(0.0, height, 0.0);
            if let Some(hit) = self.cast(TraceKind::Forward, origin, dir, reach)
                && nearest.is_none_or(|n| hit.distance < n.distance)
            {
                nearest = Some(hit);
            }
        }
        nearest
    }

    fn downward(&mut self, origin: Vec3, length: f32) -> Option<TraceHit> {
        self.cast(TraceKind::Downward, origin, Vec3::NEG_Y, length)
    }

    /// True when something blocks the space above the ledge.
    fn clearance(&mut self, surface: Vec3, height: f32) -> bool {
        let origin = surface + Vec3::new(0.0, CLEARANCE_LIFT, 0.0);
        let length = (height - CLEARANCE_LIFT).max(0.0);
        length > 0.0 && self.cast(TraceKind::Clearance, origin, Vec3::Y, length).is_some()
    }
}

fn horizontal(v: Vec3) -> Option<Vec3> {
    let flat = Vec3::new(v.x, 0.0, v.z);
    (flat.length_squared() > 1e-8).then(|| flat.normalize())
}

fn horizontal_speed(v: Vec3) -> f32 {
    Vec3::new(v.x, 0.0, v.z).length()
}

fn angle_degrees(a: Vec3, b: Vec3) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}
