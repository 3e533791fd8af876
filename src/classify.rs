use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::PrimitiveHandle;
use crate::config::LOCATION_QUANTIZE;
use crate::detection::LedgeHit;
use crate::settings::GeneralMantlingSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MantlingType {
    High,
    Low,
    InAir,
}

impl MantlingType {
    pub const ALL: [MantlingType; 3] = [MantlingType::High, MantlingType::Low, MantlingType::InAir];

    pub(crate) fn index(self) -> usize {
        match self {
            MantlingType::High => 0,
            MantlingType::Low => 1,
            MantlingType::InAir => 2,
        }
    }
}

/// One classified mantling attempt. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MantlingParameters {
    target_primitive: PrimitiveHandle,
    target_location: Vec3,
    target_rotation: Quat,
    start_location: Vec3,
    mantling_height: f32,
    mantling_type: MantlingType,
}

impl MantlingParameters {
    pub fn new(
        target_primitive: PrimitiveHandle,
        target_location: Vec3,
        target_rotation: Quat,
        start_location: Vec3,
        mantling_height: f32,
        mantling_type: MantlingType,
    ) -> Self {
        Self {
            target_primitive,
            target_location: quantize(target_location),
            target_rotation,
            start_location,
            mantling_height: mantling_height.max(0.0),
            mantling_type,
        }
    }

    /// Weak reference; check it against the world before use.
    pub fn target_primitive(&self) -> PrimitiveHandle {
        self.target_primitive
    }

    pub fn target_location(&self) -> Vec3 {
        self.target_location
    }

    pub fn target_rotation(&self) -> Quat {
        self.target_rotation
    }

    /// Where the agent's root sits when the animation starts.
    pub fn start_location(&self) -> Vec3 {
        self.start_location
    }

    pub fn mantling_height(&self) -> f32 {
        self.mantling_height
    }

    pub fn mantling_type(&self) -> MantlingType {
        self.mantling_type
    }
}

/// Turn a detected ledge into mantling parameters.
///
/// Airborne agents always get `InAir`; grounded agents get `High` at or
/// above the high threshold and `Low` below it.
pub fn classify(
    hit: &LedgeHit,
    is_airborne: bool,
    settings: &GeneralMantlingSettings,
) -> MantlingParameters {
    let height = hit.ledge_height.max(0.0);
    let mantling_type = if is_airborne {
        MantlingType::InAir
    } else if height >= settings.mantling_high_height_threshold.max(0.0) {
        MantlingType::High
    } else {
        MantlingType::Low
    };

    let trace = settings.trace_settings(is_airborne);
    let start_location = hit.target_location
        - hit.target_direction * trace.start_location_offset.max(0.0)
        - Vec3::new(0.0, height, 0.0);

    MantlingParameters::new(
        hit.target_primitive,
        hit.target_location,
        hit.target_rotation,
        start_location,
        height,
        mantling_type,
    )
}

fn quantize(v: Vec3) -> Vec3 {
    (v * LOCATION_QUANTIZE).round() / LOCATION_QUANTIZE
}
