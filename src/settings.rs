//! Mantling configuration.
//!
//! Plain data loaded once from JSON and read by every stage of the pipeline.
//! Values are validated and clamped at load time; consumers clamp again when
//! they read (see [`GeneralMantlingSettings::clamped`]) so externally authored
//! data can never push a stage outside its declared ranges.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::blend::BlendOption;
use crate::channel::{CollisionChannel, TraceFilter, TraceResponses};
use crate::classify::MantlingType;
use crate::config::DEFAULT_TARGET_MOVE_TOLERANCE;
use crate::error::ConfigError;

/// Slope limit in degrees together with its cached cosine.
///
/// The cosine is derived on every construction (including deserialization),
/// so the two values cannot drift apart.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct SlopeAngle {
    degrees: f32,
    cos: f32,
}

impl SlopeAngle {
    pub const DEFAULT_DEGREES: f32 = 35.0;

    /// Non-finite input falls back to the default; the rest is clamped to `[0, 90]`.
    pub fn from_degrees(degrees: f32) -> Self {
        let degrees = if degrees.is_finite() {
            degrees.clamp(0.0, 90.0)
        } else {
            Self::DEFAULT_DEGREES
        };
        Self {
            degrees,
            cos: degrees.to_radians().cos(),
        }
    }

    pub fn degrees(&self) -> f32 {
        self.degrees
    }

    pub fn cos(&self) -> f32 {
        self.cos
    }
}

impl Default for SlopeAngle {
    fn default() -> Self {
        Self::from_degrees(Self::DEFAULT_DEGREES)
    }
}

impl From<f32> for SlopeAngle {
    fn from(degrees: f32) -> Self {
        Self::from_degrees(degrees)
    }
}

impl From<SlopeAngle> for f32 {
    fn from(angle: SlopeAngle) -> Self {
        angle.degrees
    }
}

/// One trace profile (grounded or in-air).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MantlingTraceSettings {
    /// Accepted ledge heights above the agent's base, `[min, max]` in cm.
    pub ledge_height: Vec2,
    pub reach_distance: f32,
    /// How far past the wall the downward probe looks for the ledge surface.
    pub target_location_offset: f32,
    /// How far back from the target the mantling animation starts.
    pub start_location_offset: f32,
    pub draw_failed_traces: bool,
}

impl MantlingTraceSettings {
    pub fn grounded() -> Self {
        Self {
            ledge_height: Vec2::new(50.0, 225.0),
            reach_distance: 75.0,
            target_location_offset: 15.0,
            start_location_offset: 55.0,
            draw_failed_traces: false,
        }
    }

    pub fn in_air() -> Self {
        Self {
            ledge_height: Vec2::new(50.0, 150.0),
            reach_distance: 70.0,
            ..Self::grounded()
        }
    }

    /// Height band as `(min, max)`, non-negative and ordered.
    pub fn height_band(&self) -> (f32, f32) {
        let a = self.ledge_height.x.max(0.0);
        let b = self.ledge_height.y.max(0.0);
        (a.min(b), a.max(b))
    }

    pub fn clamped(&self) -> Self {
        let (min, max) = self.height_band();
        Self {
            ledge_height: Vec2::new(min, max),
            reach_distance: self.reach_distance.max(0.0),
            target_location_offset: self.target_location_offset.max(0.0),
            start_location_offset: self.start_location_offset.max(0.0),
            draw_failed_traces: self.draw_failed_traces,
        }
    }

    fn validate(&self, profile: &'static str) -> Result<(), ConfigError> {
        check_finite("ledge_height", self.ledge_height.x)?;
        check_finite("ledge_height", self.ledge_height.y)?;
        check_finite("reach_distance", self.reach_distance)?;
        check_finite("target_location_offset", self.target_location_offset)?;
        check_finite("start_location_offset", self.start_location_offset)?;
        if self.ledge_height.x > self.ledge_height.y {
            return Err(ConfigError::InvalidHeightBand {
                profile,
                min: self.ledge_height.x,
                max: self.ledge_height.y,
            });
        }
        Ok(())
    }
}

impl Default for MantlingTraceSettings {
    fn default() -> Self {
        Self::grounded()
    }
}

/// Process-wide mantling settings shared by detection, classification and
/// the session controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralMantlingSettings {
    pub allow_mantling: bool,
    /// Max angle between facing and trace direction, degrees in `[0, 180]`.
    pub trace_angle_threshold: f32,
    /// Max angle between trace direction and the wall, degrees in `[0, 180]`.
    pub max_reach_angle: f32,
    /// Surfaces steeper than this cannot be mantled onto.
    pub slope_angle_threshold: SlopeAngle,
    /// Moving targets faster than this (cm/s) are rejected.
    pub target_primitive_speed_threshold: f32,
    pub mantling_high_height_threshold: f32,
    pub grounded_trace: MantlingTraceSettings,
    pub in_air_trace: MantlingTraceSettings,
    pub mantling_trace_channel: CollisionChannel,
    pub mantling_trace_responses: TraceResponses,
    /// Used when a session is interrupted and the animation has to stop.
    pub blend_out_duration: f32,
    pub start_ragdolling_on_target_primitive_destruction: bool,
    /// Target movement (cm) an active session tolerates before it is interrupted.
    pub target_move_tolerance: f32,
}

impl Default for GeneralMantlingSettings {
    fn default() -> Self {
        Self {
            allow_mantling: true,
            trace_angle_threshold: 110.0,
            max_reach_angle: 50.0,
            slope_angle_threshold: SlopeAngle::default(),
            target_primitive_speed_threshold: 10.0,
            mantling_high_height_threshold: 125.0,
            grounded_trace: MantlingTraceSettings::grounded(),
            in_air_trace: MantlingTraceSettings::in_air(),
            mantling_trace_channel: CollisionChannel::Visibility,
            mantling_trace_responses: TraceResponses::default(),
            blend_out_duration: 0.3,
            start_ragdolling_on_target_primitive_destruction: true,
            target_move_tolerance: DEFAULT_TARGET_MOVE_TOLERANCE,
        }
    }
}

impl GeneralMantlingSettings {
    /// The airborne flag alone picks the profile.
    pub fn trace_settings(&self, is_airborne: bool) -> &MantlingTraceSettings {
        if is_airborne {
            &self.in_air_trace
        } else {
            &self.grounded_trace
        }
    }

    pub fn trace_filter(&self) -> TraceFilter {
        TraceFilter::new(
            self.mantling_trace_channel,
            self.mantling_trace_responses.mask(),
        )
    }

    pub fn set_slope_angle_threshold(&mut self, degrees: f32) {
        self.slope_angle_threshold = SlopeAngle::from_degrees(degrees);
    }

    /// Copy with every value forced into its declared range.
    pub fn clamped(&self) -> Self {
        Self {
            allow_mantling: self.allow_mantling,
            trace_angle_threshold: clamp_or(self.trace_angle_threshold, 0.0, 180.0, 110.0),
            max_reach_angle: clamp_or(self.max_reach_angle, 0.0, 180.0, 50.0),
            slope_angle_threshold: SlopeAngle::from_degrees(self.slope_angle_threshold.degrees()),
            target_primitive_speed_threshold: self.target_primitive_speed_threshold.max(0.0),
            mantling_high_height_threshold: self.mantling_high_height_threshold.max(0.0),
            grounded_trace: self.grounded_trace.clamped(),
            in_air_trace: self.in_air_trace.clamped(),
            mantling_trace_channel: self.mantling_trace_channel,
            mantling_trace_responses: self.mantling_trace_responses.clone(),
            blend_out_duration: self.blend_out_duration.max(0.0),
            start_ragdolling_on_target_primitive_destruction: self
                .start_ragdolling_on_target_primitive_destruction,
            target_move_tolerance: self.target_move_tolerance.max(0.0),
        }
    }

    /// Hard errors only: non-finite numbers and inverted height bands.
    /// Out-of-range values are not errors, they get clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("trace_angle_threshold", self.trace_angle_threshold)?;
        check_finite("max_reach_angle", self.max_reach_angle)?;
        check_finite(
            "target_primitive_speed_threshold",
            self.target_primitive_speed_threshold,
        )?;
        check_finite(
            "mantling_high_height_threshold",
            self.mantling_high_height_threshold,
        )?;
        check_finite("blend_out_duration", self.blend_out_duration)?;
        check_finite("target_move_tolerance", self.target_move_tolerance)?;
        self.grounded_trace.validate("grounded")?;
        self.in_air_trace.validate("in-air")?;
        Ok(())
    }
}

/// Opaque reference to an animation timeline owned by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineRef {
    pub asset: String,
    /// Total play length in seconds, if the host knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_length: Option<f32>,
}

impl TimelineRef {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            play_length: None,
        }
    }

    pub fn with_play_length(mut self, seconds: f32) -> Self {
        self.play_length = Some(seconds);
        self
    }
}

/// Closed time interval on an animation timeline, seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub min: f32,
    pub max: f32,
}

impl TimeRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Non-negative and ordered.
    pub fn clamped(&self) -> Self {
        let min = self.min.max(0.0);
        Self {
            min,
            max: self.max.max(min),
        }
    }

    pub fn duration(&self) -> f32 {
        (self.max - self.min).max(0.0)
    }

    pub fn contains(&self, time: f32) -> bool {
        time >= self.min && time <= self.max
    }
}

/// Animation settings for one mantling type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MantlingTypeSettings {
    pub montage: TimelineRef,
    /// Derive the start time from the mantling height instead of a fixed value.
    #[serde(default)]
    pub auto_calculate_start_time: bool,
    #[serde(default = "default_start_time_reference_height")]
    pub start_time_reference_height: Vec2,
    #[serde(default = "default_start_time")]
    pub start_time: Vec2,
    #[serde(default = "default_motion_warping_time_range")]
    pub motion_warping_time_range: TimeRange,
    #[serde(default)]
    pub motion_warping_location_blend: BlendOption,
    #[serde(default = "default_rotation_blend")]
    pub motion_warping_rotation_blend: BlendOption,
}

fn default_start_time_reference_height() -> Vec2 {
    Vec2::new(50.0, 100.0)
}

fn default_start_time() -> Vec2 {
    Vec2::new(0.5, 0.0)
}

fn default_motion_warping_time_range() -> TimeRange {
    TimeRange::new(0.0, 0.3)
}

fn default_rotation_blend() -> BlendOption {
    BlendOption::HermiteCubic
}

impl MantlingTypeSettings {
    pub fn new(montage: TimelineRef) -> Self {
        Self {
            montage,
            auto_calculate_start_time: false,
            start_time_reference_height: default_start_time_reference_height(),
            start_time: default_start_time(),
            motion_warping_time_range: default_motion_warping_time_range(),
            motion_warping_location_blend: BlendOption::Linear,
            motion_warping_rotation_blend: default_rotation_blend(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_finite("start_time_reference_height", self.start_time_reference_height.x)?;
        check_finite("start_time_reference_height", self.start_time_reference_height.y)?;
        check_finite("start_time", self.start_time.x)?;
        check_finite("start_time", self.start_time.y)?;
        check_finite("motion_warping_time_range", self.motion_warping_time_range.min)?;
        check_finite("motion_warping_time_range", self.motion_warping_time_range.max)?;
        Ok(())
    }
}

/// A named bundle of general settings plus one record per mantling type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MantlingConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub general: GeneralMantlingSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<MantlingTypeSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<MantlingTypeSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_air: Option<MantlingTypeSettings>,
}

impl MantlingConfig {
    /// Default general settings with one montage per type.
    pub fn standard() -> Self {
        let mut in_air = MantlingTypeSettings::new(
            TimelineRef::new("mantle_in_air").with_play_length(1.0),
        );
        in_air.auto_calculate_start_time = true;

        Self {
            name: "standard".to_string(),
            general: GeneralMantlingSettings::default(),
            high: Some(MantlingTypeSettings::new(
                TimelineRef::new("mantle_high").with_play_length(1.4),
            )),
            low: Some(MantlingTypeSettings::new(
                TimelineRef::new("mantle_low").with_play_length(1.0),
            )),
            in_air: Some(in_air),
        }
    }

    pub fn type_settings(&self, mantling_type: MantlingType) -> Option<&MantlingTypeSettings> {
        match mantling_type {
            MantlingType::High => self.high.as_ref(),
            MantlingType::Low => self.low.as_ref(),
            MantlingType::InAir => self.in_air.as_ref(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MantlingConfig = serde_json::from_str(json)?;
        config.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded mantling config '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// Reject broken data, require every type, then clamp what is merely out of range.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.general.validate()?;
        for mantling_type in MantlingType::ALL {
            self.type_settings(mantling_type)
                .ok_or(ConfigError::MissingTypeSettings(mantling_type))?
                .validate()?;
        }

        let clamped = self.general.clamped();
        if clamped != self.general {
            log::warn!(
                "Mantling config '{}' had out-of-range general settings, clamped",
                self.name
            );
            self.general = clamped;
        }
        Ok(self)
    }
}

fn check_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field })
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_slope_cos_matches_threshold() {
        let settings = GeneralMantlingSettings::default();
        let expected = 35.0_f32.to_radians().cos();
        assert_eq!(settings.slope_angle_threshold.cos(), expected);
    }

    #[test]
    fn setting_slope_threshold_recomputes_cos() {
        let mut settings = GeneralMantlingSettings::default();
        settings.set_slope_angle_threshold(60.0);
        assert!((settings.slope_angle_threshold.cos() - 0.5).abs() < 1e-6);
        settings.set_slope_angle_threshold(200.0);
        assert_eq!(settings.slope_angle_threshold.degrees(), 90.0);
    }

    #[test]
    fn deserialized_slope_threshold_carries_cos() {
        let settings: GeneralMantlingSettings =
            serde_json::from_str(r#"{"slope_angle_threshold": 45.0}"#).unwrap();
        let expected = 45.0_f32.to_radians().cos();
        assert_eq!(settings.slope_angle_threshold.cos(), expected);
    }

    #[test]
    fn in_air_profile_defaults() {
        let settings = GeneralMantlingSettings::default();
        assert_eq!(settings.in_air_trace.ledge_height, Vec2::new(50.0, 150.0));
        assert_eq!(settings.in_air_trace.reach_distance, 70.0);
        assert_eq!(settings.grounded_trace.ledge_height, Vec2::new(50.0, 225.0));
        assert!(std::ptr::eq(
            settings.trace_settings(true),
            &settings.in_air_trace
        ));
    }

    #[test]
    fn clamped_forces_ranges() {
        let settings = GeneralMantlingSettings {
            trace_angle_threshold: 400.0,
            max_reach_angle: -5.0,
            blend_out_duration: -1.0,
            grounded_trace: MantlingTraceSettings {
                ledge_height: Vec2::new(-10.0, 100.0),
                reach_distance: -3.0,
                ..MantlingTraceSettings::grounded()
            },
            ..GeneralMantlingSettings::default()
        }
        .clamped();

        assert_eq!(settings.trace_angle_threshold, 180.0);
        assert_eq!(settings.max_reach_angle, 0.0);
        assert_eq!(settings.blend_out_duration, 0.0);
        assert_eq!(settings.grounded_trace.ledge_height, Vec2::new(0.0, 100.0));
        assert_eq!(settings.grounded_trace.reach_distance, 0.0);
    }

    #[test]
    fn inverted_band_is_a_load_error() {
        let json = r#"{
            "general": { "grounded_trace": { "ledge_height": [200.0, 100.0] } },
            "high": { "montage": { "asset": "h" } },
            "low": { "montage": { "asset": "l" } },
            "in_air": { "montage": { "asset": "a" } }
        }"#;
        let err = MantlingConfig::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidHeightBand {
                profile: "grounded",
                ..
            }
        ));
    }

    #[test]
    fn missing_type_is_a_load_error() {
        let json = r#"{
            "high": { "montage": { "asset": "h" } },
            "in_air": { "montage": { "asset": "a" } }
        }"#;
        let err = MantlingConfig::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingTypeSettings(MantlingType::Low)
        ));
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() {
        let json = r#"{
            "general": { "max_reach_angle": 720.0, "mantling_trace_responses": ["pawn"] },
            "high": { "montage": { "asset": "h" } },
            "low": { "montage": { "asset": "l" } },
            "in_air": { "montage": { "asset": "a" } }
        }"#;
        let config = MantlingConfig::from_json(json).unwrap();
        assert_eq!(config.general.max_reach_angle, 180.0);
        assert!(
            config
                .general
                .trace_filter()
                .responses
                .contains(CollisionChannel::Pawn)
        );
    }

    #[test]
    fn type_settings_fill_defaults() {
        let json = r#"{ "montage": { "asset": "mantle_low", "play_length": 1.1 } }"#;
        let settings: MantlingTypeSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.start_time, Vec2::new(0.5, 0.0));
        assert_eq!(settings.motion_warping_time_range, TimeRange::new(0.0, 0.3));
        assert_eq!(settings.motion_warping_rotation_blend, BlendOption::HermiteCubic);
        assert_eq!(settings.montage.play_length, Some(1.1));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mantling.json");
        let json = serde_json::to_string_pretty(&MantlingConfig::standard()).unwrap();
        fs::write(&path, json).unwrap();

        let config = MantlingConfig::load(&path).unwrap();
        assert_eq!(config, MantlingConfig::standard());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MantlingConfig::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    proptest! {
        #[test]
        fn slopes_under_threshold_pass_cos_check(threshold in 0.0f32..=90.0, frac in 0.0f32..=1.0) {
            let slope = SlopeAngle::from_degrees(threshold);
            let theta = slope.degrees() * frac;
            prop_assert!(theta.to_radians().cos() >= slope.cos() - 1e-6);
        }
    }
}
