//! Mantling type -> animation settings lookup.
//!
//! Every type is registered when the resolver is built, so `resolve` cannot
//! fail at runtime. Records are handed out as `Arc`s: a reload swaps the
//! records for future attempts while sessions already running keep the
//! settings they bound.

use std::collections::HashMap;
use std::sync::Arc;

use crate::classify::MantlingType;
use crate::error::ConfigError;
use crate::settings::{MantlingConfig, MantlingTypeSettings, TimeRange};

pub struct SettingsResolver {
    settings: [Arc<MantlingTypeSettings>; 3],
}

impl SettingsResolver {
    pub fn new(config: &MantlingConfig) -> Result<Self, ConfigError> {
        let get = |mantling_type| {
            config
                .type_settings(mantling_type)
                .cloned()
                .map(Arc::new)
                .ok_or(ConfigError::MissingTypeSettings(mantling_type))
        };
        Ok(Self {
            settings: [
                get(MantlingType::High)?,
                get(MantlingType::Low)?,
                get(MantlingType::InAir)?,
            ],
        })
    }

    pub fn from_map(mut map: HashMap<MantlingType, MantlingTypeSettings>) -> Result<Self, ConfigError> {
        let mut take = |mantling_type| {
            map.remove(&mantling_type)
                .map(Arc::new)
                .ok_or(ConfigError::MissingTypeSettings(mantling_type))
        };
        Ok(Self {
            settings: [
                take(MantlingType::High)?,
                take(MantlingType::Low)?,
                take(MantlingType::InAir)?,
            ],
        })
    }

    pub fn resolve(&self, mantling_type: MantlingType) -> Arc<MantlingTypeSettings> {
        Arc::clone(&self.settings[mantling_type.index()])
    }

    /// Replace every record. On error the current records stay in place.
    pub fn reload(&mut self, config: &MantlingConfig) -> Result<(), ConfigError> {
        *self = Self::new(config)?;
        log::info!("Reloaded mantling type settings from '{}'", config.name);
        Ok(())
    }
}

impl MantlingTypeSettings {
    /// Offset into the montage where playback begins for a mantle of `height`.
    ///
    /// With `auto_calculate_start_time` the height is mapped linearly from
    /// `start_time_reference_height` onto `start_time`, clamped to the ends.
    /// Otherwise the fixed `start_time.x` is used.
    pub fn start_time(&self, height: f32) -> f32 {
        let start = if self.auto_calculate_start_time {
            map_range_clamped(
                height,
                self.start_time_reference_height.x,
                self.start_time_reference_height.y,
                self.start_time.x,
                self.start_time.y,
            )
        } else {
            self.start_time.x
        };

        let start = start.max(0.0);
        match self.montage.play_length {
            Some(length) => start.min(length.max(0.0)),
            None => start,
        }
    }

    /// Motion-warping window for playback that begins at `start_time`.
    /// The window never opens before playback does.
    pub fn warp_window(&self, start_time: f32) -> TimeRange {
        let range = self.motion_warping_time_range.clamped();
        let min = range.min.max(start_time);
        TimeRange::new(min, range.max.max(min))
    }
}

fn map_range_clamped(value: f32, in_a: f32, in_b: f32, out_a: f32, out_b: f32) -> f32 {
    let span = in_b - in_a;
    if span.abs() <= f32::EPSILON {
        return if value <= in_a { out_a } else { out_b };
    }
    let alpha = ((value - in_a) / span).clamp(0.0, 1.0);
    out_a + (out_b - out_a) * alpha
}
