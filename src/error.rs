use std::path::PathBuf;

use thiserror::Error;

use crate::classify::MantlingType;

/// Errors raised while loading or validating a mantling configuration.
///
/// These are load-time failures only. Nothing on the detection or session
/// path returns a `ConfigError`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no settings registered for mantling type {0:?}")]
    MissingTypeSettings(MantlingType),

    #[error("{profile} trace ledge height band is inverted ({min} > {max})")]
    InvalidHeightBand {
        profile: &'static str,
        min: f32,
        max: f32,
    },

    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },
}

/// Errors raised while loading collision geometry.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to load GLB: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("GLB contains no collision triangles")]
    Empty,

    #[error("collision mesh rejected by the physics backend")]
    InvalidMesh,
}
