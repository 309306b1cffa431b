//! Error type shared by the geometry builders, the field composer and the
//! engine session.

use std::path::PathBuf;
use thiserror::Error;

use crate::Float;
use crate::engine::{Dim, FieldId, Tag};

pub type Result<T> = std::result::Result<T, MeshError>;

#[derive(Debug, Error)]
pub enum MeshError {
    /// Rejected before anything was registered with the engine.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The engine refused to build an entity.
    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("{dim:?} entity {tag} does not exist")]
    UnknownEntity { dim: Dim, tag: Tag },

    /// Physical group names are write-once within one model.
    #[error("physical group `{0}` is already registered")]
    DuplicateTag(String),

    #[error("field {0} is not registered")]
    UnknownField(FieldId),

    #[error("mesh generation failed: {0}")]
    Generation(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid run configuration: {0}")]
    Config(String),
}

impl MeshError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        MeshError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        MeshError::Geometry(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fails unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: Float) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MeshError::invalid(
            name,
            format!("must be a finite value > 0, got {value}"),
        ))
    }
}

pub(crate) fn ensure_finite(name: &'static str, value: Float) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MeshError::invalid(name, format!("must be finite, got {value}")))
    }
}
