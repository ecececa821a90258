//! Error types shared by every stage of the renderer.
//!
//! Each stage returns a [`RenderError`]. The binary treats all of them the same
//! way (log and exit), while tests match on [`RenderError::kind`].

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a failure, one per stage that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    DeviceUnavailable,
    AssetNotFound,
    AssetMalformed,
    InvalidLayout,
    CompileError,
    BackendRejected,
    NoDrawable,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("GPU is not supported: {0}")]
    DeviceUnavailable(String),

    #[error("asset {path:?} could not be read")]
    AssetNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("asset {path:?} is malformed: {reason}")]
    AssetMalformed { path: PathBuf, reason: String },

    #[error("invalid vertex layout: {0}")]
    InvalidLayout(String),

    /// The layout is valid on its own but does not describe the asset's vertices.
    #[error("vertex layout does not match the asset: {0}")]
    LayoutMismatch(String),

    #[error("shader failed to compile:\n{0}")]
    Compile(String),

    #[error("shader has no {stage} entry point named `{name}`")]
    MissingEntryPoint { name: String, stage: &'static str },

    #[error("backend rejected the request: {0}")]
    BackendRejected(String),

    #[error("no drawable available: {0}")]
    NoDrawable(String),
}

impl RenderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DeviceUnavailable(_) => FailureKind::DeviceUnavailable,
            Self::AssetNotFound { .. } => FailureKind::AssetNotFound,
            Self::AssetMalformed { .. } => FailureKind::AssetMalformed,
            Self::InvalidLayout(_) | Self::LayoutMismatch(_) => FailureKind::InvalidLayout,
            Self::Compile(_) | Self::MissingEntryPoint { .. } => FailureKind::CompileError,
            Self::BackendRejected(_) => FailureKind::BackendRejected,
            Self::NoDrawable(_) => FailureKind::NoDrawable,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::AssetMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
