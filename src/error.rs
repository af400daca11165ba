//! Error types for frame sources.

use std::fmt;
use std::path::PathBuf;

/// Result alias used across the library.
pub type FrameResult<T> = Result<T, FrameError>;

/// Which program stage an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Errors produced while building or driving a frame source.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A shader file or one of its includes could not be read.
    #[error("failed to read shader source {path:?}: {source}")]
    SourceResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The shader compiler rejected a program stage.
    #[error("{stage} shader failed to compile: {message}")]
    Compilation { stage: ShaderStage, message: String },

    /// Construction parameters are unusable.
    #[error("invalid frame source configuration: {0}")]
    Configuration(String),

    /// No GPU adapter or device could be acquired.
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),

    /// Copying the framebuffer back to host memory failed.
    #[error("framebuffer readback failed: {0}")]
    Readback(String),

    /// The renderer was used after `close`.
    #[error("frame renderer is closed")]
    Closed,
}

impl FrameError {
    pub(crate) fn compilation(stage: ShaderStage, message: impl Into<String>) -> Self {
        FrameError::Compilation {
            stage,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_error_names_the_stage() {
        let err = FrameError::compilation(ShaderStage::Fragment, "unexpected token");
        assert_eq!(
            err.to_string(),
            "fragment shader failed to compile: unexpected token"
        );
    }

    #[test]
    fn source_resolution_error_keeps_io_source() {
        use std::error::Error;

        let err = FrameError::SourceResolution {
            path: PathBuf::from("missing.glsl"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("missing.glsl"));
        assert!(err.source().is_some());
    }
}
