//! Shaderframe: deterministic frames from a GLSL fragment shader.
//!
//! Evaluates a fragment shader over a full-viewport quad once per frame and
//! reads the pixels back into host memory, top row first.

pub mod config;
pub mod error;
pub mod frame;
pub mod renderer;
pub mod shader;

pub use config::{FrameSourceConfig, ShaderParams};
pub use error::{FrameError, FrameResult, ShaderStage};
pub use frame::{PixelBuffer, RowOrder};
pub use renderer::FrameRenderer;
pub use shader::FrameSource;
