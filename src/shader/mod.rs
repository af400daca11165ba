//! Shader preprocessing and the GPU program.

pub mod dialect;
mod gpu_context;
pub mod include;
mod wgpu_pipeline;

pub use gpu_context::GpuContext;
pub use include::resolve_includes;
pub use wgpu_pipeline::{CompiledShaders, ShaderProgram};

use crate::error::FrameResult;
use crate::frame::PixelBuffer;

/// Trait for producers of animation frames.
pub trait FrameSource {
    /// Renders the frame at `progress` (normally in `[0, 1)`).
    /// `total_elapsed_time` is the pipeline's elapsed time in seconds.
    fn read_next_frame(&mut self, progress: f64, total_elapsed_time: f64) -> FrameResult<PixelBuffer>;

    /// Releases resources. Safe to call more than once.
    fn close(&mut self);
}
