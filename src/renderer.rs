//! Frame renderer driving a fragment shader over a full-viewport quad.

use crate::config::FrameSourceConfig;
use crate::error::{FrameError, FrameResult};
use crate::frame::{self, FrameUniforms, PixelBuffer, RowOrder};
use crate::shader::{CompiledShaders, FrameSource, GpuContext, ShaderProgram};
use tracing::{debug, info};

/// Renders one frame per call from a compiled shader program.
///
/// A renderer is either ready or closed. Closing drops the GPU context and
/// every resource allocated for it; rendering afterwards fails with
/// [`FrameError::Closed`]. Calls take `&mut self`, so a renderer shared
/// between threads needs a `Mutex` around it.
pub struct FrameRenderer {
    program: Option<ShaderProgram>,
    width: u32,
    height: u32,
    channels: u32,
    speed: f64,
    row_order: RowOrder,
}

impl FrameRenderer {
    /// Resolves and compiles the shader sources, then acquires a GPU context
    /// and builds the program.
    pub fn new(config: &FrameSourceConfig) -> FrameResult<Self> {
        config.validate()?;
        let shaders = config.params.resolve()?;
        let compiled = CompiledShaders::compile(&shaders)?;

        let gpu = GpuContext::new(config.width, config.height)?;
        let program = ShaderProgram::new(gpu, config.width, config.height, compiled);
        info!(
            "Frame renderer ready ({}x{}, {} channels, speed {})",
            config.width, config.height, config.channels, config.params.speed
        );

        Ok(Self {
            program: Some(program),
            width: config.width,
            height: config.height,
            channels: config.channels,
            speed: config.params.speed,
            row_order: config.params.row_order,
        })
    }

    /// Renders the frame at `progress`. The shader sees
    /// `time = progress * speed`.
    pub fn render_frame(&mut self, progress: f64, total_elapsed_time: f64) -> FrameResult<PixelBuffer> {
        let program = self.program.as_ref().ok_or(FrameError::Closed)?;

        let uniforms = FrameUniforms::new(self.width, self.height, progress, total_elapsed_time, self.speed);
        debug!(
            "Rendering frame: progress {:.4}, time {:.4}, elapsed {:.3}s",
            progress, uniforms.time, total_elapsed_time
        );

        let rgba = program.draw(&uniforms)?;
        let packed = frame::pack_channels(&rgba, self.channels);
        let data = self.row_order.apply(&packed, self.width, self.channels);

        Ok(PixelBuffer::from_data(self.width, self.height, self.channels, data))
    }

    /// Releases GPU resources. Further calls are no-ops.
    pub fn close(&mut self) {
        if self.program.take().is_some() {
            info!("Frame renderer closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.program.is_none()
    }

    /// Output frame size in bytes.
    pub fn frame_len(&self) -> usize {
        frame::expected_len(self.width, self.height, self.channels)
    }
}

impl FrameSource for FrameRenderer {
    fn read_next_frame(&mut self, progress: f64, total_elapsed_time: f64) -> FrameResult<PixelBuffer> {
        self.render_frame(progress, total_elapsed_time)
    }

    fn close(&mut self) {
        FrameRenderer::close(self);
    }
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("speed", &self.speed)
            .field("row_order", &self.row_order)
            .field("closed", &self.is_closed())
            .finish()
    }
}
