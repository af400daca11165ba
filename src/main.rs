//! Shaderframe CLI: renders a frame sequence from a fragment shader.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use shaderframe::{FrameRenderer, FrameSourceConfig, PixelBuffer, RowOrder, ShaderParams};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// File format for rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One PNG per frame
    Png,
    /// Raw pixel bytes per frame
    Raw,
}

/// Render frames of a GLSL fragment shader to disk.
#[derive(Parser, Debug)]
#[command(name = "shaderframe")]
#[command(about = "Render deterministic frames from a GLSL fragment shader")]
struct Args {
    /// YAML frame source config (overrides the shader/size flags)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the GLSL fragment shader
    #[arg(short, long)]
    fragment: Option<PathBuf>,

    /// Path to a GLSL vertex shader
    #[arg(long)]
    vertex: Option<PathBuf>,

    /// Frame width
    #[arg(long, default_value = "640")]
    width: u32,

    /// Frame height
    #[arg(long, default_value = "360")]
    height: u32,

    /// Bytes per pixel (1-4)
    #[arg(long, default_value = "4")]
    channels: u32,

    /// Multiplier applied to progress for the `time` uniform
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Reproduce the legacy byte-reversal instead of a row flip
    #[arg(long)]
    legacy_row_order: bool,

    /// Number of frames to render
    #[arg(long, default_value = "60")]
    frames: u32,

    /// Frame rate used to derive the elapsed time uniform
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Output directory
    #[arg(short, long, default_value = "frames")]
    output: PathBuf,

    /// Output file format
    #[arg(long, value_enum, default_value = "png")]
    format: OutputFormat,
}

impl Args {
    fn frame_source_config(&self) -> Result<FrameSourceConfig> {
        if let Some(path) = &self.config {
            info!("Loading config from {:?}", path);
            return FrameSourceConfig::from_yaml_file(path)
                .with_context(|| format!("failed to load config {:?}", path));
        }

        let Some(fragment) = &self.fragment else {
            bail!("either --config or --fragment is required");
        };

        let row_order = if self.legacy_row_order {
            RowOrder::LegacyReverse
        } else {
            RowOrder::FlipRows
        };
        let params = ShaderParams {
            vertex_path: self.vertex.clone(),
            ..ShaderParams::from_fragment_path(fragment)
        }
        .with_speed(self.speed)
        .with_row_order(row_order);

        Ok(FrameSourceConfig::new(self.width, self.height, self.channels, params))
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    if args.frames == 0 {
        bail!("--frames must be at least 1");
    }
    if args.fps.is_nan() || args.fps <= 0.0 {
        bail!("--fps must be positive");
    }

    let config = args.frame_source_config()?;
    let mut renderer = FrameRenderer::new(&config).context("failed to create frame renderer")?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create output directory {:?}", args.output))?;

    info!("Rendering {} frames to {:?}", args.frames, args.output);
    let start = Instant::now();
    for index in 0..args.frames {
        let progress = index as f64 / args.frames as f64;
        let total_elapsed_time = index as f64 / args.fps;

        let frame = renderer
            .render_frame(progress, total_elapsed_time)
            .with_context(|| format!("failed to render frame {}", index))?;
        let path = write_frame(&args.output, index, &frame, args.format)?;
        debug!("Wrote {:?}", path);
    }
    renderer.close();

    let elapsed = start.elapsed();
    info!(
        "Rendered {} frames in {:?} ({:.2} FPS)",
        args.frames,
        elapsed,
        args.frames as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}

fn write_frame(dir: &Path, index: u32, frame: &PixelBuffer, format: OutputFormat) -> Result<PathBuf> {
    match format {
        OutputFormat::Raw => {
            let path = dir.join(format!("frame_{:05}.raw", index));
            fs::write(&path, frame.as_bytes()).with_context(|| format!("failed to write {:?}", path))?;
            Ok(path)
        }
        OutputFormat::Png => {
            let color = match frame.channels {
                1 => image::ColorType::L8,
                2 => image::ColorType::La8,
                3 => image::ColorType::Rgb8,
                _ => image::ColorType::Rgba8,
            };
            let path = dir.join(format!("frame_{:05}.png", index));
            image::save_buffer(&path, frame.as_bytes(), frame.width, frame.height, color)
                .with_context(|| format!("failed to write {:?}", path))?;
            Ok(path)
        }
    }
}
