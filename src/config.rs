//! Frame source configuration.

use crate::error::{FrameError, FrameResult};
use crate::frame::{RowOrder, READBACK_CHANNELS};
use crate::shader::dialect::DEFAULT_VERTEX_SHADER;
use crate::shader::include::resolve_includes;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

fn default_speed() -> f64 {
    1.0
}

/// Shader parameters of a frame source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShaderParams {
    /// Vertex shader file, preprocessed for `#include` lines
    #[serde(default)]
    pub vertex_path: Option<PathBuf>,
    /// Fragment shader file, preprocessed for `#include` lines
    #[serde(default)]
    pub fragment_path: Option<PathBuf>,
    /// Literal vertex source, used when no vertex path is given
    #[serde(default)]
    pub vertex_src: Option<String>,
    /// Literal fragment source, used when no fragment path is given
    #[serde(default)]
    pub fragment_src: Option<String>,
    /// Multiplier applied to progress to form the `time` uniform
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Readback row correction
    #[serde(default)]
    pub row_order: RowOrder,
}

impl Default for ShaderParams {
    fn default() -> Self {
        Self {
            vertex_path: None,
            fragment_path: None,
            vertex_src: None,
            fragment_src: None,
            speed: default_speed(),
            row_order: RowOrder::default(),
        }
    }
}

impl ShaderParams {
    /// Parameters for a literal fragment source.
    pub fn from_fragment_src(src: impl Into<String>) -> Self {
        Self {
            fragment_src: Some(src.into()),
            ..Default::default()
        }
    }

    /// Parameters for a fragment shader file.
    pub fn from_fragment_path(path: impl Into<PathBuf>) -> Self {
        Self {
            fragment_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    /// Resolves both stages. Paths take precedence over literal sources.
    ///
    /// A missing vertex source falls back to [`DEFAULT_VERTEX_SHADER`]; a
    /// missing fragment source is an error.
    pub fn resolve(&self) -> FrameResult<ResolvedShaders> {
        let vertex = match (&self.vertex_path, &self.vertex_src) {
            (Some(path), _) => {
                info!("Loading vertex shader from {:?}", path);
                resolve_includes(path)?
            }
            (None, Some(src)) if !src.is_empty() => src.clone(),
            _ => DEFAULT_VERTEX_SHADER.to_string(),
        };

        let fragment = match (&self.fragment_path, &self.fragment_src) {
            (Some(path), _) => {
                info!("Loading fragment shader from {:?}", path);
                resolve_includes(path)?
            }
            (None, Some(src)) if !src.is_empty() => src.clone(),
            _ => {
                return Err(FrameError::Configuration(
                    "a fragment shader is required (set fragmentPath or fragmentSrc)".into(),
                ))
            }
        };

        Ok(ResolvedShaders { vertex, fragment })
    }
}

/// Shader text ready for compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedShaders {
    pub vertex: String,
    pub fragment: String,
}

/// Construction parameters of a frame source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameSourceConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per pixel in returned frames (1..=4)
    #[serde(default = "default_channels")]
    pub channels: u32,
    #[serde(default)]
    pub params: ShaderParams,
}

fn default_channels() -> u32 {
    READBACK_CHANNELS as u32
}

impl FrameSourceConfig {
    pub fn new(width: u32, height: u32, channels: u32, params: ShaderParams) -> Self {
        Self {
            width,
            height,
            channels,
            params,
        }
    }

    /// Loads a configuration from a YAML file.
    ///
    /// Relative shader paths are resolved against the file's directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> FrameResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| FrameError::SourceResolution {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;

        if let Some(base) = path.parent() {
            let rebase = |p: &mut Option<PathBuf>| {
                if let Some(inner) = p.as_mut() {
                    if inner.is_relative() {
                        *inner = base.join(&*inner);
                    }
                }
            };
            rebase(&mut config.params.vertex_path);
            rebase(&mut config.params.fragment_path);
        }
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> FrameResult<Self> {
        serde_yaml::from_str(content).map_err(|e| FrameError::Configuration(e.to_string()))
    }

    /// Checks dimensions, channel count and speed.
    pub fn validate(&self) -> FrameResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::Configuration(format!(
                "frame size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.channels == 0 || self.channels as usize > READBACK_CHANNELS {
            return Err(FrameError::Configuration(format!(
                "channels must be between 1 and {}, got {}",
                READBACK_CHANNELS, self.channels
            )));
        }
        if !self.params.speed.is_finite() {
            return Err(FrameError::Configuration(format!(
                "speed must be finite, got {}",
                self.params.speed
            )));
        }
        Ok(())
    }
}
