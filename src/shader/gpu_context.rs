//! Headless GPU context.

use crate::error::{FrameError, FrameResult};
use tracing::info;

/// Device and queue owned by one frame renderer.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquires an adapter able to render `width`x`height` offscreen.
    pub fn new(width: u32, height: u32) -> FrameResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| FrameError::ContextUnavailable(format!("no GPU adapter: {:?}", e)))?;

        let limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
        let max = limits.max_texture_dimension_2d;
        if width > max || height > max {
            return Err(FrameError::ContextUnavailable(format!(
                "{}x{} exceeds the adapter's maximum texture size {}",
                width, height, max
            )));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Shaderframe Device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| FrameError::ContextUnavailable(format!("device request failed: {}", e)))?;

        let adapter_info = adapter.get_info();
        info!(
            "Using GPU adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        Ok(Self { device, queue })
    }
}
