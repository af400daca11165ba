//! Frame buffers, quad geometry and the readback row-order correction.

use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

/// Bytes per pixel of the render target (RGBA8).
pub const READBACK_CHANNELS: usize = 4;

/// Raw pixels of one rendered frame.
///
/// Rows are stored top row first, `channels` bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per pixel
    pub channels: u32,
    /// Pixel bytes, `width * height * channels` long
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a buffer from existing data.
    pub fn from_data(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), expected_len(width, height, channels));
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes of one row.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.channels as usize;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }
}

pub(crate) fn expected_len(width: u32, height: u32, channels: u32) -> usize {
    width as usize * height as usize * channels as usize
}

/// How readback rows are reordered before a frame is handed out.
///
/// The surface origin is bottom-left, so readback yields the bottom row
/// first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowOrder {
    /// Reverse the order of rows, keeping the bytes within each row.
    #[default]
    FlipRows,
    /// Byte arithmetic of the original GL frame source:
    /// `dst[i + k] = src[len - i + k]` per pixel, zero past the end.
    /// Mirrors the image horizontally and vertically and shifts it by one
    /// pixel. Only useful for consumers that depend on that exact output.
    LegacyReverse,
}

impl RowOrder {
    /// Applies the correction to tightly packed pixels.
    pub fn apply(self, data: &[u8], width: u32, channels: u32) -> Vec<u8> {
        match self {
            RowOrder::FlipRows => flip_rows(data, width as usize * channels as usize),
            RowOrder::LegacyReverse => legacy_reverse(data, channels as usize),
        }
    }
}

/// Reverses row order; each row of `row_bytes` is copied intact.
pub fn flip_rows(data: &[u8], row_bytes: usize) -> Vec<u8> {
    if row_bytes == 0 {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len());
    for row in data.chunks_exact(row_bytes).rev() {
        out.extend_from_slice(row);
    }
    out
}

fn legacy_reverse(data: &[u8], stride: usize) -> Vec<u8> {
    let len = data.len();
    let mut out = vec![0u8; len];
    if stride == 0 {
        return out;
    }
    for i in (0..len).step_by(stride) {
        for k in 0..stride.min(len - i) {
            out[i + k] = data.get(len - i + k).copied().unwrap_or(0);
        }
    }
    out
}

/// Drops the row padding required by GPU buffer copies, leaving tightly
/// packed RGBA rows.
pub fn strip_row_padding(padded: &[u8], width: u32, height: u32, padded_row_bytes: usize) -> Vec<u8> {
    let row_bytes = width as usize * READBACK_CHANNELS;
    if padded_row_bytes == row_bytes {
        return padded[..row_bytes * height as usize].to_vec();
    }
    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for row in padded.chunks(padded_row_bytes).take(height as usize) {
        out.extend_from_slice(&row[..row_bytes]);
    }
    out
}

/// Keeps the first `channels` bytes of every RGBA pixel.
pub fn pack_channels(rgba: &[u8], channels: u32) -> Vec<u8> {
    let channels = channels as usize;
    if channels == READBACK_CHANNELS {
        return rgba.to_vec();
    }
    let mut out = Vec::with_capacity(rgba.len() / READBACK_CHANNELS * channels);
    for pixel in rgba.chunks_exact(READBACK_CHANNELS) {
        out.extend_from_slice(&pixel[..channels]);
    }
    out
}

/// Per-draw constants. Layout matches the `FrameParams` std140 block.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub total_elapsed_time: f32,
    pub speed: f32,
    pub _padding: [f32; 3],
}

impl FrameUniforms {
    /// `time` is `progress * speed`; `total_elapsed_time` is passed unscaled.
    pub fn new(width: u32, height: u32, progress: f64, total_elapsed_time: f64, speed: f64) -> Self {
        Self {
            resolution: [width as f32, height as f32],
            time: (progress * speed) as f32,
            total_elapsed_time: total_elapsed_time as f32,
            speed: speed as f32,
            _padding: [0.0; 3],
        }
    }
}

/// Vertex of the full-viewport quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

impl QuadVertex {
    /// Quad corners in triangle-fan order.
    pub const VERTICES: &'static [QuadVertex] = &[
        QuadVertex { position: [-1.0, -1.0] },
        QuadVertex { position: [1.0, -1.0] },
        QuadVertex { position: [1.0, 1.0] },
        QuadVertex { position: [-1.0, 1.0] },
    ];

    /// The fan (0, 1, 2, 3) as two triangles.
    pub const INDICES: &'static [u16] = &[0, 1, 2, 0, 2, 3];

    /// Returns the vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}
