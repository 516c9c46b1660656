//! Render Texture Descriptors
//!
//! CPU-side description of the persistent output texture a capture resolves
//! into. The GPU object itself lives in a [`RenderDevice`](crate::RenderDevice)
//! and is addressed by [`RenderTextureId`].

use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Handle of a render texture owned by a [`RenderDevice`](crate::RenderDevice).
    pub struct RenderTextureId;
}

/// Sampling filter for captured and temporary textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFilter {
    /// Point sampling; produces blocky results at high desampling rates.
    Nearest,
    /// Bilinear sampling.
    #[default]
    Bilinear,
}

impl TextureFilter {
    #[inline]
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Self::Nearest => wgpu::FilterMode::Nearest,
            Self::Bilinear => wgpu::FilterMode::Linear,
        }
    }
}

/// Request for a persistent render texture.
///
/// Always 2D, single mip, RGBA8 and clamp-to-edge; only the size and the
/// preferred filter vary between captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTextureDesc {
    pub width: u32,
    pub height: u32,
    pub filter: TextureFilter,
    pub label: &'static str,
}

impl RenderTextureDesc {
    /// Format every capture texture is allocated with.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    #[must_use]
    pub fn new(width: u32, height: u32, filter: TextureFilter) -> Self {
        Self {
            width,
            height,
            filter,
            label: "Static Blur Output",
        }
    }

    /// The size actually allocated: zero-sized requests are clamped to 1.
    #[inline]
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width.max(1), self.height.max(1))
    }
}
