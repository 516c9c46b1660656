//! Display State
//!
//! The widget-facing half of the pipeline: which texture is shown, how it is
//! tinted and where. Mesh generation belongs to the host UI framework; this
//! module only answers whether the widget should emit geometry at all and
//! which uv rect to use.

use crate::resources::RenderTextureId;

/// Alpha below which the widget is treated as invisible.
pub const MIN_VISIBLE_ALPHA: f32 = 1.0 / 255.0;

/// Normalized texture rectangle `(x, y, width, height)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl UvRect {
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Full rect sampled bottom-up.
    pub const FLIPPED: Self = Self {
        x: 0.0,
        y: 1.0,
        width: 1.0,
        height: -1.0,
    };
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Displayed texture and visibility inputs of a static blur widget.
#[derive(Debug, Clone)]
pub struct DisplayState {
    texture: Option<RenderTextureId>,
    /// Tint color (RGBA).
    pub color: [f32; 4],
    /// Alpha applied by the host renderer (fades, canvas groups).
    pub renderer_alpha: f32,
    size: (f32, f32),
    uv_rect: UvRect,
    dirty: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            texture: None,
            color: [1.0; 4],
            renderer_alpha: 1.0,
            size: (0.0, 0.0),
            uv_rect: UvRect::FULL,
            dirty: false,
        }
    }
}

impl DisplayState {
    #[inline]
    #[must_use]
    pub fn texture(&self) -> Option<RenderTextureId> {
        self.texture
    }

    /// Assigns the displayed texture and marks the widget dirty.
    pub fn set_texture(&mut self, texture: Option<RenderTextureId>) {
        self.texture = texture;
        self.dirty = true;
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (f32, f32) {
        self.size
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        if self.size != (width, height) {
            self.size = (width, height);
            self.dirty = true;
        }
    }

    #[inline]
    #[must_use]
    pub fn uv_rect(&self) -> UvRect {
        self.uv_rect
    }

    pub fn set_uv_rect(&mut self, rect: UvRect) {
        if self.uv_rect != rect {
            self.uv_rect = rect;
            self.dirty = true;
        }
    }

    /// Whether geometry is out of date.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears and returns the dirty flag; called by the host after rebuilding geometry.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Whether the widget should emit its quad.
    ///
    /// No texture, a transparent tint and a transparent renderer all suppress
    /// geometry to avoid overdraw.
    #[must_use]
    pub fn emits_geometry(&self) -> bool {
        self.texture.is_some()
            && self.color[3] >= MIN_VISIBLE_ALPHA
            && self.renderer_alpha >= MIN_VISIBLE_ALPHA
    }
}
