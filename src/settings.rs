//! Capture Settings
//!
//! [`BlurSettings`] is the persisted, user-facing configuration of a static
//! blur widget. Setters clamp their inputs; deserialized settings go through
//! the same clamps, so an out-of-range value in a saved scene never reaches
//! the pipeline.
//!
//! [`CaptureConfiguration`] is the immutable snapshot a single capture builds
//! its command sequence from.
//!
//! ```rust,ignore
//! let mut settings = BlurSettings::default();
//! settings.set_blur(0.5);
//! settings.set_iterations(4);
//! settings.set_desampling_rate(DesamplingRate::X2);
//! ```

use serde::{Deserialize, Serialize};

use crate::resources::{BlurMode, EffectMaterial, STATIC_BLUR_SHADER, TextureFilter};

/// Lower bound of the blur strength.
pub const MIN_BLUR: f32 = 0.0;
/// Upper bound of the blur strength.
pub const MAX_BLUR: f32 = 1.0;
/// Minimum number of effect iterations.
pub const MIN_ITERATIONS: u32 = 1;
/// Maximum number of effect iterations.
pub const MAX_ITERATIONS: u32 = 8;

/// Power-of-two divisor applied to the camera resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DesamplingRate {
    /// Native resolution, no power-of-two rounding.
    None,
    X1,
    #[default]
    X2,
    X4,
    X8,
}

impl DesamplingRate {
    /// Integer divisor, or `None` for pass-through.
    #[inline]
    #[must_use]
    pub fn divisor(self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::X1 => Some(1),
            Self::X2 => Some(2),
            Self::X4 => Some(4),
            Self::X8 => Some(8),
        }
    }
}

/// Persisted configuration of a static blur widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBlurSettings")]
pub struct BlurSettings {
    blur: f32,
    blur_mode: BlurMode,
    desampling_rate: DesamplingRate,
    reduction_rate: DesamplingRate,
    filter_mode: TextureFilter,
    iterations: u32,
    keep_canvas_size: bool,
    shader: String,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            blur: MAX_BLUR,
            blur_mode: BlurMode::Fast,
            desampling_rate: DesamplingRate::X2,
            reduction_rate: DesamplingRate::X2,
            filter_mode: TextureFilter::Bilinear,
            iterations: MIN_ITERATIONS,
            keep_canvas_size: true,
            shader: STATIC_BLUR_SHADER.to_owned(),
        }
    }
}

impl BlurSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blur strength in `[MIN_BLUR, MAX_BLUR]`.
    #[inline]
    #[must_use]
    pub fn blur(&self) -> f32 {
        self.blur
    }

    pub fn set_blur(&mut self, blur: f32) {
        self.blur = if blur.is_nan() {
            MIN_BLUR
        } else {
            blur.clamp(MIN_BLUR, MAX_BLUR)
        };
    }

    #[inline]
    #[must_use]
    pub fn blur_mode(&self) -> BlurMode {
        self.blur_mode
    }

    pub fn set_blur_mode(&mut self, mode: BlurMode) {
        self.blur_mode = mode;
    }

    /// Desampling rate of the persistent output texture.
    #[inline]
    #[must_use]
    pub fn desampling_rate(&self) -> DesamplingRate {
        self.desampling_rate
    }

    pub fn set_desampling_rate(&mut self, rate: DesamplingRate) {
        self.desampling_rate = rate;
    }

    /// Desampling rate of the temporary effect buffers.
    #[inline]
    #[must_use]
    pub fn reduction_rate(&self) -> DesamplingRate {
        self.reduction_rate
    }

    pub fn set_reduction_rate(&mut self, rate: DesamplingRate) {
        self.reduction_rate = rate;
    }

    #[inline]
    #[must_use]
    pub fn filter_mode(&self) -> TextureFilter {
        self.filter_mode
    }

    pub fn set_filter_mode(&mut self, filter: TextureFilter) {
        self.filter_mode = filter;
    }

    /// Number of effect passes, in `[MIN_ITERATIONS, MAX_ITERATIONS]`.
    #[inline]
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
    }

    /// Whether a capture resizes the widget to its root canvas.
    #[inline]
    #[must_use]
    pub fn keep_canvas_size(&self) -> bool {
        self.keep_canvas_size
    }

    pub fn set_keep_canvas_size(&mut self, keep: bool) {
        self.keep_canvas_size = keep;
    }

    /// Shader template the blur material variants are resolved from.
    #[must_use]
    pub fn shader(&self) -> &str {
        &self.shader
    }

    pub fn set_shader(&mut self, shader: impl Into<String>) {
        self.shader = shader.into();
    }

    /// Resolves the material for the current shader and blur mode.
    #[must_use]
    pub fn resolve_material(&self) -> Option<EffectMaterial> {
        EffectMaterial::resolve(&self.shader, self.blur_mode)
    }
}

/// Unvalidated on-disk representation of [`BlurSettings`].
#[derive(Deserialize)]
#[serde(default)]
struct RawBlurSettings {
    blur: f32,
    blur_mode: BlurMode,
    desampling_rate: DesamplingRate,
    reduction_rate: DesamplingRate,
    filter_mode: TextureFilter,
    iterations: u32,
    keep_canvas_size: bool,
    shader: String,
}

impl Default for RawBlurSettings {
    fn default() -> Self {
        let d = BlurSettings::default();
        Self {
            blur: d.blur,
            blur_mode: d.blur_mode,
            desampling_rate: d.desampling_rate,
            reduction_rate: d.reduction_rate,
            filter_mode: d.filter_mode,
            iterations: d.iterations,
            keep_canvas_size: d.keep_canvas_size,
            shader: d.shader,
        }
    }
}

impl From<RawBlurSettings> for BlurSettings {
    fn from(raw: RawBlurSettings) -> Self {
        let mut settings = Self {
            blur_mode: raw.blur_mode,
            desampling_rate: raw.desampling_rate,
            reduction_rate: raw.reduction_rate,
            filter_mode: raw.filter_mode,
            keep_canvas_size: raw.keep_canvas_size,
            shader: raw.shader,
            ..Self::default()
        };
        settings.set_blur(raw.blur);
        settings.set_iterations(raw.iterations);
        settings
    }
}

/// Snapshot of everything a single capture depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    pub blur: f32,
    pub desampling_rate: DesamplingRate,
    pub reduction_rate: DesamplingRate,
    pub filter_mode: TextureFilter,
    pub material: Option<EffectMaterial>,
    pub iterations: u32,
    pub keep_canvas_size: bool,
}

impl CaptureConfiguration {
    /// Takes a snapshot of `settings`, using `material` as the effect.
    #[must_use]
    pub fn snapshot(settings: &BlurSettings, material: Option<EffectMaterial>) -> Self {
        Self {
            blur: settings.blur,
            desampling_rate: settings.desampling_rate,
            reduction_rate: settings.reduction_rate,
            filter_mode: settings.filter_mode,
            material,
            iterations: settings.iterations,
            keep_canvas_size: settings.keep_canvas_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_is_clamped_to_unit_range() {
        let mut s = BlurSettings::default();
        s.set_blur(3.5);
        assert!((s.blur() - MAX_BLUR).abs() < f32::EPSILON);
        s.set_blur(-1.0);
        assert!(s.blur().abs() < f32::EPSILON);
        s.set_blur(f32::NAN);
        assert!(s.blur().abs() < f32::EPSILON);
    }

    #[test]
    fn iterations_are_clamped() {
        let mut s = BlurSettings::default();
        s.set_iterations(0);
        assert_eq!(s.iterations(), MIN_ITERATIONS);
        s.set_iterations(100);
        assert_eq!(s.iterations(), MAX_ITERATIONS);
        s.set_iterations(5);
        assert_eq!(s.iterations(), 5);
    }

    #[test]
    fn none_blur_mode_has_no_material() {
        let mut s = BlurSettings::default();
        assert!(s.resolve_material().is_some());
        s.set_blur_mode(BlurMode::None);
        assert!(s.resolve_material().is_none());
    }

    #[test]
    fn divisors() {
        assert_eq!(DesamplingRate::None.divisor(), None);
        assert_eq!(DesamplingRate::X1.divisor(), Some(1));
        assert_eq!(DesamplingRate::X8.divisor(), Some(8));
    }
}
