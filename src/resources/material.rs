//! Effect Materials
//!
//! An [`EffectMaterial`] is the opaque effect applied by each blit of a
//! capture. The capture pipeline only cares whether a material is present and
//! whether it is the *same* material as last time (identity, not content);
//! the GPU backend turns it into a fullscreen pipeline.
//!
//! Built-in blur variants come from the `static_blur` shader template, one
//! variant per [`BlurMode`]. They are resolved once per `(shader, mode)` and
//! cached process-wide, so resolving the same variant twice yields the same
//! identity and does not force a command-sequence rebuild.

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::identity::next_identity;

/// Template name of the built-in blur shader.
pub const STATIC_BLUR_SHADER: &str = "static_blur";

/// Blur quality variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlurMode {
    /// No blur: captures are straight copies.
    None,
    /// 3×3 kernel.
    #[default]
    Fast,
    /// 5×5 kernel.
    Medium,
    /// 7×7 kernel.
    Detail,
}

impl BlurMode {
    /// Half-width of the sampling kernel (`0` for [`BlurMode::None`]).
    #[inline]
    #[must_use]
    pub fn kernel_radius(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Fast => 1,
            Self::Medium => 2,
            Self::Detail => 3,
        }
    }

    /// Value of the `BLUR_MODE` shader define.
    #[must_use]
    pub fn define_value(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Fast => "FAST",
            Self::Medium => "MEDIUM",
            Self::Detail => "DETAIL",
        }
    }
}

/// Where the backend gets the fragment shader of a material from.
#[derive(Debug, Clone)]
pub enum MaterialSource {
    /// Embedded shader template rendered with the mode's defines.
    Template {
        name: Cow<'static, str>,
        mode: BlurMode,
    },
    /// User-provided WGSL.
    ///
    /// Must declare `vs_main`/`fs_main` and the bindings
    /// `@group(0) @binding(0)` source texture, `@binding(1)` sampler and
    /// `@binding(2)` the `EffectUniforms` uniform block.
    Wgsl(Arc<str>),
}

struct MaterialInner {
    id: u64,
    label: String,
    source: MaterialSource,
}

/// Shared, identity-compared effect material handle.
#[derive(Clone)]
pub struct EffectMaterial(Arc<MaterialInner>);

static RESOLVED: LazyLock<Mutex<FxHashMap<(String, BlurMode), EffectMaterial>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

thread_local! {
    static RESOLVE_CALLS: Cell<u64> = const { Cell::new(0) };
}

impl EffectMaterial {
    fn new(label: String, source: MaterialSource) -> Self {
        Self(Arc::new(MaterialInner {
            id: next_identity(),
            label,
            source,
        }))
    }

    /// Resolves the material variant of `shader` for `mode`.
    ///
    /// Returns `None` for [`BlurMode::None`]: a capture without material is a
    /// straight copy.
    #[must_use]
    pub fn resolve(shader: &str, mode: BlurMode) -> Option<Self> {
        RESOLVE_CALLS.with(|calls| calls.set(calls.get() + 1));
        if mode == BlurMode::None {
            return None;
        }

        let mut cache = RESOLVED.lock();
        let material = cache
            .entry((shader.to_owned(), mode))
            .or_insert_with(|| {
                log::debug!("Resolving effect material '{shader}' for {mode:?}");
                Self::new(
                    format!("{shader} ({mode:?})"),
                    MaterialSource::Template {
                        name: Cow::Owned(shader.to_owned()),
                        mode,
                    },
                )
            });
        Some(material.clone())
    }

    /// Number of [`EffectMaterial::resolve`] calls made on this thread.
    #[doc(hidden)]
    #[must_use]
    pub fn resolve_calls() -> u64 {
        RESOLVE_CALLS.with(Cell::get)
    }

    /// Creates a custom post-effect material from raw WGSL.
    ///
    /// Each call creates a new identity, and the GPU backend compiles a
    /// pipeline per identity. Build custom materials once and keep them;
    /// a backend evicts pipelines of materials it has not drawn with for a
    /// while.
    #[must_use]
    pub fn from_wgsl(label: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        Self::new(label.into(), MaterialSource::Wgsl(source.into()))
    }

    /// Unique identity of this material.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.label
    }

    #[must_use]
    pub fn source(&self) -> &MaterialSource {
        &self.0.source
    }
}

impl PartialEq for EffectMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for EffectMaterial {}

impl fmt::Debug for EffectMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectMaterial")
            .field("id", &self.id())
            .field("label", &self.label())
            .finish()
    }
}
