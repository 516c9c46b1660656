//! Shader Property Identifiers
//!
//! Process-wide string interner that turns shader-visible names
//! (`"_ScreenCopy"`, `"_BlurStrength"`, ...) into compact integer handles.
//! Temporary buffers and shader globals are addressed by [`PropertyId`], so
//! comparing and hashing them never touches the string data.

use std::fmt;
use std::sync::LazyLock;
use std::sync::OnceLock;

use lasso::{Spur, ThreadedRodeo};

/// Global interner instance.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Process-wide unique handle for a shader property name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PropertyId(Spur);

impl PropertyId {
    /// Interns `name`, returning the existing handle if it was seen before.
    #[inline]
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(INTERNER.get_or_intern(name))
    }

    /// Looks up an already interned name without allocating.
    #[inline]
    #[must_use]
    pub fn get(name: &str) -> Option<Self> {
        INTERNER.get(name).map(Self)
    }

    /// Resolves the handle back to its name.
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        INTERNER.resolve(&self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifiers of the three temporary buffers used by every capture.
///
/// Populated lazily on first use and read-only afterwards; all orchestrator
/// instances share the same ids.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WorkingBufferIds {
    /// Full-screen copy of the active render target.
    pub copy: PropertyId,
    /// First reduced-resolution effect buffer.
    pub effect_a: PropertyId,
    /// Second reduced-resolution effect buffer (ping-pong partner of A).
    pub effect_b: PropertyId,
}

static WORKING_BUFFER_IDS: OnceLock<WorkingBufferIds> = OnceLock::new();

impl WorkingBufferIds {
    #[must_use]
    pub fn get() -> WorkingBufferIds {
        *WORKING_BUFFER_IDS.get_or_init(|| WorkingBufferIds {
            copy: PropertyId::from_name("_ScreenCopy"),
            effect_a: PropertyId::from_name("_EffectBufferA"),
            effect_b: PropertyId::from_name("_EffectBufferB"),
        })
    }
}

/// Shader globals pushed before a command sequence executes.
pub mod globals {
    use super::PropertyId;

    /// Blur strength scalar, `[0, 1]`.
    #[must_use]
    pub fn blur_strength() -> PropertyId {
        PropertyId::from_name("_BlurStrength")
    }

    /// `(strength, iterations, working width, working height)`.
    #[must_use]
    pub fn effect_factor() -> PropertyId {
        PropertyId::from_name("_EffectFactor")
    }
}
