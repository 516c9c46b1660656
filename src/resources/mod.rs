//! Core resource definitions
//!
//! Backend-independent handles and descriptors used by the capture pipeline:
//! - [`PropertyId`]: interned shader property / temporary buffer names
//! - [`RenderTextureId`], [`RenderTextureDesc`]: persistent output textures
//! - [`EffectMaterial`]: opaque effect applied by each blit

pub(crate) mod identity;
pub mod material;
pub mod property;
pub mod texture;

pub use material::{BlurMode, EffectMaterial, MaterialSource, STATIC_BLUR_SHADER};
pub use property::{PropertyId, WorkingBufferIds, globals};
pub use texture::{RenderTextureDesc, RenderTextureId, TextureFilter};
