//! wgpu Backend
//!
//! GPU side of the capture pipeline: a [`RenderDevice`](crate::RenderDevice)
//! implementation that owns render textures and replays command sequences.
//!
//! - [`WgpuRenderDevice`]: texture registry, shader globals and replay
//! - [`ShaderManager`]: minijinja effect templates and the module cache
//! - [`TransientTexturePool`]: temporary buffers recycled across replays

pub mod context;
pub mod shader_manager;
pub mod transient_pool;
pub mod wgpu_device;

pub use context::{BackendSettings, GpuContext};
pub use shader_manager::ShaderManager;
pub use transient_pool::{TransientTextureDesc, TransientTextureId, TransientTexturePool};
pub use wgpu_device::{ActiveTarget, EffectUniforms, WgpuRenderDevice};
