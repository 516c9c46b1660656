//! Render Device
//!
//! [`RenderDevice`] is the GPU allocation seam of the capture pipeline: it
//! owns persistent render textures and the shader globals visible to effect
//! materials. The wgpu implementation is
//! [`WgpuRenderDevice`](crate::renderer::WgpuRenderDevice).
//!
//! All methods take `&self`; implementations use interior mutability so a
//! single device can be shared by every widget through an `Arc`.

use crate::errors::Result;
use crate::resources::{PropertyId, RenderTextureDesc, RenderTextureId};

pub trait RenderDevice {
    /// Allocates a persistent render texture.
    ///
    /// Allocation failure is fatal for the capture that requested it; the
    /// pipeline does not retry.
    fn create_render_texture(&self, desc: &RenderTextureDesc) -> Result<RenderTextureId>;

    /// Frees a render texture. Unknown ids are ignored.
    fn release_render_texture(&self, id: RenderTextureId);

    /// Sets a scalar shader global.
    fn set_global_float(&self, property: PropertyId, value: f32);

    /// Sets a vector shader global.
    fn set_global_vector(&self, property: PropertyId, value: [f32; 4]);
}
