//! Transient Texture Pool
//!
//! Backs the temporary buffers (`GetTemporary` / `ReleaseTemporary`) of a
//! command sequence replay. Buffers are handed out while a sequence is
//! recorded and all returned to the free list when the replay ends, so the
//! next capture of the same size reuses them instead of allocating.
//!
//! ```text
//!  active: [PooledTexture]           ←── indexed by TransientTextureId
//!  free:   Map<PoolKey, Vec<PooledTexture>>
//!
//!  allocate() → id     (during replay)
//!  view(id)            (during replay)
//!  reset()             (end of replay)
//!  trim(n)             (drop buckets unused for n replays)
//! ```

use rustc_hash::FxHashMap;

/// Handle to a texture allocated from the pool.
///
/// Valid until the next [`TransientTexturePool::reset`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TransientTextureId(u32);

#[derive(Clone, Debug)]
pub struct TransientTextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub label: &'static str,
}

/// Recycling key. Usage is part of the key; a texture reused with a
/// narrower usage set than a pass needs fails validation.
#[derive(Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
}

impl PoolKey {
    fn from_desc(desc: &TransientTextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
        }
    }

    fn from_texture(texture: &wgpu::Texture) -> Self {
        Self {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            usage: texture.usage(),
        }
    }
}

struct PooledTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    /// Replays spent in the free list without being reused.
    idle_frames: u32,
}

impl PooledTexture {
    fn new(device: &wgpu::Device, desc: &TransientTextureDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            idle_frames: 0,
        }
    }
}

/// GPU texture pool for per-replay temporary buffers.
///
/// Not `Sync`; the owning device keeps it behind its state lock.
pub struct TransientTexturePool {
    active: Vec<PooledTexture>,
    free: FxHashMap<PoolKey, Vec<PooledTexture>>,
}

impl TransientTexturePool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            free: FxHashMap::default(),
        }
    }

    /// Allocates a texture matching `desc`, reusing a free one when possible.
    pub fn allocate(
        &mut self,
        device: &wgpu::Device,
        desc: &TransientTextureDesc,
    ) -> TransientTextureId {
        let key = PoolKey::from_desc(desc);

        let pooled = match self.free.get_mut(&key).and_then(Vec::pop) {
            Some(mut texture) => {
                texture.idle_frames = 0;
                texture
            }
            None => {
                log::trace!(
                    "Transient pool miss: {}x{} {:?}",
                    desc.width,
                    desc.height,
                    desc.format
                );
                PooledTexture::new(device, desc)
            }
        };

        let id = TransientTextureId(self.active.len() as u32);
        self.active.push(pooled);
        id
    }

    #[must_use]
    #[inline]
    pub fn view(&self, id: TransientTextureId) -> Option<&wgpu::TextureView> {
        self.active.get(id.0 as usize).map(|t| &t.view)
    }

    #[must_use]
    #[inline]
    pub fn size(&self, id: TransientTextureId) -> Option<(u32, u32)> {
        self.active
            .get(id.0 as usize)
            .map(|t| (t.texture.width(), t.texture.height()))
    }

    /// Returns every active texture to the free list.
    ///
    /// All outstanding [`TransientTextureId`]s become invalid.
    pub fn reset(&mut self) {
        for t in self.active.drain(..) {
            self.free
                .entry(PoolKey::from_texture(&t.texture))
                .or_default()
                .push(t);
        }
    }

    /// Drops free textures that have been idle for more than `max_idle_frames`
    /// calls. Buckets left behind by a size change age out this way.
    pub fn trim(&mut self, max_idle_frames: u32) {
        for bucket in self.free.values_mut() {
            for t in bucket.iter_mut() {
                t.idle_frames += 1;
            }
            bucket.retain(|t| t.idle_frames <= max_idle_frames);
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
    }

    /// Textures owned by the pool, active and free.
    #[must_use]
    pub fn total_texture_count(&self) -> usize {
        self.active.len() + self.free.values().map(Vec::len).sum::<usize>()
    }
}

impl Default for TransientTexturePool {
    fn default() -> Self {
        Self::new()
    }
}
