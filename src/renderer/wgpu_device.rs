//! wgpu Render Device
//!
//! [`WgpuRenderDevice`] implements [`RenderDevice`] on top of wgpu and
//! replays [`CommandSequence`]s into a command encoder.
//!
//! # Replay
//!
//! Each blit is one fullscreen-triangle render pass:
//!
//! ```text
//! GetTemporary      → TransientTexturePool::allocate
//! Blit(src → dst)   → bind [src view, sampler, EffectUniforms] → draw(0..3)
//! ReleaseTemporary  → forget the name (texture returns to the pool on reset)
//! ```
//!
//! `EffectUniforms` is filled per blit from the `_BlurStrength` and
//! `_EffectFactor` globals and the source texel size.
//!
//! Pipelines and shader modules are cached per material identity. A material
//! not drawn with for `max_idle_replays` replays loses both.

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use super::context::{BackendSettings, GpuContext};
use super::shader_manager::ShaderManager;
use super::transient_pool::{TransientTextureDesc, TransientTextureId, TransientTexturePool};
use crate::command::{BlitTarget, CommandSequence, GpuCommand, TemporarySize};
use crate::device::RenderDevice;
use crate::errors::{Result, StaticBlurError};
use crate::resources::{
    EffectMaterial, PropertyId, RenderTextureDesc, RenderTextureId, TextureFilter, globals,
};
use crate::scene::{Camera, CameraEvent};

/// Render target the camera has composited when a sequence runs.
#[derive(Clone, Copy)]
pub struct ActiveTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// Uniform block at `@group(0) @binding(2)` of every effect shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct EffectUniforms {
    pub texel_size: [f32; 2],
    pub strength: f32,
    pub iterations: f32,
}

struct GpuRenderTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    filter: TextureFilter,
}

#[derive(Debug, Clone, Copy)]
enum GlobalValue {
    Float(f32),
    Vector([f32; 4]),
}

type PipelineKey = (Option<u64>, wgpu::TextureFormat);

struct BackendState {
    textures: SlotMap<RenderTextureId, GpuRenderTexture>,
    globals: FxHashMap<PropertyId, GlobalValue>,
    pool: TransientTexturePool,
    shaders: ShaderManager,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    /// Replays recorded so far.
    replay: u64,
    /// Material id → replay it was last drawn with.
    material_last_used: FxHashMap<u64, u64>,
}

impl BackendState {
    /// Ends a replay, dropping pipelines and modules of idle materials.
    fn finish_replay(&mut self, max_idle_replays: u32) {
        let replay = self.replay;
        self.replay += 1;

        let mut evicted: SmallVec<[u64; 4]> = SmallVec::new();
        self.material_last_used.retain(|id, last| {
            let keep = replay - *last <= u64::from(max_idle_replays);
            if !keep {
                evicted.push(*id);
            }
            keep
        });
        if evicted.is_empty() {
            return;
        }

        self.pipelines
            .retain(|(material, _), _| material.is_none_or(|id| !evicted.contains(&id)));
        for id in &evicted {
            self.shaders.evict(*id);
        }
        log::debug!("Evicted pipelines of {} idle effect material(s)", evicted.len());
    }

    fn effect_uniforms(&self, source_size: (u32, u32)) -> EffectUniforms {
        let strength = match self.globals.get(&globals::blur_strength()) {
            Some(GlobalValue::Float(v)) => *v,
            _ => 1.0,
        };
        let iterations = match self.globals.get(&globals::effect_factor()) {
            Some(GlobalValue::Vector(v)) => v[1],
            _ => 1.0,
        };
        EffectUniforms {
            texel_size: [
                1.0 / source_size.0.max(1) as f32,
                1.0 / source_size.1.max(1) as f32,
            ],
            strength,
            iterations,
        }
    }
}

/// Temporary name → pooled texture, live for one replay.
type TemporaryTable = SmallVec<[(PropertyId, TransientTextureId, TextureFilter); 4]>;

/// wgpu implementation of [`RenderDevice`].
pub struct WgpuRenderDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    nearest_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    max_idle_replays: u32,
    state: Mutex<BackendState>,
}

impl WgpuRenderDevice {
    /// Wraps a host-owned device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self> {
        Self::with_settings(device, queue, &BackendSettings::default())
    }

    pub fn with_settings(
        device: wgpu::Device,
        queue: wgpu::Queue,
        settings: &BackendSettings,
    ) -> Result<Self> {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Static Blur BindGroup Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Static Blur Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });

        let sampler = |label, filter: wgpu::FilterMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                mag_filter: filter,
                min_filter: filter,
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                ..Default::default()
            })
        };
        let nearest_sampler = sampler("Static Blur Nearest Sampler", wgpu::FilterMode::Nearest);
        let linear_sampler = sampler("Static Blur Linear Sampler", wgpu::FilterMode::Linear);

        let state = BackendState {
            textures: SlotMap::with_key(),
            globals: FxHashMap::default(),
            pool: TransientTexturePool::new(),
            shaders: ShaderManager::new()?,
            pipelines: FxHashMap::default(),
            replay: 0,
            material_last_used: FxHashMap::default(),
        };

        Ok(Self {
            device,
            queue,
            layout,
            pipeline_layout,
            nearest_sampler,
            linear_sampler,
            max_idle_replays: settings.max_idle_replays,
            state: Mutex::new(state),
        })
    }

    /// Creates a device on a surface-less adapter, blocking until it is ready.
    pub fn headless() -> Result<Self> {
        Self::headless_with_settings(&BackendSettings::default())
    }

    pub fn headless_with_settings(settings: &BackendSettings) -> Result<Self> {
        let ctx = pollster::block_on(GpuContext::headless(settings))?;
        Self::with_settings(ctx.device, ctx.queue, settings)
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// View of a render texture, for hosts that draw the published capture.
    #[must_use]
    pub fn texture_view(&self, id: RenderTextureId) -> Option<wgpu::TextureView> {
        self.state.lock().textures.get(id).map(|t| t.view.clone())
    }

    #[must_use]
    pub fn texture(&self, id: RenderTextureId) -> Option<wgpu::Texture> {
        self.state.lock().textures.get(id).map(|t| t.texture.clone())
    }

    #[must_use]
    pub fn render_texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    #[must_use]
    pub fn transient_texture_count(&self) -> usize {
        self.state.lock().pool.total_texture_count()
    }

    /// Number of cached render pipelines, across materials and formats.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.state.lock().pipelines.len()
    }

    #[must_use]
    pub fn shader_module_count(&self) -> usize {
        self.state.lock().shaders.module_count()
    }

    #[must_use]
    pub fn global_float(&self, property: PropertyId) -> Option<f32> {
        match self.state.lock().globals.get(&property) {
            Some(GlobalValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn global_vector(&self, property: PropertyId) -> Option<[f32; 4]> {
        match self.state.lock().globals.get(&property) {
            Some(GlobalValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    fn sampler(&self, filter: TextureFilter) -> &wgpu::Sampler {
        match filter {
            TextureFilter::Nearest => &self.nearest_sampler,
            TextureFilter::Bilinear => &self.linear_sampler,
        }
    }

    /// Records `sequence` into `encoder`.
    ///
    /// Temporary buffers go back to the pool when recording ends, whether or
    /// not it succeeded.
    pub fn execute(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        sequence: &CommandSequence,
        active: &ActiveTarget<'_>,
    ) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let result = self.record(state, encoder, sequence, active);
        if let Err(err) = &result {
            log::error!("Command sequence '{}' aborted: {err}", sequence.name());
        }

        state.pool.reset();
        state.pool.trim(self.max_idle_replays);
        state.finish_replay(self.max_idle_replays);
        result
    }

    /// Records and submits `sequence` in its own command buffer.
    pub fn submit(&self, sequence: &CommandSequence, active: &ActiveTarget<'_>) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(sequence.name()),
            });
        self.execute(&mut encoder, sequence, active)?;
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Records every sequence attached to `camera` at `event`, in attach order.
    pub fn execute_attached(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        camera: &Camera,
        event: CameraEvent,
        active: &ActiveTarget<'_>,
    ) -> Result<usize> {
        let sequences = camera.command_sequences(event);
        for sequence in &sequences {
            self.execute(encoder, sequence, active)?;
        }
        Ok(sequences.len())
    }

    fn record(
        &self,
        state: &mut BackendState,
        encoder: &mut wgpu::CommandEncoder,
        sequence: &CommandSequence,
        active: &ActiveTarget<'_>,
    ) -> Result<()> {
        let mut temporaries = TemporaryTable::new();

        for command in sequence.commands() {
            match command {
                GpuCommand::GetTemporary { id, size, filter } => {
                    let (width, height) = match *size {
                        TemporarySize::FullScreen => (active.width, active.height),
                        TemporarySize::Fixed { width, height } => (width, height),
                    };
                    let texture = state.pool.allocate(
                        &self.device,
                        &TransientTextureDesc {
                            width,
                            height,
                            format: RenderTextureDesc::FORMAT,
                            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                                | wgpu::TextureUsages::TEXTURE_BINDING,
                            label: "Static Blur Temporary",
                        },
                    );
                    temporaries.retain(|(name, ..)| *name != *id);
                    temporaries.push((*id, texture, *filter));
                }
                GpuCommand::ReleaseTemporary { id } => {
                    temporaries.retain(|(name, ..)| *name != *id);
                }
                GpuCommand::Blit {
                    source,
                    dest,
                    material,
                } => {
                    self.blit(
                        state,
                        encoder,
                        &temporaries,
                        active,
                        (*source, *dest),
                        material.as_ref(),
                    )?;
                }
            }
        }

        Ok(())
    }

    fn blit(
        &self,
        state: &mut BackendState,
        encoder: &mut wgpu::CommandEncoder,
        temporaries: &TemporaryTable,
        active: &ActiveTarget<'_>,
        (source, dest): (BlitTarget, BlitTarget),
        material: Option<&EffectMaterial>,
    ) -> Result<()> {
        let dest_format = match dest {
            BlitTarget::CurrentActive => active.format,
            BlitTarget::Temporary(_) | BlitTarget::Texture(_) => RenderTextureDesc::FORMAT,
        };
        let pipeline = self.pipeline(state, material, dest_format)?;

        let (source_view, source_size, filter) =
            resolve_target(state, temporaries, active, source)?;
        let (dest_view, ..) = resolve_target(state, temporaries, active, dest)?;

        let uniforms = state.effect_uniforms(source_size);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Static Blur Uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Static Blur BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler(filter)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Static Blur Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dest_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });

        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }

    fn pipeline(
        &self,
        state: &mut BackendState,
        material: Option<&EffectMaterial>,
        format: wgpu::TextureFormat,
    ) -> Result<wgpu::RenderPipeline> {
        let key = (material.map(EffectMaterial::id), format);
        if let Some(id) = key.0 {
            state.material_last_used.insert(id, state.replay);
        }
        if let Some(pipeline) = state.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        log::debug!(
            "Compiling static blur pipeline for {:?}, format {format:?}",
            material.map(EffectMaterial::label)
        );

        let module = state.shaders.get_or_compile(&self.device, material)?;
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Static Blur Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        state.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }
}

/// Resolves a blit endpoint to `(view, size, sampling filter)`.
fn resolve_target<'a>(
    state: &'a BackendState,
    temporaries: &TemporaryTable,
    active: &ActiveTarget<'a>,
    target: BlitTarget,
) -> Result<(&'a wgpu::TextureView, (u32, u32), TextureFilter)> {
    match target {
        BlitTarget::CurrentActive => Ok((
            active.view,
            (active.width, active.height),
            TextureFilter::Bilinear,
        )),
        BlitTarget::Temporary(name) => {
            let (_, id, filter) = temporaries
                .iter()
                .find(|(n, ..)| *n == name)
                .ok_or(StaticBlurError::TemporaryNotAllocated(name))?;
            match (state.pool.view(*id), state.pool.size(*id)) {
                (Some(view), Some(size)) => Ok((view, size, *filter)),
                _ => Err(StaticBlurError::TemporaryNotAllocated(name)),
            }
        }
        BlitTarget::Texture(id) => {
            let texture = state
                .textures
                .get(id)
                .ok_or_else(|| StaticBlurError::UnknownRenderTexture(format!("{id:?}")))?;
            Ok((
                &texture.view,
                (texture.texture.width(), texture.texture.height()),
                texture.filter,
            ))
        }
    }
}

impl RenderDevice for WgpuRenderDevice {
    fn create_render_texture(&self, desc: &RenderTextureDesc) -> Result<RenderTextureId> {
        let (width, height) = desc.extent();
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(StaticBlurError::TextureAllocation {
                width: desc.width,
                height: desc.height,
                reason: format!("exceeds max_texture_dimension_2d ({max})"),
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RenderTextureDesc::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = self.state.lock().textures.insert(GpuRenderTexture {
            texture,
            view,
            filter: desc.filter,
        });
        log::trace!("Render texture {id:?} created ({width}x{height})");
        Ok(id)
    }

    fn release_render_texture(&self, id: RenderTextureId) {
        if self.state.lock().textures.remove(id).is_some() {
            log::trace!("Render texture {id:?} released");
        }
    }

    fn set_global_float(&self, property: PropertyId, value: f32) {
        self.state
            .lock()
            .globals
            .insert(property, GlobalValue::Float(value));
    }

    fn set_global_vector(&self, property: PropertyId, value: [f32; 4]) {
        self.state
            .lock()
            .globals
            .insert(property, GlobalValue::Vector(value));
    }
}
