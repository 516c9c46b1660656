//! wgpu Context
//!
//! Adapter and device acquisition for the wgpu backend. Hosts that already
//! own a `wgpu::Device` skip this and hand theirs to
//! [`WgpuRenderDevice::new`](super::WgpuRenderDevice::new).

use crate::errors::{Result, StaticBlurError};

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub power_preference: wgpu::PowerPreference,
    /// Use a software adapter when no hardware adapter is available.
    pub force_fallback_adapter: bool,
    /// Limits to request; `None` takes whatever the adapter supports.
    pub required_limits: Option<wgpu::Limits>,
    /// Replays a free pooled texture, or the pipeline of a material that
    /// is no longer drawn with, survives before it is dropped.
    pub max_idle_replays: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            required_limits: None,
            max_idle_replays: 8,
        }
    }
}

/// Device and queue of a surface-less wgpu context.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Requests an adapter and device without a window surface.
    pub async fn headless(settings: &BackendSettings) -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: None,
                force_fallback_adapter: settings.force_fallback_adapter,
            })
            .await
            .map_err(|e| StaticBlurError::AdapterRequestFailed(e.to_string()))?;

        log::info!("Static blur using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Static Blur Device"),
                required_limits: settings
                    .required_limits
                    .clone()
                    .unwrap_or_else(|| adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        Ok(Self { device, queue })
    }
}
