//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`StaticBlurError`] covers the failure modes that can
//! abort a capture or a command-sequence replay:
//! - GPU initialization failures
//! - Render texture allocation failures
//! - Stale or unknown GPU handles referenced by a command sequence
//! - Shader template generation errors
//!
//! A missing camera is **not** an error: it degrades the capture to a no-op
//! and is reported through [`CaptureOutcome`](crate::CaptureOutcome).
//!
//! # Usage
//!
//! ```rust,ignore
//! use static_blur::errors::{StaticBlurError, Result};
//!
//! fn capture_now(screen: &StaticBlurScreen, canvas: &Canvas) -> Result<()> {
//!     screen.capture(canvas)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::resources::PropertyId;

/// The main error type for the static blur pipeline.
#[derive(Error, Debug)]
pub enum StaticBlurError {
    // ========================================================================
    // GPU Initialization Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The device could not allocate a render texture.
    #[error("Failed to allocate {width}x{height} render texture: {reason}")]
    TextureAllocation {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Backend-provided reason
        reason: String,
    },

    /// A command sequence referenced a render texture that no longer exists.
    #[error("Unknown render texture: {0}")]
    UnknownRenderTexture(String),

    /// A command sequence read or wrote a temporary buffer before allocating it.
    #[error("Temporary buffer '{0}' used before allocation")]
    TemporaryNotAllocated(PropertyId),

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// Shader template rendering failed.
    #[error("Shader template error: {0}")]
    ShaderTemplate(#[from] minijinja::Error),
}

/// Alias for `Result<T, StaticBlurError>`.
pub type Result<T> = std::result::Result<T, StaticBlurError>;
