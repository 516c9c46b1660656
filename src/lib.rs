#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Static blurred screen snapshots.
//!
//! A [`StaticBlurScreen`] captures what a camera has rendered on demand,
//! blurs it on the GPU through a small ping-pong pipeline and keeps the
//! result in a persistent texture that a UI overlay can display as a still
//! backdrop. Nothing is re-rendered until the next [`StaticBlurScreen::capture`].

pub mod command;
pub mod device;
pub mod display;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod screen;
pub mod settings;
pub mod sizing;

pub use command::{BlitTarget, CommandSequence, CommandSequenceBuilder, GpuCommand, TemporarySize};
pub use device::RenderDevice;
pub use display::{DisplayState, UvRect};
pub use errors::{Result, StaticBlurError};
pub use renderer::{ActiveTarget, WgpuRenderDevice};
pub use resources::{
    BlurMode, EffectMaterial, PropertyId, RenderTextureDesc, RenderTextureId, TextureFilter,
};
pub use scene::{Camera, CameraEvent, Canvas, CanvasHost, CaptureCamera};
pub use scheduler::FrameScheduler;
pub use screen::{CaptureOutcome, CaptureState, StaticBlurScreen};
pub use settings::{BlurSettings, CaptureConfiguration, DesamplingRate};
pub use sizing::{closest_power_of_two, compute_size};
