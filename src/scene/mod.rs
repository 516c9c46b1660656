//! Scene collaborators
//!
//! The objects a static blur widget talks to but does not own:
//! - [`Camera`] / [`CaptureCamera`]: source of the captured frame
//! - [`Canvas`] / [`CanvasHost`]: camera resolution, root size, scheduler

pub mod camera;
pub mod canvas;

pub use camera::{Camera, CameraEvent, CaptureCamera};
pub use canvas::{Canvas, CanvasHost};
