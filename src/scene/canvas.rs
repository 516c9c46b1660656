//! Canvas Host
//!
//! The canvas a widget lives on supplies the camera to capture from, the
//! root canvas size used for size-matching, and the long-lived
//! [`FrameScheduler`] that runs the deferred finalize.

use std::cell::Cell;
use std::rc::Rc;

use super::camera::CaptureCamera;
use crate::scheduler::FrameScheduler;

/// Canvas / root-canvas collaborator.
pub trait CanvasHost {
    /// Camera the canvas renders with, if any.
    fn world_camera(&self) -> Option<Rc<dyn CaptureCamera>>;

    /// Primary scene camera, used when the canvas has no camera of its own.
    fn main_camera(&self) -> Option<Rc<dyn CaptureCamera>> {
        None
    }

    /// Size of the root canvas in layout units.
    fn root_size(&self) -> (f32, f32);

    /// Always-alive host object that runs end-of-frame continuations.
    fn scheduler(&self) -> Rc<FrameScheduler>;

    /// Whether captured textures must be displayed upside down on this platform.
    fn requires_vertical_flip(&self) -> bool {
        false
    }

    /// Canvas camera first, then the main camera.
    fn resolve_camera(&self) -> Option<Rc<dyn CaptureCamera>> {
        self.world_camera().or_else(|| self.main_camera())
    }
}

/// Plain [`CanvasHost`] implementation.
pub struct Canvas {
    world_camera: Option<Rc<dyn CaptureCamera>>,
    main_camera: Option<Rc<dyn CaptureCamera>>,
    root_size: Cell<(f32, f32)>,
    scheduler: Rc<FrameScheduler>,
    vertical_flip: bool,
}

impl Canvas {
    #[must_use]
    pub fn new(scheduler: Rc<FrameScheduler>, root_width: f32, root_height: f32) -> Self {
        Self {
            world_camera: None,
            main_camera: None,
            root_size: Cell::new((root_width, root_height)),
            scheduler,
            vertical_flip: false,
        }
    }

    #[must_use]
    pub fn with_world_camera(mut self, camera: Rc<dyn CaptureCamera>) -> Self {
        self.world_camera = Some(camera);
        self
    }

    #[must_use]
    pub fn with_main_camera(mut self, camera: Rc<dyn CaptureCamera>) -> Self {
        self.main_camera = Some(camera);
        self
    }

    #[must_use]
    pub fn with_vertical_flip(mut self, flip: bool) -> Self {
        self.vertical_flip = flip;
        self
    }

    pub fn set_root_size(&self, width: f32, height: f32) {
        self.root_size.set((width, height));
    }
}

impl CanvasHost for Canvas {
    fn world_camera(&self) -> Option<Rc<dyn CaptureCamera>> {
        self.world_camera.clone()
    }

    fn main_camera(&self) -> Option<Rc<dyn CaptureCamera>> {
        self.main_camera.clone()
    }

    fn root_size(&self) -> (f32, f32) {
        self.root_size.get()
    }

    fn scheduler(&self) -> Rc<FrameScheduler> {
        Rc::clone(&self.scheduler)
    }

    fn requires_vertical_flip(&self) -> bool {
        self.vertical_flip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Camera;

    #[test]
    fn world_camera_takes_precedence() {
        let scheduler = Rc::new(FrameScheduler::new());
        let world: Rc<dyn CaptureCamera> = Rc::new(Camera::new(1, 1).with_name("World"));
        let main: Rc<dyn CaptureCamera> = Rc::new(Camera::new(1, 1).with_name("Main"));

        let canvas = Canvas::new(Rc::clone(&scheduler), 10.0, 10.0).with_main_camera(main);
        assert_eq!(canvas.resolve_camera().unwrap().name(), "Main");

        let canvas = canvas.with_world_camera(world);
        assert_eq!(canvas.resolve_camera().unwrap().name(), "World");
    }

    #[test]
    fn no_camera_resolves_to_none() {
        let canvas = Canvas::new(Rc::new(FrameScheduler::new()), 10.0, 10.0);
        assert!(canvas.resolve_camera().is_none());
    }
}
