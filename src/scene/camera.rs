//! Capture Cameras
//!
//! A camera is the collaborator a capture reads from: it knows its pixel
//! size and executes command sequences attached to its render events.
//! [`CaptureCamera`] is the seam the capture pipeline talks to; [`Camera`]
//! is a ready-made implementation a host renderer can replay from.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::command::CommandSequence;

/// Point in a camera's render pass where attached sequences execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraEvent {
    BeforeImageEffects,
    /// After post-processing: captures see the final composited frame.
    #[default]
    AfterImageEffects,
    AfterEverything,
}

/// Camera collaborator used by the capture pipeline.
pub trait CaptureCamera {
    /// Current render target size in pixels.
    fn pixel_size(&self) -> (u32, u32);

    /// Attaches `sequence` to `event`.
    fn add_command_sequence(&self, event: CameraEvent, sequence: Arc<CommandSequence>);

    /// Detaches the sequence with the same identity from `event`.
    fn remove_command_sequence(&self, event: CameraEvent, sequence: &CommandSequence);

    fn name(&self) -> &str {
        "Camera"
    }
}

/// Basic camera holding its pixel size and attached command sequences.
#[derive(Debug)]
pub struct Camera {
    name: Cow<'static, str>,
    pixel_size: Cell<(u32, u32)>,
    sequences: RefCell<Vec<(CameraEvent, Arc<CommandSequence>)>>,
}

impl Camera {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            name: Cow::Borrowed("Camera"),
            pixel_size: Cell::new((width, height)),
            sequences: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Updates the render target size, e.g. after a window resize.
    pub fn set_pixel_size(&self, width: u32, height: u32) {
        self.pixel_size.set((width, height));
    }

    /// Sequences attached to `event`, in attach order.
    ///
    /// The host renderer replays these at the matching point of the frame.
    #[must_use]
    pub fn command_sequences(&self, event: CameraEvent) -> Vec<Arc<CommandSequence>> {
        self.sequences
            .borrow()
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, seq)| Arc::clone(seq))
            .collect()
    }

    /// Total number of attached sequences across all events.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.sequences.borrow().len()
    }
}

impl CaptureCamera for Camera {
    fn pixel_size(&self) -> (u32, u32) {
        self.pixel_size.get()
    }

    fn add_command_sequence(&self, event: CameraEvent, sequence: Arc<CommandSequence>) {
        self.sequences.borrow_mut().push((event, sequence));
    }

    fn remove_command_sequence(&self, event: CameraEvent, sequence: &CommandSequence) {
        let mut sequences = self.sequences.borrow_mut();
        if let Some(index) = sequences
            .iter()
            .position(|(e, seq)| *e == event && seq.id() == sequence.id())
        {
            sequences.remove(index);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSequenceBuilder;
    use crate::resources::RenderTextureId;
    use slotmap::SlotMap;

    #[test]
    fn attach_and_detach_by_identity() {
        let mut keys: SlotMap<RenderTextureId, ()> = SlotMap::with_key();
        let out = keys.insert(());
        let camera = Camera::new(800, 600);
        let a = Arc::new(CommandSequenceBuilder::new(out).build());
        let b = Arc::new(CommandSequenceBuilder::new(out).build());

        camera.add_command_sequence(CameraEvent::AfterImageEffects, Arc::clone(&a));
        camera.add_command_sequence(CameraEvent::AfterEverything, Arc::clone(&b));
        assert_eq!(camera.command_sequences(CameraEvent::AfterImageEffects).len(), 1);

        // Wrong event: no-op.
        camera.remove_command_sequence(CameraEvent::AfterEverything, &a);
        assert_eq!(camera.attached_count(), 2);

        camera.remove_command_sequence(CameraEvent::AfterImageEffects, &a);
        assert_eq!(camera.attached_count(), 1);
        assert!(camera.command_sequences(CameraEvent::AfterImageEffects).is_empty());
    }
}
