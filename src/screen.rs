//! Static Blurred Screen
//!
//! [`StaticBlurScreen`] is the public entry point of the capture pipeline.
//! It owns the persistent output texture and the cached command sequence,
//! attaches the sequence to a camera for exactly one frame and publishes the
//! result to its [`DisplayState`] from an end-of-frame continuation.
//!
//! # Capture cycle
//!
//! ```text
//!  Idle ──capture()──► Attached ──end of frame──► Finalizing ──► Idle
//!                        │  ▲                       detach, release stale
//!                        └──┘ capture() again:       texture, publish
//!                             last config wins
//! ```
//!
//! # Resource policy
//!
//! - The output texture is recreated only when the computed size changes.
//!   The stale texture is kept as *pending release* until the finalize of the
//!   capture that replaced it, so anything still sampling it this frame stays
//!   valid.
//! - The command sequence is rebuilt when its shape changes (output texture,
//!   material identity, working size, filter, iterations). Blur strength is a
//!   shader global and never triggers a rebuild.
//! - Dropping the widget releases everything synchronously; a pending
//!   continuation then finds nothing to upgrade and does nothing.
//! - The blur-mode material is resolved when the settings change, never
//!   during a capture.
//!
//! ```rust,ignore
//! let screen = StaticBlurScreen::new(device.clone());
//! screen.set_iterations(3);
//! screen.capture(&canvas)?;
//!
//! // host: render the camera, replaying its attached sequences
//! scheduler.end_of_frame(); // publishes the blurred texture
//! ```

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::command::{CommandSequence, CommandSequenceBuilder};
use crate::device::RenderDevice;
use crate::display::{DisplayState, UvRect};
use crate::errors::Result;
use crate::resources::{
    BlurMode, EffectMaterial, RenderTextureDesc, RenderTextureId, TextureFilter, globals,
};
use crate::scene::{CameraEvent, CanvasHost, CaptureCamera};
use crate::scheduler::FrameScheduler;
use crate::settings::{BlurSettings, CaptureConfiguration, DesamplingRate};
use crate::sizing::compute_size;

/// Where a widget is in its capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No capture pending.
    #[default]
    Idle,
    /// Sequence attached to a camera, waiting for the frame boundary.
    Attached,
    /// Frame boundary reached; detaching and publishing.
    Finalizing,
}

/// Result of [`StaticBlurScreen::capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Sequence attached and finalize scheduled.
    Scheduled,
    /// A capture was already pending this frame; its configuration was replaced.
    Updated,
    /// No camera could be resolved; nothing happened.
    NoCamera,
}

#[derive(Debug, Clone, Copy)]
struct OutputTexture {
    id: RenderTextureId,
    size: (u32, u32),
}

/// Everything that determines the operations of a command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceKey {
    target: RenderTextureId,
    working_size: (u32, u32),
    filter: TextureFilter,
    material: Option<u64>,
    iterations: u32,
}

#[derive(Default)]
struct GpuResourceSet {
    output: Option<OutputTexture>,
    pending_release: Option<OutputTexture>,
    sequence: Option<Arc<CommandSequence>>,
    sequence_key: Option<SequenceKey>,
}

struct Attachment {
    camera: Rc<dyn CaptureCamera>,
    sequence: Arc<CommandSequence>,
}

struct ScreenCore {
    settings: BlurSettings,
    /// Variant of `settings.shader()` for `settings.blur_mode()`.
    resolved_material: Option<EffectMaterial>,
    effect_material: Option<EffectMaterial>,
    event: CameraEvent,
    device: Arc<dyn RenderDevice>,
    resources: GpuResourceSet,
    attachment: Option<Attachment>,
    state: CaptureState,
    /// Bumped by `release()`; a continuation from an older generation is stale.
    generation: u64,
    vertical_flip: bool,
    display: DisplayState,
}

impl ScreenCore {
    fn configuration(&self) -> CaptureConfiguration {
        let material = self
            .effect_material
            .clone()
            .or_else(|| self.resolved_material.clone());
        CaptureConfiguration::snapshot(&self.settings, material)
    }

    fn update_settings(&mut self, update: impl FnOnce(&mut BlurSettings)) {
        let before = (self.settings.shader().to_owned(), self.settings.blur_mode());
        update(&mut self.settings);
        if before.0 != self.settings.shader() || before.1 != self.settings.blur_mode() {
            self.resolved_material = self.settings.resolve_material();
        }
    }

    /// Brings the output texture and command sequence up to date with `config`.
    fn prepare(&mut self, pixel_size: (u32, u32), config: &CaptureConfiguration) -> Result<()> {
        let output_size = compute_size(pixel_size, config.desampling_rate);
        let working_size = compute_size(pixel_size, config.reduction_rate);

        if let Some(output) = self.resources.output
            && output.size != output_size
        {
            log::debug!(
                "Static blur output resized {:?} -> {:?}",
                output.size,
                output_size
            );
            self.retire_output();
        }

        let target = match self.resources.output {
            Some(output) => output.id,
            None => {
                let desc =
                    RenderTextureDesc::new(output_size.0, output_size.1, config.filter_mode);
                let id = self.device.create_render_texture(&desc)?;
                log::debug!(
                    "Static blur output texture created: {}x{}",
                    output_size.0,
                    output_size.1
                );
                self.resources.output = Some(OutputTexture {
                    id,
                    size: output_size,
                });
                id
            }
        };

        let key = SequenceKey {
            target,
            working_size,
            filter: config.filter_mode,
            material: config.material.as_ref().map(EffectMaterial::id),
            iterations: config.iterations,
        };

        if self.resources.sequence.is_none() || self.resources.sequence_key != Some(key) {
            let sequence = CommandSequenceBuilder::new(target)
                .working_size(working_size.0, working_size.1)
                .filter(config.filter_mode)
                .material(config.material.clone())
                .iterations(config.iterations)
                .build();
            log::debug!(
                "Static blur command sequence built: {} commands, {} iteration(s), working {}x{}",
                sequence.commands().len(),
                sequence.effective_iterations(),
                working_size.0,
                working_size.1,
            );
            self.resources.sequence = Some(Arc::new(sequence));
            self.resources.sequence_key = Some(key);
        }

        Ok(())
    }

    /// Takes the live output texture out of service.
    ///
    /// The first stale texture of a cycle is what the display may still be
    /// sampling, so it waits for the finalize. A texture that goes stale
    /// before it was ever published is released at once.
    fn retire_output(&mut self) {
        let Some(output) = self.resources.output.take() else {
            return;
        };
        if self.resources.pending_release.is_none() {
            self.resources.pending_release = Some(output);
        } else {
            self.device.release_render_texture(output.id);
        }
    }

    /// Attaches the current sequence to `camera`, keeping at most one attached.
    fn attach(&mut self, camera: Rc<dyn CaptureCamera>) {
        let Some(sequence) = self.resources.sequence.clone() else {
            return;
        };

        if let Some(current) = &self.attachment {
            if Rc::ptr_eq(&current.camera, &camera) && current.sequence.id() == sequence.id() {
                return;
            }
            current
                .camera
                .remove_command_sequence(self.event, &current.sequence);
        }

        camera.add_command_sequence(self.event, Arc::clone(&sequence));
        log::trace!(
            "Static blur sequence {} attached to '{}'",
            sequence.id(),
            camera.name()
        );
        self.attachment = Some(Attachment { camera, sequence });
    }

    fn detach(&mut self) {
        if let Some(Attachment { camera, sequence }) = self.attachment.take() {
            camera.remove_command_sequence(self.event, &sequence);
            log::trace!(
                "Static blur sequence {} detached from '{}'",
                sequence.id(),
                camera.name()
            );
        }
    }

    fn push_globals(&self, pixel_size: (u32, u32), config: &CaptureConfiguration) {
        let (working_w, working_h) = compute_size(pixel_size, config.reduction_rate);
        self.device
            .set_global_float(globals::blur_strength(), config.blur);
        self.device.set_global_vector(
            globals::effect_factor(),
            [
                config.blur,
                config.iterations as f32,
                working_w as f32,
                working_h as f32,
            ],
        );
    }

    /// Undoes a capture whose texture allocation failed.
    fn abort_capture(&mut self) {
        self.detach();
        self.resources.sequence = None;
        self.resources.sequence_key = None;
        if self.resources.output.is_none()
            && let Some(previous) = self.resources.pending_release.take()
        {
            // The previous capture is still alive and displayed.
            self.resources.output = Some(previous);
        }
        if self.state == CaptureState::Attached {
            self.generation += 1;
            self.state = CaptureState::Idle;
        }
    }

    /// End-of-frame continuation.
    fn finalize(&mut self, generation: u64) {
        if generation != self.generation || self.state != CaptureState::Attached {
            log::trace!("Stale static blur finalize ignored");
            return;
        }
        self.state = CaptureState::Finalizing;

        self.detach();
        if let Some(stale) = self.resources.pending_release.take() {
            self.device.release_render_texture(stale.id);
        }

        let texture = self.resources.output.map(|output| output.id);
        self.display.set_texture(texture);
        self.display.set_uv_rect(if self.vertical_flip {
            UvRect::FLIPPED
        } else {
            UvRect::FULL
        });
        self.display.mark_dirty();

        self.state = CaptureState::Idle;
        log::trace!("Static blur capture published");
    }

    fn release(&mut self) {
        self.detach();
        self.resources.sequence = None;
        self.resources.sequence_key = None;
        if let Some(output) = self.resources.output.take() {
            self.device.release_render_texture(output.id);
        }
        if let Some(stale) = self.resources.pending_release.take() {
            self.device.release_render_texture(stale.id);
        }
        if self.display.texture().is_some() {
            self.display.set_texture(None);
        }
        self.state = CaptureState::Idle;
        self.generation += 1;
    }
}

/// Widget core displaying a blurred still of the screen.
pub struct StaticBlurScreen {
    core: Rc<RefCell<ScreenCore>>,
}

impl StaticBlurScreen {
    /// Creates a widget with default settings.
    #[must_use]
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self::with_settings(device, BlurSettings::default())
    }

    #[must_use]
    pub fn with_settings(device: Arc<dyn RenderDevice>, settings: BlurSettings) -> Self {
        Self {
            core: Rc::new(RefCell::new(ScreenCore {
                resolved_material: settings.resolve_material(),
                settings,
                effect_material: None,
                event: CameraEvent::default(),
                device,
                resources: GpuResourceSet::default(),
                attachment: None,
                state: CaptureState::Idle,
                generation: 0,
                vertical_flip: false,
                display: DisplayState::default(),
            })),
        }
    }

    /// Captures the current frame of the canvas camera.
    ///
    /// The blurred texture is published at the end of the current frame.
    /// Calling this again before then replaces the pending configuration
    /// without attaching a second sequence.
    pub fn capture(&self, canvas: &dyn CanvasHost) -> Result<CaptureOutcome> {
        let Some(camera) = canvas.resolve_camera() else {
            log::warn!("Static blur capture skipped: no camera available");
            return Ok(CaptureOutcome::NoCamera);
        };

        let mut core = self.core.borrow_mut();
        let config = core.configuration();
        let pixel_size = camera.pixel_size();
        let reentrant = core.state == CaptureState::Attached;

        if let Err(err) = core.prepare(pixel_size, &config) {
            log::warn!("Static blur capture failed: {err}");
            core.abort_capture();
            return Err(err);
        }

        core.attach(camera);
        core.push_globals(pixel_size, &config);
        core.vertical_flip = canvas.requires_vertical_flip();

        if config.keep_canvas_size {
            let (width, height) = canvas.root_size();
            core.display.set_size(width, height);
        }

        if reentrant {
            return Ok(CaptureOutcome::Updated);
        }

        core.state = CaptureState::Attached;
        let generation = core.generation;
        drop(core);

        schedule_finalize(&canvas.scheduler(), Rc::downgrade(&self.core), generation);

        Ok(CaptureOutcome::Scheduled)
    }

    /// Frees every GPU resource and clears the displayed texture.
    ///
    /// Safe to call in any state and any number of times.
    pub fn release(&self) {
        self.core.borrow_mut().release();
    }

    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.core.borrow().state
    }

    /// The persistent output texture, once a capture has allocated it.
    #[must_use]
    pub fn output_texture(&self) -> Option<RenderTextureId> {
        self.core.borrow().resources.output.map(|output| output.id)
    }

    /// Stale output texture waiting for the finalize.
    #[must_use]
    pub fn pending_release_texture(&self) -> Option<RenderTextureId> {
        self.core.borrow().resources.pending_release.map(|stale| stale.id)
    }

    /// The cached command sequence.
    #[must_use]
    pub fn command_sequence(&self) -> Option<Arc<CommandSequence>> {
        self.core.borrow().resources.sequence.clone()
    }

    #[must_use]
    pub fn display(&self) -> Ref<'_, DisplayState> {
        Ref::map(self.core.borrow(), |core| &core.display)
    }

    pub fn display_mut(&self) -> RefMut<'_, DisplayState> {
        RefMut::map(self.core.borrow_mut(), |core| &mut core.display)
    }

    /// Camera event the sequence is attached to.
    #[must_use]
    pub fn capture_event(&self) -> CameraEvent {
        self.core.borrow().event
    }

    /// Changes the camera event; takes effect on the next idle capture.
    pub fn set_capture_event(&self, event: CameraEvent) {
        let mut core = self.core.borrow_mut();
        if core.attachment.is_none() {
            core.event = event;
        } else {
            log::warn!("Static blur capture event cannot change while a capture is pending");
        }
    }

    #[must_use]
    pub fn settings(&self) -> BlurSettings {
        self.core.borrow().settings.clone()
    }

    pub fn set_settings(&self, settings: BlurSettings) {
        self.core.borrow_mut().update_settings(|s| *s = settings);
    }

    #[must_use]
    pub fn blur(&self) -> f32 {
        self.core.borrow().settings.blur()
    }

    pub fn set_blur(&self, blur: f32) {
        self.core.borrow_mut().settings.set_blur(blur);
    }

    #[must_use]
    pub fn blur_mode(&self) -> BlurMode {
        self.core.borrow().settings.blur_mode()
    }

    pub fn set_blur_mode(&self, mode: BlurMode) {
        self.core
            .borrow_mut()
            .update_settings(|s| s.set_blur_mode(mode));
    }

    #[must_use]
    pub fn desampling_rate(&self) -> DesamplingRate {
        self.core.borrow().settings.desampling_rate()
    }

    pub fn set_desampling_rate(&self, rate: DesamplingRate) {
        self.core.borrow_mut().settings.set_desampling_rate(rate);
    }

    #[must_use]
    pub fn reduction_rate(&self) -> DesamplingRate {
        self.core.borrow().settings.reduction_rate()
    }

    pub fn set_reduction_rate(&self, rate: DesamplingRate) {
        self.core.borrow_mut().settings.set_reduction_rate(rate);
    }

    #[must_use]
    pub fn filter_mode(&self) -> TextureFilter {
        self.core.borrow().settings.filter_mode()
    }

    pub fn set_filter_mode(&self, filter: TextureFilter) {
        self.core.borrow_mut().settings.set_filter_mode(filter);
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.core.borrow().settings.iterations()
    }

    pub fn set_iterations(&self, iterations: u32) {
        self.core.borrow_mut().settings.set_iterations(iterations);
    }

    #[must_use]
    pub fn keep_canvas_size(&self) -> bool {
        self.core.borrow().settings.keep_canvas_size()
    }

    pub fn set_keep_canvas_size(&self, keep: bool) {
        self.core.borrow_mut().settings.set_keep_canvas_size(keep);
    }

    /// Shader template the blur-mode material is resolved from.
    #[must_use]
    pub fn shader(&self) -> String {
        self.core.borrow().settings.shader().to_owned()
    }

    pub fn set_shader(&self, shader: impl Into<String>) {
        let shader = shader.into();
        self.core.borrow_mut().update_settings(|s| s.set_shader(shader));
    }

    /// Explicit effect material; overrides the blur-mode variant when set.
    #[must_use]
    pub fn effect_material(&self) -> Option<EffectMaterial> {
        self.core.borrow().effect_material.clone()
    }

    pub fn set_effect_material(&self, material: Option<EffectMaterial>) {
        self.core.borrow_mut().effect_material = material;
    }
}

/// Queues the finalize of capture `generation` on `scheduler`.
///
/// When the widget state is still borrowed at the frame boundary (a host
/// holding a `display()` guard), the finalize moves to the next frame and
/// the sequence stays attached until then.
fn schedule_finalize(
    scheduler: &Rc<FrameScheduler>,
    core: Weak<RefCell<ScreenCore>>,
    generation: u64,
) {
    let retry = Rc::downgrade(scheduler);
    scheduler.submit(move || {
        let Some(core) = core.upgrade() else {
            return;
        };
        if let Ok(mut state) = core.try_borrow_mut() {
            state.finalize(generation);
            return;
        }
        log::warn!("Static blur state is borrowed at end of frame; finalize deferred");
        if let Some(scheduler) = retry.upgrade() {
            schedule_finalize(&scheduler, Rc::downgrade(&core), generation);
        }
    });
}

impl Drop for StaticBlurScreen {
    fn drop(&mut self) {
        match self.core.try_borrow_mut() {
            Ok(mut core) => core.release(),
            Err(_) => log::error!(
                "Static blur dropped while its state is borrowed; GPU resources were not released"
            ),
        }
    }
}
