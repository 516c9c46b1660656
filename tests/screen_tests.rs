//! Static Blur Screen Tests
//!
//! Tests for:
//! - Capture cycle: attach on capture, detach and publish at end of frame
//! - Re-entrant captures within one frame
//! - Release / drop while a finalize is pending
//! - Finalize deferred while the display state is borrowed
//! - Material resolution on configuration changes only
//! - Output texture resize and deferred release
//! - Command sequence reuse vs. rebuild
//! - Camera resolution, canvas size matching, vertical flip
//! - Allocation failure

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::SlotMap;

use static_blur::resources::{STATIC_BLUR_SHADER, globals};
use static_blur::{
    BlurMode, Camera, CameraEvent, Canvas, CaptureCamera, CaptureOutcome, CaptureState,
    CommandSequence, DesamplingRate, EffectMaterial, FrameScheduler, PropertyId, RenderDevice,
    RenderTextureDesc, RenderTextureId, Result, StaticBlurError, StaticBlurScreen, UvRect,
};

// ============================================================================
// Test Doubles
// ============================================================================

#[derive(Default)]
struct MockDevice {
    textures: Mutex<SlotMap<RenderTextureId, RenderTextureDesc>>,
    released: Mutex<Vec<RenderTextureId>>,
    floats: Mutex<Vec<(PropertyId, f32)>>,
    vectors: Mutex<Vec<(PropertyId, [f32; 4])>>,
    fail_allocations: AtomicBool,
}

impl MockDevice {
    fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }

    fn is_live(&self, id: RenderTextureId) -> bool {
        self.textures.lock().contains_key(id)
    }

    fn desc(&self, id: RenderTextureId) -> Option<RenderTextureDesc> {
        self.textures.lock().get(id).copied()
    }

    fn last_float(&self, property: PropertyId) -> Option<f32> {
        self.floats
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| *p == property)
            .map(|(_, v)| *v)
    }

    fn last_vector(&self, property: PropertyId) -> Option<[f32; 4]> {
        self.vectors
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| *p == property)
            .map(|(_, v)| *v)
    }
}

impl RenderDevice for MockDevice {
    fn create_render_texture(&self, desc: &RenderTextureDesc) -> Result<RenderTextureId> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(StaticBlurError::TextureAllocation {
                width: desc.width,
                height: desc.height,
                reason: "out of memory".to_string(),
            });
        }
        Ok(self.textures.lock().insert(*desc))
    }

    fn release_render_texture(&self, id: RenderTextureId) {
        if self.textures.lock().remove(id).is_some() {
            self.released.lock().push(id);
        }
    }

    fn set_global_float(&self, property: PropertyId, value: f32) {
        self.floats.lock().push((property, value));
    }

    fn set_global_vector(&self, property: PropertyId, value: [f32; 4]) {
        self.vectors.lock().push((property, value));
    }
}

/// Camera that counts attach / detach calls.
struct RecordingCamera {
    inner: Camera,
    adds: Cell<usize>,
    removes: Cell<usize>,
}

impl RecordingCamera {
    fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Camera::new(width, height).with_name("Recording"),
            adds: Cell::new(0),
            removes: Cell::new(0),
        }
    }
}

impl CaptureCamera for RecordingCamera {
    fn pixel_size(&self) -> (u32, u32) {
        self.inner.pixel_size()
    }

    fn add_command_sequence(&self, event: CameraEvent, sequence: Arc<CommandSequence>) {
        self.adds.set(self.adds.get() + 1);
        self.inner.add_command_sequence(event, sequence);
    }

    fn remove_command_sequence(&self, event: CameraEvent, sequence: &CommandSequence) {
        self.removes.set(self.removes.get() + 1);
        self.inner.remove_command_sequence(event, sequence);
    }

    fn name(&self) -> &str {
        "Recording"
    }
}

struct Fixture {
    device: Arc<MockDevice>,
    camera: Rc<RecordingCamera>,
    scheduler: Rc<FrameScheduler>,
    canvas: Canvas,
    screen: StaticBlurScreen,
}

fn fixture(width: u32, height: u32) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let device = Arc::new(MockDevice::default());
    let camera = Rc::new(RecordingCamera::new(width, height));
    let scheduler = Rc::new(FrameScheduler::new());
    let world: Rc<dyn CaptureCamera> = camera.clone();
    let canvas = Canvas::new(Rc::clone(&scheduler), 1920.0, 1080.0).with_world_camera(world);
    let shared: Arc<dyn RenderDevice> = device.clone();
    let screen = StaticBlurScreen::new(shared);

    Fixture {
        device,
        camera,
        scheduler,
        canvas,
        screen,
    }
}

// ============================================================================
// Capture Cycle
// ============================================================================

#[test]
fn capture_publishes_at_end_of_frame() {
    let f = fixture(1024, 768);

    let outcome = f.screen.capture(&f.canvas).unwrap();
    assert_eq!(outcome, CaptureOutcome::Scheduled);
    assert_eq!(f.screen.state(), CaptureState::Attached);
    assert_eq!(f.camera.inner.attached_count(), 1);
    assert_eq!(f.screen.display().texture(), None);

    let output = f.screen.output_texture().unwrap();
    let desc = f.device.desc(output).unwrap();
    assert_eq!((desc.width, desc.height), (512, 512));

    assert_eq!(f.scheduler.end_of_frame(), 1);

    assert_eq!(f.screen.state(), CaptureState::Idle);
    assert_eq!(f.camera.inner.attached_count(), 0);
    assert_eq!(f.screen.display().texture(), Some(output));
    assert!(f.screen.display_mut().take_dirty());
}

#[test]
fn sequence_attaches_to_configured_event() {
    let f = fixture(800, 600);
    f.screen.set_capture_event(CameraEvent::AfterEverything);

    f.screen.capture(&f.canvas).unwrap();

    assert_eq!(f.camera.inner.command_sequences(CameraEvent::AfterEverything).len(), 1);
    assert!(
        f.camera
            .inner
            .command_sequences(CameraEvent::AfterImageEffects)
            .is_empty()
    );
}

#[test]
fn double_capture_in_one_frame_attaches_once() {
    let f = fixture(1024, 768);

    assert_eq!(f.screen.capture(&f.canvas).unwrap(), CaptureOutcome::Scheduled);
    assert_eq!(f.screen.capture(&f.canvas).unwrap(), CaptureOutcome::Updated);

    assert_eq!(f.camera.adds.get(), 1);
    assert_eq!(f.camera.inner.attached_count(), 1);
    assert_eq!(f.scheduler.pending_count(), 1);

    assert_eq!(f.scheduler.end_of_frame(), 1);
    assert_eq!(f.camera.removes.get(), 1);
    assert_eq!(f.camera.inner.attached_count(), 0);
    assert_eq!(f.device.live_textures(), 1);
}

#[test]
fn last_configuration_in_a_frame_wins() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    let first = f.screen.command_sequence().unwrap();

    f.screen.set_iterations(4);
    f.screen.capture(&f.canvas).unwrap();
    let second = f.screen.command_sequence().unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(second.effective_iterations(), 4);

    // Exactly one sequence attached: the new one.
    let attached = f
        .camera
        .inner
        .command_sequences(CameraEvent::AfterImageEffects);
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].id(), second.id());

    f.scheduler.end_of_frame();
    assert_eq!(f.camera.inner.attached_count(), 0);
}

#[test]
fn second_frame_capture_schedules_again() {
    let f = fixture(640, 480);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();
    assert_eq!(f.screen.capture(&f.canvas).unwrap(), CaptureOutcome::Scheduled);
    assert_eq!(f.scheduler.pending_count(), 1);

    f.scheduler.end_of_frame();
    assert_eq!(f.camera.adds.get(), 2);
    assert_eq!(f.camera.removes.get(), 2);
}

// ============================================================================
// Release / Drop
// ============================================================================

#[test]
fn release_before_finalize_cancels_publish() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.screen.release();

    assert_eq!(f.device.live_textures(), 0);
    assert_eq!(f.camera.inner.attached_count(), 0);
    assert_eq!(f.screen.state(), CaptureState::Idle);

    // The late continuation finds nothing to do.
    assert_eq!(f.scheduler.end_of_frame(), 1);
    assert_eq!(f.screen.display().texture(), None);
    assert_eq!(f.screen.output_texture(), None);
    assert_eq!(f.device.live_textures(), 0);
}

#[test]
fn release_is_idempotent() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();

    f.screen.release();
    f.screen.release();

    assert_eq!(f.device.released.lock().len(), 1);
    assert_eq!(f.screen.display().texture(), None);
    assert!(f.screen.command_sequence().is_none());
}

#[test]
fn dropping_the_widget_cancels_pending_finalize() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    let Fixture {
        device,
        camera,
        scheduler,
        screen,
        ..
    } = f;
    drop(screen);

    assert_eq!(device.live_textures(), 0);
    assert_eq!(camera.inner.attached_count(), 0);
    assert_eq!(scheduler.end_of_frame(), 1);
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn borrowed_display_defers_finalize_to_next_frame() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    {
        let display = f.screen.display();
        assert_eq!(f.scheduler.end_of_frame(), 1);
        assert_eq!(display.texture(), None);
    }

    assert_eq!(f.screen.state(), CaptureState::Attached);
    assert_eq!(f.camera.inner.attached_count(), 1);
    assert_eq!(f.scheduler.pending_count(), 1);

    assert_eq!(f.scheduler.end_of_frame(), 1);
    assert_eq!(f.screen.state(), CaptureState::Idle);
    assert_eq!(f.camera.inner.attached_count(), 0);
    assert_eq!(f.screen.display().texture(), f.screen.output_texture());
}

#[test]
fn capture_after_release_starts_fresh() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.screen.release();
    f.scheduler.end_of_frame();

    assert_eq!(f.screen.capture(&f.canvas).unwrap(), CaptureOutcome::Scheduled);
    f.scheduler.end_of_frame();

    assert_eq!(f.device.live_textures(), 1);
    assert_eq!(f.screen.display().texture(), f.screen.output_texture());
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn blur_change_keeps_sequence_and_updates_global() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();
    let before = f.screen.command_sequence().unwrap().id();

    f.screen.set_blur(0.25);
    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();

    assert_eq!(f.screen.command_sequence().unwrap().id(), before);
    assert_eq!(f.device.last_float(globals::blur_strength()), Some(0.25));
}

#[test]
fn effect_factor_carries_working_size() {
    let f = fixture(1024, 768);
    f.screen.set_iterations(3);
    f.screen.set_reduction_rate(DesamplingRate::X4);

    f.screen.capture(&f.canvas).unwrap();

    let factor = f.device.last_vector(globals::effect_factor()).unwrap();
    assert_eq!(factor, [1.0, 3.0, 256.0, 256.0]);
}

#[test]
fn unchanged_capture_reuses_output_texture() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();
    let output = f.screen.output_texture();
    let sequence = f.screen.command_sequence().unwrap().id();

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();

    assert_eq!(f.screen.output_texture(), output);
    assert_eq!(f.screen.command_sequence().unwrap().id(), sequence);
    assert!(f.device.released.lock().is_empty());
}

#[test]
fn resize_defers_release_until_finalize() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();
    let old = f.screen.output_texture().unwrap();

    f.camera.inner.set_pixel_size(2048, 1536);
    f.screen.capture(&f.canvas).unwrap();

    let new = f.screen.output_texture().unwrap();
    assert_ne!(old, new);
    assert_eq!(f.screen.pending_release_texture(), Some(old));
    assert!(f.device.is_live(old));
    assert_eq!(f.screen.display().texture(), Some(old));

    f.scheduler.end_of_frame();

    assert!(!f.device.is_live(old));
    assert_eq!(f.screen.pending_release_texture(), None);
    assert_eq!(f.screen.display().texture(), Some(new));
    let desc = f.device.desc(new).unwrap();
    assert_eq!((desc.width, desc.height), (1024, 1024));
}

#[test]
fn second_resize_in_a_frame_releases_unpublished_texture() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();
    let published = f.screen.output_texture().unwrap();

    f.camera.inner.set_pixel_size(2048, 1536);
    f.screen.capture(&f.canvas).unwrap();
    let intermediate = f.screen.output_texture().unwrap();

    f.camera.inner.set_pixel_size(4096, 4096);
    f.screen.capture(&f.canvas).unwrap();

    assert!(!f.device.is_live(intermediate));
    assert_eq!(f.screen.pending_release_texture(), Some(published));
    assert!(f.device.is_live(published));

    f.scheduler.end_of_frame();
    assert_eq!(f.device.live_textures(), 1);
}

#[test]
fn blur_mode_none_builds_copy_sequence() {
    let f = fixture(1024, 768);
    f.screen.set_blur_mode(BlurMode::None);
    f.screen.set_iterations(5);

    f.screen.capture(&f.canvas).unwrap();

    let sequence = f.screen.command_sequence().unwrap();
    assert_eq!(sequence.effective_iterations(), 1);
    assert!(sequence.blits().all(|(_, _, has_material)| !has_material));
}

#[test]
fn captures_reuse_the_material_resolved_at_configuration() {
    let f = fixture(1024, 768);
    f.screen.set_blur_mode(BlurMode::Medium);

    let resolves = EffectMaterial::resolve_calls();
    for _ in 0..3 {
        f.screen.capture(&f.canvas).unwrap();
        f.scheduler.end_of_frame();
    }
    assert_eq!(EffectMaterial::resolve_calls(), resolves);

    let medium = f.screen.command_sequence().unwrap().id();
    f.screen.set_blur_mode(BlurMode::Detail);
    assert_eq!(EffectMaterial::resolve_calls(), resolves + 1);

    // Unrelated settings do not resolve again.
    f.screen.set_iterations(2);
    f.screen.set_blur(0.5);
    assert_eq!(EffectMaterial::resolve_calls(), resolves + 1);

    f.screen.capture(&f.canvas).unwrap();
    assert_ne!(f.screen.command_sequence().unwrap().id(), medium);
    assert_eq!(EffectMaterial::resolve_calls(), resolves + 1);
}

#[test]
fn shader_change_rebuilds_sequence() {
    let f = fixture(1024, 768);
    assert_eq!(f.screen.shader(), STATIC_BLUR_SHADER);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();
    let before = f.screen.command_sequence().unwrap().id();

    f.screen.set_shader("static_blur_alt");
    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();

    assert_eq!(f.screen.shader(), "static_blur_alt");
    assert_ne!(f.screen.command_sequence().unwrap().id(), before);
}

#[test]
fn explicit_material_overrides_blur_mode() {
    let f = fixture(1024, 768);
    let material = EffectMaterial::from_wgsl("Tint", "// tint");
    f.screen.set_blur_mode(BlurMode::None);
    f.screen.set_effect_material(Some(material.clone()));

    f.screen.capture(&f.canvas).unwrap();

    let sequence = f.screen.command_sequence().unwrap();
    assert!(sequence.blits().any(|(_, _, has_material)| has_material));
    assert_eq!(f.screen.effect_material(), Some(material));
}

#[test]
fn allocation_failure_leaves_widget_idle() {
    let f = fixture(1024, 768);
    f.device.fail_allocations.store(true, Ordering::Relaxed);

    let err = f.screen.capture(&f.canvas).unwrap_err();

    assert!(matches!(err, StaticBlurError::TextureAllocation { .. }));
    assert_eq!(f.screen.state(), CaptureState::Idle);
    assert_eq!(f.camera.inner.attached_count(), 0);
    assert_eq!(f.scheduler.pending_count(), 0);
}

#[test]
fn allocation_failure_on_resize_keeps_previous_capture() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    f.scheduler.end_of_frame();
    let published = f.screen.output_texture();

    f.device.fail_allocations.store(true, Ordering::Relaxed);
    f.camera.inner.set_pixel_size(2048, 1536);
    assert!(f.screen.capture(&f.canvas).is_err());

    assert_eq!(f.screen.output_texture(), published);
    assert_eq!(f.screen.pending_release_texture(), None);
    assert_eq!(f.screen.display().texture(), published);
}

// ============================================================================
// Canvas Collaborators
// ============================================================================

#[test]
fn missing_camera_is_a_noop() {
    let _ = env_logger::builder().is_test(true).try_init();
    let device: Arc<dyn RenderDevice> = Arc::new(MockDevice::default());
    let scheduler = Rc::new(FrameScheduler::new());
    let canvas = Canvas::new(Rc::clone(&scheduler), 800.0, 600.0);
    let screen = StaticBlurScreen::new(device);

    assert_eq!(screen.capture(&canvas).unwrap(), CaptureOutcome::NoCamera);
    assert_eq!(screen.state(), CaptureState::Idle);
    assert_eq!(screen.output_texture(), None);
    assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn main_camera_is_used_without_canvas_camera() {
    let device: Arc<dyn RenderDevice> = Arc::new(MockDevice::default());
    let scheduler = Rc::new(FrameScheduler::new());
    let camera = Rc::new(Camera::new(640, 480));
    let main: Rc<dyn CaptureCamera> = camera.clone();
    let canvas = Canvas::new(Rc::clone(&scheduler), 800.0, 600.0).with_main_camera(main);
    let screen = StaticBlurScreen::new(device);

    assert_eq!(screen.capture(&canvas).unwrap(), CaptureOutcome::Scheduled);
    assert_eq!(camera.attached_count(), 1);
}

#[test]
fn keep_canvas_size_matches_root_canvas() {
    let f = fixture(1024, 768);

    f.screen.capture(&f.canvas).unwrap();
    assert_eq!(f.screen.display().size(), (1920.0, 1080.0));

    f.screen.set_keep_canvas_size(false);
    f.canvas.set_root_size(1280.0, 720.0);
    f.screen.capture(&f.canvas).unwrap();
    assert_eq!(f.screen.display().size(), (1920.0, 1080.0));
}

#[test]
fn vertical_flip_is_applied_on_publish() {
    let _ = env_logger::builder().is_test(true).try_init();
    let device: Arc<dyn RenderDevice> = Arc::new(MockDevice::default());
    let scheduler = Rc::new(FrameScheduler::new());
    let camera: Rc<dyn CaptureCamera> = Rc::new(Camera::new(1024, 768));
    let canvas = Canvas::new(Rc::clone(&scheduler), 800.0, 600.0)
        .with_world_camera(camera)
        .with_vertical_flip(true);
    let screen = StaticBlurScreen::new(device);

    screen.capture(&canvas).unwrap();
    assert_eq!(screen.display().uv_rect(), UvRect::FULL);

    scheduler.end_of_frame();
    assert_eq!(screen.display().uv_rect(), UvRect::FLIPPED);
}
