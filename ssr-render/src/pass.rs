//! Per-frame orchestration of the reflection pass.
//!
//! `on_camera_setup` acquires the frame buffers, `execute` records
//! march → blur → composite, and `on_camera_cleanup` releases the frame
//! buffers. Cleanup is unconditional and idempotent, whatever the earlier
//! stages did.

use crate::config::{PassEvent, PassSettings};
use crate::draw::{CompositeDraw, SubProgram};
use crate::error::Result;
use crate::host::{MissingResource, RenderHost, StageOutcome, Surface, TargetId};
use crate::kawase::{self, BlurOutcome, BlurReport};
use crate::marcher::MarchDriver;
use crate::targets::{CameraDescriptor, ResourcePlanner};

pub const COLOR_COPY_LABEL: &str = "_CameraColorTexture";
pub const ODD_BUFFER_LABEL: &str = "_OddBuffer";
pub const EVEN_BUFFER_LABEL: &str = "_EvenBuffer";

/// Where the pass is within the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Configured,
    MarchingDone,
    Blurred,
    Composited,
}

/// Frame-scoped buffers, alive from camera setup to camera cleanup.
#[derive(Debug)]
struct FrameTargets {
    planner: ResourcePlanner,
    /// Copy of the camera colour taken at the start of `execute`.
    color_copy: TargetId,
    /// March output; blur input.
    odd: TargetId,
    /// Blur output; composite input.
    even: TargetId,
}

/// What `execute` recorded for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub march: StageOutcome,
    pub blur: StageOutcome,
    pub composite: StageOutcome,
    pub blur_report: Option<BlurReport>,
}

pub struct ReflectionPass {
    settings: PassSettings,
    marcher: MarchDriver,
    state: PassState,
    frame: Option<FrameTargets>,
}

impl ReflectionPass {
    /// Settings are snapped into their valid ranges.
    pub fn new(settings: PassSettings) -> Self {
        Self::with_marcher(settings, MarchDriver::new())
    }

    pub fn with_marcher(settings: PassSettings, marcher: MarchDriver) -> Self {
        Self {
            settings: settings.clamped(),
            marcher,
            state: PassState::Idle,
            frame: None,
        }
    }

    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    pub fn event(&self) -> PassEvent {
        self.settings.pass_event
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    fn transition(&mut self, next: PassState) {
        log::trace!("ssr pass: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Compute descriptors for `camera` and acquire the frame buffers.
    ///
    /// A camera with a zero dimension is rejected before anything is acquired.
    pub fn on_camera_setup<H: RenderHost + ?Sized>(&mut self, host: &mut H, camera: &CameraDescriptor) -> Result<()> {
        // A previous frame that never reached cleanup must not keep its buffers.
        self.on_camera_cleanup(host);

        let planner = ResourcePlanner::new(camera, self.settings.target_format)?;
        let color_copy = host.acquire_target(COLOR_COPY_LABEL, &planner.color_copy());
        let odd = host.acquire_target(ODD_BUFFER_LABEL, &planner.reflection_buffer());
        let even = host.acquire_target(EVEN_BUFFER_LABEL, &planner.reflection_buffer());
        self.frame = Some(FrameTargets {
            planner,
            color_copy,
            odd,
            even,
        });
        self.transition(PassState::Configured);
        Ok(())
    }

    /// Record march → blur → composite. Does nothing unless configured.
    pub fn execute<H: RenderHost + ?Sized>(&mut self, host: &mut H) -> Option<FrameReport> {
        let frame = match (&self.frame, self.state) {
            (Some(frame), PassState::Configured) => (frame.planner, frame.color_copy, frame.odd, frame.even),
            _ => {
                log::warn!("ssr pass executed in state {:?}; skipping", self.state);
                return None;
            }
        };
        let (planner, color_copy, odd, even) = frame;

        host.push_debug_group(&self.settings.profiler_tag);
        host.blit(Surface::Camera, Surface::Target(color_copy));

        let march = self
            .marcher
            .record(host, &self.settings, planner.view_size(), odd, color_copy);
        self.transition(PassState::MarchingDone);

        let (blur, blur_report) = match kawase::blur(
            host,
            self.settings.blur_shader,
            odd,
            even,
            &planner.pyramid_template(),
            self.settings.radius(),
        ) {
            BlurOutcome::Blurred(report) => (StageOutcome::Executed, Some(report)),
            BlurOutcome::Skipped(missing) => {
                log::warn!("ssr blur skipped ({missing:?}); passing reflections through unblurred");
                host.blit(Surface::Target(odd), Surface::Target(even));
                (StageOutcome::Skipped(missing), None)
            }
        };
        self.transition(PassState::Blurred);

        let composite = match self.settings.shader.filter(|&p| host.has_program(p)) {
            Some(program) => {
                let draw = CompositeDraw {
                    program,
                    sub_program: SubProgram::Composite,
                    scene_color: color_copy,
                    reflections: even,
                };
                host.draw_fullscreen(Surface::Camera, &draw);
                StageOutcome::Executed
            }
            None => {
                log::warn!("ssr composite skipped: no shading program bound");
                StageOutcome::Skipped(MissingResource::ShadingProgram)
            }
        };
        self.transition(PassState::Composited);
        host.pop_debug_group();

        Some(FrameReport {
            march,
            blur,
            composite,
            blur_report,
        })
    }

    /// Release the frame buffers. Safe to call in any state, any number of times.
    pub fn on_camera_cleanup<H: RenderHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(frame) = self.frame.take() {
            host.release_target(frame.odd);
            host.release_target(frame.even);
            host.release_target(frame.color_copy);
        }
        if self.state != PassState::Idle {
            self.transition(PassState::Idle);
        }
    }

    /// Setup, execute and cleanup for one camera.
    ///
    /// A degenerate camera skips the frame with a warning; nothing is acquired.
    pub fn render_frame<H: RenderHost + ?Sized>(&mut self, host: &mut H, camera: &CameraDescriptor) -> Option<FrameReport> {
        if let Err(e) = self.on_camera_setup(host, camera) {
            log::warn!("ssr pass skipped: {e}");
            return None;
        }
        let report = self.execute(host);
        self.on_camera_cleanup(host);
        report
    }
}
