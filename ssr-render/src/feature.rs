//! Feature registration: decides per camera whether the pass runs at all.

use crate::config::{PassEvent, PassSettings};
use crate::host::RenderHost;
use crate::pass::{FrameReport, ReflectionPass};
use crate::targets::CameraDescriptor;

/// Per-camera override resolved by the host's volume system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReflectionVolume {
    pub enable: bool,
}

/// Owns the reflection pass and gates it on the camera's volume.
pub struct ReflectionFeature {
    pass: ReflectionPass,
}

impl ReflectionFeature {
    pub fn new(settings: PassSettings) -> Self {
        Self::from_pass(ReflectionPass::new(settings))
    }

    pub fn from_pass(pass: ReflectionPass) -> Self {
        log::info!(
            "SSR feature created (event {:?}, radius {:.1})",
            pass.event(),
            pass.settings().radius()
        );
        Self { pass }
    }

    pub fn event(&self) -> PassEvent {
        self.pass.event()
    }

    /// The pass to enqueue for this camera, or `None` when the volume is
    /// missing or disabled.
    pub fn add_render_passes(&mut self, volume: Option<&ReflectionVolume>) -> Option<&mut ReflectionPass> {
        match volume {
            Some(v) if v.enable => Some(&mut self.pass),
            _ => None,
        }
    }

    /// Run the whole frame for one camera if its volume enables the feature.
    /// A disabled camera touches no resources.
    pub fn render_camera<H: RenderHost + ?Sized>(
        &mut self,
        host: &mut H,
        camera: &CameraDescriptor,
        volume: Option<&ReflectionVolume>,
    ) -> Option<FrameReport> {
        self.add_render_passes(volume)?.render_frame(host, camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::CommandRecorder;

    #[test]
    fn test_enqueue_only_when_enabled() {
        let mut feature = ReflectionFeature::new(PassSettings::default());
        assert!(feature.add_render_passes(None).is_none());
        assert!(feature.add_render_passes(Some(&ReflectionVolume { enable: false })).is_none());
        assert!(feature.add_render_passes(Some(&ReflectionVolume { enable: true })).is_some());
    }

    #[test]
    fn test_event_comes_from_settings() {
        let feature = ReflectionFeature::new(PassSettings {
            pass_event: PassEvent::BeforeRenderingPostProcessing,
            ..Default::default()
        });
        assert_eq!(feature.event(), PassEvent::BeforeRenderingPostProcessing);
    }

    #[test]
    fn test_disabled_camera_records_nothing() {
        let mut host = CommandRecorder::new();
        let mut feature = ReflectionFeature::new(PassSettings::default());
        let report = feature.render_camera(&mut host, &CameraDescriptor::new(128, 128), Some(&ReflectionVolume::default()));
        assert!(report.is_none());
        assert!(host.commands().is_empty());
    }
}
