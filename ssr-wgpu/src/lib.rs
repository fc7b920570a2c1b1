//! WebGPU backend for the screen-space reflection pass.
//!
//! [`ReflectionResources`] owns the long-lived pipelines and registries;
//! a [`WgpuHost`] is built per camera per frame around a command encoder and
//! implements [`ssr_render::RenderHost`] on top of them.

mod backend;
mod handle;
mod passes;
mod pipeline;
mod render_targets;

pub use backend::{CameraTarget, ReflectionResources, WgpuHost};
pub use passes::march::SceneDraw;
pub use pipeline::{
    ShadingProgramDescriptor, COMPOSITE_FRAGMENT_ENTRY, COMPOSITE_VERTEX_ENTRY, MARCH_FRAGMENT_ENTRY,
    MARCH_VERTEX_ENTRY,
};
pub use render_targets::{storage_format_wgsl, texture_format};

use ssr_render::{FrameReport, ReflectionFeature, ReflectionVolume};

/// Record one camera's reflection frame into the host's encoder.
pub fn record_reflections(
    feature: &mut ReflectionFeature,
    host: &mut WgpuHost<'_>,
    volume: Option<&ReflectionVolume>,
) -> Option<FrameReport> {
    let camera = host.camera_descriptor();
    let report = feature.render_camera(host, &camera, volume);
    if host.live_targets() != 0 {
        log::warn!("SSR frame left {} targets live", host.live_targets());
    }
    report
}
