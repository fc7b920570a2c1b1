use std::collections::HashMap;

use wgpu::util::DeviceExt;

use ssr_gpu_shared::shaders::KAWASE_WORKGROUP_SIZE;
use ssr_render::config::{ComputeHandle, ShaderHandle, TargetFormat, TextureHandle};
use ssr_render::draw::{visible_in_queue_order, CompositeDraw, MarchDraw, SubProgram};
use ssr_render::host::{Kernel, KernelBindings, KernelInfo, RenderHost, Surface, TargetId};
use ssr_render::targets::{CameraDescriptor, FilterMode, TargetDesc};

use crate::handle::HandleStore;
use crate::passes::march::{self, SceneDraw};
use crate::passes::{fullscreen, kawase};
use crate::pipeline::{self, KawaseCompute, ShadingProgram, ShadingProgramDescriptor};
use crate::render_targets::{self, RenderTarget};

/// Long-lived GPU objects shared by every frame of the reflection pass.
pub struct ReflectionResources {
    programs: HandleStore<ShadingProgram>,
    computes: HandleStore<KawaseCompute>,
    noise_textures: HandleStore<wgpu::TextureView>,
    march_bgl: wgpu::BindGroupLayout,
    object_bgl: wgpu::BindGroupLayout,
    composite_bgl: wgpu::BindGroupLayout,
    blit_bgl: wgpu::BindGroupLayout,
    blit_pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    point_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    default_noise: wgpu::TextureView,
}

impl ReflectionResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        log::info!("Creating SSR layouts and samplers...");
        Self {
            programs: HandleStore::new(),
            computes: HandleStore::new(),
            noise_textures: HandleStore::new(),
            march_bgl: pipeline::create_march_bind_group_layout(device),
            object_bgl: pipeline::create_object_bind_group_layout(device),
            composite_bgl: pipeline::create_composite_bind_group_layout(device),
            blit_bgl: pipeline::create_blit_bind_group_layout(device),
            blit_pipelines: HashMap::new(),
            point_sampler: render_targets::create_sampler(device, FilterMode::Point),
            linear_sampler: render_targets::create_sampler(device, FilterMode::Bilinear),
            default_noise: render_targets::create_default_noise_texture(device, queue),
        }
    }

    /// Layout the application builds per-object bind groups against.
    pub fn object_layout(&self) -> &wgpu::BindGroupLayout {
        &self.object_bgl
    }

    pub fn register_program(&mut self, device: &wgpu::Device, desc: &ShadingProgramDescriptor<'_>) -> ShaderHandle {
        log::info!("Creating SSR shading program '{}'...", desc.label);
        let program =
            pipeline::create_shading_program(device, desc, &self.march_bgl, &self.object_bgl, &self.composite_bgl);
        ShaderHandle(self.programs.insert(program))
    }

    pub fn unregister_program(&mut self, handle: ShaderHandle) -> bool {
        self.programs.remove(handle.0).is_some()
    }

    /// Blur stage with all three kernels for targets of `format`.
    pub fn register_kawase_compute(&mut self, device: &wgpu::Device, format: TargetFormat) -> ComputeHandle {
        self.register_kawase_kernels(device, format, &Kernel::ALL)
    }

    /// Blur stage with only `kernels`; lookups of the others fail.
    pub fn register_kawase_kernels(
        &mut self,
        device: &wgpu::Device,
        format: TargetFormat,
        kernels: &[Kernel],
    ) -> ComputeHandle {
        log::info!("Creating Kawase compute ({format:?}, {} kernels)...", kernels.len());
        ComputeHandle(self.computes.insert(pipeline::create_kawase_compute(device, format, kernels)))
    }

    pub fn unregister_compute(&mut self, handle: ComputeHandle) -> bool {
        self.computes.remove(handle.0).is_some()
    }

    /// Register a sampled texture for use as march noise. The view keeps the
    /// texture alive until the handle is unregistered.
    pub fn register_noise_texture(&mut self, texture: &wgpu::Texture) -> TextureHandle {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        TextureHandle(self.noise_textures.insert(view))
    }

    pub fn unregister_noise_texture(&mut self, handle: TextureHandle) -> bool {
        self.noise_textures.remove(handle.0).is_some()
    }

    fn blit_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> &wgpu::RenderPipeline {
        let bgl = &self.blit_bgl;
        self.blit_pipelines
            .entry(format)
            .or_insert_with(|| pipeline::create_blit_pipeline(device, bgl, format))
    }

    fn noise_view(&self, handle: Option<TextureHandle>) -> &wgpu::TextureView {
        match handle {
            Some(handle) => match self.noise_textures.get(handle.0) {
                Some(view) => view,
                None => {
                    log::warn!("SSR noise texture {handle:?} is not registered, using default noise");
                    &self.default_noise
                }
            },
            None => &self.default_noise,
        }
    }
}

/// Camera colour and depth the pass reads from and composites into.
/// The colour texture needs `TEXTURE_BINDING | RENDER_ATTACHMENT` and the
/// depth texture `TEXTURE_BINDING`.
pub struct CameraTarget<'a> {
    pub texture: &'a wgpu::Texture,
    pub view: &'a wgpu::TextureView,
    pub depth_view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl CameraTarget<'_> {
    pub fn descriptor(&self) -> CameraDescriptor {
        let size = self.texture.size();
        CameraDescriptor {
            msaa_samples: self.texture.sample_count(),
            ..CameraDescriptor::new(size.width, size.height)
        }
    }
}

fn resolve_view<'t>(
    camera: &'t CameraTarget<'_>,
    targets: &'t HashMap<TargetId, RenderTarget>,
    surface: Surface,
) -> Option<(&'t wgpu::TextureView, wgpu::TextureFormat)> {
    match surface {
        Surface::Camera => Some((camera.view, camera.format)),
        Surface::Target(id) => targets
            .get(&id)
            .map(|rt| (&rt.view, render_targets::texture_format(rt.desc.format))),
    }
}

/// Kernel lookup result for a stage's pipeline table.
fn kernel_info<T>(pipelines: Option<&HashMap<Kernel, T>>, kernel: Kernel) -> Option<KernelInfo> {
    pipelines?.contains_key(&kernel).then_some(KernelInfo {
        thread_group_size: KAWASE_WORKGROUP_SIZE,
    })
}

/// Whether a kernel compiled for `stage_format` may write `target`.
fn kernel_can_write(target: &TargetDesc, stage_format: TargetFormat) -> bool {
    target.random_write && target.format == stage_format
}

/// [`RenderHost`] recording into one wgpu command encoder for one camera.
pub struct WgpuHost<'a> {
    device: &'a wgpu::Device,
    encoder: &'a mut wgpu::CommandEncoder,
    resources: &'a mut ReflectionResources,
    camera: CameraTarget<'a>,
    scene: &'a [SceneDraw<'a>],
    targets: HashMap<TargetId, RenderTarget>,
    next_id: u32,
}

impl<'a> WgpuHost<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        encoder: &'a mut wgpu::CommandEncoder,
        resources: &'a mut ReflectionResources,
        camera: CameraTarget<'a>,
        scene: &'a [SceneDraw<'a>],
    ) -> Self {
        Self {
            device,
            encoder,
            resources,
            camera,
            scene,
            targets: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn camera_descriptor(&self) -> CameraDescriptor {
        self.camera.descriptor()
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    fn uniform_buffer(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }
}

impl RenderHost for WgpuHost<'_> {
    fn acquire_target(&mut self, label: &'static str, desc: &TargetDesc) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        log::trace!(
            "acquire {label} {}x{} {:?} -> {id:?}",
            desc.extent.width,
            desc.extent.height,
            desc.format
        );
        let target = render_targets::create_transient_target(self.device, label, desc);
        self.targets.insert(id, target);
        id
    }

    fn release_target(&mut self, id: TargetId) {
        if self.targets.remove(&id).is_none() {
            log::warn!("SSR release of unknown target {id:?}");
        }
    }

    fn blit(&mut self, source: Surface, dest: Surface) {
        if source == dest {
            log::warn!("SSR blit from {source:?} onto itself skipped");
            return;
        }
        let Some((source_view, _)) = resolve_view(&self.camera, &self.targets, source) else {
            log::warn!("SSR blit source {source:?} is not live");
            return;
        };
        let Some((dest_view, dest_format)) = resolve_view(&self.camera, &self.targets, dest) else {
            log::warn!("SSR blit destination {dest:?} is not live");
            return;
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSR Blit BG"),
            layout: &self.resources.blit_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(source_view) },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.resources.linear_sampler),
                },
            ],
        });
        let pipeline = self.resources.blit_pipeline(self.device, dest_format);
        fullscreen::render_blit(self.encoder, dest_view, pipeline, &bind_group);
    }

    fn has_program(&self, program: ShaderHandle) -> bool {
        self.resources.programs.get(program.0).is_some()
    }

    fn draw_renderers(&mut self, target: TargetId, draw: &MarchDraw) {
        if draw.sub_program != SubProgram::March {
            log::warn!("SSR scene draw requested with {:?}, skipped", draw.sub_program);
            return;
        }
        let Some(program) = self.resources.programs.get(draw.program.0) else {
            log::warn!("SSR shading program {:?} is not registered", draw.program);
            return;
        };
        let (Some(target_rt), Some(scene_color)) = (self.targets.get(&target), self.targets.get(&draw.scene_color))
        else {
            log::warn!("SSR march targets {target:?}/{:?} are not live", draw.scene_color);
            return;
        };
        if target_rt.desc.format != program.reflection_format {
            log::warn!(
                "SSR march target is {:?} but the program renders {:?}, skipped",
                target_rt.desc.format,
                program.reflection_format
            );
            return;
        }

        let uniforms = self.uniform_buffer("SSR March UBO", bytemuck::bytes_of(&draw.uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSR March BG"),
            layout: &self.resources.march_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(self.camera.depth_view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&scene_color.view) },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(self.resources.noise_view(draw.noise_texture)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.resources.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.resources.point_sampler),
                },
            ],
        });

        let visible = visible_in_queue_order(self.scene, draw.layer_mask);
        log::trace!("SSR march: {} of {} renderers visible", visible.len(), self.scene.len());
        march::render_march_pass(self.encoder, &target_rt.view, &program.march, &bind_group, &visible);
    }

    fn draw_fullscreen(&mut self, dest: Surface, draw: &CompositeDraw) {
        if draw.sub_program != SubProgram::Composite {
            log::warn!("SSR full-screen draw requested with {:?}, skipped", draw.sub_program);
            return;
        }
        let Some(program) = self.resources.programs.get(draw.program.0) else {
            log::warn!("SSR shading program {:?} is not registered", draw.program);
            return;
        };
        let Some((dest_view, dest_format)) = resolve_view(&self.camera, &self.targets, dest) else {
            log::warn!("SSR composite destination {dest:?} is not live");
            return;
        };
        if dest_format != program.camera_format {
            log::warn!("SSR composite into {dest_format:?} but the program targets {:?}", program.camera_format);
            return;
        }
        let (Some(scene_color), Some(reflections)) =
            (self.targets.get(&draw.scene_color), self.targets.get(&draw.reflections))
        else {
            log::warn!("SSR composite inputs {:?}/{:?} are not live", draw.scene_color, draw.reflections);
            return;
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSR Composite BG"),
            layout: &self.resources.composite_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&scene_color.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&reflections.view) },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.resources.linear_sampler),
                },
            ],
        });
        fullscreen::render_composite(self.encoder, dest_view, &program.composite, &bind_group);
    }

    fn has_compute(&self, compute: ComputeHandle) -> bool {
        self.resources.computes.get(compute.0).is_some()
    }

    fn find_kernel(&self, compute: ComputeHandle, kernel: Kernel) -> Option<KernelInfo> {
        let stage = self.resources.computes.get(compute.0);
        kernel_info(stage.map(|stage| &stage.pipelines), kernel)
    }

    fn dispatch(&mut self, compute: ComputeHandle, kernel: Kernel, bindings: &KernelBindings, groups: [u32; 3]) {
        let Some(stage) = self.resources.computes.get(compute.0) else {
            log::warn!("Kawase compute {compute:?} is not registered");
            return;
        };
        let Some(pipeline) = stage.pipelines.get(&kernel) else {
            log::warn!("Kawase compute {compute:?} has no {} kernel", kernel.name());
            return;
        };
        let (Some(source), Some(target)) = (self.targets.get(&bindings.source), self.targets.get(&bindings.target))
        else {
            log::warn!("{} targets {:?}/{:?} are not live", kernel.name(), bindings.source, bindings.target);
            return;
        };
        if !kernel_can_write(&target.desc, stage.format) {
            log::warn!(
                "{} target {:?} ({:?}, random write {}) does not fit a {:?} kernel, skipped",
                kernel.name(),
                bindings.target,
                target.desc.format,
                target.desc.random_write,
                stage.format
            );
            return;
        }

        // linear_blend reads the target's previous contents; storage textures
        // are write-only here, so it reads a copy instead.
        let snapshot = if kernel == Kernel::LinearBlend {
            let (texture, view) = render_targets::create_snapshot(self.device, target);
            kawase::snapshot_target(self.encoder, &target.texture, &texture);
            Some((texture, view))
        } else {
            None
        };
        let previous_view = snapshot.as_ref().map_or(&source.view, |(_, view)| view);

        let uniforms = self.uniform_buffer("Kawase UBO", bytemuck::bytes_of(&bindings.uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Kawase BG"),
            layout: &stage.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&source.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&target.view) },
                wgpu::BindGroupEntry { binding: 2, resource: uniforms.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.resources.linear_sampler),
                },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::TextureView(previous_view) },
            ],
        });
        kawase::dispatch_kernel(self.encoder, pipeline, &bind_group, kernel.name(), groups);
    }

    fn push_debug_group(&mut self, label: &str) {
        self.encoder.push_debug_group(label);
    }

    fn pop_debug_group(&mut self) {
        self.encoder.pop_debug_group();
    }
}

impl Drop for WgpuHost<'_> {
    fn drop(&mut self) {
        if !self.targets.is_empty() {
            log::warn!("SSR host dropped with {} live targets", self.targets.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssr_render::targets::Extent;

    fn desc(format: TargetFormat, random_write: bool) -> TargetDesc {
        TargetDesc {
            extent: Extent::new(64, 32),
            format,
            filter: FilterMode::Bilinear,
            random_write,
        }
    }

    #[test]
    fn test_kernel_info_requires_stage_and_kernel() {
        let mut pipelines: HashMap<Kernel, ()> = HashMap::new();
        pipelines.insert(Kernel::DownSample, ());
        pipelines.insert(Kernel::UpSample, ());

        assert_eq!(kernel_info::<()>(None, Kernel::DownSample), None);
        assert_eq!(
            kernel_info(Some(&pipelines), Kernel::DownSample),
            Some(KernelInfo {
                thread_group_size: KAWASE_WORKGROUP_SIZE
            })
        );
        assert_eq!(kernel_info(Some(&pipelines), Kernel::LinearBlend), None);
    }

    #[test]
    fn test_kernel_writes_only_matching_storage_targets() {
        assert!(kernel_can_write(&desc(TargetFormat::Rgba16Float, true), TargetFormat::Rgba16Float));
        assert!(!kernel_can_write(&desc(TargetFormat::Rgba8Unorm, true), TargetFormat::Rgba16Float));
        assert!(!kernel_can_write(&desc(TargetFormat::Rgba16Float, false), TargetFormat::Rgba16Float));
    }
}
