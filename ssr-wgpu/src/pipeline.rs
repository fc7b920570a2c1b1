//! Pipeline and bind group layout creation for the reflection pass.
//! The march and composite programs come from the application; the blit and
//! the Kawase kernels are built from the shared WGSL.

use std::collections::HashMap;

use ssr_gpu_shared::shaders;
use ssr_render::config::TargetFormat;
use ssr_render::host::Kernel;

use crate::render_targets::{storage_format_wgsl, texture_format};

/// Entry points a shading program must export.
pub const MARCH_VERTEX_ENTRY: &str = "vs_march";
pub const MARCH_FRAGMENT_ENTRY: &str = "fs_march";
pub const COMPOSITE_VERTEX_ENTRY: &str = "vs_composite";
pub const COMPOSITE_FRAGMENT_ENTRY: &str = "fs_composite";

fn fullscreen_vertex_state<'a>(module: &'a wgpu::ShaderModule, entry: &'a str) -> wgpu::VertexState<'a> {
    wgpu::VertexState {
        module,
        entry_point: Some(entry),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        buffers: &[],
    }
}

fn fragment_texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn filterable() -> wgpu::TextureSampleType {
    wgpu::TextureSampleType::Float { filterable: true }
}

// ============================================================
// March / composite
// ============================================================

/// March bind group layout (group 0 of the march sub-program):
///   0: uniform MarchUniforms
///   1: texture_depth_2d (camera depth)
///   2: texture_2d<f32>  (camera colour copy)
///   3: texture_2d<f32>  (noise)
///   4: sampler           (tex_sampler)
///   5: sampler           (depth_sampler)
pub fn create_march_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("SSR March BGL"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            fragment_texture_entry(1, wgpu::TextureSampleType::Depth),
            fragment_texture_entry(2, filterable()),
            fragment_texture_entry(3, filterable()),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
        ],
    })
}

/// Per-object layout (group 1 of the march sub-program): one uniform buffer
/// owned by the application (model and view-projection matrices).
pub fn create_object_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("SSR Per-Object BGL"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Composite layout:
///   0: texture_2d<f32> (camera colour copy)
///   1: texture_2d<f32> (blurred reflections)
///   2: sampler
pub fn create_composite_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("SSR Composite BGL"),
        entries: &[
            fragment_texture_entry(0, filterable()),
            fragment_texture_entry(1, filterable()),
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Application-supplied shading program source.
pub struct ShadingProgramDescriptor<'a> {
    pub label: &'a str,
    pub source: &'a str,
    /// Format of the reflection buffers the march sub-program renders into.
    pub reflection_format: TargetFormat,
    /// Format of the camera target the composite sub-program renders into.
    pub camera_format: wgpu::TextureFormat,
}

/// The two sub-programs of the SSR shading program.
pub struct ShadingProgram {
    pub march: wgpu::RenderPipeline,
    pub composite: wgpu::RenderPipeline,
    pub reflection_format: TargetFormat,
    pub camera_format: wgpu::TextureFormat,
}

pub fn create_shading_program(
    device: &wgpu::Device,
    desc: &ShadingProgramDescriptor<'_>,
    march_bgl: &wgpu::BindGroupLayout,
    object_bgl: &wgpu::BindGroupLayout,
    composite_bgl: &wgpu::BindGroupLayout,
) -> ShadingProgram {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    });

    let march_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} March Layout", desc.label)),
        bind_group_layouts: &[march_bgl, object_bgl],
        push_constant_ranges: &[],
    });

    let march = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{} March", desc.label)),
        layout: Some(&march_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some(MARCH_VERTEX_ENTRY),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[
                // location 0: position vec3
                wgpu::VertexBufferLayout {
                    array_stride: 12,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    }],
                },
                // location 1: normal vec3
                wgpu::VertexBufferLayout {
                    array_stride: 12,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 1,
                    }],
                },
            ],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(MARCH_FRAGMENT_ENTRY),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: texture_format(desc.reflection_format),
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    let composite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Composite Layout", desc.label)),
        bind_group_layouts: &[composite_bgl],
        push_constant_ranges: &[],
    });

    let composite = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{} Composite", desc.label)),
        layout: Some(&composite_layout),
        vertex: fullscreen_vertex_state(&module, COMPOSITE_VERTEX_ENTRY),
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(COMPOSITE_FRAGMENT_ENTRY),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.camera_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    ShadingProgram {
        march,
        composite,
        reflection_format: desc.reflection_format,
        camera_format: desc.camera_format,
    }
}

// ============================================================
// Blit
// ============================================================

pub fn create_blit_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("SSR Blit BGL"),
        entries: &[
            fragment_texture_entry(0, filterable()),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Full-screen copy into a target of `output_format`.
pub fn create_blit_pipeline(
    device: &wgpu::Device,
    bgl: &wgpu::BindGroupLayout,
    output_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("SSR Blit"),
        source: wgpu::ShaderSource::Wgsl(shaders::BLIT.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("SSR Blit Layout"),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("SSR Blit ({output_format:?})")),
        layout: Some(&layout),
        vertex: fullscreen_vertex_state(&module, "vs_main"),
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

// ============================================================
// Kawase compute
// ============================================================

/// WGSL entry point of a blur kernel.
pub fn kernel_entry_point(kernel: Kernel) -> &'static str {
    match kernel {
        Kernel::DownSample => "down_sample",
        Kernel::UpSample => "up_sample",
        Kernel::LinearBlend => "linear_blend",
    }
}

/// Kawase layout, shared by all three kernels:
///   0: texture_2d<f32>            (source)
///   1: texture_storage_2d (write) (target)
///   2: uniform KawaseParams
///   3: sampler                    (linear)
///   4: texture_2d<f32>            (previous target contents, linear_blend only)
pub fn create_kawase_bind_group_layout(device: &wgpu::Device, format: TargetFormat) -> wgpu::BindGroupLayout {
    let sampled = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: filterable(),
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Kawase BGL"),
        entries: &[
            sampled(0),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: texture_format(format),
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            sampled(4),
        ],
    })
}

/// Compiled blur stage for one storage format.
pub struct KawaseCompute {
    pub format: TargetFormat,
    pub layout: wgpu::BindGroupLayout,
    pub pipelines: HashMap<Kernel, wgpu::ComputePipeline>,
}

/// Build the kernels in `kernels` from the shared Kawase source.
pub fn create_kawase_compute(device: &wgpu::Device, format: TargetFormat, kernels: &[Kernel]) -> KawaseCompute {
    let source = shaders::kawase_blur_source(storage_format_wgsl(format));
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Kawase Blur"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let layout = create_kawase_bind_group_layout(device, format);
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Kawase Layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipelines = kernels
        .iter()
        .map(|&kernel| {
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.name()),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(kernel_entry_point(kernel)),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            (kernel, pipeline)
        })
        .collect();

    KawaseCompute {
        format,
        layout,
        pipelines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kernel_entry_point_exists_in_shader() {
        let source = shaders::kawase_blur_source("rgba16float");
        for kernel in Kernel::ALL {
            let entry = format!("fn {}(", kernel_entry_point(kernel));
            assert!(source.contains(&entry), "missing {entry}");
        }
    }
}
