//! March pass: draws the visible scene with the march sub-program into a
//! reflection buffer.

use ssr_render::draw::Renderer;

/// One drawable the host hands to the reflection pass.
pub struct SceneDraw<'a> {
    pub layer: u32,
    pub render_queue: i32,
    pub position_buffer: &'a wgpu::Buffer,
    pub normal_buffer: &'a wgpu::Buffer,
    pub index_buffer: &'a wgpu::Buffer,
    pub index_count: u32,
    /// Bind group against the per-object layout (group 1).
    pub object_bind_group: &'a wgpu::BindGroup,
}

impl Renderer for SceneDraw<'_> {
    fn layer(&self) -> u32 {
        self.layer
    }

    fn render_queue(&self) -> i32 {
        self.render_queue
    }
}

/// Draw `draws` in the given order. The target is cleared to transparent so
/// pixels without a hit carry no reflection.
pub fn render_march_pass(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    march_bind_group: &wgpu::BindGroup,
    draws: &[&SceneDraw<'_>],
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("SSR March Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });

    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, march_bind_group, &[]);

    for draw in draws {
        pass.set_bind_group(1, draw.object_bind_group, &[]);
        pass.set_vertex_buffer(0, draw.position_buffer.slice(..));
        pass.set_vertex_buffer(1, draw.normal_buffer.slice(..));
        pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..draw.index_count, 0, 0..1);
    }
}
