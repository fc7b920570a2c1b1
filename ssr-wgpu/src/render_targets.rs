//! Texture creation for the reflection pass: transient targets and the default noise texture.

use ssr_render::config::TargetFormat;
use ssr_render::targets::{FilterMode, TargetDesc};

/// wgpu format backing a [`TargetFormat`].
pub fn texture_format(format: TargetFormat) -> wgpu::TextureFormat {
    match format {
        TargetFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TargetFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

/// WGSL storage texel format for a [`TargetFormat`].
pub fn storage_format_wgsl(format: TargetFormat) -> &'static str {
    match format {
        TargetFormat::Rgba8Unorm => "rgba8unorm",
        TargetFormat::Rgba16Float => "rgba16float",
    }
}

/// A transient colour target and its descriptor.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub desc: TargetDesc,
}

/// Usage flags for a transient target.
pub fn target_usage(desc: &TargetDesc) -> wgpu::TextureUsages {
    let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
        | wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::COPY_SRC
        | wgpu::TextureUsages::COPY_DST;
    if desc.random_write {
        usage | wgpu::TextureUsages::STORAGE_BINDING
    } else {
        usage
    }
}

/// Create a single-sampled, colour-only transient target.
pub fn create_transient_target(device: &wgpu::Device, label: &str, desc: &TargetDesc) -> RenderTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: desc.extent.width,
            height: desc.extent.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: texture_format(desc.format),
        usage: target_usage(desc),
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    RenderTarget {
        texture,
        view,
        desc: *desc,
    }
}

/// Snapshot texture with the same size and format as `target`, for kernels
/// that read the texture they write.
pub fn create_snapshot(device: &wgpu::Device, target: &RenderTarget) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Kawase Blend Snapshot"),
        size: target.texture.size(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: target.texture.format(),
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Sampler matching a target's filter mode.
pub fn create_sampler(device: &wgpu::Device, filter: FilterMode) -> wgpu::Sampler {
    let (label, mode) = match filter {
        FilterMode::Point => ("SSR Point Sampler", wgpu::FilterMode::Nearest),
        FilterMode::Bilinear => ("SSR Linear Sampler", wgpu::FilterMode::Linear),
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: mode,
        min_filter: mode,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// 4x4 noise texture used when no noise texture is bound.
/// Deterministic so captures are reproducible.
pub fn create_default_noise_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let mut noise_data = Vec::with_capacity(4 * 4 * 4);
    // Interleaved gradient noise, one value per texel, replicated into RGB.
    for y in 0..4u32 {
        for x in 0..4u32 {
            let v = (52.982_918 * (0.067_110_56 * x as f32 + 0.005_837_15 * y as f32).fract()).fract();
            let byte = (v * 255.0) as u8;
            noise_data.extend_from_slice(&[byte, byte, byte, 255]);
        }
    }

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("SSR Default Noise"),
        size: wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &noise_data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * 4),
            rows_per_image: Some(4),
        },
        wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
    );

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssr_render::targets::Extent;

    #[test]
    fn test_format_mapping_agrees_with_wgsl_names() {
        for format in [TargetFormat::Rgba8Unorm, TargetFormat::Rgba16Float] {
            let wgsl = storage_format_wgsl(format);
            let debug = format!("{:?}", texture_format(format)).to_lowercase();
            assert_eq!(debug, wgsl);
        }
    }

    #[test]
    fn test_storage_usage_only_for_random_write() {
        let desc = TargetDesc {
            extent: Extent::new(8, 8),
            format: TargetFormat::Rgba16Float,
            filter: FilterMode::Point,
            random_write: false,
        };
        assert!(!target_usage(&desc).contains(wgpu::TextureUsages::STORAGE_BINDING));
        let desc = TargetDesc {
            random_write: true,
            ..desc
        };
        assert!(target_usage(&desc).contains(wgpu::TextureUsages::STORAGE_BINDING));
        assert!(target_usage(&desc).contains(wgpu::TextureUsages::COPY_SRC));
    }
}
