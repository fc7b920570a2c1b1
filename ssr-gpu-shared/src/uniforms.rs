use bytemuck::{Pod, Zeroable};

/// Bit set in [`MarchUniforms::flags`] when binary-search hit refinement is enabled.
pub const MARCH_FLAG_BINARY_SEARCH: u32 = 1 << 0;
/// Bit set in [`MarchUniforms::flags`] when potential (unconfirmed) hits are kept.
pub const MARCH_FLAG_POTENTIAL_HIT: u32 = 1 << 1;

/// Ray-march parameters: matches the march sub-program's group 0, binding 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MarchUniforms {
    /// (width, height, 1/width, 1/height) of the reflection buffer.
    pub view_size: [f32; 4],
    pub step_count: f32,
    pub binary_count: f32,
    pub step_size: f32,
    pub thickness: f32,
    pub max_distance: f32,
    pub roughness: f32,
    /// Per-frame jitter index in `[0, step_count)`.
    pub random_num: f32,
    pub flags: u32,
}

impl MarchUniforms {
    pub fn binary_search(&self) -> bool {
        self.flags & MARCH_FLAG_BINARY_SEARCH != 0
    }

    pub fn potential_hit(&self) -> bool {
        self.flags & MARCH_FLAG_POTENTIAL_HIT != 0
    }
}

/// Dual Kawase kernel parameters: matches kawase_blur.wgsl group 0, binding 2.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct KawaseUniforms {
    /// (width, height, 1/width, 1/height) of the texture being read.
    pub source_size: [f32; 4],
    /// (width, height, 1/width, 1/height) of the texture being written.
    pub target_size: [f32; 4],
    /// Tap offset for Down/UpSample, blend weight for LinearBlend.
    pub blur_offset: f32,
    pub _pad1: f32,
    pub _pad2: f32,
    pub _pad3: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<MarchUniforms>(), 48);
        assert_eq!(std::mem::size_of::<KawaseUniforms>(), 48);
    }

    #[test]
    fn test_march_flags() {
        let u = MarchUniforms {
            flags: MARCH_FLAG_POTENTIAL_HIT,
            ..Zeroable::zeroed()
        };
        assert!(!u.binary_search());
        assert!(u.potential_hit());
    }
}
