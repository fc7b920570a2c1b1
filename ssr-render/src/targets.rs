//! Transient target descriptors for the reflection pass.
//!
//! Everything here is pure computation: descriptors are produced on demand and
//! nothing is allocated until the orchestrator hands them to the host.

use glam::Vec4;

use crate::config::TargetFormat;
use crate::error::{Result, SsrError};

/// Width/height of a 2-D target in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Half size, rounded up per dimension. `halve` of 1 is 1, so a chain of
    /// halvings never reaches zero.
    pub fn halve(self) -> Self {
        Self {
            width: halve_dimension(self.width),
            height: halve_dimension(self.height),
        }
    }

    /// Size after `levels` successive halvings.
    pub fn halved(self, levels: u32) -> Self {
        (0..levels).fold(self, |extent, _| extent.halve())
    }

    /// (width, height, 1/width, 1/height), the layout every size uniform uses.
    pub fn size_params(self) -> Vec4 {
        let w = self.width.max(1) as f32;
        let h = self.height.max(1) as f32;
        Vec4::new(w, h, 1.0 / w, 1.0 / h)
    }

    pub fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Ceiling division by two; zero is lifted to one.
pub fn halve_dimension(n: u32) -> u32 {
    n.div_ceil(2).max(1)
}

/// Texture filtering requested for a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
    Bilinear,
}

/// Everything the host needs to allocate one transient target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub extent: Extent,
    pub format: TargetFormat,
    pub filter: FilterMode,
    /// Compute-writable (storage binding).
    pub random_write: bool,
}

impl TargetDesc {
    pub fn with_extent(self, extent: Extent) -> Self {
        Self { extent, ..self }
    }
}

/// The camera's own target description, as handed over by the host pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraDescriptor {
    pub width: u32,
    pub height: u32,
    pub msaa_samples: u32,
    pub depth_bits: u32,
}

impl CameraDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            msaa_samples: 1,
            depth_bits: 0,
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

/// Target descriptors for one camera.
///
/// MSAA and depth of the camera descriptor are dropped: every transient target
/// is single-sampled and colour-only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourcePlanner {
    extent: Extent,
    format: TargetFormat,
}

impl ResourcePlanner {
    pub fn new(camera: &CameraDescriptor, format: TargetFormat) -> Result<Self> {
        let extent = camera.extent();
        if extent.is_degenerate() {
            return Err(SsrError::DegenerateCamera {
                width: camera.width,
                height: camera.height,
            });
        }
        Ok(Self { extent, format })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// View size uniform: (w, h, 1/w, 1/h).
    pub fn view_size(&self) -> Vec4 {
        self.extent.size_params()
    }

    /// Point-filtered full-resolution copy of the camera colour.
    pub fn color_copy(&self) -> TargetDesc {
        TargetDesc {
            extent: self.extent,
            format: self.format,
            filter: FilterMode::Point,
            random_write: false,
        }
    }

    /// Full-resolution, compute-writable reflection buffer (Odd or Even).
    pub fn reflection_buffer(&self) -> TargetDesc {
        TargetDesc {
            extent: self.extent,
            format: self.format,
            filter: FilterMode::Point,
            random_write: true,
        }
    }

    /// Pyramid descriptor at full size; callers set the extent per level.
    pub fn pyramid_template(&self) -> TargetDesc {
        TargetDesc {
            extent: self.extent,
            format: self.format,
            filter: FilterMode::Bilinear,
            random_write: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_halve_rounds_up() {
        assert_eq!(halve_dimension(1), 1);
        assert_eq!(halve_dimension(2), 1);
        assert_eq!(halve_dimension(3), 2);
        assert_eq!(halve_dimension(135), 68);
        assert_eq!(Extent::new(1, 1).halve(), Extent::new(1, 1));
        assert_eq!(Extent::new(1, 7).halve(), Extent::new(1, 4));
    }

    #[test]
    fn test_planner_descriptors() {
        let camera = CameraDescriptor {
            width: 1920,
            height: 1080,
            msaa_samples: 4,
            depth_bits: 24,
        };
        let planner = ResourcePlanner::new(&camera, TargetFormat::Rgba16Float).unwrap();

        let copy = planner.color_copy();
        assert_eq!(copy.extent, Extent::new(1920, 1080));
        assert_eq!(copy.filter, FilterMode::Point);
        assert!(!copy.random_write);

        let odd = planner.reflection_buffer();
        assert!(odd.random_write);
        assert_eq!(odd.format, TargetFormat::Rgba16Float);

        let pyramid = planner.pyramid_template();
        assert_eq!(pyramid.extent, Extent::new(1920, 1080));
        assert_eq!(pyramid.filter, FilterMode::Bilinear);
        assert!(pyramid.random_write);

        let v = planner.view_size();
        assert_eq!(v.x, 1920.0);
        assert_eq!(v.y, 1080.0);
        assert!((v.z - 1.0 / 1920.0).abs() < 1e-9);
    }

    #[test]
    fn test_planner_rejects_zero_sized_camera() {
        let err = ResourcePlanner::new(&CameraDescriptor::new(0, 720), TargetFormat::Rgba8Unorm);
        assert!(matches!(err, Err(SsrError::DegenerateCamera { width: 0, height: 720 })));
    }

    proptest! {
        #[test]
        fn prop_iterated_halving_matches_direct_ceil(w in 1u32..16384, h in 1u32..16384, k in 0u32..16) {
            let got = Extent::new(w, h).halved(k);
            let div = 1u64 << k;
            let expect_w = ((w as u64 + div - 1) / div) as u32;
            let expect_h = ((h as u64 + div - 1) / div) as u32;
            prop_assert_eq!(got, Extent::new(expect_w, expect_h));
            prop_assert!(got.width >= 1 && got.height >= 1);
        }

        #[test]
        fn prop_halving_never_grows(w in 1u32..u32::MAX, h in 1u32..u32::MAX) {
            let half = Extent::new(w, h).halve();
            prop_assert!(half.width <= w && half.height <= h);
        }
    }
}
