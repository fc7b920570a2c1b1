//! Pass settings: the configuration surface of the reflection feature.
//!
//! Defaults match the shipped feature asset; ranges match the editor sliders.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SsrError};

/// Opaque reference to the application's SSR shading program
/// (sub-program 0 = march, 1 = composite).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShaderHandle(pub u64);

/// Opaque reference to the compute stage exposing the Kawase kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputeHandle(pub u64);

/// Opaque reference to a noise texture used to jitter march start offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureHandle(pub u64);

/// When in the frame the pass is injected. Ordering follows [`PassEvent::order`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassEvent {
    BeforeRendering,
    BeforeRenderingOpaques,
    AfterRenderingOpaques,
    BeforeRenderingSkybox,
    AfterRenderingSkybox,
    BeforeRenderingTransparents,
    #[default]
    AfterRenderingTransparents,
    BeforeRenderingPostProcessing,
    AfterRenderingPostProcessing,
    AfterRendering,
}

impl PassEvent {
    pub fn order(self) -> u32 {
        match self {
            PassEvent::BeforeRendering => 0,
            PassEvent::BeforeRenderingOpaques => 250,
            PassEvent::AfterRenderingOpaques => 300,
            PassEvent::BeforeRenderingSkybox => 350,
            PassEvent::AfterRenderingSkybox => 400,
            PassEvent::BeforeRenderingTransparents => 450,
            PassEvent::AfterRenderingTransparents => 500,
            PassEvent::BeforeRenderingPostProcessing => 550,
            PassEvent::AfterRenderingPostProcessing => 600,
            PassEvent::AfterRendering => 1000,
        }
    }
}

/// Pixel format of the reflection buffers and the blur pyramid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    /// 8-bit UNORM RGBA.
    Rgba8Unorm,
    /// Half-float RGBA (HDR).
    #[default]
    Rgba16Float,
}

/// Bitmask of scene layers (bit `n` selects layer `n`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(u32::MAX);
    pub const NONE: LayerMask = LayerMask(0);

    pub fn from_layers(layers: &[u32]) -> Self {
        LayerMask(layers.iter().filter(|&&l| l < 32).fold(0, |mask, &l| mask | (1 << l)))
    }

    pub fn contains(self, layer: u32) -> bool {
        layer < 32 && self.0 & (1 << layer) != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::ALL
    }
}

/// Full parameter set of the reflection pass. Immutable for the duration of a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassSettings {
    /// Debug-group label; cosmetic only.
    pub profiler_tag: String,
    pub pass_event: PassEvent,
    pub shader: Option<ShaderHandle>,
    pub blur_shader: Option<ComputeHandle>,
    pub noise_texture: Option<TextureHandle>,

    pub thickness: f32,
    pub max_distance: f32,
    pub step_count: u32,
    pub binary_count: u32,
    pub step_size: f32,
    pub roughness: f32,
    pub blur_intensity: f32,
    pub blur_max_radius: f32,

    pub layer_mask: LayerMask,
    pub target_format: TargetFormat,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            profiler_tag: "SSR".to_string(),
            pass_event: PassEvent::default(),
            shader: None,
            blur_shader: None,
            noise_texture: None,
            thickness: 0.01,
            max_distance: 100.0,
            step_count: 32,
            binary_count: 4,
            step_size: 1.0,
            roughness: 0.0,
            blur_intensity: 1.0,
            blur_max_radius: 32.0,
            layer_mask: LayerMask::ALL,
            target_format: TargetFormat::default(),
        }
    }
}

pub const THICKNESS_RANGE: (f32, f32) = (0.0, 0.1);
pub const MAX_DISTANCE_RANGE: (f32, f32) = (0.0, 1000.0);
pub const STEP_COUNT_RANGE: (u32, u32) = (1, 64);
pub const BINARY_COUNT_RANGE: (u32, u32) = (1, 16);
pub const STEP_SIZE_RANGE: (f32, f32) = (1.0, 10.0);
pub const ROUGHNESS_RANGE: (f32, f32) = (0.0, 1.0);
pub const BLUR_INTENSITY_RANGE: (f32, f32) = (0.0, 1.0);
pub const BLUR_MAX_RADIUS_RANGE: (f32, f32) = (0.0, 255.0);

fn check(name: &'static str, value: f32, (min, max): (f32, f32)) -> Result<()> {
    // NaN fails both comparisons, so test for containment instead.
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SsrError::SettingOutOfRange { name, value, min, max })
    }
}

fn check_count(name: &'static str, value: u32, (min, max): (u32, u32)) -> Result<()> {
    check(name, value as f32, (min as f32, max as f32))
}

impl PassSettings {
    /// Parse a JSON settings document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: PassSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Blur radius in pixels at full resolution.
    pub fn radius(&self) -> f32 {
        self.blur_intensity * self.blur_max_radius
    }

    /// Report the first field outside its range.
    pub fn validate(&self) -> Result<()> {
        check("thickness", self.thickness, THICKNESS_RANGE)?;
        check("max_distance", self.max_distance, MAX_DISTANCE_RANGE)?;
        check_count("step_count", self.step_count, STEP_COUNT_RANGE)?;
        check_count("binary_count", self.binary_count, BINARY_COUNT_RANGE)?;
        check("step_size", self.step_size, STEP_SIZE_RANGE)?;
        check("roughness", self.roughness, ROUGHNESS_RANGE)?;
        check("blur_intensity", self.blur_intensity, BLUR_INTENSITY_RANGE)?;
        check("blur_max_radius", self.blur_max_radius, BLUR_MAX_RADIUS_RANGE)?;
        Ok(())
    }

    /// Copy with every numeric field snapped into its range, like an editor slider.
    /// NaN snaps to the lower bound.
    pub fn clamped(&self) -> Self {
        fn snap(value: f32, (min, max): (f32, f32)) -> f32 {
            if value.is_nan() {
                min
            } else {
                value.clamp(min, max)
            }
        }

        Self {
            thickness: snap(self.thickness, THICKNESS_RANGE),
            max_distance: snap(self.max_distance, MAX_DISTANCE_RANGE),
            step_count: self.step_count.clamp(STEP_COUNT_RANGE.0, STEP_COUNT_RANGE.1),
            binary_count: self.binary_count.clamp(BINARY_COUNT_RANGE.0, BINARY_COUNT_RANGE.1),
            step_size: snap(self.step_size, STEP_SIZE_RANGE),
            roughness: snap(self.roughness, ROUGHNESS_RANGE),
            blur_intensity: snap(self.blur_intensity, BLUR_INTENSITY_RANGE),
            blur_max_radius: snap(self.blur_max_radius, BLUR_MAX_RADIUS_RANGE),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = PassSettings::default();
        s.validate().unwrap();
        assert_eq!(s.profiler_tag, "SSR");
        assert_eq!(s.pass_event, PassEvent::AfterRenderingTransparents);
        assert_eq!(s.radius(), 32.0);
    }

    #[test]
    fn test_validate_reports_field() {
        let s = PassSettings {
            step_count: 0,
            ..Default::default()
        };
        match s.validate() {
            Err(SsrError::SettingOutOfRange { name, .. }) => assert_eq!(name, "step_count"),
            other => panic!("expected out of range, got {other:?}"),
        }

        let s = PassSettings {
            roughness: f32::NAN,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_clamped_snaps_into_range() {
        let s = PassSettings {
            thickness: 0.5,
            step_count: 200,
            binary_count: 0,
            blur_max_radius: -3.0,
            roughness: f32::NAN,
            ..Default::default()
        }
        .clamped();
        assert_eq!(s.thickness, 0.1);
        assert_eq!(s.step_count, 64);
        assert_eq!(s.binary_count, 1);
        assert_eq!(s.blur_max_radius, 0.0);
        assert_eq!(s.roughness, 0.0);
        s.validate().unwrap();
    }

    #[test]
    fn test_from_json_partial_document() {
        let s = PassSettings::from_json(
            r#"{ "step_count": 16, "blur_intensity": 0.5, "layer_mask": 5, "shader": 7 }"#,
        )
        .unwrap();
        assert_eq!(s.step_count, 16);
        assert_eq!(s.radius(), 16.0);
        assert_eq!(s.shader, Some(ShaderHandle(7)));
        assert!(s.layer_mask.contains(0));
        assert!(!s.layer_mask.contains(1));
        assert!(s.layer_mask.contains(2));
        assert_eq!(s.max_distance, 100.0);
    }

    #[test]
    fn test_from_json_rejects_out_of_range() {
        let err = PassSettings::from_json(r#"{ "max_distance": 5000.0 }"#).unwrap_err();
        assert!(matches!(err, SsrError::SettingOutOfRange { name: "max_distance", .. }));
        assert!(matches!(PassSettings::from_json("{"), Err(SsrError::Settings(_))));
    }

    #[test]
    fn test_layer_mask() {
        let mask = LayerMask::from_layers(&[0, 3, 40]);
        assert_eq!(mask, LayerMask(0b1001));
        assert!(!mask.contains(40));
        assert!(LayerMask::ALL.contains(31));
        assert!(!LayerMask::NONE.contains(0));
    }

    #[test]
    fn test_pass_event_order() {
        assert!(PassEvent::AfterRenderingOpaques.order() < PassEvent::AfterRenderingTransparents.order());
        assert!(PassEvent::AfterRenderingTransparents.order() < PassEvent::BeforeRenderingPostProcessing.order());
    }
}
