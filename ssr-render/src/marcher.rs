//! Drives the external ray-march sub-program.
//!
//! The march math lives in the application's shading program; this module only
//! fills its uniforms and records the scene draw into the Odd buffer.

use glam::Vec4;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use ssr_gpu_shared::uniforms::{MarchUniforms, MARCH_FLAG_BINARY_SEARCH, MARCH_FLAG_POTENTIAL_HIT};

use crate::config::PassSettings;
use crate::draw::{MarchDraw, SortingCriteria, SubProgram};
use crate::host::{MissingResource, RenderHost, StageOutcome, TargetId};

pub struct MarchDriver {
    rng: SmallRng,
}

impl MarchDriver {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic jitter sequence, for reproducible captures.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniform block for this frame. Draws a fresh jitter index in `[0, step_count)`.
    pub fn uniforms(&mut self, settings: &PassSettings, view_size: Vec4) -> MarchUniforms {
        let step_count = settings.step_count.max(1);
        MarchUniforms {
            view_size: view_size.to_array(),
            step_count: step_count as f32,
            binary_count: settings.binary_count as f32,
            step_size: settings.step_size,
            thickness: settings.thickness,
            max_distance: settings.max_distance,
            roughness: settings.roughness,
            random_num: self.rng.gen_range(0..step_count) as f32,
            flags: MARCH_FLAG_BINARY_SEARCH | MARCH_FLAG_POTENTIAL_HIT,
        }
    }

    /// Record the march draw into `target`. Skips when the shading program is unbound.
    pub fn record<H: RenderHost + ?Sized>(
        &mut self,
        host: &mut H,
        settings: &PassSettings,
        view_size: Vec4,
        target: TargetId,
        scene_color: TargetId,
    ) -> StageOutcome {
        let Some(program) = settings.shader.filter(|&p| host.has_program(p)) else {
            log::warn!("SSR march skipped: no shading program bound");
            return StageOutcome::Skipped(MissingResource::ShadingProgram);
        };

        let draw = MarchDraw {
            program,
            sub_program: SubProgram::March,
            layer_mask: settings.layer_mask,
            sorting: SortingCriteria::RenderQueue,
            uniforms: self.uniforms(settings, view_size),
            noise_texture: settings.noise_texture,
            scene_color,
        };
        host.draw_renderers(target, &draw);
        StageOutcome::Executed
    }
}

impl Default for MarchDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayerMask, ShaderHandle, TargetFormat, TextureHandle};
    use crate::targets::{CameraDescriptor, ResourcePlanner};
    use crate::recorder::{Command, CommandRecorder};

    #[test]
    fn test_uniforms_carry_settings() {
        let settings = PassSettings {
            step_count: 8,
            binary_count: 3,
            thickness: 0.05,
            ..Default::default()
        };
        let mut driver = MarchDriver::with_seed(7);
        let view = Vec4::new(640.0, 480.0, 1.0 / 640.0, 1.0 / 480.0);
        for _ in 0..64 {
            let u = driver.uniforms(&settings, view);
            assert_eq!(u.view_size, view.to_array());
            assert_eq!(u.step_count, 8.0);
            assert_eq!(u.binary_count, 3.0);
            assert_eq!(u.thickness, 0.05);
            assert!(u.random_num >= 0.0 && u.random_num < 8.0);
            assert_eq!(u.random_num.fract(), 0.0);
            assert!(u.binary_search() && u.potential_hit());
        }
    }

    #[test]
    fn test_single_step_jitter_is_zero() {
        let settings = PassSettings {
            step_count: 1,
            ..Default::default()
        };
        let mut driver = MarchDriver::with_seed(1);
        assert_eq!(driver.uniforms(&settings, Vec4::ONE).random_num, 0.0);
    }

    #[test]
    fn test_record_draws_into_target() {
        let settings = PassSettings {
            shader: Some(ShaderHandle(1)),
            noise_texture: Some(TextureHandle(9)),
            layer_mask: LayerMask(0b10),
            ..Default::default()
        };
        let mut host = CommandRecorder::new().with_program(ShaderHandle(1));
        let planner = ResourcePlanner::new(&CameraDescriptor::new(4, 4), TargetFormat::Rgba16Float).unwrap();
        let color = host.acquire_target("color", &planner.color_copy());
        let odd = host.acquire_target("odd", &planner.reflection_buffer());

        let outcome = MarchDriver::with_seed(3).record(&mut host, &settings, Vec4::ONE, odd, color);
        assert_eq!(outcome, StageOutcome::Executed);

        let draw = host
            .commands()
            .iter()
            .find_map(|c| match c {
                Command::DrawRenderers { target, draw } => Some((*target, *draw)),
                _ => None,
            })
            .unwrap();
        assert_eq!(draw.0, odd);
        assert_eq!(draw.1.sub_program, SubProgram::March);
        assert_eq!(draw.1.layer_mask, LayerMask(0b10));
        assert_eq!(draw.1.noise_texture, Some(TextureHandle(9)));
        assert_eq!(draw.1.scene_color, color);
        assert!(host.invalid_uses().is_empty());
    }

    #[test]
    fn test_record_skips_without_program() {
        let settings = PassSettings {
            shader: Some(ShaderHandle(1)),
            ..Default::default()
        };
        // Handle set but the host cannot resolve it.
        let mut host = CommandRecorder::new();
        let outcome = MarchDriver::with_seed(3).record(&mut host, &settings, Vec4::ONE, TargetId(0), TargetId(1));
        assert_eq!(outcome, StageOutcome::Skipped(MissingResource::ShadingProgram));
        assert!(host.commands().is_empty());
    }
}
