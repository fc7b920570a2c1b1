//! Dual Kawase blur pyramid with a continuous radius.
//!
//! A radius `r` maps to `log2(r + 1)` halvings. The integer part decides how
//! deep the pyramid goes; the fractional part blends the deepest upsample with
//! the level above it, so the blur grows smoothly instead of in mip steps.
//!
//! Levels are owned by a single walk ([`TransientScope`]) and each one is
//! released right after its last read on the way back up.

use ssr_gpu_shared::uniforms::KawaseUniforms;

use crate::config::ComputeHandle;
use crate::host::{Kernel, KernelBindings, KernelInfo, MissingResource, RenderHost, TargetId};
use crate::scope::{Transient, TransientScope};
use crate::targets::{Extent, TargetDesc};

/// Tap offset passed to Down/UpSample, in source texels.
pub const BLUR_OFFSET: f32 = 1.0;

pub const LEVEL_LABEL: &str = "_KawaseLevel";
pub const BLEND_LABEL: &str = "_KawaseBlend";

/// How far a radius takes the pyramid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurSchedule {
    pub radius: f32,
    /// `log2(radius + 1)`.
    pub downsample_amount: f32,
    /// `floor(downsample_amount)`.
    pub downsample_count: u32,
    /// `downsample_amount - downsample_count`, in `[0, 1)`.
    pub blend: f32,
}

impl BlurSchedule {
    /// Negative and non-finite radii are treated as 0.
    pub fn from_radius(radius: f32) -> Self {
        let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
        let downsample_amount = (radius + 1.0).log2();
        let whole = downsample_amount.floor();
        Self {
            radius,
            downsample_amount,
            downsample_count: whole as u32,
            blend: downsample_amount - whole,
        }
    }

    /// Pyramid levels created below the input (`downsample_count + 1`).
    pub fn level_count(&self) -> u32 {
        self.downsample_count + 1
    }

    /// Most pyramid targets live at once during a walk.
    pub fn peak_targets(&self) -> usize {
        if self.downsample_count == 0 {
            1
        } else {
            self.downsample_count as usize + 2
        }
    }
}

/// What one blur invocation did.
#[derive(Clone, Debug, PartialEq)]
pub struct BlurReport {
    pub schedule: BlurSchedule,
    pub levels: Vec<Extent>,
    pub peak_transients: usize,
    pub dispatches: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlurOutcome {
    Blurred(BlurReport),
    Skipped(MissingResource),
}

struct Kernels {
    down: KernelInfo,
    up: KernelInfo,
    linear: KernelInfo,
}

impl Kernels {
    fn resolve<H: RenderHost + ?Sized>(host: &H, compute: ComputeHandle) -> Result<Self, MissingResource> {
        if !host.has_compute(compute) {
            return Err(MissingResource::BlurCompute);
        }
        let find = |kernel| host.find_kernel(compute, kernel).ok_or(MissingResource::Kernel(kernel));
        Ok(Self {
            down: find(Kernel::DownSample)?,
            up: find(Kernel::UpSample)?,
            linear: find(Kernel::LinearBlend)?,
        })
    }

    fn info(&self, kernel: Kernel) -> KernelInfo {
        match kernel {
            Kernel::DownSample => self.down,
            Kernel::UpSample => self.up,
            Kernel::LinearBlend => self.linear,
        }
    }
}

/// Thread groups covering `extent` for a kernel of the given group size.
pub fn dispatch_groups(extent: Extent, info: KernelInfo) -> [u32; 3] {
    let [x, y, _] = info.thread_group_size;
    [extent.width.div_ceil(x.max(1)), extent.height.div_ceil(y.max(1)), 1]
}

struct Walk<'h, H: RenderHost + ?Sized> {
    scope: TransientScope<'h, H>,
    compute: ComputeHandle,
    kernels: Kernels,
    dispatches: u32,
}

impl<H: RenderHost + ?Sized> Walk<'_, H> {
    fn dispatch(&mut self, kernel: Kernel, bindings: KernelBindings, groups_for: Extent) {
        let groups = dispatch_groups(groups_for, self.kernels.info(kernel));
        let compute = self.compute;
        self.scope.host().dispatch(compute, kernel, &bindings, groups);
        self.dispatches += 1;
    }

    /// Down/UpSample from `source` into `target`, dispatched over the target.
    fn sample(&mut self, kernel: Kernel, source: (TargetId, Extent), target: (TargetId, Extent)) {
        let bindings = KernelBindings {
            source: source.0,
            target: target.0,
            uniforms: KawaseUniforms {
                source_size: source.1.size_params().to_array(),
                target_size: target.1.size_params().to_array(),
                blur_offset: BLUR_OFFSET,
                _pad1: 0.0,
                _pad2: 0.0,
                _pad3: 0.0,
            },
        };
        self.dispatch(kernel, bindings, target.1);
    }

    /// `target = mix(source, target, blend)`; source and target share an extent.
    fn linear(&mut self, source: TargetId, target: TargetId, extent: Extent, blend: f32) {
        let size = extent.size_params().to_array();
        let bindings = KernelBindings {
            source,
            target,
            uniforms: KawaseUniforms {
                source_size: size,
                target_size: size,
                blur_offset: blend,
                _pad1: 0.0,
                _pad2: 0.0,
                _pad3: 0.0,
            },
        };
        self.dispatch(Kernel::LinearBlend, bindings, extent);
    }

    fn upsample_and_release(&mut self, source: Transient, target: (TargetId, Extent)) {
        self.sample(Kernel::UpSample, (source.id(), source.extent()), target);
        self.scope.release(source);
    }
}

/// Blur `input` into `output` by `radius` pixels.
///
/// `template` describes the full-resolution pyramid target; `input` and
/// `output` must both have its extent and are not released here. Skips when the
/// compute stage or any of its kernels is unbound, leaving `output` untouched.
pub fn blur<H: RenderHost + ?Sized>(
    host: &mut H,
    compute: Option<ComputeHandle>,
    input: TargetId,
    output: TargetId,
    template: &TargetDesc,
    radius: f32,
) -> BlurOutcome {
    let Some(compute) = compute else {
        return BlurOutcome::Skipped(MissingResource::BlurCompute);
    };
    let kernels = match Kernels::resolve(host, compute) {
        Ok(kernels) => kernels,
        Err(missing) => return BlurOutcome::Skipped(missing),
    };

    let schedule = BlurSchedule::from_radius(radius);
    let base = template.extent;
    log::debug!(
        "kawase blur: radius {:.2}, {} downsamples, blend {:.3}",
        schedule.radius,
        schedule.downsample_count,
        schedule.blend
    );

    let mut walk = Walk {
        scope: TransientScope::new(host),
        compute,
        kernels,
        dispatches: 0,
    };

    // Arena of pyramid levels; index k holds level k + 1 (level 0 is `input`).
    let mut levels: Vec<Transient> = Vec::with_capacity(schedule.level_count() as usize);
    let mut previous = (input, base);
    for _ in 0..schedule.level_count() {
        let level = walk.scope.acquire(LEVEL_LABEL, &template.with_extent(previous.1.halve()));
        let current = (level.id(), level.extent());
        walk.sample(Kernel::DownSample, previous, current);
        previous = current;
        levels.push(level);
    }
    let level_extents: Vec<Extent> = levels.iter().map(Transient::extent).collect();

    match (levels.pop(), levels.pop()) {
        (Some(deepest), Some(blend_source)) => {
            // Deepest transition: upsample into a fresh target, then blend it
            // with the unblurred level above by the fractional amount.
            let blend_target = walk.scope.acquire(BLEND_LABEL, &template.with_extent(blend_source.extent()));
            walk.upsample_and_release(deepest, (blend_target.id(), blend_target.extent()));
            walk.linear(blend_source.id(), blend_target.id(), blend_source.extent(), schedule.blend);
            walk.scope.release(blend_source);

            let mut current = blend_target;
            while let Some(next) = levels.pop() {
                let target = (next.id(), next.extent());
                walk.upsample_and_release(current, target);
                current = next;
            }
            walk.upsample_and_release(current, (output, base));
        }
        (Some(only), None) => {
            // Radius below one halving: a single up step, blended against the raw input.
            walk.upsample_and_release(only, (output, base));
            walk.linear(input, output, base, schedule.blend);
        }
        (None, _) => {}
    }

    BlurOutcome::Blurred(BlurReport {
        schedule,
        levels: level_extents,
        peak_transients: walk.scope.peak(),
        dispatches: walk.dispatches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetFormat;
    use crate::recorder::CommandRecorder;
    use crate::targets::{CameraDescriptor, ResourcePlanner};
    use proptest::prelude::*;

    const COMPUTE: ComputeHandle = ComputeHandle(1);

    struct Fixture {
        host: CommandRecorder,
        input: TargetId,
        output: TargetId,
        template: TargetDesc,
    }

    fn fixture(width: u32, height: u32) -> Fixture {
        let mut host = CommandRecorder::new().with_compute(COMPUTE, [8, 8, 1]);
        let planner = ResourcePlanner::new(&CameraDescriptor::new(width, height), TargetFormat::Rgba16Float).unwrap();
        let input = host.acquire_target("_OddBuffer", &planner.reflection_buffer());
        let output = host.acquire_target("_EvenBuffer", &planner.reflection_buffer());
        Fixture {
            host,
            input,
            output,
            template: planner.pyramid_template(),
        }
    }

    fn run(f: &mut Fixture, radius: f32) -> BlurReport {
        match blur(&mut f.host, Some(COMPUTE), f.input, f.output, &f.template, radius) {
            BlurOutcome::Blurred(report) => report,
            other => panic!("blur skipped: {other:?}"),
        }
    }

    #[test]
    fn test_schedule_identity_at_zero() {
        let s = BlurSchedule::from_radius(0.0);
        assert_eq!(s.downsample_count, 0);
        assert_eq!(s.blend, 0.0);
        assert_eq!(s.downsample_amount, 0.0);
    }

    #[test]
    fn test_schedule_radius_33() {
        let s = BlurSchedule::from_radius(33.0);
        assert_eq!(s.downsample_count, 5);
        assert!((s.downsample_amount - 34f32.log2()).abs() < 1e-6);
        assert!((s.blend - 0.087).abs() < 0.01);
    }

    #[test]
    fn test_schedule_exact_powers() {
        assert_eq!(BlurSchedule::from_radius(1.0).downsample_count, 1);
        assert_eq!(BlurSchedule::from_radius(1.0).blend, 0.0);
        assert_eq!(BlurSchedule::from_radius(255.0).downsample_count, 8);
        assert_eq!(BlurSchedule::from_radius(-4.0), BlurSchedule::from_radius(0.0));
        assert_eq!(BlurSchedule::from_radius(f32::NAN).downsample_count, 0);
    }

    #[test]
    fn test_radius_zero_is_one_down_one_up_one_blend() {
        let mut f = fixture(64, 48);
        let report = run(&mut f, 0.0);

        assert_eq!(report.levels, vec![Extent::new(32, 24)]);
        assert_eq!(f.host.dispatches(Kernel::DownSample).len(), 1);
        assert_eq!(f.host.dispatches(Kernel::UpSample).len(), 1);
        let blends = f.host.dispatches(Kernel::LinearBlend);
        assert_eq!(blends.len(), 1);
        assert_eq!(blends[0].0.source, f.input);
        assert_eq!(blends[0].0.target, f.output);
        assert_eq!(blends[0].0.uniforms.blur_offset, 0.0);
        assert_eq!(report.peak_transients, 1);
        assert!(f.host.acquired_with_label(BLEND_LABEL).is_empty());
    }

    #[test]
    fn test_1080p_radius_33_levels() {
        let mut f = fixture(1920, 1080);
        let report = run(&mut f, 33.0);

        let expected = [(960, 540), (480, 270), (240, 135), (120, 68), (60, 34), (30, 17)];
        let expected: Vec<Extent> = expected.iter().map(|&(w, h)| Extent::new(w, h)).collect();
        assert_eq!(report.levels, expected);
        let acquired: Vec<Extent> = f.host.acquired_with_label(LEVEL_LABEL).iter().map(|d| d.extent).collect();
        assert_eq!(acquired, expected);

        // Six downsamples, six upsamples (deepest into the blend target, then
        // four more levels, then into the output) and one blend.
        assert_eq!(f.host.dispatches(Kernel::DownSample).len(), 6);
        assert_eq!(f.host.dispatches(Kernel::UpSample).len(), 6);
        assert_eq!(f.host.dispatches(Kernel::LinearBlend).len(), 1);
        assert_eq!(report.dispatches, 13);

        let blend = f.host.acquired_with_label(BLEND_LABEL);
        assert_eq!(blend.len(), 1);
        assert_eq!(blend[0].extent, Extent::new(60, 34));

        assert_eq!(report.peak_transients, 7);
        assert_eq!(report.peak_transients, report.schedule.peak_targets());
    }

    #[test]
    fn test_walk_releases_every_level_and_never_reads_released() {
        let mut f = fixture(1920, 1080);
        run(&mut f, 33.0);
        // Only the caller's input and output remain.
        assert_eq!(f.host.live_targets(), 2);
        assert!(f.host.invalid_uses().is_empty());
        assert!(f.host.double_releases().is_empty());
    }

    #[test]
    fn test_final_upsample_writes_output_at_full_size() {
        let mut f = fixture(1920, 1080);
        run(&mut f, 8.0);
        let ups = f.host.dispatches(Kernel::UpSample);
        let (last, groups) = ups.last().unwrap();
        assert_eq!(last.target, f.output);
        assert_eq!(last.uniforms.target_size[0], 1920.0);
        assert_eq!(groups, &[240, 135, 1]);
    }

    #[test]
    fn test_first_downsample_reads_input() {
        let mut f = fixture(33, 17);
        run(&mut f, 3.0);
        let downs = f.host.dispatches(Kernel::DownSample);
        assert_eq!(downs[0].0.source, f.input);
        assert_eq!(downs[0].0.uniforms.source_size[0], 33.0);
        assert_eq!(downs[0].0.uniforms.target_size[..2], [17.0, 9.0]);
        assert_eq!(downs[0].1, [3, 2, 1]);
    }

    #[test]
    fn test_tiny_target_stays_one_pixel() {
        let mut f = fixture(1, 1);
        let report = run(&mut f, 255.0);
        assert_eq!(report.levels.len(), 9);
        assert!(report.levels.iter().all(|&e| e == Extent::new(1, 1)));
    }

    #[test]
    fn test_missing_compute_skips() {
        let mut f = fixture(16, 16);
        let before = f.host.commands().len();
        let outcome = blur(&mut f.host, None, f.input, f.output, &f.template, 4.0);
        assert_eq!(outcome, BlurOutcome::Skipped(MissingResource::BlurCompute));
        assert_eq!(f.host.commands().len(), before);
    }

    #[test]
    fn test_unresolvable_compute_skips_as_missing_stage() {
        let mut f = fixture(16, 16);
        let before = f.host.commands().len();
        let outcome = blur(&mut f.host, Some(ComputeHandle(77)), f.input, f.output, &f.template, 4.0);
        assert_eq!(outcome, BlurOutcome::Skipped(MissingResource::BlurCompute));
        assert_eq!(f.host.commands().len(), before);
        assert_eq!(f.host.total_acquired(), 2);
    }

    #[test]
    fn test_missing_kernel_skips() {
        let mut host = CommandRecorder::new().with_kernels(COMPUTE, &[Kernel::DownSample, Kernel::UpSample], [8, 8, 1]);
        let planner = ResourcePlanner::new(&CameraDescriptor::new(8, 8), TargetFormat::Rgba8Unorm).unwrap();
        let outcome = blur(&mut host, Some(COMPUTE), TargetId(0), TargetId(1), &planner.pyramid_template(), 4.0);
        assert_eq!(outcome, BlurOutcome::Skipped(MissingResource::Kernel(Kernel::LinearBlend)));
        assert_eq!(host.total_acquired(), 0);
    }

    #[test]
    fn test_dispatch_groups_round_up() {
        let info = KernelInfo { thread_group_size: [8, 8, 1] };
        assert_eq!(dispatch_groups(Extent::new(30, 17), info), [4, 3, 1]);
        assert_eq!(dispatch_groups(Extent::new(1, 1), info), [1, 1, 1]);
    }

    proptest! {
        #[test]
        fn prop_schedule_matches_log2(radius in 0.0f32..=255.0) {
            let s = BlurSchedule::from_radius(radius);
            let amount = (radius + 1.0).log2();
            prop_assert_eq!(s.downsample_count, amount.floor() as u32);
            prop_assert!(s.blend >= 0.0 && s.blend < 1.0);
        }

        #[test]
        fn prop_peak_and_cleanup(w in 1u32..4096, h in 1u32..4096, radius in 0.0f32..=255.0) {
            let mut f = fixture(w, h);
            let report = run(&mut f, radius);
            prop_assert_eq!(report.peak_transients, report.schedule.peak_targets());
            prop_assert!(report.peak_transients <= report.schedule.downsample_count as usize + 2);
            prop_assert_eq!(f.host.live_targets(), 2);
            prop_assert!(f.host.invalid_uses().is_empty());
            for pair in report.levels.windows(2) {
                prop_assert!(pair[1].width <= pair[0].width && pair[1].height <= pair[0].height);
            }
        }
    }
}
