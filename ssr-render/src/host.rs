//! The seam between the reflection pass and the host rendering pipeline.
//!
//! The pass never touches GPU objects directly: it records commands against a
//! [`RenderHost`], which owns the actual textures, programs and command stream.

use ssr_gpu_shared::uniforms::KawaseUniforms;

use crate::config::{ComputeHandle, ShaderHandle};
use crate::draw::{CompositeDraw, MarchDraw};
use crate::targets::TargetDesc;

/// Identifier of a transient target, unique among the host's live targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

/// A blit/draw endpoint: the camera colour target or a transient target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    Camera,
    Target(TargetId),
}

/// Kernels the blur compute stage must expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    DownSample,
    UpSample,
    LinearBlend,
}

impl Kernel {
    pub const ALL: [Kernel; 3] = [Kernel::DownSample, Kernel::UpSample, Kernel::LinearBlend];

    pub fn name(self) -> &'static str {
        match self {
            Kernel::DownSample => "DownSample",
            Kernel::UpSample => "UpSample",
            Kernel::LinearBlend => "LinearBlend",
        }
    }
}

/// Introspection result for a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelInfo {
    pub thread_group_size: [u32; 3],
}

/// Resources bound to one kernel dispatch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelBindings {
    pub source: TargetId,
    pub target: TargetId,
    pub uniforms: KawaseUniforms,
}

/// A resource whose absence degrades a stage to a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingResource {
    ShadingProgram,
    BlurCompute,
    Kernel(Kernel),
}

/// Result of recording one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    Executed,
    Skipped(MissingResource),
}

impl StageOutcome {
    pub fn executed(self) -> bool {
        matches!(self, StageOutcome::Executed)
    }
}

/// Host rendering pipeline as seen by the reflection pass.
///
/// Commands are recorded in call order and executed by the host in that order;
/// the pass relies on this for every read-after-write between stages.
pub trait RenderHost {
    /// Allocate a transient target. The id stays valid until released.
    fn acquire_target(&mut self, label: &'static str, desc: &TargetDesc) -> TargetId;

    /// Return a transient target to the host.
    fn release_target(&mut self, id: TargetId);

    /// Copy `source` into `dest`, resampling if sizes differ.
    fn blit(&mut self, source: Surface, dest: Surface);

    /// Whether `program` resolves to a usable shading program.
    fn has_program(&self, program: ShaderHandle) -> bool;

    /// Draw the visible scene with the march sub-program into `target`.
    fn draw_renderers(&mut self, target: TargetId, draw: &MarchDraw);

    /// Full-screen draw with the composite sub-program into `dest`.
    fn draw_fullscreen(&mut self, dest: Surface, draw: &CompositeDraw);

    /// Whether `compute` resolves to a blur compute stage at all.
    fn has_compute(&self, compute: ComputeHandle) -> bool;

    /// Look up a kernel of `compute`; `None` if the stage or kernel is unbound.
    fn find_kernel(&self, compute: ComputeHandle, kernel: Kernel) -> Option<KernelInfo>;

    /// Dispatch `kernel` with `groups` thread groups.
    fn dispatch(&mut self, compute: ComputeHandle, kernel: Kernel, bindings: &KernelBindings, groups: [u32; 3]);

    fn push_debug_group(&mut self, _label: &str) {}

    fn pop_debug_group(&mut self) {}
}
