//! A [`RenderHost`] that records commands instead of executing them.
//!
//! Used to inspect a frame's command stream offline and by the test-suite to
//! check target lifetimes: it tracks live targets, their peak, double releases
//! and any command that touches a target which is not live.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::{ComputeHandle, ShaderHandle};
use crate::draw::{CompositeDraw, MarchDraw};
use crate::host::{Kernel, KernelBindings, KernelInfo, RenderHost, Surface, TargetId};
use crate::targets::TargetDesc;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Acquire {
        id: TargetId,
        label: &'static str,
        desc: TargetDesc,
    },
    Release {
        id: TargetId,
    },
    Blit {
        source: Surface,
        dest: Surface,
    },
    DrawRenderers {
        target: TargetId,
        draw: MarchDraw,
    },
    DrawFullscreen {
        dest: Surface,
        draw: CompositeDraw,
    },
    Dispatch {
        compute: ComputeHandle,
        kernel: Kernel,
        bindings: KernelBindings,
        groups: [u32; 3],
    },
    PushDebugGroup(String),
    PopDebugGroup,
}

#[derive(Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<Command>,
    live: BTreeMap<TargetId, TargetDesc>,
    next_id: u32,
    peak: usize,
    total_acquired: usize,
    double_releases: Vec<TargetId>,
    invalid_uses: Vec<TargetId>,
    programs: HashSet<ShaderHandle>,
    computes: HashSet<ComputeHandle>,
    kernels: HashMap<(ComputeHandle, Kernel), KernelInfo>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `program` resolvable.
    pub fn with_program(mut self, program: ShaderHandle) -> Self {
        self.programs.insert(program);
        self
    }

    /// Make `compute` resolvable with all three Kawase kernels.
    pub fn with_compute(self, compute: ComputeHandle, thread_group_size: [u32; 3]) -> Self {
        self.with_kernels(compute, &Kernel::ALL, thread_group_size)
    }

    /// Make only `kernels` of `compute` resolvable.
    pub fn with_kernels(mut self, compute: ComputeHandle, kernels: &[Kernel], thread_group_size: [u32; 3]) -> Self {
        self.computes.insert(compute);
        for &kernel in kernels {
            self.kernels.insert((compute, kernel), KernelInfo { thread_group_size });
        }
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn live_targets(&self) -> usize {
        self.live.len()
    }

    pub fn peak_live_targets(&self) -> usize {
        self.peak
    }

    pub fn total_acquired(&self) -> usize {
        self.total_acquired
    }

    pub fn double_releases(&self) -> &[TargetId] {
        &self.double_releases
    }

    /// Targets referenced by a command while not live.
    pub fn invalid_uses(&self) -> &[TargetId] {
        &self.invalid_uses
    }

    /// Recorded dispatches of `kernel`, in order.
    pub fn dispatches(&self, kernel: Kernel) -> Vec<(KernelBindings, [u32; 3])> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Dispatch {
                    kernel: k,
                    bindings,
                    groups,
                    ..
                } if *k == kernel => Some((*bindings, *groups)),
                _ => None,
            })
            .collect()
    }

    /// Descriptors acquired under `label`, in order.
    pub fn acquired_with_label(&self, label: &str) -> Vec<TargetDesc> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Acquire { label: l, desc, .. } if *l == label => Some(*desc),
                _ => None,
            })
            .collect()
    }

    /// Whether any command wrote to the camera colour target.
    pub fn camera_written(&self) -> bool {
        self.commands.iter().any(|c| {
            matches!(
                c,
                Command::Blit { dest: Surface::Camera, .. } | Command::DrawFullscreen { dest: Surface::Camera, .. }
            )
        })
    }

    fn touch(&mut self, id: TargetId) {
        if !self.live.contains_key(&id) {
            self.invalid_uses.push(id);
        }
    }

    fn touch_surface(&mut self, surface: Surface) {
        if let Surface::Target(id) = surface {
            self.touch(id);
        }
    }
}

impl RenderHost for CommandRecorder {
    fn acquire_target(&mut self, label: &'static str, desc: &TargetDesc) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.live.insert(id, *desc);
        self.total_acquired += 1;
        self.peak = self.peak.max(self.live.len());
        self.commands.push(Command::Acquire { id, label, desc: *desc });
        id
    }

    fn release_target(&mut self, id: TargetId) {
        if self.live.remove(&id).is_none() {
            self.double_releases.push(id);
        }
        self.commands.push(Command::Release { id });
    }

    fn blit(&mut self, source: Surface, dest: Surface) {
        self.touch_surface(source);
        self.touch_surface(dest);
        self.commands.push(Command::Blit { source, dest });
    }

    fn has_program(&self, program: ShaderHandle) -> bool {
        self.programs.contains(&program)
    }

    fn draw_renderers(&mut self, target: TargetId, draw: &MarchDraw) {
        self.touch(target);
        self.touch(draw.scene_color);
        self.commands.push(Command::DrawRenderers { target, draw: *draw });
    }

    fn draw_fullscreen(&mut self, dest: Surface, draw: &CompositeDraw) {
        self.touch_surface(dest);
        self.touch(draw.scene_color);
        self.touch(draw.reflections);
        self.commands.push(Command::DrawFullscreen { dest, draw: *draw });
    }

    fn has_compute(&self, compute: ComputeHandle) -> bool {
        self.computes.contains(&compute)
    }

    fn find_kernel(&self, compute: ComputeHandle, kernel: Kernel) -> Option<KernelInfo> {
        self.kernels.get(&(compute, kernel)).copied()
    }

    fn dispatch(&mut self, compute: ComputeHandle, kernel: Kernel, bindings: &KernelBindings, groups: [u32; 3]) {
        self.touch(bindings.source);
        self.touch(bindings.target);
        self.commands.push(Command::Dispatch {
            compute,
            kernel,
            bindings: *bindings,
            groups,
        });
    }

    fn push_debug_group(&mut self, label: &str) {
        self.commands.push(Command::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.commands.push(Command::PopDebugGroup);
    }
}
