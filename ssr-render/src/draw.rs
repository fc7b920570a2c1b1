//! Draw configurations for the two shading sub-programs.
//!
//! The march and composite draws are separate immutable values; neither is
//! patched in place between calls.

use ssr_gpu_shared::uniforms::MarchUniforms;

use crate::config::{LayerMask, ShaderHandle, TextureHandle};
use crate::host::TargetId;

/// Index of a sub-program inside the SSR shading program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubProgram {
    March = 0,
    Composite = 1,
}

/// How the host must order renderers before drawing them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortingCriteria {
    /// Ascending render queue; ties keep the host's submission order.
    RenderQueue,
}

/// Scene draw with the march sub-program, into a reflection buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarchDraw {
    pub program: ShaderHandle,
    pub sub_program: SubProgram,
    pub layer_mask: LayerMask,
    pub sorting: SortingCriteria,
    pub uniforms: MarchUniforms,
    pub noise_texture: Option<TextureHandle>,
    /// Camera colour copy the marched rays sample on hit.
    pub scene_color: TargetId,
}

/// Full-screen draw with the composite sub-program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeDraw {
    pub program: ShaderHandle,
    pub sub_program: SubProgram,
    pub scene_color: TargetId,
    pub reflections: TargetId,
}

/// Anything the host can draw in the march pass.
pub trait Renderer {
    fn layer(&self) -> u32;
    fn render_queue(&self) -> i32;
}

/// Renderers on a layer in `mask`, in ascending render-queue order.
/// The sort is stable, so equal queues keep their input order.
pub fn visible_in_queue_order<R: Renderer>(items: &[R], mask: LayerMask) -> Vec<&R> {
    let mut visible: Vec<&R> = items.iter().filter(|r| mask.contains(r.layer())).collect();
    visible.sort_by_key(|r| r.render_queue());
    visible
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        name: &'static str,
        layer: u32,
        queue: i32,
    }

    impl Renderer for Item {
        fn layer(&self) -> u32 {
            self.layer
        }
        fn render_queue(&self) -> i32 {
            self.queue
        }
    }

    #[test]
    fn test_filter_and_stable_queue_order() {
        let items = [
            Item { name: "water", layer: 4, queue: 3000 },
            Item { name: "floor", layer: 0, queue: 2000 },
            Item { name: "ui", layer: 5, queue: 1000 },
            Item { name: "wall", layer: 0, queue: 2000 },
            Item { name: "sky", layer: 0, queue: 1000 },
        ];
        let mask = LayerMask::from_layers(&[0, 4]);
        let names: Vec<_> = visible_in_queue_order(&items, mask).iter().map(|i| i.name).collect();
        assert_eq!(names, ["sky", "floor", "wall", "water"]);
    }
}
