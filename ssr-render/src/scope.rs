//! Scoped ownership of transient targets.
//!
//! A [`Transient`] can only be created by a [`TransientScope`] and can only be
//! given back by moving it into [`TransientScope::release`]. Whatever is still
//! live when the scope drops is released there, so a pyramid walk that returns
//! early cannot leak targets past the frame.

use crate::host::{RenderHost, TargetId};
use crate::targets::{Extent, TargetDesc};

/// A live transient target. Not `Clone`: exactly one owner per target.
#[derive(Debug, PartialEq, Eq)]
pub struct Transient {
    id: TargetId,
    extent: Extent,
}

impl Transient {
    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }
}

pub struct TransientScope<'h, H: RenderHost + ?Sized> {
    host: &'h mut H,
    live: Vec<TargetId>,
    peak: usize,
}

impl<'h, H: RenderHost + ?Sized> TransientScope<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self {
            host,
            live: Vec::new(),
            peak: 0,
        }
    }

    pub fn host(&mut self) -> &mut H {
        &mut *self.host
    }

    pub fn acquire(&mut self, label: &'static str, desc: &TargetDesc) -> Transient {
        let id = self.host.acquire_target(label, desc);
        self.live.push(id);
        self.peak = self.peak.max(self.live.len());
        Transient {
            id,
            extent: desc.extent,
        }
    }

    pub fn release(&mut self, target: Transient) {
        if let Some(pos) = self.live.iter().position(|&id| id == target.id) {
            self.live.swap_remove(pos);
            self.host.release_target(target.id);
        }
    }

    /// Number of targets currently owned by this scope.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    /// Highest number of simultaneously live targets seen so far.
    pub fn peak(&self) -> usize {
        self.peak
    }
}

impl<H: RenderHost + ?Sized> Drop for TransientScope<'_, H> {
    fn drop(&mut self) {
        for id in self.live.drain(..) {
            log::warn!("transient target {id:?} still live at end of scope; releasing");
            self.host.release_target(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetFormat;
    use crate::recorder::CommandRecorder;
    use crate::targets::FilterMode;

    fn desc(w: u32, h: u32) -> TargetDesc {
        TargetDesc {
            extent: Extent::new(w, h),
            format: TargetFormat::Rgba16Float,
            filter: FilterMode::Bilinear,
            random_write: true,
        }
    }

    #[test]
    fn test_release_and_peak() {
        let mut host = CommandRecorder::new();
        {
            let mut scope = TransientScope::new(&mut host);
            let a = scope.acquire("a", &desc(8, 8));
            let b = scope.acquire("b", &desc(4, 4));
            assert_eq!(b.extent(), Extent::new(4, 4));
            scope.release(a);
            let c = scope.acquire("c", &desc(2, 2));
            assert_eq!(scope.live(), 2);
            assert_eq!(scope.peak(), 2);
            scope.release(b);
            scope.release(c);
            assert_eq!(scope.live(), 0);
        }
        assert_eq!(host.live_targets(), 0);
        assert_eq!(host.total_acquired(), 3);
    }

    #[test]
    fn test_drop_reclaims_leftovers() {
        let mut host = CommandRecorder::new();
        {
            let mut scope = TransientScope::new(&mut host);
            let _kept = scope.acquire("kept", &desc(8, 8));
            let _also = scope.acquire("also", &desc(8, 8));
        }
        assert_eq!(host.live_targets(), 0);
        assert!(host.double_releases().is_empty());
    }
}
