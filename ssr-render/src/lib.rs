//! Screen-space reflection pass, independent of any graphics API.
//!
//! The pass ray-marches the depth buffer through an application-supplied
//! shading program, blurs the hits with a dual Kawase pyramid whose depth and
//! blend follow the configured radius, and composites the result over the
//! camera colour. All GPU work is recorded through [`host::RenderHost`].

pub mod config;
pub mod draw;
pub mod error;
pub mod feature;
pub mod host;
pub mod kawase;
pub mod marcher;
pub mod pass;
pub mod recorder;
pub mod scope;
pub mod targets;

pub use config::{ComputeHandle, LayerMask, PassEvent, PassSettings, ShaderHandle, TargetFormat, TextureHandle};
pub use error::{Result, SsrError};
pub use feature::{ReflectionFeature, ReflectionVolume};
pub use host::{Kernel, RenderHost, StageOutcome, Surface, TargetId};
pub use pass::{FrameReport, PassState, ReflectionPass};
pub use recorder::CommandRecorder;
pub use targets::{CameraDescriptor, Extent, ResourcePlanner, TargetDesc};
