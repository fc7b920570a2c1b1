//! GPU-facing data shared by the SSR core and the wgpu backend.
//!
//! Uniform blocks here are `#[repr(C)]` + `Pod` so they can be uploaded with
//! `bytemuck::bytes_of` and match the WGSL structs byte for byte.

pub mod shaders;
pub mod uniforms;
