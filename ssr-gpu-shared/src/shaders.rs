/// Embedded WGSL sources used by the wgpu backend.
/// The march and composite programs are supplied by the application; only the
/// blur kernels and the blit live here.

/// Dual Kawase compute kernels: `down_sample`, `up_sample`, `linear_blend`.
/// The storage format token is [`KAWASE_STORAGE_FORMAT_TOKEN`].
pub const KAWASE_BLUR_COMPUTE: &str = include_str!("../shaders/kawase_blur.wgsl");
/// Full-screen copy: `vs_main` + `fs_main`.
pub const BLIT: &str = include_str!("../shaders/blit.wgsl");

/// Placeholder in [`KAWASE_BLUR_COMPUTE`] replaced with the WGSL storage format.
pub const KAWASE_STORAGE_FORMAT_TOKEN: &str = "STORAGE_FORMAT";

/// Workgroup size declared by every kernel in [`KAWASE_BLUR_COMPUTE`].
pub const KAWASE_WORKGROUP_SIZE: [u32; 3] = [8, 8, 1];

/// Kawase WGSL with the storage texture format filled in.
pub fn kawase_blur_source(storage_format: &str) -> String {
    KAWASE_BLUR_COMPUTE.replace(KAWASE_STORAGE_FORMAT_TOKEN, storage_format)
}
