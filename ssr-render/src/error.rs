use thiserror::Error;

/// Errors surfaced outside of frame recording (settings and camera input).
///
/// Frame-level degradation (a missing shading program or blur compute stage)
/// is not an error; see [`crate::host::StageOutcome`].
#[derive(Debug, Error)]
pub enum SsrError {
    #[error("setting `{name}` = {value} is outside [{min}, {max}]")]
    SettingOutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("camera target {width}x{height} has a zero dimension")]
    DegenerateCamera { width: u32, height: u32 },

    #[error("failed to parse pass settings: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T, E = SsrError> = std::result::Result<T, E>;
