//! Encoder-level pass recording for the reflection pass.

pub mod fullscreen;
pub mod kawase;
pub mod march;
