//! Utility functions for audio processing.
//!
//! # Modules
//!
//! - [`audio_math`] - librosa-compatible unit conversions
//! - [`generation`] - synthetic signal generation

pub mod audio_math;
pub mod generation;

pub use audio_math::*;
pub use generation::*;
