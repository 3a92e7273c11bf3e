//! Pattern detectors
//!
//! # Pattern Families
//!
//! - **Candlestick (6)**: Doji, Hammer, Shooting Star, Engulfing, Morning/Evening Star
//! - **Chart (5)**: Head & Shoulders, Double Top/Bottom, Triangle and Wedge placeholders
//! - **Harmonic (3)**: Gartley, Butterfly, Bat (XABCD Fibonacci legs)
//! - **Volume (3)**: Volume Spike, Volume Climax, Accumulation/Distribution

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod candlestick;
pub mod chart;
pub mod harmonic;
pub mod volume;

// Re-export all detectors for convenience
pub use candlestick::*;
pub use chart::*;
pub use harmonic::*;
pub use volume::*;
