//! Utility Module
//!
//! - [`FpsCounter`]: frame rate measurement, used for motion blur scaling

pub mod fps_counter;

pub use fps_counter::FpsCounter;
