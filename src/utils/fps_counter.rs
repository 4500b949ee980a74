#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Frame rate averaged over one-second windows. Drives the frame-rate
/// adaptive motion blur strength.
#[derive(Debug)]
pub struct FpsCounter {
    last_update: Instant,
    frame_count: u32,
    accumulated_time: Duration,
    current_fps: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
            accumulated_time: Duration::ZERO,
            current_fps: 0.0,
        }
    }

    /// Counts one frame. Returns the new average when a window closes.
    pub fn update(&mut self) -> Option<f32> {
        self.frame_count += 1;
        let now = Instant::now();
        self.accumulated_time += now - self.last_update;
        self.last_update = now;

        let elapsed = self.accumulated_time.as_secs_f32();
        if elapsed >= 1.0 {
            self.current_fps = self.frame_count as f32 / elapsed;
            self.accumulated_time = Duration::ZERO;
            self.frame_count = 0;
            return Some(self.current_fps);
        }

        None
    }

    /// Average of the last closed window, `0.0` before the first one.
    #[inline]
    #[must_use]
    pub fn current_fps(&self) -> f32 {
        self.current_fps
    }

    /// The measured rate, or `fallback` while no window has closed yet.
    #[inline]
    #[must_use]
    pub fn fps_or(&self, fallback: f32) -> f32 {
        if self.current_fps > 0.0 { self.current_fps } else { fallback }
    }
}
