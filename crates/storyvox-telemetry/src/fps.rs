use std::time::Instant;

/// Sliding-window frames-per-second tracker.
///
/// One instance per pipeline stage; `tick()` once per frame and it reports
/// the rate once per second.
pub struct FpsTracker {
    window_start: Instant,
    frames_in_window: u64,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames_in_window: 0,
        }
    }

    /// Record one frame. Returns `Some(fps)` when a full second has elapsed
    /// since the last report, `None` otherwise.
    pub fn tick(&mut self) -> Option<f64> {
        self.frames_in_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs_f64() >= 1.0 {
            let fps = self.frames_in_window as f64 / elapsed.as_secs_f64();
            self.window_start = Instant::now();
            self.frames_in_window = 0;
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}
