use std::time::Duration;

/// Elapsed-time accumulator advanced by the caller once per frame.
///
/// The clock never reads the system time itself, so the frame loop can be
/// driven by a platform scheduler or by a test at any pace.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    elapsed: Duration,
    frame_index: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `dt` and returns the new elapsed time.
    pub fn advance(&mut self, dt: Duration) -> Duration {
        self.elapsed += dt;
        self.frame_index = self.frame_index.wrapping_add(1);
        self.elapsed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of frames advanced so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// Rolling frames-per-second counter.
///
/// Frames are counted over a window (one second by default). When the time
/// accumulated in the window reaches its length, the count becomes the
/// published rate and both the count and the window restart from zero.
#[derive(Debug, Clone, Copy)]
pub struct FpsCounter {
    frames: u32,
    fps: u32,
    window_elapsed: Duration,
    window: Duration,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::with_window(Duration::from_secs(1))
    }
}

impl FpsCounter {
    pub fn with_window(window: Duration) -> Self {
        Self {
            frames: 0,
            fps: 0,
            window_elapsed: Duration::ZERO,
            window,
        }
    }

    /// Counts one rendered frame that took `dt`.
    ///
    /// Returns `true` when this frame closed a window and `fps` was updated.
    pub fn record(&mut self, dt: Duration) -> bool {
        self.frames += 1;
        self.window_elapsed += dt;
        if self.window_elapsed >= self.window {
            self.fps = self.frames;
            self.frames = 0;
            self.window_elapsed = Duration::ZERO;
            true
        } else {
            false
        }
    }

    /// Rate published at the end of the last complete window.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Frames counted in the current, incomplete window.
    pub fn frames(&self) -> u32 {
        self.frames
    }
}
