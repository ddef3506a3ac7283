//! Rolling per-session frame latency bookkeeping.

/// Default number of frames between latency summaries.
pub const DEFAULT_STATS_INTERVAL: u64 = 10;

/// Average and worst frame latency over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub avg_ms: f64,
    pub max_ms: f64,
}

/// Per-frame processing durations since the last summary.
///
/// The window is summarized and cleared every `interval` frames, so it never
/// holds more than `interval` samples.
#[derive(Debug)]
pub struct LatencyWindow {
    interval: u64,
    samples: Vec<f64>,
}

impl LatencyWindow {
    /// # Panics
    /// If `interval` is zero.
    pub fn new(interval: u64) -> Self {
        assert!(interval > 0, "latency stats interval must be positive");
        Self {
            interval,
            samples: Vec::with_capacity(interval as usize),
        }
    }

    pub fn record(&mut self, sample_ms: f64) {
        self.samples.push(sample_ms);
    }

    /// True on every `interval`-th frame.
    pub fn should_summarize(&self, frame_count: u64) -> bool {
        frame_count > 0 && frame_count % self.interval == 0
    }

    /// Computes the window statistics and clears it.
    ///
    /// # Panics
    /// If nothing was recorded since the last reset. Callers only summarize
    /// right after recording a frame.
    pub fn summarize_and_reset(&mut self) -> LatencySummary {
        assert!(
            !self.samples.is_empty(),
            "latency window summarized with no samples"
        );
        let avg_ms = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        let max_ms = self.samples.iter().copied().fold(f64::MIN, f64::max);
        self.samples.clear();
        LatencySummary { avg_ms, max_ms }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Frame counter and latency window for one session.
#[derive(Debug)]
pub struct SessionMetrics {
    frames: u64,
    window: LatencyWindow,
}

impl SessionMetrics {
    pub fn new(interval: u64) -> Self {
        Self {
            frames: 0,
            window: LatencyWindow::new(interval),
        }
    }

    /// Records one processed frame. Returns a summary when this frame closes a window.
    pub fn record_frame(&mut self, elapsed_ms: f64) -> Option<LatencySummary> {
        self.frames += 1;
        self.window.record(elapsed_ms);
        self.window
            .should_summarize(self.frames)
            .then(|| self.window.summarize_and_reset())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn window(&self) -> &LatencyWindow {
        &self.window
    }
}
