use tracing::warn;

/// Cumulative start times of each segment: `t[0] = 0`, `t[i+1] = t[i] + d[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    stamps: Vec<f64>,
}

impl Timeline {
    /// Negative or non-finite durations count as zero so the sequence never decreases.
    pub fn from_durations(durations: &[f64]) -> Self {
        let mut stamps = Vec::with_capacity(durations.len() + 1);
        let mut t = 0.0;
        stamps.push(t);
        for (i, &d) in durations.iter().enumerate() {
            let d = if d.is_finite() && d > 0.0 {
                d
            } else {
                if d != 0.0 {
                    warn!(segment = i, duration = d, "invalid segment duration, using 0");
                }
                0.0
            };
            t += d;
            stamps.push(t);
        }
        Self { stamps }
    }

    pub fn stamps(&self) -> &[f64] {
        &self.stamps
    }

    pub fn segment_count(&self) -> usize {
        self.stamps.len() - 1
    }

    pub fn total(&self) -> f64 {
        self.stamps[self.stamps.len() - 1]
    }

    pub fn at(&self, index: usize) -> f64 {
        self.stamps[index]
    }

    /// `[t[start], t[start + count]]` on the global timeline.
    pub fn window(&self, start: usize, count: usize) -> (f64, f64) {
        (self.stamps[start], self.stamps[start + count])
    }
}
