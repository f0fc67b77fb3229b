use tracing::trace;

/// Snapshot of one encode job's progress.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressState {
    pub stage_label: String,
    pub total_seconds: f64,
    pub elapsed_seconds: f64,
}

impl ProgressState {
    /// `clamp(elapsed / total, 0, 1)`, or `None` while the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        if self.total_seconds > 0.0 && self.total_seconds.is_finite() {
            Some((self.elapsed_seconds / self.total_seconds).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorPhase {
    AwaitingTotal,
    Tracking,
    Done,
}

/// Turns duration/elapsed markers of a single job into completion fractions.
#[derive(Debug)]
pub struct ProgressMonitor {
    state: ProgressState,
    phase: MonitorPhase,
    last_fraction: f64,
    durations: Vec<f64>,
    total_fixed: bool,
}

impl ProgressMonitor {
    /// Total learned from the first duration marker.
    pub fn new(stage_label: impl Into<String>) -> Self {
        Self {
            state: ProgressState {
                stage_label: stage_label.into(),
                total_seconds: 0.0,
                elapsed_seconds: 0.0,
            },
            phase: MonitorPhase::AwaitingTotal,
            last_fraction: 0.0,
            durations: Vec::new(),
            total_fixed: false,
        }
    }

    /// Total known up front; duration markers are then only recorded.
    ///
    /// A total of 0 is still fixed: the job never reports fractions.
    pub fn with_total(stage_label: impl Into<String>, total_seconds: f64) -> Self {
        let mut monitor = Self::new(stage_label);
        monitor.total_fixed = true;
        if total_seconds > 0.0 && total_seconds.is_finite() {
            monitor.state.total_seconds = total_seconds;
            monitor.phase = MonitorPhase::Tracking;
        }
        monitor
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn label(&self) -> &str {
        &self.state.stage_label
    }

    /// Every duration marker seen so far, in log order.
    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn on_duration_known(&mut self, seconds: f64) {
        if self.phase == MonitorPhase::Done {
            return;
        }
        self.durations.push(seconds);
        if !self.total_fixed
            && self.phase == MonitorPhase::AwaitingTotal
            && seconds > 0.0
            && seconds.is_finite()
        {
            trace!(stage = %self.state.stage_label, total = seconds, "total duration known");
            self.state.total_seconds = seconds;
            self.phase = MonitorPhase::Tracking;
        }
    }

    /// Returns the fraction to report, never lower than the previous one.
    pub fn on_progress(&mut self, elapsed_seconds: f64) -> Option<f64> {
        if self.phase != MonitorPhase::Tracking || !elapsed_seconds.is_finite() {
            return None;
        }
        self.state.elapsed_seconds = elapsed_seconds.max(self.state.elapsed_seconds);
        let fraction = self.state.fraction()?.max(self.last_fraction);
        self.last_fraction = fraction;
        Some(fraction)
    }

    /// Finish the job; yields a final `1.0` if fractions were being reported.
    pub fn on_complete(&mut self) -> Option<f64> {
        let was_tracking = self.phase == MonitorPhase::Tracking;
        self.phase = MonitorPhase::Done;
        if was_tracking {
            self.last_fraction = 1.0;
            Some(1.0)
        } else {
            None
        }
    }
}
