mod log_scan;
pub mod monitor;
pub mod status;

pub(crate) use log_scan::{LineSplitter, dispatch_line};
pub use monitor::{MonitorPhase, ProgressMonitor, ProgressState};
pub use status::{ProgressUpdate, StatusBoard};

use tracing::warn;

use crate::encoder::EncoderObserver;

/// Observer for one encode job: runs a [`ProgressMonitor`] and publishes its fractions.
pub struct StageReporter<'a> {
    monitor: ProgressMonitor,
    board: &'a StatusBoard,
}

impl<'a> StageReporter<'a> {
    pub fn new(monitor: ProgressMonitor, board: &'a StatusBoard) -> Self {
        board.publish(ProgressUpdate::stage(monitor.label()));
        Self { monitor, board }
    }

    pub fn monitor(&self) -> &ProgressMonitor {
        &self.monitor
    }
}

impl EncoderObserver for StageReporter<'_> {
    fn on_duration_known(&mut self, seconds: f64) {
        self.monitor.on_duration_known(seconds);
    }

    fn on_progress(&mut self, elapsed_seconds: f64) {
        if let Some(fraction) = self.monitor.on_progress(elapsed_seconds) {
            self.board
                .publish(ProgressUpdate::with_fraction(self.monitor.label(), fraction));
        }
    }

    fn on_complete(&mut self) {
        if let Some(fraction) = self.monitor.on_complete() {
            self.board
                .publish(ProgressUpdate::with_fraction(self.monitor.label(), fraction));
        }
    }

    fn on_error(&mut self, cause: &str) {
        warn!(stage = self.monitor.label(), "encode job failed: {cause}");
    }
}
