use std::sync::Mutex;

use tokio::sync::Notify;

/// What the caller sees: the running stage and, when known, how far along it is.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub stage: String,
    pub fraction: Option<f64>,
}

impl ProgressUpdate {
    pub fn stage(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            fraction: None,
        }
    }

    pub fn with_fraction(stage: impl Into<String>, fraction: f64) -> Self {
        Self {
            stage: stage.into(),
            fraction: Some(fraction.clamp(0.0, 1.0)),
        }
    }
}

/// Single-slot, latest-value-wins status channel.
///
/// Publishing never blocks; a reader that falls behind only sees the newest update.
pub struct StatusBoard {
    slot: Mutex<Option<ProgressUpdate>>,
    notify: Notify,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    pub fn publish(&self, update: ProgressUpdate) {
        *self.slot.lock().expect("StatusBoard poisoned") = Some(update);
        self.notify.notify_one();
    }

    pub fn try_recv(&self) -> Option<ProgressUpdate> {
        self.slot.lock().expect("StatusBoard poisoned").take()
    }

    /// Wait for the next update.
    pub async fn recv(&self) -> ProgressUpdate {
        loop {
            if let Some(update) = self.try_recv() {
                return update;
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_latest() {
        let board = StatusBoard::new();
        board.publish(ProgressUpdate::stage("staging background"));
        board.publish(ProgressUpdate::with_fraction("stitching audio", 0.25));

        assert_eq!(
            board.try_recv(),
            Some(ProgressUpdate::with_fraction("stitching audio", 0.25))
        );
        assert_eq!(board.try_recv(), None);
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(ProgressUpdate::with_fraction("x", 1.7).fraction, Some(1.0));
        assert_eq!(ProgressUpdate::with_fraction("x", -0.2).fraction, Some(0.0));
    }

    #[tokio::test]
    async fn recv_wakes_on_publish() {
        let board = std::sync::Arc::new(StatusBoard::new());
        let reader = {
            let board = board.clone();
            tokio::spawn(async move { board.recv().await })
        };
        tokio::task::yield_now().await;
        board.publish(ProgressUpdate::stage("done"));

        assert_eq!(reader.await.unwrap(), ProgressUpdate::stage("done"));
    }
}
