use crate::timeline::Timeline;

/// A contiguous run of segments overlaid in one encode job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub start: usize,
    pub count: usize,
}

impl Batch {
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// Global `[start, end]` seconds covered by this batch.
    pub fn window(&self, timeline: &Timeline) -> (f64, f64) {
        timeline.window(self.start, self.count)
    }

    pub fn duration(&self, timeline: &Timeline) -> f64 {
        let (start, end) = self.window(timeline);
        end - start
    }

    /// Visibility window of the `local`-th entry, relative to the batch start.
    pub fn local_gate(&self, timeline: &Timeline, local: usize) -> (f64, f64) {
        let origin = timeline.at(self.start);
        let i = self.start + local;
        (timeline.at(i) - origin, timeline.at(i + 1) - origin)
    }

    /// Intermediate clip produced by this batch's overlay job.
    pub fn output_name(&self) -> String {
        format!("out_{}.mp4", self.index)
    }
}

/// Staged name of the image for global segment `index`.
pub fn image_name(index: usize) -> String {
    format!("img_{}.png", index)
}

/// Staged name of the narration for global segment `index`.
pub fn audio_name(index: usize) -> String {
    format!("audio_{}.wav", index)
}

/// Split `n` entries into ordered batches of at most `batch_size`; the last holds the remainder.
pub fn schedule_batches(n: usize, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(n.div_ceil(batch_size));
    let mut start = 0;
    while start < n {
        let count = batch_size.min(n - start);
        batches.push(Batch {
            index: batches.len(),
            start,
            count,
        });
        start += count;
    }
    batches
}
