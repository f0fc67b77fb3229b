//! Drives one assembly run from staged assets to the finished video.
//!
//! The run is a strict chain of encode jobs: narration over the looped background,
//! one overlay job per batch of images, then a copy-concat of the batch clips.
//! Only asset staging runs concurrently.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    batch::{audio_name, image_name, schedule_batches},
    config::AssemblyConfig,
    encoder::{Encoder, ExclusiveEncoder},
    error::{AssemblyError, Result},
    filter_graph::{
        EncodeJob, audio_over_loop_job, background_only_job, concat_job, concat_list, overlay_job,
    },
    progress::{ProgressMonitor, ProgressUpdate, StageReporter, StatusBoard},
    store::AssetStore,
    timeline::Timeline,
    types::{AssemblyRequest, AssetSource, FinishedVideo},
};

pub const BACKGROUND_NAME: &str = "background_video.mp4";
pub const NARRATED_NAME: &str = "narrated.mp4";
pub const CONCAT_LIST_NAME: &str = "concat_list.txt";
pub const FINAL_NAME: &str = "final_output.mp4";
pub const OUTPUT_MIME: &str = "video/mp4";

/// Declared and probed narration lengths may differ by this much before we complain.
const PROBE_TOLERANCE_SECONDS: f64 = 0.05;

pub struct Assembler<E> {
    config: AssemblyConfig,
    encoder: ExclusiveEncoder<E>,
    status: Arc<StatusBoard>,
    cancel: CancellationToken,
}

impl<E: Encoder> Assembler<E> {
    pub fn new(config: AssemblyConfig, encoder: E) -> Self {
        Self {
            config,
            encoder: ExclusiveEncoder::new(encoder),
            status: Arc::new(StatusBoard::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one tied to a shutdown signal.
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Board carrying the latest `{stage, fraction}` of the running assembly.
    pub fn status(&self) -> Arc<StatusBoard> {
        self.status.clone()
    }

    /// Cancelling this token stops the run at the next job boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Assemble into a fresh run directory under the configured work root.
    pub async fn assemble(&self, request: &AssemblyRequest) -> Result<FinishedVideo> {
        let store = AssetStore::create_in(&self.config.work_root).await?;
        self.assemble_in(&store, request).await
    }

    /// Assemble using `store` as the run directory.
    pub async fn assemble_in(
        &self,
        store: &AssetStore,
        request: &AssemblyRequest,
    ) -> Result<FinishedVideo> {
        self.encoder.initialize().await?;

        self.publish_stage("staging background");
        self.or_cancelled(store.fetch_and_write(BACKGROUND_NAME, &request.background))
            .await?;

        let declared: Vec<f64> = request
            .segments
            .iter()
            .map(|s| s.duration_seconds)
            .collect();
        let timeline = Timeline::from_durations(&declared);
        let n = timeline.segment_count();

        if n == 0 || timeline.total() <= 0.0 {
            return self.assemble_background_only(store).await;
        }

        info!(
            segments = n,
            total_seconds = timeline.total(),
            "assembling narrated video"
        );

        self.publish_stage("staging narration");
        let audio: Vec<String> = (0..n).map(audio_name).collect();
        let staged = audio
            .iter()
            .cloned()
            .zip(request.segments.iter().map(|s| s.audio.clone()))
            .collect();
        self.or_cancelled(stage_all(store, staged)).await?;

        let job = audio_over_loop_job(
            BACKGROUND_NAME,
            &audio,
            timeline.total(),
            NARRATED_NAME,
            self.config.geometry,
            &self.config.encoder.preset,
        );
        let mut reporter = StageReporter::new(
            ProgressMonitor::with_total(&job.label, timeline.total()),
            &self.status,
        );
        self.run_job(store, &job, &mut reporter).await?;

        // first duration marker belongs to the background input
        let probed: Vec<f64> = reporter
            .monitor()
            .durations()
            .iter()
            .skip(1)
            .copied()
            .collect();
        compare_probed(&declared, &probed);

        self.publish_stage("staging images");
        let staged = (0..n)
            .map(image_name)
            .zip(request.segments.iter().map(|s| s.image.clone()))
            .collect();
        self.or_cancelled(stage_all(store, staged)).await?;

        let batches = schedule_batches(n, self.config.batch_size);
        let mut clips = Vec::with_capacity(batches.len());
        for batch in &batches {
            let job = overlay_job(
                batch,
                &timeline,
                NARRATED_NAME,
                &self.config.encoder.preset,
            );
            let label = format!("overlaying clip {}/{}", batch.index + 1, batches.len());
            let mut reporter = StageReporter::new(
                ProgressMonitor::with_total(label, batch.duration(&timeline)),
                &self.status,
            );
            self.run_job(store, &job, &mut reporter).await?;
            clips.push(job.output);
        }

        store
            .write(CONCAT_LIST_NAME, concat_list(&clips))
            .await?;
        let job = concat_job(CONCAT_LIST_NAME, &clips, FINAL_NAME, timeline.total());
        let mut reporter = StageReporter::new(
            ProgressMonitor::with_total(&job.label, timeline.total()),
            &self.status,
        );
        self.run_job(store, &job, &mut reporter).await?;

        let bytes = store.read(FINAL_NAME).await?;
        self.status.publish(ProgressUpdate::with_fraction("done", 1.0));
        info!(
            batches = batches.len(),
            len = bytes.len(),
            "assembly finished"
        );

        Ok(FinishedVideo {
            bytes,
            mime_type: OUTPUT_MIME,
            duration_seconds: timeline.total(),
            batch_count: batches.len(),
            probed_durations: probed,
        })
    }

    async fn assemble_background_only(&self, store: &AssetStore) -> Result<FinishedVideo> {
        info!("nothing to narrate, normalizing background only");

        let job = background_only_job(
            BACKGROUND_NAME,
            NARRATED_NAME,
            self.config.geometry,
            &self.config.encoder.preset,
        );
        let mut reporter = StageReporter::new(ProgressMonitor::new(&job.label), &self.status);
        self.run_job(store, &job, &mut reporter).await?;

        let duration_seconds = reporter
            .monitor()
            .durations()
            .first()
            .copied()
            .unwrap_or(0.0);
        let bytes = store.read(NARRATED_NAME).await?;
        self.status.publish(ProgressUpdate::with_fraction("done", 1.0));

        Ok(FinishedVideo {
            bytes,
            mime_type: OUTPUT_MIME,
            duration_seconds,
            batch_count: 0,
            probed_durations: Vec::new(),
        })
    }

    async fn run_job(
        &self,
        store: &AssetStore,
        job: &EncodeJob,
        reporter: &mut StageReporter<'_>,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AssemblyError::Cancelled);
        }
        info!(stage = reporter.monitor().label(), job = %job.label, output = %job.output, "running encode job");
        self.or_cancelled(self.encoder.run(job, store.root(), reporter))
            .await
    }

    async fn or_cancelled<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("assembly cancelled");
                Err(AssemblyError::Cancelled)
            }
            result = fut => result,
        }
    }

    fn publish_stage(&self, stage: &str) {
        debug!(stage, "stage started");
        self.status.publish(ProgressUpdate::stage(stage));
    }
}

/// Fetch every `(name, source)` pair into `store` concurrently.
async fn stage_all(store: &AssetStore, assets: Vec<(String, AssetSource)>) -> Result<()> {
    let mut set = JoinSet::new();
    for (name, source) in assets {
        let store = store.clone();
        set.spawn(async move { store.fetch_and_write(&name, &source).await });
    }

    while let Some(joined) = set.join_next().await {
        joined.map_err(|e| AssemblyError::IoError(std::io::Error::other(e)))??;
    }
    Ok(())
}

fn compare_probed(declared: &[f64], probed: &[f64]) {
    if probed.len() != declared.len() {
        debug!(
            declared = declared.len(),
            probed = probed.len(),
            "encoder did not report every narration duration"
        );
    }
    for (i, (&d, &p)) in declared.iter().zip(probed).enumerate() {
        if (d - p).abs() > PROBE_TOLERANCE_SECONDS {
            warn!(
                segment = i,
                declared = d,
                probed = p,
                "narration length differs from declared duration"
            );
        }
    }
}
