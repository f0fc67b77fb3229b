use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use threadreel_core::{
    AssemblyConfig, AssemblyError, AssemblyRequest, AssetSource, AssetStore, EncodeJob, Encoder,
    EncoderObserver, NarratedSegment, ProgressUpdate, Result, StatusBoard,
    assembler::{Assembler, CONCAT_LIST_NAME},
};
use tokio_util::sync::CancellationToken;

const BACKGROUND_SECONDS: f64 = 30.0;

/// Records every job and writes a stand-in output file into the run directory.
#[derive(Clone, Default)]
struct FakeEncoder {
    jobs: Arc<Mutex<Vec<EncodeJob>>>,
    fail_on: Option<&'static str>,
    cancel_after: Option<(&'static str, CancellationToken)>,
    yield_between_events: bool,
}

impl FakeEncoder {
    fn labels(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.label.clone())
            .collect()
    }

    fn jobs(&self) -> Vec<EncodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Encoder for FakeEncoder {
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    async fn run(
        &mut self,
        job: &EncodeJob,
        workdir: &Path,
        observer: &mut dyn EncoderObserver,
    ) -> Result<()> {
        self.jobs.lock().unwrap().push(job.clone());
        for input in &job.inputs {
            assert!(workdir.join(input).exists(), "{} ran before {input} existed", job.label);
        }

        if self.fail_on == Some(job.label.as_str()) {
            observer.on_error("simulated failure");
            return Err(AssemblyError::EncodeFailed {
                job: job.label.clone(),
                reason: "simulated failure".to_string(),
            });
        }

        observer.on_duration_known(BACKGROUND_SECONDS);
        for _ in job.inputs.iter().filter(|i| i.starts_with("audio_")) {
            observer.on_duration_known(2.0);
        }

        let total = job.expected_duration.unwrap_or(BACKGROUND_SECONDS);
        for step in [1.0, 3.0, 2.0, 4.0] {
            observer.on_progress(total * step / 4.0);
            if self.yield_between_events {
                tokio::task::yield_now().await;
            }
        }
        observer.on_complete();

        std::fs::write(workdir.join(&job.output), format!("encoded by {}", job.label))?;

        if let Some((label, token)) = &self.cancel_after
            && *label == job.label
        {
            token.cancel();
        }
        Ok(())
    }
}

fn request(n: usize, seconds: f64) -> AssemblyRequest {
    request_with(&vec![seconds; n])
}

fn request_with(durations: &[f64]) -> AssemblyRequest {
    AssemblyRequest {
        background: AssetSource::Bytes(b"background".to_vec()),
        segments: durations
            .iter()
            .enumerate()
            .map(|(i, &seconds)| NarratedSegment {
                audio: AssetSource::Bytes(format!("audio {i}").into_bytes()),
                duration_seconds: seconds,
                image: AssetSource::Bytes(format!("image {i}").into_bytes()),
            })
            .collect(),
    }
}

async fn collect_updates(status: &StatusBoard) -> Vec<ProgressUpdate> {
    let mut seen = Vec::new();
    loop {
        let update = status.recv().await;
        let done = update.stage == "done";
        seen.push(update);
        if done {
            return seen;
        }
    }
}

fn config(root: &Path) -> AssemblyConfig {
    AssemblyConfig::default().with_work_root(root)
}

#[tokio::test]
async fn twelve_two_second_segments_make_two_batches() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::default();
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());
    let store = AssetStore::create_in(tmp.path()).await.unwrap();

    let video = assembler
        .assemble_in(&store, &request(12, 2.0))
        .await
        .unwrap();

    assert_eq!(video.batch_count, 2);
    assert_eq!(video.duration_seconds, 24.0);
    assert_eq!(video.mime_type, "video/mp4");
    assert_eq!(video.bytes, b"encoded by stitching clips");
    assert_eq!(video.probed_durations, vec![2.0; 12]);
    assert_eq!(
        encoder.labels(),
        vec![
            "stitching audio",
            "overlay batch 0",
            "overlay batch 1",
            "stitching clips"
        ]
    );

    let list = store.read(CONCAT_LIST_NAME).await.unwrap();
    assert_eq!(
        String::from_utf8(list).unwrap(),
        "file out_0.mp4\nfile out_1.mp4"
    );

    let jobs = encoder.jobs();
    assert_eq!(jobs[0].expected_duration, Some(24.0));
    assert_eq!(jobs[1].inputs.len(), 11);
    assert_eq!(jobs[2].inputs.len(), 3);
    assert_eq!(jobs[2].expected_duration, Some(4.0));
}

#[tokio::test]
async fn twenty_three_segments_concat_three_clips_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let assembler = Assembler::new(config(tmp.path()), FakeEncoder::default());
    let store = AssetStore::create_in(tmp.path()).await.unwrap();

    let video = assembler
        .assemble_in(&store, &request(23, 1.5))
        .await
        .unwrap();

    assert_eq!(video.batch_count, 3);
    let list = String::from_utf8(store.read(CONCAT_LIST_NAME).await.unwrap()).unwrap();
    assert_eq!(
        list.lines().collect::<Vec<_>>(),
        vec!["file out_0.mp4", "file out_1.mp4", "file out_2.mp4"]
    );
}

#[tokio::test]
async fn no_segments_yields_normalized_background() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::default();
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());

    let video = assembler.assemble(&request(0, 0.0)).await.unwrap();

    assert_eq!(encoder.labels(), vec!["normalize background"]);
    assert_eq!(video.batch_count, 0);
    assert_eq!(video.duration_seconds, BACKGROUND_SECONDS);
    assert_eq!(video.bytes, b"encoded by normalize background");
    assert!(video.probed_durations.is_empty());
}

#[tokio::test]
async fn zero_length_narration_also_skips_overlays() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::default();
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());

    let video = assembler.assemble(&request(3, 0.0)).await.unwrap();

    assert_eq!(encoder.labels(), vec!["normalize background"]);
    assert_eq!(video.batch_count, 0);
}

#[tokio::test]
async fn run_directory_is_removed_afterwards() {
    let tmp = tempfile::tempdir().unwrap();
    let assembler = Assembler::new(config(tmp.path()), FakeEncoder::default());

    assembler.assemble(&request(4, 1.0)).await.unwrap();

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn identical_requests_produce_identical_jobs() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let tmp = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::default();
        let assembler =
            Assembler::new(config(tmp.path()).with_batch_size(4), encoder.clone());
        assembler.assemble(&request(9, 2.25)).await.unwrap();
        runs.push(encoder.jobs());
    }

    assert_eq!(runs[0].len(), 5);
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn encoder_failure_stops_the_chain() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder {
        fail_on: Some("overlay batch 0"),
        ..FakeEncoder::default()
    };
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());

    let err = assembler.assemble(&request(12, 2.0)).await.unwrap_err();

    assert!(
        matches!(err, AssemblyError::EncodeFailed { ref job, .. } if job == "overlay batch 0"),
        "{err}"
    );
    assert_eq!(encoder.labels(), vec!["stitching audio", "overlay batch 0"]);
}

#[tokio::test]
async fn missing_image_is_a_fetch_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::default();
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());

    let mut req = request(2, 1.0);
    req.segments[1].image = AssetSource::File(tmp.path().join("does-not-exist.png"));

    let err = assembler.assemble(&req).await.unwrap_err();

    assert!(matches!(err, AssemblyError::FetchFailed { .. }), "{err}");
    assert_eq!(encoder.labels(), vec!["stitching audio"]);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::default();
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());

    assembler.cancellation_token().cancel();
    let err = assembler.assemble(&request(5, 1.0)).await.unwrap_err();

    assert!(matches!(err, AssemblyError::Cancelled));
    assert!(encoder.labels().is_empty());
}

#[tokio::test]
async fn cancellation_is_honored_at_the_next_job_boundary() {
    let tmp = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let encoder = FakeEncoder {
        cancel_after: Some(("stitching audio", token.clone())),
        ..FakeEncoder::default()
    };
    let assembler =
        Assembler::new(config(tmp.path()), encoder.clone()).with_cancellation_token(token);

    let err = assembler.assemble(&request(12, 2.0)).await.unwrap_err();

    assert!(matches!(err, AssemblyError::Cancelled));
    assert_eq!(encoder.labels(), vec!["stitching audio"]);
}

#[tokio::test]
async fn reported_fractions_are_bounded_and_monotonic_per_stage() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder {
        yield_between_events: true,
        ..FakeEncoder::default()
    };
    let assembler = Assembler::new(config(tmp.path()), encoder);
    let status = assembler.status();
    let req = request(12, 2.0);

    let (result, seen) = tokio::join!(assembler.assemble(&req), collect_updates(&status));
    result.unwrap();

    let last = seen.last().unwrap();
    assert_eq!(last.fraction, Some(1.0));

    for stage in [
        "stitching audio",
        "overlaying clip 1/2",
        "overlaying clip 2/2",
        "stitching clips",
    ] {
        let fractions: Vec<f64> = seen
            .iter()
            .filter(|u| u.stage == stage)
            .filter_map(|u| u.fraction)
            .collect();
        assert!(!fractions.is_empty(), "no progress seen for {stage}");
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)), "{stage}");
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{stage}: {fractions:?}");
    }
}

#[tokio::test]
async fn zero_length_segment_between_narrated_ones_gets_an_empty_gate() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::default();
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());

    let video = assembler
        .assemble(&request_with(&[2.0, 0.0, 2.0]))
        .await
        .unwrap();

    assert_eq!(video.batch_count, 1);
    assert_eq!(video.duration_seconds, 4.0);
    assert_eq!(
        encoder.labels(),
        vec!["stitching audio", "overlay batch 0", "stitching clips"]
    );

    let overlay = &encoder.jobs()[1];
    let graph = overlay.filter_graph().unwrap();
    assert!(graph.contains("enable='between(t,0,2)'[v1]"), "{graph}");
    assert!(graph.contains("enable='between(t,2,2)'[v2]"), "{graph}");
    assert!(graph.contains("enable='between(t,2,4)'[v3]"), "{graph}");
}

#[tokio::test]
async fn empty_batch_window_reports_no_fractions() {
    let tmp = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder {
        yield_between_events: true,
        ..FakeEncoder::default()
    };
    let assembler = Assembler::new(config(tmp.path()), encoder.clone());
    let status = assembler.status();

    let mut durations = vec![2.0; 10];
    durations.push(0.0);
    let req = request_with(&durations);

    let (result, seen) = tokio::join!(assembler.assemble(&req), collect_updates(&status));
    result.unwrap();

    let last_batch = &encoder.jobs()[2];
    assert_eq!(last_batch.label, "overlay batch 1");
    assert_eq!(last_batch.expected_duration, Some(0.0));
    assert!(
        seen.iter()
            .filter(|u| u.stage == "overlaying clip 2/2")
            .all(|u| u.fraction.is_none()),
        "{seen:?}"
    );
    assert!(
        seen.iter()
            .any(|u| u.stage == "overlaying clip 1/2" && u.fraction.is_some())
    );
}
